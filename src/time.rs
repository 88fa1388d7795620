use jiff::Timestamp;

/// 100ns ticks since 1601-01-01 UTC, the Windows `FILETIME` epoch.
const FILETIME_EPOCH_DIFF_SECS: i64 = 11_644_473_600;

pub fn filetime_to_timestamp(ticks: u64) -> Timestamp {
    let total_nanos = (ticks as i128) * 100;
    let secs = (total_nanos / 1_000_000_000) as i64 - FILETIME_EPOCH_DIFF_SECS;
    let nanos = (total_nanos % 1_000_000_000) as i32;
    Timestamp::new(secs, nanos).unwrap_or(Timestamp::UNIX_EPOCH)
}

pub fn timestamp_to_filetime(ts: Timestamp) -> u64 {
    let secs = ts.as_second() + FILETIME_EPOCH_DIFF_SECS;
    let nanos = ts.subsec_nanosecond();
    (secs as i128 * 1_000_000_000 + nanos as i128).div_euclid(100) as u64
}

/// The 16-bit-field `SYSTEMTIME` record; day-of-week is carried but not validated.
pub struct SystemTime {
    pub year: u16,
    pub month: u16,
    pub day_of_week: u16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
    pub milliseconds: u16,
}

impl SystemTime {
    pub fn to_timestamp(&self) -> Option<Timestamp> {
        let dt = jiff::civil::DateTime::new(
            self.year as i16,
            self.month as i8,
            self.day as i8,
            self.hour as i8,
            self.minute as i8,
            self.second as i8,
            self.milliseconds as i32 * 1_000_000,
        )
        .ok()?;
        dt.to_zoned(jiff::tz::TimeZone::UTC).ok().map(|z| z.timestamp())
    }
}
