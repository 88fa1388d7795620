use pretty_assertions::assert_eq;
use winlog_bxml::evt::{self, EvtHeader};
use winlog_bxml::Value;

fn write_cstr_utf16(buf: &mut Vec<u8>, s: &str) {
    for u in s.encode_utf16() {
        buf.extend_from_slice(&u.to_le_bytes());
    }
    buf.extend_from_slice(&0u16.to_le_bytes());
}

fn build_header_bytes(flags: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&0x30u32.to_le_bytes()); // header_size
    buf.extend_from_slice(&0x654c_664cu32.to_le_bytes()); // "LfLe"
    buf.extend_from_slice(&1u32.to_le_bytes()); // "one"
    buf.extend_from_slice(&1u32.to_le_bytes()); // "one" again
    buf.extend_from_slice(&0x30u32.to_le_bytes()); // start_offset
    buf.extend_from_slice(&0x1000u32.to_le_bytes()); // end_offset
    buf.extend_from_slice(&42u32.to_le_bytes()); // current_record_number
    buf.extend_from_slice(&1u32.to_le_bytes()); // oldest_record_number
    buf.extend_from_slice(&0x10000u32.to_le_bytes()); // max_size
    buf.extend_from_slice(&flags.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // retention
    buf.extend_from_slice(&0x30u32.to_le_bytes()); // header_size (trailing copy)
    buf
}

fn build_record(record_number: u32, event_id: u32, strings: &[&str]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&0u32.to_le_bytes()); // length (patched below)
    buf.extend_from_slice(&0u32.to_le_bytes()); // reserved
    buf.extend_from_slice(&record_number.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // time_generated
    buf.extend_from_slice(&0u32.to_le_bytes()); // time_written
    buf.extend_from_slice(&event_id.to_le_bytes());
    buf.extend_from_slice(&4u16.to_le_bytes()); // event_type
    buf.extend_from_slice(&(strings.len() as u16).to_le_bytes()); // num_strings
    buf.extend_from_slice(&1u16.to_le_bytes()); // event_category
    buf.extend_from_slice(&0u16.to_le_bytes()); // reserved_flags
    buf.extend_from_slice(&record_number.to_le_bytes()); // closing_record_number

    let string_offset_pos = buf.len();
    buf.extend_from_slice(&0u32.to_le_bytes()); // string_offset (patched below)
    buf.extend_from_slice(&0u32.to_le_bytes()); // sid_length
    buf.extend_from_slice(&0u32.to_le_bytes()); // sid_offset
    buf.extend_from_slice(&0u32.to_le_bytes()); // data_length
    buf.extend_from_slice(&0u32.to_le_bytes()); // data_offset

    write_cstr_utf16(&mut buf, "MySource");
    write_cstr_utf16(&mut buf, "MYHOST");

    let string_offset = buf.len() as u32;
    buf[string_offset_pos..string_offset_pos + 4].copy_from_slice(&string_offset.to_le_bytes());
    for s in strings {
        write_cstr_utf16(&mut buf, s);
    }

    let length = buf.len() as u32;
    buf[0..4].copy_from_slice(&length.to_le_bytes());
    buf
}

#[test]
fn parses_a_clean_header() {
    let bytes = build_header_bytes(0);
    let mut cur = std::io::Cursor::new(bytes);
    let header = EvtHeader::from_reader(&mut cur).unwrap();
    assert_eq!(header.current_record_number, 42);
    assert_eq!(header.oldest_record_number, 1);
    assert!(!header.is_dirty());
}

#[test]
fn dirty_flag_bit_is_detected() {
    let bytes = build_header_bytes(0x1);
    let mut cur = std::io::Cursor::new(bytes);
    let header = EvtHeader::from_reader(&mut cur).unwrap();
    assert!(header.is_dirty());
}

#[test]
fn rejects_a_header_with_the_wrong_magic() {
    let mut bytes = build_header_bytes(0);
    bytes[4..8].copy_from_slice(&0u32.to_le_bytes());
    let mut cur = std::io::Cursor::new(bytes);
    assert!(EvtHeader::from_reader(&mut cur).is_err());
}

#[test]
fn decodes_fields_of_a_hand_built_event_record() {
    let bytes = build_record(7, 1234, &["one", "two"]);
    let kv = evt::parse_record(&bytes).unwrap().expect("not an eof marker");

    assert_eq!(kv.get("RecordNumber"), Some(&Value::U32(7)));
    assert_eq!(kv.get("EventID"), Some(&Value::U32(1234)));
    assert_eq!(kv.get("EventType"), Some(&Value::U16(4)));
    assert_eq!(kv.get("EventCategory"), Some(&Value::U16(1)));
    assert_eq!(kv.get("SourceName"), Some(&Value::String("MySource".to_string())));
    assert_eq!(kv.get("ComputerName"), Some(&Value::String("MYHOST".to_string())));
    assert_eq!(kv.get("Strings_0"), Some(&Value::String("one".to_string())));
    assert_eq!(kv.get("Strings_1"), Some(&Value::String("two".to_string())));
    assert_eq!(kv.get("Sid"), None);
    assert_eq!(kv.get("Data"), None);
}

#[test]
fn eof_marker_record_decodes_to_none() {
    let mut bytes = vec![0u8; 4];
    bytes.extend_from_slice(&evt::DIRTY_NEEDLE);
    assert!(evt::parse_record(&bytes).unwrap().is_none());
}
