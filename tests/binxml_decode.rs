use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

use winlog_bxml::binxml::{decode_record, TemplateCache};
use winlog_bxml::Value;

fn write_inline_name(buf: &mut Vec<u8>, name: &str) {
    let name_struct_offset = (buf.len() + 4) as u32;
    buf.extend_from_slice(&name_struct_offset.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // reserved
    buf.extend_from_slice(&0u16.to_le_bytes()); // hash
    let units: Vec<u16> = name.encode_utf16().collect();
    buf.extend_from_slice(&(units.len() as u16).to_le_bytes());
    for u in &units {
        buf.extend_from_slice(&u.to_le_bytes());
    }
    buf.extend_from_slice(&0u16.to_le_bytes()); // nul pad
}

fn write_open_start_element(buf: &mut Vec<u8>, name: &str, has_attrs: bool) {
    let tag = 0x01 | if has_attrs { 0x40 } else { 0 };
    buf.push(tag);
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    write_inline_name(buf, name);
}

fn write_attributes(buf: &mut Vec<u8>, f: impl FnOnce(&mut Vec<u8>)) {
    let size_pos = buf.len();
    buf.extend_from_slice(&0u32.to_le_bytes());
    let start = buf.len();
    f(buf);
    let size = (buf.len() - start) as u32;
    buf[size_pos..size_pos + 4].copy_from_slice(&size.to_le_bytes());
}

fn write_literal_attribute(buf: &mut Vec<u8>, name: &str, value: &str) {
    buf.push(0x06); // ATTRIBUTE
    write_inline_name(buf, name);
    buf.push(0x05); // VALUE
    buf.push(0x01); // STRING
    let units: Vec<u16> = value.encode_utf16().collect();
    buf.extend_from_slice(&(units.len() as u16).to_le_bytes());
    for u in &units {
        buf.extend_from_slice(&u.to_le_bytes());
    }
}

fn write_placeholder_child(buf: &mut Vec<u8>, sub_id: u16, value_type: u8) {
    buf.push(0x0d); // NORMAL_SUBSTITUTION
    buf.extend_from_slice(&sub_id.to_le_bytes());
    buf.push(value_type);
}

fn build_instance_referencing_template(message: &str, template_offset: u32) -> Vec<u8> {
    let mut record = Vec::new();
    record.push(0x0f);
    record.extend_from_slice(&[1, 1, 0]); // fragment header

    record.push(0x0c); // TEMPLATE_INSTANCE
    record.push(0); // unused
    record.extend_from_slice(&0u32.to_le_bytes()); // template_id (advisory)
    record.extend_from_slice(&template_offset.to_le_bytes()); // back-reference, not a self-offset

    record.extend_from_slice(&1u32.to_le_bytes()); // number_of_substitutions
    let utf16_len = (message.encode_utf16().count() * 2) as u16;
    record.extend_from_slice(&utf16_len.to_le_bytes());
    record.push(0x01); // STRING
    record.push(0); // reserved
    for u in message.encode_utf16() {
        record.extend_from_slice(&u.to_le_bytes());
    }
    record
}

/// Builds a standalone BinXML record whose template is:
/// `<Event><System><TimeCreated SystemTime="lit"/></System><EventData><Data Name="Message">{sub0}</Data></EventData></Event>`
/// Returns the record bytes and the (base-0) absolute offset of the template
/// definition's start, for use as a back-reference by another record.
fn build_record(message: &str, time_created_literal: &str) -> (Vec<u8>, u32) {
    let mut record = Vec::new();

    record.push(0x0f);
    record.extend_from_slice(&[1, 1, 0]); // fragment header

    record.push(0x0c); // TEMPLATE_INSTANCE
    record.push(0);
    record.extend_from_slice(&0u32.to_le_bytes()); // template_id (advisory)

    let offset_field_pos = record.len();
    record.extend_from_slice(&0u32.to_le_bytes());
    let template_def_start = record.len() as u32;
    record[offset_field_pos..offset_field_pos + 4].copy_from_slice(&template_def_start.to_le_bytes());

    record.extend_from_slice(&0u32.to_le_bytes()); // next_template_offset
    record.extend_from_slice(&[0u8; 16]); // template guid
    record.extend_from_slice(&0u32.to_le_bytes()); // data_size (unchecked)

    record.push(0x0f);
    record.extend_from_slice(&[1, 1, 0]); // fragment header for the template body

    write_open_start_element(&mut record, "Event", false);
    record.push(0x02); // CLOSE_START

    write_open_start_element(&mut record, "System", false);
    record.push(0x02); // CLOSE_START
    write_open_start_element(&mut record, "TimeCreated", true);
    write_attributes(&mut record, |b| write_literal_attribute(b, "SystemTime", time_created_literal));
    record.push(0x03); // CLOSE_EMPTY (no children)
    record.push(0x04); // END_ELEMENT (System)

    write_open_start_element(&mut record, "EventData", false);
    record.push(0x02); // CLOSE_START

    write_open_start_element(&mut record, "Data", true);
    write_attributes(&mut record, |b| write_literal_attribute(b, "Name", "Message"));
    record.push(0x02); // CLOSE_START (has placeholder child)
    write_placeholder_child(&mut record, 0, 0x01);
    record.push(0x04); // END_ELEMENT (Data)

    record.push(0x04); // END_ELEMENT (EventData)
    record.push(0x04); // END_ELEMENT (Event)

    record.push(0x00); // END (template definition)

    record.extend_from_slice(&1u32.to_le_bytes()); // number_of_substitutions
    let utf16_len = (message.encode_utf16().count() * 2) as u16;
    record.extend_from_slice(&utf16_len.to_le_bytes());
    record.push(0x01); // STRING
    record.push(0); // reserved
    for u in message.encode_utf16() {
        record.extend_from_slice(&u.to_le_bytes());
    }

    (record, template_def_start)
}

#[test]
fn decodes_a_hand_built_template_instance() {
    let (record, _) = build_record("hello world", "2020-01-01T00:00:00Z");
    let cache = Rc::new(RefCell::new(TemplateCache::default()));
    let kv = decode_record(&record, &record, 0, &cache).expect("decode should succeed");

    assert_eq!(kv.get("Message"), Some(&Value::String("hello world".to_string())));
    assert_eq!(
        kv.get("TimeCreated_SystemTime"),
        Some(&Value::String("2020-01-01T00:00:00Z".to_string()))
    );
}

#[test]
fn reuses_cached_template_via_a_genuine_back_reference() {
    // Record 1 defines the template inline (decoded at absolute offset 0, so
    // its self-referential name/offset fields line up). Record 2 carries no
    // template body at all: only a TEMPLATE_INSTANCE pointing at record 1's
    // template start offset, decoded under an unrelated absolute offset, so
    // the only way it can resolve is a genuine cache hit.
    let cache = Rc::new(RefCell::new(TemplateCache::default()));
    let (first, template_offset) = build_record("first", "2020-01-01T00:00:00Z");
    let kv1 = decode_record(&first, &first, 0, &cache).unwrap();
    assert_eq!(kv1.get("Message"), Some(&Value::String("first".to_string())));

    let second = build_instance_referencing_template("second", template_offset);
    let kv2 = decode_record(&second, &second, 9000, &cache).unwrap();
    assert_eq!(kv2.get("Message"), Some(&Value::String("second".to_string())));
    assert_eq!(
        kv2.get("TimeCreated_SystemTime"),
        Some(&Value::String("2020-01-01T00:00:00Z".to_string()))
    );
}

#[test]
fn cache_miss_on_an_unknown_offset_is_an_error() {
    let cache = Rc::new(RefCell::new(TemplateCache::default()));
    let record = build_instance_referencing_template("x", 0xdead_beef);
    let err = decode_record(&record, &record, 0, &cache).unwrap_err();
    assert!(matches!(err, winlog_bxml::EventLogError::TemplateCacheMiss(_)));
}
