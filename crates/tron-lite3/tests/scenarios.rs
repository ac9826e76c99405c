use std::collections::BTreeMap;

use tron_lite3::hash::key_hash;
use tron_lite3::spec::{NODE_SIZE, ZERO_MEM_8};
use tron_lite3::{snapshot, Document, Lite3Error, RootKind, ValueRef, ValueType, ROOT};

const ALPHANUMS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

#[test]
fn test_john_doe() {
    let mut doc = Document::new(RootKind::Object).unwrap();

    doc.set_i64(ROOT, "user_id", 12345).unwrap();
    doc.set_str(ROOT, "username", "jdoe").unwrap();
    doc.set_str(ROOT, "email_address", "jdoe@example.com").unwrap();
    doc.set_bool(ROOT, "is_active", true).unwrap();
    doc.set_f64(ROOT, "account_balance", 259.75).unwrap();
    doc.set_str(ROOT, "signup_date_str", "2023-08-15").unwrap();
    doc.set_str(ROOT, "last_login_date_iso", "2025-09-13T13:20:00Z").unwrap();
    doc.set_i64(ROOT, "birth_year", 1996).unwrap();
    doc.set_str(ROOT, "phone_number", "+14155555671").unwrap();
    doc.set_str(ROOT, "preferred_language", "en").unwrap();
    doc.set_str(ROOT, "time_zone", "Europe/Berlin").unwrap();
    doc.set_i64(ROOT, "loyalty_points", 845).unwrap();
    doc.set_f64(ROOT, "avg_session_length_minutes", 14.3).unwrap();
    doc.set_bool(ROOT, "newsletter_subscribed", false).unwrap();
    doc.set_str(ROOT, "ip_address", "192.168.0.42").unwrap();
    doc.set_null(ROOT, "notes").unwrap();

    assert_eq!(doc.count(ROOT).unwrap(), 16);
    assert_eq!(doc.get_i64(ROOT, "user_id").unwrap(), 12345);
    assert_eq!(doc.get_str(ROOT, "username").unwrap(), "jdoe");
    assert_eq!(doc.get_str(ROOT, "email_address").unwrap(), "jdoe@example.com");
    assert!(doc.get_bool(ROOT, "is_active").unwrap());
    assert_eq!(doc.get_f64(ROOT, "account_balance").unwrap(), 259.75);
    assert_eq!(doc.get_str(ROOT, "signup_date_str").unwrap(), "2023-08-15");
    assert_eq!(doc.get_str(ROOT, "last_login_date_iso").unwrap(), "2025-09-13T13:20:00Z");
    assert_eq!(doc.get_i64(ROOT, "birth_year").unwrap(), 1996);
    assert_eq!(doc.get_str(ROOT, "phone_number").unwrap(), "+14155555671");
    assert_eq!(doc.get_str(ROOT, "preferred_language").unwrap(), "en");
    assert_eq!(doc.get_str(ROOT, "time_zone").unwrap(), "Europe/Berlin");
    assert_eq!(doc.get_i64(ROOT, "loyalty_points").unwrap(), 845);
    assert_eq!(doc.get_f64(ROOT, "avg_session_length_minutes").unwrap(), 14.3);
    assert!(!doc.get_bool(ROOT, "newsletter_subscribed").unwrap());
    assert_eq!(doc.get_str(ROOT, "ip_address").unwrap(), "192.168.0.42");
    assert_eq!(doc.get_type(ROOT, "notes").unwrap(), ValueType::Null);
    assert_eq!(doc.get_type(ROOT, "notes").unwrap().name(), "null");
}

#[test]
fn test_colliding_keys_all_exist() {
    let mut by_hash: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for &a in ALPHANUMS {
        for &b in ALPHANUMS {
            let key = String::from_utf8(vec![a, b]).unwrap();
            by_hash.entry(key_hash(key.as_bytes())).or_default().push(key);
        }
    }

    let mut doc = Document::new(RootKind::Object).unwrap();
    let mut colliding = Vec::new();
    for keys in by_hash.values().filter(|keys| keys.len() > 1) {
        for key in keys {
            doc.set_null(ROOT, key).unwrap();
            colliding.push(key.clone());
        }
    }

    assert!(colliding.len() > 100);
    assert_eq!(doc.count(ROOT).unwrap(), colliding.len());
    for key in &colliding {
        assert!(doc.exists(ROOT, key).unwrap(), "missing {key}");
    }

    for (i, key) in colliding.iter().enumerate() {
        doc.set_i64(ROOT, key, i as i64).unwrap();
    }
    for (i, key) in colliding.iter().enumerate() {
        assert_eq!(doc.get_i64(ROOT, key).unwrap(), i as i64);
    }
}

#[test]
fn test_alignment_padding_is_zeroed() {
    let mut doc = Document::with_capacity(RootKind::Object, 1024).unwrap();
    doc.fill_spare(0xEE);

    doc.set_obj(ROOT, "a").unwrap();
    assert_eq!(doc.as_bytes()[NODE_SIZE], ZERO_MEM_8);

    doc.reset(RootKind::Object).unwrap();
    doc.fill_spare(0xEE);
    doc.set_str(ROOT, "key1", "val1").unwrap();
    let before = doc.buflen();
    let child = doc.set_obj(ROOT, "key1").unwrap();
    assert_eq!(child, before);
    assert_eq!(&doc.as_bytes()[child + 1..child + 4], &[ZERO_MEM_8; 3]);

    doc.set_str(child, "odd", "x").unwrap();
    doc.set_bytes(child, "seven", b"1234567").unwrap();
    assert!(!doc.as_bytes().contains(&0xEE));
}

#[test]
fn test_features_walkthrough() {
    let mut doc = Document::new(RootKind::Object).unwrap();

    let headers = doc.set_obj(ROOT, "headers").unwrap();
    doc.set_str(headers, "content-type", "application/json").unwrap();
    doc.set_str(headers, "x-request-id", "req_9f8e2a").unwrap();

    let tags = doc.set_arr(ROOT, "tags").unwrap();
    doc.arr_append_str(tags, "alpha").unwrap();
    doc.arr_append_str(tags, "beta").unwrap();
    doc.arr_append_bool(tags, true).unwrap();

    assert!(doc.exists(ROOT, "headers").unwrap());
    assert_eq!(doc.get_type(ROOT, "headers").unwrap(), ValueType::Object);
    assert_eq!(doc.arr_get_str(tags, 0).unwrap(), "alpha");
    assert_eq!(doc.arr_get(tags, 2).unwrap(), ValueRef::Bool(true));

    let items: Vec<_> = doc.items(tags).unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(items, [ValueRef::Str("alpha"), ValueRef::Str("beta"), ValueRef::Bool(true)]);

    let mut keys: Vec<&str> = doc
        .entries(headers)
        .unwrap()
        .map(|entry| entry.map(|(key, _)| key))
        .collect::<Result<_, _>>()
        .unwrap();
    keys.sort_unstable();
    assert_eq!(keys, ["content-type", "x-request-id"]);
}

#[test]
fn test_offsets_survive_growth() {
    let mut doc = Document::with_capacity(RootKind::Object, 64).unwrap();
    let early = doc.set_obj(ROOT, "early").unwrap();
    doc.set_str(early, "marker", "still here").unwrap();

    let list = doc.set_arr(ROOT, "list").unwrap();
    for i in 0..1000 {
        doc.arr_append_i64(list, i).unwrap();
    }
    assert!(doc.bufsz() >= 16 * 1000);
    assert_eq!(doc.get_str(early, "marker").unwrap(), "still here");
    assert_eq!(doc.arr_get_i64(list, 999).unwrap(), 999);
}

#[test]
fn test_save_and_reload() {
    let mut doc = Document::new(RootKind::Object).unwrap();
    doc.set_str(ROOT, "event", "lap_complete").unwrap();
    doc.set_i64(ROOT, "lap", 55).unwrap();
    doc.set_f64(ROOT, "time_sec", 88.427).unwrap();
    doc.set_bool(ROOT, "fastest_lap", true).unwrap();
    doc.set_bytes(ROOT, "raw_payload", &[1, 2, 3]).unwrap();
    doc.delete(ROOT, "fastest_lap").unwrap();

    let path = std::env::temp_dir().join(format!("tron-lite3-{}.tron", std::process::id()));
    doc.save(&path).unwrap();
    let reloaded = Document::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(reloaded.as_bytes(), doc.as_bytes());
    assert_eq!(reloaded.get_type(ROOT, "fastest_lap").unwrap(), ValueType::Null);
    assert_eq!(reloaded.get_bytes(ROOT, "raw_payload").unwrap(), &[1, 2, 3]);
}

#[test]
fn test_writer_and_snapshot_agree() {
    let doc = Document::from_json(r#"{"user":{"id":12345,"name":"Jane Doe"},"roles":["admin","editor"]}"#)
        .unwrap();

    let mut raw = Vec::new();
    doc.write_to(&mut raw).unwrap();
    let from_reader = Document::read_from(raw.as_slice()).unwrap();

    let sealed = snapshot::seal(&doc);
    let unsealed = snapshot::unseal(&sealed).unwrap();

    assert_eq!(from_reader.as_bytes(), unsealed.as_bytes());
    let user = unsealed.get_obj(ROOT, "user").unwrap();
    assert_eq!(unsealed.get_str(user, "name").unwrap(), "Jane Doe");
}

#[test]
fn test_corrupted_child_pointer_rejected() {
    let mut doc = Document::new(RootKind::Object).unwrap();
    doc.set_obj(ROOT, "child").unwrap();
    let mut bytes = doc.as_bytes().to_vec();

    // 把子节点偏移改写为根节点自身，形成环
    let table = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
    let slot = (0..8)
        .map(|i| table + i * 24)
        .find(|&slot| bytes[slot + 4..slot + 8] != [0; 4])
        .unwrap();
    bytes[slot + 16..slot + 24].copy_from_slice(&0u64.to_le_bytes());

    assert!(matches!(
        Document::from_bytes(&bytes),
        Err(Lite3Error::MalformedInput(_))
    ));
}
