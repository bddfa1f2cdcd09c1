use super::*;
use byteorder::{BigEndian, ByteOrder};
use std::fs::{self, File};
use std::io::Write;
use tempfile::tempdir;

fn write_file(bytes: &[u8]) -> (tempfile::TempDir, File) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.bit.1");
    let mut f = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .read(true)
        .open(&path)
        .unwrap();
    f.write_all(bytes).unwrap();
    (dir, File::open(&path).unwrap())
}

// -------------------- Encode / decode roundtrip --------------------

#[test]
fn roundtrip() {
    let rec = Record::new(b"hello", b"world").unwrap();
    let bytes = rec.encode();
    let back = Record::decode(&bytes).unwrap();
    assert_eq!(back, rec);
}

#[test]
fn encoded_layout_is_pinned() {
    // 20-byte header + 3-byte key + 3-byte value.
    let rec = Record::new(b"foo", b"bar").unwrap();
    assert_eq!(HEADER_LEN, 20);
    assert_eq!(rec.encode().len(), 26);
    assert_eq!(rec.encoded_len(), 26);
}

#[test]
fn binary_key_and_value() {
    let key = vec![0x00u8, 0xFF, 0x80];
    let val = vec![0xDEu8, 0xAD, 0xBE, 0xEF];
    let rec = Record::new(&key, &val).unwrap();
    let back = Record::decode(&rec.encode()).unwrap();
    assert_eq!(back.key, key);
    assert_eq!(back.value, val);
}

#[test]
fn timestamp_survives_reencode() {
    let mut rec = Record::new(b"k", b"v").unwrap();
    rec.timestamp = 12345;
    let back = Record::decode(&rec.encode()).unwrap();
    assert_eq!(back.timestamp, 12345);
}

// -------------------- Construction rules --------------------

#[test]
fn empty_key_rejected() {
    assert!(matches!(Record::new(b"", b"v"), Err(RecordError::EmptyKey)));
    assert!(matches!(Record::tombstone(b""), Err(RecordError::EmptyKey)));
}

#[test]
fn tombstone_has_zero_value_size() {
    let rec = Record::tombstone(b"gone").unwrap();
    assert!(rec.is_tombstone());
    let back = Record::decode(&rec.encode()).unwrap();
    assert!(back.is_tombstone());
    assert_eq!(back.key, b"gone");
}

// -------------------- Corruption detection --------------------

#[test]
fn every_flipped_byte_fails_decode() {
    let bytes = Record::new(b"foo", b"bar").unwrap().encode();
    for i in 0..bytes.len() {
        let mut mutated = bytes.clone();
        mutated[i] ^= 0xFF;
        assert!(
            Record::decode(&mutated).is_err(),
            "flipping byte {} went undetected",
            i
        );
    }
}

#[test]
fn too_short_is_corrupt() {
    assert!(matches!(Record::decode(&[]), Err(RecordError::Corrupt)));
    assert!(matches!(
        Record::decode(&[0u8; HEADER_LEN]),
        Err(RecordError::Corrupt)
    ));
}

#[test]
fn size_mismatch_is_corrupt() {
    // Valid record with the last value byte cut off; the CRC no longer
    // matches and the sizes disagree with the body.
    let bytes = Record::new(b"foo", b"bar").unwrap().encode();
    let truncated = &bytes[..bytes.len() - 1];
    assert!(matches!(
        Record::decode(truncated),
        Err(RecordError::Corrupt)
    ));
}

#[test]
fn zero_key_size_is_corrupt() {
    // Hand-build a block claiming key_size = 0 with a valid checksum.
    let mut buf = vec![0u8; HEADER_LEN + 1];
    BigEndian::write_u64(&mut buf[4..12], 1);
    BigEndian::write_u32(&mut buf[12..16], 0);
    BigEndian::write_u32(&mut buf[16..20], 1);
    buf[HEADER_LEN] = b'x';
    let crc = crc32fast::hash(&buf[4..]);
    BigEndian::write_u32(&mut buf[..4], crc);

    assert!(matches!(Record::decode(&buf), Err(RecordError::Corrupt)));
}

// -------------------- Positioned file reads --------------------

#[test]
fn read_at_walks_concatenated_records() {
    let a = Record::new(b"a", b"1").unwrap();
    let b = Record::new(b"bee", b"two").unwrap();
    let mut bytes = a.encode();
    bytes.extend_from_slice(&b.encode());
    let (_dir, mut f) = write_file(&bytes);

    let first = Record::read_at(&mut f, 0).unwrap();
    assert_eq!(first, a);

    let second = Record::read_at(&mut f, first.encoded_len() as u64).unwrap();
    assert_eq!(second, b);
}

#[test]
fn read_at_past_end_fails() {
    let bytes = Record::new(b"k", b"v").unwrap().encode();
    let (_dir, mut f) = write_file(&bytes);
    assert!(Record::read_at(&mut f, bytes.len() as u64).is_err());
    assert!(Record::read_at(&mut f, 10_000).is_err());
}

#[test]
fn read_at_detects_garbage_header() {
    // A header whose sizes point far past the end of the file must fail
    // without attempting the oversized read.
    let mut bytes = vec![0u8; HEADER_LEN + 4];
    BigEndian::write_u32(&mut bytes[12..16], 1);
    BigEndian::write_u32(&mut bytes[16..20], u32::MAX);
    let (_dir, mut f) = write_file(&bytes);
    assert!(matches!(
        Record::read_at(&mut f, 0),
        Err(RecordError::Corrupt)
    ));
}

#[test]
fn read_at_truncated_tail_fails() {
    let mut bytes = Record::new(b"k", b"v").unwrap().encode();
    let full = Record::new(b"k2", b"v2").unwrap().encode();
    bytes.extend_from_slice(&full[..full.len() - 1]);
    let (_dir, mut f) = write_file(&bytes);

    let first = Record::read_at(&mut f, 0).unwrap();
    assert!(Record::read_at(&mut f, first.encoded_len() as u64).is_err());
}
