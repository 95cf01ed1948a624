// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;
use std::io::Write as _;
use tempfile::TempDir;
use weft_core::PlanId;

fn temp_log_path() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.weftlog");
    (dir, path)
}

fn sample_messages(count: usize) -> Vec<LogMessage> {
    let plan = PlanId::new();
    (0..count)
        .map(|index| LogMessage {
            method: "event_emitted".to_string(),
            plan,
            time: Utc::now(),
            args: serde_json::json!({ "index": index }),
        })
        .collect()
}

fn write_cycles(path: &Path, cycles: usize) {
    let mut writer = Writer::create(path).unwrap();
    for index in 0..cycles {
        writer.append_cycle(&sample_messages(index + 1)).unwrap();
    }
    writer.sync().unwrap();
}

#[test]
fn frames_roundtrip() {
    let (_dir, path) = temp_log_path();
    write_cycles(&path, 3);

    let mut reader = Reader::open(&path).unwrap();
    let cycles = reader.load_all().unwrap();
    assert_eq!(cycles.len(), 3);
    assert_eq!(cycles[0].len(), 1);
    assert_eq!(cycles[2].len(), 3);
    assert_eq!(cycles[2][0].method, "event_emitted");
}

#[test]
fn empty_logfile_has_no_cycles() {
    let (_dir, path) = temp_log_path();
    write_cycles(&path, 0);

    let mut reader = Reader::open(&path).unwrap();
    assert!(reader.load_one_cycle().unwrap().is_none());
}

#[test]
fn bad_magic_is_rejected() {
    let (_dir, path) = temp_log_path();
    std::fs::write(&path, b"NOTALOG\0rest").unwrap();
    assert!(matches!(
        Reader::open(&path),
        Err(LogReadError::NotALogfile)
    ));
}

#[test]
fn future_versions_are_rejected() {
    let (_dir, path) = temp_log_path();
    let mut bytes = MAGIC.to_vec();
    bytes.extend_from_slice(&99u32.to_be_bytes());
    std::fs::write(&path, bytes).unwrap();
    assert!(matches!(
        Reader::open(&path),
        Err(LogReadError::UnsupportedVersion(99))
    ));
}

#[test]
fn truncated_trailing_frame_reads_as_end_of_stream() {
    let (_dir, path) = temp_log_path();
    write_cycles(&path, 2);

    // Cut the last frame short
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

    let mut reader = Reader::open(&path).unwrap();
    assert!(reader.load_one_cycle().unwrap().is_some());
    assert!(reader.load_one_cycle().unwrap().is_none());
}

#[test]
fn corrupted_payload_is_an_error() {
    let (_dir, path) = temp_log_path();
    write_cycles(&path, 2);

    // Flip a payload byte inside the first frame
    let mut bytes = std::fs::read(&path).unwrap();
    let offset = MAGIC.len() + 4 + 4 + 2;
    bytes[offset] ^= 0xff;
    std::fs::write(&path, &bytes).unwrap();

    let mut reader = Reader::open(&path).unwrap();
    assert!(matches!(
        reader.load_one_cycle(),
        Err(LogReadError::ChecksumMismatch { frame: 0 })
    ));
}

#[test]
fn unparseable_but_checksummed_frame_is_corrupted() {
    let (_dir, path) = temp_log_path();
    {
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&MAGIC).unwrap();
        file.write_all(&FORMAT_VERSION.to_be_bytes()).unwrap();
        let payload = b"not json at all";
        file.write_all(&(payload.len() as u32).to_be_bytes()).unwrap();
        file.write_all(payload).unwrap();
        file.write_all(&crc32fast::hash(payload).to_be_bytes())
            .unwrap();
    }

    let mut reader = Reader::open(&path).unwrap();
    assert!(matches!(
        reader.load_one_cycle(),
        Err(LogReadError::Corrupted { frame: 0, .. })
    ));
}

#[test]
fn validate_reports_cycles_and_first_corruption() {
    let (_dir, path) = temp_log_path();
    write_cycles(&path, 3);

    let summary = Reader::validate(&path).unwrap();
    assert_eq!(summary.valid_cycles, 3);
    assert_eq!(summary.messages, 6);
    assert!(summary.corruption.is_none());

    // Corrupt the middle frame: the header is 12 bytes, frame 0 is
    // len(4) + payload + crc(4), so poke into frame 1's payload
    let mut bytes = std::fs::read(&path).unwrap();
    let frame0_len = u32::from_be_bytes(bytes[12..16].try_into().unwrap()) as usize;
    let frame1_payload = 12 + 4 + frame0_len + 4 + 4;
    bytes[frame1_payload + 2] ^= 0xff;
    std::fs::write(&path, &bytes).unwrap();

    let summary = Reader::validate(&path).unwrap();
    assert_eq!(summary.valid_cycles, 1);
    let corruption = summary.corruption.unwrap();
    assert_eq!(corruption.frame, 1);
    assert!(corruption.reason.contains("checksum"));
}

#[test]
fn oversized_length_prefix_is_corruption() {
    let (_dir, path) = temp_log_path();
    {
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&MAGIC).unwrap();
        file.write_all(&FORMAT_VERSION.to_be_bytes()).unwrap();
        file.write_all(&u32::MAX.to_be_bytes()).unwrap();
    }

    let mut reader = Reader::open(&path).unwrap();
    assert!(matches!(
        reader.load_one_cycle(),
        Err(LogReadError::Corrupted { frame: 0, .. })
    ));
}
