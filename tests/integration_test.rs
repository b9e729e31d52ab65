use proptest::prelude::*;
use std::fs;
use std::path::Path;
use tcf::archive::{self, PackOptions};
use tcf::format::HEADER_SIZE;
use tcf::{TcfError, TcfReader};
use tempfile::tempdir;

fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
    for (rel, data) in files {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, data).unwrap();
    }
}

#[test]
fn test_concrete_scenario() {
    let tmp = tempdir().unwrap();
    let src = tmp.path().join("src");
    write_tree(&src, &[("a.txt", &[0x01, 0x02, 0x03]), ("b/c.txt", &[])]);

    let summary = archive::pack(&src, &tmp.path().join("out")).unwrap();
    assert_eq!(summary.output, tmp.path().join("out.tcf"));
    assert_eq!(summary.file_count, 2);
    assert_eq!(summary.original_size, 3);

    let entries = archive::list(&summary.output).unwrap();
    let order: Vec<(&str, u32, u32)> =
        entries.iter().map(|e| (e.path.as_str(), e.offset, e.size)).collect();
    assert_eq!(order, vec![("b/c.txt", 0, 0), ("a.txt", 0, 3)]);

    let dst = tmp.path().join("dst");
    assert_eq!(archive::unpack(&summary.output, &dst).unwrap(), 2);
    assert_eq!(fs::read(dst.join("a.txt")).unwrap(), vec![1, 2, 3]);
    let empty = dst.join("b").join("c.txt");
    assert!(empty.is_file());
    assert_eq!(fs::read(empty).unwrap().len(), 0);
}

#[test]
fn test_container_bytes_on_disk() {
    let tmp = tempdir().unwrap();
    let src = tmp.path().join("src");
    write_tree(&src, &[("a.txt", &[0x01, 0x02, 0x03]), ("b/c.txt", &[])]);
    let out = archive::pack(&src, &tmp.path().join("x.tcf")).unwrap().output;

    let data = fs::read(&out).unwrap();
    assert_eq!(&data[..3], b"TCF");
    assert_eq!(&data[3..6], &[1, 0, 0]);
    assert_eq!(&data[6..10], &21u32.to_le_bytes());
    assert_eq!(&data[10..14], &2u32.to_le_bytes());
    assert_eq!(&data[HEADER_SIZE..HEADER_SIZE + 3], &[0x04, 0x08, 0x0c]);
    assert_eq!(&data[data.len() - 3..], b"EOF");
    assert_eq!(data.len() as u64, archive::verify(&out).unwrap().container_size as u64);
}

#[test]
fn test_empty_directory_is_rejected_without_output() {
    let tmp = tempdir().unwrap();
    let src = tmp.path().join("empty");
    fs::create_dir_all(src.join("only/dirs")).unwrap();
    let out = tmp.path().join("never");

    let err = archive::pack(&src, &out).unwrap_err();
    assert!(matches!(err, TcfError::NoFiles(_)));
    assert!(!tmp.path().join("never.tcf").exists());
}

#[test]
fn test_missing_source_is_rejected_without_output() {
    let tmp = tempdir().unwrap();
    let err = archive::pack(&tmp.path().join("missing"), &tmp.path().join("o")).unwrap_err();
    assert!(matches!(err, TcfError::NotADirectory(_)));
    assert!(!tmp.path().join("o.tcf").exists());
}

#[cfg(target_os = "linux")]
#[test]
fn test_failed_write_removes_partial_output() {
    // procfs files report size 0 but read back non-empty, so the size check
    // trips only after the output file has been created.
    let target = Path::new("/proc/self/status");
    if !target.is_file() {
        return;
    }
    let tmp = tempdir().unwrap();
    let src = tmp.path().join("src");
    write_tree(&src, &[("a.txt", b"abc")]);
    std::os::unix::fs::symlink(target, src.join("status")).unwrap();

    let err = archive::pack(&src, &tmp.path().join("partial")).unwrap_err();
    assert!(matches!(err, TcfError::SizeChanged { ref path, expected: 0, .. } if path == "status"));
    assert!(!tmp.path().join("partial.tcf").exists());
}

#[test]
fn test_header_bit_flips_abort_before_writing() {
    let tmp = tempdir().unwrap();
    let src = tmp.path().join("src");
    write_tree(&src, &[("one", b"first"), ("two/three", b"second file")]);
    let out = archive::pack(&src, &tmp.path().join("c")).unwrap().output;
    let good = fs::read(&out).unwrap();

    for byte in 0..14 {
        for bit in 0..8 {
            let mut bad = good.clone();
            bad[byte] ^= 1 << bit;
            let path = tmp.path().join("bad.tcf");
            fs::write(&path, &bad).unwrap();

            let dst = tmp.path().join("never");
            let err = archive::unpack(&path, &dst).unwrap_err();
            if byte < 3 {
                assert!(matches!(err, TcfError::InvalidMagic), "byte {byte}: {err}");
            } else {
                assert!(matches!(err, TcfError::ChecksumMismatch { .. }), "byte {byte}: {err}");
            }
            assert!(!dst.exists());
        }
    }
}

#[test]
fn test_truncated_magic_is_a_format_error() {
    let tmp = tempdir().unwrap();
    for bytes in [&b""[..], b"T", b"TC", b"TCX", b"XCF...."] {
        let path = tmp.path().join("t.tcf");
        fs::write(&path, bytes).unwrap();
        assert!(matches!(archive::unpack(&path, tmp.path()), Err(TcfError::InvalidMagic)));
    }
}

#[test]
fn test_unsafe_paths_are_refused_before_writing() {
    use std::io::Cursor;
    use tcf::TcfWriter;

    let mut w = TcfWriter::new(Cursor::new(Vec::new())).unwrap();
    w.add_bytes("fine.txt".into(), b"ok").unwrap();
    w.add_bytes("../escape.txt".into(), b"nope").unwrap();
    let data = w.finalize().unwrap().1.into_inner();

    let tmp = tempdir().unwrap();
    let path = tmp.path().join("evil.tcf");
    fs::write(&path, data).unwrap();
    let dst = tmp.path().join("out");

    let err = archive::unpack(&path, &dst).unwrap_err();
    assert!(matches!(err, TcfError::UnsafePath(ref p) if p == "../escape.txt"));
    assert!(!dst.exists());
    assert!(!tmp.path().join("escape.txt").exists());
}

#[test]
fn test_extract_failure_reports_completed_entries() {
    let tmp = tempdir().unwrap();
    let src = tmp.path().join("src");
    write_tree(&src, &[("a", b"1"), ("blocked/x", b"22")]);
    let out = archive::pack(&src, &tmp.path().join("c")).unwrap().output;

    // A plain file where a directory is needed.
    let dst = tmp.path().join("dst");
    fs::create_dir_all(&dst).unwrap();
    fs::write(dst.join("blocked"), b"in the way").unwrap();

    match archive::unpack(&out, &dst).unwrap_err() {
        TcfError::Extract { path, completed, .. } => {
            assert_eq!(path, "blocked/x");
            assert_eq!(completed, vec!["a".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fs::read(dst.join("a")).unwrap(), b"1");
}

#[test]
fn test_inspect_dumps_raw_and_detransformed() {
    let tmp = tempdir().unwrap();
    let src = tmp.path().join("src");
    write_tree(&src, &[("a.txt", &[0x01, 0x02, 0x03, 0x80]), ("b/c.txt", &[])]);
    let out = archive::pack(&src, &tmp.path().join("c")).unwrap().output;

    let info = archive::inspect(&out, 1, 3).unwrap();
    assert_eq!(info.path, "a.txt");
    assert_eq!(info.size, 4);
    assert_eq!(info.shown, 3);
    assert_eq!(info.raw_hex, "04080c");
    assert_eq!(info.detransformed_hex, "010203");

    let all = archive::inspect(&out, 1, 100).unwrap();
    assert_eq!(all.raw_hex, "04080c02");
    assert_eq!(all.detransformed_hex, "01020380");

    let empty = archive::inspect(&out, 0, 100).unwrap();
    assert_eq!((empty.path.as_str(), empty.shown, empty.raw_hex.as_str()), ("b/c.txt", 0, ""));

    assert!(matches!(
        archive::inspect(&out, 2, 10),
        Err(TcfError::EntryOutOfRange { index: 2, count: 2 })
    ));
}

#[test]
fn test_inspect_checksum_policy() {
    let tmp = tempdir().unwrap();
    let src = tmp.path().join("src");
    write_tree(&src, &[("a.txt", b"abc")]);
    let out = archive::pack(&src, &tmp.path().join("c")).unwrap().output;

    let mut data = fs::read(&out).unwrap();
    data[15] ^= 0x01; // stored checksum only
    fs::write(&out, &data).unwrap();

    assert!(matches!(archive::inspect(&out, 0, 8), Err(TcfError::ChecksumMismatch { .. })));
    let info = archive::inspect_unchecked(&out, 0, 8).unwrap();
    assert_eq!(info.detransformed_hex, hex::encode(b"abc"));
}

#[test]
fn test_packing_order_is_deterministic() {
    let tmp = tempdir().unwrap();
    let src = tmp.path().join("src");
    write_tree(&src, &[
        ("z", b"12345"),
        ("m/n", b"1"),
        ("a", b"12345"),
        ("e", b""),
        ("k/l/m", b"123"),
    ]);

    let first = archive::pack(&src, &tmp.path().join("one")).unwrap().output;
    let second = archive::pack(&src, &tmp.path().join("two")).unwrap().output;
    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());

    let paths: Vec<String> = archive::list(&first).unwrap().into_iter().map(|e| e.path).collect();
    assert_eq!(paths, vec!["e", "m/n", "k/l/m", "a", "z"]);
}

#[test]
fn test_buffer_size_does_not_change_output() {
    let tmp = tempdir().unwrap();
    let src = tmp.path().join("src");
    let big: Vec<u8> = (0..10_000u32).map(|i| (i * 7) as u8).collect();
    write_tree(&src, &[("big", &big), ("small", b"xyz")]);

    let a = archive::pack_with_options(&src, &tmp.path().join("a"), &PackOptions { buffer_size: 1 }).unwrap();
    let b = archive::pack_with_options(&src, &tmp.path().join("b"), &PackOptions::default()).unwrap();
    assert_eq!(fs::read(a.output).unwrap(), fs::read(b.output).unwrap());
}

#[test]
fn test_index_self_consistency() {
    let tmp = tempdir().unwrap();
    let src = tmp.path().join("src");
    write_tree(&src, &[("q", b"four"), ("r", b"to"), ("s/t", b"sixsix"), ("u", b"")]);
    let out = archive::pack(&src, &tmp.path().join("c")).unwrap().output;

    let reader = TcfReader::open(&out).unwrap();
    let payload_len = (reader.header.payload_end as usize - HEADER_SIZE) as u64;
    let mut running = 0u64;
    for e in &reader.index.entries {
        assert_eq!(e.offset as u64, running);
        assert!(e.offset as u64 + e.size as u64 <= payload_len);
        assert!(e.offset as u64 + e.size as u64 <= reader.header.payload_end as u64);
        running += e.size as u64;
    }
    assert_eq!(running, payload_len);
}

#[test]
fn test_verify_reports_header_fields() {
    let tmp = tempdir().unwrap();
    let src = tmp.path().join("src");
    write_tree(&src, &[("a", b"hello"), ("b", b"world!")]);
    let out = archive::pack(&src, &tmp.path().join("c")).unwrap().output;

    let r = archive::verify(&out).unwrap();
    assert_eq!(r.version, 1);
    assert_eq!(r.entry_count, 2);
    assert_eq!(r.payload_len, 11);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_round_trip_restores_every_file(
        files in proptest::collection::btree_map(
            "[a-z]{1,6}(/[a-z]{1,6}){0,2}",
            proptest::collection::vec(any::<u8>(), 0..512),
            1..8,
        )
    ) {
        // Skip trees where one path is a prefix directory of another file.
        let keys: Vec<&String> = files.keys().collect();
        let clash = keys.iter().any(|a| keys.iter().any(|b| b.starts_with(&format!("{a}/"))));
        prop_assume!(!clash);

        let tmp = tempdir().unwrap();
        let src = tmp.path().join("src");
        for (rel, data) in &files {
            let p = src.join(rel);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, data).unwrap();
        }

        let out = archive::pack(&src, &tmp.path().join("c")).unwrap().output;
        let dst = tmp.path().join("dst");
        prop_assert_eq!(archive::unpack(&out, &dst).unwrap(), files.len());

        for (rel, data) in &files {
            prop_assert_eq!(&fs::read(dst.join(rel)).unwrap(), data);
        }

        let sizes: Vec<u32> = archive::list(&out).unwrap().iter().map(|e| e.size).collect();
        prop_assert!(sizes.windows(2).all(|w| w[0] <= w[1]));
    }
}
