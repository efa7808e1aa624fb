use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use pzip::checksum::crc32;
use pzip::ops::{self, CreateOptions, Event, ExtractOptions};
use pzip::{ArchiveEnd, ArchiveReader, Error, Level};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn create(archive: &Path, files: &[PathBuf]) -> pzip::Stats {
    ops::create(archive, files, &CreateOptions::default(), |_| {}).unwrap()
}

fn extract_into(archive: &Path, dir: &Path) -> pzip::Stats {
    let options = ExtractOptions {
        output_dir: dir.to_path_buf(),
        overwrite: false,
    };
    ops::extract(archive, &options, |_| {}).unwrap()
}

/// Where extraction puts a file that was archived by its absolute path.
fn extracted(dir: &Path, original: &Path) -> PathBuf {
    dir.join(ops::archive_name(original).unwrap())
}

#[test]
fn hello_and_empty_file_scenario() {
    let src = TempDir::new().unwrap();
    let a = write(src.path(), "a.txt", b"hello");
    let b = write(src.path(), "b.txt", b"");
    let archive = src.path().join("out.pz");

    let stats = create(&archive, &[a.clone(), b.clone()]);
    assert_eq!(stats.entries, 2);
    assert!(stats.is_success());

    let listing = ops::list(&archive).unwrap();
    assert_eq!(listing.end, ArchiveEnd::Clean);
    let sizes: Vec<_> = listing.entries.iter().map(|e| e.uncompressed_size()).collect();
    assert_eq!(sizes, [5, 0]);
    assert_eq!(listing.entries[0].header.crc32, crc32fast::hash(b"hello"));
    assert_eq!(listing.entries[1].header.crc32, 0);

    let out = TempDir::new().unwrap();
    let stats = extract_into(&archive, out.path());
    assert!(stats.is_success());
    assert_eq!(stats.entries, 2);
    assert_eq!(fs::read(extracted(out.path(), &a)).unwrap(), b"hello");
    assert_eq!(fs::read(extracted(out.path(), &b)).unwrap(), b"");
}

#[test]
fn round_trip_preserves_bytes_and_checksums() {
    let src = TempDir::new().unwrap();
    let binary: Vec<u8> = (0..100_000u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8).collect();
    let text = "lorem ipsum dolor sit amet\n".repeat(3000);
    let files = vec![
        write(src.path(), "random.bin", &binary),
        write(src.path(), "text.txt", text.as_bytes()),
        write(src.path(), "one.byte", b"x"),
    ];
    let archive = src.path().join("round.pz");
    create(&archive, &files);

    let out = TempDir::new().unwrap();
    assert!(extract_into(&archive, out.path()).is_success());

    let listing = ops::list(&archive).unwrap();
    for (original, entry) in files.iter().zip(&listing.entries) {
        let restored = extracted(out.path(), original);
        assert_eq!(fs::read(&restored).unwrap(), fs::read(original).unwrap());
        let recomputed = crc32(fs::File::open(&restored).unwrap()).unwrap();
        assert_eq!(recomputed, entry.header.crc32);
    }
}

#[test]
fn listing_matches_creation() {
    let src = TempDir::new().unwrap();
    let contents: [&[u8]; 4] = [b"alpha", b"bravo bravo", b"", b"delta delta delta"];
    let files: Vec<_> = contents
        .iter()
        .enumerate()
        .map(|(i, data)| write(src.path(), &format!("f{i}"), data))
        .collect();
    let archive = src.path().join("list.pz");
    let stats = create(&archive, &files);

    let listing = ops::list(&archive).unwrap();
    assert_eq!(listing.entries.len(), files.len());
    let expected_total: u64 = contents.iter().map(|c| c.len() as u64).sum();
    assert_eq!(listing.uncompressed_total(), expected_total);
    assert_eq!(stats.uncompressed_total, expected_total);
    assert_eq!(listing.compressed_total(), stats.compressed_total);
}

#[test]
fn compressed_sizes_account_for_every_byte() {
    let src = TempDir::new().unwrap();
    let files = vec![
        write(src.path(), "a", &b"abc".repeat(1000)),
        write(src.path(), "b", b""),
        write(src.path(), "c", b"tail"),
    ];
    let archive = src.path().join("sizes.pz");
    create(&archive, &files);

    let bytes = fs::read(&archive).unwrap();
    let mut reader = ArchiveReader::new(Cursor::new(&bytes)).unwrap();
    let entries = reader.entries().unwrap();
    assert_eq!(entries.len(), 3);

    for pair in entries.windows(2) {
        assert_eq!(
            pair[0].data_offset + pair[0].compressed_size(),
            pair[1].header_offset
        );
    }
    let last = entries.last().unwrap();
    assert_eq!(last.data_offset + last.compressed_size(), bytes.len() as u64);
}

#[test]
fn directories_are_skipped_with_a_note() {
    let src = TempDir::new().unwrap();
    let file = write(src.path(), "file.txt", b"content");
    let dir = src.path().join("subdir");
    fs::create_dir(&dir).unwrap();
    let archive = src.path().join("dirs.pz");

    let mut skipped = Vec::new();
    let stats = ops::create(
        &archive,
        &[dir.clone(), file],
        &CreateOptions::default(),
        |event| {
            if let Event::SkippedDirectory(path) = event {
                skipped.push(path.to_path_buf());
            }
        },
    )
    .unwrap();

    assert_eq!(skipped, [dir]);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.entries, 1);
    assert!(stats.is_success());
    assert_eq!(ops::list(&archive).unwrap().entries.len(), 1);
}

#[test]
fn missing_source_is_a_per_entry_failure() {
    let src = TempDir::new().unwrap();
    let good = write(src.path(), "good.txt", b"still here");
    let missing = src.path().join("missing.txt");
    let archive = src.path().join("partial.pz");

    let mut failed = Vec::new();
    let stats = ops::create(
        &archive,
        &[missing.clone(), good.clone()],
        &CreateOptions::default(),
        |event| {
            if let Event::Failed { name, .. } = event {
                failed.push(name.to_string());
            }
        },
    )
    .unwrap();

    assert_eq!(stats.entries, 1);
    assert_eq!(stats.failures.len(), 1);
    assert!(matches!(stats.failures[0].error, Error::Source { .. }));
    assert_eq!(failed, [missing.display().to_string()]);
    assert!(!stats.is_success());

    let out = TempDir::new().unwrap();
    assert!(extract_into(&archive, out.path()).is_success());
    assert_eq!(fs::read(extracted(out.path(), &good)).unwrap(), b"still here");
}

#[test]
fn unopenable_archive_is_fatal() {
    let src = TempDir::new().unwrap();
    let file = write(src.path(), "a.txt", b"a");
    let archive = src.path().join("no-such-dir").join("out.pz");

    let err = ops::create(&archive, &[file], &CreateOptions::default(), |_| {}).unwrap_err();
    assert!(err.is_fatal());
    assert!(ops::list(&archive).unwrap_err().is_fatal());
}

#[test]
fn archive_never_includes_itself() {
    let src = TempDir::new().unwrap();
    let file = write(src.path(), "a.txt", b"a");
    let archive = src.path().join("self.pz");

    let stats = create(&archive, &[archive.clone(), file]);
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.skipped, 1);
}

#[test]
fn repetitive_input_compresses_well() {
    let src = TempDir::new().unwrap();
    let line = format!("{}\n", "0123456789abcdef".repeat(64).trim_end_matches('f'));
    assert_eq!(line.len(), 1024);
    let big = write(src.path(), "big.txt", line.repeat(10_000).as_bytes());
    let archive = src.path().join("big.pz");

    let stats = create(&archive, &[big]);
    assert_eq!(stats.uncompressed_total, 10_240_000);
    assert!(stats.compressed_total * 10 < stats.uncompressed_total);
    assert!(stats.ratio() < 10);
}

#[test]
fn level_nine_is_not_larger_than_level_one() {
    let src = TempDir::new().unwrap();
    let text: String = (0..20_000)
        .map(|i| format!("{:05} GET /index.html 200 {}\n", i % 97, i % 13))
        .collect();
    let file = write(src.path(), "access.log", text.as_bytes());

    let size_at = |level: u32| {
        let archive = src.path().join(format!("l{level}.pz"));
        let options = CreateOptions {
            level: Level::new(level).unwrap(),
        };
        ops::create(&archive, &[file.clone()], &options, |_| {})
            .unwrap()
            .compressed_total
    };
    assert!(size_at(9) <= size_at(1));
}

#[test]
fn stream_mode_matches_file_mode() {
    let src = TempDir::new().unwrap();
    let files = vec![
        write(src.path(), "a.txt", b"hello"),
        write(src.path(), "b.txt", b""),
        write(src.path(), "c.txt", &b"pattern ".repeat(5000)),
    ];
    let archive = src.path().join("file.pz");
    create(&archive, &files);

    let mut streamed = Vec::new();
    let stats =
        ops::create_to_writer(&mut streamed, &files, &CreateOptions::default(), |_| {}).unwrap();
    assert_eq!(stats.entries, 3);
    assert_eq!(streamed, fs::read(&archive).unwrap());
}

#[test]
fn truncated_archive_extracts_the_intact_prefix() {
    let src = TempDir::new().unwrap();
    let first = write(src.path(), "first.txt", b"complete entry");
    let numbers: String = (0..3000).map(|i| format!("{} ", i * 7919 % 10007)).collect();
    let second = write(src.path(), "second.txt", numbers.as_bytes());
    let archive = src.path().join("cut.pz");
    create(&archive, &[first.clone(), second]);

    let len = fs::metadata(&archive).unwrap().len();
    fs::File::options()
        .write(true)
        .open(&archive)
        .unwrap()
        .set_len(len - 20)
        .unwrap();

    let listing = ops::list(&archive).unwrap();
    assert_eq!(listing.entries.len(), 2);
    assert!(matches!(listing.end, ArchiveEnd::Truncated { .. }));

    let out = TempDir::new().unwrap();
    let stats = extract_into(&archive, out.path());
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.failures.len(), 1);
    assert!(!stats.is_success());
    assert_eq!(fs::read(extracted(out.path(), &first)).unwrap(), b"complete entry");
}

#[test]
fn corrupted_payload_is_caught_by_test() {
    let src = TempDir::new().unwrap();
    let file = write(src.path(), "data.txt", &b"some text to damage ".repeat(100));
    let archive = src.path().join("damaged.pz");
    create(&archive, &[file]);

    assert!(ops::verify(&archive, |_| {}).unwrap().is_success());

    let mut bytes = fs::read(&archive).unwrap();
    let entry = ArchiveReader::new(Cursor::new(&bytes))
        .unwrap()
        .next_entry()
        .unwrap()
        .unwrap();
    let middle = (entry.data_offset + entry.compressed_size() / 2) as usize;
    bytes[middle] ^= 0xFF;
    fs::write(&archive, &bytes).unwrap();

    let stats = ops::verify(&archive, |_| {}).unwrap();
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.failures.len(), 1);
}

#[test]
fn damaged_entry_never_appears_under_its_name() {
    let src = TempDir::new().unwrap();
    let file = write(src.path(), "data.txt", &b"checked on the way out ".repeat(50));
    let archive = src.path().join("badcrc.pz");
    create(&archive, &[file.clone()]);

    // Flip one bit of the stored CRC32 of the first entry.
    let mut bytes = fs::read(&archive).unwrap();
    bytes[14] ^= 0x01;
    fs::write(&archive, &bytes).unwrap();

    let out = TempDir::new().unwrap();
    let target = extracted(out.path(), &file);
    for _ in 0..2 {
        let stats = extract_into(&archive, out.path());
        assert!(!stats.is_success());
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.failures.len(), 1);
        assert!(matches!(stats.failures[0].error, Error::CrcMismatch { .. }));
        assert!(!target.exists());
        assert_eq!(fs::read_dir(target.parent().unwrap()).unwrap().count(), 0);
    }
}

#[test]
fn damaged_entry_leaves_an_existing_file_alone() {
    let src = TempDir::new().unwrap();
    let file = write(src.path(), "keep.txt", b"archived copy");
    let archive = src.path().join("badcrc.pz");
    create(&archive, &[file.clone()]);

    let mut bytes = fs::read(&archive).unwrap();
    bytes[14] ^= 0x01;
    fs::write(&archive, &bytes).unwrap();

    let out = TempDir::new().unwrap();
    let target = extracted(out.path(), &file);
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(&target, b"good local copy").unwrap();

    let options = ExtractOptions {
        output_dir: out.path().to_path_buf(),
        overwrite: true,
    };
    let stats = ops::extract(&archive, &options, |_| {}).unwrap();
    assert_eq!(stats.failures.len(), 1);
    assert_eq!(fs::read(&target).unwrap(), b"good local copy");
}

#[cfg(unix)]
#[test]
fn special_files_are_refused_as_sources() {
    let src = TempDir::new().unwrap();
    let good = write(src.path(), "good.txt", b"regular");
    let device = PathBuf::from("/dev/null");
    let archive = src.path().join("special.pz");

    let stats = ops::create(&archive, &[device, good], &CreateOptions::default(), |_| {}).unwrap();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.failures.len(), 1);
    assert!(matches!(stats.failures[0].error, Error::NotAFile(_)));
    assert_eq!(ops::list(&archive).unwrap().entries.len(), 1);
}

#[cfg(unix)]
#[test]
fn symlinked_directory_in_output_is_not_followed() {
    use pzip::ArchiveWriter;

    let mut writer = ArchiveWriter::new(Vec::new(), Level::default());
    writer.append_buffered("link/planted.txt", &b"nope"[..]).unwrap();
    writer.append_buffered("plain.txt", &b"yes"[..]).unwrap();
    let (bytes, _) = writer.finish().unwrap();

    let src = TempDir::new().unwrap();
    let archive = src.path().join("linked.pz");
    fs::write(&archive, bytes).unwrap();

    let out = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    std::os::unix::fs::symlink(elsewhere.path(), out.path().join("link")).unwrap();

    let stats = extract_into(&archive, out.path());
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.failures.len(), 1);
    assert!(matches!(stats.failures[0].error, Error::UnsafeName(_)));
    assert!(!elsewhere.path().join("planted.txt").exists());
    assert_eq!(fs::read(out.path().join("plain.txt")).unwrap(), b"yes");
}

#[test]
fn unsafe_names_are_refused_and_later_entries_still_extract() {
    use pzip::ArchiveWriter;

    let mut writer = ArchiveWriter::new(Vec::new(), Level::default());
    writer.append_buffered("../escape.txt", &b"nope"[..]).unwrap();
    writer.append_buffered("safe/inner.txt", &b"yes"[..]).unwrap();
    let (bytes, _) = writer.finish().unwrap();

    let src = TempDir::new().unwrap();
    let archive = src.path().join("evil.pz");
    fs::write(&archive, bytes).unwrap();

    let out = TempDir::new().unwrap();
    let target = out.path().join("target");
    let stats = extract_into(&archive, &target);

    assert_eq!(stats.entries, 1);
    assert_eq!(stats.failures.len(), 1);
    assert!(matches!(stats.failures[0].error, Error::UnsafeName(_)));
    assert!(!out.path().join("escape.txt").exists());
    assert_eq!(fs::read(target.join("safe/inner.txt")).unwrap(), b"yes");
}

#[test]
fn existing_files_are_kept_unless_overwrite() {
    let src = TempDir::new().unwrap();
    let file = write(src.path(), "a.txt", b"from archive");
    let archive = src.path().join("keep.pz");
    create(&archive, &[file.clone()]);

    let out = TempDir::new().unwrap();
    let target = extracted(out.path(), &file);
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(&target, b"local edit").unwrap();

    let stats = extract_into(&archive, out.path());
    assert_eq!(stats.skipped, 1);
    assert_eq!(fs::read(&target).unwrap(), b"local edit");

    let options = ExtractOptions {
        output_dir: out.path().to_path_buf(),
        overwrite: true,
    };
    let stats = ops::extract(&archive, &options, |_| {}).unwrap();
    assert_eq!(stats.entries, 1);
    assert_eq!(fs::read(&target).unwrap(), b"from archive");
}
