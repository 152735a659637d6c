//! Integration tests for archives read through their central directory.

use std::io::Read;
use std::path::{Path, PathBuf};

use mapzip_archive::{
    read_trailer, Archive, ArchiveKind, ArchiveWriter, CompressionMethod, Error, LoadOptions,
    MapMode, ReadArchive, DIRECTORY_SIZE,
};

fn write_archive(dir: &Path, name: &str, writer: ArchiveWriter) -> PathBuf {
    let path = dir.join(name);
    writer.write_to_file(&path).unwrap();
    path
}

fn collect(archive: &Archive, dir: &str) -> Vec<String> {
    let mut names = Vec::new();
    archive
        .process_resources(dir, |_| true, |resource| {
            names.push(resource.path().to_string());
            Ok(())
        })
        .unwrap();
    names
}

#[test]
fn test_file_and_directory_scenario() {
    let tmp = tempfile::tempdir().unwrap();
    let mut writer = ArchiveWriter::new();
    writer.add_file("a/b.txt", b"hello", CompressionMethod::Store).unwrap();
    writer.add_directory("a/c.txt").unwrap();
    let path = write_archive(tmp.path(), "scenario.zip", writer);

    let archive = Archive::open(&path).unwrap();
    assert_eq!(archive.kind(), ArchiveKind::CentralDirectory);
    assert_eq!(archive.len(), 2);

    assert_eq!(archive.get_data("a/b.txt").unwrap().unwrap(), b"hello");
    assert!(matches!(archive.get_data("a/c.txt"), Err(Error::NoData(_))));
    assert!(archive.get_data("a/missing.txt").unwrap().is_none());

    let directory = archive.get_resource("a/c.txt").unwrap().unwrap();
    assert!(directory.is_directory());
    assert_eq!(directory.size(), DIRECTORY_SIZE);

    assert_eq!(collect(&archive, "a"), vec!["a/b.txt"]);
}

#[test]
fn test_stored_and_deflated_read_the_same() {
    let contents: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    let mut writer = ArchiveWriter::new();
    writer.add_file("stored.bin", &contents, CompressionMethod::Store).unwrap();
    writer.add_file("deflated.bin", &contents, CompressionMethod::Deflate).unwrap();
    let archive = Archive::from_bytes(writer.build().unwrap(), &LoadOptions::default()).unwrap();

    for name in ["stored.bin", "deflated.bin"] {
        assert_eq!(archive.get_data(name).unwrap().unwrap(), contents);

        let buffer = archive.get_byte_buffer(name).unwrap().unwrap();
        assert_eq!(&*buffer, &contents[..]);
        assert_eq!(buffer.is_mapped(), name == "stored.bin");

        let mut streamed = Vec::new();
        archive
            .get_reader(name)
            .unwrap()
            .unwrap()
            .read_to_end(&mut streamed)
            .unwrap();
        assert_eq!(streamed, contents);
    }

    let deflated = archive.as_central_directory().unwrap();
    let entry = deflated.entry("deflated.bin").unwrap().unwrap();
    assert!(entry.compressed_size() < entry.uncompressed_size());
}

#[test]
fn test_empty_deflated_file() {
    let mut writer = ArchiveWriter::new();
    writer.add_file("empty", b"", CompressionMethod::Deflate).unwrap();
    let archive = Archive::from_bytes(writer.build().unwrap(), &LoadOptions::default()).unwrap();
    assert_eq!(archive.get_data("empty").unwrap().unwrap(), b"");
}

#[test]
fn test_duplicate_names_keep_first() {
    let mut writer = ArchiveWriter::new();
    writer.add_file("dup.txt", b"first", CompressionMethod::Store).unwrap();
    writer.add_file("other.txt", b"x", CompressionMethod::Store).unwrap();
    writer.add_file("dup.txt", b"second", CompressionMethod::Deflate).unwrap();
    let archive = Archive::from_bytes(writer.build().unwrap(), &LoadOptions::default()).unwrap();

    assert_eq!(archive.len(), 2);
    assert_eq!(archive.get_data("dup.txt").unwrap().unwrap(), b"first");
    assert_eq!(collect(&archive, ""), vec!["dup.txt", "other.txt"]);
}

#[test]
fn test_truncated_entry_fails_on_read() {
    let mut writer = ArchiveWriter::new();
    writer.add_file("t.bin", b"0123456789", CompressionMethod::Store).unwrap();
    let mut bytes = writer.build().unwrap();

    // Inflate the central directory's sizes far past the end of the file.
    let record = read_trailer(&bytes).unwrap().central_dir_offset as usize;
    bytes[record + 20..record + 24].copy_from_slice(&0x0100_0000u32.to_le_bytes());
    bytes[record + 24..record + 28].copy_from_slice(&0x0100_0000u32.to_le_bytes());

    let archive = Archive::from_bytes(bytes, &LoadOptions::default()).unwrap();
    assert!(matches!(
        archive.get_data("t.bin"),
        Err(Error::Truncated { .. })
    ));
}

#[test]
fn test_close_is_idempotent_and_releases_file() {
    let tmp = tempfile::tempdir().unwrap();
    let mut writer = ArchiveWriter::new();
    writer.add_file("x", b"y", CompressionMethod::Store).unwrap();
    let path = write_archive(tmp.path(), "close.zip", writer);

    let mut archive = Archive::open(&path).unwrap();
    assert!(archive.is_mapped());
    archive.close();
    archive.close();
    assert!(archive.is_closed());

    assert!(matches!(archive.get_data("x"), Err(Error::Closed)));
    assert!(matches!(archive.get_resource("x"), Err(Error::Closed)));
    assert!(matches!(
        archive.process_resources("", |_| true, |_| Ok(())),
        Err(Error::Closed)
    ));

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_empty_inputs() {
    let tmp = tempfile::tempdir().unwrap();
    let zero = tmp.path().join("zero.zip");
    std::fs::write(&zero, b"").unwrap();

    let archive = Archive::open(&zero).unwrap();
    assert_eq!(archive.kind(), ArchiveKind::Empty);
    assert!(archive.get_data("anything").unwrap().is_none());

    let no_entries = write_archive(tmp.path(), "none.zip", ArchiveWriter::new());
    let mut archive = Archive::open(&no_entries).unwrap();
    assert_eq!(archive.kind(), ArchiveKind::Empty);
    assert!(archive.is_empty());
    archive.close();
    assert!(matches!(archive.get_data("anything"), Err(Error::Closed)));
}

#[test]
fn test_garbage_is_rejected() {
    let result = Archive::from_bytes(vec![0x5A; 1024], &LoadOptions::default());
    assert!(matches!(result, Err(Error::EocdNotFound)));

    let result = Archive::from_bytes(b"PK".to_vec(), &LoadOptions::default());
    assert!(matches!(result, Err(Error::NotAnArchive(_))));
}

#[test]
fn test_forced_zip64_end_records() {
    let mut writer = ArchiveWriter::new().with_zip64(true);
    writer.add_file("a", b"alpha", CompressionMethod::Deflate).unwrap();
    writer.add_file("b", b"beta", CompressionMethod::Store).unwrap();
    let bytes = writer.build().unwrap();
    assert!(read_trailer(&bytes).unwrap().zip64);

    let archive = Archive::from_bytes(bytes, &LoadOptions::default()).unwrap();
    assert_eq!(archive.get_data("a").unwrap().unwrap(), b"alpha");
    assert_eq!(archive.get_data("b").unwrap().unwrap(), b"beta");
}

#[test]
fn test_entry_count_past_16_bits() {
    let count = 0x1_0005;
    let mut writer = ArchiveWriter::new();
    for i in 0..count {
        writer
            .add_file(&format!("f/{:05x}", i), &[], CompressionMethod::Store)
            .unwrap();
    }
    writer.add_file("last.txt", b"end", CompressionMethod::Store).unwrap();
    let bytes = writer.build().unwrap();

    let trailer = read_trailer(&bytes).unwrap();
    assert!(trailer.zip64);
    assert_eq!(trailer.entry_count as usize, count + 1);

    let archive = Archive::from_bytes(bytes, &LoadOptions::default()).unwrap();
    assert_eq!(archive.len(), count + 1);
    assert_eq!(archive.get_data("last.txt").unwrap().unwrap(), b"end");
    assert_eq!(archive.get_data("f/0ffff").unwrap().unwrap(), b"");
}

#[test]
fn test_extra_field_limit_is_configurable() {
    let mut writer = ArchiveWriter::new();
    writer
        .add_file_with_extra("padded", b"data", CompressionMethod::Store, &[0u8; 200])
        .unwrap();
    let bytes = writer.build().unwrap();

    let strict = Archive::from_bytes(bytes.clone(), &LoadOptions::default()).unwrap();
    assert!(matches!(
        strict.get_data("padded"),
        Err(Error::ExtraFieldTooLarge { length: 200, limit: 128, .. })
    ));

    let options = LoadOptions::default().with_max_extra_field_length(256);
    let relaxed = Archive::from_bytes(bytes, &options).unwrap();
    assert_eq!(relaxed.get_data("padded").unwrap().unwrap(), b"data");
}

#[test]
fn test_buffered_mode_reads_identically() {
    let tmp = tempfile::tempdir().unwrap();
    let mut writer = ArchiveWriter::new();
    writer.add_file("one", b"1", CompressionMethod::Deflate).unwrap();
    let path = write_archive(tmp.path(), "buffered.zip", writer);

    let options = LoadOptions::default().with_map_mode(MapMode::Buffered);
    let archive = Archive::open_with_options(&path, &options).unwrap();
    assert!(!archive.is_mapped());
    assert_eq!(archive.get_data("one").unwrap().unwrap(), b"1");
}

#[test]
fn test_process_resources_filters_and_stops() {
    let mut writer = ArchiveWriter::new();
    for name in ["res/a.txt", "res/b.png", "res/sub/c.txt", "resources/d.txt", "top.txt"] {
        writer
            .add_file(name, name.as_bytes(), CompressionMethod::Deflate)
            .unwrap();
    }
    writer.add_directory("res/sub").unwrap();
    let archive = Archive::from_bytes(writer.build().unwrap(), &LoadOptions::default()).unwrap();

    assert_eq!(collect(&archive, "res"), vec!["res/a.txt", "res/b.png", "res/sub/c.txt"]);
    assert_eq!(collect(&archive, "").len(), 5);

    let mut texts = Vec::new();
    archive
        .process_resources("res/", |name| name.ends_with(".txt"), |resource| {
            texts.push(resource.data()?);
            Ok(())
        })
        .unwrap();
    assert_eq!(texts, vec![b"res/a.txt".to_vec(), b"res/sub/c.txt".to_vec()]);

    let mut visited = 0;
    let result = archive.process_resources("", |_| true, |_| {
        visited += 1;
        Err(Error::NoData("stop".into()))
    });
    assert!(matches!(result, Err(Error::NoData(_))));
    assert_eq!(visited, 1);
}

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_archives_are_shareable() {
    assert_send_sync::<Archive>();
    assert_send_sync::<mapzip_archive::CentralDirectoryArchive>();
    assert_send_sync::<mapzip_archive::IndexedArchive>();
}

#[test]
fn test_concurrent_reads_resolve_once() {
    // Local-only extra fields defeat the offset prediction, so every entry
    // starts unresolved and threads race to resolve it.
    let names: Vec<String> = (0..16).map(|i| format!("lazy/{:02}.bin", i)).collect();
    let contents: Vec<Vec<u8>> = (0..16u8)
        .map(|i| std::iter::repeat(i).take(512 + i as usize).collect())
        .collect();
    let mut writer = ArchiveWriter::new();
    for (i, (name, data)) in names.iter().zip(&contents).enumerate() {
        let method = if i % 2 == 0 { CompressionMethod::Store } else { CompressionMethod::Deflate };
        writer.add_file_with_extra(name, data, method, &[0u8; 8]).unwrap();
    }
    let archive = Archive::from_bytes(writer.build().unwrap(), &LoadOptions::default()).unwrap();

    let entries = archive.as_central_directory().unwrap().entries();
    assert!(entries.iter().all(|entry| entry.resolved_data_offset().is_none()));

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for (name, data) in names.iter().zip(&contents) {
                    assert_eq!(&archive.get_data(name).unwrap().unwrap(), data);
                    let buffer = archive.get_byte_buffer(name).unwrap().unwrap();
                    assert_eq!(&*buffer, &data[..]);
                }
            });
        }
    });

    for entry in archive.as_central_directory().unwrap().entries() {
        let expected = entry.header_offset() as i64 + 30 + entry.name().len() as i64 + 8;
        assert_eq!(entry.resolved_data_offset(), Some(expected));
    }
}

#[cfg(feature = "parallel")]
#[test]
fn test_read_parallel() {
    let mut writer = ArchiveWriter::new();
    for i in 0..64 {
        writer
            .add_file(&format!("p/{}", i), format!("{}", i).as_bytes(), CompressionMethod::Deflate)
            .unwrap();
    }
    let archive = Archive::from_bytes(writer.build().unwrap(), &LoadOptions::default()).unwrap();

    let names: Vec<String> = (0..64).map(|i| format!("p/{}", i)).collect();
    let paths: Vec<&str> = names.iter().map(String::as_str).collect();
    for (i, result) in archive.read_parallel(&paths).into_iter().enumerate() {
        assert_eq!(result.unwrap().unwrap(), format!("{}", i).as_bytes());
    }
}
