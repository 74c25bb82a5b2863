//! Helpers shared by unit tests.

use std::io::{Cursor, Write};

use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

/// Builds an in-memory zip. Names ending in `/` become directory entries.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, body) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).expect("add directory");
        } else {
            writer.start_file(*name, options).expect("start file");
            writer.write_all(body).expect("write entry");
        }
    }
    writer.finish().expect("finish zip").into_inner()
}

/// 25 files across three extensions (`.py`, `.md` and none), one
/// `unit_test.py` and one `README`, all under a single `pkg/` directory.
pub fn rich_project_entries() -> Vec<(String, Vec<u8>)> {
    let mut entries = vec![
        ("pkg/unit_test.py".to_string(), b"assert True".to_vec()),
        ("pkg/README".to_string(), b"docs".to_vec()),
        ("pkg/notes.md".to_string(), b"# notes".to_vec()),
    ];
    for i in 0..22 {
        entries.push((format!("pkg/mod_{i}.py"), format!("x = {i}").into_bytes()));
    }
    entries
}

pub fn zip_owned(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let borrowed: Vec<(&str, &[u8])> = entries
        .iter()
        .map(|(n, b)| (n.as_str(), b.as_slice()))
        .collect();
    zip_bytes(&borrowed)
}
