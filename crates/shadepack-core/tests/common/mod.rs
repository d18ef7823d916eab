//! Shared fixtures: a tiny class-file assembler and jar/tree helpers.

#![allow(dead_code)]

mod class_builder;

pub use class_builder::ClassBuilder;

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;

/// Utf8 constants by pool index, plus the name index of every Class entry.
fn scan_pool(class: &[u8]) -> (HashMap<u16, String>, Vec<u16>) {
    let count = u16::from_be_bytes([class[8], class[9]]);
    let mut pos = 10;
    let mut utf8s = HashMap::new();
    let mut classes = Vec::new();
    let mut index = 1;
    while index < count {
        let tag = class[pos];
        pos += 1;
        match tag {
            1 => {
                let len = u16::from_be_bytes([class[pos], class[pos + 1]]) as usize;
                let text = String::from_utf8(class[pos + 2..pos + 2 + len].to_vec()).unwrap();
                utf8s.insert(index, text);
                pos += 2 + len;
            }
            7 => {
                classes.push(u16::from_be_bytes([class[pos], class[pos + 1]]));
                pos += 2;
            }
            8 | 16 | 19 | 20 => pos += 2,
            15 => pos += 3,
            3 | 4 | 9 | 10 | 11 | 12 | 17 | 18 => pos += 4,
            5 | 6 => {
                pos += 8;
                index += 1;
            }
            other => panic!("unexpected tag {other}"),
        }
        index += 1;
    }
    (utf8s, classes)
}

/// Every Utf8 constant in a class file.
pub fn utf8_constants(class: &[u8]) -> Vec<String> {
    let (utf8s, _) = scan_pool(class);
    let mut out: Vec<String> = utf8s.into_values().collect();
    out.sort();
    out
}

/// Names of every `CONSTANT_Class` entry, sorted.
pub fn class_names(class: &[u8]) -> Vec<String> {
    let (utf8s, classes) = scan_pool(class);
    let mut out: Vec<String> = classes.iter().map(|i| utf8s[i].clone()).collect();
    out.sort();
    out
}

/// Write `files` as a stored zip at `path`, in the given order.
pub fn write_jar(path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for (name, content) in files {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap();
}

/// Write `files` under `root`, creating parents.
pub fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
    for (name, content) in files {
        let path = root.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

/// (name, content) of every entry of a jar, in archive order.
pub fn read_jar(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..zip.len())
        .map(|i| {
            let mut file = zip.by_index(i).unwrap();
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            (file.name().to_string(), content)
        })
        .collect()
}
