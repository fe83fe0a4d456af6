// src/packages/fixtures.rs

//! Builders for synthetic .deb files used by unit tests

use super::DataCompression;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// One entry of a synthetic data.tar
pub(crate) enum TarEntry<'a> {
    File(&'a str, &'a [u8]),
    Dir(&'a str),
    Symlink(&'a str, &'a str),
}

/// Uncompressed tar stream holding `entries`
pub(crate) fn tar_bytes(entries: &[TarEntry<'_>]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    for entry in entries {
        let mut header = tar::Header::new_gnu();
        match entry {
            TarEntry::File(path, content) => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(0o644);
                header.set_size(content.len() as u64);
                builder.append_data(&mut header, path, *content).unwrap();
            }
            TarEntry::Dir(path) => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder.append_data(&mut header, path, io::empty()).unwrap();
            }
            TarEntry::Symlink(path, target) => {
                header.set_entry_type(tar::EntryType::Symlink);
                header.set_mode(0o777);
                header.set_size(0);
                builder.append_link(&mut header, path, target).unwrap();
            }
        }
    }

    builder.into_inner().unwrap()
}

/// Compress `data` the way the matching data member would be
pub(crate) fn compress(compression: DataCompression, data: Vec<u8>) -> Vec<u8> {
    match compression {
        DataCompression::Xz => {
            let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
            encoder.write_all(&data).unwrap();
            encoder.finish().unwrap()
        }
        DataCompression::Zstd => zstd::encode_all(&data[..], 0).unwrap(),
        DataCompression::Gzip => {
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&data).unwrap();
            encoder.finish().unwrap()
        }
        DataCompression::Bzip2 => {
            let mut encoder =
                bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
            encoder.write_all(&data).unwrap();
            encoder.finish().unwrap()
        }
    }
}

/// Write an AR archive with the given members
pub(crate) fn write_ar(path: &Path, members: &[(&str, Vec<u8>)]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut builder = ar::Builder::new(File::create(path).unwrap());
    for (name, data) in members {
        let header = ar::Header::new(name.as_bytes().to_vec(), data.len() as u64);
        builder.append(&header, &data[..]).unwrap();
    }
}

/// Write a .deb whose payload holds `entries`
pub(crate) fn write_deb(path: &Path, compression: DataCompression, entries: &[TarEntry<'_>]) {
    let control = compress(DataCompression::Gzip, tar_bytes(&[]));
    let data = compress(compression, tar_bytes(entries));
    write_ar(
        path,
        &[
            ("debian-binary", b"2.0\n".to_vec()),
            ("control.tar.gz", control),
            (compression.member_name(), data),
        ],
    );
}
