#![forbid(unsafe_code)]

//! In-memory archive builders for tests.

use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::Compression;
use std::io::Write;

use crate::pak::format::{
    EntryFlags, HashfsV2Entry, HASHFS_ENTRY_LEN, HASHFS_HEADER_LEN, HASHFS_MAGIC, HASHFS_METHOD_CITY,
    HASHFS_V1, HASHFS_V2, HASHFS_V2_HEADER_LEN, META_COMPRESS_NONE, META_COMPRESS_ZLIB,
    META_DIRECTORY, META_PLAIN, ZIP_CENTRAL_MAGIC, ZIP_EOCD_MAGIC, ZIP_LOCAL_MAGIC,
};
use crate::pak::hash::hash;

struct HashfsItem {
    hash: u64,
    flags: u32,
    size: u32,
    stored: Vec<u8>,
}

pub(crate) struct HashfsBuilder {
    salt: u16,
    version: u16,
    method: [u8; 4],
    items: Vec<HashfsItem>,
}

impl HashfsBuilder {
    pub fn new(salt: u16) -> Self {
        Self {
            salt,
            version: HASHFS_V1,
            method: HASHFS_METHOD_CITY,
            items: Vec::new(),
        }
    }

    pub fn version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    pub fn method(mut self, method: [u8; 4]) -> Self {
        self.method = method;
        self
    }

    fn push(mut self, path: &str, flags: u32, content: &[u8], stored: Vec<u8>) -> Self {
        self.items.push(HashfsItem {
            hash: hash(path.as_bytes(), self.salt),
            flags,
            size: content.len() as u32,
            stored,
        });
        self
    }

    pub fn file(self, path: &str, content: &[u8]) -> Self {
        self.push(path, 0, content, content.to_vec())
    }

    pub fn compressed_file(self, path: &str, content: &[u8]) -> Self {
        self.push(path, EntryFlags::COMPRESSED, content, zlib(content))
    }

    pub fn encrypted_file(self, path: &str, content: &[u8]) -> Self {
        self.push(path, EntryFlags::ENCRYPTED, content, content.to_vec())
    }

    /// Listing lines as they appear on disk: `*name` for sub-directories.
    pub fn dir(self, path: &str, listing: &[&str]) -> Self {
        let content: Vec<u8> = listing.iter().flat_map(|l| format!("{l}\n").into_bytes()).collect();
        self.push(path, EntryFlags::DIRECTORY, &content, content.clone())
    }

    pub fn build(self) -> Vec<u8> {
        let data_len: usize = self.items.iter().map(|i| i.stored.len()).sum();
        let table_offset = (HASHFS_HEADER_LEN + data_len) as u64;

        let mut out = Vec::with_capacity(table_offset as usize + self.items.len() * HASHFS_ENTRY_LEN);
        out.extend_from_slice(&HASHFS_MAGIC);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.salt.to_le_bytes());
        out.extend_from_slice(&self.method);
        out.extend_from_slice(&(self.items.len() as u32).to_le_bytes());
        out.extend_from_slice(&table_offset.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());

        let mut offsets = Vec::with_capacity(self.items.len());
        for item in &self.items {
            offsets.push(out.len() as u64);
            out.extend_from_slice(&item.stored);
        }
        for (item, offset) in self.items.iter().zip(offsets) {
            out.extend_from_slice(&item.hash.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(&item.flags.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&item.size.to_le_bytes());
            out.extend_from_slice(&(item.stored.len() as u32).to_le_bytes());
        }
        out
    }
}

fn zlib(content: &[u8]) -> Vec<u8> {
    let mut z = ZlibEncoder::new(Vec::new(), Compression::default());
    z.write_all(content).expect("zlib into memory");
    z.finish().expect("zlib into memory")
}

/// Image metadata kind; carries no data location.
const META_IMAGE: u8 = 1;

struct HashfsV2Item {
    hash: u64,
    directory: bool,
    kind: u8,
    compress_type: u8,
    size: u32,
    stored: Vec<u8>,
}

pub(crate) struct HashfsV2Builder {
    salt: u16,
    items: Vec<HashfsV2Item>,
}

impl HashfsV2Builder {
    pub fn new(salt: u16) -> Self {
        Self { salt, items: Vec::new() }
    }

    fn push(mut self, path: &str, kind: u8, compress_type: u8, content: &[u8], stored: Vec<u8>) -> Self {
        self.items.push(HashfsV2Item {
            hash: hash(path.as_bytes(), self.salt),
            directory: kind == META_DIRECTORY,
            kind,
            compress_type,
            size: content.len() as u32,
            stored,
        });
        self
    }

    pub fn file(self, path: &str, content: &[u8]) -> Self {
        self.push(path, META_PLAIN, META_COMPRESS_NONE, content, content.to_vec())
    }

    pub fn compressed_file(self, path: &str, content: &[u8]) -> Self {
        self.push(path, META_PLAIN, META_COMPRESS_ZLIB, content, zlib(content))
    }

    /// Same listing lines as `HashfsBuilder::dir`, stored in the binary form.
    pub fn dir(self, path: &str, listing: &[&str]) -> Self {
        let names: Vec<String> = listing
            .iter()
            .map(|l| match l.strip_prefix('*') {
                Some(d) => format!("/{d}"),
                None => l.to_string(),
            })
            .collect();
        let mut content = (names.len() as u32).to_le_bytes().to_vec();
        content.extend(names.iter().map(|n| n.len() as u8));
        for n in &names {
            content.extend_from_slice(n.as_bytes());
        }
        self.push(path, META_DIRECTORY, META_COMPRESS_NONE, &content, content.clone())
    }

    /// Texture entry described only by image metadata.
    pub fn image(self, path: &str) -> Self {
        self.push(path, META_IMAGE, META_COMPRESS_NONE, b"", Vec::new())
    }

    pub fn build(self) -> Vec<u8> {
        let mut data = Vec::new();
        let mut entries = Vec::new();
        let mut meta: Vec<u32> = Vec::new();
        for item in &self.items {
            while (HASHFS_V2_HEADER_LEN + data.len()) % 16 != 0 {
                data.push(0);
            }
            let offset = (HASHFS_V2_HEADER_LEN + data.len()) as u32;
            data.extend_from_slice(&item.stored);

            let meta_index = meta.len() as u32;
            meta.push((meta_index + 1) | u32::from(item.kind) << 24);
            if item.kind == META_IMAGE {
                meta.extend([0, 0]);
            } else {
                meta.push(item.stored.len() as u32 | u32::from(item.compress_type) << 28);
                meta.push(item.size);
                meta.push(0);
                meta.push(offset >> 4);
            }

            entries.extend_from_slice(&item.hash.to_le_bytes());
            entries.extend_from_slice(&meta_index.to_le_bytes());
            entries.extend_from_slice(&1u16.to_le_bytes());
            entries.push(if item.directory { HashfsV2Entry::DIRECTORY } else { 0 });
            entries.push(0);
        }
        let meta_bytes: Vec<u8> = meta.iter().flat_map(|w| w.to_le_bytes()).collect();
        let entries = zlib(&entries);
        let meta_packed = zlib(&meta_bytes);

        let entries_offset = (HASHFS_V2_HEADER_LEN + data.len()) as u64;
        let metadata_offset = entries_offset + entries.len() as u64;

        let mut out = Vec::new();
        out.extend_from_slice(&HASHFS_MAGIC);
        out.extend_from_slice(&HASHFS_V2.to_le_bytes());
        out.extend_from_slice(&self.salt.to_le_bytes());
        out.extend_from_slice(&HASHFS_METHOD_CITY);
        out.extend_from_slice(&(self.items.len() as u32).to_le_bytes());
        out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        out.extend_from_slice(&(meta.len() as u32).to_le_bytes());
        out.extend_from_slice(&(meta_packed.len() as u32).to_le_bytes());
        out.extend_from_slice(&entries_offset.to_le_bytes());
        out.extend_from_slice(&metadata_offset.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());
        out.push(0);
        out.extend_from_slice(&data);
        out.extend_from_slice(&entries);
        out.extend_from_slice(&meta_packed);
        out
    }
}

struct ZipItem {
    name: String,
    method: u16,
    size: u32,
    stored: Vec<u8>,
}

#[derive(Default)]
pub(crate) struct ZipBuilder {
    items: Vec<ZipItem>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, content: &[u8]) -> Self {
        self.items.push(ZipItem {
            name: name.to_string(),
            method: 0,
            size: content.len() as u32,
            stored: content.to_vec(),
        });
        self
    }

    pub fn deflated(mut self, name: &str, content: &[u8]) -> Self {
        let mut d = DeflateEncoder::new(Vec::new(), Compression::default());
        d.write_all(content).expect("deflate into memory");
        self.items.push(ZipItem {
            name: name.to_string(),
            method: 8,
            size: content.len() as u32,
            stored: d.finish().expect("deflate into memory"),
        });
        self
    }

    pub fn dir(self, name: &str) -> Self {
        self.file(name, b"")
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut locals = Vec::with_capacity(self.items.len());
        for item in &self.items {
            locals.push(out.len() as u32);
            out.extend_from_slice(&ZIP_LOCAL_MAGIC);
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&item.method.to_le_bytes());
            out.extend_from_slice(&[0u8; 8]);
            out.extend_from_slice(&(item.stored.len() as u32).to_le_bytes());
            out.extend_from_slice(&item.size.to_le_bytes());
            out.extend_from_slice(&(item.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(item.name.as_bytes());
            out.extend_from_slice(&item.stored);
        }

        let cd_offset = out.len() as u32;
        for (item, local) in self.items.iter().zip(locals) {
            out.extend_from_slice(&ZIP_CENTRAL_MAGIC);
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&item.method.to_le_bytes());
            out.extend_from_slice(&[0u8; 8]);
            out.extend_from_slice(&(item.stored.len() as u32).to_le_bytes());
            out.extend_from_slice(&item.size.to_le_bytes());
            out.extend_from_slice(&(item.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&[0u8; 12]);
            out.extend_from_slice(&local.to_le_bytes());
            out.extend_from_slice(item.name.as_bytes());
        }
        let cd_size = out.len() as u32 - cd_offset;

        out.extend_from_slice(&ZIP_EOCD_MAGIC);
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&(self.items.len() as u16).to_le_bytes());
        out.extend_from_slice(&(self.items.len() as u16).to_le_bytes());
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }
}
