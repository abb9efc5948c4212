#![forbid(unsafe_code)]

/// hashfs signature, `0x23534353` little-endian.
pub const HASHFS_MAGIC: [u8; 4] = *b"SCS#";

/// Hash method of every known hashfs archive, `0x59544943` little-endian.
pub const HASHFS_METHOD_CITY: [u8; 4] = *b"CITY";

pub const HASHFS_V1: u16 = 1;
pub const HASHFS_V2: u16 = 2;

pub const ZIP_LOCAL_MAGIC: [u8; 4] = *b"PK\x03\x04";
pub const ZIP_CENTRAL_MAGIC: [u8; 4] = *b"PK\x01\x02";
pub const ZIP_EOCD_MAGIC: [u8; 4] = *b"PK\x05\x06";

/// hashfs v1 layout:
/// - header (32 bytes):
///   - [u32 signature]
///   - [u16 version]
///   - [u16 salt]
///   - [u32 hash method]
///   - [u32 entry_count]
///   - [u64 entry_table_offset]
///   - [u64 auth_offset]
/// - entry table, `entry_count` records of 32 bytes:
///   - [u64 hash]
///   - [u64 data_offset]
///   - [u32 flags]
///   - [u32 crc32]
///   - [u32 size]
///   - [u32 compressed_size]
#[derive(Debug, Clone, Copy)]
pub(crate) struct HashfsHeader {
    pub version: u16,
    pub salt: u16,
    pub method: [u8; 4],
    pub entry_count: u32,
    pub entry_table_offset: u64,
}

pub(crate) const HASHFS_HEADER_LEN: usize = 32;
pub(crate) const HASHFS_ENTRY_LEN: usize = 32;

#[derive(Debug, Clone, Copy)]
pub(crate) struct HashfsEntry {
    pub hash: u64,
    pub offset: u64,
    pub flags: EntryFlags,
    pub size: u32,
    pub compressed_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EntryFlags(pub u32);

impl EntryFlags {
    pub const DIRECTORY: u32 = 1 << 0;
    pub const COMPRESSED: u32 = 1 << 1;
    pub const ENCRYPTED: u32 = 1 << 3;

    pub fn is_directory(self) -> bool {
        self.0 & Self::DIRECTORY != 0
    }

    pub fn is_compressed(self) -> bool {
        self.0 & Self::COMPRESSED != 0
    }

    pub fn is_encrypted(self) -> bool {
        self.0 & Self::ENCRYPTED != 0
    }
}

/// hashfs v2 layout:
/// - header (53 bytes, packed):
///   - [u32 signature] [u16 version] [u16 salt] [u32 hash method]
///   - [u32 entry_count] [u32 entries_compressed_size]
///   - [u32 metadata_count] [u32 metadata_compressed_size]
///   - [u64 entries_offset] [u64 metadata_offset] [u64 auth_offset]
///   - [u8 platform]
/// - entry table, zlib, `entry_count` records of 16 bytes:
///   - [u64 hash] [u32 meta_index] [u16 meta_count] [u8 flags] [u8 pad]
/// - metadata table, zlib, `metadata_count` u32 words. An entry owns
///   `meta_count` header words from `meta_index`, each `index:24 | kind:8`;
///   the body of a header starts at word `index`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HashfsV2Header {
    pub salt: u16,
    pub entry_count: u32,
    pub entries_compressed_size: u32,
    pub metadata_count: u32,
    pub metadata_compressed_size: u32,
    pub entries_offset: u64,
    pub metadata_offset: u64,
    pub platform: u8,
}

pub(crate) const HASHFS_V2_HEADER_LEN: usize = 53;
pub(crate) const HASHFS_V2_ENTRY_LEN: usize = 16;

#[derive(Debug, Clone, Copy)]
pub(crate) struct HashfsV2Entry {
    pub hash: u64,
    pub meta_index: u32,
    pub meta_count: u16,
    pub flags: u8,
}

impl HashfsV2Entry {
    pub const DIRECTORY: u8 = 1 << 0;

    pub fn is_directory(self) -> bool {
        self.flags & Self::DIRECTORY != 0
    }
}

/// Metadata kinds that locate entry data. Image and sampler metadata only
/// describe textures and carry no data of their own.
pub(crate) const META_PLAIN: u8 = 128;
pub(crate) const META_DIRECTORY: u8 = 129;

/// Plain/directory metadata body, 4 words:
/// - [compressed_size:28 | compress_type:4]
/// - [size:28 | flags:4]
/// - [u32 unused]
/// - [u32 offset >> 4]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MetaPlain {
    pub compressed_size: u32,
    pub compress_type: u8,
    pub size: u32,
    pub offset: u64,
}

pub(crate) const META_PLAIN_WORDS: usize = 4;
pub(crate) const META_SIZE_MASK: u32 = 0x0FFF_FFFF;
pub(crate) const META_COMPRESS_NONE: u8 = 0;
pub(crate) const META_COMPRESS_ZLIB: u8 = 1;

pub(crate) const ZIP_LOCAL_LEN: usize = 30;
pub(crate) const ZIP_CENTRAL_LEN: usize = 46;
pub(crate) const ZIP_EOCD_LEN: usize = 22;
/// EOCD plus the longest possible archive comment.
pub(crate) const ZIP_EOCD_SEARCH: usize = ZIP_EOCD_LEN + u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub(crate) enum ZipMethod {
    Stored = 0,
    Deflate = 8,
}

impl ZipMethod {
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::Stored),
            8 => Some(Self::Deflate),
            _ => None,
        }
    }
}

/// Central directory flag bit: traditional or strong encryption.
pub(crate) const ZIP_FLAG_ENCRYPTED: u16 = 1 << 0;
/// Size fields saturated to this value move to a ZIP64 extra block.
pub(crate) const ZIP64_MARKER: u32 = u32::MAX;
