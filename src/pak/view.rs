#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;

/// Read-only window into a shared container buffer. Cloning never copies bytes.
#[derive(Clone)]
pub struct DataView {
    source: Arc<[u8]>,
    offset: usize,
    len: usize,
}

impl DataView {
    /// `None` when the window does not fit inside `source`.
    pub fn new(source: Arc<[u8]>, offset: u64, len: u64) -> Option<Self> {
        let offset = usize::try_from(offset).ok()?;
        let len = usize::try_from(len).ok()?;
        if offset.checked_add(len)? > source.len() {
            return None;
        }
        Some(Self { source, offset, len })
    }

    pub fn whole(source: Arc<[u8]>) -> Self {
        let len = source.len();
        Self {
            source,
            offset: 0,
            len,
        }
    }

    pub fn empty() -> Self {
        Self::whole(Arc::from(Vec::new()))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.source[self.offset..self.offset + self.len]
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for DataView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataView")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}
