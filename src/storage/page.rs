use std::ops::Deref;
use std::sync::RwLock;

/// Identifier of a page in the backing page store.
pub type PageId = i64;

/// Identifier of a frame, i.e. the index of the frame in the buffer pool's
/// frame array. FrameId is in range [0, pool_size).
pub type FrameId = usize;

/// Size of a data page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Sentinel page id of a frame that holds no page. The sentinel stays inside
/// the frame metadata; public APIs surface absence as Option or bool.
pub const INVALID_PAGE_ID: PageId = -1;

/// The actual page data: in-memory metadata like the dirty bit and pin
/// count, plus the page-size byte buffer mirroring storage.
pub struct PageData {
    pub id: PageId,
    pub data: Vec<u8>,
    pub is_dirty: bool,
    pub pin_count: i32,
}

impl PageData {
    fn new() -> Self {
        Self {
            id: INVALID_PAGE_ID,
            data: vec![0; PAGE_SIZE],
            is_dirty: false,
            pin_count: 0,
        }
    }

    /// Return the frame to its empty state: sentinel id, clean, unpinned,
    /// zeroed buffer. The buffer is allocated once and never resized.
    pub fn reset(&mut self) {
        self.id = INVALID_PAGE_ID;
        self.is_dirty = false;
        self.pin_count = 0;
        self.data.fill(0);
    }
}

/// Page acts as the container of the actual page data. The RwLock is the
/// page-level latch: callers holding a pin take it to read or write the
/// page contents while the pool keeps the frame immovable.
pub struct Page {
    inner: RwLock<PageData>,
}

impl Page {
    /// Allocate an empty page frame with a zeroed PAGE_SIZE buffer.
    pub fn new() -> Self {
        Page { inner: RwLock::new(PageData::new()) }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Page {
    type Target = RwLock<PageData>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
