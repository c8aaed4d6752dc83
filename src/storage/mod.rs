use std::fmt::Debug;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::Result;
use crate::storage::page::PageId;

pub mod memory;
pub mod page;

/// The persistent page store consumed by the buffer pool. The store keeps
/// one fixed-size block of bytes per page id; it knows nothing about frames,
/// pins or eviction.
///
/// Methods take `&self` and implementations synchronize internally, so a
/// single store can back several independent pool shards. Calls may block;
/// the pool deliberately performs them while holding its latch so that
/// evict-then-install stays atomic from the caller's perspective.
///
/// Page id allocation is not part of the contract: the pool hands out fresh
/// ids itself with a monotone counter.
pub trait DiskManager: Debug + Send + Sync {
    /// Fill `buf` with the persisted contents of the page. A page that was
    /// never written, or has been deallocated, reads back as zeros.
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()>;

    /// Persist `data` as the new contents of the page.
    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()>;

    /// Reclaim the page's storage. Subsequent reads yield zeros.
    fn deallocate_page(&self, page_id: PageId) -> Result<()>;
}

#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Memory,
}

pub fn new_disk_manager(typ: StorageType) -> Result<Arc<dyn DiskManager>> {
    match typ {
        StorageType::Memory => Ok(Arc::new(memory::Memory::new())),
    }
}
