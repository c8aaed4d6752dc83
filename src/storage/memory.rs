use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::Result;
use crate::storage::page::PageId;
use crate::storage::DiskManager;

/// An in-memory page store, mainly for tests and ephemeral pools. Pages
/// live in a map keyed by page id; reading a page that was never written,
/// or that has been deallocated, fills the buffer with zeros.
#[derive(Debug)]
pub struct Memory {
    pages: RwLock<HashMap<PageId, Vec<u8>>>,
}

impl Memory {
    pub fn new() -> Memory {
        Memory { pages: RwLock::new(HashMap::new()) }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskManager for Memory {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        let pages = self.pages.read()?;
        match pages.get(&page_id) {
            Some(data) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                buf[n..].fill(0);
            }
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        let mut pages = self.pages.write()?;
        pages.insert(page_id, data.to_vec());
        Ok(())
    }

    fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        let mut pages = self.pages.write()?;
        pages.remove(&page_id);
        Ok(())
    }
}
