use crate::storage::page::FrameId;

pub mod bufferpool;
pub mod pagetable;
pub mod replacer;

/// Replacer tracks frame usage for replacement in case the buffer pool is
/// full. The pool depends only on this capability set, not on a concrete
/// replacement policy.
pub trait Replacer: Send + Sync {
    /// Record the event that the given frame id is accessed at current
    /// timestamp. Create a new entry for access history if frame id has not
    /// been seen before.
    fn record_access(&self, frame_id: FrameId);

    /// Find the frame to evict with the replacement policy (e.g. backward
    /// k-distance). Only frames that are marked as evictable are candidates
    /// for eviction.
    ///
    /// Successful eviction of a frame decrements the size of the replacer
    /// and removes the frame's access history.
    ///
    /// Return the frame id if a frame is evicted successfully, None if no
    /// frame can be evicted.
    fn evict(&self) -> Option<FrameId>;

    /// Toggle whether a frame is evictable or non-evictable. This function
    /// also controls the replacer size. Note that size is equal to the
    /// number of evictable entries.
    ///
    /// If a frame was previously evictable and is to be set to
    /// non-evictable, then size decrements. If a frame was previously
    /// non-evictable and is to be set evictable, then size increments.
    fn set_evictable(&self, frame_id: FrameId, evictable: bool);

    /// Check if a frame is evictable. If the frame is not found, return true.
    fn is_evictable(&self, frame_id: FrameId) -> bool;

    /// Remove an evictable frame from the replacer, along with its access
    /// history, decrementing the replacer size if removal succeeds.
    ///
    /// Note that this is different from evicting a frame: no replacement
    /// policy is applied, the specified frame is removed no matter what its
    /// position is. If remove is called on a non-evictable frame, or the
    /// frame is not found, do nothing.
    fn remove(&self, frame_id: FrameId);

    /// Replacer size, the number of evictable frames.
    fn size(&self) -> usize;
}
