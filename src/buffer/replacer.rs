use std::collections::HashMap;
use std::sync::Mutex;

use log::{debug, warn};

use super::Replacer;
use crate::storage::page::FrameId;

/// Which of the two replacer lists a node currently lives in. Frames with
/// fewer than k recorded accesses stay in the history list; the k-th access
/// promotes them to the cache list.
#[derive(Clone, Copy, Debug, PartialEq)]
enum ListKind {
    History,
    Cache,
}

/// A tracked frame. The prev/next links are frame-id handles into the node
/// map, weaving the node into one of the two lists.
struct Node {
    access_count: usize,
    evictable: bool,
    list: ListKind,
    prev: Option<FrameId>,
    next: Option<FrameId>,
}

impl Node {
    fn new() -> Self {
        Node {
            access_count: 0,
            evictable: false,
            list: ListKind::History,
            prev: None,
            next: None,
        }
    }
}

/// Head and tail handles of one list. Head is the most recently accessed
/// node, tail the least recent.
#[derive(Default)]
struct List {
    head: Option<FrameId>,
    tail: Option<FrameId>,
}

/// LRUKReplacer implements the LRU-k replacement policy.
///
/// The LRU-k algorithm evicts a frame whose backward k-distance is maximum
/// of all frames. Backward k-distance is computed as the difference in time
/// between the current timestamp and the timestamp of the k-th previous
/// access. A frame with fewer than k historical references is given +inf as
/// its backward k-distance.
///
/// Frames below k accesses live in the history list and are preferred for
/// eviction, least recent first. Frames at or beyond k accesses live in the
/// cache list and are evicted from the tail once the history list has no
/// evictable node.
pub struct LRUKReplacer {
    k: usize,
    /// Capacity: the number of frames of the pool this replacer serves.
    replacer_size: usize,
    /// Number of evictable nodes across both lists.
    curr_size: usize,
    nodes: HashMap<FrameId, Node>,
    history: List,
    cache: List,
}

impl LRUKReplacer {
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k > 0, "replacer k must be larger than zero");
        LRUKReplacer {
            k,
            replacer_size: num_frames,
            curr_size: 0,
            nodes: HashMap::with_capacity(num_frames),
            history: List::default(),
            cache: List::default(),
        }
    }

    fn record_access(&mut self, frame_id: FrameId) {
        if !self.nodes.contains_key(&frame_id) {
            if self.nodes.len() == self.replacer_size {
                warn!(
                    "replacer full with {} tracked frames, dropping access to frame {}",
                    self.nodes.len(),
                    frame_id
                );
                return;
            }
            self.nodes.insert(frame_id, Node::new());
            self.attach_front(ListKind::History, frame_id);
            debug!("frame {} enters the history list", frame_id);
        }
        let node = self.nodes.get_mut(&frame_id).unwrap();
        node.access_count += 1;
        let count = node.access_count;
        if count == self.k {
            self.detach(frame_id);
            self.attach_front(ListKind::Cache, frame_id);
            debug!("frame {} moves from the history list to the cache list", frame_id);
        } else if count > self.k {
            self.detach(frame_id);
            self.attach_front(ListKind::Cache, frame_id);
        } else if count > 1 {
            self.detach(frame_id);
            self.attach_front(ListKind::History, frame_id);
        }
    }

    fn evict(&mut self) -> Option<FrameId> {
        if self.curr_size == 0 {
            debug!("there is no evictable frame");
            return None;
        }
        let frame_id = self
            .last_evictable(ListKind::History)
            .or_else(|| self.last_evictable(ListKind::Cache))?;
        self.detach(frame_id);
        self.nodes.remove(&frame_id);
        self.curr_size -= 1;
        debug!("evict frame {}, {} evictable frames left", frame_id, self.curr_size);
        Some(frame_id)
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        let node = match self.nodes.get_mut(&frame_id) {
            Some(node) => node,
            None => return,
        };
        if node.evictable == evictable {
            return;
        }
        node.evictable = evictable;
        if evictable {
            self.curr_size += 1;
        } else {
            self.curr_size -= 1;
        }
    }

    fn is_evictable(&self, frame_id: FrameId) -> bool {
        self.nodes.get(&frame_id).map_or(true, |node| node.evictable)
    }

    fn remove(&mut self, frame_id: FrameId) {
        match self.nodes.get(&frame_id) {
            Some(node) if node.evictable => {}
            _ => return,
        }
        self.detach(frame_id);
        self.nodes.remove(&frame_id);
        self.curr_size -= 1;
    }

    fn size(&self) -> usize {
        self.curr_size
    }

    fn list(&self, kind: ListKind) -> &List {
        match kind {
            ListKind::History => &self.history,
            ListKind::Cache => &self.cache,
        }
    }

    fn list_mut(&mut self, kind: ListKind) -> &mut List {
        match kind {
            ListKind::History => &mut self.history,
            ListKind::Cache => &mut self.cache,
        }
    }

    /// Link the node in front of the given list's head and stamp its list
    /// membership. The node must currently be detached.
    fn attach_front(&mut self, kind: ListKind, frame_id: FrameId) {
        let head = self.list(kind).head;
        if let Some(head_id) = head {
            if let Some(node) = self.nodes.get_mut(&head_id) {
                node.prev = Some(frame_id);
            }
        }
        if let Some(node) = self.nodes.get_mut(&frame_id) {
            node.prev = None;
            node.next = head;
            node.list = kind;
        }
        let list = self.list_mut(kind);
        list.head = Some(frame_id);
        if list.tail.is_none() {
            list.tail = Some(frame_id);
        }
    }

    /// Unlink the node from whichever list it is on, fixing up the
    /// neighbours and the list's head/tail handles.
    fn detach(&mut self, frame_id: FrameId) {
        let (kind, prev, next) = match self.nodes.get(&frame_id) {
            Some(node) => (node.list, node.prev, node.next),
            None => return,
        };
        match prev {
            Some(prev_id) => {
                if let Some(node) = self.nodes.get_mut(&prev_id) {
                    node.next = next;
                }
            }
            None => self.list_mut(kind).head = next,
        }
        match next {
            Some(next_id) => {
                if let Some(node) = self.nodes.get_mut(&next_id) {
                    node.prev = prev;
                }
            }
            None => self.list_mut(kind).tail = prev,
        }
    }

    fn last_evictable(&self, kind: ListKind) -> Option<FrameId> {
        let mut cursor = self.list(kind).tail;
        while let Some(frame_id) = cursor {
            let node = &self.nodes[&frame_id];
            if node.evictable {
                return Some(frame_id);
            }
            cursor = node.prev;
        }
        None
    }
}

/// SyncLRUKReplacer is the thread-safe version of the LRU-k replacement
/// policy, all the heavy lifting happens in the LRUKReplacer.
pub struct SyncLRUKReplacer {
    inner: Mutex<LRUKReplacer>,
}

impl SyncLRUKReplacer {
    pub fn new(num_frames: usize, k: usize) -> Self {
        let inner = Mutex::new(LRUKReplacer::new(num_frames, k));
        SyncLRUKReplacer { inner }
    }
}

impl Replacer for SyncLRUKReplacer {
    fn record_access(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock().unwrap();
        guard.record_access(frame_id)
    }

    fn evict(&self) -> Option<FrameId> {
        let mut guard = self.inner.lock().unwrap();
        guard.evict()
    }

    fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let mut guard = self.inner.lock().unwrap();
        guard.set_evictable(frame_id, evictable)
    }

    fn is_evictable(&self, frame_id: FrameId) -> bool {
        let guard = self.inner.lock().unwrap();
        guard.is_evictable(frame_id)
    }

    fn remove(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock().unwrap();
        guard.remove(frame_id)
    }

    fn size(&self) -> usize {
        let guard = self.inner.lock().unwrap();
        guard.size()
    }
}
