use crate::header::{matches, Tag};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct Entry {
    tag: Tag,
    size: u64,
}

/// Shadow log of a single peer's point-to-point sends that have not yet been
/// matched by that peer's receive. Used only when deadlock detection is
/// enabled. A LIFO stack: `push` prepends, `pop` removes the
/// first match found scanning from the head.
///
/// Touched only by the owning process's own thread: `push` on send, `pop`
/// while the same thread is consuming a `REQUEST` entry out of one of its
/// Inboxes. The `Mutex` here is not about cross-thread sharing of a single
/// Outbox across threads; it exists so `Outbox` can live behind
/// the same `Arc<World>` as everything else without a second ownership
/// story. In practice it is never contended.
#[derive(Debug, Default)]
pub struct Outbox {
    entries: Mutex<Vec<Entry>>,
}

impl Outbox {
    #[inline]
    pub fn new() -> Outbox {
        Outbox {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Prepend a node recording a successful send. Never fails.
    #[inline]
    pub fn push(&self, tag: Tag, size: u64) {
        self.entries.lock().unwrap().push(Entry { tag, size });
    }

    /// Linear search from the head; remove and report the first entry whose
    /// `(size, tag)` matches.
    pub fn pop(&self, tag: Tag, size: u64) -> bool {
        let mut entries = self.entries.lock().unwrap();
        if let Some(pos) = entries
            .iter()
            .rposition(|e| matches(e.size, e.tag, size, tag))
        {
            entries.remove(pos);
            true
        } else {
            false
        }
    }

    /// Free all remaining nodes.
    #[inline]
    pub fn destroy(&self) {
        self.entries.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_finds_and_removes_matching_entry() {
        let outbox = Outbox::new();
        outbox.push(Tag(1), 4);
        outbox.push(Tag(2), 8);

        assert!(outbox.pop(Tag(2), 8));
        assert!(!outbox.pop(Tag(2), 8));
        assert!(outbox.pop(Tag(1), 4));
    }

    #[test]
    fn pop_respects_wildcard() {
        let outbox = Outbox::new();
        outbox.push(Tag(5), 4);
        assert!(outbox.pop(Tag::ANY, 4));
    }

    #[test]
    fn pop_rejects_size_mismatch() {
        let outbox = Outbox::new();
        outbox.push(Tag(5), 4);
        assert!(!outbox.pop(Tag(5), 8));
    }

    #[test]
    fn destroy_clears_all_entries() {
        let outbox = Outbox::new();
        outbox.push(Tag(1), 1);
        outbox.push(Tag(2), 2);
        outbox.destroy();
        assert!(!outbox.pop(Tag(1), 1));
        assert!(!outbox.pop(Tag(2), 2));
    }
}
