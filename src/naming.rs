//! Display-name allocation for blocks.
//!
//! Names look like `"GAIN 2"`: the kind label plus a per-kind counter that
//! never decreases and is never reused within one diagram's lifetime, so
//! freshly created blocks can never collide with live names without rescanning
//! the diagram. After a document load the allocator must be resynchronized
//! from the loaded names; wire endpoints are resolved by name, so a collision
//! here would corrupt later saves.

use std::collections::HashMap;

use crate::block::BlockKind;

/// Per-kind monotone name counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameAllocator {
    counters: HashMap<BlockKind, u32>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next display name for `kind`, advancing its counter.
    pub fn next_name(&mut self, kind: BlockKind) -> String {
        let counter = self.counters.entry(kind).or_insert(0);
        *counter += 1;
        format!("{} {}", kind.label(), counter)
    }

    /// Clear all counters. Used when starting a new, empty diagram.
    pub fn reset(&mut self) {
        self.counters.clear();
    }

    /// Resynchronize from names already present in a loaded diagram.
    ///
    /// For every name of the form `"{KIND} {n}"` the matching counter is
    /// raised to at least `n`, so subsequently allocated names cannot collide
    /// with loaded ones. Names that do not match the pattern are ignored.
    pub fn resync<'a>(&mut self, names: impl IntoIterator<Item = (BlockKind, &'a str)>) {
        for (kind, name) in names {
            let prefix = kind.label();
            let suffix = match name.strip_prefix(prefix).and_then(|r| r.strip_prefix(' ')) {
                Some(s) => s,
                None => continue,
            };
            if let Ok(n) = suffix.parse::<u32>() {
                let counter = self.counters.entry(kind).or_insert(0);
                *counter = (*counter).max(n);
            }
        }
    }

    /// Snapshot of the counters, used by the clear command to restore them on undo.
    pub(crate) fn counters(&self) -> HashMap<BlockKind, u32> {
        self.counters.clone()
    }

    pub(crate) fn restore(&mut self, counters: HashMap<BlockKind, u32>) {
        self.counters = counters;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_sequential_per_kind() {
        let mut alloc = NameAllocator::new();
        assert_eq!(alloc.next_name(BlockKind::Step), "STEP 1");
        assert_eq!(alloc.next_name(BlockKind::Gain), "GAIN 1");
        assert_eq!(alloc.next_name(BlockKind::Step), "STEP 2");
    }

    #[test]
    fn counter_not_reused_after_reset_only() {
        let mut alloc = NameAllocator::new();
        alloc.next_name(BlockKind::Sum);
        alloc.next_name(BlockKind::Sum);
        // No API to decrement: deleting blocks never gives a name back.
        assert_eq!(alloc.next_name(BlockKind::Sum), "SUM 3");
        alloc.reset();
        assert_eq!(alloc.next_name(BlockKind::Sum), "SUM 1");
    }

    #[test]
    fn resync_skips_past_loaded_names() {
        let mut alloc = NameAllocator::new();
        alloc.resync([
            (BlockKind::Gain, "GAIN 3"),
            (BlockKind::Gain, "GAIN 1"),
            (BlockKind::Scope, "SCOPE 7"),
            (BlockKind::Step, "not a generated name"),
        ]);
        assert_eq!(alloc.next_name(BlockKind::Gain), "GAIN 4");
        assert_eq!(alloc.next_name(BlockKind::Scope), "SCOPE 8");
        assert_eq!(alloc.next_name(BlockKind::Step), "STEP 1");
    }
}
