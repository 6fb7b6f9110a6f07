//! Statement-text interning.
//!
//! Trace streams repeat the same statement text enormously often (every
//! loop iteration replays the same line). Interning keeps one shared
//! allocation per distinct text so a multi-minute capture stays bounded
//! in memory. The cache is scoped to one aggregator and dies with it.

use std::collections::HashSet;
use std::sync::Arc;

/// Deduplicating store of statement texts.
///
/// **Public** - owned by each session aggregator
#[derive(Debug, Default)]
pub struct StatementInterner {
    strings: HashSet<Arc<str>>,
}

impl StatementInterner {
    pub fn new() -> Self {
        StatementInterner::default()
    }

    /// Return the shared copy of `text`, inserting it on first sight.
    ///
    /// Equal inputs always return pointer-identical `Arc`s.
    pub fn intern(&mut self, text: &str) -> Arc<str> {
        if let Some(existing) = self.strings.get(text) {
            return Arc::clone(existing);
        }

        let shared: Arc<str> = Arc::from(text);
        self.strings.insert(Arc::clone(&shared));
        shared
    }

    /// Number of distinct texts seen so far.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_texts_share_one_allocation() {
        let mut interner = StatementInterner::new();

        let a = interner.intern("SELECT * FROM T");
        let b = interner.intern("SELECT * FROM T");
        let c = interner.intern("COMMIT");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn test_empty_text_is_interned_too() {
        let mut interner = StatementInterner::new();
        let a = interner.intern("");
        let b = interner.intern("");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 1);
    }
}
