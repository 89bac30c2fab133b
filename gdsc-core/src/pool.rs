use std::collections::HashMap;
use std::hash::Hash;

/// Insertion-ordered interning pool.
///
/// The compiled format stores identifiers and constants once each and
/// has tokens reference them by index, so both pools need stable indices
/// in first-seen order plus O(1) lookup of already-interned entries.
#[derive(Debug, Default)]
pub struct Pool<T: Eq + Hash + Clone> {
    entries: Vec<T>,
    indices: HashMap<T, u32>,
}

impl<T: Eq + Hash + Clone> Pool<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            indices: HashMap::new(),
        }
    }

    /// Index of `value`, interning it at the next free slot if new.
    pub fn intern(&mut self, value: T) -> u32 {
        if let Some(&idx) = self.indices.get(&value) {
            return idx;
        }
        let idx = self.entries.len() as u32;
        self.entries.push(value.clone());
        self.indices.insert(value, idx);
        idx
    }

    pub fn get(&self, idx: u32) -> Option<&T> {
        self.entries.get(idx as usize)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_deduplicates_and_keeps_first_seen_order() {
        let mut pool = Pool::new();
        assert_eq!(pool.intern("alpha".to_string()), 0);
        assert_eq!(pool.intern("beta".to_string()), 1);
        assert_eq!(pool.intern("alpha".to_string()), 0);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(1).map(String::as_str), Some("beta"));
    }
}
