//! A [`schnellru`] limiter which bounds a cache by the number of bytes its
//! entries hold.

/// Values which can report how much memory they own.
pub trait HeapSize {
    /// The total size of the value in bytes, including its owned heap data.
    fn heap_size(&self) -> usize;
}

impl HeapSize for String {
    fn heap_size(&self) -> usize {
        size_of::<Self>() + self.capacity()
    }
}

/// A limiter for a map which is bounded by a byte budget.
///
/// A single entry larger than the whole budget is never inserted.
#[derive(Clone, Copy, Debug)]
pub struct ByteBudget {
    /// The bytes currently held by keys and values.
    used: usize,
    /// The maximum number of bytes.
    budget: usize,
}

impl ByteBudget {
    /// Creates a new limiter with the given budget in bytes.
    pub const fn new(budget: usize) -> Self {
        Self { used: 0, budget }
    }

    /// Returns the number of bytes currently held by entries.
    pub fn used(&self) -> usize {
        self.used
    }
}

impl<K: HeapSize, V: HeapSize> schnellru::Limiter<K, V> for ByteBudget {
    type KeyToInsert<'a> = K;
    type LinkType = u32;

    #[inline]
    fn is_over_the_limit(&self, _: usize) -> bool {
        self.used > self.budget
    }

    #[inline]
    fn on_insert(&mut self, _: usize, key: K, value: V) -> Option<(K, V)> {
        let size = key.heap_size() + value.heap_size();
        (size <= self.budget).then(|| {
            self.used += size;
            (key, value)
        })
    }

    #[inline]
    fn on_replace(
        &mut self,
        _: usize,
        _: &mut K,
        _: K,
        old_value: &mut V,
        new_value: &mut V,
    ) -> bool {
        let size = new_value.heap_size();
        if size <= self.budget {
            self.used = self.used - old_value.heap_size() + size;
            true
        } else {
            false
        }
    }

    #[inline]
    fn on_removed(&mut self, key: &mut K, value: &mut V) {
        self.used -= key.heap_size() + value.heap_size();
    }

    #[inline]
    fn on_cleared(&mut self) {
        self.used = 0;
    }

    #[inline]
    fn on_grow(&mut self, new_memory_usage: usize) -> bool {
        new_memory_usage <= self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schnellru::LruMap;

    #[test]
    fn evicts_least_recent_over_budget() {
        let entry = "k".to_string().heap_size() + "v".repeat(10_000).heap_size();
        let mut map = LruMap::<String, String, _>::new(ByteBudget::new(entry * 2 + entry / 2));
        map.insert("a".into(), "v".repeat(10_000));
        map.insert("b".into(), "v".repeat(10_000));
        map.get("a");
        map.insert("c".into(), "v".repeat(10_000));
        assert!(map.peek("a").is_some());
        assert!(map.peek("b").is_none());
        assert!(map.peek("c").is_some());
        assert!(map.limiter().used() <= entry * 2);
    }

    #[test]
    fn oversized_entry_is_rejected() {
        let mut map = LruMap::<String, String, _>::new(ByteBudget::new(64));
        assert!(!map.insert("a".into(), "v".repeat(1000)));
        assert_eq!(map.len(), 0);
        assert_eq!(map.limiter().used(), 0);
    }
}
