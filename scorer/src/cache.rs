use ndarray::{Array2, ArrayView1};

/// Hashes an n-gram by folding its tokens left to right into a seed.
pub fn hash_ngram(ngram: &[usize]) -> u64 {
    ngram.iter().fold(0u64, |seed, &token| {
        seed ^ (token as u64)
            .wrapping_add(0x9e37_79b9)
            .wrapping_add(seed << 6)
            .wrapping_add(seed >> 2)
    })
}

/// A direct-mapped cache from n-grams to their scores.
///
/// Each n-gram maps to exactly one slot; storing a different n-gram in an occupied slot evicts the
/// resident one.
#[derive(Debug, Clone)]
pub struct NgramCache {
    keys: Array2<usize>,
    values: Vec<f64>,
    valid: Vec<bool>,
    lookups: u64,
    hits: u64,
}

impl NgramCache {
    /// Creates an empty cache of `capacity` slots for n-grams of `width` tokens.
    ///
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(width: usize, capacity: usize) -> Self {
        assert!(capacity > 0, "a cache needs at least one slot");

        Self {
            keys: Array2::zeros((width, capacity)),
            values: vec![0.; capacity],
            valid: vec![false; capacity],
            lookups: 0,
            hits: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    pub fn width(&self) -> usize {
        self.keys.nrows()
    }

    pub fn slot(&self, ngram: &[usize]) -> usize {
        (hash_ngram(ngram) % self.capacity() as u64) as usize
    }

    /// Looks `ngram` up, counting the lookup and, if found, the hit.
    ///
    /// # Returns
    /// The slot the n-gram maps to and its cached score, if resident.
    pub fn probe(&mut self, ngram: &[usize]) -> (usize, Option<f64>) {
        let slot = self.slot(ngram);
        self.lookups += 1;

        if self.valid[slot] && self.keys.column(slot) == ArrayView1::from(ngram) {
            self.hits += 1;
            return (slot, Some(self.values[slot]));
        }

        (slot, None)
    }

    /// Makes `ngram` the resident of `slot`.
    pub fn store(&mut self, slot: usize, ngram: &[usize], value: f64) {
        self.keys.column_mut(slot).assign(&ArrayView1::from(ngram));
        self.values[slot] = value;
        self.valid[slot] = true;
    }

    /// Evicts every entry and zeroes the counters.
    pub fn clear(&mut self) {
        self.valid.fill(false);
        self.lookups = 0;
        self.hits = 0;
    }

    pub fn lookups(&self) -> u64 {
        self.lookups
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// The fraction of lookups that hit, `None` before the first lookup.
    pub fn hit_rate(&self) -> Option<f64> {
        (self.lookups > 0).then(|| self.hits as f64 / self.lookups as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_hit() {
        let mut cache = NgramCache::new(3, 16);
        let ngram = [4, 8, 15];

        let (slot, cached) = cache.probe(&ngram);
        assert_eq!(cached, None);
        cache.store(slot, &ngram, -1.25);

        assert_eq!(cache.probe(&ngram), (slot, Some(-1.25)));
        assert_eq!(cache.hit_rate(), Some(0.5));
    }

    #[test]
    fn collisions_evict() {
        let mut cache = NgramCache::new(2, 1);
        let (a, b) = ([1, 2], [3, 4]);

        let (slot, _) = cache.probe(&a);
        cache.store(slot, &a, 1.);
        let (slot, cached) = cache.probe(&b);
        assert_eq!(cached, None);
        cache.store(slot, &b, 2.);

        assert_eq!(cache.probe(&a).1, None);
        assert_eq!(cache.probe(&b).1, Some(2.));
        assert_eq!((cache.lookups(), cache.hits()), (4, 1));
    }

    #[test]
    fn zero_token_ngram_is_not_resident_initially() {
        let mut cache = NgramCache::new(2, 4);
        assert_eq!(cache.probe(&[0, 0]).1, None);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut cache = NgramCache::new(1, 4);
        let (slot, _) = cache.probe(&[7]);
        cache.store(slot, &[7], 0.5);

        cache.clear();
        assert_eq!(cache.hit_rate(), None);
        assert_eq!(cache.probe(&[7]).1, None);
    }

    #[test]
    fn hash_depends_on_order() {
        assert_ne!(hash_ngram(&[1, 2]), hash_ngram(&[2, 1]));
    }
}
