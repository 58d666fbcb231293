//! Indexed min-priority queue
//!
//! A binary min-heap over a fixed external index space `[0, max_n)`, backed
//! by parallel heap/position arrays plus a key array. Supports logarithmic
//! insert, extract-min, key change and delete, with O(1) membership tests.
//!
//! Operations on inconsistent membership state (double insert, changing or
//! removing an absent index) are programmer errors and panic.

const ABSENT: usize = usize::MAX;

/// Min-priority queue keyed by `f64`, addressed by dense external indices.
///
/// Keys are ordered by `f64::total_cmp`, so the smallest key sits at the
/// heap root.
#[derive(Debug, Clone)]
pub struct IndexMinHeap {
    len: usize,
    /// heap[1..=len] holds external indices, heap order by key
    heap: Vec<usize>,
    /// pos[external] = slot in `heap`, ABSENT if not contained
    pos: Vec<usize>,
    keys: Vec<f64>,
}

impl IndexMinHeap {
    /// Create a queue for external indices in `[0, max_n)`.
    pub fn new(max_n: usize) -> Self {
        Self {
            len: 0,
            heap: vec![0; max_n + 1],
            pos: vec![ABSENT; max_n],
            keys: vec![0.0; max_n],
        }
    }

    /// Number of contained indices.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether external index `i` is currently contained.
    #[inline]
    pub fn contains(&self, i: usize) -> bool {
        self.pos[i] != ABSENT
    }

    /// Insert index `i` with the given key.
    ///
    /// Panics if `i` is already contained.
    pub fn insert(&mut self, i: usize, key: f64) {
        assert!(!self.contains(i), "insert: index {i} already contained");
        self.len += 1;
        self.pos[i] = self.len;
        self.heap[self.len] = i;
        self.keys[i] = key;
        self.sift_up(self.len);
    }

    /// The smallest key. Panics on an empty queue.
    pub fn min_key(&self) -> f64 {
        assert!(self.len > 0, "min_key: empty queue");
        self.keys[self.heap[1]]
    }

    /// The index holding the smallest key. Panics on an empty queue.
    pub fn min_index(&self) -> usize {
        assert!(self.len > 0, "min_index: empty queue");
        self.heap[1]
    }

    /// Remove and return the index with the smallest key.
    ///
    /// Panics on an empty queue.
    pub fn pop_min(&mut self) -> usize {
        assert!(self.len > 0, "pop_min: empty queue");
        let min = self.heap[1];
        self.swap(1, self.len);
        self.len -= 1;
        self.sift_down(1);
        self.pos[min] = ABSENT;
        min
    }

    /// Change the key associated with index `i`.
    ///
    /// Panics if `i` is not contained.
    pub fn change_key(&mut self, i: usize, key: f64) {
        assert!(self.contains(i), "change_key: index {i} not contained");
        self.keys[i] = key;
        let slot = self.pos[i];
        self.sift_up(slot);
        self.sift_down(self.pos[i]);
    }

    /// Remove index `i` from the queue.
    ///
    /// Panics if `i` is not contained.
    pub fn remove(&mut self, i: usize) {
        assert!(self.contains(i), "remove: index {i} not contained");
        let slot = self.pos[i];
        self.swap(slot, self.len);
        self.len -= 1;
        if slot <= self.len {
            self.sift_up(slot);
            self.sift_down(slot);
        }
        self.pos[i] = ABSENT;
    }

    #[inline]
    fn less(&self, a: usize, b: usize) -> bool {
        self.keys[self.heap[a]].total_cmp(&self.keys[self.heap[b]]) == std::cmp::Ordering::Less
    }

    #[inline]
    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.pos[self.heap[a]] = a;
        self.pos[self.heap[b]] = b;
    }

    fn sift_up(&mut self, mut k: usize) {
        while k > 1 && self.less(k, k / 2) {
            self.swap(k, k / 2);
            k /= 2;
        }
    }

    fn sift_down(&mut self, mut k: usize) {
        while 2 * k <= self.len {
            let mut j = 2 * k;
            if j < self.len && self.less(j + 1, j) {
                j += 1;
            }
            if !self.less(j, k) {
                break;
            }
            self.swap(k, j);
            k = j;
        }
    }
}
