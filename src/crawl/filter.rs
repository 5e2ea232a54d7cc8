// src/crawl/filter.rs
// =============================================================================
// Scalable Bloom filter that remembers every URL the scheduler has queued.
//
// How it works:
// 1. The filter is a stack of fixed-size `bloomfilter::Bloom` layers
// 2. A lookup asks every layer; any hit means "probably seen"
// 3. Inserts go into the newest layer
// 4. When the newest layer is full, a bigger one is pushed on top
//
// So the filter never refuses an insert and never evicts. Each new layer
// gets a tighter false-positive rate so the compound rate stays under the
// configured `error_rate`:
//
//   layer i: capacity = initial * 2^i
//            fp rate  = error_rate * (1 - 0.9) * 0.9^i
//
// Lookups may wrongly report an unseen URL as seen (bounded by `error_rate`)
// but never report a seen URL as unseen.
//
// Rust concepts:
// - Bloom<String>: hashes &String keys, so lookups allocate one String
// - Vec<Layer>: the last element is always the layer taking inserts
// =============================================================================

use bloomfilter::Bloom;

const GROWTH: usize = 2;
const TIGHTENING: f64 = 0.9;

// One fixed-size Bloom filter plus how many URLs went into it
struct Layer {
    bloom: Bloom<String>,
    capacity: usize,
    len: usize,
}

impl Layer {
    fn new(capacity: usize, fp_rate: f64) -> Self {
        Self {
            bloom: Bloom::new_for_fp_rate(capacity, fp_rate),
            capacity,
            len: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.len >= self.capacity
    }
}

pub struct MembershipFilter {
    layers: Vec<Layer>,
    initial_capacity: usize,
    error_rate: f64,
    len: usize,
}

impl MembershipFilter {
    /// `initial_capacity` must be non-zero and `error_rate` within (0, 1);
    /// `ScanConfig::validate` enforces both.
    pub fn new(initial_capacity: usize, error_rate: f64) -> Self {
        let mut filter = Self {
            layers: Vec::new(),
            initial_capacity: initial_capacity.max(1),
            error_rate,
            len: 0,
        };
        filter.push_layer();
        filter
    }

    pub fn contains(&self, url: &str) -> bool {
        let key = url.to_string();
        self.layers.iter().any(|layer| layer.bloom.check(&key))
    }

    /// Records `url`. Returns false when it was (probably) already present.
    pub fn insert(&mut self, url: &str) -> bool {
        if self.contains(url) {
            return false;
        }
        let key = url.to_string();

        // Start a new layer once the current one reached its capacity
        if self.layers.last().map_or(true, Layer::is_full) {
            self.push_layer();
        }
        if let Some(layer) = self.layers.last_mut() {
            layer.bloom.set(&key);
            layer.len += 1;
        }
        self.len += 1;
        true
    }

    /// Number of distinct inserts (not counting false-positive rejections)
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn push_layer(&mut self) {
        // depth 0 is the first layer
        let depth = self.layers.len();
        let capacity = self
            .initial_capacity
            .saturating_mul(GROWTH.saturating_pow(depth as u32));
        let fp_rate = self.error_rate * (1.0 - TIGHTENING) * TIGHTENING.powi(depth as i32);
        self.layers.push(Layer::new(capacity, fp_rate));
    }
}
