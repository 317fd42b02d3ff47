//! Deterministic terrain height by seeded recursive midpoint displacement
//!
//! Heights are anchored every `randomness_range` cells by a hash of
//! `x ^ seed`. Between anchors the interval is bisected; every midpoint
//! is the mean of its interval ends plus a nudge whose magnitude decays
//! with `(depth + 1)^-2.5`. Midpoint nudges are keyed by the midpoint's
//! own x, so a height never depends on which columns were asked first.

use ahash::HashMap;

use crate::config::TerrainParams;
use crate::error::ConfigError;

const MIDPOINT_SALT: u64 = 0x6d69_6470_6f69_6e74;
const FINAL_SALT: u64 = 0x6669_6e61_6c5f_6e64;

/// Avalanching 64-bit mix folded to 16 bits
pub fn det_hash(value: u64) -> u16 {
    let mut z = value.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    (z ^ (z >> 16) ^ (z >> 32) ^ (z >> 48)) as u16
}

/// Hash of a world column for a given purpose (`salt`)
pub fn column_hash(x: i64, seed: u32, salt: u64) -> u16 {
    det_hash((x as u64) ^ ((seed as u64) << 32) ^ salt)
}

/// Hash of a single world cell
pub fn cell_hash(x: i64, y: i64, seed: u32) -> u16 {
    det_hash((x as u64).wrapping_mul(0x2545_F491_4F6C_DD1D) ^ (y as u64) ^ ((seed as u64) << 40))
}

/// Memoized heights of one terrain session
///
/// `nodes` holds anchors and bisection midpoints, which depend only on x.
/// `samples` holds final answers, which also depend on the depth asked for.
#[derive(Debug, Default, Clone)]
pub struct HeightCache {
    nodes: HashMap<i64, u16>,
    samples: HashMap<(i64, u16), u16>,
}

impl HeightCache {
    pub fn len(&self) -> usize {
        self.nodes.len() + self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Height sampler bound to one seed and parameter set
#[derive(Debug, Clone)]
pub struct TerrainSampler {
    seed: u32,
    randomness_range: i64,
    cell_range: i32,
    cache: HeightCache,
}

impl TerrainSampler {
    /// Fails unless anchors are at least 2 apart and heights fit in a `u16`
    pub fn new(seed: u32, randomness_range: i64, cell_range: i32) -> Result<Self, ConfigError> {
        if randomness_range < 2 {
            return Err(ConfigError::InvalidTerrain("randomness_range must be at least 2"));
        }
        if cell_range <= 0 || cell_range > u16::MAX as i32 {
            return Err(ConfigError::InvalidTerrain("cell_range must fit in 1..=65535"));
        }
        Ok(Self {
            seed,
            randomness_range,
            cell_range,
            cache: HeightCache::default(),
        })
    }

    pub fn from_params(seed: u32, params: &TerrainParams) -> Result<Self, ConfigError> {
        Self::new(seed, params.randomness_range, params.cell_range)
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn cache(&self) -> &HeightCache {
        &self.cache
    }

    /// Surface height of column `x`, in `0..=cell_range`
    pub fn surface_height(&mut self, x: i64, max_depth: u16) -> u16 {
        if let Some(&height) = self.cache.samples.get(&(x, max_depth)) {
            return height;
        }

        let range = self.randomness_range;
        let mut lower = x.div_euclid(range) * range;
        let mut upper = lower + range;
        let mut lower_height = self.anchor_height(lower) as f64;
        let mut upper_height = self.anchor_height(upper) as f64;

        if lower == x {
            let height = lower_height as u16;
            self.cache.samples.insert((x, max_depth), height);
            return height;
        }

        let mut depth = 0;
        while depth < max_depth && upper - lower >= 2 {
            let mid = lower + (upper - lower) / 2;
            let mid_height = self.midpoint_height(mid, lower_height, upper_height, depth);
            if mid == x {
                self.cache.samples.insert((x, max_depth), mid_height);
                return mid_height;
            }
            if x < mid {
                upper = mid;
                upper_height = mid_height as f64;
            } else {
                lower = mid;
                lower_height = mid_height as f64;
            }
            depth += 1;
        }

        // Depth exhausted: interpolate inside the last interval
        let fraction = (x - lower) as f64 / (upper - lower) as f64;
        let nudge = self.nudge(det_hash((x as u64) ^ self.seed as u64 ^ FINAL_SALT), depth);
        let height = self.clamp(lower_height + (upper_height - lower_height) * fraction + nudge);
        self.cache.samples.insert((x, max_depth), height);
        height
    }

    fn anchor_height(&mut self, x: i64) -> u16 {
        if let Some(&height) = self.cache.nodes.get(&x) {
            return height;
        }
        let height = (det_hash((x as u64) ^ self.seed as u64) as i32 % self.cell_range) as u16;
        self.cache.nodes.insert(x, height);
        height
    }

    fn midpoint_height(&mut self, mid: i64, lower: f64, upper: f64, depth: u16) -> u16 {
        if let Some(&height) = self.cache.nodes.get(&mid) {
            return height;
        }
        let hash = det_hash((mid as u64) ^ self.seed as u64 ^ MIDPOINT_SALT);
        let height = self.clamp((lower + upper) * 0.5 + self.nudge(hash, depth));
        self.cache.nodes.insert(mid, height);
        height
    }

    /// Signed displacement in `[-m, m]`, `m = cell_range / 2 / (depth + 1)^2.5`
    fn nudge(&self, hash: u16, depth: u16) -> f64 {
        let magnitude = self.cell_range as f64 * 0.5 / (depth as f64 + 1.0).powf(2.5);
        let unit = hash as f64 / u16::MAX as f64 * 2.0 - 1.0;
        (unit * magnitude).round()
    }

    fn clamp(&self, height: f64) -> u16 {
        height.clamp(0.0, self.cell_range as f64) as u16
    }
}

/// Surface height of column `x` computed with a fresh session
pub fn surface_height(
    x: i64,
    max_depth: u16,
    seed: u32,
    randomness_range: i64,
    cell_range: i32,
) -> Result<u16, ConfigError> {
    Ok(TerrainSampler::new(seed, randomness_range, cell_range)?.surface_height(x, max_depth))
}
