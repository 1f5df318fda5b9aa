use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Deterministic jitter in `[-1, 1]²` derived from an id.
pub fn stable_pair(id: &str) -> (f32, f32) {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let hash = hasher.finish();

    let x = ((hash & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    let y = (((hash >> 32) & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    ((x * 2.0) - 1.0, (y * 2.0) - 1.0)
}

/// Smallest column count whose square grid holds `total` cells.
pub fn grid_columns(total: usize) -> usize {
    let mut columns = (total as f64).sqrt().ceil() as usize;
    while columns > 1 && (columns - 1) * (columns - 1) >= total {
        columns -= 1;
    }
    columns.max(1)
}
