#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Key-point position in pixel coordinates, subpixel precision
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Pixel dimensions of one image side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageSize {
    pub width: usize,
    pub height: usize,
}

impl ImageSize {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }
}

/// One candidate correspondence: query key-point index, reference key-point
/// index and the descriptor distance between the two
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Correspondence {
    pub query: usize,
    pub refer: usize,
    pub distance: f32,
}

impl Correspondence {
    pub fn new(query: usize, refer: usize, distance: f32) -> Self {
        Self {
            query,
            refer,
            distance,
        }
    }
}

/// Per-query candidates from nearest-neighbor search, ascending by distance
pub type CandidateList = Vec<Correspondence>;

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}

/// Default worker count for parallel pruning
pub fn default_thread_count() -> usize {
    num_cpus::get().max(1)
}
