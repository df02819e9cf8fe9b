use prune_core::Keypoint;

/// Parameters for one locality-preserving refinement pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LpmParams {
    pub neighbor_count: usize,
    pub lambda: f32,
    pub tau: f32,
}

impl LpmParams {
    /// Reference parameters for the unprimed first pass
    pub fn first_pass() -> Self {
        Self {
            neighbor_count: 8,
            lambda: 0.8,
            tau: 0.2,
        }
    }

    /// Reference parameters for the prior-labeled second pass
    pub fn second_pass() -> Self {
        Self {
            neighbor_count: 8,
            lambda: 0.5,
            tau: 0.2,
        }
    }
}

/// Per-correspondence result of one refinement pass, aligned one-to-one with
/// the input order
#[derive(Debug, Clone)]
pub struct LpmOutcome {
    /// Matching cost, lower is better
    pub costs: Vec<f32>,
    /// True for correspondences kept by this pass
    pub labels: Vec<bool>,
}

/// Locality-preserving matching collaborator. The refinement itself lives
/// outside this crate; the dispatcher drives it through this interface.
pub trait LpmMatcher {
    /// Refines aligned point sequences into per-correspondence costs and
    /// keep/drop labels, optionally primed with labels from an earlier pass
    fn refine(
        &self,
        query_pts: &[Keypoint],
        refer_pts: &[Keypoint],
        params: &LpmParams,
        priors: Option<&[bool]>,
    ) -> LpmOutcome;
}
