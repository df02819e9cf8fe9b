use prune_core::{CandidateList, Correspondence, ImageSize, Keypoint};
use prune_gms::GmsFilter;
use rayon::prelude::*;

mod error;
mod lpm;

pub use error::{PrunerError, PrunerResult};
pub use lpm::{LpmMatcher, LpmOutcome, LpmParams};
pub use prune_core::{self, CandidateList as Candidates, Correspondence as Match};
pub use prune_gms::GmsConfig;

/// Default Lowe ratio threshold
pub const DEFAULT_RATIO: f32 = 0.8;

/// Pruning strategy, dispatched exhaustively by `MatchPruner::prune`
pub enum PrunerStrategy<'m> {
    /// Lowe's ratio test over the two nearest candidates
    RatioTest { ratio: f32 },
    /// Grid-based motion statistics over each query's best candidate
    Gms(GmsConfig),
    /// Two-pass locality-preserving refinement through an external matcher
    Lpm {
        matcher: &'m dyn LpmMatcher,
        first: LpmParams,
        second: LpmParams,
    },
}

impl<'m> PrunerStrategy<'m> {
    /// Ratio test at the default threshold
    pub fn ratio_test() -> Self {
        PrunerStrategy::RatioTest {
            ratio: DEFAULT_RATIO,
        }
    }

    /// GMS with the default full rotation and scale search
    pub fn gms() -> Self {
        PrunerStrategy::Gms(GmsConfig::default())
    }

    /// LPM with the reference two-pass parameters
    pub fn lpm(matcher: &'m dyn LpmMatcher) -> Self {
        PrunerStrategy::Lpm {
            matcher,
            first: LpmParams::first_pass(),
            second: LpmParams::second_pass(),
        }
    }
}

/// Pruned correspondences with their aligned outputs: one score, one matched
/// point pair and one k-NN distance row per accepted correspondence, in
/// acceptance order
#[derive(Debug, Clone)]
pub struct PrunedMatches {
    pub matches: Vec<Correspondence>,
    /// Strategy score per match; lower means stronger for ratio test and
    /// LPM, uniformly 1.0 for GMS
    pub scores: Vec<f32>,
    pub query_points: Vec<Keypoint>,
    pub refer_points: Vec<Keypoint>,
    /// Candidate distances of the accepted query, ascending
    pub knn_distances: Vec<Vec<f32>>,
}

impl PrunedMatches {
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Owns one putative correspondence set and prunes it with a selected
/// strategy
pub struct MatchPruner<'a> {
    query_kpts: &'a [Keypoint],
    query_size: ImageSize,
    refer_kpts: &'a [Keypoint],
    refer_size: ImageSize,
    putative: &'a [CandidateList],
    knn: usize,
}

impl<'a> MatchPruner<'a> {
    /// Creates a pruner over validated putative candidate lists. List `i`
    /// must hold the candidates of query keypoint `i`, all lists must share
    /// one length k >= 1, and every index must resolve to a keypoint.
    pub fn new(
        query_kpts: &'a [Keypoint],
        query_size: ImageSize,
        refer_kpts: &'a [Keypoint],
        refer_size: ImageSize,
        putative: &'a [CandidateList],
    ) -> PrunerResult<Self> {
        // k is taken from the first list, so the empty set is rejected first
        if putative.is_empty() {
            return Err(PrunerError::EmptyInput);
        }
        let knn = putative[0].len();

        for (i, list) in putative.iter().enumerate() {
            if list.is_empty() {
                return Err(PrunerError::EmptyCandidateList { query: i });
            }
            if list.len() != knn {
                return Err(PrunerError::UnevenCandidateLists {
                    expected: knn,
                    found: list.len(),
                    query: i,
                });
            }
            for c in list {
                if c.query != i {
                    return Err(PrunerError::MisindexedCandidateList {
                        list_index: i,
                        query: c.query,
                    });
                }
                if c.query >= query_kpts.len() || c.refer >= refer_kpts.len() {
                    return Err(PrunerError::CorrespondenceOutOfBounds {
                        query: c.query,
                        refer: c.refer,
                    });
                }
            }
        }

        Ok(Self {
            query_kpts,
            query_size,
            refer_kpts,
            refer_size,
            putative,
            knn,
        })
    }

    /// Candidates per query in this putative set
    pub fn knn(&self) -> usize {
        self.knn
    }

    /// Runs the selected strategy and assembles the aligned outputs
    pub fn prune(&self, strategy: &PrunerStrategy<'_>) -> PrunerResult<PrunedMatches> {
        let (matches, scores) = match strategy {
            PrunerStrategy::RatioTest { ratio } => self.prune_by_ratio(*ratio)?,
            PrunerStrategy::Gms(cfg) => self.prune_by_gms(cfg)?,
            PrunerStrategy::Lpm {
                matcher,
                first,
                second,
            } => self.prune_by_lpm(*matcher, first, second)?,
        };
        Ok(self.assemble(matches, scores))
    }

    fn prune_by_ratio(&self, ratio: f32) -> PrunerResult<(Vec<Correspondence>, Vec<f32>)> {
        if self.knn < 2 {
            return Err(PrunerError::RatioNeedsTwoCandidates { knn: self.knn });
        }

        let scored: Vec<Option<(Correspondence, f32)>> = self
            .putative
            .par_iter()
            .map(|list| {
                let score = list[0].distance / list[1].distance;
                // A NaN ratio fails the comparison and drops the candidate
                (score < ratio).then(|| (list[0], score))
            })
            .collect();

        Ok(scored.into_iter().flatten().unzip())
    }

    fn prune_by_gms(&self, cfg: &GmsConfig) -> PrunerResult<(Vec<Correspondence>, Vec<f32>)> {
        let initial = self.best_candidates();
        let filter = GmsFilter::new(
            self.query_kpts,
            self.query_size,
            self.refer_kpts,
            self.refer_size,
            &initial,
            cfg.clone(),
        )?;
        let mask = filter.inlier_mask();

        let matches: Vec<Correspondence> = initial
            .into_iter()
            .zip(&mask)
            .filter_map(|(m, &keep)| keep.then_some(m))
            .collect();
        // The grid vote is a binary decision, no graded confidence
        let scores = vec![1.0; matches.len()];
        Ok((matches, scores))
    }

    fn prune_by_lpm(
        &self,
        matcher: &dyn LpmMatcher,
        first: &LpmParams,
        second: &LpmParams,
    ) -> PrunerResult<(Vec<Correspondence>, Vec<f32>)> {
        let initial = self.best_candidates();
        let query_pts: Vec<Keypoint> = initial.iter().map(|m| self.query_kpts[m.query]).collect();
        let refer_pts: Vec<Keypoint> = initial.iter().map(|m| self.refer_kpts[m.refer]).collect();

        let prior = matcher.refine(&query_pts, &refer_pts, first, None);
        self.check_lpm_alignment(&prior, initial.len())?;

        let outcome = matcher.refine(&query_pts, &refer_pts, second, Some(&prior.labels));
        self.check_lpm_alignment(&outcome, initial.len())?;

        let (matches, scores) = initial
            .into_iter()
            .zip(outcome.labels.iter().zip(&outcome.costs))
            .filter_map(|(m, (&keep, &cost))| keep.then_some((m, cost)))
            .unzip();
        Ok((matches, scores))
    }

    /// Each query's nearest candidate, the putative set for GMS and LPM
    fn best_candidates(&self) -> Vec<Correspondence> {
        self.putative.iter().map(|list| list[0]).collect()
    }

    fn check_lpm_alignment(&self, outcome: &LpmOutcome, expected: usize) -> PrunerResult<()> {
        if outcome.costs.len() != expected || outcome.labels.len() != expected {
            return Err(PrunerError::LpmOutputMismatch {
                expected,
                costs: outcome.costs.len(),
                labels: outcome.labels.len(),
            });
        }
        Ok(())
    }

    fn assemble(&self, matches: Vec<Correspondence>, scores: Vec<f32>) -> PrunedMatches {
        let query_points = matches.iter().map(|m| self.query_kpts[m.query]).collect();
        let refer_points = matches.iter().map(|m| self.refer_kpts[m.refer]).collect();
        let knn_distances = matches
            .iter()
            .map(|m| self.putative[m.query].iter().map(|c| c.distance).collect())
            .collect();

        PrunedMatches {
            matches,
            scores,
            query_points,
            refer_points,
            knn_distances,
        }
    }
}
