use prune_core::{Correspondence, ImageSize, Keypoint};
use rayon::prelude::*;

use crate::config::GmsConfig;
use crate::error::{GmsError, GmsResult};
use crate::grid::{Grid, GridOffset};
use crate::types::{CellPairing, NormPoint};

/// 8 rotation hypotheses, each a permutation of the 3x3 neighborhood slots.
/// Slot j of the left neighborhood maps to slot `pattern[j]` (1-based) of the
/// right neighborhood; the table values and their order are fixed.
const ROTATION_PATTERNS: [[usize; 9]; 8] = [
    [1, 2, 3, 4, 5, 6, 7, 8, 9],
    [4, 1, 2, 7, 5, 3, 8, 9, 6],
    [7, 4, 1, 8, 5, 2, 9, 6, 3],
    [8, 7, 4, 9, 5, 1, 6, 3, 2],
    [9, 8, 7, 6, 5, 4, 3, 2, 1],
    [6, 9, 8, 3, 5, 7, 2, 1, 4],
    [3, 6, 9, 2, 5, 8, 1, 4, 7],
    [2, 3, 6, 1, 5, 9, 4, 7, 8],
];

/// 5 scale hypotheses: the right-grid resolution is the left one multiplied
/// by each ratio in this order
const SCALE_RATIOS: [f64; 5] = [
    1.0,
    0.5,
    std::f64::consts::FRAC_1_SQRT_2,
    std::f64::consts::SQRT_2,
    2.0,
];

/// Right-grid state shared by the 8 rotation hypotheses of one scale
struct ScaleContext {
    grid: Grid,
    /// Canonical right cell per correspondence, `None` for far-edge points
    cells: Vec<Option<usize>>,
}

/// Grid-based multi-hypothesis consistency filter. Votes correspondences
/// into cell pairs and keeps the cells whose 3x3 neighborhood support clears
/// an adaptive threshold, exhausting a small fixed hypothesis space of
/// rotations, scales and grid offsets.
pub struct GmsFilter {
    cfg: GmsConfig,
    query_pts: Vec<NormPoint>,
    refer_pts: Vec<NormPoint>,
    matches: Vec<(usize, usize)>,
    left_grid: Grid,
}

impl GmsFilter {
    /// Creates a filter over one fixed correspondence set with validation
    pub fn new(
        query_kpts: &[Keypoint],
        query_size: ImageSize,
        refer_kpts: &[Keypoint],
        refer_size: ImageSize,
        matches: &[Correspondence],
        cfg: GmsConfig,
    ) -> GmsResult<Self> {
        cfg.validate()?;
        validate_image_size(query_size)?;
        validate_image_size(refer_size)?;

        for (i, m) in matches.iter().enumerate() {
            if m.query >= query_kpts.len() {
                return Err(GmsError::MatchOutOfBounds {
                    match_index: i,
                    keypoint_index: m.query,
                    keypoint_count: query_kpts.len(),
                });
            }
            if m.refer >= refer_kpts.len() {
                return Err(GmsError::MatchOutOfBounds {
                    match_index: i,
                    keypoint_index: m.refer,
                    keypoint_count: refer_kpts.len(),
                });
            }
        }

        let left_grid = Grid::new(cfg.grid_width, cfg.grid_height)?;

        Ok(Self {
            query_pts: normalize_points(query_kpts, query_size),
            refer_pts: normalize_points(refer_kpts, refer_size),
            matches: matches.iter().map(|m| (m.query, m.refer)).collect(),
            left_grid,
            cfg,
        })
    }

    pub fn config(&self) -> &GmsConfig {
        &self.cfg
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Runs the hypothesis search and returns one flag per correspondence.
    /// The mask with the largest inlier count wins; ties resolve to the
    /// earliest hypothesis in scale-major, rotation-minor order.
    pub fn inlier_mask(&self) -> Vec<bool> {
        let n = self.matches.len();
        if n == 0 {
            return Vec::new();
        }

        let scales: &[f64] = if self.cfg.scale_search {
            &SCALE_RATIOS
        } else {
            &SCALE_RATIOS[..1]
        };
        let rotations: std::ops::RangeInclusive<usize> = if self.cfg.rotation_search {
            1..=8
        } else {
            1..=1
        };

        let contexts: Vec<Option<ScaleContext>> =
            scales.iter().map(|&ratio| self.scale_context(ratio)).collect();

        let hypotheses: Vec<(usize, usize)> = contexts
            .iter()
            .enumerate()
            .flat_map(|(scale, _)| rotations.clone().map(move |rot| (scale, rot)))
            .collect();

        // Hypotheses are independent: read-only inputs, fresh working state
        let evaluated: Vec<(usize, Vec<bool>)> = hypotheses
            .into_par_iter()
            .map(|(scale, rotation)| match &contexts[scale] {
                Some(ctx) => self.evaluate_hypothesis(ctx, rotation),
                // Degenerate right grid at this ratio, nothing can match
                None => (0, vec![false; n]),
            })
            .collect();

        let mut best_count = 0;
        let mut best_mask = vec![false; n];
        for (count, mask) in evaluated {
            if count > best_count {
                best_count = count;
                best_mask = mask;
            }
        }
        best_mask
    }

    /// Builds the right grid for one scale ratio and assigns every
    /// correspondence its canonical right cell. `None` when the scaled
    /// resolution collapses to zero cells.
    fn scale_context(&self, ratio: f64) -> Option<ScaleContext> {
        let grid = self.left_grid.scaled(ratio)?;
        let cells = self
            .matches
            .iter()
            .map(|&(_, refer)| grid.cell_index(self.refer_pts[refer], GridOffset::Canonical))
            .collect();
        Some(ScaleContext { grid, cells })
    }

    /// Votes, pairs and thresholds under one fixed (scale, rotation)
    /// hypothesis, OR-combining the four left-grid offsets
    fn evaluate_hypothesis(&self, ctx: &ScaleContext, rotation: usize) -> (usize, Vec<bool>) {
        let n = self.matches.len();
        let left_n = self.left_grid.cell_count();
        let right_n = ctx.grid.cell_count();
        let pattern = &ROTATION_PATTERNS[rotation - 1];

        let mut mask = vec![false; n];
        let mut votes = vec![0u32; left_n * right_n];
        let mut populations = vec![0u32; left_n];
        let mut left_cells: Vec<Option<usize>> = vec![None; n];
        let mut pairings: Vec<CellPairing> = vec![CellPairing::Empty; left_n];

        for offset in GridOffset::ALL {
            votes.fill(0);
            populations.fill(0);

            for (i, &(query, _)) in self.matches.iter().enumerate() {
                let left = self.left_grid.cell_index(self.query_pts[query], offset);
                left_cells[i] = left;
                // Unassignable under this offset: skipped, not excluded
                if let (Some(l), Some(r)) = (left, ctx.cells[i]) {
                    votes[l * right_n + r] += 1;
                    populations[l] += 1;
                }
            }

            for (cell, pairing) in pairings.iter_mut().enumerate() {
                *pairing = verify_cell(
                    cell,
                    &self.left_grid,
                    &ctx.grid,
                    pattern,
                    &votes,
                    &populations,
                    self.cfg.alpha,
                );
            }

            for (i, left) in left_cells.iter().enumerate() {
                if let (Some(l), Some(r)) = (*left, ctx.cells[i]) {
                    if pairings[l] == CellPairing::Paired(r) {
                        mask[i] = true;
                    }
                }
            }
        }

        let count = mask.iter().filter(|&&inlier| inlier).count();
        (count, mask)
    }
}

/// Selects the right cell with the most votes for one left cell, then keeps
/// or rejects the pairing against the rotation-aligned neighborhood support
/// threshold
fn verify_cell(
    cell: usize,
    left_grid: &Grid,
    right_grid: &Grid,
    pattern: &[usize; 9],
    votes: &[u32],
    populations: &[u32],
    alpha: f64,
) -> CellPairing {
    if populations[cell] == 0 {
        return CellPairing::Empty;
    }

    let right_n = right_grid.cell_count();
    let row = &votes[cell * right_n..(cell + 1) * right_n];

    // Ties resolve to the lowest right cell index
    let mut best = 0;
    let mut max_votes = 0;
    for (candidate, &count) in row.iter().enumerate() {
        if count > max_votes {
            best = candidate;
            max_votes = count;
        }
    }

    let nb_left = &left_grid.neighbors()[cell];
    let nb_right = &right_grid.neighbors()[best];

    let mut score = 0u32;
    let mut population_sum = 0u32;
    let mut valid_pairs = 0u32;
    for (slot, &left_nb) in nb_left.iter().enumerate() {
        let (Some(ll), Some(rr)) = (left_nb, nb_right[pattern[slot] - 1]) else {
            continue;
        };
        score += votes[ll * right_n + rr];
        population_sum += populations[ll];
        valid_pairs += 1;
    }

    if valid_pairs == 0 {
        return CellPairing::Rejected;
    }

    let threshold = alpha * (population_sum as f64 / valid_pairs as f64).sqrt();
    if (score as f64) < threshold {
        CellPairing::Rejected
    } else {
        CellPairing::Paired(best)
    }
}

fn validate_image_size(size: ImageSize) -> GmsResult<()> {
    if size.width == 0 || size.height == 0 {
        return Err(GmsError::InvalidImageSize {
            width: size.width,
            height: size.height,
        });
    }
    Ok(())
}

fn normalize_points(kpts: &[Keypoint], size: ImageSize) -> Vec<NormPoint> {
    kpts.iter()
        .map(|kp| NormPoint {
            x: kp.x / size.width as f32,
            y: kp.y / size.height as f32,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGE: ImageSize = ImageSize {
        width: 200,
        height: 200,
    };

    /// Keypoint in the lower quarter of cell (cx, cy) of a 20x20 grid over
    /// IMAGE; points built this way stay in one cell under all four offsets
    fn kp_in_cell(cx: usize, cy: usize, t: f32) -> Keypoint {
        Keypoint::new(
            (cx as f32 + 0.1 + 0.2 * t) * 10.0,
            (cy as f32 + 0.1 + 0.15 * t) * 10.0,
        )
    }

    /// Keypoint at the center of cell (cx, cy) of a 20x20 grid over IMAGE
    fn kp_at_center(cx: usize, cy: usize) -> Keypoint {
        Keypoint::new((cx as f32 + 0.5) * 10.0, (cy as f32 + 0.5) * 10.0)
    }

    fn identity_matches(n: usize) -> Vec<Correspondence> {
        (0..n).map(|i| Correspondence::new(i, i, 1.0)).collect()
    }

    /// One coherent block: `per_cell` matches from left cell (5,5) to right
    /// cell (5,5)
    fn coherent_cluster(per_cell: usize) -> (Vec<Keypoint>, Vec<Keypoint>, Vec<Correspondence>) {
        let mut query = Vec::new();
        let mut refer = Vec::new();
        for i in 0..per_cell {
            let t = i as f32 / per_cell as f32;
            query.push(kp_in_cell(5, 5, t));
            refer.push(kp_in_cell(5, 5, t));
        }
        let matches = identity_matches(per_cell);
        (query, refer, matches)
    }

    /// 50 coherent matches into one cell pair plus 450 scattered ones laid
    /// out by fixed arithmetic progressions
    fn cluster_with_noise() -> (Vec<Keypoint>, Vec<Keypoint>, Vec<Correspondence>) {
        let mut query = Vec::new();
        let mut refer = Vec::new();
        for i in 0..50 {
            let t = i as f32 / 50.0;
            query.push(kp_in_cell(5, 5, t));
            refer.push(kp_in_cell(5, 5, t));
        }
        for i in 0..450usize {
            let left = (7 * i + 31) % 400;
            let right = (13 * i + 17) % 400;
            query.push(kp_at_center(left % 20, left / 20));
            refer.push(kp_at_center(right % 20, right / 20));
        }
        let matches = identity_matches(500);
        (query, refer, matches)
    }

    fn count_inliers(mask: &[bool]) -> usize {
        mask.iter().filter(|&&m| m).count()
    }

    #[test]
    fn test_empty_match_set() {
        let filter = GmsFilter::new(&[], IMAGE, &[], IMAGE, &[], GmsConfig::default()).unwrap();
        assert!(filter.inlier_mask().is_empty());
    }

    #[test]
    fn test_rejects_zero_image() {
        let result = GmsFilter::new(
            &[],
            ImageSize::new(0, 100),
            &[],
            IMAGE,
            &[],
            GmsConfig::default(),
        );
        assert!(matches!(result, Err(GmsError::InvalidImageSize { .. })));
    }

    #[test]
    fn test_rejects_match_out_of_bounds() {
        let query = vec![kp_at_center(1, 1)];
        let refer = vec![kp_at_center(1, 1)];
        let matches = vec![Correspondence::new(0, 3, 1.0)];
        let result = GmsFilter::new(&query, IMAGE, &refer, IMAGE, &matches, GmsConfig::default());
        assert!(matches!(
            result,
            Err(GmsError::MatchOutOfBounds {
                match_index: 0,
                keypoint_index: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_dense_cell_is_accepted() {
        // 5 votes in an interior cell against threshold 6*sqrt(5/9) ~ 4.47
        let (query, refer, matches) = coherent_cluster(5);
        let filter = GmsFilter::new(
            &query,
            IMAGE,
            &refer,
            IMAGE,
            &matches,
            GmsConfig::translation_only(),
        )
        .unwrap();
        let mask = filter.inlier_mask();
        assert_eq!(count_inliers(&mask), 5);
    }

    #[test]
    fn test_sparse_cell_is_rejected() {
        // 3 votes fall short of 6*sqrt(3/9) ~ 3.46
        let (query, refer, matches) = coherent_cluster(3);
        let filter = GmsFilter::new(
            &query,
            IMAGE,
            &refer,
            IMAGE,
            &matches,
            GmsConfig::translation_only(),
        )
        .unwrap();
        let mask = filter.inlier_mask();
        assert_eq!(count_inliers(&mask), 0);
    }

    #[test]
    fn test_far_edge_points_never_match() {
        // Both keypoints sit exactly on the far image corner: every grid
        // lookup is out of range, so nothing can vote
        let query = vec![Keypoint::new(200.0, 200.0)];
        let refer = vec![Keypoint::new(200.0, 200.0)];
        let matches = identity_matches(1);
        let filter = GmsFilter::new(
            &query,
            IMAGE,
            &refer,
            IMAGE,
            &matches,
            GmsConfig::default(),
        )
        .unwrap();
        assert_eq!(filter.inlier_mask(), vec![false]);
    }

    #[test]
    fn test_rotated_block_needs_rotation_search() {
        // A 3x3 block of cells around (5,5), 5 matches each, mapped through
        // a 180-degree rotation onto the block around (14,14)
        let mut query = Vec::new();
        let mut refer = Vec::new();
        for cy in 4..=6 {
            for cx in 4..=6 {
                for i in 0..5 {
                    let t = i as f32 / 5.0;
                    query.push(kp_in_cell(cx, cy, t));
                    refer.push(kp_in_cell(19 - cx, 19 - cy, t));
                }
            }
        }
        let matches = identity_matches(45);

        let fixed = GmsFilter::new(
            &query,
            IMAGE,
            &refer,
            IMAGE,
            &matches,
            GmsConfig::translation_only(),
        )
        .unwrap();
        // Only the center slot of each neighborhood aligns without rotation:
        // support stays at 5 against a threshold of 6*sqrt(45/9) and below
        assert_eq!(count_inliers(&fixed.inlier_mask()), 0);

        let rotating = GmsFilter::new(
            &query,
            IMAGE,
            &refer,
            IMAGE,
            &matches,
            GmsConfig::translation_only().with_rotation_search(true),
        )
        .unwrap();
        assert_eq!(count_inliers(&rotating.inlier_mask()), 45);
    }

    #[test]
    fn test_search_is_monotonic() {
        let (query, refer, matches) = cluster_with_noise();
        let counts: Vec<usize> = [
            GmsConfig::translation_only(),
            GmsConfig::translation_only().with_rotation_search(true),
            GmsConfig::default(),
        ]
        .into_iter()
        .map(|cfg| {
            let filter = GmsFilter::new(&query, IMAGE, &refer, IMAGE, &matches, cfg).unwrap();
            count_inliers(&filter.inlier_mask())
        })
        .collect();
        assert!(counts[1] >= counts[0]);
        assert!(counts[2] >= counts[1]);
    }

    #[test]
    fn test_cluster_survives_scattered_noise() {
        let (query, refer, matches) = cluster_with_noise();
        let filter =
            GmsFilter::new(&query, IMAGE, &refer, IMAGE, &matches, GmsConfig::default()).unwrap();
        let mask = filter.inlier_mask();

        // The coherent 50 all survive under every hypothesis, so they must
        // survive under the winning one
        assert!(mask[..50].iter().all(|&m| m));

        // Scattered cells stay below the support threshold apart from rare
        // coincidental alignments
        let retained = count_inliers(&mask);
        assert!(
            (45..=60).contains(&retained),
            "retained {} matches",
            retained
        );
    }

    #[test]
    fn test_deterministic_across_runs() {
        let (query, refer, matches) = cluster_with_noise();
        let filter =
            GmsFilter::new(&query, IMAGE, &refer, IMAGE, &matches, GmsConfig::default()).unwrap();
        let first = filter.inlier_mask();
        let second = filter.inlier_mask();
        assert_eq!(first, second);
    }

    #[test]
    fn test_tiny_grid_survives_scale_search() {
        // A 1x1 left grid collapses to zero right cells at the downscale
        // ratios; those hypotheses must be skipped, not faulted
        let (query, refer, matches) = coherent_cluster(5);
        let cfg = GmsConfig::new(1, 1).with_rotation_search(false);
        let filter = GmsFilter::new(&query, IMAGE, &refer, IMAGE, &matches, cfg).unwrap();
        let mask = filter.inlier_mask();
        assert_eq!(mask.len(), 5);
    }

    #[test]
    fn test_isolated_corner_cell() {
        // All matches in the top-left cell of a 2x2 grid: 4 of 9 neighbor
        // slots are valid, support is the cell itself
        let query: Vec<Keypoint> = (0..8).map(|i| Keypoint::new(10.0 + i as f32, 20.0)).collect();
        let refer = query.clone();
        let matches = identity_matches(8);
        let cfg = GmsConfig::new(2, 2)
            .with_rotation_search(false)
            .with_scale_search(false);
        let filter = GmsFilter::new(&query, IMAGE, &refer, IMAGE, &matches, cfg).unwrap();
        // score 8 against 6*sqrt(8/4) ~ 8.49: rejected
        assert_eq!(count_inliers(&filter.inlier_mask()), 0);
    }
}
