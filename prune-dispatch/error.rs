use prune_gms::GmsError;

#[derive(Debug, Clone)]
pub enum PrunerError {
    EmptyInput,
    EmptyCandidateList { query: usize },
    RatioNeedsTwoCandidates { knn: usize },
    UnevenCandidateLists { expected: usize, found: usize, query: usize },
    MisindexedCandidateList { list_index: usize, query: usize },
    CorrespondenceOutOfBounds { query: usize, refer: usize },
    LpmOutputMismatch { expected: usize, costs: usize, labels: usize },
    Gms(GmsError),
}

impl std::fmt::Display for PrunerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrunerError::EmptyInput => {
                write!(f, "No putative correspondences to prune")
            }
            PrunerError::EmptyCandidateList { query } => {
                write!(f, "Query {} has an empty candidate list", query)
            }
            PrunerError::RatioNeedsTwoCandidates { knn } => {
                write!(f, "Ratio test needs at least 2 candidates per query, got {}", knn)
            }
            PrunerError::UnevenCandidateLists { expected, found, query } => {
                write!(
                    f,
                    "Candidate list length mismatch: expected {}, got {} for query {}",
                    expected, found, query
                )
            }
            PrunerError::MisindexedCandidateList { list_index, query } => {
                write!(
                    f,
                    "Candidate list {} holds correspondences for query {}",
                    list_index, query
                )
            }
            PrunerError::CorrespondenceOutOfBounds { query, refer } => {
                write!(
                    f,
                    "Correspondence ({}, {}) references a missing keypoint",
                    query, refer
                )
            }
            PrunerError::LpmOutputMismatch { expected, costs, labels } => {
                write!(
                    f,
                    "LPM output misaligned: expected {} entries, got {} costs and {} labels",
                    expected, costs, labels
                )
            }
            PrunerError::Gms(e) => write!(f, "GMS error: {}", e),
        }
    }
}

impl std::error::Error for PrunerError {}

impl From<GmsError> for PrunerError {
    fn from(err: GmsError) -> Self {
        PrunerError::Gms(err)
    }
}

pub type PrunerResult<T> = Result<T, PrunerError>;
