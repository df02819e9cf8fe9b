#[derive(Debug, Clone)]
pub enum GmsError {
    InvalidGridSize { width: usize, height: usize },
    InvalidAlpha(f64),
    InvalidImageSize { width: usize, height: usize },
    MatchOutOfBounds { match_index: usize, keypoint_index: usize, keypoint_count: usize },
}

impl std::fmt::Display for GmsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GmsError::InvalidGridSize { width, height } => {
                write!(f, "Invalid grid resolution: {}x{} (must be > 0)", width, height)
            }
            GmsError::InvalidAlpha(a) => {
                write!(f, "Invalid support factor alpha: {} (must be finite and > 0)", a)
            }
            GmsError::InvalidImageSize { width, height } => {
                write!(f, "Invalid image dimensions: {}x{} (must be > 0)", width, height)
            }
            GmsError::MatchOutOfBounds { match_index, keypoint_index, keypoint_count } => {
                write!(
                    f,
                    "Match {} references keypoint {} but only {} keypoints were given",
                    match_index, keypoint_index, keypoint_count
                )
            }
        }
    }
}

impl std::error::Error for GmsError {}

pub type GmsResult<T> = Result<T, GmsError>;
