/// Key-point position normalized by image width/height; inside [0, 1) for
/// points strictly inside the image, exactly 1.0 on the far edges
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct NormPoint {
    pub x: f32,
    pub y: f32,
}

/// Final state of one left-grid cell after voting and support thresholding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CellPairing {
    /// No correspondence voted from this cell
    Empty,
    /// Cell paired with the given right-grid cell
    Paired(usize),
    /// A tentative pairing existed but fell below the support threshold
    Rejected,
}
