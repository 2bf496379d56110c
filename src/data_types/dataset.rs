use super::dimension::DimensionTag;
use super::viewport::ViewportRange;
use serde::{Deserialize, Serialize};

/// One rendered sample in display units.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartPoint {
    /// Unix seconds.
    pub x: f64,
    pub y: f64,
    /// Isolated sample, drawn as a discrete marker rather than a segment.
    pub singleton: bool,
}

impl ChartPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            singleton: false,
        }
    }
}

/// The decimated sequence currently displayed for one dimension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartDataset {
    pub dimension: DimensionTag,
    pub points: Vec<ChartPoint>,
    /// Time range the points were drawn from, if produced by a viewport job.
    pub source_range: Option<ViewportRange>,
    pub job: Option<u64>,
}

impl ChartDataset {
    pub fn empty(dimension: DimensionTag) -> Self {
        Self {
            dimension,
            points: Vec::new(),
            source_range: None,
            job: None,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// No data: the chart shows its explicit empty state.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last_x(&self) -> Option<f64> {
        self.points.last().map(|p| p.x)
    }

    /// (y_min, y_max) over the dataset.
    pub fn y_bounds(&self) -> Option<(f64, f64)> {
        self.points.iter().fold(None, |acc, p| match acc {
            None => Some((p.y, p.y)),
            Some((lo, hi)) => Some((lo.min(p.y), hi.max(p.y))),
        })
    }
}
