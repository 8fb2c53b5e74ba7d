use crate::request::ChartKind;
use crate::transform;

// =============================================================================
// Plot Instruction: the resolver's output and the renderer's only input
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PlotInstruction {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Xy(Series),
    MultiSeries(Vec<Series>),
    Histogram(Histogram),
    CategoryCounts(CategoryCounts),
    GroupedBars(GroupedBars),
    BoxGroups(Vec<NamedValues>),
    Heatmap(HeatmapGrid),
    Bubble(BubbleSeries),
}

/// Line dash pattern assigned to a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineDash {
    #[default]
    Solid,
    Dashed,
    Dotted,
    DashDot,
}

impl LineDash {
    pub const CYCLE: [LineDash; 4] = [
        LineDash::Solid,
        LineDash::Dashed,
        LineDash::Dotted,
        LineDash::DashDot,
    ];

    /// On/off lengths in pixels; empty means a continuous stroke.
    pub fn pattern(&self) -> &'static [f64] {
        match self {
            LineDash::Solid => &[],
            LineDash::Dashed => &[8.0, 5.0],
            LineDash::Dotted => &[2.0, 4.0],
            LineDash::DashDot => &[8.0, 4.0, 2.0, 4.0],
        }
    }
}

/// Paired x/y points, row alignment preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub dash: LineDash,
}

impl Series {
    pub fn new(name: impl Into<String>, x: Vec<f64>, y: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            dash: LineDash::Solid,
        }
    }

    pub fn points(&self) -> Vec<(f64, f64)> {
        self.x.iter().copied().zip(self.y.iter().copied()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub values: Vec<f64>,
    pub bins: usize,
}

impl Histogram {
    pub fn bin_counts(&self) -> Vec<transform::Bin> {
        transform::bin_values(&self.values, self.bins)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCounts {
    pub labels: Vec<String>,
    pub counts: Vec<f64>,
}

impl CategoryCounts {
    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }
}

/// A named sample of numeric values (one box, one bar series, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValues {
    pub name: String,
    pub values: Vec<f64>,
}

/// One series per numeric column, all indexed by the same rows.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedBars {
    pub row_labels: Vec<String>,
    pub series: Vec<BarSeries>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    pub name: String,
    /// `None` where the cell was missing
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapGrid {
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    /// Row-major, `values[row][col]`
    pub values: Vec<Vec<Option<f64>>>,
}

impl HeatmapGrid {
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let mut cells = self.values.iter().flatten().flatten().copied();
        let first = cells.next()?;
        Some(cells.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BubbleSeries {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Marker area, already scaled
    pub size: Vec<f64>,
    pub color: Option<BubbleColor>,
    /// Name of the column bubble size represents
    pub size_label: Option<String>,
    pub color_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BubbleColor {
    Continuous(Vec<f64>),
    Categorical {
        /// Index into `labels`, `None` for a missing cell
        codes: Vec<Option<usize>>,
        labels: Vec<String>,
    },
}
