// Chart request model: what the client asks to be drawn

use crate::error::ChartError;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_TITLE: &str = "Generated Chart";

/// The closed set of chart kinds the resolver knows how to shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartKind {
    Scatter,
    Histogram,
    Barchart,
    Piechart,
    Line,
    Boxplot,
    Heatmap,
    Bubble,
}

impl ChartKind {
    pub const ALL: [ChartKind; 8] = [
        ChartKind::Scatter,
        ChartKind::Histogram,
        ChartKind::Barchart,
        ChartKind::Piechart,
        ChartKind::Line,
        ChartKind::Boxplot,
        ChartKind::Heatmap,
        ChartKind::Bubble,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Scatter => "scatter",
            ChartKind::Histogram => "histogram",
            ChartKind::Barchart => "barchart",
            ChartKind::Piechart => "piechart",
            ChartKind::Line => "line",
            ChartKind::Boxplot => "boxplot",
            ChartKind::Heatmap => "heatmap",
            ChartKind::Bubble => "bubble",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartKind {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChartKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ChartError::UnsupportedChartType(s.to_string()))
    }
}

/// Wire shape of the request body. Every key is optional so that a missing
/// or unknown `type` surfaces as an unsupported-kind error rather than a
/// deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChartRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub x_col: Option<String>,
    pub y_col: Option<String>,
    pub y_cols: Option<Vec<String>>,
    pub category_col: Option<String>,
    pub value_col: Option<String>,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub table_data: Option<Value>,
    pub boxplot_col: Option<String>,
    pub boxplot_category_col: Option<String>,
    pub size_col: Option<String>,
    pub color_col: Option<String>,
    pub use_different_line_styles: Option<bool>,
}

/// Validated chart request. Column references are still plain names; they
/// are resolved against the table by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRequest {
    pub kind: ChartKind,
    pub title: String,
    pub x_col: Option<String>,
    pub y_col: Option<String>,
    pub y_cols: Vec<String>,
    pub category_col: Option<String>,
    pub value_col: Option<String>,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub table_data: Option<Value>,
    pub boxplot_col: Option<String>,
    pub boxplot_category_col: Option<String>,
    pub size_col: Option<String>,
    pub color_col: Option<String>,
    pub use_different_line_styles: bool,
}

impl ChartRequest {
    /// A request of the given kind with every option unset.
    pub fn new(kind: ChartKind) -> Self {
        Self {
            kind,
            title: DEFAULT_TITLE.to_string(),
            x_col: None,
            y_col: None,
            y_cols: Vec::new(),
            category_col: None,
            value_col: None,
            x_label: None,
            y_label: None,
            table_data: None,
            boxplot_col: None,
            boxplot_category_col: None,
            size_col: None,
            color_col: None,
            use_different_line_styles: false,
        }
    }

    /// Parse a JSON body into a validated request.
    pub fn from_json_slice(body: &[u8]) -> Result<Self, ChartError> {
        let raw: RawChartRequest = serde_json::from_slice(body)
            .map_err(|e| ChartError::MalformedRequest(e.to_string()))?;
        Self::try_from(raw)
    }
}

impl TryFrom<RawChartRequest> for ChartRequest {
    type Error = ChartError;

    fn try_from(raw: RawChartRequest) -> Result<Self, Self::Error> {
        let kind = match raw.kind.as_deref() {
            Some(name) => name.parse::<ChartKind>()?,
            None => return Err(ChartError::UnsupportedChartType("<none>".to_string())),
        };

        Ok(Self {
            kind,
            title: raw.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            x_col: non_empty(raw.x_col),
            y_col: non_empty(raw.y_col),
            y_cols: raw.y_cols.unwrap_or_default(),
            category_col: non_empty(raw.category_col),
            value_col: non_empty(raw.value_col),
            x_label: non_empty(raw.x_label),
            y_label: non_empty(raw.y_label),
            table_data: raw.table_data,
            boxplot_col: non_empty(raw.boxplot_col),
            boxplot_category_col: non_empty(raw.boxplot_category_col),
            size_col: non_empty(raw.size_col),
            color_col: non_empty(raw.color_col),
            use_different_line_styles: raw.use_different_line_styles.unwrap_or(false),
        })
    }
}

// Empty strings count as "not given", the same as an absent key.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
