// Chart resolver: dispatches on chart kind and shapes the table into a
// renderer-ready PlotInstruction.

use crate::data::{Column, Table};
use crate::error::{ChartError, Result};
use crate::fallback::{FallbackProvider, CATEGORY_COLUMN, NUMERIC_COLUMNS, VALUE_COLUMN};
use crate::ir::{
    BarSeries, BubbleColor, BubbleSeries, CategoryCounts, GroupedBars, HeatmapGrid, Histogram,
    LineDash, NamedValues, Payload, PlotInstruction, Series,
};
use crate::request::{ChartKind, ChartRequest};
use crate::transform;
use tracing::{debug, warn};

pub const HISTOGRAM_BINS: usize = 10;

/// Resolve a request against the loaded table.
///
/// `table` is `None` when the request carried no usable data; every kind
/// then draws from `fallback` instead.
pub fn resolve(
    request: &ChartRequest,
    table: Option<&Table>,
    fallback: &FallbackProvider,
) -> Result<PlotInstruction> {
    let ctx = Resolver { request, fallback };
    match request.kind {
        ChartKind::Scatter => ctx.scatter(table),
        ChartKind::Histogram => ctx.histogram(table),
        ChartKind::Barchart => ctx.barchart(table),
        ChartKind::Piechart => ctx.piechart(table),
        ChartKind::Line => ctx.line(table),
        ChartKind::Boxplot => ctx.boxplot(table),
        ChartKind::Heatmap => ctx.heatmap(table),
        ChartKind::Bubble => ctx.bubble(table),
    }
}

struct Resolver<'a> {
    request: &'a ChartRequest,
    fallback: &'a FallbackProvider,
}

impl<'a> Resolver<'a> {
    fn kind(&self) -> ChartKind {
        self.request.kind
    }

    fn invalid(&self, reason: impl Into<String>) -> ChartError {
        ChartError::invalid_config(self.kind(), reason)
    }

    /// Assemble the instruction, preferring user supplied axis labels.
    fn instruction(&self, x_default: Option<&str>, y_default: Option<&str>, payload: Payload) -> PlotInstruction {
        PlotInstruction {
            kind: self.kind(),
            title: self.request.title.clone(),
            x_label: self.request.x_label.clone().or_else(|| x_default.map(str::to_string)),
            y_label: self.request.y_label.clone().or_else(|| y_default.map(str::to_string)),
            payload,
        }
    }

    /// Look up an optional column reference; `None` if unset or absent.
    fn lookup<'t>(&self, table: &'t Table, name: Option<&String>) -> Option<&'t Column> {
        name.and_then(|n| table.column(n))
    }

    /// Look up a mandatory column reference, naming the config key on failure.
    fn require<'t>(&self, table: &'t Table, name: Option<&String>, key: &str) -> Result<&'t Column> {
        let name = name.ok_or_else(|| self.invalid(format!("'{}' is required", key)))?;
        table
            .column(name)
            .ok_or_else(|| self.invalid(format!("column '{}' ({}) not found", name, key)))
    }

    // -------------------------------------------------------------------------
    // scatter
    // -------------------------------------------------------------------------

    fn scatter(&self, table: Option<&Table>) -> Result<PlotInstruction> {
        let columns = table.and_then(|t| {
            let x = self.lookup(t, self.request.x_col.as_ref())?;
            let y = self.lookup(t, self.request.y_col.as_ref())?;
            Some((x, y))
        });

        let Some((x_col, y_col)) = columns else {
            debug!("scatter: using placeholder data");
            let [x_name, y_name] = NUMERIC_COLUMNS;
            let series = Series::new(
                y_name,
                self.fallback.numeric_values(x_name),
                self.fallback.numeric_values(y_name),
            );
            return Ok(self.instruction(Some(x_name), Some(y_name), Payload::Xy(series)));
        };

        let (x, y): (Vec<f64>, Vec<f64>) = x_col
            .numbers()
            .into_iter()
            .zip(y_col.numbers())
            .filter_map(|(x, y)| Some((x?, y?)))
            .unzip();

        if x.is_empty() {
            return Err(self.invalid(format!(
                "columns '{}' and '{}' have no rows where both are numeric",
                x_col.name, y_col.name
            )));
        }

        let series = Series::new(y_col.name.clone(), x, y);
        Ok(self.instruction(Some(x_col.name.as_str()), Some(y_col.name.as_str()), Payload::Xy(series)))
    }

    // -------------------------------------------------------------------------
    // histogram
    // -------------------------------------------------------------------------

    fn histogram(&self, table: Option<&Table>) -> Result<PlotInstruction> {
        let column = table.and_then(|t| self.lookup(t, self.request.x_col.as_ref()));

        let (label, values) = match column {
            Some(col) => (col.name.clone(), col.present_numbers()),
            None => {
                debug!("histogram: using placeholder data");
                let name = NUMERIC_COLUMNS[0];
                (name.to_string(), self.fallback.numeric_values(name))
            }
        };

        if values.is_empty() {
            return Err(self.invalid(format!(
                "no valid numeric data found in column '{}' (xCol)",
                label
            )));
        }

        let payload = Payload::Histogram(Histogram {
            values,
            bins: HISTOGRAM_BINS,
        });
        Ok(self.instruction(Some(label.as_str()), Some("Frequency"), payload))
    }

    // -------------------------------------------------------------------------
    // barchart
    // -------------------------------------------------------------------------

    fn barchart(&self, table: Option<&Table>) -> Result<PlotInstruction> {
        let Some(table) = table else {
            debug!("barchart: counting placeholder categories");
            let counts = self.placeholder_category_counts();
            return Ok(self.instruction(Some(CATEGORY_COLUMN), Some("Count"), counts));
        };

        let numeric = table.numeric_columns();
        if numeric.is_empty() {
            return Err(self.invalid("bar chart requires at least one numeric column in the provided data"));
        }

        let series = numeric
            .iter()
            .map(|col| BarSeries {
                name: col.name.clone(),
                values: col.numbers(),
            })
            .collect();
        let payload = Payload::GroupedBars(GroupedBars {
            row_labels: row_index_labels(table),
            series,
        });
        Ok(self.instruction(Some("Row Index"), Some("Values"), payload))
    }

    fn placeholder_category_counts(&self) -> Payload {
        let labels: Vec<String> = self
            .fallback
            .categorical
            .column(CATEGORY_COLUMN)
            .map(|c| c.cells.iter().filter_map(|cell| cell.label()).collect())
            .unwrap_or_default();
        let (labels, counts) = transform::frequency_counts(labels.iter().map(String::as_str));
        Payload::CategoryCounts(CategoryCounts { labels, counts })
    }

    // -------------------------------------------------------------------------
    // piechart
    // -------------------------------------------------------------------------

    fn piechart(&self, table: Option<&Table>) -> Result<PlotInstruction> {
        let Some(table) = table else {
            debug!("piechart: counting placeholder categories");
            return Ok(self.instruction(None, None, self.placeholder_category_counts()));
        };

        let category = self.require(table, self.request.category_col.as_ref(), "categoryCol")?;
        let labels: Vec<Option<String>> = category.cells.iter().map(|c| c.label()).collect();
        let (order, counts) =
            transform::frequency_counts(labels.iter().flatten().map(String::as_str));

        if order.is_empty() {
            return Err(self.invalid(format!(
                "no data found in category column '{}' (categoryCol)",
                category.name
            )));
        }

        let counts = match self.lookup(table, self.request.value_col.as_ref()) {
            Some(value_col) => match weighted_counts(&order, &labels, value_col) {
                Ok(sums) => sums,
                Err(reason) => {
                    warn!(
                        "Could not use value column '{}' for pie chart weights: {}, using counts instead",
                        value_col.name, reason
                    );
                    counts
                }
            },
            None => counts,
        };

        let payload = Payload::CategoryCounts(CategoryCounts { labels: order, counts });
        Ok(self.instruction(None, None, payload))
    }

    // -------------------------------------------------------------------------
    // line
    // -------------------------------------------------------------------------

    fn line(&self, table: Option<&Table>) -> Result<PlotInstruction> {
        let Some(table) = table else {
            debug!("line: using placeholder data");
            let name = NUMERIC_COLUMNS[1];
            let y = self.fallback.numeric_values(name);
            let x = (0..y.len()).map(|i| i as f64).collect();
            let payload = Payload::MultiSeries(vec![Series::new(name, x, y)]);
            return Ok(self.instruction(Some("Index"), Some(name), payload));
        };

        if self.request.y_cols.is_empty() {
            return Err(self.invalid("no Y-axis columns selected (yCols)"));
        }

        let mut series = Vec::new();
        for name in &self.request.y_cols {
            let Some(col) = table.column(name).filter(|c| c.is_numeric()) else {
                warn!("Selected column '{}' not found or not numeric, skipping", name);
                continue;
            };

            let dash = if self.request.use_different_line_styles {
                LineDash::CYCLE[series.len() % LineDash::CYCLE.len()]
            } else {
                LineDash::Solid
            };
            let (x, y): (Vec<f64>, Vec<f64>) = col
                .numbers()
                .into_iter()
                .enumerate()
                .filter_map(|(i, v)| Some((i as f64, v?)))
                .unzip();
            series.push(Series {
                name: col.name.clone(),
                x,
                y,
                dash,
            });
        }

        if series.is_empty() {
            return Err(self.invalid(format!(
                "none of the selected Y-axis columns {:?} contain valid numeric data",
                self.request.y_cols
            )));
        }

        Ok(self.instruction(Some("Row Index"), Some("Values"), Payload::MultiSeries(series)))
    }

    // -------------------------------------------------------------------------
    // boxplot
    // -------------------------------------------------------------------------

    fn boxplot(&self, table: Option<&Table>) -> Result<PlotInstruction> {
        let Some(table) = table else {
            debug!("boxplot: grouping placeholder values by category");
            let groups = group_by_category(&self.fallback.categorical, VALUE_COLUMN, CATEGORY_COLUMN);
            return Ok(self.instruction(Some(CATEGORY_COLUMN), Some(VALUE_COLUMN), Payload::BoxGroups(groups)));
        };

        let category = self.lookup(table, self.request.boxplot_category_col.as_ref());
        match category {
            Some(cat) if !cat.is_numeric() => return self.grouped_boxplot(table, cat),
            Some(cat) => {
                warn!(
                    "Selected category column '{}' is numeric, plotting all numeric columns instead",
                    cat.name
                );
            }
            None => {}
        }

        let groups: Vec<NamedValues> = table
            .numeric_columns()
            .into_iter()
            .map(|col| NamedValues {
                name: col.name.clone(),
                values: col.present_numbers(),
            })
            .collect();
        if groups.is_empty() {
            return Err(self.invalid("box plot requires numeric data"));
        }

        Ok(self.instruction(None, Some("Values"), Payload::BoxGroups(groups)))
    }

    fn grouped_boxplot(&self, table: &Table, category: &Column) -> Result<PlotInstruction> {
        let value = self
            .lookup(table, self.request.boxplot_col.as_ref())
            .filter(|c| c.is_numeric())
            .ok_or_else(|| {
                self.invalid(format!(
                    "grouped box plot by '{}' requires a valid numeric column selection (boxplotCol)",
                    category.name
                ))
            })?;

        let groups = group_by_category(table, &value.name, &category.name);
        if groups.is_empty() {
            return Err(self.invalid(format!(
                "no rows with both '{}' and '{}' present",
                value.name, category.name
            )));
        }

        Ok(self.instruction(Some(category.name.as_str()), Some(value.name.as_str()), Payload::BoxGroups(groups)))
    }

    // -------------------------------------------------------------------------
    // heatmap
    // -------------------------------------------------------------------------

    fn heatmap(&self, table: Option<&Table>) -> Result<PlotInstruction> {
        let Some(table) = table else {
            // Placeholder heatmap shows correlation rather than raw values
            debug!("heatmap: correlating placeholder columns");
            let columns: Vec<&Column> = self.fallback.numeric.numeric_columns();
            let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
            let values: Vec<Vec<Option<f64>>> = columns.iter().map(|c| c.numbers()).collect();
            let payload = Payload::Heatmap(HeatmapGrid {
                row_labels: names.clone(),
                col_labels: names,
                values: transform::correlation_matrix(&values),
            });
            return Ok(self.instruction(None, None, payload));
        };

        let numeric = table.numeric_columns();
        if numeric.is_empty() {
            return Err(self.invalid("Heatmap requires numeric data."));
        }

        let by_column: Vec<Vec<Option<f64>>> = numeric.iter().map(|c| c.numbers()).collect();
        let values = (0..table.row_count())
            .map(|row| by_column.iter().map(|col| col[row]).collect())
            .collect();
        let payload = Payload::Heatmap(HeatmapGrid {
            row_labels: row_index_labels(table),
            col_labels: numeric.iter().map(|c| c.name.clone()).collect(),
            values,
        });
        Ok(self.instruction(None, None, payload))
    }

    // -------------------------------------------------------------------------
    // bubble
    // -------------------------------------------------------------------------

    fn bubble(&self, table: Option<&Table>) -> Result<PlotInstruction> {
        let Some(table) = table else {
            debug!("bubble: using placeholder data with random size and color");
            let [x_name, y_name] = NUMERIC_COLUMNS;
            let payload = Payload::Bubble(BubbleSeries {
                x: self.fallback.numeric_values(x_name),
                y: self.fallback.numeric_values(y_name),
                size: self.fallback.bubble_sizes.clone(),
                color: Some(BubbleColor::Continuous(self.fallback.bubble_colors.clone())),
                size_label: None,
                color_label: Some("Random Color".to_string()),
            });
            return Ok(self.instruction(Some(x_name), Some(y_name), payload));
        };

        let x_col = self.require(table, self.request.x_col.as_ref(), "xCol")?;
        let y_col = self.require(table, self.request.y_col.as_ref(), "yCol")?;
        let size_col = self.require(table, self.request.size_col.as_ref(), "sizeCol")?;

        let kept: Vec<(usize, f64, f64, f64)> = x_col
            .numbers()
            .into_iter()
            .zip(y_col.numbers())
            .zip(size_col.numbers())
            .enumerate()
            .filter_map(|(row, ((x, y), s))| Some((row, x?, y?, s?)))
            .collect();

        if kept.is_empty() {
            return Err(self.invalid(format!(
                "no rows where '{}', '{}' and '{}' are all numeric",
                x_col.name, y_col.name, size_col.name
            )));
        }

        let raw_sizes: Vec<f64> = kept.iter().map(|k| k.3).collect();
        let color_col = self.lookup(table, self.request.color_col.as_ref());
        let color = color_col.map(|col| {
            let cells: Vec<_> = kept.iter().map(|k| &col.cells[k.0]).collect();
            let numeric: Option<Vec<f64>> = cells.iter().map(|c| c.as_number()).collect();
            match numeric {
                Some(values) => BubbleColor::Continuous(values),
                None => {
                    let labels: Vec<Option<String>> = cells.iter().map(|c| c.label()).collect();
                    let (codes, labels) = transform::factorize(&labels);
                    BubbleColor::Categorical { codes, labels }
                }
            }
        });

        let payload = Payload::Bubble(BubbleSeries {
            x: kept.iter().map(|k| k.1).collect(),
            y: kept.iter().map(|k| k.2).collect(),
            size: transform::scale_bubble_sizes(&raw_sizes),
            color,
            size_label: Some(size_col.name.clone()),
            color_label: color_col.map(|c| c.name.clone()),
        });
        Ok(self.instruction(Some(x_col.name.as_str()), Some(y_col.name.as_str()), payload))
    }
}

fn row_index_labels(table: &Table) -> Vec<String> {
    (0..table.row_count()).map(|i| i.to_string()).collect()
}

/// Values of `value` grouped by the label in `category`; rows missing either are dropped.
fn group_by_category(table: &Table, value: &str, category: &str) -> Vec<NamedValues> {
    let (Some(value), Some(category)) = (table.column(value), table.column(category)) else {
        return Vec::new();
    };
    let pairs = category
        .cells
        .iter()
        .zip(value.numbers())
        .filter_map(|(cat, v)| Some((cat.label()?, v?)));
    transform::group_values(pairs)
        .into_iter()
        .map(|(name, values)| NamedValues { name, values })
        .collect()
}

/// Per-category sums of the value column.
///
/// Fails (and the caller reverts to plain counts) when a present value is not
/// numeric or the resulting weights cannot be drawn as a pie.
fn weighted_counts(
    order: &[String],
    labels: &[Option<String>],
    value_col: &Column,
) -> std::result::Result<Vec<f64>, String> {
    let mut pairs = Vec::new();
    for (label, cell) in labels.iter().zip(&value_col.cells) {
        let Some(label) = label else { continue };
        if cell.is_missing() {
            continue;
        }
        let v = cell
            .as_number()
            .ok_or_else(|| format!("value {:?} is not numeric", cell))?;
        pairs.push((label.clone(), v));
    }

    let sums = transform::sum_by_label(order, pairs);
    if sums.iter().any(|s| *s < 0.0) {
        return Err("negative weights".to_string());
    }
    if sums.iter().all(|s| *s == 0.0) {
        return Err("all weights are zero".to_string());
    }
    Ok(sums)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::load;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::{json, Value};

    fn fallback() -> FallbackProvider {
        FallbackProvider::new(&mut StdRng::seed_from_u64(42))
    }

    fn run(request: &ChartRequest, rows: Value) -> Result<PlotInstruction> {
        let table = load(&rows);
        resolve(request, table.as_ref(), &fallback())
    }

    fn request(kind: ChartKind) -> ChartRequest {
        ChartRequest::new(kind)
    }

    fn assert_invalid(result: Result<PlotInstruction>, needle: &str) {
        match result {
            Err(err @ ChartError::InvalidConfig { .. }) => {
                let msg = err.to_string();
                assert!(msg.contains(needle), "'{}' does not mention '{}'", msg, needle);
            }
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }

    // scatter

    #[test]
    fn test_scatter_pairs_and_drops() {
        let mut req = request(ChartKind::Scatter);
        req.x_col = Some("a".into());
        req.y_col = Some("b".into());
        let rows = json!([
            {"a": 1, "b": "10"},
            {"a": "x", "b": 20},
            {"a": 3, "b": null},
            {"a": 4, "b": 40},
        ]);
        let instr = run(&req, rows).unwrap();
        assert_eq!(instr.x_label.as_deref(), Some("a"));
        assert_eq!(instr.y_label.as_deref(), Some("b"));
        match instr.payload {
            Payload::Xy(s) => {
                assert_eq!(s.x, vec![1.0, 4.0]);
                assert_eq!(s.y, vec![10.0, 40.0]);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_scatter_missing_config_uses_placeholder() {
        let mut req = request(ChartKind::Scatter);
        req.x_col = Some("a".into());
        req.y_col = Some("nope".into());
        let instr = run(&req, json!([{"a": 1}])).unwrap();
        assert_eq!(instr.x_label.as_deref(), Some("Random_X"));
        match instr.payload {
            Payload::Xy(s) => assert_eq!(s.x.len(), 50),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_scatter_no_numeric_pairs() {
        let mut req = request(ChartKind::Scatter);
        req.x_col = Some("a".into());
        req.y_col = Some("b".into());
        assert_invalid(run(&req, json!([{"a": "x", "b": 1}])), "'a'");
    }

    #[test]
    fn test_user_labels_win() {
        let mut req = request(ChartKind::Scatter);
        req.x_label = Some("Height".into());
        let instr = run(&req, json!([])).unwrap();
        assert_eq!(instr.x_label.as_deref(), Some("Height"));
        assert_eq!(instr.y_label.as_deref(), Some("Random_Y"));
    }

    // histogram

    #[test]
    fn test_histogram_drops_unparseable() {
        let mut req = request(ChartKind::Histogram);
        req.x_col = Some("age".into());
        let instr = run(&req, json!([{"age": "30"}, {"age": "abc"}, {"age": "40"}])).unwrap();
        assert_eq!(instr.y_label.as_deref(), Some("Frequency"));
        match instr.payload {
            Payload::Histogram(h) => {
                assert_eq!(h.values, vec![30.0, 40.0]);
                assert_eq!(h.bins, 10);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_histogram_empty_numeric_set() {
        let mut req = request(ChartKind::Histogram);
        req.x_col = Some("name".into());
        assert_invalid(run(&req, json!([{"name": "a"}, {"name": "b"}])), "name");
    }

    #[test]
    fn test_histogram_without_column_uses_placeholder() {
        let req = request(ChartKind::Histogram);
        let instr = run(&req, json!([{"a": 1}])).unwrap();
        assert_eq!(instr.x_label.as_deref(), Some("Random_X"));
        match instr.payload {
            Payload::Histogram(h) => assert_eq!(h.values.len(), 50),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    // barchart

    #[test]
    fn test_barchart_numeric_columns_in_order() {
        let req = request(ChartKind::Barchart);
        let rows = json!([
            {"name": "a", "q1": 1, "q2": 5},
            {"name": "b", "q1": 2},
        ]);
        let instr = run(&req, rows).unwrap();
        assert_eq!(instr.x_label.as_deref(), Some("Row Index"));
        match instr.payload {
            Payload::GroupedBars(bars) => {
                assert_eq!(bars.row_labels, vec!["0", "1"]);
                let names: Vec<_> = bars.series.iter().map(|s| s.name.as_str()).collect();
                assert_eq!(names, vec!["q1", "q2"]);
                assert_eq!(bars.series[1].values, vec![Some(5.0), None]);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_barchart_requires_numeric() {
        let req = request(ChartKind::Barchart);
        assert_invalid(run(&req, json!([{"name": "a"}])), "numeric");
    }

    #[test]
    fn test_barchart_empty_table_counts_placeholder() {
        let req = request(ChartKind::Barchart);
        let instr = run(&req, json!([])).unwrap();
        assert_eq!(instr.x_label.as_deref(), Some("Category"));
        assert_eq!(instr.y_label.as_deref(), Some("Count"));
        match instr.payload {
            Payload::CategoryCounts(c) => {
                assert!(c.labels.len() <= 5);
                assert!(c.labels.iter().all(|l| ["A", "B", "C", "D", "E"].contains(&l.as_str())));
                assert_eq!(c.total(), 50.0);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    // piechart

    #[test]
    fn test_piechart_counts() {
        let mut req = request(ChartKind::Piechart);
        req.category_col = Some("department".into());
        let rows = json!([
            {"department": "Eng"},
            {"department": "Eng"},
            {"department": "Sales"},
        ]);
        let instr = run(&req, rows).unwrap();
        match instr.payload {
            Payload::CategoryCounts(c) => {
                assert_eq!(c.labels, vec!["Eng", "Sales"]);
                assert_eq!(c.counts, vec![2.0, 1.0]);
                assert_eq!(c.total(), 3.0);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_piechart_value_sums() {
        let mut req = request(ChartKind::Piechart);
        req.category_col = Some("dept".into());
        req.value_col = Some("budget".into());
        let rows = json!([
            {"dept": "Eng", "budget": 10},
            {"dept": "Sales", "budget": 5},
            {"dept": "Eng", "budget": "15"},
        ]);
        let instr = run(&req, rows).unwrap();
        match instr.payload {
            Payload::CategoryCounts(c) => {
                assert_eq!(c.labels, vec!["Eng", "Sales"]);
                assert_eq!(c.counts, vec![25.0, 5.0]);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_piechart_bad_value_column_reverts_to_counts() {
        let mut req = request(ChartKind::Piechart);
        req.category_col = Some("dept".into());
        req.value_col = Some("note".into());
        let rows = json!([
            {"dept": "Eng", "note": "big"},
            {"dept": "Eng", "note": "small"},
            {"dept": "Sales", "note": "x"},
        ]);
        let instr = run(&req, rows).unwrap();
        match instr.payload {
            Payload::CategoryCounts(c) => assert_eq!(c.counts, vec![2.0, 1.0]),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_piechart_unknown_value_column_uses_counts() {
        let mut req = request(ChartKind::Piechart);
        req.category_col = Some("dept".into());
        req.value_col = Some("missing".into());
        let instr = run(&req, json!([{"dept": "Eng"}])).unwrap();
        match instr.payload {
            Payload::CategoryCounts(c) => assert_eq!(c.counts, vec![1.0]),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_piechart_requires_category() {
        let req = request(ChartKind::Piechart);
        assert_invalid(run(&req, json!([{"dept": "Eng"}])), "categoryCol");

        let mut req = request(ChartKind::Piechart);
        req.category_col = Some("team".into());
        assert_invalid(run(&req, json!([{"dept": "Eng"}])), "team");
    }

    #[test]
    fn test_piechart_all_missing_categories() {
        let mut req = request(ChartKind::Piechart);
        req.category_col = Some("dept".into());
        assert_invalid(run(&req, json!([{"dept": null, "x": 1}])), "dept");
    }

    // line

    #[test]
    fn test_line_keeps_present_numeric_columns_in_order() {
        let mut req = request(ChartKind::Line);
        req.y_cols = vec!["b".into(), "name".into(), "ghost".into(), "a".into()];
        let rows = json!([
            {"a": 1, "b": 10, "name": "x"},
            {"a": 2, "b": null, "name": "y"},
        ]);
        let instr = run(&req, rows).unwrap();
        match instr.payload {
            Payload::MultiSeries(series) => {
                let names: Vec<_> = series.iter().map(|s| s.name.as_str()).collect();
                assert_eq!(names, vec!["b", "a"]);
                assert_eq!(series[0].x, vec![0.0]);
                assert_eq!(series[1].x, vec![0.0, 1.0]);
                assert!(series.iter().all(|s| s.dash == LineDash::Solid));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_line_styles_cycle() {
        let mut req = request(ChartKind::Line);
        req.use_different_line_styles = true;
        req.y_cols = vec!["a", "skip", "b", "c", "d", "e"].into_iter().map(String::from).collect();
        let rows = json!([{"a": 1, "skip": "t", "b": 2, "c": 3, "d": 4, "e": 5}]);
        let instr = run(&req, rows).unwrap();
        match instr.payload {
            Payload::MultiSeries(series) => {
                let dashes: Vec<_> = series.iter().map(|s| s.dash).collect();
                assert_eq!(
                    dashes,
                    vec![
                        LineDash::Solid,
                        LineDash::Dashed,
                        LineDash::Dotted,
                        LineDash::DashDot,
                        LineDash::Solid,
                    ]
                );
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_line_errors() {
        let req = request(ChartKind::Line);
        assert_invalid(run(&req, json!([{"a": 1}])), "yCols");

        let mut req = request(ChartKind::Line);
        req.y_cols = vec!["name".into()];
        assert_invalid(run(&req, json!([{"name": "x"}])), "numeric");
    }

    #[test]
    fn test_line_placeholder() {
        let instr = run(&request(ChartKind::Line), json!(null)).unwrap();
        assert_eq!(instr.x_label.as_deref(), Some("Index"));
        match instr.payload {
            Payload::MultiSeries(series) => {
                assert_eq!(series.len(), 1);
                assert_eq!(series[0].name, "Random_Y");
                assert_eq!(series[0].x[49], 49.0);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    // boxplot

    #[test]
    fn test_boxplot_ungrouped() {
        let req = request(ChartKind::Boxplot);
        let instr = run(&req, json!([{"x": 1}, {"x": 2}, {"x": 3}])).unwrap();
        match instr.payload {
            Payload::BoxGroups(groups) => {
                assert_eq!(groups.len(), 1);
                assert_eq!(groups[0].name, "x");
                assert_eq!(groups[0].values, vec![1.0, 2.0, 3.0]);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_boxplot_grouped_by_category() {
        let mut req = request(ChartKind::Boxplot);
        req.boxplot_col = Some("score".into());
        req.boxplot_category_col = Some("team".into());
        let rows = json!([
            {"team": "red", "score": 1},
            {"team": "blue", "score": 2},
            {"team": "red", "score": null},
            {"team": null, "score": 7},
            {"team": "red", "score": 3},
        ]);
        let instr = run(&req, rows).unwrap();
        assert_eq!(instr.x_label.as_deref(), Some("team"));
        assert_eq!(instr.y_label.as_deref(), Some("score"));
        match instr.payload {
            Payload::BoxGroups(groups) => {
                assert_eq!(groups.len(), 2);
                assert_eq!(groups[0].name, "red");
                assert_eq!(groups[0].values, vec![1.0, 3.0]);
                assert_eq!(groups[1].name, "blue");
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_boxplot_grouped_requires_numeric_column() {
        let mut req = request(ChartKind::Boxplot);
        req.boxplot_category_col = Some("team".into());
        assert_invalid(run(&req, json!([{"team": "red", "score": 1}])), "boxplotCol");

        req.boxplot_col = Some("team".into());
        assert_invalid(run(&req, json!([{"team": "red", "score": 1}])), "boxplotCol");
    }

    #[test]
    fn test_boxplot_numeric_category_is_ignored() {
        let mut req = request(ChartKind::Boxplot);
        req.boxplot_col = Some("score".into());
        req.boxplot_category_col = Some("year".into());
        let rows = json!([{"year": 2020, "score": 1}, {"year": 2021, "score": 2}]);
        let instr = run(&req, rows).unwrap();
        match instr.payload {
            Payload::BoxGroups(groups) => {
                let names: Vec<_> = groups.iter().map(|g| g.name.as_str()).collect();
                assert_eq!(names, vec!["year", "score"]);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_boxplot_requires_numeric_data() {
        let req = request(ChartKind::Boxplot);
        assert_invalid(run(&req, json!([{"name": "a"}])), "numeric");
    }

    #[test]
    fn test_boxplot_placeholder_grouped() {
        let instr = run(&request(ChartKind::Boxplot), json!([])).unwrap();
        match instr.payload {
            Payload::BoxGroups(groups) => {
                assert!(!groups.is_empty() && groups.len() <= 5);
                assert_eq!(groups.iter().map(|g| g.values.len()).sum::<usize>(), 50);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    // heatmap

    #[test]
    fn test_heatmap_raw_values() {
        let req = request(ChartKind::Heatmap);
        let rows = json!([
            {"a": 1, "label": "x", "b": 2},
            {"a": 3, "label": "y", "b": null},
        ]);
        let instr = run(&req, rows).unwrap();
        match instr.payload {
            Payload::Heatmap(grid) => {
                assert_eq!(grid.col_labels, vec!["a", "b"]);
                assert_eq!(grid.row_labels, vec!["0", "1"]);
                assert_eq!(grid.values, vec![vec![Some(1.0), Some(2.0)], vec![Some(3.0), None]]);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_heatmap_requires_numeric() {
        let req = request(ChartKind::Heatmap);
        assert_invalid(run(&req, json!([{"label": "x"}])), "Heatmap requires numeric data");
    }

    #[test]
    fn test_heatmap_placeholder_is_correlation() {
        let instr = run(&request(ChartKind::Heatmap), json!([])).unwrap();
        match instr.payload {
            Payload::Heatmap(grid) => {
                assert_eq!(grid.row_labels, vec!["Random_X", "Random_Y"]);
                assert_eq!(grid.col_labels, grid.row_labels);
                let diag = grid.values[0][0].unwrap();
                assert!((diag - 1.0).abs() < 1e-9);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    // bubble

    fn bubble_request() -> ChartRequest {
        let mut req = request(ChartKind::Bubble);
        req.x_col = Some("x".into());
        req.y_col = Some("y".into());
        req.size_col = Some("s".into());
        req
    }

    #[test]
    fn test_bubble_sizes_and_drops() {
        let rows = json!([
            {"x": 1, "y": 2, "s": 5},
            {"x": 2, "y": 3, "s": null},
            {"x": 3, "y": 4, "s": 2},
        ]);
        let instr = run(&bubble_request(), rows).unwrap();
        match instr.payload {
            Payload::Bubble(b) => {
                assert_eq!(b.x, vec![1.0, 3.0]);
                assert_eq!(b.size, vec![80.0, 20.0]);
                assert_eq!(b.size_label.as_deref(), Some("s"));
                assert!(b.color.is_none());
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_bubble_continuous_color() {
        let mut req = bubble_request();
        req.color_col = Some("c".into());
        let rows = json!([
            {"x": 1, "y": 2, "s": 5, "c": "0.5"},
            {"x": 2, "y": 3, "s": null, "c": "oops"},
            {"x": 3, "y": 4, "s": 2, "c": 7},
        ]);
        let instr = run(&req, rows).unwrap();
        match instr.payload {
            // The unparseable color sits on a dropped row, so the kept rows are all numeric
            Payload::Bubble(b) => assert_eq!(b.color, Some(BubbleColor::Continuous(vec![0.5, 7.0]))),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_bubble_categorical_color() {
        let mut req = bubble_request();
        req.color_col = Some("c".into());
        let rows = json!([
            {"x": 1, "y": 2, "s": 5, "c": "red"},
            {"x": 2, "y": 3, "s": 1, "c": "blue"},
            {"x": 3, "y": 4, "s": 2, "c": "red"},
        ]);
        let instr = run(&req, rows).unwrap();
        match instr.payload {
            Payload::Bubble(b) => assert_eq!(
                b.color,
                Some(BubbleColor::Categorical {
                    codes: vec![Some(0), Some(1), Some(0)],
                    labels: vec!["red".into(), "blue".into()],
                })
            ),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_bubble_requires_columns() {
        let mut req = bubble_request();
        req.size_col = None;
        assert_invalid(run(&req, json!([{"x": 1, "y": 2}])), "sizeCol");

        let req = bubble_request();
        assert_invalid(run(&req, json!([{"x": 1, "y": 2, "s": "big"}])), "'s'");
    }

    #[test]
    fn test_bubble_placeholder() {
        let instr = run(&bubble_request(), json!("not rows")).unwrap();
        match instr.payload {
            Payload::Bubble(b) => {
                assert_eq!(b.x.len(), 50);
                assert_eq!(b.size.len(), 50);
                assert!(matches!(b.color, Some(BubbleColor::Continuous(ref c)) if c.len() == 50));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_errors_name_kind() {
        let req = request(ChartKind::Heatmap);
        let err = run(&req, json!([{"label": "x"}])).unwrap_err();
        assert!(err.to_string().contains("heatmap"));
        assert!(err.is_client_error());
    }
}
