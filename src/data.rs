use serde_json::{Map, Value};

/// A single table cell after loading.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Per-cell numeric coercion, independent of the column's type.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => parse_number(s),
            Cell::Missing => None,
        }
    }

    /// Display label used when the cell acts as a category.
    pub fn label(&self) -> Option<String> {
        match self {
            Cell::Number(n) => Some(format_number(*n)),
            Cell::Text(s) => Some(s.clone()),
            Cell::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn is_numeric(&self) -> bool {
        self.kind == ColumnKind::Numeric
    }

    /// Coerce every cell to a number, `None` where it does not parse.
    pub fn numbers(&self) -> Vec<Option<f64>> {
        self.cells.iter().map(Cell::as_number).collect()
    }

    /// Numeric values with missing/unparseable cells dropped.
    pub fn present_numbers(&self) -> Vec<f64> {
        self.cells.iter().filter_map(Cell::as_number).collect()
    }
}

/// Column-oriented table. All columns have the same number of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Build a table from already typed columns.
    ///
    /// Returns `None` when the column lengths disagree or a name repeats.
    pub fn from_columns(columns: Vec<Column>) -> Option<Self> {
        let row_count = columns.first().map(|c| c.cells.len()).unwrap_or(0);
        if columns.iter().any(|c| c.cells.len() != row_count) {
            return None;
        }
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|other| other.name == col.name) {
                return None;
            }
        }
        Some(Self { columns, row_count })
    }

    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            row_count: 0,
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Numeric columns in table order.
    pub fn numeric_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.is_numeric()).collect()
    }
}

/// Turn a JSON array of row objects into a typed table.
///
/// Returns `None` when the value is not a non-empty array of objects; the
/// caller falls back to placeholder data in that case.
pub fn load(rows: &Value) -> Option<Table> {
    let array = rows.as_array()?;
    if array.is_empty() {
        return None;
    }

    let mut records: Vec<&Map<String, Value>> = Vec::with_capacity(array.len());
    for item in array {
        records.push(item.as_object()?);
    }

    // Union of keys, first-seen order
    let mut headers: Vec<&str> = Vec::new();
    for record in &records {
        for key in record.keys() {
            if !headers.contains(&key.as_str()) {
                headers.push(key);
            }
        }
    }

    let columns = headers
        .into_iter()
        .map(|header| {
            let raw: Vec<Cell> = records
                .iter()
                .map(|record| json_to_cell(record.get(header)))
                .collect();
            type_column(header.to_string(), raw)
        })
        .collect();

    Table::from_columns(columns)
}

fn json_to_cell(value: Option<&Value>) -> Cell {
    match value {
        None | Some(Value::Null) => Cell::Missing,
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|f| f.is_finite())
            .map(Cell::Number)
            .unwrap_or(Cell::Missing),
        Some(Value::String(s)) if s.trim().is_empty() => Cell::Missing,
        Some(Value::String(s)) => Cell::Text(s.clone()),
        Some(Value::Bool(b)) => Cell::Text(b.to_string()),
        Some(other) => Cell::Text(other.to_string()),
    }
}

/// Numeric iff every non-missing cell parses; otherwise keep the original text.
fn type_column(name: String, raw: Vec<Cell>) -> Column {
    let parsed: Option<Vec<Cell>> = raw
        .iter()
        .map(|cell| match cell {
            Cell::Missing => Some(Cell::Missing),
            other => other.as_number().map(Cell::Number),
        })
        .collect();

    match parsed {
        Some(cells) => Column {
            name,
            kind: ColumnKind::Numeric,
            cells,
        },
        None => Column {
            name,
            kind: ColumnKind::Categorical,
            cells: raw,
        },
    }
}

/// Parse a finite number from text, ignoring surrounding whitespace.
pub fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Format a number the way a category label should read ("3", not "3.0").
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_numeric_and_categorical() {
        let rows = json!([
            {"age": "30", "name": "Ann"},
            {"age": 41, "name": "Bob"},
        ]);
        let table = load(&rows).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_names(), vec!["age", "name"]);

        let age = table.column("age").unwrap();
        assert!(age.is_numeric());
        assert_eq!(age.cells, vec![Cell::Number(30.0), Cell::Number(41.0)]);

        let name = table.column("name").unwrap();
        assert_eq!(name.kind, ColumnKind::Categorical);
        assert_eq!(name.cells[0], Cell::Text("Ann".to_string()));
    }

    #[test]
    fn test_single_bad_cell_makes_column_categorical() {
        let rows = json!([{"v": "1"}, {"v": "2"}, {"v": "abc"}]);
        let table = load(&rows).unwrap();
        let v = table.column("v").unwrap();
        assert_eq!(v.kind, ColumnKind::Categorical);
        // Original text is kept, per-cell coercion still works
        assert_eq!(v.cells[0], Cell::Text("1".to_string()));
        assert_eq!(v.numbers(), vec![Some(1.0), Some(2.0), None]);
    }

    #[test]
    fn test_missing_keys_become_missing_cells() {
        let rows = json!([{"a": 1}, {"b": 2}, {"a": null, "b": ""}]);
        let table = load(&rows).unwrap();
        assert_eq!(table.column_names(), vec!["a", "b"]);
        let a = table.column("a").unwrap();
        assert_eq!(a.cells, vec![Cell::Number(1.0), Cell::Missing, Cell::Missing]);
        assert!(a.is_numeric());
        let b = table.column("b").unwrap();
        assert_eq!(b.cells, vec![Cell::Missing, Cell::Number(2.0), Cell::Missing]);
    }

    #[test]
    fn test_columns_keep_first_seen_key_order() {
        let rows: Value = serde_json::from_str(
            r#"[{"zeta": 1, "alpha": 2}, {"mid": 3, "zeta": 4, "beta": "b"}]"#,
        )
        .unwrap();
        let table = load(&rows).unwrap();
        assert_eq!(table.column_names(), vec!["zeta", "alpha", "mid", "beta"]);
    }

    #[test]
    fn test_all_missing_column_is_numeric() {
        let rows = json!([{"a": null}, {"a": null}]);
        let table = load(&rows).unwrap();
        assert!(table.column("a").unwrap().is_numeric());
    }

    #[test]
    fn test_non_finite_text_is_not_numeric() {
        let rows = json!([{"a": "NaN"}, {"a": "inf"}]);
        let table = load(&rows).unwrap();
        assert_eq!(table.column("a").unwrap().kind, ColumnKind::Categorical);
    }

    #[test]
    fn test_bools_and_nested_values_are_text() {
        let rows = json!([{"flag": true, "nested": [1, 2]}]);
        let table = load(&rows).unwrap();
        assert_eq!(table.column("flag").unwrap().cells[0], Cell::Text("true".to_string()));
        assert_eq!(table.column("nested").unwrap().cells[0], Cell::Text("[1,2]".to_string()));
    }

    #[test]
    fn test_unusable_inputs() {
        assert!(load(&json!([])).is_none());
        assert!(load(&json!({"a": 1})).is_none());
        assert!(load(&json!([{"a": 1}, 5])).is_none());
        assert!(load(&json!("rows")).is_none());
        assert!(load(&Value::Null).is_none());
    }

    #[test]
    fn test_load_is_idempotent() {
        let rows = json!([{"x": "1", "y": "a"}, {"x": 2.5, "z": null}]);
        assert_eq!(load(&rows), load(&rows));
    }

    #[test]
    fn test_from_columns_rejects_ragged() {
        let cols = vec![
            Column { name: "a".into(), kind: ColumnKind::Numeric, cells: vec![Cell::Number(1.0)] },
            Column { name: "b".into(), kind: ColumnKind::Numeric, cells: vec![] },
        ];
        assert!(Table::from_columns(cols).is_none());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(2.5), "2.5");
    }
}
