// Placeholder datasets used whenever the request carries no usable table

use crate::data::{Cell, Column, ColumnKind, Table};
use rand::Rng;

pub const PLACEHOLDER_ROWS: usize = 50;
pub const NUMERIC_COLUMNS: [&str; 2] = ["Random_X", "Random_Y"];
pub const CATEGORY_COLUMN: &str = "Category";
pub const VALUE_COLUMN: &str = "Value";
pub const CATEGORY_SYMBOLS: [&str; 5] = ["A", "B", "C", "D", "E"];

/// Uniform values in [0, 100), one column per name.
pub fn numeric_placeholder<R: Rng + ?Sized>(rng: &mut R, rows: usize, cols: &[&str]) -> Table {
    let columns = cols
        .iter()
        .map(|name| Column {
            name: name.to_string(),
            kind: ColumnKind::Numeric,
            cells: (0..rows)
                .map(|_| Cell::Number(rng.gen_range(0.0..100.0)))
                .collect(),
        })
        .collect();
    Table::from_columns(columns).unwrap_or_else(Table::empty)
}

/// `Category` drawn from A..E and an integer `Value` in [10, 100).
pub fn categorical_placeholder<R: Rng + ?Sized>(rng: &mut R, rows: usize) -> Table {
    let categories = (0..rows)
        .map(|_| {
            let idx = rng.gen_range(0..CATEGORY_SYMBOLS.len());
            Cell::Text(CATEGORY_SYMBOLS[idx].to_string())
        })
        .collect();
    let values = (0..rows)
        .map(|_| Cell::Number(rng.gen_range(10..100) as f64))
        .collect();

    Table::from_columns(vec![
        Column {
            name: CATEGORY_COLUMN.to_string(),
            kind: ColumnKind::Categorical,
            cells: categories,
        },
        Column {
            name: VALUE_COLUMN.to_string(),
            kind: ColumnKind::Numeric,
            cells: values,
        },
    ])
    .unwrap_or_else(Table::empty)
}

/// Every placeholder a resolver branch may need, built once per request.
#[derive(Debug, Clone)]
pub struct FallbackProvider {
    pub numeric: Table,
    pub categorical: Table,
    /// Per-point bubble sizes in [0, 100)
    pub bubble_sizes: Vec<f64>,
    /// Per-point bubble colors in [0, 1)
    pub bubble_colors: Vec<f64>,
}

impl FallbackProvider {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let numeric = numeric_placeholder(rng, PLACEHOLDER_ROWS, &NUMERIC_COLUMNS);
        let categorical = categorical_placeholder(rng, PLACEHOLDER_ROWS);
        let bubble_sizes = (0..PLACEHOLDER_ROWS)
            .map(|_| rng.gen::<f64>() * 100.0)
            .collect();
        let bubble_colors = (0..PLACEHOLDER_ROWS).map(|_| rng.gen::<f64>()).collect();
        Self {
            numeric,
            categorical,
            bubble_sizes,
            bubble_colors,
        }
    }

    pub fn random() -> Self {
        Self::new(&mut rand::thread_rng())
    }

    /// Placeholder numeric column by name, values in row order.
    pub fn numeric_values(&self, name: &str) -> Vec<f64> {
        self.numeric
            .column(name)
            .map(|c| c.present_numbers())
            .unwrap_or_default()
    }
}
