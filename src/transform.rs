// Data shaping helpers shared by the resolver and the renderer

use std::collections::HashMap;

/// Frequency of each distinct label, in order of first appearance.
pub fn frequency_counts<'a, I>(labels: I) -> (Vec<String>, Vec<f64>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, f64> = HashMap::new();
    for label in labels {
        if !counts.contains_key(label) {
            order.push(label.to_string());
        }
        *counts.entry(label.to_string()).or_insert(0.0) += 1.0;
    }
    let values = order.iter().map(|k| counts[k]).collect();
    (order, values)
}

/// Group values under their label, labels in order of first appearance.
pub fn group_values<I>(pairs: I) -> Vec<(String, Vec<f64>)>
where
    I: IntoIterator<Item = (String, f64)>,
{
    let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (label, value) in pairs {
        match index.get(&label) {
            Some(&i) => groups[i].1.push(value),
            None => {
                index.insert(label.clone(), groups.len());
                groups.push((label, vec![value]));
            }
        }
    }
    groups
}

/// Sum of values per label for the given label order.
/// Labels absent from `pairs` sum to zero.
pub fn sum_by_label<I>(order: &[String], pairs: I) -> Vec<f64>
where
    I: IntoIterator<Item = (String, f64)>,
{
    let mut sums: HashMap<String, f64> = HashMap::new();
    for (label, value) in pairs {
        *sums.entry(label).or_insert(0.0) += value;
    }
    order
        .iter()
        .map(|k| sums.get(k).copied().unwrap_or(0.0))
        .collect()
}

/// Map each distinct label to an integer code in first-appearance order.
pub fn factorize(labels: &[Option<String>]) -> (Vec<Option<usize>>, Vec<String>) {
    let mut uniques: Vec<String> = Vec::new();
    let codes = labels
        .iter()
        .map(|label| {
            let label = label.as_ref()?;
            match uniques.iter().position(|u| u == label) {
                Some(i) => Some(i),
                None => {
                    uniques.push(label.clone());
                    Some(uniques.len() - 1)
                }
            }
        })
        .collect();
    (codes, uniques)
}

/// Shift sizes so the smallest maps to 20 and scale linearly.
pub fn scale_bubble_sizes(raw: &[f64]) -> Vec<f64> {
    let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    raw.iter().map(|&s| (s - min + 1.0) * 20.0).collect()
}

// =============================================================================
// Histogram binning
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Equal-width bins over [min, max]; the last bin is closed on the right.
/// A zero-width range is widened to [v - 0.5, v + 0.5].
pub fn bin_values(values: &[f64], bin_count: usize) -> Vec<Bin> {
    if values.is_empty() || bin_count == 0 {
        return Vec::new();
    }

    let mut min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        min -= 0.5;
        max += 0.5;
    }
    let width = (max - min) / bin_count as f64;

    let mut bins: Vec<Bin> = (0..bin_count)
        .map(|i| Bin {
            start: min + i as f64 * width,
            end: min + (i + 1) as f64 * width,
            count: 0,
        })
        .collect();

    for &v in values {
        let idx = (((v - min) / width).floor() as usize).min(bin_count - 1);
        bins[idx].count += 1;
    }
    bins
}

// =============================================================================
// Box statistics
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

impl BoxStats {
    /// Quartiles with whiskers at the furthest points within 1.5 IQR.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut ys = values.to_vec();
        ys.sort_by(|a, b| a.total_cmp(b));

        let q1 = percentile(&ys, 0.25);
        let median = percentile(&ys, 0.50);
        let q3 = percentile(&ys, 0.75);
        let iqr = q3 - q1;
        let lower_fence = q1 - 1.5 * iqr;
        let upper_fence = q3 + 1.5 * iqr;

        let lower_whisker = ys.iter().copied().find(|&v| v >= lower_fence).unwrap_or(q1);
        let upper_whisker = ys.iter().rev().copied().find(|&v| v <= upper_fence).unwrap_or(q3);
        let outliers = ys
            .iter()
            .copied()
            .filter(|&v| v < lower_fence || v > upper_fence)
            .collect();

        Some(Self {
            lower_whisker,
            q1,
            median,
            q3,
            upper_whisker,
            outliers,
        })
    }
}

/// Linear-interpolated percentile of already sorted data.
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    let n = sorted_data.len();
    if n == 0 { return 0.0; }
    if n == 1 { return sorted_data[0]; }

    let rank = p * (n - 1) as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = rank.ceil() as usize;

    if lower_idx == upper_idx {
        sorted_data[lower_idx]
    } else {
        let weight = rank - lower_idx as f64;
        sorted_data[lower_idx] * (1.0 - weight) + sorted_data[upper_idx] * weight
    }
}

// =============================================================================
// Correlation
// =============================================================================

/// Pearson correlation over pairwise-complete observations.
/// `None` when fewer than two pairs remain or either side is constant.
pub fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b.iter())
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Square correlation matrix, `matrix[i][j] = pearson(columns[i], columns[j])`.
pub fn correlation_matrix(columns: &[Vec<Option<f64>>]) -> Vec<Vec<Option<f64>>> {
    columns
        .iter()
        .map(|a| columns.iter().map(|b| pearson(a, b)).collect())
        .collect()
}
