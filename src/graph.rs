use crate::ir::{
    BubbleColor, BubbleSeries, CategoryCounts, GroupedBars, HeatmapGrid, Histogram, LineDash,
    NamedValues, Payload, PlotInstruction, Series,
};
use crate::request::ChartKind;
use crate::transform::BoxStats;
use crate::{OutputFormat, RenderOptions};
use anyhow::{Context, Result};
use image::ImageEncoder;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::f64::consts::PI;
use std::ops::Range;

const FONT: &str = "sans-serif";
const COLORBAR_WIDTH: u32 = 90;
const MAX_ANNOTATED_CELLS: usize = 400;
const MISSING_CELL: RGBColor = RGBColor(220, 220, 220);

type XyChart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Render a plot instruction to encoded image bytes.
pub fn render(instr: &PlotInstruction, options: &RenderOptions) -> Result<Vec<u8>> {
    match options.format {
        OutputFormat::Png => {
            let mut canvas = Canvas::new(options.width, options.height)?;
            canvas.draw(instr)?;
            canvas.render()
        }
        OutputFormat::Svg => {
            let mut svg = String::new();
            {
                let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
                    .into_drawing_area();
                draw_instruction(&root, instr)?;
                root.present().context("Failed to present drawing")?;
            }
            Ok(svg.into_bytes())
        }
    }
}

/// RGB pixel buffer for one chart.
pub struct Canvas {
    buffer: Vec<u8>,
    width: u32,
    height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            anyhow::bail!("Canvas size must be non-zero (got {}x{})", width, height);
        }
        let buffer = vec![0u8; width as usize * height as usize * 3];
        Ok(Canvas {
            buffer,
            width,
            height,
        })
    }

    pub fn draw(&mut self, instr: &PlotInstruction) -> Result<()> {
        let root = BitMapBackend::with_buffer(&mut self.buffer, (self.width, self.height))
            .into_drawing_area();
        draw_instruction(&root, instr)?;
        root.present().context("Failed to present drawing")?;
        Ok(())
    }

    /// Finalize and encode the canvas as PNG
    pub fn render(self) -> Result<Vec<u8>> {
        let mut png_bytes = Vec::new();
        {
            let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
            encoder
                .write_image(
                    &self.buffer,
                    self.width,
                    self.height,
                    image::ColorType::Rgb8,
                )
                .context("Failed to encode PNG")?;
        }

        Ok(png_bytes)
    }
}

fn draw_instruction<DB>(root: &DrawingArea<DB, Shift>, instr: &PlotInstruction) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).context("Failed to fill background")?;

    match &instr.payload {
        Payload::Xy(series) => draw_scatter(root, instr, series),
        Payload::MultiSeries(series) => draw_lines(root, instr, series),
        Payload::Histogram(hist) => draw_histogram(root, instr, hist),
        Payload::CategoryCounts(counts) if instr.kind == ChartKind::Piechart => {
            draw_pie(root, instr, counts)
        }
        Payload::CategoryCounts(counts) => draw_category_bars(root, instr, counts),
        Payload::GroupedBars(bars) => draw_grouped_bars(root, instr, bars),
        Payload::BoxGroups(groups) => draw_boxplot(root, instr, groups),
        Payload::Heatmap(grid) => draw_heatmap(root, instr, grid),
        Payload::Bubble(bubbles) => draw_bubbles(root, instr, bubbles),
    }
}

// =============================================================================
// Shared chart scaffolding
// =============================================================================

fn build_chart<'a, DB>(
    area: &'a DrawingArea<DB, Shift>,
    title: &str,
    x_range: Range<f64>,
    y_range: Range<f64>,
) -> Result<XyChart<'a, DB>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    ChartBuilder::on(area)
        .margin(15)
        .caption(title, (FONT, 22.0))
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .context("Failed to build chart")
}

fn draw_mesh<DB>(chart: &mut XyChart<'_, DB>, instr: &PlotInstruction) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    chart
        .configure_mesh()
        .x_desc(instr.x_label.as_deref().unwrap_or(""))
        .y_desc(instr.y_label.as_deref().unwrap_or(""))
        .draw()
        .context("Failed to draw mesh")
}

/// Mesh for a categorical x axis with one slot per label, centered on integers.
fn draw_category_mesh<DB>(
    chart: &mut XyChart<'_, DB>,
    instr: &PlotInstruction,
    labels: &[String],
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let formatter = category_formatter(labels);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len().max(1))
        .x_label_formatter(&formatter)
        .x_desc(instr.x_label.as_deref().unwrap_or(""))
        .y_desc(instr.y_label.as_deref().unwrap_or(""))
        .draw()
        .context("Failed to draw mesh")
}

fn draw_legend<'a, DB>(chart: &mut XyChart<'a, DB>) -> Result<()>
where
    DB: DrawingBackend + 'a,
    DB::ErrorType: 'static,
{
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .context("Failed to draw legend")
}

/// Label lookup for integer tick positions; blank between slots.
fn category_formatter(labels: &[String]) -> impl Fn(&f64) -> String + '_ {
    move |x| {
        let idx = x.round();
        if (x - idx).abs() > 1e-6 || idx < 0.0 {
            return String::new();
        }
        labels.get(idx as usize).cloned().unwrap_or_default()
    }
}

fn category_range(n: usize) -> Range<f64> {
    -0.5..(n.max(1) as f64 - 0.5)
}

/// Data range with 5% padding; a degenerate range is widened by one unit each side.
fn padded_range<I>(values: I) -> Range<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (min, max) = values
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    if min == max {
        (min - 1.0)..(max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding)..(max + padding)
    }
}

/// Value range anchored at zero, for bar-like charts.
fn zero_based_range<I>(values: I) -> Range<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (min, max) = values
        .into_iter()
        .fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min == max {
        return 0.0..1.0;
    }
    let padding = (max - min) * 0.05;
    let lo = if min < 0.0 { min - padding } else { 0.0 };
    let hi = if max > 0.0 { max + padding } else { 0.0 };
    lo..hi
}

fn palette(i: usize) -> RGBColor {
    let (r, g, b) = Palette99::pick(i).rgb();
    RGBColor(r, g, b)
}

fn centered_text(size: f64, color: &RGBColor) -> TextStyle<'static> {
    (FONT, size)
        .into_font()
        .color(color)
        .pos(Pos::new(HPos::Center, VPos::Center))
}

// =============================================================================
// Scatter and line
// =============================================================================

fn draw_scatter<DB>(root: &DrawingArea<DB, Shift>, instr: &PlotInstruction, series: &Series) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let mut chart = build_chart(
        root,
        &instr.title,
        padded_range(series.x.iter().copied()),
        padded_range(series.y.iter().copied()),
    )?;
    draw_mesh(&mut chart, instr)?;

    let color = palette(0);
    chart
        .draw_series(
            series
                .points()
                .into_iter()
                .map(|p| Circle::new(p, 4, color.mix(0.8).filled())),
        )
        .context("Failed to draw scatter points")?;
    Ok(())
}

fn draw_lines<DB>(root: &DrawingArea<DB, Shift>, instr: &PlotInstruction, series: &[Series]) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let mut chart = build_chart(
        root,
        &instr.title,
        padded_range(series.iter().flat_map(|s| s.x.iter().copied())),
        padded_range(series.iter().flat_map(|s| s.y.iter().copied())),
    )?;
    draw_mesh(&mut chart, instr)?;

    for (i, s) in series.iter().enumerate() {
        let color = palette(i);
        let points = s.points();

        if s.dash == LineDash::Solid {
            chart
                .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))
                .context("Failed to draw line series")?;
        } else {
            // Dash lengths are measured in pixels, so split after projecting
            let pixels: Vec<(f64, f64)> = points
                .iter()
                .map(|p| {
                    let (px, py) = chart.backend_coord(p);
                    (px as f64, py as f64)
                })
                .collect();
            for dash in dash_path(&pixels, s.dash.pattern()) {
                let dash: Vec<(i32, i32)> = dash
                    .into_iter()
                    .map(|(x, y)| (x.round() as i32, y.round() as i32))
                    .collect();
                root.draw(&PathElement::new(dash, color.stroke_width(2)))
                    .context("Failed to draw dashed line")?;
            }
        }

        // Markers carry the legend entry for the series
        chart
            .draw_series(points.iter().map(|&p| Circle::new(p, 3, color.filled())))
            .context("Failed to draw line markers")?
            .label(s.name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x - 8, y), (x + 8, y)], color.stroke_width(2)));
    }

    draw_legend(&mut chart)
}

/// Split a polyline into the visible pieces of a repeating on/off pattern.
///
/// The pattern continues across vertices, so corners do not restart it. An
/// empty pattern returns the path unchanged.
pub fn dash_path(points: &[(f64, f64)], pattern: &[f64]) -> Vec<Vec<(f64, f64)>> {
    if points.len() < 2 {
        return Vec::new();
    }
    if pattern.is_empty() || pattern.iter().sum::<f64>() <= 0.0 {
        return vec![points.to_vec()];
    }

    let mut dashes = Vec::new();
    let mut current = vec![points[0]];
    let mut idx = 0;
    let mut remaining = pattern[0];
    let mut on = true;

    for w in points.windows(2) {
        let (mut x0, mut y0) = w[0];
        let (x1, y1) = w[1];
        let mut seg_len = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();

        while seg_len > remaining {
            let t = remaining / seg_len;
            let mid = (x0 + (x1 - x0) * t, y0 + (y1 - y0) * t);
            if on {
                current.push(mid);
                dashes.push(std::mem::take(&mut current));
            } else {
                current = vec![mid];
            }
            on = !on;
            seg_len -= remaining;
            (x0, y0) = mid;
            idx = (idx + 1) % pattern.len();
            remaining = pattern[idx];
        }

        remaining -= seg_len;
        if on {
            current.push((x1, y1));
        }
    }

    if on && current.len() > 1 {
        dashes.push(current);
    }
    dashes
}

// =============================================================================
// Bars
// =============================================================================

fn draw_histogram<DB>(root: &DrawingArea<DB, Shift>, instr: &PlotInstruction, hist: &Histogram) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let bins = hist.bin_counts();
    let (Some(first), Some(last)) = (bins.first(), bins.last()) else {
        anyhow::bail!("Cannot draw histogram with no values");
    };
    let max_count = bins.iter().map(|b| b.count).max().unwrap_or(0) as f64;

    let mut chart = build_chart(
        root,
        &instr.title,
        first.start..last.end,
        0.0..(max_count * 1.05).max(1.0),
    )?;
    draw_mesh(&mut chart, instr)?;

    let color = palette(0);
    chart
        .draw_series(bins.iter().map(|b| {
            Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], color.mix(0.75).filled())
        }))
        .context("Failed to draw histogram bars")?;
    chart
        .draw_series(bins.iter().map(|b| {
            Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], BLACK.stroke_width(1))
        }))
        .context("Failed to draw histogram edges")?;
    Ok(())
}

fn draw_category_bars<DB>(
    root: &DrawingArea<DB, Shift>,
    instr: &PlotInstruction,
    counts: &CategoryCounts,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let mut chart = build_chart(
        root,
        &instr.title,
        category_range(counts.labels.len()),
        zero_based_range(counts.counts.iter().copied()),
    )?;
    draw_category_mesh(&mut chart, instr, &counts.labels)?;

    let bar_width = 0.8;
    chart
        .draw_series(counts.counts.iter().enumerate().map(|(i, &v)| {
            let x = i as f64;
            Rectangle::new(
                [(x - bar_width / 2.0, 0.0), (x + bar_width / 2.0, v)],
                palette(i).filled(),
            )
        }))
        .context("Failed to draw bars")?;
    Ok(())
}

fn draw_grouped_bars<DB>(root: &DrawingArea<DB, Shift>, instr: &PlotInstruction, bars: &GroupedBars) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if bars.series.is_empty() {
        anyhow::bail!("Cannot create bar chart with no series");
    }

    let values = bars.series.iter().flat_map(|s| s.values.iter().flatten().copied());
    let mut chart = build_chart(
        root,
        &instr.title,
        category_range(bars.row_labels.len()),
        zero_based_range(values),
    )?;
    draw_category_mesh(&mut chart, instr, &bars.row_labels)?;

    // Side-by-side bars
    let num_series = bars.series.len() as f64;
    let bar_width = 0.8 / num_series;

    for (series_idx, series) in bars.series.iter().enumerate() {
        let color = palette(series_idx);
        let x_offset = (series_idx as f64 - (num_series - 1.0) / 2.0) * bar_width;

        chart
            .draw_series(series.values.iter().enumerate().filter_map(|(row, v)| {
                let v = (*v)?;
                let x_center = row as f64 + x_offset;
                Some(Rectangle::new(
                    [(x_center - bar_width / 2.0, 0.0), (x_center + bar_width / 2.0, v)],
                    color.filled(),
                ))
            }))
            .context("Failed to draw bar series")?
            .label(series.name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x - 5, y - 5), (x + 5, y + 5)], color.filled()));
    }

    draw_legend(&mut chart)
}

// =============================================================================
// Pie
// =============================================================================

fn draw_pie<DB>(root: &DrawingArea<DB, Shift>, instr: &PlotInstruction, counts: &CategoryCounts) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let total = counts.total();
    if total <= 0.0 {
        anyhow::bail!("Cannot draw pie chart with a zero total");
    }

    let area = root
        .titled(&instr.title, (FONT, 22.0))
        .context("Failed to draw title")?;
    let (w, h) = area.dim_in_pixel();
    let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);
    let radius = w.min(h) as f64 * 0.38;
    let at = |angle: f64, r: f64| ((cx + r * angle.cos()).round() as i32, (cy - r * angle.sin()).round() as i32);

    // Counter-clockwise from twelve o'clock
    let mut start = PI / 2.0;
    for (i, (label, &value)) in counts.labels.iter().zip(&counts.counts).enumerate() {
        if value <= 0.0 {
            continue;
        }
        let sweep = value / total * 2.0 * PI;
        let steps = ((sweep / (2.0 * PI) * 180.0).ceil() as usize).max(2);

        let mut outline = vec![at(0.0, 0.0)];
        outline.extend((0..=steps).map(|k| at(start + sweep * k as f64 / steps as f64, radius)));
        area.draw(&Polygon::new(outline, palette(i).filled()))
            .context("Failed to draw pie slice")?;

        let mid = start + sweep / 2.0;
        let share = format!("{:.1}%", value / total * 100.0);
        area.draw(&Text::new(share, at(mid, radius * 0.65), centered_text(14.0, &BLACK)))
            .context("Failed to draw slice percentage")?;
        area.draw(&Text::new(label.clone(), at(mid, radius * 1.15), centered_text(15.0, &BLACK)))
            .context("Failed to draw slice label")?;

        start += sweep;
    }
    Ok(())
}

// =============================================================================
// Box plot
// =============================================================================

fn draw_boxplot<DB>(root: &DrawingArea<DB, Shift>, instr: &PlotInstruction, groups: &[NamedValues]) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let labels: Vec<String> = groups.iter().map(|g| g.name.clone()).collect();
    let mut chart = build_chart(
        root,
        &instr.title,
        category_range(groups.len()),
        padded_range(groups.iter().flat_map(|g| g.values.iter().copied())),
    )?;
    draw_category_mesh(&mut chart, instr, &labels)?;

    let half = 0.25;
    let cap = 0.12;
    for (i, group) in groups.iter().enumerate() {
        let Some(stats) = BoxStats::from_values(&group.values) else {
            continue;
        };
        let x = i as f64;
        let color = palette(i);

        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(x - half, stats.q1), (x + half, stats.q3)],
                color.mix(0.6).filled(),
            )))
            .context("Failed to draw box")?;

        let lines = [
            vec![(x - half, stats.q1), (x + half, stats.q1), (x + half, stats.q3), (x - half, stats.q3), (x - half, stats.q1)],
            vec![(x, stats.lower_whisker), (x, stats.q1)],
            vec![(x, stats.q3), (x, stats.upper_whisker)],
            vec![(x - cap, stats.lower_whisker), (x + cap, stats.lower_whisker)],
            vec![(x - cap, stats.upper_whisker), (x + cap, stats.upper_whisker)],
        ];
        chart
            .draw_series(lines.into_iter().map(|l| PathElement::new(l, BLACK.stroke_width(1))))
            .context("Failed to draw whiskers")?;
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(x - half, stats.median), (x + half, stats.median)],
                BLACK.stroke_width(2),
            )))
            .context("Failed to draw median")?;
        chart
            .draw_series(stats.outliers.iter().map(|&y| Circle::new((x, y), 3, BLACK.stroke_width(1))))
            .context("Failed to draw outliers")?;
    }
    Ok(())
}

// =============================================================================
// Heatmap and bubble (color scales)
// =============================================================================

const VIRIDIS: [(u8, u8, u8); 5] = [
    (68, 1, 84),
    (59, 82, 139),
    (33, 145, 140),
    (94, 201, 98),
    (253, 231, 37),
];

/// Piecewise-linear viridis approximation, `t` clamped to [0, 1].
pub fn viridis(t: f64) -> RGBColor {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let scaled = t * (VIRIDIS.len() - 1) as f64;
    let i = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = scaled - i as f64;
    let (a, b) = (VIRIDIS[i], VIRIDIS[i + 1]);
    let lerp = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
    RGBColor(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
}

fn normalize(v: f64, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        (v - lo) / (hi - lo)
    } else {
        0.5
    }
}

fn draw_colorbar<DB>(area: &DrawingArea<DB, Shift>, lo: f64, hi: f64, label: &str) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (_, h) = area.dim_in_pixel();
    let top = 60;
    let bottom = (h as i32 - 60).max(top + 10);
    let steps = 100;
    let step_h = (bottom - top) as f64 / steps as f64;

    for k in 0..steps {
        let y0 = top + (k as f64 * step_h).round() as i32;
        let y1 = top + ((k + 1) as f64 * step_h).round() as i32;
        let color = viridis(1.0 - k as f64 / (steps - 1) as f64);
        area.draw(&Rectangle::new([(10, y0), (30, y1)], color.filled()))
            .context("Failed to draw colorbar")?;
    }

    let text = (FONT, 12.0).into_font().color(&BLACK);
    area.draw(&Text::new(format!("{:.2}", hi), (34, top), text.clone()))
        .context("Failed to draw colorbar label")?;
    area.draw(&Text::new(format!("{:.2}", lo), (34, bottom - 12), text.clone()))
        .context("Failed to draw colorbar label")?;
    area.draw(&Text::new(label.to_string(), (6, top - 24), text))
        .context("Failed to draw colorbar label")?;
    Ok(())
}

fn split_for_colorbar<DB>(root: &DrawingArea<DB, Shift>) -> (DrawingArea<DB, Shift>, DrawingArea<DB, Shift>)
where
    DB: DrawingBackend,
{
    let (w, _) = root.dim_in_pixel();
    root.split_horizontally(w.saturating_sub(COLORBAR_WIDTH))
}

fn draw_heatmap<DB>(root: &DrawingArea<DB, Shift>, instr: &PlotInstruction, grid: &HeatmapGrid) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (rows, cols) = (grid.row_labels.len(), grid.col_labels.len());
    if rows == 0 || cols == 0 {
        anyhow::bail!("Cannot draw heatmap with an empty grid");
    }
    let (lo, hi) = grid.value_range().unwrap_or((0.0, 1.0));

    let (main, side) = split_for_colorbar(root);
    let mut chart = build_chart(&main, &instr.title, category_range(cols), category_range(rows))?;

    // First row at the top
    let y_of = |row: usize| (rows - 1 - row) as f64;
    let col_formatter = category_formatter(&grid.col_labels);
    let row_formatter = |y: &f64| {
        let idx = y.round();
        if (y - idx).abs() > 1e-6 || idx < 0.0 || idx as usize >= rows {
            return String::new();
        }
        grid.row_labels[rows - 1 - idx as usize].clone()
    };
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(cols)
        .y_labels(rows)
        .x_label_formatter(&col_formatter)
        .y_label_formatter(&row_formatter)
        .x_desc(instr.x_label.as_deref().unwrap_or(""))
        .y_desc(instr.y_label.as_deref().unwrap_or(""))
        .draw()
        .context("Failed to draw mesh")?;

    let cells: Vec<(usize, usize, Option<f64>)> = grid
        .values
        .iter()
        .enumerate()
        .flat_map(|(r, row)| row.iter().enumerate().map(move |(c, v)| (r, c, *v)))
        .collect();

    chart
        .draw_series(cells.iter().map(|&(r, c, v)| {
            let (x, y) = (c as f64, y_of(r));
            let color = v.map(|v| viridis(normalize(v, lo, hi))).unwrap_or(MISSING_CELL);
            Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], color.filled())
        }))
        .context("Failed to draw heatmap cells")?;

    if cells.len() <= MAX_ANNOTATED_CELLS {
        chart
            .draw_series(cells.iter().filter_map(|&(r, c, v)| {
                let v = v?;
                let text_color = if normalize(v, lo, hi) < 0.5 { WHITE } else { BLACK };
                Some(Text::new(
                    format!("{:.2}", v),
                    (c as f64, y_of(r)),
                    centered_text(11.0, &text_color),
                ))
            }))
            .context("Failed to draw heatmap annotations")?;
    }

    draw_colorbar(&side, lo, hi, "")
}

/// Marker radius in pixels for a marker area given in points squared,
/// capped at `max_radius`.
pub fn bubble_radius(area: f64, max_radius: i32) -> i32 {
    let max_radius = max_radius.max(1);
    let points = (area.max(0.0) / PI).sqrt();
    let radius = points * 100.0 / 72.0;
    if !radius.is_finite() || radius >= max_radius as f64 {
        return max_radius;
    }
    (radius.round() as i32).clamp(1, max_radius)
}

/// Diagonal of a drawing area in pixels.
fn diagonal(area: (u32, u32)) -> i32 {
    let (w, h) = (area.0 as f64, area.1 as f64);
    (w * w + h * h).sqrt().ceil() as i32
}

fn draw_bubbles<DB>(root: &DrawingArea<DB, Shift>, instr: &PlotInstruction, bubbles: &BubbleSeries) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let continuous = match &bubbles.color {
        Some(BubbleColor::Continuous(values)) => {
            let (lo, hi) = values
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            Some((values, lo, hi))
        }
        _ => None,
    };

    let (main, side) = if continuous.is_some() {
        split_for_colorbar(root)
    } else {
        let (w, _) = root.dim_in_pixel();
        root.split_horizontally(w)
    };

    let mut chart = build_chart(
        &main,
        &instr.title,
        padded_range(bubbles.x.iter().copied()),
        padded_range(bubbles.y.iter().copied()),
    )?;
    draw_mesh(&mut chart, instr)?;

    // No bubble may exceed the plotting area
    let max_radius = diagonal(chart.plotting_area().dim_in_pixel());
    let colors: Vec<RGBColor> = (0..bubbles.x.len())
        .map(|i| match (&bubbles.color, continuous) {
            (_, Some((values, lo, hi))) => viridis(normalize(values[i], lo, hi)),
            (Some(BubbleColor::Categorical { codes, .. }), None) => {
                codes[i].map(palette).unwrap_or(MISSING_CELL)
            }
            _ => palette(0),
        })
        .collect();

    chart
        .draw_series(
            bubbles
                .x
                .iter()
                .zip(&bubbles.y)
                .zip(&bubbles.size)
                .zip(&colors)
                .map(|(((&x, &y), &s), color)| Circle::new((x, y), bubble_radius(s, max_radius), color.mix(0.6).filled())),
        )
        .context("Failed to draw bubbles")?;

    if let Some(BubbleColor::Categorical { labels, .. }) = &bubbles.color {
        for (i, label) in labels.iter().enumerate() {
            let color = palette(i);
            chart
                .draw_series(std::iter::empty::<Circle<(f64, f64), i32>>())
                .context("Failed to draw legend entry")?
                .label(label.as_str())
                .legend(move |(x, y)| Circle::new((x, y), 5, color.mix(0.6).filled()));
        }
        draw_legend(&mut chart)?;
    }

    if let Some(size_label) = &bubbles.size_label {
        let (_, h) = main.dim_in_pixel();
        main.draw(&Text::new(
            format!("Bubble size represents: {}", size_label),
            (10, h as i32 - 14),
            (FONT, 12.0).into_font().color(&BLACK),
        ))
        .context("Failed to draw size note")?;
    }

    if let Some((_, lo, hi)) = continuous {
        let label = bubbles.color_label.as_deref().unwrap_or("Color");
        draw_colorbar(&side, lo, hi, label)?;
    }
    Ok(())
}
