//! Static Chart Renderer
//! Draws chart payloads to PNG with plotters and exports them as JSON.
//!
//! Line, scatter and bar charts are drawn here. Choropleth payloads need
//! country geometry this backend does not have; they are exported as JSON for
//! a map library to consume.

use crate::charts::adapter::{ChartKind, ChartPayload, Series};
use plotters::prelude::*;
use rayon::prelude::*;
use std::error::Error as StdError;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("{0} charts are not supported by the bitmap renderer")]
    Unsupported(ChartKind),
    #[error("Nothing to draw")]
    Empty,
    #[error("Drawing failed: {0}")]
    Draw(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Color palette for series
pub const PALETTE: [RGBColor; 10] = [
    RGBColor(52, 152, 219),  // Blue
    RGBColor(231, 76, 60),   // Red
    RGBColor(46, 204, 113),  // Green
    RGBColor(155, 89, 182),  // Purple
    RGBColor(243, 156, 18),  // Orange
    RGBColor(26, 188, 156),  // Teal
    RGBColor(233, 30, 99),   // Pink
    RGBColor(0, 188, 212),   // Cyan
    RGBColor(121, 85, 72),   // Brown
    RGBColor(96, 125, 139),  // Blue Grey
];

type DrawResult = Result<(), Box<dyn StdError>>;

/// Files written for one view.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedView {
    pub json: PathBuf,
    pub png: Option<PathBuf>,
}

pub struct StaticChartRenderer;

impl StaticChartRenderer {
    /// Draw `payload` into a PNG at `path`.
    pub fn render_png(payload: &ChartPayload, path: &Path, size: (u32, u32)) -> Result<(), RenderError> {
        let drawn = match payload.kind {
            ChartKind::Line | ChartKind::Scatter => {
                let series = payload.series();
                if series.is_empty() {
                    return Err(RenderError::Empty);
                }
                Self::draw_xy(payload, &series, path, size)
            }
            ChartKind::Bar => {
                let categories = payload.categories();
                if categories.is_empty() {
                    return Err(RenderError::Empty);
                }
                Self::draw_bars(payload, categories, path, size)
            }
            ChartKind::Choropleth => return Err(RenderError::Unsupported(ChartKind::Choropleth)),
        };
        drawn.map_err(|e| RenderError::Draw(e.to_string()))?;
        debug!(path = %path.display(), kind = %payload.kind, "rendered png");
        Ok(())
    }

    /// Export the payload for an external charting library.
    pub fn write_json(payload: &ChartPayload, path: &Path) -> Result<(), RenderError> {
        fs::write(path, serde_json::to_vec_pretty(payload)?)?;
        Ok(())
    }

    /// Write every payload as `<name>.json`, plus `<name>.png` where drawable, in parallel.
    pub fn render_all(
        payloads: &[(String, ChartPayload)],
        out_dir: &Path,
        size: (u32, u32),
    ) -> Vec<(String, Result<RenderedView, RenderError>)> {
        payloads
            .par_iter()
            .map(|(name, payload)| {
                let result = Self::render_one(name, payload, out_dir, size);
                (name.clone(), result)
            })
            .collect()
    }

    fn render_one(
        name: &str,
        payload: &ChartPayload,
        out_dir: &Path,
        size: (u32, u32),
    ) -> Result<RenderedView, RenderError> {
        let json = out_dir.join(format!("{}.json", name));
        Self::write_json(payload, &json)?;

        let png = match payload.kind {
            ChartKind::Choropleth => None,
            _ => {
                let path = out_dir.join(format!("{}.png", name));
                Self::render_png(payload, &path, size)?;
                Some(path)
            }
        };
        info!(view = name, kind = %payload.kind, "view written");
        Ok(RenderedView { json, png })
    }

    fn draw_xy(payload: &ChartPayload, series: &[Series], path: &Path, size: (u32, u32)) -> DrawResult {
        let enc = &payload.encoding;
        let (x_range, y_range) = Self::xy_bounds(series);

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&enc.title, ("sans-serif", 22))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, y_range)?;

        let x_desc = enc.x_label.clone().unwrap_or_else(|| enc.x.clone());
        let y_desc = enc.y_label.clone().unwrap_or_else(|| enc.y.clone());
        chart
            .configure_mesh()
            .x_desc(x_desc)
            .y_desc(y_desc)
            .x_label_formatter(&|v| Self::format_tick(*v))
            .draw()?;

        for (i, s) in series.iter().enumerate() {
            let color = PALETTE[i % PALETTE.len()];
            if payload.kind == ChartKind::Line {
                let mut points = s.points.clone();
                points.sort_by(|a, b| a.0.total_cmp(&b.0));
                chart
                    .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?
                    .label(s.name.clone())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
                if enc.markers {
                    chart.draw_series(points.iter().map(|&p| Circle::new(p, 3, color.filled())))?;
                }
            } else {
                chart
                    .draw_series(s.points.iter().map(|&p| Circle::new(p, 4, color.filled())))?
                    .label(s.name.clone())
                    .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));
            }
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .position(SeriesLabelPosition::UpperRight)
            .draw()?;

        root.present()?;
        Ok(())
    }

    /// Horizontal bars, first category on top.
    fn draw_bars(
        payload: &ChartPayload,
        mut categories: Vec<(String, f64)>,
        path: &Path,
        size: (u32, u32),
    ) -> DrawResult {
        let enc = &payload.encoding;
        categories.reverse();
        let n = categories.len();
        let max = categories.iter().map(|c| c.1).fold(0.0_f64, f64::max);
        let min = categories.iter().map(|c| c.1).fold(0.0_f64, f64::min);
        let x_range = min..if max > min { max * 1.1 } else { min + 1.0 };

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&enc.title, ("sans-serif", 22))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(180)
            .build_cartesian_2d(x_range, -0.5..(n as f64 - 0.5))?;

        let labels: Vec<String> = categories.iter().map(|c| c.0.clone()).collect();
        let y_label = |y: &f64| {
            let idx = y.round();
            if (y - idx).abs() > 1e-6 || idx < 0.0 {
                String::new()
            } else {
                labels.get(idx as usize).cloned().unwrap_or_default()
            }
        };
        let x_desc = enc.y_label.clone().unwrap_or_else(|| enc.y.clone());
        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(n)
            .y_label_formatter(&y_label)
            .x_desc(x_desc)
            .draw()?;

        let color = PALETTE[0];
        chart.draw_series(categories.iter().enumerate().map(|(i, (_, v))| {
            let y = i as f64;
            Rectangle::new([(0.0, y - 0.35), (*v, y + 0.35)], color.filled())
        }))?;

        root.present()?;
        Ok(())
    }

    fn xy_bounds(series: &[Series]) -> (Range<f64>, Range<f64>) {
        let points = series.iter().flat_map(|s| s.points.iter());
        let (mut x0, mut x1, mut y0, mut y1) = (
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
        );
        for &(x, y) in points {
            x0 = x0.min(x);
            x1 = x1.max(x);
            y0 = y0.min(y);
            y1 = y1.max(y);
        }
        (Self::padded(x0, x1, 0.02), Self::padded(y0, y1, 0.1))
    }

    fn padded(lo: f64, hi: f64, frac: f64) -> Range<f64> {
        if !lo.is_finite() || !hi.is_finite() {
            return 0.0..1.0;
        }
        let pad = if hi > lo { (hi - lo) * frac } else { 1.0 };
        (lo - pad)..(hi + pad)
    }

    fn format_tick(v: f64) -> String {
        if (v - v.round()).abs() < 1e-9 {
            format!("{:.0}", v)
        } else {
            format!("{:.2}", v)
        }
    }
}
