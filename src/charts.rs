// src/charts.rs

//! Chart rendering for the statistics pages
//!
//! The pipeline only knows the [`ChartRenderer`] trait. [`SvgRenderer`]
//! produces small self-contained SVG documents.

use crate::error::{Error, Result};
use crate::statistics::Sample;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Renders statistics into image files
pub trait ChartRenderer {
    /// File extension of produced images, without the dot
    fn extension(&self) -> &str;

    /// Line chart of one size metric over time
    fn size_plot(&self, series: &[Sample], path: &Path) -> Result<()>;

    /// One line per language over time
    fn sloc_plot(&self, series: &BTreeMap<String, Vec<Sample>>, path: &Path) -> Result<()>;

    /// Current share of each language
    fn sloc_pie(&self, slocs: &BTreeMap<String, i64>, path: &Path) -> Result<()>;
}

const WIDTH: f64 = 640.0;
const HEIGHT: f64 = 320.0;
const MARGIN: f64 = 40.0;
const PALETTE: &[&str] = &[
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Writes SVG charts
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgRenderer;

impl SvgRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl ChartRenderer for SvgRenderer {
    fn extension(&self) -> &str {
        "svg"
    }

    fn size_plot(&self, series: &[Sample], path: &Path) -> Result<()> {
        let mut svg = open_document();
        if series.is_empty() {
            no_data(&mut svg);
        } else {
            let scale = Scale::new([series]);
            draw_axes(&mut svg, &scale);
            polyline(&mut svg, series, &scale, PALETTE[0]);
        }
        persist(svg, path)
    }

    fn sloc_plot(&self, series: &BTreeMap<String, Vec<Sample>>, path: &Path) -> Result<()> {
        let visible: Vec<(&String, &Vec<Sample>)> = series
            .iter()
            .filter(|(_, points)| points.iter().any(|(_, v)| *v > 0))
            .collect();

        let mut svg = open_document();
        if visible.is_empty() {
            no_data(&mut svg);
        } else {
            let scale = Scale::new(visible.iter().map(|(_, points)| points.as_slice()));
            draw_axes(&mut svg, &scale);
            for (i, (lang, points)) in visible.iter().enumerate() {
                let color = PALETTE[i % PALETTE.len()];
                polyline(&mut svg, points, &scale, color);
                legend(&mut svg, i, lang, color);
            }
        }
        persist(svg, path)
    }

    fn sloc_pie(&self, slocs: &BTreeMap<String, i64>, path: &Path) -> Result<()> {
        let slices: Vec<(&String, i64)> = slocs
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(lang, count)| (lang, *count))
            .collect();
        let total: i64 = slices.iter().map(|(_, count)| count).sum();

        let mut svg = open_document();
        if total == 0 {
            no_data(&mut svg);
            return persist(svg, path);
        }

        let (cx, cy, r) = (HEIGHT / 2.0, HEIGHT / 2.0, HEIGHT / 2.0 - MARGIN / 2.0);
        if slices.len() == 1 {
            let _ = writeln!(svg, r#"<circle cx="{cx}" cy="{cy}" r="{r}" fill="{}"/>"#, PALETTE[0]);
            legend(&mut svg, 0, slices[0].0, PALETTE[0]);
            return persist(svg, path);
        }

        let mut angle = -std::f64::consts::FRAC_PI_2;
        for (i, (lang, count)) in slices.iter().enumerate() {
            let sweep = std::f64::consts::TAU * (*count as f64) / (total as f64);
            let (x1, y1) = (cx + r * angle.cos(), cy + r * angle.sin());
            angle += sweep;
            let (x2, y2) = (cx + r * angle.cos(), cy + r * angle.sin());
            let large_arc = u8::from(sweep > std::f64::consts::PI);
            let color = PALETTE[i % PALETTE.len()];

            let _ = writeln!(
                svg,
                r#"<path d="M{cx},{cy} L{x1:.2},{y1:.2} A{r},{r} 0 {large_arc} 1 {x2:.2},{y2:.2} Z" fill="{color}"/>"#
            );
            legend(&mut svg, i, lang, color);
        }
        persist(svg, path)
    }
}

/// Maps timestamps and values to drawing coordinates
struct Scale {
    t_min: i64,
    t_max: i64,
    v_max: i64,
}

impl Scale {
    fn new<'a>(series: impl IntoIterator<Item = &'a [Sample]>) -> Self {
        let mut scale = Self {
            t_min: i64::MAX,
            t_max: i64::MIN,
            v_max: 0,
        };
        for points in series {
            for (timestamp, value) in points {
                let t = timestamp.timestamp();
                scale.t_min = scale.t_min.min(t);
                scale.t_max = scale.t_max.max(t);
                scale.v_max = scale.v_max.max(*value);
            }
        }
        scale
    }

    fn x(&self, t: i64) -> f64 {
        let span = (self.t_max - self.t_min).max(1) as f64;
        MARGIN + (t - self.t_min) as f64 / span * (WIDTH - 2.0 * MARGIN)
    }

    fn y(&self, v: i64) -> f64 {
        let span = self.v_max.max(1) as f64;
        HEIGHT - MARGIN - v as f64 / span * (HEIGHT - 2.0 * MARGIN)
    }
}

fn open_document() -> String {
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH}\" height=\"{HEIGHT}\" \
         viewBox=\"0 0 {WIDTH} {HEIGHT}\" font-family=\"sans-serif\" font-size=\"11\">\n"
    )
}

fn no_data(svg: &mut String) {
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle">no data</text>"#,
        WIDTH / 2.0,
        HEIGHT / 2.0
    );
}

fn draw_axes(svg: &mut String, scale: &Scale) {
    let (left, bottom) = (MARGIN, HEIGHT - MARGIN);
    let _ = writeln!(
        svg,
        r#"<path d="M{left},{MARGIN} L{left},{bottom} L{},{bottom}" stroke="black" fill="none"/>"#,
        WIDTH - MARGIN
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="end">{}</text>"#,
        left - 4.0,
        MARGIN + 4.0,
        scale.v_max
    );
}

fn polyline(svg: &mut String, points: &[Sample], scale: &Scale, color: &str) {
    let coords: Vec<String> = points
        .iter()
        .map(|(t, v)| format!("{:.2},{:.2}", scale.x(t.timestamp()), scale.y(*v)))
        .collect();
    let _ = writeln!(
        svg,
        r#"<polyline points="{}" stroke="{color}" stroke-width="1.5" fill="none"/>"#,
        coords.join(" ")
    );
}

fn legend(svg: &mut String, index: usize, label: &str, color: &str) {
    let y = MARGIN + index as f64 * 14.0;
    let x = WIDTH - MARGIN - 80.0;
    let _ = writeln!(
        svg,
        r#"<rect x="{x}" y="{}" width="10" height="10" fill="{color}"/><text x="{}" y="{}">{}</text>"#,
        y - 9.0,
        x + 14.0,
        y,
        escape(label)
    );
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Write the finished document to `path` through a temporary file
fn persist(mut svg: String, path: &Path) -> Result<()> {
    svg.push_str("</svg>\n");

    let dir = path
        .parent()
        .ok_or_else(|| Error::IoError(format!("{} has no parent directory", path.display())))?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(svg.as_bytes())?;
    tmp.persist(path)
        .map_err(|e| Error::IoError(format!("cannot write {}: {}", path.display(), e)))?;
    Ok(())
}
