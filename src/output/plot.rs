use anyhow::{anyhow, Context, Result};
use camino::Utf8Path as Path;
use resvg::{tiny_skia, usvg};
use svg::node::element::path::Data;
use svg::node::element::{Circle, Line, Path as SvgPath, Rectangle, Text};
use svg::Document;

use crate::types::SequenceRecord;

const W: f32 = 1000.0;
const H: f32 = 600.0;
const LEFT: f32 = 90.0;
const RIGHT: f32 = W - 20.0;
const TOP: f32 = 50.0;
// room for accession labels rotated by 90°
const BOTTOM: f32 = H - 150.0;
const Y_TICKS: usize = 5;
const LINE_COLOR: &str = "#1f77b4";

/// Renders accession (x) against length (y) and saves it as PNG.
pub fn plot_lengths(records: &[SequenceRecord], path: &Path) -> Result<()> {
    let svg = render_svg(records);
    save_png(&svg, path)
}

pub fn render_svg(records: &[SequenceRecord]) -> String {
    let (y_min, y_max) = y_range(records);
    let y_of = |length: u64| {
        BOTTOM - ((length as f32 - y_min) / (y_max - y_min)) * (BOTTOM - TOP)
    };
    let step = (RIGHT - LEFT) / records.len().max(1) as f32;
    let x_of = |i: usize| LEFT + step * (i as f32 + 0.5);

    let mut doc = Document::new()
        .set("viewBox", (0, 0, W, H))
        .set("width", W)
        .set("height", H)
        .add(
            Rectangle::new()
                .set("x", 0)
                .set("y", 0)
                .set("width", W)
                .set("height", H)
                .set("fill", "#ffffff"),
        )
        .add(
            Rectangle::new()
                .set("x", LEFT)
                .set("y", TOP)
                .set("width", RIGHT - LEFT)
                .set("height", BOTTOM - TOP)
                .set("fill", "none")
                .set("stroke", "#000000")
                .set("stroke-width", 1),
        )
        .add(
            Text::new("GenBank Sequence Lengths")
                .set("x", (LEFT + RIGHT) / 2.0)
                .set("y", TOP - 18.0)
                .set("text-anchor", "middle")
                .set("font-family", "sans-serif")
                .set("font-size", 16),
        )
        .add(
            Text::new("Sequence Length")
                .set("x", 0)
                .set("y", 0)
                .set(
                    "transform",
                    format!("translate(22 {}) rotate(-90)", (TOP + BOTTOM) / 2.0),
                )
                .set("text-anchor", "middle")
                .set("font-family", "sans-serif")
                .set("font-size", 12),
        );

    for tick in 0..=Y_TICKS {
        let value = y_min + (y_max - y_min) * tick as f32 / Y_TICKS as f32;
        let y = y_of(value.max(0.0) as u64);
        doc = doc
            .add(
                Line::new()
                    .set("x1", LEFT - 4.0)
                    .set("y1", y)
                    .set("x2", LEFT)
                    .set("y2", y)
                    .set("stroke", "#000000")
                    .set("stroke-width", 1),
            )
            .add(
                Text::new(format!("{}", value.round() as i64))
                    .set("x", LEFT - 7.0)
                    .set("y", y + 3.0)
                    .set("text-anchor", "end")
                    .set("font-family", "sans-serif")
                    .set("font-size", 9),
            );
    }

    if let Some(first) = records.first() {
        let mut data = Data::new().move_to((x_of(0), y_of(first.length)));
        for (i, record) in records.iter().enumerate().skip(1) {
            data = data.line_to((x_of(i), y_of(record.length)));
        }
        doc = doc.add(
            SvgPath::new()
                .set("d", data)
                .set("fill", "none")
                .set("stroke", LINE_COLOR)
                .set("stroke-width", 1.5),
        );
    }

    for (i, record) in records.iter().enumerate() {
        let (x, y) = (x_of(i), y_of(record.length));
        doc = doc
            .add(
                Circle::new()
                    .set("cx", x)
                    .set("cy", y)
                    .set("r", 3)
                    .set("fill", LINE_COLOR),
            )
            .add(
                Text::new(record.identifier.as_str())
                    .set("x", 0)
                    .set("y", 0)
                    .set(
                        "transform",
                        format!("translate({} {}) rotate(-90)", x + 3.0, BOTTOM + 6.0),
                    )
                    .set("text-anchor", "end")
                    .set("font-family", "sans-serif")
                    .set("font-size", 8),
            );
    }

    doc.to_string()
}

// Pads the data range by 5% on both sides; a flat series gets a unit range
fn y_range(records: &[SequenceRecord]) -> (f32, f32) {
    let min = records.iter().map(|r| r.length).min().unwrap_or(0) as f32;
    let max = records.iter().map(|r| r.length).max().unwrap_or(0) as f32;
    let pad = ((max - min) * 0.05).max(1.0);
    ((min - pad).max(0.0), max + pad)
}

fn save_png(svg: &str, path: &Path) -> Result<()> {
    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_str(svg, &options).context("Couldn't parse rendered plot")?;
    let size = tree.size().to_int_size();
    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow!("Invalid plot size {size:?}"))?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());
    pixmap
        .save_png(path)
        .with_context(|| format!("Couldn't save plot to '{path}'"))?;
    Ok(())
}
