//! Accuracy / loss charts.
//!
//! Two stacked panels, accuracy on top and loss below, one point per epoch.
//! `.svg` paths get a vector chart with titles and tick labels; any other
//! extension is rasterized with the `image` crate and encoded by extension.

use std::fmt::Write as _;
use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};
use tracing::info;

use crate::error::PlotError;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
const MARGIN_LEFT: f64 = 60.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 30.0;
const PANEL_GAP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 40.0;
const TICKS: usize = 4;

const ACCURACY_COLOR: [u8; 3] = [31, 119, 180];
const LOSS_COLOR: [u8; 3] = [214, 39, 40];
const AXIS_COLOR: [u8; 3] = [40, 40, 40];
const GRID_COLOR: [u8; 3] = [225, 225, 225];

/// Pixel rectangle a panel's plot area occupies.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Rect {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl Rect {
    fn right(&self) -> f64 {
        self.left + self.width
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

struct Panel<'a> {
    title: &'a str,
    values: &'a [f64],
    y_range: (f64, f64),
    rect: Rect,
    color: [u8; 3],
}

impl<'a> Panel<'a> {
    fn points(&self) -> Vec<(f64, f64)> {
        scale_points(self.values, self.rect, self.y_range)
    }
}

/// Whether `plot` can write a chart at `path`: `.svg`, or a raster format
/// with an encoder compiled in.
pub fn is_supported_path(path: &Path) -> bool {
    if is_svg(path) {
        return true;
    }
    matches!(
        ImageFormat::from_path(path),
        Ok(ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Bmp | ImageFormat::Gif)
    )
}

fn is_svg(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("svg"))
        .unwrap_or(false)
}

/// Renders `acc` and `loss` to `path`. Empty series still produce a chart with empty axes.
pub fn plot<P: AsRef<Path>>(acc: &[f64], loss: &[f64], path: P) -> Result<(), PlotError> {
    let path = path.as_ref();
    let panels = layout(acc, loss);

    if is_svg(path) {
        std::fs::write(path, render_svg(&panels))
            .map_err(|source| PlotError::Io { path: path.to_path_buf(), source })?;
    } else {
        render_raster(&panels)
            .save(path)
            .map_err(|source| PlotError::Image { path: path.to_path_buf(), source })?;
    }
    info!(path = %path.display(), epochs = acc.len(), "chart written");
    Ok(())
}

fn layout<'a>(acc: &'a [f64], loss: &'a [f64]) -> [Panel<'a>; 2] {
    let plot_width = WIDTH as f64 - MARGIN_LEFT - MARGIN_RIGHT;
    let panel_height = (HEIGHT as f64 - MARGIN_TOP - PANEL_GAP - MARGIN_BOTTOM) / 2.0;
    let upper = Rect { left: MARGIN_LEFT, top: MARGIN_TOP, width: plot_width, height: panel_height };
    let lower = Rect { top: MARGIN_TOP + panel_height + PANEL_GAP, ..upper };

    [
        Panel { title: "Accuracy", values: acc, y_range: (0.0, 1.0), rect: upper, color: ACCURACY_COLOR },
        Panel { title: "Loss", values: loss, y_range: loss_range(loss), rect: lower, color: LOSS_COLOR },
    ]
}

/// `[0, max]` with 10% headroom; `[0, 1]` when there is nothing finite to show.
fn loss_range(values: &[f64]) -> (f64, f64) {
    let max = values
        .iter()
        .cloned()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if max.is_finite() && max > 0.0 { (0.0, max * 1.1) } else { (0.0, 1.0) }
}

/// Maps epoch `i` (0-based) and value `v` into pixel coordinates inside `rect`.
/// A single point sits at the horizontal center.
fn scale_points(values: &[f64], rect: Rect, (y_min, y_max): (f64, f64)) -> Vec<(f64, f64)> {
    let span = if y_max > y_min { y_max - y_min } else { 1.0 };
    let n = values.len();
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let x = if n == 1 {
                rect.left + rect.width / 2.0
            } else {
                rect.left + rect.width * i as f64 / (n - 1) as f64
            };
            let t = ((v - y_min) / span).clamp(0.0, 1.0);
            (x, rect.bottom() - t * rect.height)
        })
        .collect()
}

fn render_svg(panels: &[Panel<'_>]) -> String {
    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif" font-size="11">"#,
        w = WIDTH,
        h = HEIGHT
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);

    for panel in panels {
        let r = panel.rect;
        let (y_min, y_max) = panel.y_range;
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" font-size="13" font-weight="bold">{}</text>"#,
            r.left,
            r.top - 8.0,
            panel.title
        );
        for tick in 0..=TICKS {
            let t = tick as f64 / TICKS as f64;
            let y = r.bottom() - t * r.height;
            let _ = writeln!(
                svg,
                r#"<line x1="{}" y1="{y:.1}" x2="{}" y2="{y:.1}" stroke="{}"/>"#,
                r.left,
                r.right(),
                hex(GRID_COLOR)
            );
            let _ = writeln!(
                svg,
                r#"<text x="{}" y="{:.1}" text-anchor="end">{:.2}</text>"#,
                r.left - 6.0,
                y + 4.0,
                y_min + t * (y_max - y_min)
            );
        }
        let _ = writeln!(
            svg,
            r#"<polyline points="{l},{t} {l},{b} {rr},{b}" fill="none" stroke="{c}"/>"#,
            l = r.left,
            t = r.top,
            b = r.bottom(),
            rr = r.right(),
            c = hex(AXIS_COLOR)
        );

        let points = panel.points();
        if points.len() > 1 {
            let coords: Vec<String> = points.iter().map(|(x, y)| format!("{:.1},{:.1}", x, y)).collect();
            let _ = writeln!(
                svg,
                r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
                coords.join(" "),
                hex(panel.color)
            );
        }
        for (x, y) in &points {
            let _ = writeln!(
                svg,
                r#"<circle cx="{:.1}" cy="{:.1}" r="3" fill="{}"/>"#,
                x,
                y,
                hex(panel.color)
            );
        }
    }

    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle">Epoch</text>"#,
        MARGIN_LEFT + (WIDTH as f64 - MARGIN_LEFT - MARGIN_RIGHT) / 2.0,
        HEIGHT as f64 - 12.0
    );
    svg.push_str("</svg>\n");
    svg
}

fn hex([r, g, b]: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

fn render_raster(panels: &[Panel<'_>]) -> RgbImage {
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([255, 255, 255]));

    for panel in panels {
        let r = panel.rect;
        for tick in 0..=TICKS {
            let y = r.bottom() - r.height * tick as f64 / TICKS as f64;
            draw_line(&mut img, (r.left, y), (r.right(), y), GRID_COLOR, 1);
        }
        draw_line(&mut img, (r.left, r.top), (r.left, r.bottom()), AXIS_COLOR, 1);
        draw_line(&mut img, (r.left, r.bottom()), (r.right(), r.bottom()), AXIS_COLOR, 1);

        let points = panel.points();
        for pair in points.windows(2) {
            draw_line(&mut img, pair[0], pair[1], panel.color, 2);
        }
        for &p in &points {
            draw_dot(&mut img, p, 3, panel.color);
        }
    }
    img
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: [u8; 3]) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, Rgb(color));
    }
}

/// Bresenham line, `thickness` pixels wide.
fn draw_line(img: &mut RgbImage, from: (f64, f64), to: (f64, f64), color: [u8; 3], thickness: i64) {
    let (mut x0, mut y0) = (from.0.round() as i64, from.1.round() as i64);
    let (x1, y1) = (to.0.round() as i64, to.1.round() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        for o in 0..thickness {
            put(img, x0, y0 + o, color);
            put(img, x0 + o, y0, color);
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_dot(img: &mut RgbImage, center: (f64, f64), radius: i64, color: [u8; 3]) {
    let (cx, cy) = (center.0.round() as i64, center.1.round() as i64);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put(img, cx + dx, cy + dy, color);
            }
        }
    }
}
