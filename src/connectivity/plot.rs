use std::io::Cursor;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::*;
use crate::connectivity::error::ConnectivityError;
use crate::network::Network;
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
    pub background: RGBColor,
    /// Colour of the smallest weight.
    pub low: RGBColor,
    /// Colour of the largest weight.
    pub high: RGBColor,
    /// Draw inactive edges as zero.
    pub thresholded: bool,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 480,
            height: 480,
            margin: 10,
            background: RGBColor(10, 10, 10),
            low: RGBColor(20, 30, 120),
            high: RGBColor(250, 220, 40),
            thresholded: false,
        }
    }
}
/// Renders the mirrored connectivity matrix as a heat map, one cell per
/// channel pair, and returns PNG bytes.
pub fn render_connectivity_png(
    network: &Network,
    style: PlotStyle,
) -> Result<Vec<u8>, ConnectivityError> {
    let n = network.nodes().len();
    if n == 0 {
        return Err(ConnectivityError::Plot("network has no nodes".into()));
    }
    let matrix = if style.thresholded {
        network.thresholded_connectivity_matrix(true)
    } else {
        network.full_connectivity_matrix(true)
    };
    let (lo, hi) = matrix
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = hi - lo;
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let area = root.margin(style.margin, style.margin, style.margin, style.margin);
        let (area_w, area_h) = area.dim_in_pixel();
        let cell_w = area_w as f64 / n as f64;
        let cell_h = area_h as f64 / n as f64;
        for ((row, col), &value) in matrix.indexed_iter() {
            let t = if value.is_finite() && span > 0.0 {
                (value - lo) / span
            } else {
                0.0
            };
            let top_left = ((col as f64 * cell_w) as i32, (row as f64 * cell_h) as i32);
            let bottom_right = (
                ((col + 1) as f64 * cell_w) as i32,
                ((row + 1) as f64 * cell_h) as i32,
            );
            area.draw(&Rectangle::new(
                [top_left, bottom_right],
                blend(style.low, style.high, t).filled(),
            ))?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
fn blend(low: RGBColor, high: RGBColor, t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(mix(low.0, high.0), mix(low.1, high.1), mix(low.2, high.2))
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ConnectivityError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| ConnectivityError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
