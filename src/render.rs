//! Rendering decoded frames as grayscale rasters with annotation overlays.
//!
//! The base raster is upscaled to output resolution BEFORE boxes and text
//! are drawn. Drawing at native sensor resolution (e.g. 60x40) and scaling
//! afterwards produces blocky, unreadable annotations; the ordering here is
//! a correctness requirement, not a style choice.

use crate::bbox::center_to_pixel_rect;
use crate::font;
use crate::types::{AnnotationRecord, Frame};
use image::{GrayImage, Rgb, RgbImage};

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Nearest-neighbor upscale applied to the base raster.
    pub scale_factor: u32,
    pub line_thickness: u32,
    pub text_scale: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            scale_factor: 8,
            line_thickness: 2,
            text_scale: 2,
        }
    }
}

/// Intensity normalization bounds, shared by every frame of a session so
/// contrast stays consistent instead of flickering frame to frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRange {
    pub min: f32,
    pub max: f32,
}

/// Compute the session-wide display range: 1st/99th percentile over every
/// sample of every frame, widened by a 5% margin on each side.
pub fn display_range(frames: &[Frame]) -> DisplayRange {
    let mut samples: Vec<f32> = frames
        .iter()
        .flat_map(|f| f.samples().iter().copied())
        .filter(|v| v.is_finite())
        .collect();
    if samples.is_empty() {
        return DisplayRange { min: 0.0, max: 1.0 };
    }
    samples.sort_by(|a, b| a.total_cmp(b));
    let lo = percentile(&samples, 1.0);
    let hi = percentile(&samples, 99.0);
    let margin = (hi - lo) * 0.05;
    DisplayRange {
        min: lo - margin,
        max: hi + margin,
    }
}

/// Linear-interpolated percentile over a sorted slice.
fn percentile(sorted: &[f32], p: f64) -> f32 {
    let pos = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    (sorted[lo] as f64 * (1.0 - frac) + sorted[hi] as f64 * frac) as f32
}

/// Fixed category color table. Unknown categories fall back to white.
pub fn category_color(category: &str) -> Rgb<u8> {
    match category {
        "person" => Rgb([255, 0, 0]),
        "furniture" => Rgb([0, 0, 255]),
        "object" => Rgb([0, 255, 0]),
        "building" => Rgb([255, 255, 0]),
        "environment" => Rgb([0, 255, 255]),
        "appliance" => Rgb([255, 0, 255]),
        _ => Rgb([255, 255, 255]),
    }
}

/// Normalize a frame into an 8-bit grayscale raster at native resolution.
pub fn normalize_to_gray(frame: &Frame, range: &DisplayRange) -> GrayImage {
    let span = (range.max - range.min).max(f32::EPSILON);
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        let v = frame.get(y, x);
        let norm = ((v - range.min) / span).clamp(0.0, 1.0);
        image::Luma([(norm * 255.0) as u8])
    })
}

/// Render one frame: normalized grayscale base, upscaled, then one colored
/// rectangle and label per object in the matched record (if any), then the
/// frame index / timestamp header.
pub fn render_frame(
    frame: &Frame,
    record: Option<&AnnotationRecord>,
    frame_idx: usize,
    range: &DisplayRange,
    opts: &RenderOptions,
) -> RgbImage {
    let gray = normalize_to_gray(frame, range);
    let scale = opts.scale_factor.max(1);
    let out_w = frame.width() * scale;
    let out_h = frame.height() * scale;
    // Nearest-neighbor upscale and gray->RGB in one pass.
    let mut img = RgbImage::from_fn(out_w, out_h, |x, y| {
        let v = gray.get_pixel(x / scale, y / scale)[0];
        Rgb([v, v, v])
    });

    if let Some(record) = record {
        for obj in &record.objects {
            let color = category_color(&obj.category);
            let (x, y, w, h) = center_to_pixel_rect(obj.bbox, out_w, out_h);
            draw_rect(&mut img, x, y, x + w, y + h, color, opts.line_thickness);
            let label = short_label(obj.object_id, &obj.category, &obj.subcategory);
            draw_label(&mut img, &label, x, y, color, opts.text_scale);
        }
    }

    let header = format!("Frame {frame_idx} | t={:.3}s", frame.timestamp);
    draw_label(&mut img, &header, 2, 2, Rgb([255, 255, 255]), opts.text_scale);

    img
}

/// Compact per-box label, e.g. `per/adult #3`.
fn short_label(object_id: i64, category: &str, subcategory: &str) -> String {
    let cat: String = category.chars().take(3).collect();
    let sub: String = subcategory.chars().take(6).collect();
    format!("{cat}/{sub} #{object_id}")
}

/// Hollow rectangle with the given border thickness, clipped to the image.
fn draw_rect(img: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>, thickness: u32) {
    let (w, h) = img.dimensions();
    let clamp_x = |v: i64| v.clamp(0, w as i64 - 1) as u32;
    let clamp_y = |v: i64| v.clamp(0, h as i64 - 1) as u32;
    for t in 0..thickness as i64 {
        let (xa, ya) = (x0 + t, y0 + t);
        let (xb, yb) = (x1 - t, y1 - t);
        if xa > xb || ya > yb {
            continue;
        }
        let (xa, ya, xb, yb) = (clamp_x(xa), clamp_y(ya), clamp_x(xb), clamp_y(yb));
        for x in xa..=xb {
            img.put_pixel(x, ya, color);
            img.put_pixel(x, yb, color);
        }
        for y in ya..=yb {
            img.put_pixel(xa, y, color);
            img.put_pixel(xb, y, color);
        }
    }
}

fn fill_rect(img: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    for y in y0.max(0)..=y1.min(h as i64 - 1) {
        for x in x0.max(0)..=x1.min(w as i64 - 1) {
            img.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Text on a filled black strip so it stays readable over any intensity.
/// Placed just above `(x, y)` when there is room, below it otherwise.
fn draw_label(img: &mut RgbImage, text: &str, x: i64, y: i64, color: Rgb<u8>, text_scale: u32) {
    let tw = font::text_width(text, text_scale) as i64;
    let th = font::text_height(text_scale) as i64;
    let pad = 2i64;
    // One row short of `y` so a box border at `y` is never painted over.
    let ty = if y - th - 2 * pad - 1 >= 0 {
        y - th - 2 * pad - 1
    } else {
        y + pad
    };
    fill_rect(img, x, ty, x + tw + 2 * pad, ty + th + 2 * pad, Rgb([0, 0, 0]));
    font::draw_text(img, text, x + pad, ty + pad, text_scale, color);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObjectAnnotation, TemperatureUnit};

    fn flat_frame(width: u32, height: u32, value: f32, timestamp: f64) -> Frame {
        Frame::from_samples(
            vec![value; (width * height) as usize],
            width,
            height,
            timestamp,
            TemperatureUnit::Celsius,
        )
    }

    fn record_with_box(bbox: [f64; 4], category: &str) -> AnnotationRecord {
        AnnotationRecord {
            record_id: "r".into(),
            timestamp_ms: 0,
            objects: vec![ObjectAnnotation {
                bbox,
                category: category.into(),
                subcategory: "sub".into(),
                object_id: 1,
                obscured_percentage: None,
                heat_residual: None,
            }],
        }
    }

    #[test]
    fn display_range_covers_percentiles_with_margin() {
        let samples: Vec<f32> = (0..=100).map(|v| v as f32).collect();
        let frame = Frame::from_samples(samples, 101, 1, 0.0, TemperatureUnit::Celsius);
        let range = display_range(std::slice::from_ref(&frame));
        // 1st/99th percentiles are 1 and 99; span 98, margin 4.9.
        assert!((range.min - -3.9).abs() < 1e-3, "min {}", range.min);
        assert!((range.max - 103.9).abs() < 1e-3, "max {}", range.max);
    }

    #[test]
    fn gray_normalization_clamps_to_range() {
        let frame = flat_frame(2, 1, 50.0, 0.0);
        let range = DisplayRange { min: 0.0, max: 25.0 };
        let gray = normalize_to_gray(&frame, &range);
        assert_eq!(gray.get_pixel(0, 0)[0], 255);
        let range = DisplayRange { min: 60.0, max: 80.0 };
        let gray = normalize_to_gray(&frame, &range);
        assert_eq!(gray.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn output_is_upscaled_before_drawing() {
        let frame = flat_frame(6, 4, 20.0, 1.5);
        let range = DisplayRange { min: 0.0, max: 40.0 };
        let opts = RenderOptions::default();
        let img = render_frame(&frame, None, 0, &range, &opts);
        assert_eq!(img.dimensions(), (48, 32));
    }

    #[test]
    fn box_border_lands_on_scaled_coordinates() {
        let frame = flat_frame(6, 4, 20.0, 0.0);
        let range = DisplayRange { min: 0.0, max: 40.0 };
        let opts = RenderOptions {
            text_scale: 1,
            ..RenderOptions::default()
        };
        let record = record_with_box([0.5, 0.5, 0.5, 0.5], "person");
        let img = render_frame(&frame, Some(&record), 0, &range, &opts);
        // Corner box (0.25, 0.25, 0.5, 0.5) on 48x32 -> bottom edge at y=24,
        // clear of the label strip drawn inside the box top.
        assert_eq!(img.get_pixel(20, 24), &Rgb([255, 0, 0]));
        // Untouched background stays gray.
        assert_eq!(img.get_pixel(46, 30), &Rgb([127, 127, 127]));
    }

    #[test]
    fn unknown_category_gets_default_color() {
        assert_eq!(category_color("person"), Rgb([255, 0, 0]));
        assert_eq!(category_color("dragon"), Rgb([255, 255, 255]));
    }
}
