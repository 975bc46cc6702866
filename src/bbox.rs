//! Bounding-box coordinate conversions.
//!
//! Annotation boxes arrive in YOLO format: normalized center coordinates
//! plus width/height. Rendering needs corner-based pixel boxes; export
//! writes the original center-based box untouched.

/// Convert a normalized center-based box to a normalized corner-based box.
///
/// Pure; inputs are assumed normalized but deliberately not clamped or
/// validated, so out-of-range boxes pass through unchanged.
pub fn center_to_corner(cx: f64, cy: f64, w: f64, h: f64) -> (f64, f64, f64, f64) {
    (cx - w / 2.0, cy - h / 2.0, w, h)
}

/// Scale a normalized corner-based box to pixel coordinates. Values are
/// truncated, not rounded: a box's top-left pixel is the floor of its
/// normalized position.
pub fn normalized_to_pixel(
    x: f64,
    y: f64,
    w: f64,
    h: f64,
    img_width: u32,
    img_height: u32,
) -> (i64, i64, i64, i64) {
    (
        (x * img_width as f64) as i64,
        (y * img_height as f64) as i64,
        (w * img_width as f64) as i64,
        (h * img_height as f64) as i64,
    )
}

/// Composition used by the renderer: YOLO box straight to pixel corners.
pub fn center_to_pixel_rect(bbox: [f64; 4], img_width: u32, img_height: u32) -> (i64, i64, i64, i64) {
    let (x, y, w, h) = center_to_corner(bbox[0], bbox[1], bbox[2], bbox[3]);
    normalized_to_pixel(x, y, w, h, img_width, img_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner_conversion_matches_worked_example() {
        let (px, py, pw, ph) = center_to_pixel_rect([0.3198, 0.7576, 0.185, 0.2517], 480, 320);
        assert_eq!((px, py), (109, 202));
        assert_eq!((pw, ph), (88, 80));
    }

    #[test]
    fn center_round_trips_through_corner() {
        let cases = [
            (0.5, 0.5, 0.2, 0.2),
            (0.3198, 0.7576, 0.185, 0.2517),
            (0.0, 1.0, 1.0, 0.001),
        ];
        for (cx, cy, w, h) in cases {
            let (x, y, w2, h2) = center_to_corner(cx, cy, w, h);
            let (rcx, rcy) = (x + w2 / 2.0, y + h2 / 2.0);
            assert!((rcx - cx).abs() < 1e-12);
            assert!((rcy - cy).abs() < 1e-12);
            assert_eq!((w2, h2), (w, h));
        }
    }

    #[test]
    fn out_of_range_boxes_pass_through() {
        let (x, y, w, h) = center_to_corner(-0.5, 1.5, 2.0, 2.0);
        assert_eq!((x, y, w, h), (-1.5, 0.5, 2.0, 2.0));
    }

    #[test]
    fn pixel_coordinates_truncate() {
        let (px, py, pw, ph) = normalized_to_pixel(0.999, 0.999, 0.999, 0.999, 100, 100);
        assert_eq!((px, py, pw, ph), (99, 99, 99, 99));
    }
}
