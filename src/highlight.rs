//! Largest-contour highlight stage.
//!
//! This is the per-frame transformation at the center of the daemon:
//! grayscale reduction, Canny edge detection, full-list contour
//! extraction, largest-area selection, and a thick colored outline drawn
//! over the edge map. The function is total over non-empty frames, holds
//! no state across calls, and never blocks.
//!
//! Two conditions are surfaced as typed errors rather than being left to
//! panic: a zero-dimension input frame and an edge map with no closed
//! contours. The orchestrator treats both as skip-and-continue.
//!
//! Note that the stage is not idempotent: feeding its own output back in
//! re-detects edges on the annotated edge map and produces a different
//! image. Callers must not rely on a fixed point.

use image::{Rgb, RgbImage};
use imageproc::contours::{find_contours, Contour};
use imageproc::drawing::draw_filled_circle_mut;
use imageproc::edges::canny;
use imageproc::point::Point;
use thiserror::Error;

use crate::frame;

/// Canny hysteresis thresholds. Tuned by eye; treat as behavioral
/// constants, not derived values.
pub const CANNY_LOW: f32 = 64.0;
pub const CANNY_HIGH: f32 = 150.0;

/// Outline stroke width in pixels.
pub const OUTLINE_THICKNESS: u32 = 25;

/// Outline color.
pub const OUTLINE_COLOR: Rgb<u8> = Rgb([173, 23, 32]);

/// Failure conditions of the highlight stage.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HighlightError {
    /// The input frame has zero width or height.
    #[error("input frame has zero dimensions")]
    EmptyFrame,
    /// Edge detection produced a map with no closed contours, so there is
    /// no largest contour to outline.
    #[error("edge map contains no closed contours")]
    NoContours,
}

/// Tunable parameters of the highlight stage.
///
/// Defaults match the shipped tuning; the daemon overrides them from
/// its config file.
#[derive(Clone, Debug)]
pub struct HighlightParams {
    pub canny_low: f32,
    pub canny_high: f32,
    pub thickness: u32,
    pub color: Rgb<u8>,
}

impl Default for HighlightParams {
    fn default() -> Self {
        Self {
            canny_low: CANNY_LOW,
            canny_high: CANNY_HIGH,
            thickness: OUTLINE_THICKNESS,
            color: OUTLINE_COLOR,
        }
    }
}

/// Run the full highlight pipeline on one frame.
///
/// The output has the same width and height as the input: a grayscale
/// edge map expanded to three channels, with the largest contour's
/// boundary drawn in `params.color`.
pub fn highlight(input: &RgbImage, params: &HighlightParams) -> Result<RgbImage, HighlightError> {
    if frame::is_empty(input) {
        return Err(HighlightError::EmptyFrame);
    }

    let gray = image::imageops::grayscale(input);
    let edges = canny(&gray, params.canny_low, params.canny_high);

    // Suzuki-Abe border following: every contour, every boundary point.
    let contours = find_contours::<i32>(&edges);
    let largest = largest_contour(&contours).ok_or(HighlightError::NoContours)?;

    let mut annotated = frame::gray_to_rgb(&edges);
    draw_outline(&mut annotated, &largest.points, params.thickness, params.color);
    Ok(annotated)
}

/// The contour enclosing the greatest area.
///
/// Strict `>` comparison keeps the earliest-extracted contour on ties,
/// which makes the selection deterministic for a fixed input.
pub fn largest_contour<'a>(contours: &'a [Contour<i32>]) -> Option<&'a Contour<i32>> {
    let mut best: Option<(&'a Contour<i32>, f64)> = None;
    for contour in contours {
        let area = contour_area(&contour.points);
        match best {
            Some((_, best_area)) if area <= best_area => {}
            _ => best = Some((contour, area)),
        }
    }
    best.map(|(contour, _)| contour)
}

/// Enclosed area of a closed boundary via the shoelace formula.
///
/// Fewer than three points cannot enclose anything and score zero.
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut doubled = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        doubled += i64::from(p.x) * i64::from(q.y) - i64::from(q.x) * i64::from(p.y);
    }
    doubled.abs() as f64 / 2.0
}

/// Stamp a filled disc at every boundary point.
///
/// The extraction retains every point of the boundary, so consecutive
/// discs overlap and form a continuous stroke of the requested width.
fn draw_outline(canvas: &mut RgbImage, points: &[Point<i32>], thickness: u32, color: Rgb<u8>) {
    let radius = (thickness / 2).max(1) as i32;
    for point in points {
        draw_filled_circle_mut(canvas, (point.x, point.y), radius, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::contours::BorderType;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn rect_frame(width: u32, height: u32, rect: Rect) -> RgbImage {
        let mut frame = RgbImage::new(width, height);
        draw_filled_rect_mut(&mut frame, rect, Rgb([255, 255, 255]));
        frame
    }

    #[test]
    fn output_dimensions_match_input() {
        let frame = rect_frame(320, 240, Rect::at(40, 30).of_size(120, 80));
        let out = highlight(&frame, &HighlightParams::default()).expect("highlight");
        assert_eq!(out.dimensions(), frame.dimensions());
    }

    #[test]
    fn rectangle_boundary_is_the_largest_contour() {
        let frame = rect_frame(320, 240, Rect::at(40, 30).of_size(120, 80));
        let gray = image::imageops::grayscale(&frame);
        let edges = canny(&gray, CANNY_LOW, CANNY_HIGH);

        let contours = find_contours::<i32>(&edges);
        let largest = largest_contour(&contours).expect("at least one contour");
        let area = contour_area(&largest.points);

        // The detected boundary sits within a pixel or two of the drawn
        // rectangle, so the enclosed area lands near 120 * 80.
        let expected = 120.0 * 80.0;
        let relative_error = (area - expected).abs() / expected;
        assert!(
            relative_error < 0.15,
            "area {} too far from expected {}",
            area,
            expected
        );
    }

    #[test]
    fn blank_frame_has_no_contours() {
        let frame = RgbImage::new(64, 64);
        let err = highlight(&frame, &HighlightParams::default()).unwrap_err();
        assert_eq!(err, HighlightError::NoContours);
    }

    #[test]
    fn zero_dimension_frame_short_circuits() {
        let err = highlight(&RgbImage::new(0, 0), &HighlightParams::default()).unwrap_err();
        assert_eq!(err, HighlightError::EmptyFrame);
    }

    #[test]
    fn outline_color_appears_in_output() {
        let frame = rect_frame(320, 240, Rect::at(40, 30).of_size(120, 80));
        let out = highlight(&frame, &HighlightParams::default()).expect("highlight");
        assert!(out.pixels().any(|p| *p == OUTLINE_COLOR));
    }

    #[test]
    fn area_ties_resolve_to_the_earliest_contour() {
        let square = |dx: i32| {
            vec![
                Point::new(dx, 0),
                Point::new(dx + 10, 0),
                Point::new(dx + 10, 10),
                Point::new(dx, 10),
            ]
        };
        let contours = vec![
            Contour::new(square(0), BorderType::Outer, None),
            Contour::new(square(100), BorderType::Outer, None),
        ];

        let chosen = largest_contour(&contours).expect("contour");
        assert_eq!(chosen.points[0], Point::new(0, 0));
    }

    #[test]
    fn shoelace_area_of_unit_square() {
        let points = vec![
            Point::new(0, 0),
            Point::new(4, 0),
            Point::new(4, 4),
            Point::new(0, 4),
        ];
        assert_eq!(contour_area(&points), 16.0);
        assert_eq!(contour_area(&points[..2]), 0.0);
    }
}
