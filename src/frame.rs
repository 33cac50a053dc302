//! Frame helpers shared by the capture and highlight stages.
//!
//! A frame is an owned `image` buffer that moves stage to stage: the
//! capture source produces an `RgbImage`, the highlight stage consumes it
//! and returns a new one, and the display sink borrows the result. A
//! zero-dimension frame is the "nothing captured this tick" sentinel,
//! matching a camera read that returns no data.

use image::{GrayImage, Rgb, RgbImage};

/// True if the frame carries no pixels (either dimension is zero).
pub fn is_empty(frame: &RgbImage) -> bool {
    frame.width() == 0 || frame.height() == 0
}

/// Expand a single-channel image to three channels so color annotations
/// can be drawn over it.
pub fn gray_to_rgb(gray: &GrayImage) -> RgbImage {
    let mut out = RgbImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let v = pixel.0[0];
        out.put_pixel(x, y, Rgb([v, v, v]));
    }
    out
}
