// Core value types shared by every thread.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Bytes per RGBA pixel.
pub const BYTES_PER_PIXEL: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Byte length of an RGBA buffer covering this size.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= 0 && p.y >= 0 && (p.x as u32) < self.width && (p.y as u32) < self.height
    }

    /// Nearest point inside `[0, width-1] × [0, height-1]`. An empty size clamps to (0,0).
    pub fn clamp(&self, p: Point) -> Point {
        let max_x = self.width.saturating_sub(1).min(i32::MAX as u32) as i32;
        let max_y = self.height.saturating_sub(1).min(i32::MAX as u32) as i32;
        Point::new(p.x.clamp(0, max_x), p.y.clamp(0, max_y))
    }
}

/// Canvas-relative integer coordinate. Can be negative while dragging outside the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle: top-left origin plus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// What a compute unit needs to start: which module, how big a canvas.
/// Immutable once sent; every message carries its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeParams {
    pub module_reference: String,
    pub width: u32,
    pub height: u32,
}

impl ComputeParams {
    pub fn new(module_reference: impl Into<String>, width: u32, height: u32) -> Self {
        Self { module_reference: module_reference.into(), width, height }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl fmt::Display for ComputeParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module={} width={} height={}", self.module_reference, self.width, self.height)
    }
}

/// RGBA raster plus where it lands on the canvas.
/// A full frame has origin (0,0) and canvas dimensions; a partial one covers a dirty rectangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub origin_x: u32,
    pub origin_y: u32,
}

impl FrameBuffer {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self { pixels, width, height, origin_x: 0, origin_y: 0 }
    }

    pub fn at(pixels: Vec<u8>, rect: Rect) -> Self {
        Self { pixels, width: rect.width, height: rect.height, origin_x: rect.x, origin_y: rect.y }
    }

    /// A buffer filled with one RGBA color.
    pub fn filled(size: Size, rgba: [u8; 4]) -> Self {
        let pixels = rgba.repeat(size.width as usize * size.height as usize);
        Self::new(pixels, size.width, size.height)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.origin_x, self.origin_y, self.width, self.height)
    }

    /// Checks `pixels.len() == width * height * 4`.
    pub fn validate(&self) -> Result<()> {
        validate_len(self.size(), self.pixels.len())
    }
}

pub fn validate_len(size: Size, actual: usize) -> Result<()> {
    let expected = size.byte_len();
    if expected != actual {
        return Err(Error::MalformedFrame { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_short_buffer() {
        let fb = FrameBuffer::new(vec![0; 15], 2, 2);
        match fb.validate() {
            Err(Error::MalformedFrame { expected, actual }) => {
                assert_eq!(expected, 16);
                assert_eq!(actual, 15);
            }
            other => panic!("expected MalformedFrame, got {other:?}"),
        }
    }

    #[test]
    fn filled_has_consistent_length() {
        let fb = FrameBuffer::filled(Size::new(3, 5), [1, 2, 3, 255]);
        assert!(fb.validate().is_ok());
        assert_eq!(&fb.pixels[..4], &[1, 2, 3, 255]);
        assert_eq!(fb.rect(), Rect::new(0, 0, 3, 5));
    }

    #[test]
    fn size_contains_is_exclusive_at_edges() {
        let s = Size::new(4, 3);
        assert!(s.contains(Point::new(0, 0)));
        assert!(s.contains(Point::new(3, 2)));
        assert!(!s.contains(Point::new(4, 2)));
        assert!(!s.contains(Point::new(-1, 0)));
    }

    #[test]
    fn clamp_pulls_points_onto_the_canvas() {
        let s = Size::new(10, 10);
        assert_eq!(s.clamp(Point::new(i32::MAX, 4)), Point::new(9, 4));
        assert_eq!(s.clamp(Point::new(i32::MIN, i32::MIN)), Point::new(0, 0));
        assert_eq!(s.clamp(Point::new(3, 7)), Point::new(3, 7));
        assert_eq!(Size::new(0, 0).clamp(Point::new(5, 5)), Point::new(0, 0));
    }
}
