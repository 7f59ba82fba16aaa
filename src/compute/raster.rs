// Software drawing for compute modules: an RGBA canvas, pixels, lines, rects, tiny bitmap font.
// Visual: whatever a module draws here is what the next frame message carries.

use crate::types::{Point, Rect, Size, BYTES_PER_PIXEL};

pub type Rgba = [u8; 4];

pub const BLACK: Rgba = [0, 0, 0, 255];
pub const WHITE: Rgba = [255, 255, 255, 255];

pub struct Canvas {
    size: Size,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(size: Size, fill: Rgba) -> Self {
        let pixels = fill.repeat(size.width as usize * size.height as usize);
        Self { size, pixels }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn fill(&mut self, color: Rgba) {
        for px in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&color);
        }
    }

    /// Put a pixel if (x,y) is inside bounds.
    #[inline]
    pub fn put_pixel(&mut self, x: i32, y: i32, color: Rgba) {
        if !self.size.contains(Point::new(x, y)) {
            return;
        }
        let idx = (y as usize * self.size.width as usize + x as usize) * BYTES_PER_PIXEL;
        self.pixels[idx..idx + BYTES_PER_PIXEL].copy_from_slice(&color);
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: Rgba) {
        for yy in y..y + h {
            for xx in x..x + w {
                self.put_pixel(xx, yy, color);
            }
        }
    }

    /// Copy out a sub-rectangle (clamped to the canvas) as a tightly packed RGBA buffer.
    pub fn region(&self, rect: Rect) -> (Vec<u8>, Rect) {
        let x = rect.x.min(self.size.width);
        let y = rect.y.min(self.size.height);
        let w = rect.width.min(self.size.width - x);
        let h = rect.height.min(self.size.height - y);
        let clamped = Rect::new(x, y, w, h);

        let stride = self.size.width as usize * BYTES_PER_PIXEL;
        let row_bytes = w as usize * BYTES_PER_PIXEL;
        let mut out = Vec::with_capacity(row_bytes * h as usize);
        for row in y..y + h {
            let ofs = row as usize * stride + x as usize * BYTES_PER_PIXEL;
            out.extend_from_slice(&self.pixels[ofs..ofs + row_bytes]);
        }
        (out, clamped)
    }
}

const MAX_LINE_PREALLOC: i64 = 4096;

/// Points of a Bresenham line from `a` to `b`, both ends included.
/// One point per step of the longer axis: clamp the ends to the canvas first.
pub fn line_points(a: Point, b: Point) -> Vec<Point> {
    let (mut x0, mut y0) = (a.x as i64, a.y as i64);
    let (x1, y1) = (b.x as i64, b.y as i64);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let mut pts = Vec::with_capacity((dx.max(-dy) + 1).min(MAX_LINE_PREALLOC) as usize);
    loop {
        pts.push(Point::new(x0 as i32, y0 as i32));
        if x0 == x1 && y0 == y1 { break; }
        let e2 = 2 * err;
        if e2 >= dy { err += dy; x0 += sx; }
        if e2 <= dx { err += dx; y0 += sy; }
    }
    pts
}

/// Smallest rect covering both points, clipped to non-negative coordinates.
pub fn bounding_rect(a: Point, b: Point) -> Rect {
    let x0 = a.x.min(b.x).max(0) as u32;
    let y0 = a.y.min(b.y).max(0) as u32;
    let x1 = a.x.max(b.x).max(0) as u32;
    let y1 = a.y.max(b.y).max(0) as u32;
    Rect::new(x0, y0, (x1 - x0).saturating_add(1), (y1 - y0).saturating_add(1))
}

/* ---------- 5x7 bitmap font (ASCII subset for HUD text) ---------- */

/// Each u8 is a row; the low 5 bits are the pixels (bit 4 = leftmost).
fn glyph5x7(ch: char) -> Option<[u8; 7]> {
    macro_rules! g { ($a:expr,$b:expr,$c:expr,$d:expr,$e:expr,$f:expr,$g:expr) => {
        Some([$a,$b,$c,$d,$e,$f,$g])
    }; }

    match ch {
        '0' => g!(0b01110,0b10001,0b10011,0b10101,0b11001,0b10001,0b01110),
        '1' => g!(0b00100,0b01100,0b00100,0b00100,0b00100,0b00100,0b01110),
        '2' => g!(0b01110,0b10001,0b00001,0b00010,0b00100,0b01000,0b11111),
        '3' => g!(0b11110,0b00001,0b00001,0b01110,0b00001,0b00001,0b11110),
        '4' => g!(0b00010,0b00110,0b01010,0b10010,0b11111,0b00010,0b00010),
        '5' => g!(0b11111,0b10000,0b11110,0b00001,0b00001,0b10001,0b01110),
        '6' => g!(0b00110,0b01000,0b10000,0b11110,0b10001,0b10001,0b01110),
        '7' => g!(0b11111,0b00001,0b00010,0b00100,0b01000,0b01000,0b01000),
        '8' => g!(0b01110,0b10001,0b10001,0b01110,0b10001,0b10001,0b01110),
        '9' => g!(0b01110,0b10001,0b10001,0b01111,0b00001,0b00010,0b01100),

        // Letters for "SCORE", "PAUSED", "GAME OVER"
        'A' => g!(0b01110,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001),
        'C' => g!(0b01110,0b10001,0b10000,0b10000,0b10000,0b10001,0b01110),
        'D' => g!(0b11100,0b10010,0b10001,0b10001,0b10001,0b10010,0b11100),
        'E' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b11111),
        'G' => g!(0b01110,0b10001,0b10000,0b10111,0b10001,0b10001,0b01111),
        'M' => g!(0b10001,0b11011,0b10101,0b10101,0b10001,0b10001,0b10001),
        'O' => g!(0b01110,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),
        'P' => g!(0b11110,0b10001,0b10001,0b11110,0b10000,0b10000,0b10000),
        'R' => g!(0b11110,0b10001,0b10001,0b11110,0b10100,0b10010,0b10001),
        'S' => g!(0b01111,0b10000,0b10000,0b01110,0b00001,0b00001,0b11110),
        'U' => g!(0b10001,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),
        'V' => g!(0b10001,0b10001,0b10001,0b10001,0b10001,0b01010,0b00100),

        ' ' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00000,0b00000),
        ':' => g!(0b00000,0b00100,0b00000,0b00000,0b00100,0b00000,0b00000),

        _ => None,
    }
}

/// Draw a text string using 5x7 glyphs, one pixel of spacing, black (1,1) shadow.
pub fn draw_text_5x7(canvas: &mut Canvas, mut x: i32, y: i32, text: &str, color: Rgba) {
    for ch in text.chars() {
        if let Some(rows) = glyph5x7(ch) {
            for (shade, dx, dy) in [(BLACK, 1, 1), (color, 0, 0)] {
                for (ry, rowbits) in rows.iter().enumerate() {
                    for rx in 0..5 {
                        if (rowbits & (1 << (4 - rx))) != 0 {
                            canvas.put_pixel(x + rx + dx, y + ry as i32 + dy, shade);
                        }
                    }
                }
            }
        }
        x += 6;
    }
}
