// The drawing surface: a software RGBA raster that only the render unit may own.
// Visual: whatever sits in `raster` is what the window shows after the next present.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use image::RgbaImage;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{validate_len, FrameBuffer, Rect, Size, BYTES_PER_PIXEL};

/// Receives finished snapshots of the surface. The render unit drops each one after handing it over.
pub trait Presenter: Send {
    fn present(&mut self, snapshot: RgbaImage);
}

/// Single-owner paint target. Not `Clone`: the only way to move it between threads is to move it.
pub struct DrawingSurface {
    raster: RgbaImage,
    presenter: Box<dyn Presenter>,
}

impl std::fmt::Debug for DrawingSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawingSurface")
            .field("width", &self.raster.width())
            .field("height", &self.raster.height())
            .finish_non_exhaustive()
    }
}

impl DrawingSurface {
    /// A transparent-black surface of the given size.
    pub fn new(size: Size, presenter: Box<dyn Presenter>) -> Self {
        Self { raster: RgbaImage::new(size.width, size.height), presenter }
    }

    pub fn size(&self) -> Size {
        Size::new(self.raster.width(), self.raster.height())
    }

    /// Reallocate to `size`; old content is discarded, like resizing a canvas.
    pub fn resize(&mut self, size: Size) {
        if self.size() == size {
            return;
        }
        debug!(from = ?self.size(), to = ?size, "resizing surface");
        self.raster = RgbaImage::new(size.width, size.height);
    }

    /// Full frame: validate, resize on dimension change, paint at (0,0).
    pub fn paint_full(&mut self, size: Size, pixels: &[u8]) -> Result<()> {
        validate_len(size, pixels.len())?;
        self.resize(size);
        let dst: &mut [u8] = &mut self.raster;
        dst.copy_from_slice(pixels);
        Ok(())
    }

    /// Partial frame: copy the rectangle in place. Never resizes or clears.
    /// Rows and columns past the surface edge are clipped.
    pub fn paint_part(&mut self, rect: Rect, pixels: &[u8]) -> Result<()> {
        validate_len(rect.size(), pixels.len())?;

        let surf_w = self.raster.width();
        let surf_h = self.raster.height();
        if rect.x >= surf_w || rect.y >= surf_h {
            return Ok(());
        }
        let copy_w = rect.width.min(surf_w - rect.x) as usize;
        let copy_h = rect.height.min(surf_h - rect.y) as usize;

        let src_stride = rect.width as usize * BYTES_PER_PIXEL;
        let dst_stride = surf_w as usize * BYTES_PER_PIXEL;
        let row_bytes = copy_w * BYTES_PER_PIXEL;
        let dst: &mut [u8] = &mut self.raster;

        for row in 0..copy_h {
            let src_ofs = row * src_stride;
            let dst_ofs = (rect.y as usize + row) * dst_stride + rect.x as usize * BYTES_PER_PIXEL;
            dst[dst_ofs..dst_ofs + row_bytes].copy_from_slice(&pixels[src_ofs..src_ofs + row_bytes]);
        }
        Ok(())
    }

    /// Paint a buffer at its own origin with partial-update semantics.
    pub fn paint(&mut self, fb: &FrameBuffer) -> Result<()> {
        fb.validate()?;
        self.paint_part(fb.rect(), &fb.pixels)
    }

    /// Bitmap frame: wrap the bytes in an immutable image, keep a copy as surface content,
    /// then hand the image itself to the presenter.
    pub fn present_bitmap(&mut self, size: Size, pixels: Vec<u8>) -> Result<()> {
        validate_len(size, pixels.len())?;
        let bitmap = RgbaImage::from_raw(size.width, size.height, pixels).ok_or(
            Error::MalformedFrame { expected: size.byte_len(), actual: 0 },
        )?;
        self.resize(size);
        let dst: &mut [u8] = &mut self.raster;
        dst.copy_from_slice(bitmap.as_raw());
        self.presenter.present(bitmap);
        Ok(())
    }

    /// Push a copy of the current content to the presenter.
    pub fn present(&mut self) {
        let snapshot = self.raster.clone();
        self.presenter.present(snapshot);
    }

    /// Current content as a full-canvas buffer.
    pub fn readback(&self) -> FrameBuffer {
        FrameBuffer::new(self.raster.as_raw().clone(), self.raster.width(), self.raster.height())
    }
}

/// Holds the surface until it is handed to a render unit. Handing it over twice fails.
#[derive(Debug)]
pub struct SurfaceSlot {
    surface: Option<DrawingSurface>,
}

impl SurfaceSlot {
    pub fn new(surface: DrawingSurface) -> Self {
        Self { surface: Some(surface) }
    }

    pub fn is_transferred(&self) -> bool {
        self.surface.is_none()
    }

    pub fn transfer(&mut self) -> Result<DrawingSurface> {
        self.surface.take().ok_or(Error::SurfaceAlreadyTransferred)
    }
}

/// Presenter that throws snapshots away.
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn present(&mut self, _snapshot: RgbaImage) {}
}

/// Presenter that forwards snapshots over a channel, dropping them if the receiver is behind.
pub struct ChannelPresenter {
    tx: flume::Sender<RgbaImage>,
}

impl ChannelPresenter {
    pub fn new(tx: flume::Sender<RgbaImage>) -> Self {
        Self { tx }
    }
}

impl Presenter for ChannelPresenter {
    fn present(&mut self, snapshot: RgbaImage) {
        // full or disconnected: the viewer only wants the newest image anyway
        let _ = self.tx.try_send(snapshot);
    }
}

/// Where a [`SnapshotPresenter`] leaves its most recent image.
#[derive(Clone, Default)]
pub struct LatestSnapshot {
    image: Arc<Mutex<Option<RgbaImage>>>,
    presented: Arc<AtomicU64>,
}

impl LatestSnapshot {
    pub fn latest(&self) -> Option<RgbaImage> {
        self.image.lock().clone()
    }

    pub fn presented(&self) -> u64 {
        self.presented.load(Ordering::Acquire)
    }
}

/// Presenter that keeps only the newest snapshot. Used headless and in tests.
pub struct SnapshotPresenter {
    shared: LatestSnapshot,
}

impl SnapshotPresenter {
    pub fn new() -> (Self, LatestSnapshot) {
        let shared = LatestSnapshot::default();
        (Self { shared: shared.clone() }, shared)
    }
}

impl Presenter for SnapshotPresenter {
    fn present(&mut self, snapshot: RgbaImage) {
        *self.shared.image.lock() = Some(snapshot);
        self.shared.presented.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(w: u32, h: u32) -> DrawingSurface {
        DrawingSurface::new(Size::new(w, h), Box::new(NullPresenter))
    }

    #[test]
    fn slot_transfers_exactly_once() {
        let mut slot = SurfaceSlot::new(surface(2, 2));
        let first = slot.transfer().unwrap();
        assert!(slot.is_transferred());
        assert!(matches!(slot.transfer(), Err(Error::SurfaceAlreadyTransferred)));
        // first owner still holds a working surface
        assert_eq!(first.size(), Size::new(2, 2));
    }

    #[test]
    fn full_frame_resizes_surface() {
        let mut s = surface(2, 2);
        let fb = FrameBuffer::filled(Size::new(3, 1), [9, 9, 9, 255]);
        s.paint_full(fb.size(), &fb.pixels).unwrap();
        assert_eq!(s.size(), Size::new(3, 1));
        assert_eq!(s.readback(), fb);
    }

    #[test]
    fn partial_frame_is_clipped_at_edges() {
        let mut s = surface(3, 3);
        let fb = FrameBuffer::at(vec![255; 2 * 2 * 4], Rect::new(2, 2, 2, 2));
        s.paint(&fb).unwrap();
        let back = s.readback();
        let px = |x: usize, y: usize| &back.pixels[(y * 3 + x) * 4..(y * 3 + x) * 4 + 4];
        assert_eq!(px(2, 2), &[255, 255, 255, 255]);
        assert_eq!(px(1, 1), &[0, 0, 0, 0]);
        assert_eq!(s.size(), Size::new(3, 3));
    }

    #[test]
    fn malformed_full_frame_leaves_content() {
        let mut s = surface(2, 1);
        let good = FrameBuffer::filled(Size::new(2, 1), [1, 2, 3, 4]);
        s.paint_full(good.size(), &good.pixels).unwrap();
        let err = s.paint_full(Size::new(4, 4), &[0; 7]).unwrap_err();
        assert!(matches!(err, Error::MalformedFrame { expected: 64, actual: 7 }));
        assert_eq!(s.readback(), good);
    }

    #[test]
    fn bitmap_is_presented_and_kept() {
        let (tx, rx) = flume::bounded(1);
        let mut s = DrawingSurface::new(Size::new(1, 1), Box::new(ChannelPresenter::new(tx)));
        s.present_bitmap(Size::new(2, 1), vec![5, 6, 7, 8, 1, 2, 3, 4]).unwrap();
        let shown = rx.try_recv().unwrap();
        assert_eq!(shown.get_pixel(1, 0).0, [1, 2, 3, 4]);
        assert_eq!(s.readback().pixels, vec![5, 6, 7, 8, 1, 2, 3, 4]);
    }
}
