// Random black/white static, shipped through the bitmap (`pixels`) path.

use std::time::Duration;

use crate::buffer::SharedBuffer;
use crate::compute::raster::{BLACK, WHITE};
use crate::compute::rng::Rng32;
use crate::compute::{ComputeModule, FrameSink};
use crate::protocol::InputEvent;
use crate::types::Size;

const FRAME_INTERVAL: Duration = Duration::from_millis(50);

pub struct Noise {
    size: Size,
    rng: Rng32,
    frozen: bool,
}

impl Noise {
    pub fn new() -> Self {
        Self { size: Size::default(), rng: Rng32::from_time(), frozen: false }
    }

    fn emit(&mut self, sink: &mut FrameSink) {
        let n = self.size.width as usize * self.size.height as usize;
        let mut pixels = Vec::with_capacity(self.size.byte_len());
        for _ in 0..n {
            // about one in three pixels lit
            let px = if self.rng.one_in(3) { WHITE } else { BLACK };
            pixels.extend_from_slice(&px);
        }
        sink.bitmap(SharedBuffer::new(pixels), self.size);
    }
}

impl Default for Noise {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeModule for Noise {
    fn name(&self) -> &'static str {
        "noise"
    }

    fn start(&mut self, size: Size, sink: &mut FrameSink) {
        self.size = size;
        self.emit(sink);
    }

    fn resize(&mut self, size: Size, sink: &mut FrameSink) {
        self.size = size;
        self.emit(sink);
    }

    // click freezes / unfreezes the static
    fn input(&mut self, event: &InputEvent, _sink: &mut FrameSink) {
        if let InputEvent::Click { .. } = event {
            self.frozen = !self.frozen;
        }
    }

    fn tick(&mut self, sink: &mut FrameSink) {
        if !self.frozen {
            self.emit(sink);
        }
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(FRAME_INTERVAL)
    }
}
