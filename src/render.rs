// The render unit: owns the drawing surface and paints whatever frames reach its mailbox.
// Nothing flows back out except the counters below; paints always run to completion.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::mailbox::Mailbox;
use crate::protocol::{FrameMessage, RenderCommand};
use crate::surface::DrawingSurface;

/// Progress counters, readable from any thread.
#[derive(Debug, Default)]
pub struct RenderStats {
    painted: AtomicU64,
    rejected: AtomicU64,
}

impl RenderStats {
    pub fn painted(&self) -> u64 {
        self.painted.load(Ordering::Acquire)
    }

    /// Frames dropped as malformed or received before the surface.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Acquire)
    }
}

struct RenderUnit {
    surface: Option<DrawingSurface>,
    stats: Arc<RenderStats>,
}

impl RenderUnit {
    fn handle(&mut self, cmd: RenderCommand) {
        match cmd {
            RenderCommand::Init(surface) => {
                if self.surface.is_some() {
                    // keep the surface we already own
                    warn!("{}", Error::SurfaceAlreadyTransferred);
                    return;
                }
                debug!(size = ?surface.size(), "render unit received surface");
                self.surface = Some(surface);
            }
            RenderCommand::Frame { generation, frame } => {
                let Some(surface) = self.surface.as_mut() else {
                    warn!(kind = %frame.kind(), "frame before surface; dropped");
                    self.stats.rejected.fetch_add(1, Ordering::AcqRel);
                    return;
                };
                let kind = frame.kind();
                match paint(surface, frame) {
                    Ok(()) => {
                        trace!(generation, %kind, "painted");
                        self.stats.painted.fetch_add(1, Ordering::AcqRel);
                    }
                    Err(e) => {
                        warn!(generation, %kind, "{e}");
                        self.stats.rejected.fetch_add(1, Ordering::AcqRel);
                    }
                }
            }
        }
    }

    fn run(mut self, mailbox: Arc<Mailbox>) {
        while let Some(cmd) = mailbox.recv() {
            self.handle(cmd);
        }
        debug!("render unit exiting");
    }
}

/// Apply one frame. A malformed buffer is rejected before the surface is touched.
pub fn paint(surface: &mut DrawingSurface, frame: FrameMessage) -> Result<()> {
    match frame {
        FrameMessage::Full { pixels, size } => {
            surface.paint_full(size, pixels.as_slice())?;
            surface.present();
        }
        FrameMessage::Part { pixels, rect } => {
            surface.paint_part(rect, pixels.as_slice())?;
            surface.present();
        }
        FrameMessage::Bitmap { pixels, size } => surface.present_bitmap(size, pixels.into_vec())?,
    }
    Ok(())
}

pub struct RenderHandle {
    mailbox: Arc<Mailbox>,
    stats: Arc<RenderStats>,
    thread: Option<JoinHandle<()>>,
}

impl RenderHandle {
    pub fn spawn(mailbox: Arc<Mailbox>) -> Result<Self> {
        let stats = Arc::new(RenderStats::default());
        let unit = RenderUnit { surface: None, stats: Arc::clone(&stats) };
        let thread = {
            let mailbox = Arc::clone(&mailbox);
            thread::Builder::new().name("render".into()).spawn(move || unit.run(mailbox))?
        };
        Ok(Self { mailbox, stats, thread: Some(thread) })
    }

    pub fn init(&self, surface: DrawingSurface) -> Result<()> {
        self.mailbox.push_init(surface)
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    pub fn stats(&self) -> &Arc<RenderStats> {
        &self.stats
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.mailbox.close();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("render unit panicked");
            }
        }
    }
}

impl Drop for RenderHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
