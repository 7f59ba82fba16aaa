//! The compute unit: a thread that loads one compute module, feeds it commands and ships
//! whatever frames it produces back to the orchestrator.
//!
//! Modules are opaque. They see a canvas size, input events and a periodic tick, and answer
//! through a [`FrameSink`] that has one adapter per producer style (full, partial, bitmap).

pub mod life;
pub mod loader;
pub mod noise;
pub mod raster;
pub mod rng;
pub mod snake;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use flume::RecvTimeoutError;
use tracing::{debug, info, warn};

use crate::buffer::{MovedBuffer, SharedBuffer};
use crate::error::{Error, Result};
use crate::protocol::{ComputeCommand, ComputeEvent, FrameMessage, InputEvent, Outbound, UnitState};
use crate::types::{ComputeParams, Rect, Size};

pub trait ComputeModule: Send {
    fn name(&self) -> &'static str;

    /// Called once, right after loading.
    fn start(&mut self, size: Size, sink: &mut FrameSink);

    fn resize(&mut self, size: Size, sink: &mut FrameSink);

    fn input(&mut self, event: &InputEvent, sink: &mut FrameSink);

    fn tick(&mut self, _sink: &mut FrameSink) {}

    /// `None` means the module only reacts to commands.
    fn tick_interval(&self) -> Option<Duration> {
        None
    }
}

/// Outbound side of a compute unit. Frames are stamped with the unit's generation.
/// Once the unit is cancelled every send is discarded.
pub struct FrameSink {
    generation: u64,
    tx: flume::Sender<Outbound>,
    cancel: Arc<AtomicBool>,
    disconnected: bool,
}

impl FrameSink {
    pub fn new(generation: u64, tx: flume::Sender<Outbound>, cancel: Arc<AtomicBool>) -> Self {
        Self { generation, tx, cancel, disconnected: false }
    }

    /// `frame`: a whole-canvas buffer, moved to the consumer.
    pub fn full(&mut self, pixels: Vec<u8>, size: Size) {
        self.frame(FrameMessage::Full { pixels: MovedBuffer::new(pixels), size });
    }

    /// `framePart`: a dirty rectangle, moved to the consumer.
    pub fn part(&mut self, pixels: Vec<u8>, rect: Rect) {
        self.frame(FrameMessage::Part { pixels: MovedBuffer::new(pixels), rect });
    }

    /// `pixels`: a whole-canvas buffer shared read-only with the consumer.
    pub fn bitmap(&mut self, pixels: SharedBuffer, size: Size) {
        self.frame(FrameMessage::Bitmap { pixels, size });
    }

    pub fn log(&mut self, message: impl Into<String>) {
        self.emit(ComputeEvent::Log(message.into()));
    }

    fn frame(&mut self, frame: FrameMessage) {
        self.emit(ComputeEvent::Frame(frame));
    }

    fn state(&mut self, state: UnitState) {
        self.emit(ComputeEvent::State(state));
    }

    fn emit(&mut self, event: ComputeEvent) {
        if self.disconnected || self.is_cancelled() {
            return;
        }
        if self.tx.send(Outbound { generation: self.generation, event }).is_err() {
            self.disconnected = true;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

/// Everything one compute unit owns. Lives on the unit's thread only.
struct UnitContext {
    state: UnitState,
    params: Option<ComputeParams>,
    module: Option<Box<dyn ComputeModule>>,
    sink: FrameSink,
}

impl UnitContext {
    fn advance(&mut self, to: UnitState) {
        match self.state.advance(to) {
            Ok(next) => {
                self.state = next;
                self.sink.state(next);
            }
            Err(e) => warn!("{e}"),
        }
    }

    fn handle(&mut self, cmd: ComputeCommand) {
        match cmd {
            ComputeCommand::Init(params) => self.init(params),
            ComputeCommand::Resize(size) => {
                if let Some(params) = self.params.as_mut() {
                    params.width = size.width;
                    params.height = size.height;
                }
                match self.module.as_mut() {
                    Some(module) if self.state.accepts_commands() => module.resize(size, &mut self.sink),
                    _ => debug!(state = ?self.state, "resize ignored"),
                }
            }
            ComputeCommand::Input(event) => match self.module.as_mut() {
                Some(module) if self.state.accepts_commands() => module.input(&event, &mut self.sink),
                _ => debug!(state = ?self.state, kind = %event.kind(), "input ignored"),
            },
        }
    }

    fn init(&mut self, params: ComputeParams) {
        if self.state != UnitState::Uninitialized {
            warn!(state = ?self.state, "init ignored: unit already initialized");
            return;
        }
        self.advance(UnitState::Loading);

        match loader::load(&params) {
            Ok(mut module) => {
                info!(module = module.name(), %params, "compute module loaded");
                self.advance(UnitState::Ready);
                module.start(params.size(), &mut self.sink);
                self.module = Some(module);
                self.params = Some(params);
            }
            Err(e) => {
                // inert until the orchestrator reloads; no retry
                warn!("{e}");
                self.sink.log(e.to_string());
                self.advance(UnitState::Terminated);
                self.params = Some(params);
            }
        }
    }

    fn tick_interval(&self) -> Option<Duration> {
        match &self.module {
            Some(module) if self.state.accepts_commands() => module.tick_interval(),
            _ => None,
        }
    }

    fn run(mut self, commands: flume::Receiver<ComputeCommand>) {
        let mut next_tick: Option<Instant> = None;

        loop {
            if self.sink.is_cancelled() || self.sink.is_disconnected() {
                break;
            }

            let interval = self.tick_interval();
            if interval.is_none() {
                next_tick = None;
            } else if next_tick.is_none() {
                next_tick = interval.map(|i| Instant::now() + i);
            }

            let received = match next_tick {
                Some(deadline) => commands.recv_deadline(deadline),
                None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(cmd) => self.handle(cmd),
                Err(RecvTimeoutError::Timeout) => {
                    if let (Some(module), Some(interval)) = (self.module.as_mut(), interval) {
                        module.tick(&mut self.sink);
                        let now = Instant::now();
                        // don't try to catch up on missed ticks
                        next_tick = next_tick.map(|t| {
                            let due = t + interval;
                            if due < now { now + interval } else { due }
                        });
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        if self.state != UnitState::Terminated {
            self.advance(UnitState::Terminated);
        }
        debug!("compute unit exiting");
    }
}

/// The orchestrator's handle on a running compute unit.
pub struct ComputeHandle {
    generation: u64,
    commands: Option<flume::Sender<ComputeCommand>>,
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ComputeHandle {
    pub fn spawn(generation: u64, outbound: flume::Sender<Outbound>) -> Result<Self> {
        let (tx, rx) = flume::unbounded();
        let cancel = Arc::new(AtomicBool::new(false));
        let ctx = UnitContext {
            state: UnitState::Uninitialized,
            params: None,
            module: None,
            sink: FrameSink::new(generation, outbound, Arc::clone(&cancel)),
        };
        let thread = thread::Builder::new()
            .name(format!("compute-{generation}"))
            .spawn(move || ctx.run(rx))?;

        Ok(Self { generation, commands: Some(tx), cancel, thread: Some(thread) })
    }

    pub fn send(&self, cmd: ComputeCommand) -> Result<()> {
        let tx = self.commands.as_ref().ok_or(Error::UnitDisconnected("compute"))?;
        tx.send(cmd).map_err(|_| Error::UnitDisconnected("compute"))
    }

    /// Stop the unit: pending commands are dropped, outbound sends are discarded from now on.
    pub fn terminate(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.cancel.store(true, Ordering::Release);
        self.commands.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(generation = self.generation, "compute unit panicked");
            }
        }
    }
}

impl Drop for ComputeHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
