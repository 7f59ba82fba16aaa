//! Lifecycle and routing.
//!
//! The orchestrator owns one long-lived render unit and one replaceable compute unit. A relay
//! thread sits between them: it reads every compute unit's outbound channel, drops anything
//! stamped with a replaced generation, forwards frames to the render mailbox untouched and
//! republishes `log` messages on the log tap.
//!
//! ```text
//!  input ──► Orchestrator ──commands──► compute-N ──Outbound──► relay ──► Mailbox ──► render
//!                                                                 │
//!                                                                 └──► logs()
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::compute::ComputeHandle;
use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::input::{InputTranslator, RawInput};
use crate::mailbox::{Delivery, Mailbox};
use crate::protocol::{ComputeCommand, ComputeEvent, InputEvent, Outbound, UnitState};
use crate::render::{RenderHandle, RenderStats};
use crate::surface::SurfaceSlot;
use crate::types::{ComputeParams, Size};

/// Undelivered log lines beyond this are dropped.
const LOG_TAP_CAPACITY: usize = 256;

/// State the relay and the orchestrator both look at.
#[derive(Debug)]
struct Shared {
    generation: AtomicU64,
    compute_state: Mutex<UnitState>,
}

impl Shared {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    /// Move to a new generation and reset the reported state with it.
    /// Both change under the state lock so a late report can't land in between.
    fn next_generation(&self, state: UnitState) -> u64 {
        let mut current = self.compute_state.lock();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        *current = state;
        generation
    }

    /// Record a state report. Reports from replaced units are ignored.
    fn report_state(&self, generation: u64, state: UnitState) -> bool {
        let mut current = self.compute_state.lock();
        if !self.is_current(generation) {
            return false;
        }
        *current = state;
        true
    }
}

struct Running {
    params: ComputeParams,
    shared: Arc<Shared>,
    render: RenderHandle,
    compute: Option<ComputeHandle>,
    outbound: flume::Sender<Outbound>,
    relay: Option<JoinHandle<()>>,
    translator: InputTranslator,
}

impl Running {
    fn compute(&self) -> Result<&ComputeHandle> {
        self.compute.as_ref().ok_or(Error::UnitDisconnected("compute"))
    }

    /// Replace the compute unit. Frames from the old one are purged and refused from here on.
    fn respawn(&mut self) -> Result<()> {
        let generation = self.shared.next_generation(UnitState::Uninitialized);
        let purged = self.render.mailbox().purge_before(generation);
        if let Some(old) = self.compute.take() {
            old.terminate();
        }
        debug!(generation, purged, "compute unit replaced");

        let compute = ComputeHandle::spawn(generation, self.outbound.clone())?;
        compute.send(ComputeCommand::Init(self.params.clone()))?;
        self.compute = Some(compute);
        Ok(())
    }

    fn shutdown(mut self) {
        // stop everything still in flight from reaching the mailbox
        let generation = self.shared.next_generation(UnitState::Terminated);
        self.render.mailbox().purge_before(generation);
        if let Some(compute) = self.compute.take() {
            compute.terminate();
        }

        // last sender gone: the relay drains what is left and exits
        drop(self.outbound);
        if let Some(relay) = self.relay.take() {
            if relay.join().is_err() {
                warn!("relay thread panicked");
            }
        }
        self.render.stop();
    }
}

pub struct Orchestrator {
    mailbox_capacity: usize,
    running: Option<Running>,
    log_tx: flume::Sender<String>,
    log_rx: flume::Receiver<String>,
}

impl Orchestrator {
    pub fn new(mailbox_capacity: usize) -> Self {
        let (log_tx, log_rx) = flume::bounded(LOG_TAP_CAPACITY);
        Self { mailbox_capacity: mailbox_capacity.max(1), running: None, log_tx, log_rx }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.mailbox_capacity)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// `idle → running`: spawn the render unit, hand it the surface, spawn the first
    /// compute unit and send it `init`.
    pub fn start(&mut self, params: ComputeParams, slot: &mut SurfaceSlot) -> Result<()> {
        if self.running.is_some() {
            return Err(Error::AlreadyRunning);
        }
        let surface = slot.transfer()?;

        let mailbox = Arc::new(Mailbox::new(self.mailbox_capacity));
        let render = RenderHandle::spawn(Arc::clone(&mailbox))?;
        render.init(surface)?;

        let shared = Arc::new(Shared {
            generation: AtomicU64::new(0),
            compute_state: Mutex::new(UnitState::Uninitialized),
        });
        // same depth as the mailbox so a stalled render unit slows the producer down
        let (outbound, outbound_rx) = flume::bounded(self.mailbox_capacity);
        let relay = {
            let shared = Arc::clone(&shared);
            let log_tx = self.log_tx.clone();
            thread::Builder::new()
                .name("relay".into())
                .spawn(move || relay(outbound_rx, mailbox, shared, log_tx))?
        };

        let mut running = Running {
            params: params.clone(),
            shared,
            render,
            compute: None,
            outbound,
            relay: Some(relay),
            translator: InputTranslator::new(),
        };
        if let Err(e) = running.respawn() {
            running.shutdown();
            return Err(e);
        }
        info!(%params, "orchestrator started");
        self.running = Some(running);
        Ok(())
    }

    /// Terminate the compute unit and start a fresh one with the same params.
    /// The render unit and its surface are untouched.
    pub fn reload(&mut self) -> Result<()> {
        let running = self.running.as_mut().ok_or(Error::NotRunning)?;
        running.translator = InputTranslator::new();
        running.respawn()?;
        info!(params = %running.params, "compute unit reloaded");
        Ok(())
    }

    /// Reload with different params, e.g. another module.
    pub fn reload_with(&mut self, params: ComputeParams) -> Result<()> {
        let running = self.running.as_mut().ok_or(Error::NotRunning)?;
        running.params = params;
        self.reload()
    }

    /// Tell the compute unit about a new canvas size. The render unit finds out from the
    /// next frame it receives.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let running = self.running.as_mut().ok_or(Error::NotRunning)?;
        running.params.width = width;
        running.params.height = height;
        debug!(width, height, "resize");
        running.compute()?.send(ComputeCommand::Resize(Size::new(width, height)))
    }

    /// Translate raw host input and forward the resulting events.
    pub fn input(&mut self, raw: RawInput) -> Result<()> {
        let running = self.running.as_mut().ok_or(Error::NotRunning)?;
        let events = running.translator.translate(raw);
        let compute = running.compute()?;
        for event in events {
            trace!(kind = %event.kind(), "input");
            compute.send(ComputeCommand::Input(event))?;
        }
        Ok(())
    }

    /// Forward an already-translated event (scripted runs).
    pub fn send_event(&self, event: InputEvent) -> Result<()> {
        let running = self.running.as_ref().ok_or(Error::NotRunning)?;
        running.compute()?.send(ComputeCommand::Input(event))
    }

    /// Apply a decoded command the way the host would have issued it.
    pub fn apply(&mut self, cmd: ComputeCommand) -> Result<()> {
        match cmd {
            ComputeCommand::Init(params) => self.reload_with(params),
            ComputeCommand::Resize(size) => self.resize(size.width, size.height),
            ComputeCommand::Input(event) => self.send_event(event),
        }
    }

    /// `running → idle`. Both units are terminated and joined.
    pub fn stop(&mut self) -> Result<()> {
        let running = self.running.take().ok_or(Error::NotRunning)?;
        running.shutdown();
        info!("orchestrator stopped");
        Ok(())
    }

    /// Messages the compute units sent with `log`, oldest first.
    pub fn logs(&self) -> flume::Receiver<String> {
        self.log_rx.clone()
    }

    pub fn compute_state(&self) -> Option<UnitState> {
        self.running.as_ref().map(|r| *r.shared.compute_state.lock())
    }

    pub fn generation(&self) -> Option<u64> {
        self.running.as_ref().map(|r| r.shared.generation.load(Ordering::Acquire))
    }

    pub fn params(&self) -> Option<&ComputeParams> {
        self.running.as_ref().map(|r| &r.params)
    }

    pub fn render_stats(&self) -> Option<Arc<RenderStats>> {
        self.running.as_ref().map(|r| Arc::clone(r.render.stats()))
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.shutdown();
        }
    }
}

fn relay(
    rx: flume::Receiver<Outbound>,
    mailbox: Arc<Mailbox>,
    shared: Arc<Shared>,
    log_tx: flume::Sender<String>,
) {
    for Outbound { generation, event } in rx.iter() {
        if !shared.is_current(generation) {
            trace!(generation, "dropping message from replaced compute unit");
            continue;
        }
        match event {
            ComputeEvent::Frame(frame) => match mailbox.push_frame(generation, frame) {
                Ok(Delivery::Queued) => {}
                Ok(Delivery::Stale) => trace!(generation, "frame went stale in the mailbox"),
                Err(e) => {
                    warn!("{e}");
                    break;
                }
            },
            ComputeEvent::Log(message) => {
                info!(generation, "compute: {message}");
                // tap full means nobody is reading
                let _ = log_tx.try_send(message);
            }
            ComputeEvent::State(state) => {
                if !shared.report_state(generation, state) {
                    trace!(generation, ?state, "state report from replaced compute unit");
                }
            }
        }
    }
    debug!("relay exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameMessage;
    use crate::surface::{DrawingSurface, NullPresenter, Presenter};
    use crate::types::Rect;
    use image::RgbaImage;
    use std::time::{Duration, Instant};

    const MARKER: [u8; 4] = [255, 0, 255, 255];

    /// Records pixel (0,0) of every snapshot, then blocks until the gate sender is dropped.
    struct GatedPresenter {
        gate: flume::Receiver<()>,
        seen: Arc<Mutex<Vec<[u8; 4]>>>,
    }

    impl Presenter for GatedPresenter {
        fn present(&mut self, snapshot: RgbaImage) {
            self.seen.lock().push(snapshot.get_pixel(0, 0).0);
            let _ = self.gate.recv();
        }
    }

    fn marker_frame(generation: u64) -> Outbound {
        let frame = FrameMessage::Part { pixels: MARKER.to_vec().into(), rect: Rect::new(0, 0, 1, 1) };
        Outbound { generation, event: ComputeEvent::Frame(frame) }
    }

    fn slot(w: u32, h: u32) -> SurfaceSlot {
        SurfaceSlot::new(DrawingSurface::new(Size::new(w, h), Box::new(NullPresenter)))
    }

    #[test]
    fn start_twice_is_refused() {
        let mut orch = Orchestrator::new(4);
        let mut first = slot(8, 8);
        orch.start(ComputeParams::new("builtin:noise", 8, 8), &mut first).unwrap();
        let mut second = slot(8, 8);
        assert!(matches!(
            orch.start(ComputeParams::new("builtin:noise", 8, 8), &mut second),
            Err(Error::AlreadyRunning)
        ));
        // the refused start never took the surface
        assert!(!second.is_transferred());
        orch.stop().unwrap();
        assert!(!orch.is_running());
    }

    #[test]
    fn lifecycle_calls_need_a_running_orchestrator() {
        let mut orch = Orchestrator::new(4);
        assert!(matches!(orch.reload(), Err(Error::NotRunning)));
        assert!(matches!(orch.resize(1, 1), Err(Error::NotRunning)));
        assert!(matches!(orch.stop(), Err(Error::NotRunning)));
        assert_eq!(orch.compute_state(), None);
    }

    #[test]
    fn restart_needs_a_fresh_surface() {
        let mut orch = Orchestrator::new(4);
        let mut s = slot(4, 4);
        let params = ComputeParams::new("builtin:snake", 4, 4);
        orch.start(params.clone(), &mut s).unwrap();
        orch.stop().unwrap();
        assert!(matches!(orch.start(params, &mut s), Err(Error::SurfaceAlreadyTransferred)));
    }

    #[test]
    fn frames_in_flight_from_the_old_unit_never_reach_render() {
        let (gate_tx, gate_rx) = flume::unbounded::<()>();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let presenter = GatedPresenter { gate: gate_rx, seen: Arc::clone(&seen) };
        let mut slot = SurfaceSlot::new(DrawingSurface::new(Size::new(4, 4), Box::new(presenter)));

        let mut orch = Orchestrator::new(1);
        // generation 1 fails to load, so the only frames it "sends" are the ones below
        orch.start(ComputeParams::new("builtin:missing", 4, 4), &mut slot).unwrap();
        assert_eq!(orch.generation(), Some(1));
        let outbound = orch.running.as_ref().unwrap().outbound.clone();

        // #1 is painted and parks the render unit in present, #2 fills the mailbox,
        // #3 is held by the relay, #4 waits in the outbound channel
        let sender = thread::spawn(move || {
            for _ in 0..4 {
                outbound.send(marker_frame(1)).unwrap();
            }
        });
        sender.join().unwrap();

        orch.reload_with(ComputeParams::new("builtin:noise", 4, 4)).unwrap();
        assert_eq!(orch.generation(), Some(2));
        drop(gate_tx);

        let deadline = Instant::now() + Duration::from_secs(5);
        while seen.lock().len() < 3 {
            assert!(Instant::now() < deadline, "timed out waiting for generation 2 frames");
            thread::sleep(Duration::from_millis(5));
        }
        let seen = seen.lock().clone();
        assert_eq!(seen[0], MARKER);
        assert!(seen[1..].iter().all(|px| *px != MARKER), "{seen:?}");
        orch.stop().unwrap();
    }

    #[test]
    fn late_state_report_from_replaced_unit_is_ignored() {
        let shared = Shared {
            generation: AtomicU64::new(0),
            compute_state: Mutex::new(UnitState::Uninitialized),
        };
        let first = shared.next_generation(UnitState::Uninitialized);
        assert!(shared.report_state(first, UnitState::Loading));

        let second = shared.next_generation(UnitState::Uninitialized);
        assert!(!shared.report_state(first, UnitState::Terminated));
        assert_eq!(*shared.compute_state.lock(), UnitState::Uninitialized);

        assert!(shared.report_state(second, UnitState::Loading));
        assert_eq!(*shared.compute_state.lock(), UnitState::Loading);
    }
}
