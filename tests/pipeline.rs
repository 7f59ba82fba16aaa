// End-to-end: orchestrator, compute unit, relay and render unit on real threads.
// No window: snapshots land in a SnapshotPresenter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use canvas_relay::mailbox::{Delivery, Mailbox};
use canvas_relay::protocol::RenderCommand;
use canvas_relay::surface::{LatestSnapshot, NullPresenter, SnapshotPresenter};
use canvas_relay::{
    ComputeParams, DrawingSurface, Error, FrameBuffer, FrameMessage, Orchestrator, Rect, Size,
    SurfaceSlot, UnitState,
};
use proptest::prelude::*;

fn wait_until(cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        if Instant::now() > deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    true
}

fn start(module: &str, size: Size) -> (Orchestrator, LatestSnapshot) {
    let (presenter, latest) = SnapshotPresenter::new();
    let mut slot = SurfaceSlot::new(DrawingSurface::new(size, Box::new(presenter)));
    let mut orch = Orchestrator::new(4);
    orch.start(ComputeParams::new(module, size.width, size.height), &mut slot).unwrap();
    (orch, latest)
}

fn full(tag: u8) -> FrameMessage {
    FrameMessage::Full { pixels: vec![tag; 4].into(), size: Size::new(1, 1) }
}

#[test]
fn queued_frame_from_replaced_unit_never_reaches_render() {
    let mailbox = Mailbox::new(4);
    assert_eq!(mailbox.push_frame(1, full(1)).unwrap(), Delivery::Queued);

    // reload to generation 2
    assert_eq!(mailbox.purge_before(2), 1);
    assert!(mailbox.try_recv().is_none());
    // late arrival from the old unit
    assert_eq!(mailbox.push_frame(1, full(1)).unwrap(), Delivery::Stale);

    assert_eq!(mailbox.push_frame(2, full(2)).unwrap(), Delivery::Queued);
    match mailbox.try_recv() {
        Some(RenderCommand::Frame { generation, .. }) => assert_eq!(generation, 2),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn frames_flow_from_compute_to_surface() {
    let (mut orch, latest) = start("builtin:noise", Size::new(16, 8));
    assert!(wait_until(|| latest.presented() >= 2));
    let shot = latest.latest().unwrap();
    assert_eq!((shot.width(), shot.height()), (16, 8));
    assert_eq!(orch.compute_state(), Some(UnitState::Ready));
    orch.stop().unwrap();
}

#[test]
fn reload_keeps_the_render_unit_and_surface() {
    let (mut orch, latest) = start("builtin:game_of_life", Size::new(20, 20));
    assert!(wait_until(|| latest.presented() >= 1));
    let stats = orch.render_stats().unwrap();

    orch.reload().unwrap();
    assert_eq!(orch.generation(), Some(2));
    let before = latest.presented();
    assert!(wait_until(|| latest.presented() > before));
    assert!(wait_until(|| orch.compute_state() == Some(UnitState::Ready)));

    // same render unit: its counters kept counting across the reload
    let same = orch.render_stats().unwrap();
    assert!(Arc::ptr_eq(&stats, &same));
    assert_eq!(stats.rejected(), 0);
    orch.stop().unwrap();
}

#[test]
fn failed_module_load_is_logged_and_inert_until_reload() {
    let (presenter, latest) = SnapshotPresenter::new();
    let mut slot = SurfaceSlot::new(DrawingSurface::new(Size::new(10, 10), Box::new(presenter)));
    let mut orch = Orchestrator::new(4);
    let logs = orch.logs();
    orch.start(ComputeParams::new("builtin:tetris", 10, 10), &mut slot).unwrap();

    let line = logs.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(line.contains("module load failed"), "{line}");
    assert!(line.contains("builtin:tetris"), "{line}");
    assert!(wait_until(|| orch.compute_state() == Some(UnitState::Terminated)));

    // inert: input is accepted and ignored, nothing gets painted
    orch.resize(12, 12).unwrap();
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(latest.presented(), 0);

    orch.reload_with(ComputeParams::new("builtin:snake", 100, 60)).unwrap();
    assert!(wait_until(|| latest.presented() >= 1));
    assert_eq!(orch.compute_state(), Some(UnitState::Ready));
    orch.stop().unwrap();
}

#[test]
fn resize_reaches_the_surface_through_the_next_frame() {
    let (mut orch, latest) = start("builtin:snake", Size::new(100, 60));
    assert!(wait_until(|| latest.presented() >= 1));

    orch.resize(200, 120).unwrap();
    assert!(wait_until(|| {
        latest.latest().is_some_and(|img| (img.width(), img.height()) == (200, 120))
    }));
    orch.stop().unwrap();
}

#[test]
fn surface_is_handed_over_exactly_once() {
    let mut slot = SurfaceSlot::new(DrawingSurface::new(Size::new(4, 4), Box::new(NullPresenter)));
    let mut orch = Orchestrator::new(2);
    orch.start(ComputeParams::new("builtin:noise", 4, 4), &mut slot).unwrap();
    assert!(slot.is_transferred());
    assert!(matches!(slot.transfer(), Err(Error::SurfaceAlreadyTransferred)));
    // the first owner keeps working
    assert!(wait_until(|| orch.render_stats().unwrap().painted() >= 1));
    orch.stop().unwrap();
}

#[test]
fn stop_then_start_again() {
    let (mut orch, _latest) = start("builtin:noise", Size::new(4, 4));
    orch.stop().unwrap();
    assert_eq!(orch.compute_state(), None);

    let (presenter, latest) = SnapshotPresenter::new();
    let mut slot = SurfaceSlot::new(DrawingSurface::new(Size::new(4, 4), Box::new(presenter)));
    orch.start(ComputeParams::new("builtin:noise", 4, 4), &mut slot).unwrap();
    assert!(wait_until(|| latest.presented() >= 1));
}

fn pixel_at(fb: &FrameBuffer, x: u32, y: u32) -> &[u8] {
    let i = ((y * fb.width + x) * 4) as usize;
    &fb.pixels[i..i + 4]
}

fn base_surface(size: Size) -> DrawingSurface {
    let mut surface = DrawingSurface::new(size, Box::new(NullPresenter));
    let base = FrameBuffer::filled(size, [10, 20, 30, 255]);
    surface.paint_full(size, &base.pixels).unwrap();
    surface
}

proptest! {
    #[test]
    fn partial_update_touches_only_its_rectangle(
        x in 0u32..16, y in 0u32..16, w in 1u32..8, h in 1u32..8, fill in any::<u8>()
    ) {
        let size = Size::new(16, 16);
        let w = w.min(size.width - x);
        let h = h.min(size.height - y);
        let mut surface = base_surface(size);
        let before = surface.readback();

        let rect = Rect::new(x, y, w, h);
        let part = FrameBuffer::at(vec![fill; (w * h * 4) as usize], rect);
        surface.paint(&part).unwrap();
        let after = surface.readback();

        for py in 0..size.height {
            for px in 0..size.width {
                let inside = px >= x && px < x + w && py >= y && py < y + h;
                if inside {
                    prop_assert_eq!(pixel_at(&after, px, py), &[fill; 4][..]);
                } else {
                    prop_assert_eq!(pixel_at(&after, px, py), pixel_at(&before, px, py));
                }
            }
        }
        prop_assert_eq!(surface.size(), size);
    }

    #[test]
    fn malformed_buffers_never_mutate_the_surface(
        w in 1u32..12, h in 1u32..12, len in 0usize..600, partial in any::<bool>()
    ) {
        let expected = (w * h * 4) as usize;
        prop_assume!(len != expected);
        let mut surface = base_surface(Size::new(8, 8));
        let before = surface.readback();

        let bytes = vec![0xAB; len];
        let result = if partial {
            surface.paint_part(Rect::new(1, 1, w, h), &bytes)
        } else {
            surface.paint_full(Size::new(w, h), &bytes)
        };
        let is_malformed = matches!(result, Err(Error::MalformedFrame { .. }));
        prop_assert!(is_malformed);
        prop_assert_eq!(surface.readback(), before);
    }
}
