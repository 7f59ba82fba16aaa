//! Bounded, coalescing queue between the relay and the render unit.
//!
//! Policy:
//! * `frame` and `pixels` repaint the whole surface, so pushing one drops every pending frame.
//! * `framePart` is never dropped by coalescing. When the mailbox already holds `capacity`
//!   frames, pushing a partial blocks until the render unit drains one (backpressure), the
//!   mailbox is closed, or the entry becomes stale.
//! * Frames stamped with a generation older than the last [`Mailbox::purge_before`] are dropped.
//! * Control messages (`init`) are never coalesced and do not count toward capacity.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};
use crate::protocol::{FrameMessage, RenderCommand};
use crate::surface::DrawingSurface;

#[derive(Debug, Default)]
struct Inner {
    queue: VecDeque<RenderCommand>,
    frames: usize,
    min_generation: u64,
    coalesced: u64,
    closed: bool,
}

/// What happened to a pushed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Came from a terminated compute unit.
    Stale,
}

#[derive(Debug)]
pub struct Mailbox {
    inner: Mutex<Inner>,
    ready: Condvar,
    space: Condvar,
    capacity: usize,
}

impl Mailbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ready: Condvar::new(),
            space: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push_init(&self, surface: DrawingSurface) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Error::UnitDisconnected("render"));
        }
        inner.queue.push_back(RenderCommand::Init(surface));
        self.ready.notify_one();
        Ok(())
    }

    pub fn push_frame(&self, generation: u64, frame: FrameMessage) -> Result<Delivery> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Error::UnitDisconnected("render"));
        }
        if generation < inner.min_generation {
            return Ok(Delivery::Stale);
        }

        if frame.supersedes_pending() {
            let before = inner.queue.len();
            inner.queue.retain(|cmd| matches!(cmd, RenderCommand::Init(_)));
            let dropped = before - inner.queue.len();
            inner.frames -= dropped;
            inner.coalesced += dropped as u64;
            if dropped > 0 {
                self.space.notify_all();
            }
        } else {
            while inner.frames >= self.capacity && !inner.closed && generation >= inner.min_generation {
                self.space.wait(&mut inner);
            }
        }

        if inner.closed {
            return Err(Error::UnitDisconnected("render"));
        }
        if generation < inner.min_generation {
            return Ok(Delivery::Stale);
        }

        inner.queue.push_back(RenderCommand::Frame { generation, frame });
        inner.frames += 1;
        self.ready.notify_one();
        Ok(Delivery::Queued)
    }

    /// Drop queued frames from generations before `generation` and refuse any that arrive later.
    pub fn purge_before(&self, generation: u64) -> usize {
        let mut inner = self.inner.lock();
        inner.min_generation = inner.min_generation.max(generation);
        let min = inner.min_generation;
        let before = inner.queue.len();
        inner
            .queue
            .retain(|cmd| !matches!(cmd, RenderCommand::Frame { generation, .. } if *generation < min));
        let dropped = before - inner.queue.len();
        inner.frames -= dropped;
        self.space.notify_all();
        dropped
    }

    /// Block until a command is available. `None` once the mailbox is closed.
    pub fn recv(&self) -> Option<RenderCommand> {
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return None;
            }
            if let Some(cmd) = Self::pop(&mut inner) {
                self.space.notify_one();
                return Some(cmd);
            }
            self.ready.wait(&mut inner);
        }
    }

    pub fn try_recv(&self) -> Option<RenderCommand> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return None;
        }
        let cmd = Self::pop(&mut inner);
        if cmd.is_some() {
            self.space.notify_one();
        }
        cmd
    }

    fn pop(inner: &mut Inner) -> Option<RenderCommand> {
        let cmd = inner.queue.pop_front()?;
        if matches!(cmd, RenderCommand::Frame { .. }) {
            inner.frames -= 1;
        }
        Some(cmd)
    }

    /// Wake everyone and discard what is left. Further pushes fail.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.queue.clear();
        inner.frames = 0;
        self.ready.notify_all();
        self.space.notify_all();
    }

    /// Pending frame messages.
    pub fn len(&self) -> usize {
        self.inner.lock().frames
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames dropped because a newer full frame replaced them.
    pub fn coalesced(&self) -> u64 {
        self.inner.lock().coalesced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Rect, Size};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn full(tag: u8) -> FrameMessage {
        FrameMessage::Full { pixels: vec![tag; 4].into(), size: Size::new(1, 1) }
    }

    fn part(tag: u8) -> FrameMessage {
        FrameMessage::Part { pixels: vec![tag; 4].into(), rect: Rect::new(0, 0, 1, 1) }
    }

    fn tag_of(cmd: RenderCommand) -> u8 {
        match cmd {
            RenderCommand::Frame { frame: FrameMessage::Full { pixels, .. }, .. }
            | RenderCommand::Frame { frame: FrameMessage::Part { pixels, .. }, .. } => pixels.as_slice()[0],
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn full_frame_replaces_pending_frames() {
        let mb = Mailbox::new(4);
        mb.push_frame(0, part(1)).unwrap();
        mb.push_frame(0, full(2)).unwrap();
        mb.push_frame(0, full(3)).unwrap();
        assert_eq!(mb.len(), 1);
        assert_eq!(mb.coalesced(), 2);
        assert_eq!(tag_of(mb.try_recv().unwrap()), 3);
    }

    #[test]
    fn partial_frames_keep_order_and_are_not_coalesced() {
        let mb = Mailbox::new(4);
        for t in 1..=3 {
            mb.push_frame(0, part(t)).unwrap();
        }
        let got: Vec<u8> = (0..3).map(|_| tag_of(mb.try_recv().unwrap())).collect();
        assert_eq!(got, vec![1, 2, 3]);
    }

    #[test]
    fn partial_push_blocks_when_full_until_drained() {
        let mb = Arc::new(Mailbox::new(1));
        mb.push_frame(0, part(1)).unwrap();

        let producer = {
            let mb = Arc::clone(&mb);
            thread::spawn(move || mb.push_frame(0, part(2)).unwrap())
        };
        thread::sleep(Duration::from_millis(50));
        assert_eq!(mb.len(), 1, "second partial must wait for space");

        assert_eq!(tag_of(mb.recv().unwrap()), 1);
        assert_eq!(producer.join().unwrap(), Delivery::Queued);
        assert_eq!(tag_of(mb.recv().unwrap()), 2);
    }

    #[test]
    fn purge_drops_old_generations_and_rejects_late_arrivals() {
        let mb = Mailbox::new(4);
        mb.push_frame(1, part(1)).unwrap();
        mb.push_frame(2, part(2)).unwrap();
        assert_eq!(mb.purge_before(2), 1);
        assert_eq!(mb.push_frame(1, full(9)).unwrap(), Delivery::Stale);
        assert_eq!(tag_of(mb.try_recv().unwrap()), 2);
        assert!(mb.try_recv().is_none());
    }

    #[test]
    fn close_wakes_blocked_receiver() {
        let mb = Arc::new(Mailbox::new(2));
        let consumer = {
            let mb = Arc::clone(&mb);
            thread::spawn(move || mb.recv().is_none())
        };
        thread::sleep(Duration::from_millis(20));
        mb.close();
        assert!(consumer.join().unwrap());
        assert!(mb.push_frame(0, full(1)).is_err());
    }
}
