//! Messages exchanged between the orchestrator, the compute unit and the render unit.
//!
//! Every message has a [`MessageKind`] tag. `frame` / `framePart` are the canonical frame
//! shapes, `pixels` is the bitmap-transfer variant. Older tags (`mouseDrag`, `mouseClick`,
//! `mouseDragEnd`, `renderFrame`) are accepted as aliases and normalized on decode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::buffer::{MovedBuffer, SharedBuffer};
use crate::error::{Error, Result};
use crate::surface::DrawingSurface;
use crate::types::{ComputeParams, Rect, Size};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Init,
    Resize,
    PointerDown,
    PointerMove,
    PointerUp,
    Click,
    Swipe,
    KeyDown,
    Frame,
    FramePart,
    Pixels,
    Log,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Init => "init",
            MessageKind::Resize => "resize",
            MessageKind::PointerDown => "pointerDown",
            MessageKind::PointerMove => "pointerMove",
            MessageKind::PointerUp => "pointerUp",
            MessageKind::Click => "click",
            MessageKind::Swipe => "swipe",
            MessageKind::KeyDown => "keyDown",
            MessageKind::Frame => "frame",
            MessageKind::FramePart => "framePart",
            MessageKind::Pixels => "pixels",
            MessageKind::Log => "log",
        }
    }

    /// Kinds that carry raster data and are relayed to the render unit untouched.
    pub fn is_frame(&self) -> bool {
        matches!(self, MessageKind::Frame | MessageKind::FramePart | MessageKind::Pixels)
    }

    pub fn is_input(&self) -> bool {
        matches!(
            self,
            MessageKind::PointerDown
                | MessageKind::PointerMove
                | MessageKind::PointerUp
                | MessageKind::Click
                | MessageKind::Swipe
                | MessageKind::KeyDown
        )
    }
}

impl FromStr for MessageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let kind = match s {
            "init" => MessageKind::Init,
            "resize" => MessageKind::Resize,
            "pointerDown" => MessageKind::PointerDown,
            "pointerMove" | "mouseDrag" => MessageKind::PointerMove,
            "pointerUp" | "dragEnd" | "mouseDragEnd" => MessageKind::PointerUp,
            "click" | "mouseClick" => MessageKind::Click,
            "swipe" => MessageKind::Swipe,
            "keyDown" => MessageKind::KeyDown,
            "frame" => MessageKind::Frame,
            "framePart" | "renderFrame" => MessageKind::FramePart,
            "pixels" => MessageKind::Pixels,
            "log" => MessageKind::Log,
            other => return Err(Error::UnknownMessageKind(other.to_string())),
        };
        Ok(kind)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl SwipeDirection {
    /// Unit step in canvas coordinates (y grows downward).
    pub fn delta(&self) -> (i32, i32) {
        match self {
            SwipeDirection::Up => (0, -1),
            SwipeDirection::Down => (0, 1),
            SwipeDirection::Left => (-1, 0),
            SwipeDirection::Right => (1, 0),
        }
    }
}

/// Translated user input, consumed once by the compute unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InputEvent {
    PointerDown { x: i32, y: i32 },
    #[serde(alias = "mouseDrag")]
    PointerMove { x: i32, y: i32 },
    /// End of a drag: pointer released beyond the click threshold.
    #[serde(alias = "dragEnd", alias = "mouseDragEnd")]
    PointerUp { x: i32, y: i32 },
    #[serde(alias = "mouseClick")]
    Click { x: i32, y: i32 },
    Swipe { direction: SwipeDirection },
    KeyDown { key: String },
}

impl InputEvent {
    pub fn kind(&self) -> MessageKind {
        match self {
            InputEvent::PointerDown { .. } => MessageKind::PointerDown,
            InputEvent::PointerMove { .. } => MessageKind::PointerMove,
            InputEvent::PointerUp { .. } => MessageKind::PointerUp,
            InputEvent::Click { .. } => MessageKind::Click,
            InputEvent::Swipe { .. } => MessageKind::Swipe,
            InputEvent::KeyDown { .. } => MessageKind::KeyDown,
        }
    }
}

/// Raster data on its way to the render unit.
#[derive(Debug, PartialEq, Eq)]
pub enum FrameMessage {
    /// `frame`: whole canvas at (0,0). Buffer moved.
    Full { pixels: MovedBuffer, size: Size },
    /// `framePart`: dirty rectangle only. Buffer moved.
    Part { pixels: MovedBuffer, rect: Rect },
    /// `pixels`: whole canvas, presented through an immutable bitmap. Buffer shared.
    Bitmap { pixels: SharedBuffer, size: Size },
}

impl FrameMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            FrameMessage::Full { .. } => MessageKind::Frame,
            FrameMessage::Part { .. } => MessageKind::FramePart,
            FrameMessage::Bitmap { .. } => MessageKind::Pixels,
        }
    }

    /// Full and bitmap frames repaint everything, so older pending frames are worthless.
    pub fn supersedes_pending(&self) -> bool {
        !matches!(self, FrameMessage::Part { .. })
    }

    pub fn rect(&self) -> Rect {
        match self {
            FrameMessage::Full { size, .. } | FrameMessage::Bitmap { size, .. } => {
                Rect::new(0, 0, size.width, size.height)
            }
            FrameMessage::Part { rect, .. } => *rect,
        }
    }
}

/// Orchestrator → compute unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputeCommand {
    Init(ComputeParams),
    Resize(Size),
    Input(InputEvent),
}

impl ComputeCommand {
    pub fn kind(&self) -> MessageKind {
        match self {
            ComputeCommand::Init(_) => MessageKind::Init,
            ComputeCommand::Resize(_) => MessageKind::Resize,
            ComputeCommand::Input(event) => event.kind(),
        }
    }
}

/// Compute unit → orchestrator.
#[derive(Debug)]
pub enum ComputeEvent {
    Frame(FrameMessage),
    Log(String),
    State(UnitState),
}

/// A compute event stamped with the generation of the unit that produced it.
/// The orchestrator drops anything from a generation it has already replaced.
#[derive(Debug)]
pub struct Outbound {
    pub generation: u64,
    pub event: ComputeEvent,
}

/// Orchestrator → render unit.
#[derive(Debug)]
pub enum RenderCommand {
    Init(DrawingSurface),
    Frame { generation: u64, frame: FrameMessage },
}

/// Lifecycle of one compute unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitState {
    Uninitialized,
    Loading,
    Ready,
    Terminated,
}

impl UnitState {
    /// Applies a transition, rejecting edges the protocol does not have.
    pub fn advance(self, to: UnitState) -> Result<UnitState> {
        use UnitState::*;
        match (self, to) {
            (Uninitialized, Loading)
            | (Loading, Ready)
            | (Loading, Terminated)
            | (Ready, Terminated)
            | (Uninitialized, Terminated) => Ok(to),
            (from, to) => Err(Error::InvalidTransition { from, to }),
        }
    }

    pub fn accepts_commands(&self) -> bool {
        matches!(self, UnitState::Ready)
    }
}
