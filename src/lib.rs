//! Streams raster frames from an isolated compute thread to an isolated render thread,
//! and routes translated user input the other way.
//!
//! Three execution units, no shared memory besides explicitly handed-over buffers:
//! * the [`Orchestrator`] owns lifecycle (start / resize / reload / stop), translates input
//!   and relays frames;
//! * a compute unit ([`compute`]) hosts one compute module and emits frames;
//! * the render unit ([`render`]) owns the [`DrawingSurface`] and paints.

pub mod buffer;
pub mod codec;
pub mod compute;
pub mod config;
pub mod error;
pub mod input;
pub mod mailbox;
pub mod orchestrator;
pub mod protocol;
pub mod render;
pub mod surface;
pub mod types;
pub mod window;

pub use config::RelayConfig;
pub use error::{Error, Result};
pub use input::{InputTranslator, RawInput};
pub use orchestrator::Orchestrator;
pub use protocol::{ComputeCommand, FrameMessage, InputEvent, MessageKind, SwipeDirection, UnitState};
pub use surface::{DrawingSurface, SurfaceSlot};
pub use types::{ComputeParams, FrameBuffer, Point, Rect, Size};
