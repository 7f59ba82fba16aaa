// Every failure the relay can report. Each variant says *where* things went wrong;
// none of them is allowed to take down a sibling thread.
use crate::protocol::UnitState;
use crate::types::ComputeParams;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Module reference invalid or instantiation failed. The unit stays inert until reload.
    #[error("module load failed for {params}: {reason}")]
    ModuleLoadFailed { params: ComputeParams, reason: String },

    /// Pixel buffer length does not match `width * height * 4`.
    #[error("malformed frame: expected {expected} bytes, got {actual}")]
    MalformedFrame { expected: usize, actual: usize },

    /// The drawing surface can only be handed to one render unit, once.
    #[error("drawing surface already transferred")]
    SurfaceAlreadyTransferred,

    /// Unrecognized message tag. Callers ignore it.
    #[error("unknown message kind `{0}`")]
    UnknownMessageKind(String),

    #[error("orchestrator already running")]
    AlreadyRunning,

    #[error("orchestrator is not running")]
    NotRunning,

    #[error("invalid unit transition {from:?} -> {to:?}")]
    InvalidTransition { from: UnitState, to: UnitState },

    /// The other end of a channel went away (unit terminated or thread gone).
    #[error("{0} unit disconnected")]
    UnitDisconnected(&'static str),

    #[error("window init error: {0}")]
    WindowInit(String),

    #[error("window update error: {0}")]
    WindowUpdate(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
