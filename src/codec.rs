//! JSON wire form of orchestrator → compute commands, one object per line.
//!
//! ```text
//! {"type":"init","moduleReference":"builtin:snake","width":400,"height":300}
//! {"type":"resize","width":640,"height":480}
//! {"type":"mouseClick","x":10,"y":12}
//! {"type":"keyDown","key":"ArrowUp"}
//! ```
//!
//! Tags go through [`MessageKind`], so legacy aliases are accepted. An unknown tag comes
//! back as [`Error::UnknownMessageKind`]; callers log it and move on.

use std::io::BufRead;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::protocol::{ComputeCommand, InputEvent, MessageKind};
use crate::types::{ComputeParams, Size};

#[derive(Deserialize)]
struct Tag {
    #[serde(rename = "type")]
    kind: String,
}

pub fn decode_command(line: &str) -> Result<ComputeCommand> {
    let value: Value = serde_json::from_str(line)?;
    let tag = Tag::deserialize(&value)?;
    let kind: MessageKind = tag.kind.parse()?;

    match kind {
        MessageKind::Init => Ok(ComputeCommand::Init(ComputeParams::deserialize(&value)?)),
        MessageKind::Resize => Ok(ComputeCommand::Resize(Size::deserialize(&value)?)),
        k if k.is_input() => Ok(ComputeCommand::Input(InputEvent::deserialize(&value)?)),
        // frames and logs only ever travel the other way
        _ => Err(Error::UnknownMessageKind(tag.kind)),
    }
}

pub fn encode_command(cmd: &ComputeCommand) -> Result<String> {
    let value = match cmd {
        ComputeCommand::Init(params) => tagged(MessageKind::Init, serde_json::to_value(params)?),
        ComputeCommand::Resize(size) => tagged(MessageKind::Resize, serde_json::to_value(size)?),
        ComputeCommand::Input(event) => serde_json::to_value(event)?,
    };
    Ok(value.to_string())
}

fn tagged(kind: MessageKind, mut body: Value) -> Value {
    if let Value::Object(map) = &mut body {
        map.insert("type".into(), Value::String(kind.as_str().into()));
    }
    body
}

/// Decode every line of a script. Blank lines and `#` comments are skipped, and so is any
/// line that fails to decode (with a warning).
pub fn read_script(reader: impl BufRead) -> Result<Vec<ComputeCommand>> {
    let mut commands = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match decode_command(line) {
            Ok(cmd) => commands.push(cmd),
            Err(e) => warn!(line = n + 1, "skipping script line: {e}"),
        }
    }
    Ok(commands)
}
