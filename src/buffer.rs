//! Pixel byte containers that make the transfer discipline of a frame message explicit.
//!
//! * [`MovedBuffer`] is exclusively owned and not `Clone`. Putting it in a message moves the
//!   bytes; the producer can no longer read them, which the compiler enforces.
//! * [`SharedBuffer`] is immutable and reference counted. The producer may keep a handle and
//!   keep reading, nobody can write, and the consumer gets the bytes without a copy when it
//!   holds the last handle.

use std::sync::Arc;

#[derive(Debug, PartialEq, Eq)]
pub struct MovedBuffer(Vec<u8>);

impl MovedBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for MovedBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedBuffer(Arc<Vec<u8>>);

impl SharedBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Arc::new(bytes))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Takes the bytes out, copying only if another handle is still alive.
    pub fn into_vec(self) -> Vec<u8> {
        Arc::try_unwrap(self.0).unwrap_or_else(|shared| shared.as_ref().clone())
    }
}

impl From<Vec<u8>> for SharedBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}
