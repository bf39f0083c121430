//! Opaque byte message carried by every channel.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Immutable byte payload delivered to and published from channels.
///
/// Cloning is cheap: the bytes are shared, so the same payload can be handed to
/// the destination channel without copying.
#[derive(Clone, Eq, PartialEq)]
pub struct BytesMessage {
    bytes: Arc<[u8]>,
}

impl BytesMessage {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Arc::from(bytes.into()),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for BytesMessage {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for BytesMessage {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

impl From<&str> for BytesMessage {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes().to_vec())
    }
}

impl Debug for BytesMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BytesMessage")
            .field("len", &self.bytes.len())
            .finish()
    }
}
