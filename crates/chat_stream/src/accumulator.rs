//! Error byte accumulator
//!
//! Buffers raw bytes across reads until a complete structured error payload
//! is available for a single unmarshal attempt. An empty buffer means "no
//! error detected yet", distinct from an empty error payload.

#[derive(Debug, Default)]
pub struct ErrorAccumulator {
    buf: Vec<u8>,
}

impl ErrorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
