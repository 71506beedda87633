//! # Output Buffers
//!
//! A request-local stack of output buffer frames in front of the client
//! stream. Controllers write into the top frame; nothing reaches the client
//! until a frame is flushed down to depth 0. That is what lets the dispatcher
//! throw away a half-rendered page and serve an error page instead.
//!
//! Frames are only ever closed from the top. Each frame carries capability
//! flags; a frame that cannot be removed (or flushed, or cleaned, depending on
//! the operation) stops [`OutputBuffers::close_buffers`] early, so the depth it
//! returns may be greater than the target.
//!
//! ```rust
//! use std::io::Write;
//! use mvc_dispatch::buffer::OutputBuffers;
//!
//! let mut out = OutputBuffers::new();
//! out.start();
//! write!(out, "draft").unwrap();
//! out.close_buffers(0, false);
//! assert!(out.client_bytes().is_empty());
//! assert!(!out.headers_sent());
//! ```

use std::io;

use bitflags::bitflags;
use tracing::{debug, trace};

bitflags! {
    /// Capability flags of one buffer frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferFlags: u8 {
        /// The frame may be closed.
        const REMOVABLE = 0b001;
        /// The frame's content may be passed down.
        const FLUSHABLE = 0b010;
        /// The frame's content may be discarded.
        const CLEANABLE = 0b100;
        /// Flags of a frame opened with [`OutputBuffers::start`].
        const STDFLAGS = Self::REMOVABLE.bits() | Self::FLUSHABLE.bits() | Self::CLEANABLE.bits();
    }
}

#[derive(Debug)]
struct Frame {
    data: Vec<u8>,
    flags: BufferFlags,
}

/// Stack of buffer frames plus the bytes already sent to the client.
#[derive(Debug, Default)]
pub struct OutputBuffers {
    frames: Vec<Frame>,
    client: Vec<u8>,
    headers_sent: bool,
}

impl OutputBuffers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a frame with all capabilities.
    pub fn start(&mut self) {
        self.start_with(BufferFlags::STDFLAGS);
    }

    /// Open a frame with custom capabilities.
    pub fn start_with(&mut self, flags: BufferFlags) {
        self.frames.push(Frame {
            data: Vec::new(),
            flags,
        });
        trace!(level = self.frames.len(), ?flags, "Output buffer opened");
    }

    /// Current nesting depth (0 = unbuffered).
    #[must_use]
    pub fn level(&self) -> usize {
        self.frames.len()
    }

    /// Content of the top frame, if any.
    #[must_use]
    pub fn contents(&self) -> Option<&[u8]> {
        self.frames.last().map(|f| f.data.as_slice())
    }

    /// Append bytes to the top frame, or to the client when unbuffered.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        match self.frames.last_mut() {
            Some(frame) => frame.data.extend_from_slice(bytes),
            None => self.send(bytes),
        }
    }

    /// Close frames from the top while the depth exceeds `target` and the top
    /// frame allows it, flushing or discarding their content.
    ///
    /// Returns the resulting depth, which can be greater than `target` when a
    /// frame lacking the needed capability was met.
    pub fn close_buffers(&mut self, target: usize, flush: bool) -> usize {
        let required = BufferFlags::REMOVABLE
            | if flush {
                BufferFlags::FLUSHABLE
            } else {
                BufferFlags::CLEANABLE
            };

        while self.frames.len() > target {
            let Some(top) = self.frames.last() else {
                break;
            };
            if !top.flags.contains(required) {
                debug!(
                    level = self.frames.len(),
                    target,
                    flush,
                    flags = ?top.flags,
                    "Output buffer cannot be closed, stopping"
                );
                break;
            }
            let Some(frame) = self.frames.pop() else {
                break;
            };
            if flush {
                self.write_bytes(&frame.data);
            }
        }
        self.frames.len()
    }

    /// Whether any byte (and therefore the response head) left the process.
    #[must_use]
    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    /// Bytes delivered to the client so far.
    #[must_use]
    pub fn client_bytes(&self) -> &[u8] {
        &self.client
    }

    /// Consume the stack and return the client stream.
    #[must_use]
    pub fn into_client_bytes(self) -> Vec<u8> {
        self.client
    }

    fn send(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.headers_sent = true;
        self.client.extend_from_slice(bytes);
    }
}

impl io::Write for OutputBuffers {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
