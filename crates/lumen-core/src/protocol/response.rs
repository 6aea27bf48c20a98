//! Response completion over the unframed inbound stream.
//!
//! The device writes replies as raw bytes with no header, so the only way to
//! know when a reply is complete is the expected layout of the operation in
//! flight. A serial read may deliver less than one reply or split it at any
//! byte boundary, so completion is modelled as an explicit state machine
//! rather than ad hoc length comparisons:
//!
//! ```text
//! CountPrefixed:  AwaitingCount ──(2 bytes)──► AwaitingBody ──► Complete
//! Fixed(n):                       AwaitingBody { required: n } ──► Complete
//! Text:           AwaitingTerminator ──(double line-break)──► Complete
//! ```
//!
//! [`ResponseAssembler::push`] is safe to call with every partial delivery;
//! it yields the completed response exactly once and ignores anything pushed
//! after completion.

use tracing::trace;

/// Expected layout of one reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Exactly `n` bytes.
    Fixed(usize),
    /// A 2-byte little-endian element count followed by `count` elements of
    /// `element_size` bytes each.
    CountPrefixed { element_size: usize },
    /// A text record terminated by a double line-break (`\n\n` or
    /// `\r\n\r\n`).
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for the 2-byte count field of a count-prefixed reply.
    AwaitingCount,
    /// Waiting for the body to reach the required total length.
    AwaitingBody { required: usize },
    /// Waiting for the text terminator.
    AwaitingTerminator,
    /// The reply has been yielded; further input is ignored.
    Complete,
}

/// Accumulates inbound bytes until one reply of a known shape is complete.
#[derive(Debug)]
pub struct ResponseAssembler {
    shape: ResponseShape,
    state: State,
    buf: Vec<u8>,
}

impl ResponseAssembler {
    /// Creates an assembler for one reply of the given shape.
    pub fn new(shape: ResponseShape) -> Self {
        let state = match shape {
            ResponseShape::Fixed(required) => State::AwaitingBody { required },
            ResponseShape::CountPrefixed { .. } => State::AwaitingCount,
            ResponseShape::Text => State::AwaitingTerminator,
        };
        Self {
            shape,
            state,
            buf: Vec::new(),
        }
    }

    /// The shape this assembler was armed with.
    pub fn shape(&self) -> ResponseShape {
        self.shape
    }

    /// Whether the reply has already been yielded.
    pub fn is_complete(&self) -> bool {
        self.state == State::Complete
    }

    /// Bytes accumulated so far (zero again after completion).
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Appends one inbound chunk and returns the completed reply, if this
    /// chunk finished it.
    ///
    /// Returns `Some` exactly once per assembler. Bytes arriving after
    /// completion are ignored; bytes beyond the required length in the
    /// completing chunk are discarded with a trace log.
    pub fn push(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        if self.state == State::Complete {
            trace!(len = chunk.len(), "dropping bytes after completed response");
            return None;
        }
        self.buf.extend_from_slice(chunk);

        if let (State::AwaitingCount, ResponseShape::CountPrefixed { element_size }) =
            (self.state, self.shape)
        {
            if self.buf.len() < 2 {
                return None;
            }
            let count = u16::from_le_bytes([self.buf[0], self.buf[1]]) as usize;
            self.state = State::AwaitingBody {
                required: 2 + count * element_size,
            };
        }

        match self.state {
            State::AwaitingCount | State::Complete => None,
            State::AwaitingBody { required } => {
                if self.buf.len() < required {
                    return None;
                }
                self.state = State::Complete;
                let mut response = std::mem::take(&mut self.buf);
                if response.len() > required {
                    trace!(
                        excess = response.len() - required,
                        "discarding bytes beyond the expected response length"
                    );
                    response.truncate(required);
                }
                Some(response)
            }
            State::AwaitingTerminator => {
                if !ends_with_double_break(&self.buf) {
                    return None;
                }
                self.state = State::Complete;
                Some(std::mem::take(&mut self.buf))
            }
        }
    }
}

fn ends_with_double_break(buf: &[u8]) -> bool {
    buf.ends_with(b"\n\n") || buf.ends_with(b"\r\n\r\n")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
