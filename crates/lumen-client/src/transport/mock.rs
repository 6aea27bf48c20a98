//! Scripted endpoint opener for unit and integration testing.
//!
//! The real [`SerialOpener`](super::SerialOpener) needs a physical device
//! node and actually claims the port, so tests use `MockOpener` instead: it
//! records every open attempt and plays back a scripted outcome per attempt
//! (fail, hang forever, or succeed with an in-memory duplex stream). The far
//! end of each successful open is kept so a test can play the device's role
//! on the wire.

use std::collections::VecDeque;
use std::io;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::io::{duplex, DuplexStream};

use super::EndpointOpener;

/// Outcome of one scripted open attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// Open succeeds with a fresh duplex stream.
    Succeed,
    /// Open fails immediately with `ConnectionRefused`.
    Fail,
    /// Open never completes (exercises the connect timeout path).
    Hang,
}

/// A recording, scripted [`EndpointOpener`].
pub struct MockOpener {
    /// Per-attempt outcomes, consumed front to back.
    script: Mutex<VecDeque<OpenOutcome>>,
    /// Outcome applied once the script is exhausted.
    default_outcome: OpenOutcome,
    /// Every path passed to `open`, in order.
    pub attempts: Mutex<Vec<String>>,
    /// Far ends of successful opens, in order.
    pub peers: Mutex<Vec<DuplexStream>>,
}

impl MockOpener {
    fn with_default(default_outcome: OpenOutcome) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_outcome,
            attempts: Mutex::new(Vec::new()),
            peers: Mutex::new(Vec::new()),
        }
    }

    /// Every attempt succeeds.
    pub fn succeeding() -> Self {
        Self::with_default(OpenOutcome::Succeed)
    }

    /// Every attempt fails.
    pub fn always_failing() -> Self {
        Self::with_default(OpenOutcome::Fail)
    }

    /// Every attempt hangs until dropped.
    pub fn hanging() -> Self {
        Self::with_default(OpenOutcome::Hang)
    }

    /// The first `failures` attempts fail, then attempts succeed.
    pub fn failing(failures: usize) -> Self {
        let opener = Self::with_default(OpenOutcome::Succeed);
        {
            let mut script = lock(&opener.script);
            script.extend(std::iter::repeat(OpenOutcome::Fail).take(failures));
        }
        opener
    }

    /// Number of open attempts made so far.
    pub fn attempt_count(&self) -> usize {
        lock(&self.attempts).len()
    }

    /// Takes the far end of the most recent successful open.
    pub fn take_peer(&self) -> Option<DuplexStream> {
        lock(&self.peers).pop()
    }
}

#[async_trait]
impl EndpointOpener for MockOpener {
    type Stream = DuplexStream;

    async fn open(&self, path: &str) -> io::Result<Self::Stream> {
        lock(&self.attempts).push(path.to_string());
        let outcome = lock(&self.script)
            .pop_front()
            .unwrap_or(self.default_outcome);

        match outcome {
            OpenOutcome::Fail => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "scripted open failure",
            )),
            OpenOutcome::Hang => std::future::pending().await,
            OpenOutcome::Succeed => {
                let (near, far) = duplex(4096);
                lock(&self.peers).push(far);
                Ok(near)
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failing_script_runs_out_then_succeeds() {
        let opener = MockOpener::failing(2);

        assert!(opener.open("mock0").await.is_err());
        assert!(opener.open("mock0").await.is_err());
        assert!(opener.open("mock0").await.is_ok());
        assert_eq!(opener.attempt_count(), 3);
    }

    #[tokio::test]
    async fn test_successful_open_yields_a_connected_peer() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let opener = MockOpener::succeeding();
        let mut near = opener.open("mock0").await.unwrap();
        let mut far = opener.take_peer().expect("peer for successful open");

        near.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn test_attempts_record_the_requested_path() {
        let opener = MockOpener::always_failing();
        let _ = opener.open("/dev/ttyUSB7").await;
        assert_eq!(
            lock(&opener.attempts).as_slice(),
            &["/dev/ttyUSB7".to_string()]
        );
    }
}
