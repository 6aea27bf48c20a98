//! Endpoint opening with bounded retry, and the per-device reader task.
//!
//! # Open retry
//!
//! [`open_endpoint`] races each open attempt against the remaining time
//! budget. An attempt that *errors* is retried after a fixed 100 ms pause
//! with 100 ms subtracted from the budget (saturating), so a 300 ms budget
//! yields attempts at 300 → 200 → 100 → 0 remaining: the initial attempt
//! plus exactly three retries. An attempt that *hangs* past the remaining
//! budget fails immediately with `ConnectionTimeout` and is not retried; the
//! in-flight open is dropped, which closes the endpoint.
//!
//! # Reader task
//!
//! One task per device owns the read half for the device's lifetime. Every
//! inbound chunk is pushed into the armed [`ResponseAssembler`]; when the
//! assembler completes, the pending operation's oneshot is resolved and the
//! slot emptied. Chunks arriving with no armed slot (late replies after a
//! timeout, or a chatty device) are discarded. On EOF or read error the slot
//! is drained and the device is marked closed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, trace, warn};

use lumen_core::ResponseAssembler;

use crate::device::DeviceError;
use crate::transport::EndpointOpener;

/// Fixed pause between failed open attempts.
pub(crate) const RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Read buffer size of the reader task.
const READ_CHUNK: usize = 1024;

/// One armed response: the completion state machine plus the channel that
/// resolves the suspended operation.
pub(crate) struct PendingResponse {
    pub(crate) assembler: ResponseAssembler,
    pub(crate) complete: oneshot::Sender<Vec<u8>>,
}

/// State shared between a `Device` handle and its reader task.
pub(crate) struct Shared {
    /// At most one operation is in flight per device; arming an occupied
    /// slot is a `Busy` error at the device layer.
    pub(crate) pending: Mutex<Option<PendingResponse>>,
    /// Set once the reader task exits; operations fail fast afterwards.
    pub(crate) closed: AtomicBool,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn lock_pending(&self) -> MutexGuard<'_, Option<PendingResponse>> {
        // The lock is only held for slot bookkeeping, never across awaits.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
        // Dropping the sender fails any operation still awaiting its reply.
        self.lock_pending().take();
    }
}

/// Opens the endpoint at `path`, retrying failed attempts within `budget`.
///
/// # Errors
///
/// - [`DeviceError::ConnectionTimeout`] when an attempt does not complete
///   within the remaining budget (no retry; the open is dropped).
/// - [`DeviceError::ConnectionFailed`] when an attempt errors with the
///   budget exhausted, carrying the last open error.
pub(crate) async fn open_endpoint<O: EndpointOpener>(
    opener: &O,
    path: &str,
    budget: Duration,
) -> Result<O::Stream, DeviceError> {
    let mut remaining = budget;
    loop {
        match time::timeout(remaining, opener.open(path)).await {
            Ok(Ok(stream)) => {
                debug!(endpoint = path, "endpoint open");
                return Ok(stream);
            }
            Ok(Err(source)) => {
                if remaining.is_zero() {
                    return Err(DeviceError::ConnectionFailed {
                        endpoint: path.to_string(),
                        source,
                    });
                }
                debug!(
                    endpoint = path,
                    remaining_ms = remaining.as_millis() as u64,
                    error = %source,
                    "open failed, retrying"
                );
                time::sleep(RETRY_PAUSE).await;
                remaining = remaining.saturating_sub(RETRY_PAUSE);
            }
            Err(_elapsed) => {
                warn!(endpoint = path, budget_ms = budget.as_millis() as u64, "open timed out");
                return Err(DeviceError::ConnectionTimeout {
                    endpoint: path.to_string(),
                    budget,
                });
            }
        }
    }
}

/// Spawns the single inbound reader task for a device.
///
/// The task runs until EOF, a read error, or abort (when the `Device` is
/// dropped), then marks the shared state closed.
pub(crate) fn spawn_reader<R>(
    mut reader: R,
    endpoint: String,
    shared: std::sync::Arc<Shared>,
) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => {
                    debug!(%endpoint, "endpoint closed (EOF)");
                    break;
                }
                Ok(n) => {
                    let mut slot = shared.lock_pending();
                    let completed = match slot.as_mut() {
                        Some(pending) => pending.assembler.push(&chunk[..n]),
                        None => {
                            trace!(%endpoint, len = n, "discarding bytes with no operation in flight");
                            None
                        }
                    };
                    if let Some(response) = completed {
                        // Free the slot before resolving so a follow-up
                        // operation can arm immediately.
                        let pending = slot.take();
                        drop(slot);
                        trace!(%endpoint, len = response.len(), "response complete");
                        if let Some(pending) = pending {
                            let _ = pending.complete.send(response);
                        }
                    }
                }
                Err(error) => {
                    warn!(%endpoint, %error, "read error on endpoint");
                    break;
                }
            }
        }
        shared.mark_closed();
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use lumen_core::ResponseShape;

    use crate::transport::mock::MockOpener;

    // ── Open retry ────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_300ms_budget_makes_initial_attempt_plus_three_retries() {
        let opener = MockOpener::always_failing();

        let result = open_endpoint(&opener, "mock0", Duration::from_millis(300)).await;

        assert!(matches!(result, Err(DeviceError::ConnectionFailed { .. })));
        assert_eq!(
            opener.attempt_count(),
            4,
            "budgets 300, 200, 100 and 0 must each get one attempt"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_errors_retry_until_success() {
        let opener = MockOpener::failing(2);

        let stream = open_endpoint(&opener, "mock0", Duration::from_millis(300)).await;

        assert!(stream.is_ok());
        assert_eq!(opener.attempt_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_open_times_out_without_retry() {
        let opener = MockOpener::hanging();
        let budget = Duration::from_millis(250);

        let start = time::Instant::now();
        let result = open_endpoint(&opener, "mock0", budget).await;

        match result {
            Err(DeviceError::ConnectionTimeout {
                endpoint,
                budget: reported,
            }) => {
                assert_eq!(endpoint, "mock0");
                assert_eq!(reported, budget);
            }
            other => panic!("expected ConnectionTimeout, got {other:?}"),
        }
        assert_eq!(opener.attempt_count(), 1, "a timeout must not retry");
        assert_eq!(start.elapsed(), budget);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_failed_carries_the_last_open_error() {
        let opener = MockOpener::always_failing();

        let result = open_endpoint(&opener, "mock0", Duration::from_millis(100)).await;

        match result {
            Err(DeviceError::ConnectionFailed { endpoint, source }) => {
                assert_eq!(endpoint, "mock0");
                assert_eq!(source.kind(), std::io::ErrorKind::ConnectionRefused);
            }
            other => panic!("expected ConnectionFailed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_fails_after_a_single_attempt() {
        let opener = MockOpener::always_failing();

        let result = open_endpoint(&opener, "mock0", Duration::ZERO).await;

        assert!(matches!(result, Err(DeviceError::ConnectionFailed { .. })));
        assert_eq!(opener.attempt_count(), 1);
    }

    // ── Reader task ───────────────────────────────────────────────────────────

    /// Arms the shared slot and returns the receiver, as the device layer
    /// would.
    fn arm(shared: &Shared, shape: ResponseShape) -> oneshot::Receiver<Vec<u8>> {
        let (tx, rx) = oneshot::channel();
        *shared.lock_pending() = Some(PendingResponse {
            assembler: ResponseAssembler::new(shape),
            complete: tx,
        });
        rx
    }

    #[tokio::test]
    async fn test_reader_resolves_pending_after_chunked_delivery() {
        use tokio::io::AsyncWriteExt;

        let (far, near) = tokio::io::duplex(4096);
        let shared = Arc::new(Shared::new());
        let _task = spawn_reader(near, "mock0".to_string(), Arc::clone(&shared));

        let rx = arm(&shared, ResponseShape::Fixed(512));

        let mut far = far;
        for chunk_len in [200usize, 200, 112] {
            far.write_all(&vec![0x55u8; chunk_len]).await.unwrap();
        }

        let response = rx.await.expect("reader must resolve the pending response");
        assert_eq!(response.len(), 512);
        assert!(shared.lock_pending().is_none(), "slot must be freed");
    }

    #[tokio::test]
    async fn test_reader_discards_bytes_with_no_pending_slot() {
        use tokio::io::AsyncWriteExt;

        let (mut far, near) = tokio::io::duplex(4096);
        let shared = Arc::new(Shared::new());
        let _task = spawn_reader(near, "mock0".to_string(), Arc::clone(&shared));

        // No slot armed: these bytes must vanish without effect.
        far.write_all(&[0xAA; 64]).await.unwrap();
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        // A later operation must still complete from its own bytes only.
        let rx = arm(&shared, ResponseShape::Fixed(1));
        far.write_all(&[0x2A]).await.unwrap();
        assert_eq!(rx.await.unwrap(), vec![0x2A]);
    }

    #[tokio::test]
    async fn test_reader_marks_closed_and_fails_pending_on_eof() {
        let (far, near) = tokio::io::duplex(64);
        let shared = Arc::new(Shared::new());
        let task = spawn_reader(near, "mock0".to_string(), Arc::clone(&shared));

        let rx = arm(&shared, ResponseShape::Fixed(4));
        drop(far); // EOF

        assert!(rx.await.is_err(), "pending sender must be dropped on EOF");
        task.await.unwrap();
        assert!(shared.is_closed());
    }
}
