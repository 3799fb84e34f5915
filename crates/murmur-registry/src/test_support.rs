//! In-memory [`FrameSink`] for unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use murmur_transport::{ConnectionId, FrameSink, TransportError};

/// Records every frame written to it. Can be switched to fail on send.
pub(crate) struct MockSink {
    id: ConnectionId,
    frames: Mutex<Vec<Vec<u8>>>,
    failing: AtomicBool,
}

impl MockSink {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id: ConnectionId::new(id),
            frames: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub(crate) fn failing(id: u64) -> Self {
        let sink = Self::new(id);
        sink.failing.store(true, Ordering::SeqCst);
        sink
    }

    pub(crate) fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().unwrap().clone()
    }
}

impl FrameSink for MockSink {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed(format!(
                "{} refuses writes",
                self.id
            )));
        }
        self.frames.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.failing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
