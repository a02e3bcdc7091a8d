//! The capture ledger: record IDs, stream IDs and the append-only log.

mod file;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;
use wiretap_types::{CapturedRecord, Direction, Json, MessageId, StreamId, Timestamp};

use self::file::FileSink;
use crate::{CallInfo, CaptureConfig, CaptureMessage, LedgerError};

/// A payload already rendered by its codec, waiting to be appended.
#[derive(Clone, Debug)]
pub struct EncodedPayload {
    message_type: String,
    content: Json,
}

impl EncodedPayload {
    pub fn encode<M: CaptureMessage>(message: &M) -> Result<Self, String> {
        let text = message.encode_json().map_err(|e| e.to_string())?;
        let content = Json::new(text)
            .map_err(|e| format!("codec for {} produced invalid json: {e}", M::message_type()))?;
        Ok(Self {
            message_type: M::message_type(),
            content,
        })
    }

    /// Placeholder for observations that failed before a payload existed.
    pub fn absent<M: CaptureMessage>() -> Self {
        Self {
            message_type: M::message_type(),
            content: Json::null(),
        }
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }
}

/// Everything about one observation except the fields the ledger assigns
/// (message ID and time).
pub struct Observation<'a> {
    pub direction: Direction,
    pub info: &'a CallInfo,
    pub stream_id: Option<StreamId>,
    pub error: Option<String>,
    pub payload: EncodedPayload,
}

struct IdCounters {
    next_message_id: AtomicU64,
    next_stream_id: AtomicU64,
}

impl IdCounters {
    fn new() -> Self {
        Self {
            next_message_id: AtomicU64::new(1),
            next_stream_id: AtomicU64::new(1),
        }
    }
}

enum Backend {
    Enabled(FileSink),
    Disabled,
}

struct LedgerInner {
    ids: IdCounters,
    backend: Backend,
}

/// Shared handle to the capture log.
///
/// Cheap to clone; every clone appends to the same file and draws from the
/// same counters. A disabled ledger accepts the same calls and discards every
/// record without encoding it, so interception code never has to check
/// whether capture is on.
#[derive(Clone)]
pub struct CaptureLedger {
    inner: Arc<LedgerInner>,
}

impl CaptureLedger {
    /// Opens (creating or truncating) the log at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let sink = FileSink::open(path.as_ref())?;
        Ok(Self::with_backend(Backend::Enabled(sink)))
    }

    /// A ledger that records nothing and creates no file.
    pub fn disabled() -> Self {
        Self::with_backend(Backend::Disabled)
    }

    pub fn from_config(config: &CaptureConfig) -> Result<Self, LedgerError> {
        match &config.output {
            Some(path) => Self::open(path),
            None => Ok(Self::disabled()),
        }
    }

    fn with_backend(backend: Backend) -> Self {
        Self {
            inner: Arc::new(LedgerInner {
                ids: IdCounters::new(),
                backend,
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.inner.backend, Backend::Enabled(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.inner.backend {
            Backend::Enabled(sink) => Some(sink.path()),
            Backend::Disabled => None,
        }
    }

    pub fn next_message_id(&self) -> MessageId {
        MessageId::new(self.inner.ids.next_message_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_stream_id(&self) -> StreamId {
        StreamId::new(self.inner.ids.next_stream_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Renders `message` for a later [`append`](Self::append).
    ///
    /// Returns `None` when capture is disabled or the codec fails; either way
    /// the observation is simply not recorded.
    pub fn encode<M: CaptureMessage>(&self, message: &M) -> Option<EncodedPayload> {
        if !self.is_enabled() {
            return None;
        }
        match EncodedPayload::encode(message) {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!(message_type = %M::message_type(), %e, "dropping unencodable payload");
                None
            }
        }
    }

    /// Appends one record. The message ID and timestamp are taken inside the
    /// writer lock, so file order, ID order and time order always agree.
    pub fn append(&self, observation: Observation<'_>) {
        let Backend::Enabled(sink) = &self.inner.backend else {
            return;
        };
        sink.append_with(|| {
            let record = CapturedRecord {
                message_id: self.next_message_id(),
                stream_id: observation.stream_id,
                direction: observation.direction,
                time: Timestamp::now(),
                method: observation.info.method().to_string(),
                message_type: observation.payload.message_type,
                peer_address: observation.info.peer_address().to_string(),
                error: observation.error,
                content: observation.payload.content,
            };
            match record.to_line() {
                Ok(line) => Some(line),
                Err(e) => {
                    debug!(message_id = %record.message_id, %e, "dropping unserializable record");
                    None
                }
            }
        });
    }

    /// Encodes and appends `message` in one step.
    pub fn record<M: CaptureMessage>(
        &self,
        direction: Direction,
        info: &CallInfo,
        message: &M,
        error: Option<String>,
        stream_id: Option<StreamId>,
    ) {
        let Some(payload) = self.encode(message) else {
            return;
        };
        self.append(Observation {
            direction,
            info,
            stream_id,
            error,
            payload,
        });
    }

    /// Records a failed operation that produced no `M` to show.
    pub fn record_failure<M: CaptureMessage>(
        &self,
        direction: Direction,
        info: &CallInfo,
        error: String,
        stream_id: Option<StreamId>,
    ) {
        if !self.is_enabled() {
            return;
        }
        self.append(Observation {
            direction,
            info,
            stream_id,
            error: Some(error),
            payload: EncodedPayload::absent::<M>(),
        });
    }

    pub fn flush(&self) -> Result<(), LedgerError> {
        match &self.inner.backend {
            Backend::Enabled(sink) => sink.flush(),
            Backend::Disabled => Ok(()),
        }
    }

    /// Flushes and closes the log for every clone of this ledger. Records
    /// arriving afterward are discarded.
    pub fn close(&self) -> Result<(), LedgerError> {
        match &self.inner.backend {
            Backend::Enabled(sink) => sink.close(),
            Backend::Disabled => Ok(()),
        }
    }
}
