use serde::{Deserialize, Serialize};

use crate::{Direction, Json, MessageId, StreamId, Timestamp};

/// Peer address recorded when the transport could not tell us who is on the
/// other end.
pub const UNKNOWN_PEER: &str = "unknown";

/// One observed message, as persisted on a single line of the capture log.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CapturedRecord {
    pub message_id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<StreamId>,
    pub direction: Direction,
    pub time: Timestamp,
    pub method: String,
    /// Fully qualified type name of the payload.
    #[serde(rename = "message")]
    pub message_type: String,
    pub peer_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub content: Json,
}

impl CapturedRecord {
    /// Serializes the record as one log line, including the trailing newline.
    pub fn to_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }

    /// Parses one log line. A trailing newline is accepted.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end_matches(['\n', '\r']))
    }
}
