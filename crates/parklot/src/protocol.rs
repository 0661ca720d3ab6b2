//! Wire protocol types for client-server communication.
//!
//! One JSON object per line in each direction. The command and its payload
//! decode into a single tagged enum, so a malformed payload is one decode
//! error instead of a runtime type assertion per field.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A client command with its payload. `data` is absent for `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "data", rename_all = "kebab-case")]
pub enum Command {
    /// Fix the pool capacity. The value travels as a string on the wire.
    OpenPool(String),

    /// Park a car, assigning the lowest free slot.
    Enter { police_number: String },

    /// Leave after `hours`, settling the charge.
    Leave { police_number: String, hours: i64 },

    /// Aggregate pool state.
    Status,
}

impl Command {
    /// Command name as it appears on the wire, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::OpenPool(_) => "open-pool",
            Command::Enter { .. } => "enter",
            Command::Leave { .. } => "leave",
            Command::Status => "status",
        }
    }
}

/// One request line. The request id is optional; the server generates one
/// for logging when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(flatten)]
    pub command: Command,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_request_id: Option<Uuid>,
}

impl Request {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            x_request_id: Some(Uuid::new_v4()),
        }
    }
}

/// Response status marker, distinct from the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallStatus::Ok => write!(f, "OK"),
            CallStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// One response line. Errors carry a human-readable message only; there is
/// no structured error code at this boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: CallStatus,
    pub message: String,
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: CallStatus::Ok,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: CallStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == CallStatus::Ok
    }
}
