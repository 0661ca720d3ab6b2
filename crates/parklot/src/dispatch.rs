//! Request dispatch: command in, response out.
//!
//! Pure translation layer over the pool. Holds no locks and performs no
//! retries; pool errors surface verbatim as ERROR responses.

use std::sync::Arc;

use crate::pool::{PoolError, SlotPool};
use crate::protocol::{Command, Response};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Payload shape mismatch detected after decode (e.g. a non-integer
    /// capacity string).
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("failed to encode response payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Translates commands into pool operations. Stateless beyond the pool
/// reference.
pub struct Dispatcher {
    pool: Arc<SlotPool>,
}

impl Dispatcher {
    pub fn new(pool: Arc<SlotPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<SlotPool> {
        &self.pool
    }

    pub fn handle(&self, command: Command) -> Response {
        match self.execute(command) {
            Ok(message) => Response::ok(message),
            Err(err) => Response::error(err.to_string()),
        }
    }

    fn execute(&self, command: Command) -> Result<String, DispatchError> {
        match command {
            Command::OpenPool(raw) => {
                let capacity: usize = raw.trim().parse().map_err(|_| {
                    DispatchError::Malformed(format!("capacity must be an integer, got {raw:?}"))
                })?;
                self.pool.open(capacity)?;
                Ok(format!(
                    "successfully initialized parking lot with {capacity} slots"
                ))
            }
            Command::Enter { police_number } => {
                let slot = self.pool.allocate(&police_number)?;
                Ok(format!(
                    "successfully parked car with police number {police_number} and SLOT number id {slot}"
                ))
            }
            Command::Leave {
                police_number,
                hours,
            } => {
                let record = self.pool.release(&police_number, hours)?;
                Ok(serde_json::to_string(&record)?)
            }
            Command::Status => Ok(serde_json::to_string(&self.pool.snapshot())?),
        }
    }
}
