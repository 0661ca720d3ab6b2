//! parklot: in-memory parking slot tracker behind a newline-delimited JSON TCP protocol.

pub mod codec;
pub mod dispatch;
pub mod pool;
pub mod protocol;
pub mod server;

pub use codec::JsonLineCodec;
pub use dispatch::{DispatchError, Dispatcher};
pub use pool::{
    BASE_CHARGE, COVERED_HOURS, FreeIndex, OccupancyRecord, OrderedFreeIndex, PoolError,
    PoolOptions, PoolSnapshot, ScanFreeIndex, SlotPool, charge_for,
};
pub use protocol::{CallStatus, Command, Request, Response};
pub use server::{ServerConfig, serve, serve_on, shutdown_signal};
