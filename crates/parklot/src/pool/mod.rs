//! Slot pool: the allocation engine and its free-index strategies.
//!
//! All mutable state lives behind a single readers-writer lock inside
//! [`SlotPool`]. The lowest-free-slot policy is pluggable via [`FreeIndex`]:
//! - [`OrderedFreeIndex`]: ordered set, O(log n) per allocation
//! - [`ScanFreeIndex`]: occupancy bitmap, O(n) linear scan
//!
//! Both are observably equivalent; only latency differs.

mod free_index;
mod slot_pool;

pub use free_index::{FreeIndex, OrderedFreeIndex, ScanFreeIndex};
pub use slot_pool::{
    BASE_CHARGE, COVERED_HOURS, OccupancyRecord, PoolError, PoolOptions, PoolSnapshot, SlotPool,
    charge_for,
};
