//! SlotPool: occupancy records, revenue, and transaction bookkeeping behind
//! one readers-writer lock.
//!
//! `open`, `allocate`, and `release` take the write guard for their full
//! duration; `snapshot` takes the read guard. Every error path returns
//! before the first mutation, so a failing call never changes state.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::free_index::{FreeIndex, OrderedFreeIndex, ScanFreeIndex};

/// Flat charge covering the first [`COVERED_HOURS`] of a stay.
pub const BASE_CHARGE: f64 = 10.0;

/// Hours covered by the base charge.
pub const COVERED_HOURS: i64 = 2;

/// Tiered pricing: the base charge covers up to two hours, every additional
/// hour adds one more base charge. Pure function of the elapsed hours.
pub fn charge_for(hours: i64) -> f64 {
    if hours <= COVERED_HOURS {
        BASE_CHARGE
    } else {
        BASE_CHARGE * (1 + (hours - COVERED_HOURS)) as f64
    }
}

/// Errors returned by pool operations. All are recoverable at the call
/// boundary; none leaves the pool in a partial state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PoolError {
    #[error("parking capacity must be at least 1")]
    InvalidCapacity,

    #[error("parking lot capacity is already initialized")]
    AlreadyOpened,

    #[error("police number must not be empty")]
    EmptyIdentifier,

    #[error("car with police number {0} is already parked")]
    DuplicateOccupant(String),

    #[error("parking lot is full")]
    PoolFull,

    #[error("parking duration must be at least 1 hour, got {0}")]
    InvalidDuration(i64),

    #[error("car with police number {0} does not exist in the parking area")]
    OccupantNotFound(String),
}

/// One parked car. Field names are the wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyRecord {
    pub id: Uuid,
    pub police_number: String,
    /// 1-based slot number, lowest is nearest the entrance.
    pub area_number: u32,
    pub parking_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

/// Read-only view of the pool, taken under the shared lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub revenue: f64,
    #[serde(rename = "area_capacity")]
    pub capacity: usize,
    /// Sum of all occupants' lifetime transaction counters.
    #[serde(rename = "tx_count")]
    pub transactions: u64,
    /// One entry per slot; `None` for free slots.
    #[serde(rename = "car_list")]
    pub slots: Vec<Option<OccupancyRecord>>,
}

/// Pool behavior switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolOptions {
    /// Fold identifier case for duplicate detection and lookup.
    /// Off by default; pending product clarification.
    pub case_insensitive_ids: bool,
}

struct PoolState {
    /// 0 means not yet opened.
    capacity: usize,
    records: Vec<Option<OccupancyRecord>>,
    /// Lookup key (possibly case-folded) to 0-based slot index, active only.
    active: HashMap<String, usize>,
    free: Box<dyn FreeIndex>,
    revenue: f64,
    /// Lifetime transaction count per occupant key.
    tx: HashMap<String, u64>,
}

/// The slot-allocation engine.
pub struct SlotPool {
    state: RwLock<PoolState>,
    options: PoolOptions,
}

impl Default for SlotPool {
    fn default() -> Self {
        Self::ordered()
    }
}

impl SlotPool {
    pub fn new(free: Box<dyn FreeIndex>) -> Self {
        Self::with_options(free, PoolOptions::default())
    }

    pub fn with_options(free: Box<dyn FreeIndex>, options: PoolOptions) -> Self {
        Self {
            state: RwLock::new(PoolState {
                capacity: 0,
                records: Vec::new(),
                active: HashMap::new(),
                free,
                revenue: 0.0,
                tx: HashMap::new(),
            }),
            options,
        }
    }

    /// Pool backed by the ordered-set free index.
    pub fn ordered() -> Self {
        Self::new(Box::new(OrderedFreeIndex::new()))
    }

    /// Pool backed by the linear-scan free index.
    pub fn scan() -> Self {
        Self::new(Box::new(ScanFreeIndex::new()))
    }

    fn key(&self, occupant: &str) -> String {
        if self.options.case_insensitive_ids {
            occupant.to_lowercase()
        } else {
            occupant.to_string()
        }
    }

    // No operation panics while holding a guard, so a poisoned lock still
    // holds consistent state; recover rather than propagate.
    fn write(&self) -> RwLockWriteGuard<'_, PoolState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read(&self) -> RwLockReadGuard<'_, PoolState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fix the capacity and mark every slot free. One-time structural
    /// initialization; concurrent openers observe exactly one winner.
    pub fn open(&self, capacity: usize) -> Result<(), PoolError> {
        if capacity < 1 {
            return Err(PoolError::InvalidCapacity);
        }

        let mut state = self.write();
        if state.capacity > 0 {
            return Err(PoolError::AlreadyOpened);
        }

        state.capacity = capacity;
        state.records = vec![None; capacity];
        state.free.open(capacity);

        tracing::info!(capacity, "parking area opened");
        Ok(())
    }

    /// Assign the lowest-numbered free slot and return its 1-based number.
    pub fn allocate(&self, occupant: &str) -> Result<u32, PoolError> {
        if occupant.is_empty() {
            return Err(PoolError::EmptyIdentifier);
        }
        let key = self.key(occupant);

        let mut state = self.write();
        if state.active.contains_key(&key) {
            return Err(PoolError::DuplicateOccupant(occupant.to_string()));
        }

        let index = state.free.take_lowest().ok_or(PoolError::PoolFull)?;
        let area_number = (index + 1) as u32;
        state.records[index] = Some(OccupancyRecord {
            id: Uuid::new_v4(),
            police_number: occupant.to_string(),
            area_number,
            parking_at: Utc::now(),
            exit_at: None,
            cost: None,
        });
        state.active.insert(key, index);

        tracing::debug!(slot = area_number, occupant, "slot allocated");
        Ok(area_number)
    }

    /// Finalize a stay: compute exit time and charge, update revenue and the
    /// occupant's transaction counter, free the slot. Returns the finalized
    /// record.
    pub fn release(&self, occupant: &str, hours: i64) -> Result<OccupancyRecord, PoolError> {
        if hours < 1 {
            return Err(PoolError::InvalidDuration(hours));
        }
        let key = self.key(occupant);

        let mut state = self.write();
        let index = *state
            .active
            .get(&key)
            .ok_or_else(|| PoolError::OccupantNotFound(occupant.to_string()))?;

        let Some(mut record) = state.records[index].take() else {
            debug_assert!(false, "active occupant maps to an empty slot");
            tracing::error!(slot = index + 1, occupant, "active occupant maps to an empty slot");
            state.active.remove(&key);
            return Err(PoolError::OccupantNotFound(occupant.to_string()));
        };

        // `hours` comes straight off the wire; an overflowing duration must
        // leave the stay untouched.
        let Some(exit_at) = Duration::try_hours(hours)
            .and_then(|span| record.parking_at.checked_add_signed(span))
        else {
            state.records[index] = Some(record);
            return Err(PoolError::InvalidDuration(hours));
        };
        record.exit_at = Some(exit_at);
        let charge = charge_for(hours);
        record.cost = Some(charge);

        state.active.remove(&key);
        state.free.put_back(index);
        *state.tx.entry(key).or_insert(0) += 1;
        state.revenue += charge;

        tracing::debug!(
            slot = record.area_number,
            occupant,
            hours,
            charge,
            "slot released"
        );
        Ok(record)
    }

    /// Read-only aggregate view. Zero-valued before the pool is opened.
    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.read();
        PoolSnapshot {
            revenue: state.revenue,
            capacity: state.capacity,
            transactions: state.tx.values().sum(),
            slots: state.records.clone(),
        }
    }

    /// Number of currently free slots.
    pub fn available(&self) -> usize {
        self.read().free.free_count()
    }
}
