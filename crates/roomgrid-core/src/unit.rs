use std::num::{NonZeroU32, NonZeroU64};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::date::DateValue;

pub type UnitId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationSpan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    pub start: DateValue,
    pub end: DateValue,
}

impl ReservationSpan {
    pub fn new(start: DateValue, end: DateValue) -> Self {
        Self {
            uuid: None,
            start,
            end,
        }
    }

    /// `start` after `end`; such a span never occupies any date.
    pub fn is_malformed(&self) -> bool {
        self.start > self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookableUnit {
    pub id: UnitId,
    pub name: String,

    /// Nightly base price in whole currency units.
    pub base_price: NonZeroU64,

    #[serde(default)]
    pub capacity: Option<u32>,

    #[serde(default)]
    pub beds: Option<u32>,

    #[serde(default)]
    pub size_m2: Option<u32>,

    #[serde(default)]
    pub features: Vec<String>,

    #[serde(default)]
    pub reservations: Vec<ReservationSpan>,
}

impl BookableUnit {
    pub fn new(id: UnitId, name: impl Into<String>, base_price: NonZeroU64) -> Self {
        Self {
            id,
            name: name.into(),
            base_price,
            capacity: None,
            beds: None,
            size_m2: None,
            features: vec![],
            reservations: vec![],
        }
    }

    pub fn with_reservation(mut self, start: DateValue, end: DateValue) -> Self {
        self.reservations.push(ReservationSpan::new(start, end));
        self
    }
}

/// Price and sellable stock attached to an available cell. Both are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Offer {
    pub price: NonZeroU64,
    pub stock: NonZeroU32,
}

impl Offer {
    pub fn new(price: NonZeroU64, stock: NonZeroU32) -> Self {
        Self { price, stock }
    }
}
