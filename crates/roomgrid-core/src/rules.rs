use std::collections::BTreeSet;
use std::num::{NonZeroU32, NonZeroU64};

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::date::DateValue;
use crate::unit::{BookableUnit, Offer};

/// Calendar-level sale restriction. Evaluated per date, independent of any
/// unit's reservations.
pub trait ClosedRule {
    fn is_closed(&self, date: DateValue) -> bool;
}

impl<F> ClosedRule for F
where
    F: Fn(DateValue) -> bool,
{
    fn is_closed(&self, date: DateValue) -> bool {
        self(date)
    }
}

/// Derives the price and stock shown on a unit's sellable cells.
pub trait PricingRule {
    fn offer(&self, unit: &BookableUnit) -> Offer;
}

impl<F> PricingRule for F
where
    F: Fn(&BookableUnit) -> Offer,
{
    fn offer(&self, unit: &BookableUnit) -> Offer {
        self(unit)
    }
}

/// Recurring weekday blackouts plus one-off blackout dates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeeklyClosure {
    weekdays: Vec<Weekday>,
    dates: BTreeSet<DateValue>,
}

impl WeeklyClosure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sundays() -> Self {
        Self::new().with_weekday(Weekday::Sun)
    }

    pub fn with_weekday(mut self, weekday: Weekday) -> Self {
        if !self.weekdays.contains(&weekday) {
            self.weekdays.push(weekday);
        }
        self
    }

    pub fn with_date(mut self, date: DateValue) -> Self {
        self.dates.insert(date);
        self
    }

    pub fn weekdays(&self) -> &[Weekday] {
        &self.weekdays
    }

    pub fn dates(&self) -> impl Iterator<Item = &DateValue> {
        self.dates.iter()
    }
}

impl ClosedRule for WeeklyClosure {
    fn is_closed(&self, date: DateValue) -> bool {
        self.weekdays.contains(&date.weekday()) || self.dates.contains(&date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Pricing {
    /// The unit's own nightly price with a fixed stock.
    BasePrice { stock: NonZeroU32 },
    /// Flat rate table keyed on unit id: `base + id`, stock `1 + id % stock_cycle`.
    IdOffset {
        base: NonZeroU64,
        stock_cycle: NonZeroU32,
    },
}

impl Default for Pricing {
    fn default() -> Self {
        Self::IdOffset {
            base: NonZeroU64::new(130).unwrap_or(NonZeroU64::MIN),
            stock_cycle: NonZeroU32::new(2).unwrap_or(NonZeroU32::MIN),
        }
    }
}

impl PricingRule for Pricing {
    fn offer(&self, unit: &BookableUnit) -> Offer {
        match *self {
            Pricing::BasePrice { stock } => Offer::new(unit.base_price, stock),
            Pricing::IdOffset { base, stock_cycle } => {
                let extra = unit.id % u64::from(stock_cycle.get());
                let extra = u32::try_from(extra).unwrap_or(u32::MAX);
                Offer::new(
                    base.saturating_add(unit.id),
                    NonZeroU32::MIN.saturating_add(extra),
                )
            }
        }
    }
}
