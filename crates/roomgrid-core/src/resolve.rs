use std::collections::HashSet;
use std::num::{NonZeroU32, NonZeroU64};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::date::DateValue;
use crate::overlap::{CheckoutPolicy, is_reserved_with};
use crate::rules::{ClosedRule, PricingRule};
use crate::unit::{BookableUnit, Offer, UnitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CellStatus {
    Available {
        price: NonZeroU64,
        stock: NonZeroU32,
    },
    Unavailable,
    Closed,
}

impl CellStatus {
    pub fn offer(&self) -> Option<Offer> {
        match *self {
            CellStatus::Available { price, stock } => Some(Offer::new(price, stock)),
            CellStatus::Unavailable | CellStatus::Closed => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, CellStatus::Available { .. })
    }
}

impl From<Offer> for CellStatus {
    fn from(offer: Offer) -> Self {
        CellStatus::Available {
            price: offer.price,
            stock: offer.stock,
        }
    }
}

/// One unit's cells, aligned index-for-index with [`AvailabilityGrid::dates`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridRow {
    pub unit_id: UnitId,
    pub unit_name: String,
    pub cells: Vec<CellStatus>,
}

/// Status of every (unit, date) pair of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityGrid {
    dates: Vec<DateValue>,
    rows: Vec<GridRow>,
}

impl AvailabilityGrid {
    pub fn dates(&self) -> &[DateValue] {
        &self.dates
    }

    pub fn rows(&self) -> &[GridRow] {
        &self.rows
    }

    pub fn row(&self, unit_id: UnitId) -> Option<&GridRow> {
        self.rows.iter().find(|row| row.unit_id == unit_id)
    }

    pub fn get(&self, unit_id: UnitId, date: DateValue) -> Option<CellStatus> {
        let idx = self.dates.binary_search(&date).ok()?;
        self.row(unit_id)?.cells.get(idx).copied()
    }

    pub fn cell_count(&self) -> usize {
        self.rows.iter().map(|row| row.cells.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_count() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (UnitId, DateValue, CellStatus)> + '_ {
        self.rows.iter().flat_map(move |row| {
            self.dates
                .iter()
                .zip(&row.cells)
                .map(move |(date, cell)| (row.unit_id, *date, *cell))
        })
    }
}

/// Resolves availability with a fixed pair of rules.
#[derive(Debug, Clone)]
pub struct Resolver<C, P> {
    closed: C,
    pricing: P,
    checkout: CheckoutPolicy,
}

impl<C, P> Resolver<C, P>
where
    C: ClosedRule,
    P: PricingRule,
{
    pub fn new(closed: C, pricing: P) -> Self {
        Self {
            closed,
            pricing,
            checkout: CheckoutPolicy::default(),
        }
    }

    pub fn with_checkout_policy(mut self, checkout: CheckoutPolicy) -> Self {
        self.checkout = checkout;
        self
    }

    pub fn checkout_policy(&self) -> CheckoutPolicy {
        self.checkout
    }

    /// Classifies a single cell: closed, then reserved, then sellable.
    pub fn classify(&self, unit: &BookableUnit, date: DateValue) -> CellStatus {
        if self.closed.is_closed(date) {
            CellStatus::Closed
        } else if is_reserved_with(date, &unit.reservations, self.checkout) {
            CellStatus::Unavailable
        } else {
            self.pricing.offer(unit).into()
        }
    }

    /// Builds the grid for every distinct unit over `window`. The window is
    /// sorted and deduplicated first, so callers may pass dates in any order.
    #[tracing::instrument(skip_all, fields(units = units.len(), days = window.len()))]
    pub fn resolve(&self, units: &[BookableUnit], window: &[DateValue]) -> AvailabilityGrid {
        let window = normalize_window(window);
        let closed = self.closed_days(&window);
        let rows = distinct_units(units)
            .into_iter()
            .map(|unit| self.resolve_row(unit, &window, &closed))
            .collect();
        self.finish(window, rows)
    }

    /// Sequential resolve that gives up once `cancel` is set. The flag is
    /// checked before each unit.
    #[tracing::instrument(skip_all, fields(units = units.len(), days = window.len()))]
    pub fn resolve_until(
        &self,
        units: &[BookableUnit],
        window: &[DateValue],
        cancel: &AtomicBool,
    ) -> anyhow::Result<AvailabilityGrid> {
        let window = normalize_window(window);
        let closed = self.closed_days(&window);
        let distinct = distinct_units(units);
        let mut rows = Vec::with_capacity(distinct.len());

        for unit in distinct {
            if cancel.load(Ordering::Relaxed) {
                warn!(done = rows.len(), "availability resolve cancelled");
                return Err(anyhow!(
                    "availability resolve cancelled after {} units",
                    rows.len()
                ));
            }
            rows.push(self.resolve_row(unit, &window, &closed));
        }

        Ok(self.finish(window, rows))
    }

    fn closed_days(&self, window: &[DateValue]) -> Vec<bool> {
        window.iter().map(|date| self.closed.is_closed(*date)).collect()
    }

    fn resolve_row(&self, unit: &BookableUnit, window: &[DateValue], closed: &[bool]) -> GridRow {
        // Pricing depends on the unit alone, so it is computed at most once per row.
        let mut offer: Option<Offer> = None;
        let cells = window
            .iter()
            .zip(closed)
            .map(|(date, &is_closed)| {
                if is_closed {
                    CellStatus::Closed
                } else if is_reserved_with(*date, &unit.reservations, self.checkout) {
                    CellStatus::Unavailable
                } else {
                    (*offer.get_or_insert_with(|| self.pricing.offer(unit))).into()
                }
            })
            .collect();

        GridRow {
            unit_id: unit.id,
            unit_name: unit.name.clone(),
            cells,
        }
    }

    fn finish(&self, dates: Vec<DateValue>, rows: Vec<GridRow>) -> AvailabilityGrid {
        let grid = AvailabilityGrid { dates, rows };
        debug!(
            rows = grid.rows.len(),
            cells = grid.cell_count(),
            checkout = ?self.checkout,
            "resolved availability grid"
        );
        grid
    }
}

impl<C, P> Resolver<C, P>
where
    C: ClosedRule + Sync,
    P: PricingRule + Sync,
{
    /// Same grid as [`Resolver::resolve`], rows computed on the rayon pool.
    #[tracing::instrument(skip_all, fields(units = units.len(), days = window.len()))]
    pub fn resolve_parallel(
        &self,
        units: &[BookableUnit],
        window: &[DateValue],
    ) -> AvailabilityGrid {
        let window = normalize_window(window);
        let closed = self.closed_days(&window);
        let rows = distinct_units(units)
            .into_par_iter()
            .map(|unit| self.resolve_row(unit, &window, &closed))
            .collect();
        self.finish(window, rows)
    }
}

/// Resolves `units` over `window` with the default checkout policy.
pub fn resolve<C, P>(
    units: &[BookableUnit],
    window: &[DateValue],
    closed_rule: C,
    pricing_rule: P,
) -> AvailabilityGrid
where
    C: ClosedRule,
    P: PricingRule,
{
    Resolver::new(closed_rule, pricing_rule).resolve(units, window)
}

/// Grid dates must be strictly ascending for keyed lookup.
fn normalize_window(window: &[DateValue]) -> Vec<DateValue> {
    let mut dates = window.to_vec();
    dates.sort_unstable();
    dates.dedup();
    if dates.as_slice() != window {
        debug!(
            given = window.len(),
            kept = dates.len(),
            "normalized unordered or repeated window dates"
        );
    }
    dates
}

fn distinct_units(units: &[BookableUnit]) -> Vec<&BookableUnit> {
    let mut seen = HashSet::with_capacity(units.len());
    units
        .iter()
        .filter(|unit| {
            let fresh = seen.insert(unit.id);
            if !fresh {
                warn!(unit_id = unit.id, name = %unit.name, "duplicate unit id; keeping first");
            }
            fresh
        })
        .collect()
}
