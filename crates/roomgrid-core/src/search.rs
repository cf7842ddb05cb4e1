use std::num::NonZeroU64;

use anyhow::anyhow;
use serde::Serialize;
use tracing::debug;

use crate::catalog::Catalog;
use crate::date::DateValue;
use crate::overlap::{CheckoutPolicy, is_reserved_with};
use crate::unit::UnitId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    pub check_in: DateValue,
    pub check_out: DateValue,
}

impl SearchQuery {
    /// Both dates are required; check-out may not precede check-in.
    pub fn new(
        check_in: Option<DateValue>,
        check_out: Option<DateValue>,
    ) -> anyhow::Result<Self> {
        let (Some(check_in), Some(check_out)) = (check_in, check_out) else {
            return Err(anyhow!("check-in and check-out dates are required"));
        };
        if check_out < check_in {
            return Err(anyhow!(
                "check-out {check_out} is before check-in {check_in}"
            ));
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    pub id: UnitId,
    pub name: String,
    pub nightly_price: NonZeroU64,
    pub capacity: Option<u32>,
    pub beds: Option<u32>,
    pub size_m2: Option<u32>,
    pub features: Vec<String>,
    /// False when the check-in date is already reserved.
    pub bookable: bool,
}

#[tracing::instrument(skip(catalog), fields(units = catalog.len()))]
pub fn search(catalog: &Catalog, query: SearchQuery, checkout: CheckoutPolicy) -> Vec<RoomSummary> {
    catalog
        .units()
        .iter()
        .map(|unit| {
            let bookable = !is_reserved_with(query.check_in, &unit.reservations, checkout);
            debug!(unit_id = unit.id, bookable, "evaluated room for check-in");
            RoomSummary {
                id: unit.id,
                name: unit.name.clone(),
                nightly_price: unit.base_price,
                capacity: unit.capacity,
                beds: unit.beds,
                size_m2: unit.size_m2,
                features: unit.features.clone(),
                bookable,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(raw: &str) -> DateValue {
        raw.parse().expect("valid date")
    }

    #[test]
    fn requires_both_dates() {
        let err = SearchQuery::new(Some(date("2024-03-16")), None).expect_err("missing");
        assert!(err.to_string().contains("required"));
        assert!(SearchQuery::new(None, None).is_err());
    }

    #[test]
    fn rejects_reversed_stay() {
        assert!(SearchQuery::new(Some(date("2024-03-16")), Some(date("2024-03-15"))).is_err());
        assert!(SearchQuery::new(Some(date("2024-03-16")), Some(date("2024-03-16"))).is_ok());
    }

    #[test]
    fn flags_rooms_reserved_on_check_in() {
        let query =
            SearchQuery::new(Some(date("2024-03-19")), Some(date("2024-03-21"))).expect("query");
        let results = search(&Catalog::demo(), query, CheckoutPolicy::Inclusive);

        let bookable: Vec<(UnitId, bool)> = results.iter().map(|r| (r.id, r.bookable)).collect();
        assert_eq!(bookable, vec![(1, false), (2, false), (3, true)]);
        assert_eq!(results[0].nightly_price.get(), 1500);
    }

    #[test]
    fn checkout_policy_applies_to_check_in() {
        let query =
            SearchQuery::new(Some(date("2024-03-20")), Some(date("2024-03-21"))).expect("query");
        let inclusive = search(&Catalog::demo(), query, CheckoutPolicy::Inclusive);
        let exclusive = search(&Catalog::demo(), query, CheckoutPolicy::Exclusive);
        assert!(!inclusive[0].bookable);
        assert!(exclusive[0].bookable);
    }
}
