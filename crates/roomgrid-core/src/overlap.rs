use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::date::DateValue;
use crate::unit::ReservationSpan;

/// Whether the checkout day of a reservation is still occupied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutPolicy {
    /// `start <= date <= end`: the checkout day cannot be sold.
    #[default]
    Inclusive,
    /// `start <= date < end`: same-day turnover. A one-day span still
    /// occupies its single day.
    Exclusive,
}

impl FromStr for CheckoutPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inclusive" => Ok(Self::Inclusive),
            "exclusive" | "turnover" => Ok(Self::Exclusive),
            other => Err(anyhow!("invalid checkout policy: {other}")),
        }
    }
}

impl ReservationSpan {
    pub fn occupies(&self, date: DateValue, policy: CheckoutPolicy) -> bool {
        if self.is_malformed() || date < self.start {
            return false;
        }
        match policy {
            CheckoutPolicy::Inclusive => date <= self.end,
            CheckoutPolicy::Exclusive => date < self.end || date == self.start,
        }
    }
}

/// True iff some span covers `date`, both ends inclusive.
pub fn is_reserved(date: DateValue, spans: &[ReservationSpan]) -> bool {
    is_reserved_with(date, spans, CheckoutPolicy::Inclusive)
}

pub fn is_reserved_with(
    date: DateValue,
    spans: &[ReservationSpan],
    policy: CheckoutPolicy,
) -> bool {
    spans.iter().any(|span| span.occupies(date, policy))
}

pub fn malformed_spans(spans: &[ReservationSpan]) -> impl Iterator<Item = &ReservationSpan> {
    spans.iter().filter(|span| span.is_malformed())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn date(raw: &str) -> DateValue {
        raw.parse().expect("valid date")
    }

    fn span(start: &str, end: &str) -> ReservationSpan {
        ReservationSpan::new(date(start), date(end))
    }

    #[test]
    fn inclusive_on_both_ends() {
        let spans = [span("2024-03-15", "2024-03-20")];

        for day in 15..=20 {
            let d = DateValue::from_ymd(2024, 3, day).expect("valid date");
            assert!(is_reserved(d, &spans), "{d} should be reserved");
        }
        assert!(!is_reserved(date("2024-03-14"), &spans));
        assert!(!is_reserved(date("2024-03-21"), &spans));
    }

    #[test]
    fn empty_spans_never_reserved() {
        assert!(!is_reserved(date("2024-03-15"), &[]));
    }

    #[test]
    fn duplicate_and_overlapping_spans_are_redundant() {
        let spans = [
            span("2024-03-15", "2024-03-20"),
            span("2024-03-15", "2024-03-20"),
            span("2024-03-18", "2024-03-22"),
        ];
        assert!(is_reserved(date("2024-03-19"), &spans));
        assert!(is_reserved(date("2024-03-22"), &spans));
        assert!(!is_reserved(date("2024-03-23"), &spans));
    }

    #[test]
    fn malformed_span_never_matches() {
        let spans = [span("2024-03-20", "2024-03-15")];
        assert!(!is_reserved(date("2024-03-17"), &spans));
        assert!(!is_reserved(date("2024-03-20"), &spans));
        assert_eq!(malformed_spans(&spans).count(), 1);
    }

    #[test]
    fn exclusive_policy_frees_checkout_day() {
        let spans = [span("2024-03-15", "2024-03-20")];
        let policy = CheckoutPolicy::Exclusive;
        assert!(is_reserved_with(date("2024-03-15"), &spans, policy));
        assert!(is_reserved_with(date("2024-03-19"), &spans, policy));
        assert!(!is_reserved_with(date("2024-03-20"), &spans, policy));

        let single = [span("2024-03-15", "2024-03-15")];
        assert!(is_reserved_with(date("2024-03-15"), &single, policy));
    }

    #[test]
    fn parses_policy_names() {
        assert_eq!(
            "Exclusive".parse::<CheckoutPolicy>().expect("parse"),
            CheckoutPolicy::Exclusive
        );
        assert!("sometimes".parse::<CheckoutPolicy>().is_err());
    }

    proptest! {
        #[test]
        fn order_does_not_matter(
            raw in prop::collection::vec((0i64..60, 0i64..10), 0..8),
            day_offset in 0i64..70,
        ) {
            let base = date("2024-01-01");
            let spans: Vec<ReservationSpan> = raw
                .iter()
                .map(|(start, len)| {
                    let s = base.add_days(*start).expect("in range");
                    let e = s.add_days(*len).expect("in range");
                    ReservationSpan::new(s, e)
                })
                .collect();
            let mut reversed = spans.clone();
            reversed.reverse();
            let day = base.add_days(day_offset).expect("in range");

            prop_assert_eq!(is_reserved(day, &spans), is_reserved(day, &reversed));
        }
    }
}
