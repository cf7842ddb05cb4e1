use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::cli::Command;
use crate::config::Config;
use crate::date::{DateValue, parse_date_expr};
use crate::render::Renderer;
use crate::resolve::{AvailabilityGrid, Resolver};
use crate::rules::{Pricing, WeeklyClosure};
use crate::search::{RoomSummary, SearchQuery, search};
use crate::window::{AvailabilityWindow, checked_window_days};

#[derive(Debug, Serialize)]
struct SearchOutput<'a> {
    query: SearchQuery,
    rooms: &'a [RoomSummary],
    calendar: &'a AvailabilityGrid,
}

#[tracing::instrument(skip(cfg, catalog, renderer))]
pub fn dispatch(
    cfg: &Config,
    catalog: &Catalog,
    renderer: &Renderer,
    command: Command,
    today: DateValue,
) -> anyhow::Result<()> {
    let resolver = build_resolver(cfg)?;

    match command {
        Command::Grid {
            start,
            days,
            json,
            parallel,
        } => {
            let start = parse_date_expr(&start, today)
                .with_context(|| format!("invalid --start: {start}"))?;
            let days = match days {
                Some(days) => checked_window_days(days).context("invalid --days")?,
                None => cfg.window_days()?,
            };
            let window = AvailabilityWindow::new(start, days);
            let grid = run_resolve(&resolver, catalog, window, parallel || cfg.parallel());

            if json {
                renderer.print_json(&grid)
            } else {
                renderer.print_grid(&grid)
            }
        }
        Command::Search {
            check_in,
            check_out,
            json,
        } => {
            let check_in = check_in
                .map(|raw| parse_date_expr(&raw, today))
                .transpose()
                .context("invalid --check-in")?;
            let check_out = check_out
                .map(|raw| parse_date_expr(&raw, today))
                .transpose()
                .context("invalid --check-out")?;
            let query = SearchQuery::new(check_in, check_out)?;
            info!(check_in = %query.check_in, check_out = %query.check_out, "searching rooms");

            let rooms = search(catalog, query, resolver.checkout_policy());
            let window = AvailabilityWindow::new(query.check_in, cfg.window_days()?);
            let grid = run_resolve(&resolver, catalog, window, cfg.parallel());

            if json {
                renderer.print_json(&SearchOutput {
                    query,
                    rooms: &rooms,
                    calendar: &grid,
                })
            } else {
                renderer.print_search(&rooms)?;
                println!();
                renderer.print_grid(&grid)
            }
        }
        Command::Rooms { json } => {
            if json {
                renderer.print_json(&catalog.units())
            } else {
                renderer.print_rooms(catalog)
            }
        }
    }
}

pub fn build_resolver(cfg: &Config) -> anyhow::Result<Resolver<WeeklyClosure, Pricing>> {
    let closure = cfg.closure().context("failed to read closed-day rules")?;
    let pricing = cfg.pricing().context("failed to read pricing rules")?;
    let checkout = cfg.checkout_policy()?;
    debug!(
        closed_weekdays = ?closure.weekdays(),
        ?pricing,
        ?checkout,
        "built resolver from config"
    );
    Ok(Resolver::new(closure, pricing).with_checkout_policy(checkout))
}

fn run_resolve(
    resolver: &Resolver<WeeklyClosure, Pricing>,
    catalog: &Catalog,
    window: AvailabilityWindow,
    parallel: bool,
) -> AvailabilityGrid {
    let dates = window.dates();
    if parallel {
        resolver.resolve_parallel(catalog.units(), &dates)
    } else {
        resolver.resolve(catalog.units(), &dates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlap::CheckoutPolicy;
    use crate::resolve::CellStatus;

    #[test]
    fn resolver_follows_config() {
        let mut cfg = Config::defaults();
        cfg.apply_overrides([
            ("checkout.policy".to_string(), "exclusive".to_string()),
            ("closed.weekdays".to_string(), "monday".to_string()),
        ]);
        let resolver = build_resolver(&cfg).expect("resolver");
        assert_eq!(resolver.checkout_policy(), CheckoutPolicy::Exclusive);

        let catalog = Catalog::demo();
        let window = AvailabilityWindow::new("2024-03-18".parse().expect("date"), 3);
        let grid = run_resolve(&resolver, &catalog, window, false);

        assert_eq!(grid.get(3, "2024-03-18".parse().expect("date")), Some(CellStatus::Closed));
        // Deluxe checks out on the 20th; exclusive policy sells that day.
        assert!(grid.get(1, "2024-03-20".parse().expect("date")).expect("cell").is_available());
    }

    #[test]
    fn oversized_grid_days_are_rejected() {
        let cfg = Config::defaults();
        let renderer = Renderer::plain();
        let grid = Command::Grid {
            start: "2024-03-10".to_string(),
            days: Some(99_999_999_999),
            json: true,
            parallel: false,
        };
        let today = "2024-03-10".parse().expect("date");
        let err = dispatch(&cfg, &Catalog::demo(), &renderer, grid, today)
            .expect_err("window too long");
        assert!(format!("{err:#}").contains("--days"));
    }

    #[test]
    fn invalid_rules_surface_errors() {
        let mut cfg = Config::defaults();
        cfg.apply_overrides([("pricing.mode".to_string(), "bogus".to_string())]);
        assert!(build_resolver(&cfg).is_err());
    }
}
