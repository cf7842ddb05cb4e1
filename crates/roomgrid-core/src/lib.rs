pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod date;
pub mod overlap;
pub mod render;
pub mod resolve;
pub mod rules;
pub mod search;
pub mod unit;
pub mod window;

use std::ffi::OsString;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use date::DateValue;
pub use overlap::{
  CheckoutPolicy,
  is_reserved
};
pub use resolve::{
  AvailabilityGrid,
  CellStatus,
  Resolver,
  resolve
};
pub use unit::{
  BookableUnit,
  Offer,
  ReservationSpan
};
pub use window::generate_window;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting roomgrid"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.rcfile.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let catalog_path = cli
    .catalog
    .clone()
    .unwrap_or_else(|| {
      cfg.catalog_path()
    });
  let catalog = if cli.catalog.is_some()
  {
    catalog::Catalog::load(
      &catalog_path
    )
  } else {
    catalog::Catalog::load_or_demo(
      &catalog_path
    )
  }
  .with_context(|| {
    format!(
      "failed to load catalog from \
       {}",
      catalog_path.display()
    )
  })?;

  let renderer =
    render::Renderer::new(&cfg)?;
  let today =
    date::property_today(Utc::now());
  debug!(%today, "resolved property date");

  commands::dispatch(
    &cfg,
    &catalog,
    &renderer,
    cli.command.unwrap_or_default(),
    today
  )?;

  info!("done");
  Ok(())
}
