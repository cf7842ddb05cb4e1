use std::collections::HashMap;
use std::fs;
use std::num::{
  NonZeroU32,
  NonZeroU64
};
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::date::{
  DateValue,
  parse_weekday_name
};
use crate::overlap::CheckoutPolicy;
use crate::rules::{
  Pricing,
  WeeklyClosure
};
use crate::window::checked_window_days;

const DEFAULT_WINDOW_DAYS: i64 = 15;

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  #[tracing::instrument(skip(
    rcfile_override
  ))]
  pub fn load(
    rcfile_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::defaults();

    let rcfile = resolve_rcfile_path(
      rcfile_override
    )?;
    if let Some(path) = rcfile {
      info!(rcfile = %path.display(), "loading rcfile");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no rcfile found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  pub fn defaults() -> Self {
    let mut map = HashMap::new();
    for (key, value) in [
      (
        "catalog.location",
        "~/.roomgrid/catalog.json"
      ),
      ("window.days", "15"),
      ("closed.weekdays", "sunday"),
      ("closed.dates", ""),
      ("pricing.mode", "offset"),
      ("pricing.offset", "130"),
      ("pricing.stock_cycle", "2"),
      ("pricing.stock", "1"),
      ("checkout.policy", "inclusive"),
      ("color", "on"),
      ("resolve.parallel", "off")
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }

    Config {
      map,
      loaded_files: vec![]
    }
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  pub fn catalog_path(&self) -> PathBuf {
    let raw = self
      .get("catalog.location")
      .unwrap_or_default();
    expand_tilde(Path::new(&raw))
  }

  pub fn window_days(
    &self
  ) -> anyhow::Result<i64> {
    let days: i64 = match self
      .get("window.days")
    {
      | Some(raw) => {
        raw.trim().parse().with_context(
          || {
            format!(
              "invalid window.days: \
               {raw}"
            )
          }
        )?
      }
      | None => DEFAULT_WINDOW_DAYS
    };
    checked_window_days(days)
      .context("invalid window.days")
  }

  pub fn parallel(&self) -> bool {
    self
      .get_bool("resolve.parallel")
      .unwrap_or(false)
  }

  pub fn checkout_policy(
    &self
  ) -> anyhow::Result<CheckoutPolicy> {
    self
      .get("checkout.policy")
      .map(|raw| raw.parse())
      .unwrap_or(Ok(
        CheckoutPolicy::default()
      ))
  }

  pub fn closure(
    &self
  ) -> anyhow::Result<WeeklyClosure> {
    let mut closure =
      WeeklyClosure::new();

    let weekdays = self
      .get("closed.weekdays")
      .unwrap_or_default();
    for token in split_list(&weekdays) {
      let lower =
        token.to_ascii_lowercase();
      if lower == "none" {
        continue;
      }
      let weekday =
        parse_weekday_name(&lower)
          .ok_or_else(|| {
            anyhow!(
              "invalid weekday in \
               closed.weekdays: {token}"
            )
          })?;
      closure =
        closure.with_weekday(weekday);
    }

    let dates = self
      .get("closed.dates")
      .unwrap_or_default();
    for token in split_list(&dates) {
      let date = token
        .parse::<DateValue>()
        .context(
          "invalid date in \
           closed.dates"
        )?;
      closure = closure.with_date(date);
    }

    Ok(closure)
  }

  pub fn pricing(
    &self
  ) -> anyhow::Result<Pricing> {
    let mode = self
      .get("pricing.mode")
      .unwrap_or_else(|| {
        "offset".to_string()
      });
    match mode
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "offset" => {
        Ok(Pricing::IdOffset {
          base:        self
            .positive_u64(
              "pricing.offset",
              130
            )?,
          stock_cycle: self
            .positive_u32(
              "pricing.stock_cycle",
              2
            )?
        })
      }
      | "base" => {
        Ok(Pricing::BasePrice {
          stock: self.positive_u32(
            "pricing.stock",
            1
          )?
        })
      }
      | other => {
        Err(anyhow!(
          "invalid pricing.mode: \
           {other}"
        ))
      }
    }
  }

  fn positive_u64(
    &self,
    key: &str,
    default: u64
  ) -> anyhow::Result<NonZeroU64> {
    let raw = self
      .get(key)
      .unwrap_or_else(|| {
        default.to_string()
      });
    raw.trim().parse().with_context(
      || {
        format!(
          "{key} must be a positive \
           integer, got: {raw}"
        )
      }
    )
  }

  fn positive_u32(
    &self,
    key: &str,
    default: u32
  ) -> anyhow::Result<NonZeroU32> {
    let raw = self
      .get(key)
      .unwrap_or_else(|| {
        default.to_string()
      });
    raw.trim().parse().with_context(
      || {
        format!(
          "{key} must be a positive \
           integer, got: {raw}"
        )
      }
    )
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rcfile_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var("ROOMGRIDRC")
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping rcfile"
    );
    return Ok(None);
  };
  let candidate =
    home.join(".roomgridrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn split_list(
  raw: &str
) -> impl Iterator<Item = &str> {
  raw
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;

  use chrono::Weekday;
  use tempfile::tempdir;

  use super::Config;
  use crate::overlap::CheckoutPolicy;
  use crate::rules::{
    ClosedRule,
    Pricing
  };

  #[test]
  fn defaults_match_booking_page() {
    let cfg = Config::defaults();
    assert_eq!(
      cfg.window_days().expect("days"),
      15
    );
    assert_eq!(
      cfg
        .closure()
        .expect("closure")
        .weekdays(),
      &[Weekday::Sun]
    );
    assert_eq!(
      cfg.pricing().expect("pricing"),
      Pricing::default()
    );
    assert_eq!(
      cfg
        .checkout_policy()
        .expect("policy"),
      CheckoutPolicy::Inclusive
    );
    assert!(!cfg.parallel());
  }

  #[test]
  fn loads_file_with_include_and_overrides()
   {
    let temp =
      tempdir().expect("tempdir");
    let extra =
      temp.path().join("extra.rc");
    fs::write(
      &extra,
      "closed.dates = 2024-04-23, \
       2024-05-19\n"
    )
    .expect("write include");
    let main =
      temp.path().join("main.rc");
    fs::write(
      &main,
      "# property rules\nwindow.days \
       = 7\nclosed.weekdays = sat, \
       sun # weekends\ninclude \
       extra.rc\n"
    )
    .expect("write rcfile");

    let mut cfg =
      Config::load(Some(
        main.as_path()
      ))
        .expect("load");
    cfg.apply_overrides([(
      "rc.checkout.policy".to_string(),
      "exclusive".to_string()
    )]);

    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.window_days().expect("days"),
      7
    );
    let closure =
      cfg.closure().expect("closure");
    assert!(closure.is_closed(
      "2024-04-23"
        .parse()
        .expect("date")
    ));
    assert!(closure.is_closed(
      "2024-03-16"
        .parse()
        .expect("date")
    ));
    assert!(!closure.is_closed(
      "2024-03-15"
        .parse()
        .expect("date")
    ));
    assert_eq!(
      cfg
        .checkout_policy()
        .expect("policy"),
      CheckoutPolicy::Exclusive
    );
  }

  #[test]
  fn rejects_bad_values() {
    let mut cfg = Config::defaults();
    cfg.apply_overrides([
      (
        "closed.weekdays".to_string(),
        "funday".to_string()
      ),
      (
        "pricing.offset".to_string(),
        "0".to_string()
      )
    ]);
    assert!(cfg.closure().is_err());
    assert!(cfg.pricing().is_err());

    cfg.apply_overrides([(
      "pricing.mode".to_string(),
      "auction".to_string()
    )]);
    assert!(cfg.pricing().is_err());
  }

  #[test]
  fn window_days_are_capped() {
    let mut cfg = Config::defaults();
    cfg.apply_overrides([(
      "window.days".to_string(),
      "99999999999".to_string()
    )]);
    let err = cfg
      .window_days()
      .expect_err("oversized window");
    assert!(
      format!("{err:#}")
        .contains("window.days")
    );

    cfg.apply_overrides([(
      "window.days".to_string(),
      "3660".to_string()
    )]);
    assert_eq!(
      cfg.window_days().expect("days"),
      3660
    );
  }

  #[test]
  fn base_pricing_and_no_closure() {
    let mut cfg = Config::defaults();
    cfg.apply_overrides([
      (
        "pricing.mode".to_string(),
        "base".to_string()
      ),
      (
        "pricing.stock".to_string(),
        "4".to_string()
      ),
      (
        "closed.weekdays".to_string(),
        "none".to_string()
      )
    ]);
    assert!(matches!(
      cfg.pricing().expect("pricing"),
      Pricing::BasePrice { stock }
        if stock.get() == 4
    ));
    assert!(
      cfg
        .closure()
        .expect("closure")
        .weekdays()
        .is_empty()
    );
  }
}
