use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Days,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::{
  Deserialize,
  Deserializer,
  Serialize,
  Serializer
};

const TIMEZONE_CONFIG_FILE: &str =
  "roomgrid-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "ROOMGRID_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "ROOMGRID_TIME_CONFIG";
const DEFAULT_PROPERTY_TIMEZONE: &str =
  "Europe/Istanbul";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A calendar day with no time-of-day
/// component. Text form is always
/// `YYYY-MM-DD`, independent of locale.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
)]
pub struct DateValue(NaiveDate);

impl DateValue {
  #[must_use]
  pub fn from_ymd(
    year: i32,
    month: u32,
    day: u32
  ) -> Option<Self> {
    NaiveDate::from_ymd_opt(
      year, month, day
    )
    .map(Self)
  }

  #[must_use]
  pub fn naive(self) -> NaiveDate {
    self.0
  }

  #[must_use]
  pub fn weekday(self) -> Weekday {
    self.0.weekday()
  }

  #[must_use]
  pub fn day(self) -> u32 {
    self.0.day()
  }

  /// The following calendar day, or
  /// `None` past the last representable
  /// date.
  #[must_use]
  pub fn succ(self) -> Option<Self> {
    self.0.succ_opt().map(Self)
  }

  #[must_use]
  pub fn add_days(
    self,
    days: i64
  ) -> Option<Self> {
    let magnitude = Days::new(
      days.unsigned_abs()
    );
    if days >= 0 {
      self
        .0
        .checked_add_days(magnitude)
        .map(Self)
    } else {
      self
        .0
        .checked_sub_days(magnitude)
        .map(Self)
    }
  }
}

impl From<NaiveDate> for DateValue {
  fn from(date: NaiveDate) -> Self {
    Self(date)
  }
}

impl fmt::Display for DateValue {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{}",
      self.0.format(DATE_FORMAT)
    )
  }
}

impl FromStr for DateValue {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let token = s.trim();
    let shape_ok = token.len() == 10
      && token.char_indices().all(
        |(idx, c)| match idx {
          | 4 | 7 => c == '-',
          | _ => c.is_ascii_digit()
        }
      );
    if !shape_ok {
      return Err(anyhow!(
        "expected YYYY-MM-DD, got: \
         {token}"
      ));
    }

    NaiveDate::parse_from_str(
      token,
      DATE_FORMAT
    )
    .map(Self)
    .with_context(|| {
      format!(
        "invalid calendar date: \
         {token}"
      )
    })
  }
}

impl Serialize for DateValue {
  fn serialize<S>(
    &self,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for DateValue {
  fn deserialize<D>(
    deserializer: D
  ) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    raw
      .parse::<DateValue>()
      .map_err(serde::de::Error::custom)
  }
}

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

pub fn property_timezone() -> &'static Tz
{
  static PROPERTY_TZ: OnceLock<Tz> =
    OnceLock::new();
  PROPERTY_TZ.get_or_init(
    resolve_property_timezone
  )
}

/// The calendar day `now` falls on at
/// the property.
#[must_use]
pub fn property_today(
  now: DateTime<Utc>
) -> DateValue {
  today_in(property_timezone(), now)
}

#[must_use]
pub fn today_in(
  tz: &Tz,
  now: DateTime<Utc>
) -> DateValue {
  DateValue(
    now.with_timezone(tz).date_naive()
  )
}

fn resolve_property_timezone() -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_PROPERTY_TIMEZONE,
    "DEFAULT_PROPERTY_TIMEZONE"
  )
  .unwrap_or_else(|| {
    tracing::error!(
      "failed to parse fallback \
       timezone; using UTC"
    );
    chrono_tz::UTC
  })
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured property timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Resolves a user-facing date
/// expression relative to `today`.
///
/// Accepts `today`, `tomorrow`,
/// `yesterday`, weekday names (next
/// occurrence after today), day offsets
/// such as `+3`, `-2d` or `today+7`, and
/// `YYYY-MM-DD`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: DateValue
) -> anyhow::Result<DateValue> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return shift(today, 1);
    }
    | "yesterday" => {
      return shift(today, -1);
    }
    | _ => {}
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today,
      target_weekday
    ));
  }

  static RELATIVE_RE: OnceLock<
    Result<Regex, regex::Error>
  > = OnceLock::new();
  let rel_re = RELATIVE_RE
    .get_or_init(|| {
      Regex::new(
        r"^(?:today)?\s*(?P<sign>[+-])\s*(?P<num>\d+)\s*d?$"
      )
    })
    .as_ref()
    .map_err(|e| {
      anyhow!(
        "internal regex compile \
         failure: {e}"
      )
    })?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let sign = caps
      .name("sign")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative sign")
      })?;
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;

    return shift(
      today,
      if sign == "-" { -num } else { num }
    );
  }

  token.parse::<DateValue>().with_context(
    || {
      "supported formats: \
       today/tomorrow/yesterday, \
       weekday names (e.g. monday), \
       day offsets (+3, -2d, \
       today+7), YYYY-MM-DD"
    }
  )
}

fn shift(
  date: DateValue,
  days: i64
) -> anyhow::Result<DateValue> {
  date.add_days(days).ok_or_else(|| {
    anyhow!(
      "date offset {days} from {date} \
       is out of range"
    )
  })
}

pub(crate) fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: DateValue,
  target: Weekday
) -> DateValue {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from.add_days(delta).unwrap_or(from)
}
