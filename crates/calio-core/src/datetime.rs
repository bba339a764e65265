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
  TimeDelta,
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
use thiserror::Error;

const TIMEZONE_CONFIG_FILE: &str =
  "calio-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "CALIO_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "CALIO_TIME_CONFIG";
const DEFAULT_PROJECT_TIMEZONE: &str =
  "Asia/Seoul";

const DATE_KEY_FORMAT: &str =
  "%Y-%m-%d";

/// Canonical `YYYY-MM-DD` identity of a
/// calendar day. Two keys are equal iff
/// their string forms are equal.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord
)]
pub struct DateKey(NaiveDate);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateKeyError {
  #[error(
    "expected YYYY-MM-DD, got {0:?}"
  )]
  Malformed(String),

  #[error("no such calendar day: {0}")]
  InvalidDate(String)
}

impl DateKey {
  #[must_use]
  pub fn new(date: NaiveDate) -> Self {
    Self(date)
  }

  #[must_use]
  pub fn date(self) -> NaiveDate {
    self.0
  }
}

impl From<NaiveDate> for DateKey {
  fn from(date: NaiveDate) -> Self {
    Self(date)
  }
}

impl fmt::Display for DateKey {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{:04}-{:02}-{:02}",
      self.0.year(),
      self.0.month(),
      self.0.day()
    )
  }
}

impl FromStr for DateKey {
  type Err = DateKeyError;

  fn from_str(
    raw: &str
  ) -> Result<Self, Self::Err> {
    let token = raw.trim();
    let shaped = token.len() == 10
      && token.char_indices().all(
        |(idx, ch)| match idx {
          | 4 | 7 => ch == '-',
          | _ => ch.is_ascii_digit()
        }
      );
    if !shaped {
      return Err(
        DateKeyError::Malformed(
          token.to_string()
        )
      );
    }

    NaiveDate::parse_from_str(
      token,
      DATE_KEY_FORMAT
    )
    .map(Self)
    .map_err(|_| {
      DateKeyError::InvalidDate(
        token.to_string()
      )
    })
  }
}

impl Serialize for DateKey {
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

impl<'de> Deserialize<'de> for DateKey {
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
      .parse()
      .map_err(serde::de::Error::custom)
  }
}

/// Inclusive span of calendar days.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct DateRange {
  pub start: DateKey,
  pub end:   DateKey
}

impl DateRange {
  /// Builds a range, swapping the
  /// bounds when given in reverse.
  #[must_use]
  pub fn new(
    start: DateKey,
    end: DateKey
  ) -> Self {
    if start <= end {
      Self { start, end }
    } else {
      Self {
        start: end,
        end:   start
      }
    }
  }

  #[must_use]
  pub fn single(day: DateKey) -> Self {
    Self {
      start: day,
      end:   day
    }
  }

  #[must_use]
  pub fn contains(
    &self,
    key: DateKey
  ) -> bool {
    self.start <= key && key <= self.end
  }
}

impl fmt::Display for DateRange {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{}..{}",
      self.start, self.end
    )
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

pub fn project_timezone() -> &'static Tz
{
  static PROJECT_TZ: OnceLock<Tz> =
    OnceLock::new();
  PROJECT_TZ.get_or_init(
    resolve_project_timezone
  )
}

/// The calendar day `now` falls on in
/// the project timezone.
#[must_use]
pub fn today(
  now: DateTime<Utc>
) -> NaiveDate {
  now
    .with_timezone(project_timezone())
    .date_naive()
}

fn resolve_project_timezone() -> Tz {
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
    DEFAULT_PROJECT_TIMEZONE,
    "DEFAULT_PROJECT_TIMEZONE"
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
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured project timezone"
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

/// Rolls an arbitrary zero-based month
/// index into `(year, 0..=11)`.
#[must_use]
pub fn normalize_month(
  year: i32,
  month0: i32
) -> (i32, u32) {
  let carry = month0.div_euclid(12);
  let month0 =
    month0.rem_euclid(12) as u32;
  (year.saturating_add(carry), month0)
}

#[must_use]
pub fn add_months(
  year: i32,
  month0: u32,
  delta: i32
) -> (i32, u32) {
  normalize_month(
    year,
    (month0 as i32).saturating_add(delta)
  )
}

#[must_use]
pub fn month_title(
  year: i32,
  month0: u32
) -> String {
  format!("{year}년 {}월", month0 + 1)
}

#[must_use]
pub fn first_day_of_month(
  year: i32,
  month0: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year,
    month0 + 1,
    1
  )
  .unwrap_or(NaiveDate::MIN)
}

#[must_use]
pub fn last_day_of_month(
  year: i32,
  month0: u32
) -> NaiveDate {
  let (next_year, next_month0) =
    add_months(year, month0, 1);
  first_day_of_month(
    next_year,
    next_month0
  )
  .pred_opt()
  .unwrap_or(NaiveDate::MAX)
}

/// Steps `date` by `days`, or `None`
/// past the representable range.
#[must_use]
pub fn checked_add_days(
  date: NaiveDate,
  days: i64
) -> Option<NaiveDate> {
  TimeDelta::try_days(days).and_then(
    |delta| {
      date.checked_add_signed(delta)
    }
  )
}

/// Like [`checked_add_days`], keeping
/// `date` when the step overflows.
#[must_use]
pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  checked_add_days(date, days)
    .unwrap_or(date)
}

/// Parses a day expression relative to
/// `now` in the project timezone.
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  now: DateTime<Utc>
) -> anyhow::Result<DateKey> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  let local_today = today(now);

  match lower.as_str() {
    | "today" | "now" => {
      return Ok(local_today.into());
    }
    | "tomorrow" => {
      return Ok(
        add_days(local_today, 1).into()
      );
    }
    | "yesterday" => {
      return Ok(
        add_days(local_today, -1).into()
      );
    }
    | _ => {}
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(
      next_weekday_date(
        local_today,
        target_weekday
      )
      .into()
    );
  }

  let rel_re = Regex::new(
    r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dwm])$"
  )
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
    let unit = caps
      .name("unit")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative unit")
      })?;
    let num =
      if sign == "-" { -num } else { num };

    let shifted = match unit {
      | "d" => {
        shift_days(local_today, num, token)?
      }
      | "w" => {
        let days = num
          .checked_mul(7)
          .ok_or_else(|| {
            anyhow!(
              "relative date out of \
               range: {token}"
            )
          })?;
        shift_days(local_today, days, token)?
      }
      | "m" => {
        shift_months_clamped(
          local_today,
          num
        )?
      }
      | _ => {
        return Err(anyhow!(
          "unknown relative unit: \
           {unit}"
        ))
      }
    };
    return Ok(shifted.into());
  }

  if let Ok(key) = token.parse::<DateKey>()
  {
    return Ok(key);
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     today/tomorrow/yesterday, weekday \
     names (e.g. monday), +Nd/+Nw/+Nm, \
     YYYY-MM-DD"
  })
}

/// Parses a month selector: `YYYY-MM`,
/// or any day expression (its month).
pub fn parse_month_expr(
  input: &str,
  now: DateTime<Utc>
) -> anyhow::Result<(i32, u32)> {
  let token = input.trim();
  if let Some((year, month)) =
    token.split_once('-')
    && year.len() == 4
    && month.len() == 2
  {
    let year: i32 = year
      .parse()
      .with_context(|| {
        format!("invalid year in {token}")
      })?;
    let month: u32 = month
      .parse()
      .with_context(|| {
        format!(
          "invalid month in {token}"
        )
      })?;
    if !(1..=12).contains(&month) {
      return Err(anyhow!(
        "month out of range in {token}"
      ));
    }
    return Ok((year, month - 1));
  }

  let day =
    parse_date_expr(token, now)?.date();
  Ok((day.year(), day.month0()))
}

fn shift_days(
  from: NaiveDate,
  days: i64,
  token: &str
) -> anyhow::Result<NaiveDate> {
  checked_add_days(from, days)
    .ok_or_else(|| {
      anyhow!(
        "relative date out of range: \
         {token}"
      )
    })
}

fn shift_months_clamped(
  from: NaiveDate,
  months: i64
) -> anyhow::Result<NaiveDate> {
  let delta = i32::try_from(months)
    .context("relative month too large")?;
  let (year, month0) = add_months(
    from.year(),
    from.month0(),
    delta
  );
  let last =
    last_day_of_month(year, month0);
  Ok(
    NaiveDate::from_ymd_opt(
      year,
      month0 + 1,
      from.day().min(last.day())
    )
    .unwrap_or(last)
  )
}

fn parse_weekday_name(
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
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
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
  add_days(from, delta)
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    DateKey,
    DateKeyError,
    DateRange,
    add_days,
    add_months,
    checked_add_days,
    last_day_of_month,
    month_title,
    normalize_month,
    parse_date_expr,
    parse_month_expr
  };

  fn noon(
    y: i32,
    m: u32,
    d: u32
  ) -> chrono::DateTime<Utc> {
    // noon UTC keeps the project day
    // equal to the UTC day.
    Utc
      .with_ymd_and_hms(y, m, d, 12, 0, 0)
      .single()
      .expect("valid now")
  }

  #[test]
  fn date_key_round_trips_canonical_form()
  {
    let key: DateKey = "2024-02-29"
      .parse()
      .expect("leap day parses");
    assert_eq!(
      key.to_string(),
      "2024-02-29"
    );
    assert_eq!(
      key.date(),
      NaiveDate::from_ymd_opt(2024, 2, 29)
        .expect("valid date")
    );
  }

  #[test]
  fn date_key_rejects_sloppy_input() {
    assert!(matches!(
      "2024-2-1".parse::<DateKey>(),
      Err(DateKeyError::Malformed(_))
    ));
    assert!(matches!(
      "2023-02-29".parse::<DateKey>(),
      Err(DateKeyError::InvalidDate(_))
    ));
    assert!(
      "".parse::<DateKey>().is_err()
    );
  }

  #[test]
  fn date_key_serializes_as_string() {
    let key: DateKey = "2024-03-01"
      .parse()
      .expect("parse");
    let json = serde_json::to_string(&key)
      .expect("serialize");
    assert_eq!(json, "\"2024-03-01\"");
    let back: DateKey =
      serde_json::from_str(&json)
        .expect("deserialize");
    assert_eq!(back, key);
  }

  #[test]
  fn range_orders_bounds() {
    let a: DateKey =
      "2024-02-10".parse().expect("a");
    let b: DateKey =
      "2024-02-01".parse().expect("b");
    let range = DateRange::new(a, b);
    assert_eq!(range.start, b);
    assert!(range.contains(a));
    assert!(!range.contains(
      "2024-02-11".parse().expect("c")
    ));
  }

  #[test]
  fn month_rollover() {
    assert_eq!(
      normalize_month(2024, 12),
      (2025, 0)
    );
    assert_eq!(
      normalize_month(2024, -1),
      (2023, 11)
    );
    assert_eq!(
      normalize_month(2024, 25),
      (2026, 1)
    );
    assert_eq!(
      add_months(2024, 0, -1),
      (2023, 11)
    );
    assert_eq!(
      month_title(2024, 1),
      "2024년 2월"
    );
    assert_eq!(
      last_day_of_month(2024, 1)
        .to_string(),
      "2024-02-29"
    );
    assert_eq!(
      last_day_of_month(2023, 11)
        .to_string(),
      "2023-12-31"
    );
  }

  #[test]
  fn parses_relative_and_named_days() {
    // 2026-02-17 is a Tuesday.
    let now = noon(2026, 2, 17);
    let parse = |expr: &str| {
      parse_date_expr(expr, now)
        .expect("parse")
        .to_string()
    };
    assert_eq!(
      parse("tomorrow"),
      "2026-02-18"
    );
    assert_eq!(
      parse("wednesday"),
      "2026-02-18"
    );
    assert_eq!(
      parse("tuesday"),
      "2026-02-24"
    );
    assert_eq!(parse("+3d"), "2026-02-20");
    assert_eq!(parse("-1w"), "2026-02-10");
    assert_eq!(
      parse("2024-01-31"),
      "2024-01-31"
    );
    assert!(
      parse_date_expr("someday", now)
        .is_err()
    );
  }

  #[test]
  fn oversized_offsets_are_errors() {
    let now = noon(2024, 2, 14);
    for expr in [
      "+999999999999d",
      "-999999999999d",
      "+9223372036854775807w",
      "+99999999999999999999d"
    ] {
      assert!(
        parse_date_expr(expr, now)
          .is_err(),
        "{expr} should be rejected"
      );
    }

    let day = NaiveDate::from_ymd_opt(
      2024, 2, 14
    )
    .expect("valid date");
    assert_eq!(
      checked_add_days(day, i64::MAX),
      None
    );
    assert_eq!(
      add_days(day, i64::MAX),
      day
    );
  }

  #[test]
  fn relative_months_clamp_to_month_end()
  {
    let now = noon(2024, 1, 31);
    assert_eq!(
      parse_date_expr("+1m", now)
        .expect("parse")
        .to_string(),
      "2024-02-29"
    );
  }

  #[test]
  fn parses_month_selectors() {
    let now = noon(2026, 2, 17);
    assert_eq!(
      parse_month_expr("2024-02", now)
        .expect("parse"),
      (2024, 1)
    );
    assert_eq!(
      parse_month_expr("today", now)
        .expect("parse"),
      (2026, 1)
    );
    assert!(
      parse_month_expr("2024-13", now)
        .is_err()
    );
  }
}
