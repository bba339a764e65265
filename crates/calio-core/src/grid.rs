//! Fixed six-week month grid.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::datetime::{DateKey, DateRange, add_days, first_day_of_month, normalize_month};

pub const GRID_DAYS: usize = 42;
pub const DAYS_PER_WEEK: usize = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    Sunday,
    #[default]
    Monday,
}

impl WeekStart {
    #[must_use]
    pub fn weekday(self) -> Weekday {
        match self {
            Self::Sunday => Weekday::Sun,
            Self::Monday => Weekday::Mon,
        }
    }

    /// Reads `week.start`; anything but `sunday` means Monday.
    pub fn from_config(cfg: &Config) -> Self {
        cfg.get("week.start")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    /// Days to step back from a date on `weekday` to reach the week start.
    #[must_use]
    pub fn offset_of(self, weekday: Weekday) -> u32 {
        let dow = weekday.num_days_from_sunday();
        match self {
            Self::Sunday => dow,
            Self::Monday => (dow + 6) % 7,
        }
    }
}

impl FromStr for WeekStart {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sunday" | "sun" => Ok(Self::Sunday),
            "monday" | "mon" => Ok(Self::Monday),
            other => Err(anyhow!("invalid week start: {other} (expected monday or sunday)")),
        }
    }
}

impl fmt::Display for WeekStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sunday => f.write_str("sunday"),
            Self::Monday => f.write_str("monday"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub is_current_month: bool,
    pub key: DateKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    year: i32,
    month0: u32,
    week_start: WeekStart,
    cells: Vec<DayCell>,
}

impl MonthGrid {
    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    #[must_use]
    pub fn month0(&self) -> u32 {
        self.month0
    }

    #[must_use]
    pub fn week_start(&self) -> WeekStart {
        self.week_start
    }

    #[must_use]
    pub fn cells(&self) -> &[DayCell] {
        &self.cells
    }

    pub fn weeks(&self) -> impl Iterator<Item = &[DayCell]> {
        self.cells.chunks(DAYS_PER_WEEK)
    }

    /// First through last visible day, the window to fetch records for.
    #[must_use]
    pub fn visible_range(&self) -> DateRange {
        let first = self.cells.first().map(|cell| cell.key);
        let last = self.cells.last().map(|cell| cell.key);
        match (first, last) {
            (Some(first), Some(last)) => DateRange::new(first, last),
            _ => DateRange::single(first_day_of_month(self.year, self.month0).into()),
        }
    }

    #[must_use]
    pub fn current_month_days(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_current_month).count()
    }
}

/// Builds the 42-day grid for `month0` (0 = January) of `year`.
///
/// Out-of-range months roll over into neighbouring years.
#[must_use]
pub fn build_month_grid(year: i32, month0: i32, week_start: WeekStart) -> MonthGrid {
    let (year, month0) = normalize_month(year, month0);
    let first = first_day_of_month(year, month0);
    let offset = week_start.offset_of(first.weekday());
    let start = add_days(first, -i64::from(offset));

    let cells = start
        .iter_days()
        .take(GRID_DAYS)
        .map(|date| DayCell {
            date,
            is_current_month: date.month0() == month0,
            key: date.into(),
        })
        .collect();

    MonthGrid {
        year,
        month0,
        week_start,
        cells,
    }
}

#[must_use]
pub fn weekday_labels(week_start: WeekStart) -> [&'static str; 7] {
    match week_start {
        WeekStart::Sunday => ["일", "월", "화", "수", "목", "금", "토"],
        WeekStart::Monday => ["월", "화", "수", "목", "금", "토", "일"],
    }
}
