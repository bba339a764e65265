//! Lunar (East Asian lunisolar) labels shown next to solar dates.
//!
//! Conversion sits behind [`LunarCalendar`] so another converter can be
//! swapped in. Labels are decorative: every failure renders as an empty
//! string.

pub mod table;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::datetime::{DateKey, DateKeyError, first_day_of_month, last_day_of_month, normalize_month};

pub use table::TableLunarCalendar;

pub const DEFAULT_LEAP_PREFIX: &str = "윤";

const HEAVENLY_STEMS: [&str; 10] = ["갑", "을", "병", "정", "무", "기", "경", "신", "임", "계"];
const EARTHLY_BRANCHES: [&str; 12] = [
    "자", "축", "인", "묘", "진", "사", "오", "미", "신", "유", "술", "해",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LunarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub is_leap_month: bool,
}

impl LunarDate {
    #[must_use]
    pub fn new(year: i32, month: u32, day: u32, is_leap_month: bool) -> Self {
        Self {
            year,
            month,
            day,
            is_leap_month,
        }
    }

    /// Sexagenary name of the lunar year, e.g. `갑진` for 2024.
    #[must_use]
    pub fn cycle_name(&self) -> String {
        let idx = self.year - 4;
        format!(
            "{}{}",
            HEAVENLY_STEMS[idx.rem_euclid(10) as usize],
            EARTHLY_BRANCHES[idx.rem_euclid(12) as usize]
        )
    }
}

#[derive(Debug, Error)]
pub enum LunarError {
    #[error("invalid solar date: {0}")]
    InvalidSolarDate(#[from] DateKeyError),

    #[error("{0} is outside the supported lunar calendar range")]
    OutOfRange(NaiveDate),
}

/// Solar to lunar conversion capability.
pub trait LunarCalendar {
    fn solar_to_lunar(&self, date: NaiveDate) -> Result<LunarDate, LunarError>;
}

/// Formats lunar labels with a given converter and leap-month marker.
#[derive(Debug, Clone)]
pub struct LunarLabeler<C = TableLunarCalendar> {
    calendar: C,
    leap_prefix: String,
}

impl Default for LunarLabeler {
    fn default() -> Self {
        Self::new(TableLunarCalendar, DEFAULT_LEAP_PREFIX)
    }
}

impl LunarLabeler {
    pub fn from_config(cfg: &Config) -> Self {
        let prefix = cfg
            .get("lunar.leap_prefix")
            .unwrap_or_else(|| DEFAULT_LEAP_PREFIX.to_string());
        Self::new(TableLunarCalendar, prefix)
    }
}

impl<C: LunarCalendar> LunarLabeler<C> {
    pub fn new(calendar: C, leap_prefix: impl Into<String>) -> Self {
        Self {
            calendar,
            leap_prefix: leap_prefix.into(),
        }
    }

    pub fn convert_key(&self, solar_key: &str) -> Result<LunarDate, LunarError> {
        let key: DateKey = solar_key.parse()?;
        self.calendar.solar_to_lunar(key.date())
    }

    /// Long form, e.g. `2024(갑진)년 1월 1일`.
    pub fn label(&self, solar_key: &str) -> String {
        self.render(solar_key, self.convert_key(solar_key), |lunar| {
            format!(
                "{}({})년 {}월 {}일",
                lunar.year,
                lunar.cycle_name(),
                self.month_text(lunar),
                lunar.day
            )
        })
    }

    /// Cell form: the lunar day, or `month/day` on the first of a lunar month.
    pub fn short_label(&self, solar_key: &str) -> String {
        self.render(solar_key, self.convert_key(solar_key), |lunar| self.short_text(lunar))
    }

    pub fn short_label_for(&self, date: NaiveDate) -> String {
        self.render(date, self.calendar.solar_to_lunar(date), |lunar| self.short_text(lunar))
    }

    /// Lunar months covered by a solar month, e.g. `음력 12월 - 1월`.
    pub fn month_range_label(&self, year: i32, month0: i32) -> String {
        let (year, month0) = normalize_month(year, month0);
        let first = self
            .calendar
            .solar_to_lunar(first_day_of_month(year, month0));
        let last = self
            .calendar
            .solar_to_lunar(last_day_of_month(year, month0));

        match (first, last) {
            (Ok(first), Ok(last)) if first.month == last.month => {
                format!("음력 {}월", first.month)
            }
            (Ok(first), Ok(last)) => format!("음력 {}월 - {}월", first.month, last.month),
            (Err(err), _) | (_, Err(err)) => {
                debug!(year, month = month0 + 1, error = %err, "lunar month range unavailable");
                String::new()
            }
        }
    }

    fn month_text(&self, lunar: &LunarDate) -> String {
        if lunar.is_leap_month {
            format!("{}{}", self.leap_prefix, lunar.month)
        } else {
            lunar.month.to_string()
        }
    }

    fn short_text(&self, lunar: &LunarDate) -> String {
        if lunar.day == 1 {
            format!("{}/{}", self.month_text(lunar), lunar.day)
        } else {
            lunar.day.to_string()
        }
    }

    fn render(
        &self,
        solar: impl std::fmt::Display,
        converted: Result<LunarDate, LunarError>,
        format: impl FnOnce(&LunarDate) -> String,
    ) -> String {
        match converted {
            Ok(lunar) => format(&lunar),
            Err(err) => {
                debug!(solar = %solar, error = %err, "lunar label unavailable");
                String::new()
            }
        }
    }
}

pub fn lunar_label(solar_key: &str) -> String {
    LunarLabeler::default().label(solar_key)
}

pub fn lunar_short_label(solar_key: &str) -> String {
    LunarLabeler::default().short_label(solar_key)
}

pub fn lunar_month_range_label(year: i32, month0: i32) -> String {
    LunarLabeler::default().month_range_label(year, month0)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        LunarCalendar, LunarDate, LunarError, LunarLabeler, lunar_label, lunar_month_range_label,
        lunar_short_label,
    };

    struct FixedCalendar(LunarDate);

    impl LunarCalendar for FixedCalendar {
        fn solar_to_lunar(&self, _date: NaiveDate) -> Result<LunarDate, LunarError> {
            Ok(self.0)
        }
    }

    #[test]
    fn short_label_marks_month_boundaries() {
        assert_eq!(lunar_short_label("2024-02-10"), "1/1");
        assert_eq!(lunar_short_label("2024-02-12"), "3");
        assert_eq!(lunar_short_label("2024-02-09"), "30");
        assert_eq!(lunar_short_label("2024-03-10"), "2/1");
    }

    #[test]
    fn leap_prefix_only_on_leap_months() {
        assert_eq!(lunar_short_label("2023-03-22"), "윤2/1");
        assert_eq!(lunar_short_label("2023-04-20"), "3/1");

        let labeler = LunarLabeler::new(super::TableLunarCalendar, "L");
        assert_eq!(labeler.short_label("2023-03-22"), "L2/1");
        assert_eq!(labeler.short_label("2023-03-23"), "2");
    }

    #[test]
    fn long_label_includes_cycle_year() {
        assert_eq!(lunar_label("2024-02-10"), "2024(갑진)년 1월 1일");
        assert_eq!(lunar_label("2023-03-22"), "2023(계묘)년 윤2월 1일");
        assert_eq!(lunar_label("2024-09-17"), "2024(갑진)년 8월 15일");
    }

    #[test]
    fn failures_render_empty() {
        assert_eq!(lunar_label("not-a-date"), "");
        assert_eq!(lunar_short_label("2024-02-30"), "");
        assert_eq!(lunar_short_label("1800-01-01"), "");
        assert_eq!(lunar_month_range_label(1800, 0), "");
    }

    #[test]
    fn month_range_spans_lunar_months() {
        // Feb 2024 runs from lunar 12/22 to 1/20.
        assert_eq!(lunar_month_range_label(2024, 1), "음력 12월 - 1월");
        // Rolls over like the grid does.
        assert_eq!(lunar_month_range_label(2023, 13), "음력 12월 - 1월");
    }

    #[test]
    fn swappable_converter() {
        let labeler = LunarLabeler::new(FixedCalendar(LunarDate::new(2000, 7, 1, true)), "*");
        assert_eq!(labeler.short_label("2024-01-01"), "*7/1");
        assert_eq!(labeler.label("2024-01-01"), "2000(경진)년 *7월 1일");
        assert_eq!(labeler.short_label("garbage"), "");
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).expect("valid date");
        assert_eq!(labeler.short_label_for(date), "*7/1");
    }
}
