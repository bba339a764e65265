use chrono::NaiveDate;

use super::{LunarCalendar, LunarDate, LunarError};

const BASE_YEAR: i32 = 1900;

// Per lunar year from 1900: bits 4..=15 flag 30-day months (month 1 at bit 15),
// bits 0..=3 hold the leap month (0 = none), bit 16 flags a 30-day leap month.
#[rustfmt::skip]
const LUNAR_YEAR_INFO: [u32; 201] = [
    0x04bd8, 0x04ae0, 0x0a570, 0x054d5, 0x0d260, 0x0d950, 0x16554, 0x056a0, 0x09ad0, 0x055d2,
    0x04ae0, 0x0a5b6, 0x0a4d0, 0x0d250, 0x1d255, 0x0b540, 0x0d6a0, 0x0ada2, 0x095b0, 0x14977,
    0x04970, 0x0a4b0, 0x0b4b5, 0x06a50, 0x06d40, 0x1ab54, 0x02b60, 0x09570, 0x052f2, 0x04970,
    0x06566, 0x0d4a0, 0x0ea50, 0x16a95, 0x05ad0, 0x02b60, 0x186e3, 0x092e0, 0x1c8d7, 0x0c950,
    0x0d4a0, 0x1d8a6, 0x0b550, 0x056a0, 0x1a5b4, 0x025d0, 0x092d0, 0x0d2b2, 0x0a950, 0x0b557,
    0x06ca0, 0x0b550, 0x15355, 0x04da0, 0x0a5b0, 0x14573, 0x052b0, 0x0a9a8, 0x0e950, 0x06aa0,
    0x0aea6, 0x0ab50, 0x04b60, 0x0aae4, 0x0a570, 0x05260, 0x0f263, 0x0d950, 0x05b57, 0x056a0,
    0x096d0, 0x04dd5, 0x04ad0, 0x0a4d0, 0x0d4d4, 0x0d250, 0x0d558, 0x0b540, 0x0b6a0, 0x195a6,
    0x095b0, 0x049b0, 0x0a974, 0x0a4b0, 0x0b27a, 0x06a50, 0x06d40, 0x0af46, 0x0ab60, 0x09570,
    0x04af5, 0x04970, 0x064b0, 0x074a3, 0x0ea50, 0x06b58, 0x05ac0, 0x0ab60, 0x096d5, 0x092e0,
    0x0c960, 0x0d954, 0x0d4a0, 0x0da50, 0x07552, 0x056a0, 0x0abb7, 0x025d0, 0x092d0, 0x0cab5,
    0x0a950, 0x0b4a0, 0x0baa4, 0x0ad50, 0x055d9, 0x04ba0, 0x0a5b0, 0x15176, 0x052b0, 0x0a930,
    0x07954, 0x06aa0, 0x0ad50, 0x05b52, 0x04b60, 0x0a6e6, 0x0a4e0, 0x0d260, 0x0ea65, 0x0d530,
    0x05aa0, 0x076a3, 0x096d0, 0x04afb, 0x04ad0, 0x0a4d0, 0x1d0b6, 0x0d250, 0x0d520, 0x0dd45,
    0x0b5a0, 0x056d0, 0x055b2, 0x049b0, 0x0a577, 0x0a4b0, 0x0aa50, 0x1b255, 0x06d20, 0x0ada0,
    0x14b63, 0x09370, 0x049f8, 0x04970, 0x064b0, 0x168a6, 0x0ea50, 0x06b20, 0x1a6c4, 0x0aae0,
    0x092e0, 0x0d2e3, 0x0c960, 0x0d557, 0x0d4a0, 0x0da50, 0x05d55, 0x056a0, 0x0a6d0, 0x055d4,
    0x052d0, 0x0a9b8, 0x0a950, 0x0b4a0, 0x0b6a6, 0x0ad50, 0x055a0, 0x0aba4, 0x0a5b0, 0x052b0,
    0x0b273, 0x06930, 0x07337, 0x06aa0, 0x0ad50, 0x14b55, 0x04b60, 0x0a570, 0x054e4, 0x0d160,
    0x0e968, 0x0d520, 0x0daa0, 0x16aa6, 0x056d0, 0x04ae0, 0x0a9d4, 0x0a2d0, 0x0d150, 0x0f252,
    0x0d520,];

/// Chinese lunisolar conversion backed by the 1900-2100 month table.
///
/// Lunar 1900-01-01 falls on solar 1900-01-31; dates before that, or past the
/// end of lunar year 2100, are out of range.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableLunarCalendar;

impl TableLunarCalendar {
    fn epoch() -> NaiveDate {
        NaiveDate::from_ymd_opt(BASE_YEAR, 1, 31).unwrap_or(NaiveDate::MIN)
    }

    #[must_use]
    pub fn first_supported() -> NaiveDate {
        Self::epoch()
    }
}

impl LunarCalendar for TableLunarCalendar {
    fn solar_to_lunar(&self, date: NaiveDate) -> Result<LunarDate, LunarError> {
        let mut offset = date.signed_duration_since(Self::epoch()).num_days();
        if offset < 0 {
            return Err(LunarError::OutOfRange(date));
        }

        for (idx, info) in LUNAR_YEAR_INFO.iter().copied().enumerate() {
            let days = i64::from(year_days(info));
            if offset >= days {
                offset -= days;
                continue;
            }

            let year = BASE_YEAR + idx as i32;
            let leap = leap_month(info);
            for month in 1..=12 {
                let days = i64::from(month_days(info, month));
                if offset < days {
                    return Ok(LunarDate::new(year, month, offset as u32 + 1, false));
                }
                offset -= days;

                if month == leap {
                    let days = i64::from(leap_days(info));
                    if offset < days {
                        return Ok(LunarDate::new(year, month, offset as u32 + 1, true));
                    }
                    offset -= days;
                }
            }
            break;
        }

        Err(LunarError::OutOfRange(date))
    }
}

fn leap_month(info: u32) -> u32 {
    info & 0xf
}

fn leap_days(info: u32) -> u32 {
    match (leap_month(info), info & 0x10000) {
        (0, _) => 0,
        (_, 0) => 29,
        _ => 30,
    }
}

fn month_days(info: u32, month: u32) -> u32 {
    if info & (0x10000 >> month) == 0 { 29 } else { 30 }
}

fn year_days(info: u32) -> u32 {
    let long_months = (info >> 4 & 0xfff).count_ones();
    348 + long_months + leap_days(info)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{LUNAR_YEAR_INFO, TableLunarCalendar, year_days};
    use crate::lunar::{LunarCalendar, LunarDate, LunarError};

    fn lunar(y: i32, m: u32, d: u32) -> Result<LunarDate, LunarError> {
        let date = NaiveDate::from_ymd_opt(y, m, d).expect("valid solar date");
        TableLunarCalendar.solar_to_lunar(date)
    }

    #[test]
    fn new_year_days_land_on_first_of_first_month() {
        for (y, m, d) in [
            (1950, 2, 17),
            (1990, 1, 27),
            (2000, 2, 5),
            (2020, 1, 25),
            (2023, 1, 22),
            (2024, 2, 10),
            (2025, 1, 29),
            (2026, 2, 17),
        ] {
            let got = lunar(y, m, d).expect("in range");
            assert_eq!(got, LunarDate::new(y, 1, 1, false), "{y}-{m}-{d}");
        }
    }

    #[test]
    fn leap_months_are_flagged() {
        assert_eq!(lunar(2023, 3, 22).expect("range"), LunarDate::new(2023, 2, 1, true));
        assert_eq!(lunar(2023, 4, 19).expect("range"), LunarDate::new(2023, 2, 29, true));
        assert_eq!(lunar(2023, 4, 20).expect("range"), LunarDate::new(2023, 3, 1, false));
        assert_eq!(lunar(2025, 7, 25).expect("range"), LunarDate::new(2025, 6, 1, true));
    }

    #[test]
    fn year_end_and_mid_autumn() {
        assert_eq!(lunar(2024, 2, 9).expect("range"), LunarDate::new(2023, 12, 30, false));
        assert_eq!(lunar(2024, 9, 17).expect("range"), LunarDate::new(2024, 8, 15, false));
    }

    #[test]
    fn table_bounds() {
        assert_eq!(lunar(1900, 1, 31).expect("epoch"), LunarDate::new(1900, 1, 1, false));
        assert!(matches!(lunar(1900, 1, 30), Err(LunarError::OutOfRange(_))));
        assert!(lunar(2100, 12, 31).is_ok());
        assert!(matches!(lunar(2101, 1, 29), Err(LunarError::OutOfRange(_))));
    }

    #[test]
    fn leap_year_lengths() {
        // 2023 carries a 29-day leap second month.
        assert_eq!(year_days(LUNAR_YEAR_INFO[123]), 384);
        assert_eq!(year_days(LUNAR_YEAR_INFO[124]), 354);
    }
}
