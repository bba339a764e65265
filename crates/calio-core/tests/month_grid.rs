use calio_core::datetime::{DateKey, add_months};
use calio_core::{WeekStart, build_month_grid, lunar_short_label};
use chrono::{Datelike, NaiveDate};

#[test]
fn every_grid_is_six_aligned_weeks() {
    for week_start in [WeekStart::Monday, WeekStart::Sunday] {
        for year in 1950..=2060 {
            for month0 in 0..12 {
                let grid = build_month_grid(year, month0, week_start);
                let cells = grid.cells();

                assert_eq!(cells.len(), 42, "{year}-{month0} {week_start}");
                assert_eq!(cells[0].date.weekday(), week_start.weekday());

                for pair in cells.windows(2) {
                    assert_eq!(pair[0].date.succ_opt(), Some(pair[1].date));
                }

                let first = NaiveDate::from_ymd_opt(year, month0 as u32 + 1, 1).expect("first day");
                let (next_year, next_month0) = add_months(year, month0 as u32, 1);
                let next = NaiveDate::from_ymd_opt(next_year, next_month0 + 1, 1).expect("next first");
                let days_in_month = (next - first).num_days() as usize;

                let current: Vec<_> = cells.iter().filter(|c| c.is_current_month).collect();
                assert_eq!(current.len(), days_in_month);
                assert_eq!(current[0].date, first);
                assert!(current.windows(2).all(|w| w[0].date.succ_opt() == Some(w[1].date)));

                for cell in cells {
                    assert_eq!(cell.key, DateKey::from(cell.date));
                    assert_eq!(cell.key.to_string().len(), 10);
                }
            }
        }
    }
}

#[test]
fn grid_keys_parse_back_to_their_dates() {
    let grid = build_month_grid(2024, 1, WeekStart::Monday);
    for cell in grid.cells() {
        let parsed: DateKey = cell.key.to_string().parse().expect("canonical key");
        assert_eq!(parsed.date(), cell.date);
    }
}

#[test]
fn lunar_labels_cover_every_visible_cell() {
    for month0 in 0..12 {
        let grid = build_month_grid(2025, month0, WeekStart::Sunday);
        for cell in grid.cells() {
            let label = lunar_short_label(&cell.key.to_string());
            assert!(!label.is_empty(), "missing lunar label for {}", cell.key);
        }
    }
}
