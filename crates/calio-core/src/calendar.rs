//! Month and day view models assembled from the grid, the day buckets and
//! lunar labels. Rendering lives in [`crate::render`].

use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::bucket::{DateBuckets, bucket_records};
use crate::config::Config;
use crate::datetime::{DateKey, month_title};
use crate::grid::{DayCell, MonthGrid};
use crate::lunar::{LunarCalendar, LunarLabeler};
use crate::model::{CalendarEvent, Category, DailyEntry, Task};

const ENTRY_FALLBACK: &str = "기록";
const EVENT_FALLBACK: &str = "약속/기념일";
const TASK_FALLBACK: &str = "테스크";

/// Per-cell chip limits, read from `calendar.*` settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipLimits {
    pub entries: usize,
    pub events: usize,
    pub tasks: usize,
    pub total: usize,
}

impl Default for ChipLimits {
    fn default() -> Self {
        Self {
            entries: 2,
            events: 1,
            tasks: 1,
            total: 3,
        }
    }
}

impl ChipLimits {
    pub fn from_config(cfg: &Config) -> Self {
        let defaults = Self::default();
        Self {
            entries: cfg.get_usize("calendar.entry_chips", defaults.entries),
            events: cfg.get_usize("calendar.event_chips", defaults.events),
            tasks: cfg.get_usize("calendar.task_chips", defaults.tasks),
            total: cfg.get_usize("calendar.max_chips", defaults.total),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipKind {
    Event,
    Task,
    Entry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chip {
    pub kind: ChipKind,
    pub id: Uuid,
    pub label: String,
    pub color_bg: Option<String>,
    pub color_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellView {
    pub cell: DayCell,
    pub lunar: String,
    pub is_today: bool,
    pub has_events: bool,
    pub has_pending_tasks: bool,
    pub chips: Vec<Chip>,
    /// The day holds more records than a cell has room for.
    pub overflow: bool,
}

impl CellView {
    pub fn day(&self) -> u32 {
        chrono::Datelike::day(&self.cell.date)
    }
}

#[derive(Debug, Clone)]
pub struct MonthView {
    pub grid: MonthGrid,
    pub title: String,
    pub lunar_range: String,
    pub cells: Vec<CellView>,
}

impl MonthView {
    pub fn weeks(&self) -> impl Iterator<Item = &[CellView]> {
        self.cells.chunks(crate::grid::DAYS_PER_WEEK)
    }
}

/// Records fetched for one visible window.
#[derive(Debug, Clone, Default)]
pub struct MonthRecords {
    pub entries: Vec<DailyEntry>,
    pub events: Vec<CalendarEvent>,
    pub tasks: Vec<Task>,
    pub categories: Vec<Category>,
}

/// Builds the month view. `labeler` is `None` when lunar labels are off.
#[tracing::instrument(skip_all, fields(year = grid.year(), month0 = grid.month0()))]
pub fn build_month_view<C: LunarCalendar>(
    grid: MonthGrid,
    records: &MonthRecords,
    labeler: Option<&LunarLabeler<C>>,
    today: NaiveDate,
    limits: ChipLimits,
) -> MonthView {
    let categories: HashMap<Uuid, &Category> =
        records.categories.iter().map(|c| (c.id, c)).collect();
    let entries = bucket_records(&records.entries);
    let events = bucket_records(&records.events);
    let tasks = bucket_records(&records.tasks);

    let cells = grid
        .cells()
        .iter()
        .map(|cell| {
            build_cell(
                *cell,
                &entries,
                &events,
                &tasks,
                &categories,
                labeler,
                today,
                limits,
            )
        })
        .collect();

    let lunar_range = labeler
        .map(|labeler| labeler.month_range_label(grid.year(), grid.month0() as i32))
        .unwrap_or_default();

    MonthView {
        title: month_title(grid.year(), grid.month0()),
        lunar_range,
        grid,
        cells,
    }
}

#[allow(clippy::too_many_arguments)]
fn build_cell<C: LunarCalendar>(
    cell: DayCell,
    entries: &DateBuckets<&DailyEntry>,
    events: &DateBuckets<&CalendarEvent>,
    tasks: &DateBuckets<&Task>,
    categories: &HashMap<Uuid, &Category>,
    labeler: Option<&LunarLabeler<C>>,
    today: NaiveDate,
    limits: ChipLimits,
) -> CellView {
    let day_entries = entries.get(&cell.key);
    let day_events = events.get(&cell.key);
    let day_tasks = tasks.get(&cell.key);
    let pending: Vec<&Task> = day_tasks.iter().copied().filter(|t| !t.is_done).collect();

    let event_chips = day_events.iter().take(limits.events).map(|ev| Chip {
        kind: ChipKind::Event,
        id: ev.id,
        label: label_or(Some(ev.title.as_str()), EVENT_FALLBACK),
        color_bg: None,
        color_text: None,
    });
    let task_chips = pending.iter().take(limits.tasks).map(|task| Chip {
        kind: ChipKind::Task,
        id: task.id,
        label: label_or(Some(task.title.as_str()), TASK_FALLBACK),
        color_bg: None,
        color_text: None,
    });
    let entry_chips = day_entries.iter().take(limits.entries).map(|entry| {
        let category = categories.get(&entry.category_id);
        let fallback = category.map_or(ENTRY_FALLBACK, |c| c.name.as_str());
        Chip {
            kind: ChipKind::Entry,
            id: entry.id,
            label: label_or(entry.title.as_deref(), fallback),
            color_bg: category.map(|c| c.color_bg.clone()),
            color_text: category.map(|c| c.color_text.clone()),
        }
    });

    let chips: Vec<Chip> = event_chips
        .chain(task_chips)
        .chain(entry_chips)
        .take(limits.total)
        .collect();
    let record_count = day_entries.len() + day_events.len() + day_tasks.len();

    CellView {
        cell,
        lunar: labeler
            .map(|labeler| labeler.short_label_for(cell.date))
            .unwrap_or_default(),
        is_today: cell.date == today,
        has_events: !day_events.is_empty(),
        has_pending_tasks: !pending.is_empty(),
        overflow: record_count > limits.total,
        chips,
    }
}

fn label_or(title: Option<&str>, fallback: &str) -> String {
    match title.map(str::trim) {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => fallback.to_string(),
    }
}

/// Everything shown for a single day.
#[derive(Debug, Clone)]
pub struct DayView {
    pub date: DateKey,
    pub lunar: String,
    pub entries: Vec<(DailyEntry, Option<Category>)>,
    pub events: Vec<CalendarEvent>,
    pub tasks: Vec<Task>,
}

#[tracing::instrument(skip_all, fields(date = %date))]
pub fn build_day_view<C: LunarCalendar>(
    date: DateKey,
    records: MonthRecords,
    labeler: Option<&LunarLabeler<C>>,
) -> DayView {
    let MonthRecords {
        entries,
        events,
        tasks,
        categories,
    } = records;

    let entries = entries
        .into_iter()
        .filter(|entry| entry.entry_date == date)
        .map(|entry| {
            let category = categories.iter().find(|c| c.id == entry.category_id).cloned();
            (entry, category)
        })
        .collect();

    DayView {
        date,
        lunar: labeler
            .map(|labeler| labeler.label(&date.to_string()))
            .unwrap_or_default(),
        entries,
        events: events.into_iter().filter(|ev| ev.solar_date == date).collect(),
        tasks: tasks
            .into_iter()
            .filter(|task| task.due_date == Some(date))
            .collect(),
    }
}
