use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bucket::Dated;
use crate::datetime::DateKey;

pub const DEFAULT_CATEGORY_BG: &str = "#E9D5FF";
pub const DEFAULT_CATEGORY_TEXT: &str = "#111827";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub color_bg: String,
    pub color_text: String,
    #[serde(default)]
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub entry_date: DateKey,
    pub occurred_at: DateTime<Utc>,
    pub category_id: Uuid,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Appointment,
    Anniversary,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CalendarKind {
    #[default]
    Solar,
    LunarKr,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_type: EventType,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub calendar_kind: CalendarKind,
    #[serde(default)]
    pub is_recurring_yearly: bool,
    pub solar_date: DateKey,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    pub is_all_day: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateKey>,
    #[serde(default)]
    pub is_done: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Dated for DailyEntry {
    fn date_key(&self) -> Option<DateKey> {
        Some(self.entry_date)
    }
}

impl Dated for CalendarEvent {
    fn date_key(&self) -> Option<DateKey> {
        Some(self.solar_date)
    }
}

impl Dated for Task {
    fn date_key(&self) -> Option<DateKey> {
        self.due_date
    }
}

impl EventType {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Appointment => "약속",
            Self::Anniversary => "기념일",
        }
    }
}

impl FromStr for EventType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "appointment" | "appt" => Ok(Self::Appointment),
            "anniversary" | "anniv" => Ok(Self::Anniversary),
            other => Err(anyhow!("invalid event type: {other} (expected appointment or anniversary)")),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Appointment => "appointment",
            Self::Anniversary => "anniversary",
        })
    }
}

impl fmt::Display for CalendarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Solar => "solar",
            Self::LunarKr => "lunar_kr",
        })
    }
}

impl CalendarEvent {
    /// `HH:MM`, or `종일` for all-day events.
    #[must_use]
    pub fn time_label(&self) -> String {
        match (self.is_all_day, self.start_time) {
            (false, Some(time)) => time.format("%H:%M").to_string(),
            _ => "종일".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewCategory {
    pub name: String,
    pub color_bg: String,
    pub color_text: String,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub color_bg: Option<String>,
    pub color_text: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewEntry {
    pub entry_date: DateKey,
    pub category_id: Uuid,
    pub title: Option<String>,
    pub content: String,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub category_id: Option<Uuid>,
    pub title: Option<Option<String>>,
    pub content: Option<String>,
    pub entry_date: Option<DateKey>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: EventType,
    pub title: String,
    pub content: Option<String>,
    pub category_id: Option<Uuid>,
    pub calendar_kind: CalendarKind,
    pub is_recurring_yearly: bool,
    pub solar_date: DateKey,
    pub start_time: Option<NaiveTime>,
    pub is_all_day: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub event_type: Option<EventType>,
    pub title: Option<String>,
    pub content: Option<Option<String>>,
    pub category_id: Option<Option<Uuid>>,
    pub calendar_kind: Option<CalendarKind>,
    pub is_recurring_yearly: Option<bool>,
    pub solar_date: Option<DateKey>,
    pub start_time: Option<Option<NaiveTime>>,
    pub is_all_day: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub notes: Option<String>,
    pub due_date: Option<DateKey>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub notes: Option<Option<String>>,
    pub due_date: Option<Option<DateKey>>,
    pub is_done: Option<bool>,
}

/// Trims `raw`, mapping blank input to `None`.
#[must_use]
pub fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
