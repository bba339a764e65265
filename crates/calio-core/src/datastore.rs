use std::cmp::Ordering;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::datetime::DateRange;
use crate::model::{
    CalendarEvent, Category, CategoryPatch, DailyEntry, EntryPatch, EventPatch, NewCategory,
    NewEntry, NewEvent, NewTask, Task, TaskPatch,
};
use crate::session::Session;

/// Per-user record storage. Every call is scoped to `session.user_id`;
/// records owned by other users behave as missing.
pub trait Store {
    /// Active categories by `sort_order`, then creation time.
    fn fetch_categories(&self, session: &Session) -> anyhow::Result<Vec<Category>>;
    fn create_category(&self, session: &Session, input: NewCategory) -> anyhow::Result<Category>;
    fn update_category(
        &self,
        session: &Session,
        id: Uuid,
        patch: CategoryPatch,
    ) -> anyhow::Result<Category>;
    fn deactivate_category(&self, session: &Session, id: Uuid) -> anyhow::Result<Category>;

    /// Live entries dated within `range`, by `occurred_at`.
    fn fetch_entries_by_range(
        &self,
        session: &Session,
        range: DateRange,
    ) -> anyhow::Result<Vec<DailyEntry>>;
    fn fetch_entry(&self, session: &Session, id: Uuid) -> anyhow::Result<DailyEntry>;
    fn create_entry(&self, session: &Session, input: NewEntry) -> anyhow::Result<DailyEntry>;
    fn update_entry(
        &self,
        session: &Session,
        id: Uuid,
        patch: EntryPatch,
    ) -> anyhow::Result<DailyEntry>;
    fn delete_entry(&self, session: &Session, id: Uuid) -> anyhow::Result<()>;

    /// Live events within `range`, by date then start time (untimed last).
    fn fetch_events_by_range(
        &self,
        session: &Session,
        range: DateRange,
    ) -> anyhow::Result<Vec<CalendarEvent>>;
    fn fetch_event(&self, session: &Session, id: Uuid) -> anyhow::Result<CalendarEvent>;
    fn create_event(&self, session: &Session, input: NewEvent) -> anyhow::Result<CalendarEvent>;
    fn update_event(
        &self,
        session: &Session,
        id: Uuid,
        patch: EventPatch,
    ) -> anyhow::Result<CalendarEvent>;
    fn delete_event(&self, session: &Session, id: Uuid) -> anyhow::Result<()>;

    /// Live tasks due within `range` plus every unscheduled task, by due
    /// date (unscheduled last) then creation time.
    fn fetch_tasks_by_range(&self, session: &Session, range: DateRange)
    -> anyhow::Result<Vec<Task>>;
    fn fetch_task(&self, session: &Session, id: Uuid) -> anyhow::Result<Task>;
    fn create_task(&self, session: &Session, input: NewTask) -> anyhow::Result<Task>;
    fn update_task(&self, session: &Session, id: Uuid, patch: TaskPatch) -> anyhow::Result<Task>;
    fn delete_task(&self, session: &Session, id: Uuid) -> anyhow::Result<()>;
}

/// Line-delimited JSON files, one per collection, under a data directory.
#[derive(Debug)]
pub struct JsonlStore {
    pub data_dir: PathBuf,
    pub categories_path: PathBuf,
    pub entries_path: PathBuf,
    pub events_path: PathBuf,
    pub tasks_path: PathBuf,
}

impl JsonlStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let categories_path = data_dir.join("categories.data");
        let entries_path = data_dir.join("entries.data");
        let events_path = data_dir.join("events.data");
        let tasks_path = data_dir.join("tasks.data");

        for path in [&categories_path, &entries_path, &events_path, &tasks_path] {
            if !path.exists() {
                fs::write(path, "")
                    .with_context(|| format!("failed to create {}", path.display()))?;
            }
        }

        info!(
            data_dir = %data_dir.display(),
            categories = %categories_path.display(),
            entries = %entries_path.display(),
            events = %events_path.display(),
            tasks = %tasks_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            categories_path,
            entries_path,
            events_path,
            tasks_path,
        })
    }

    fn load_categories(&self) -> anyhow::Result<Vec<Category>> {
        load_jsonl(&self.categories_path).context("failed to load categories.data")
    }

    fn load_entries(&self) -> anyhow::Result<Vec<DailyEntry>> {
        load_jsonl(&self.entries_path).context("failed to load entries.data")
    }

    fn load_events(&self) -> anyhow::Result<Vec<CalendarEvent>> {
        load_jsonl(&self.events_path).context("failed to load events.data")
    }

    fn load_tasks(&self) -> anyhow::Result<Vec<Task>> {
        load_jsonl(&self.tasks_path).context("failed to load tasks.data")
    }

    /// Loads a collection, applies `edit` to the caller's live record `id`,
    /// saves, and returns the edited copy.
    fn modify<T, F>(
        &self,
        path: &Path,
        kind: &str,
        id: Uuid,
        owned_live: impl Fn(&T) -> bool,
        record_id: impl Fn(&T) -> Uuid,
        edit: F,
    ) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned + Clone,
        F: FnOnce(&mut T),
    {
        let mut records: Vec<T> = load_jsonl(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        let idx = records
            .iter()
            .position(|record| record_id(record) == id && owned_live(record))
            .ok_or_else(|| anyhow!("{kind} not found: {id}"))?;
        edit(&mut records[idx]);
        let updated = records[idx].clone();
        save_jsonl_atomic(path, &records)
            .with_context(|| format!("failed to save {}", path.display()))?;
        debug!(kind, %id, "updated record");
        Ok(updated)
    }

    fn append<T: Serialize>(&self, path: &Path, record: &T) -> anyhow::Result<()> {
        let mut file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let serialized = serde_json::to_string(record)?;
        writeln!(file, "{serialized}")
            .with_context(|| format!("failed to append to {}", path.display()))?;
        Ok(())
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

impl Store for JsonlStore {
    #[tracing::instrument(skip(self, session), fields(user = %session.user_id))]
    fn fetch_categories(&self, session: &Session) -> anyhow::Result<Vec<Category>> {
        let mut categories: Vec<Category> = self
            .load_categories()?
            .into_iter()
            .filter(|c| c.user_id == session.user_id && c.is_active)
            .collect();
        categories.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then(a.created_at.cmp(&b.created_at))
        });
        debug!(count = categories.len(), "fetched categories");
        Ok(categories)
    }

    #[tracing::instrument(skip(self, session, input), fields(user = %session.user_id))]
    fn create_category(&self, session: &Session, input: NewCategory) -> anyhow::Result<Category> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(anyhow!("category name cannot be empty"));
        }
        let stamp = now();
        let category = Category {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            name,
            color_bg: input.color_bg,
            color_text: input.color_text,
            sort_order: input.sort_order.unwrap_or(0),
            is_active: true,
            created_at: stamp,
            updated_at: stamp,
        };
        self.append(&self.categories_path, &category)?;
        info!(id = %category.id, name = %category.name, "created category");
        Ok(category)
    }

    #[tracing::instrument(skip(self, session, patch), fields(user = %session.user_id))]
    fn update_category(
        &self,
        session: &Session,
        id: Uuid,
        patch: CategoryPatch,
    ) -> anyhow::Result<Category> {
        let user_id = session.user_id;
        self.modify(
            &self.categories_path,
            "category",
            id,
            |c: &Category| c.user_id == user_id,
            |c| c.id,
            |c| {
                if let Some(name) = patch.name {
                    c.name = name;
                }
                if let Some(bg) = patch.color_bg {
                    c.color_bg = bg;
                }
                if let Some(fg) = patch.color_text {
                    c.color_text = fg;
                }
                if let Some(order) = patch.sort_order {
                    c.sort_order = order;
                }
                if let Some(active) = patch.is_active {
                    c.is_active = active;
                }
                c.updated_at = now();
            },
        )
    }

    fn deactivate_category(&self, session: &Session, id: Uuid) -> anyhow::Result<Category> {
        self.update_category(
            session,
            id,
            CategoryPatch {
                is_active: Some(false),
                ..CategoryPatch::default()
            },
        )
    }

    #[tracing::instrument(skip(self, session), fields(user = %session.user_id, range = %range))]
    fn fetch_entries_by_range(
        &self,
        session: &Session,
        range: DateRange,
    ) -> anyhow::Result<Vec<DailyEntry>> {
        let mut entries: Vec<DailyEntry> = self
            .load_entries()?
            .into_iter()
            .filter(|e| e.user_id == session.user_id && e.deleted_at.is_none())
            .filter(|e| range.contains(e.entry_date))
            .collect();
        entries.sort_by_key(|e| e.occurred_at);
        debug!(count = entries.len(), "fetched entries");
        Ok(entries)
    }

    fn fetch_entry(&self, session: &Session, id: Uuid) -> anyhow::Result<DailyEntry> {
        self.load_entries()?
            .into_iter()
            .find(|e| e.id == id && e.user_id == session.user_id && e.deleted_at.is_none())
            .ok_or_else(|| anyhow!("entry not found: {id}"))
    }

    #[tracing::instrument(skip(self, session, input), fields(user = %session.user_id))]
    fn create_entry(&self, session: &Session, input: NewEntry) -> anyhow::Result<DailyEntry> {
        let stamp = now();
        let entry = DailyEntry {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            entry_date: input.entry_date,
            occurred_at: input.occurred_at.unwrap_or(stamp),
            category_id: input.category_id,
            title: input.title,
            content: input.content,
            created_at: stamp,
            updated_at: stamp,
            deleted_at: None,
        };
        self.append(&self.entries_path, &entry)?;
        info!(id = %entry.id, date = %entry.entry_date, "created entry");
        Ok(entry)
    }

    #[tracing::instrument(skip(self, session, patch), fields(user = %session.user_id))]
    fn update_entry(
        &self,
        session: &Session,
        id: Uuid,
        patch: EntryPatch,
    ) -> anyhow::Result<DailyEntry> {
        let user_id = session.user_id;
        self.modify(
            &self.entries_path,
            "entry",
            id,
            |e: &DailyEntry| e.user_id == user_id && e.deleted_at.is_none(),
            |e| e.id,
            |e| {
                if let Some(category_id) = patch.category_id {
                    e.category_id = category_id;
                }
                if let Some(title) = patch.title {
                    e.title = title;
                }
                if let Some(content) = patch.content {
                    e.content = content;
                }
                if let Some(date) = patch.entry_date {
                    e.entry_date = date;
                }
                e.updated_at = now();
            },
        )
    }

    #[tracing::instrument(skip(self, session), fields(user = %session.user_id))]
    fn delete_entry(&self, session: &Session, id: Uuid) -> anyhow::Result<()> {
        let user_id = session.user_id;
        self.modify(
            &self.entries_path,
            "entry",
            id,
            |e: &DailyEntry| e.user_id == user_id && e.deleted_at.is_none(),
            |e| e.id,
            |e| e.deleted_at = Some(now()),
        )?;
        Ok(())
    }

    #[tracing::instrument(skip(self, session), fields(user = %session.user_id, range = %range))]
    fn fetch_events_by_range(
        &self,
        session: &Session,
        range: DateRange,
    ) -> anyhow::Result<Vec<CalendarEvent>> {
        let mut events: Vec<CalendarEvent> = self
            .load_events()?
            .into_iter()
            .filter(|e| e.user_id == session.user_id && e.deleted_at.is_none())
            .filter(|e| range.contains(e.solar_date))
            .collect();
        events.sort_by(|a, b| {
            a.solar_date
                .cmp(&b.solar_date)
                .then(cmp_nulls_last(a.start_time, b.start_time))
        });
        debug!(count = events.len(), "fetched events");
        Ok(events)
    }

    fn fetch_event(&self, session: &Session, id: Uuid) -> anyhow::Result<CalendarEvent> {
        self.load_events()?
            .into_iter()
            .find(|e| e.id == id && e.user_id == session.user_id && e.deleted_at.is_none())
            .ok_or_else(|| anyhow!("event not found: {id}"))
    }

    #[tracing::instrument(skip(self, session, input), fields(user = %session.user_id))]
    fn create_event(&self, session: &Session, input: NewEvent) -> anyhow::Result<CalendarEvent> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(anyhow!("event title cannot be empty"));
        }
        let stamp = now();
        let event = CalendarEvent {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            event_type: input.event_type,
            title,
            content: input.content,
            category_id: input.category_id,
            calendar_kind: input.calendar_kind,
            is_recurring_yearly: input.is_recurring_yearly,
            solar_date: input.solar_date,
            start_time: if input.is_all_day { None } else { input.start_time },
            is_all_day: input.is_all_day,
            created_at: stamp,
            updated_at: stamp,
            deleted_at: None,
        };
        self.append(&self.events_path, &event)?;
        info!(id = %event.id, date = %event.solar_date, "created event");
        Ok(event)
    }

    #[tracing::instrument(skip(self, session, patch), fields(user = %session.user_id))]
    fn update_event(
        &self,
        session: &Session,
        id: Uuid,
        patch: EventPatch,
    ) -> anyhow::Result<CalendarEvent> {
        let user_id = session.user_id;
        self.modify(
            &self.events_path,
            "event",
            id,
            |e: &CalendarEvent| e.user_id == user_id && e.deleted_at.is_none(),
            |e| e.id,
            |e| {
                if let Some(kind) = patch.event_type {
                    e.event_type = kind;
                }
                if let Some(title) = patch.title {
                    e.title = title;
                }
                if let Some(content) = patch.content {
                    e.content = content;
                }
                if let Some(category_id) = patch.category_id {
                    e.category_id = category_id;
                }
                if let Some(kind) = patch.calendar_kind {
                    e.calendar_kind = kind;
                }
                if let Some(yearly) = patch.is_recurring_yearly {
                    e.is_recurring_yearly = yearly;
                }
                if let Some(date) = patch.solar_date {
                    e.solar_date = date;
                }
                if let Some(time) = patch.start_time {
                    e.start_time = time;
                }
                if let Some(all_day) = patch.is_all_day {
                    e.is_all_day = all_day;
                }
                if e.is_all_day {
                    e.start_time = None;
                }
                e.updated_at = now();
            },
        )
    }

    #[tracing::instrument(skip(self, session), fields(user = %session.user_id))]
    fn delete_event(&self, session: &Session, id: Uuid) -> anyhow::Result<()> {
        let user_id = session.user_id;
        self.modify(
            &self.events_path,
            "event",
            id,
            |e: &CalendarEvent| e.user_id == user_id && e.deleted_at.is_none(),
            |e| e.id,
            |e| e.deleted_at = Some(now()),
        )?;
        Ok(())
    }

    #[tracing::instrument(skip(self, session), fields(user = %session.user_id, range = %range))]
    fn fetch_tasks_by_range(
        &self,
        session: &Session,
        range: DateRange,
    ) -> anyhow::Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .load_tasks()?
            .into_iter()
            .filter(|t| t.user_id == session.user_id && t.deleted_at.is_none())
            .filter(|t| t.due_date.is_none_or(|due| range.contains(due)))
            .collect();
        tasks.sort_by(|a, b| {
            cmp_nulls_last(a.due_date, b.due_date).then(a.created_at.cmp(&b.created_at))
        });
        debug!(count = tasks.len(), "fetched tasks");
        Ok(tasks)
    }

    fn fetch_task(&self, session: &Session, id: Uuid) -> anyhow::Result<Task> {
        self.load_tasks()?
            .into_iter()
            .find(|t| t.id == id && t.user_id == session.user_id && t.deleted_at.is_none())
            .ok_or_else(|| anyhow!("task not found: {id}"))
    }

    #[tracing::instrument(skip(self, session, input), fields(user = %session.user_id))]
    fn create_task(&self, session: &Session, input: NewTask) -> anyhow::Result<Task> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(anyhow!("task title cannot be empty"));
        }
        let stamp = now();
        let task = Task {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            title,
            notes: input.notes,
            due_date: input.due_date,
            is_done: false,
            created_at: stamp,
            updated_at: stamp,
            deleted_at: None,
        };
        self.append(&self.tasks_path, &task)?;
        info!(id = %task.id, due = ?task.due_date.map(|d| d.to_string()), "created task");
        Ok(task)
    }

    #[tracing::instrument(skip(self, session, patch), fields(user = %session.user_id))]
    fn update_task(&self, session: &Session, id: Uuid, patch: TaskPatch) -> anyhow::Result<Task> {
        let user_id = session.user_id;
        self.modify(
            &self.tasks_path,
            "task",
            id,
            |t: &Task| t.user_id == user_id && t.deleted_at.is_none(),
            |t| t.id,
            |t| {
                if let Some(title) = patch.title {
                    t.title = title;
                }
                if let Some(notes) = patch.notes {
                    t.notes = notes;
                }
                if let Some(due) = patch.due_date {
                    t.due_date = due;
                }
                if let Some(done) = patch.is_done {
                    t.is_done = done;
                }
                t.updated_at = now();
            },
        )
    }

    #[tracing::instrument(skip(self, session), fields(user = %session.user_id))]
    fn delete_task(&self, session: &Session, id: Uuid) -> anyhow::Result<()> {
        let user_id = session.user_id;
        self.modify(
            &self.tasks_path,
            "task",
            id,
            |t: &Task| t.user_id == user_id && t.deleted_at.is_none(),
            |t| t.id,
            |t| t.deleted_at = Some(now()),
        )?;
        Ok(())
    }
}

/// Ascending, with `None` after every value.
fn cmp_nulls_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(record);
    }

    debug!(count = out.len(), "loaded records from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, records))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, records: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = records.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for record in records {
        let serialized = serde_json::to_string(record)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
