use std::io::Write;

use anyhow::anyhow;
use tracing::{info, instrument};

use super::{Env, all_time, month_of, parse_time, resolve_category, resolve_id, resolve_range};
use crate::cli::{CategoryAction, EntryAction, EventAction, TaskAction};
use crate::datastore::Store;
use crate::model::{
    CalendarKind, CategoryPatch, DEFAULT_CATEGORY_BG, DEFAULT_CATEGORY_TEXT, EntryPatch,
    EventPatch, NewCategory, NewEntry, NewEvent, NewTask, TaskPatch, non_blank,
};
use crate::render::short_id;
use crate::session::Session;

#[instrument(skip(env, action))]
pub(super) fn cmd_entry<S: Store, W: Write>(
    env: &mut Env<'_, S, W>,
    action: EntryAction,
) -> anyhow::Result<()> {
    let session = env.session()?;

    match action {
        EntryAction::Add {
            content,
            date,
            category,
            title,
        } => {
            let content = non_blank(Some(content))
                .ok_or_else(|| anyhow!("entry content cannot be empty"))?;
            let category = resolve_category(env.store, &session, &category)?;
            let entry = env.store.create_entry(
                &session,
                NewEntry {
                    entry_date: env.date(&date)?,
                    category_id: category.id,
                    title: non_blank(title),
                    content,
                    occurred_at: None,
                },
            )?;
            writeln!(env.out, "Created entry {} on {}.", short_id(entry.id), entry.entry_date)?;
        }
        EntryAction::Edit {
            id,
            content,
            date,
            category,
            title,
            clear_title,
        } => {
            let id = entry_id(env, &session, &id)?;
            let mut patch = EntryPatch::default();
            if let Some(content) = content {
                patch.content = Some(
                    non_blank(Some(content))
                        .ok_or_else(|| anyhow!("entry content cannot be empty"))?,
                );
            }
            if let Some(date) = date {
                patch.entry_date = Some(env.date(&date)?);
            }
            if let Some(category) = category {
                patch.category_id = Some(resolve_category(env.store, &session, &category)?.id);
            }
            if clear_title {
                patch.title = Some(None);
            } else if let Some(title) = title {
                patch.title = Some(non_blank(Some(title)));
            }
            let entry = env.store.update_entry(&session, id, patch)?;
            writeln!(env.out, "Modified entry {}.", short_id(entry.id))?;
        }
        EntryAction::Rm { id } => {
            let id = entry_id(env, &session, &id)?;
            env.store.delete_entry(&session, id)?;
            writeln!(env.out, "Deleted entry {}.", short_id(id))?;
        }
        EntryAction::List(args) => {
            let range = resolve_range(env, &args, month_of(env.today()))?;
            info!(%range, "listing entries");
            let entries = env.store.fetch_entries_by_range(&session, range)?;
            let categories = env.store.fetch_categories(&session)?;
            env.renderer.entry_table(env.out, &entries, &categories)?;
        }
    }

    Ok(())
}

#[instrument(skip(env, action))]
pub(super) fn cmd_event<S: Store, W: Write>(
    env: &mut Env<'_, S, W>,
    action: EventAction,
) -> anyhow::Result<()> {
    let session = env.session()?;

    match action {
        EventAction::Add {
            title,
            date,
            time,
            event_type,
            category,
            content,
            lunar,
            yearly,
        } => {
            let start_time = time.as_deref().map(parse_time).transpose()?;
            let category_id = category
                .map(|token| resolve_category(env.store, &session, &token).map(|c| c.id))
                .transpose()?;
            let event = env.store.create_event(
                &session,
                NewEvent {
                    event_type,
                    title,
                    content: non_blank(content),
                    category_id,
                    calendar_kind: if lunar {
                        CalendarKind::LunarKr
                    } else {
                        CalendarKind::Solar
                    },
                    is_recurring_yearly: yearly,
                    solar_date: env.date(&date)?,
                    start_time,
                    is_all_day: start_time.is_none(),
                },
            )?;
            writeln!(
                env.out,
                "Created {} {} on {} {}.",
                event.event_type.label(),
                short_id(event.id),
                event.solar_date,
                event.time_label()
            )?;
        }
        EventAction::Edit {
            id,
            title,
            date,
            time,
            all_day,
            event_type,
            content,
            category,
            yearly,
        } => {
            let id = event_id(env, &session, &id)?;
            let mut patch = EventPatch {
                event_type,
                is_recurring_yearly: yearly,
                ..EventPatch::default()
            };
            if let Some(title) = title {
                patch.title =
                    Some(non_blank(Some(title)).ok_or_else(|| anyhow!("event title cannot be empty"))?);
            }
            if let Some(date) = date {
                patch.solar_date = Some(env.date(&date)?);
            }
            if let Some(time) = time {
                patch.start_time = Some(Some(parse_time(&time)?));
                patch.is_all_day = Some(false);
            } else if all_day {
                patch.start_time = Some(None);
                patch.is_all_day = Some(true);
            }
            if let Some(content) = content {
                patch.content = Some(non_blank(Some(content)));
            }
            if let Some(category) = category {
                patch.category_id = if category.trim().eq_ignore_ascii_case("none") {
                    Some(None)
                } else {
                    Some(Some(resolve_category(env.store, &session, &category)?.id))
                };
            }
            let event = env.store.update_event(&session, id, patch)?;
            writeln!(env.out, "Modified event {}.", short_id(event.id))?;
        }
        EventAction::Rm { id } => {
            let id = event_id(env, &session, &id)?;
            env.store.delete_event(&session, id)?;
            writeln!(env.out, "Deleted event {}.", short_id(id))?;
        }
        EventAction::List(args) => {
            let range = resolve_range(env, &args, month_of(env.today()))?;
            info!(%range, "listing events");
            let events = env.store.fetch_events_by_range(&session, range)?;
            env.renderer.event_table(env.out, &events)?;
        }
    }

    Ok(())
}

#[instrument(skip(env, action))]
pub(super) fn cmd_task<S: Store, W: Write>(
    env: &mut Env<'_, S, W>,
    action: TaskAction,
) -> anyhow::Result<()> {
    let session = env.session()?;

    match action {
        TaskAction::Add { title, due, notes } => {
            let due_date = due.as_deref().map(|raw| env.date(raw)).transpose()?;
            let task = env.store.create_task(
                &session,
                NewTask {
                    title,
                    notes: non_blank(notes),
                    due_date,
                },
            )?;
            writeln!(env.out, "Created task {}.", short_id(task.id))?;
        }
        TaskAction::Edit {
            id,
            title,
            due,
            no_due,
            notes,
        } => {
            let id = task_id(env, &session, &id)?;
            let mut patch = TaskPatch::default();
            if let Some(title) = title {
                patch.title =
                    Some(non_blank(Some(title)).ok_or_else(|| anyhow!("task title cannot be empty"))?);
            }
            if no_due {
                patch.due_date = Some(None);
            } else if let Some(due) = due {
                patch.due_date = Some(Some(env.date(&due)?));
            }
            if let Some(notes) = notes {
                patch.notes = Some(non_blank(Some(notes)));
            }
            let task = env.store.update_task(&session, id, patch)?;
            writeln!(env.out, "Modified task {}.", short_id(task.id))?;
        }
        TaskAction::Done { id } => set_done(env, &session, &id, true)?,
        TaskAction::Undo { id } => set_done(env, &session, &id, false)?,
        TaskAction::Rm { id } => {
            let id = task_id(env, &session, &id)?;
            env.store.delete_task(&session, id)?;
            writeln!(env.out, "Deleted task {}.", short_id(id))?;
        }
        TaskAction::List(args) => {
            let range = resolve_range(env, &args, all_time())?;
            info!(%range, "listing tasks");
            let tasks = env.store.fetch_tasks_by_range(&session, range)?;
            env.renderer.task_table(env.out, &tasks)?;
        }
    }

    Ok(())
}

fn set_done<S: Store, W: Write>(
    env: &mut Env<'_, S, W>,
    session: &Session,
    id: &str,
    done: bool,
) -> anyhow::Result<()> {
    let id = task_id(env, session, id)?;
    let task = env.store.update_task(
        session,
        id,
        TaskPatch {
            is_done: Some(done),
            ..TaskPatch::default()
        },
    )?;
    let verb = if done { "Completed" } else { "Reopened" };
    writeln!(env.out, "{verb} task {} {}.", short_id(task.id), task.title)?;
    Ok(())
}

#[instrument(skip(env, action))]
pub(super) fn cmd_category<S: Store, W: Write>(
    env: &mut Env<'_, S, W>,
    action: CategoryAction,
) -> anyhow::Result<()> {
    let session = env.session()?;

    match action {
        CategoryAction::Add {
            name,
            bg,
            fg,
            order,
        } => {
            let category = env.store.create_category(
                &session,
                NewCategory {
                    name,
                    color_bg: bg.unwrap_or_else(|| DEFAULT_CATEGORY_BG.to_string()),
                    color_text: fg.unwrap_or_else(|| DEFAULT_CATEGORY_TEXT.to_string()),
                    sort_order: order,
                },
            )?;
            writeln!(env.out, "Created category {} {}.", short_id(category.id), category.name)?;
        }
        CategoryAction::Edit {
            category,
            name,
            bg,
            fg,
            order,
        } => {
            let id = resolve_category(env.store, &session, &category)?.id;
            let name = match name {
                Some(name) => {
                    Some(non_blank(Some(name)).ok_or_else(|| anyhow!("category name cannot be empty"))?)
                }
                None => None,
            };
            let category = env.store.update_category(
                &session,
                id,
                CategoryPatch {
                    name,
                    color_bg: bg,
                    color_text: fg,
                    sort_order: order,
                    is_active: None,
                },
            )?;
            writeln!(env.out, "Modified category {}.", category.name)?;
        }
        CategoryAction::Rm { category } => {
            let id = resolve_category(env.store, &session, &category)?.id;
            let category = env.store.deactivate_category(&session, id)?;
            writeln!(env.out, "Deactivated category {}.", category.name)?;
        }
        CategoryAction::List => {
            let categories = env.store.fetch_categories(&session)?;
            env.renderer.category_table(env.out, &categories)?;
        }
    }

    Ok(())
}

fn entry_id<S: Store, W: Write>(
    env: &Env<'_, S, W>,
    session: &Session,
    token: &str,
) -> anyhow::Result<uuid::Uuid> {
    let entries = env.store.fetch_entries_by_range(session, all_time())?;
    resolve_id(entries.iter().map(|e| e.id), token, "entry")
}

fn event_id<S: Store, W: Write>(
    env: &Env<'_, S, W>,
    session: &Session,
    token: &str,
) -> anyhow::Result<uuid::Uuid> {
    let events = env.store.fetch_events_by_range(session, all_time())?;
    resolve_id(events.iter().map(|e| e.id), token, "event")
}

fn task_id<S: Store, W: Write>(
    env: &Env<'_, S, W>,
    session: &Session,
    token: &str,
) -> anyhow::Result<uuid::Uuid> {
    let tasks = env.store.fetch_tasks_by_range(session, all_time())?;
    resolve_id(tasks.iter().map(|t| t.id), token, "task")
}
