use std::io::Write;

use anyhow::anyhow;
use chrono::Datelike;
use tracing::{info, instrument};

use super::{Env, resolve_range};
use crate::bucket::bucket_records;
use crate::calendar::{ChipLimits, MonthRecords, build_day_view, build_month_view};
use crate::cli::RangeArgs;
use crate::datastore::Store;
use crate::datetime::{DateRange, checked_add_days, parse_month_expr};
use crate::grid::{WeekStart, build_month_grid};
use crate::lunar::LunarLabeler;

fn labeler(cfg: &crate::config::Config) -> Option<LunarLabeler> {
    cfg.get_bool("lunar")
        .unwrap_or(true)
        .then(|| LunarLabeler::from_config(cfg))
}

#[instrument(skip(env))]
pub(super) fn cmd_month<S: Store, W: Write>(
    env: &mut Env<'_, S, W>,
    month: Option<&str>,
    week_start: Option<WeekStart>,
) -> anyhow::Result<()> {
    let (year, month0) = match month {
        Some(raw) => parse_month_expr(raw, env.now)?,
        None => {
            let today = env.today();
            (today.year(), today.month0())
        }
    };
    let week_start = week_start.unwrap_or_else(|| WeekStart::from_config(env.cfg));
    info!(year, month = month0 + 1, %week_start, "command month");

    let grid = build_month_grid(year, month0 as i32, week_start);
    let range = grid.visible_range();

    let records = match env.sessions.current()? {
        Some(session) => MonthRecords {
            entries: env.store.fetch_entries_by_range(&session, range)?,
            events: env.store.fetch_events_by_range(&session, range)?,
            tasks: env.store.fetch_tasks_by_range(&session, range)?,
            categories: env.store.fetch_categories(&session)?,
        },
        None => {
            info!("not signed in; showing an empty month");
            MonthRecords::default()
        }
    };

    let labeler = labeler(env.cfg);
    let view = build_month_view(
        grid,
        &records,
        labeler.as_ref(),
        env.today(),
        ChipLimits::from_config(env.cfg),
    );
    env.renderer.month_view(env.out, &view)
}

#[instrument(skip(env))]
pub(super) fn cmd_day<S: Store, W: Write>(
    env: &mut Env<'_, S, W>,
    date: Option<&str>,
) -> anyhow::Result<()> {
    let session = env.session()?;
    let date = env.date(date.unwrap_or("today"))?;
    info!(%date, "command day");

    let range = DateRange::single(date);
    let records = MonthRecords {
        entries: env.store.fetch_entries_by_range(&session, range)?,
        events: env.store.fetch_events_by_range(&session, range)?,
        tasks: env.store.fetch_tasks_by_range(&session, range)?,
        categories: env.store.fetch_categories(&session)?,
    };

    let labeler = labeler(env.cfg);
    let view = build_day_view(date, records, labeler.as_ref());
    env.renderer.day_view(env.out, &view)
}

#[instrument(skip(env, args))]
pub(super) fn cmd_tasks<S: Store, W: Write>(
    env: &mut Env<'_, S, W>,
    args: &RangeArgs,
) -> anyhow::Result<()> {
    let session = env.session()?;
    let today = env.today();
    let window = env.cfg.get_usize("tasks.window_days", 30);
    let window_end = i64::try_from(window)
        .ok()
        .and_then(|days| checked_add_days(today, days))
        .ok_or_else(|| anyhow!("tasks.window_days is out of range: {window}"))?;
    let default = DateRange::new(today.into(), window_end.into());
    let range = resolve_range(env, args, default)?;
    info!(%range, "command tasks");

    let tasks = env.store.fetch_tasks_by_range(&session, range)?;
    let buckets = bucket_records(tasks);
    env.renderer.task_groups(env.out, &buckets.in_display_order())
}
