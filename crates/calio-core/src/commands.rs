mod records;
mod views;

use std::io::Write;

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::cli::{Command, RangeArgs};
use crate::config::Config;
use crate::datastore::Store;
use crate::datetime::{DateKey, DateRange, first_day_of_month, last_day_of_month, parse_date_expr, today};
use crate::model::Category;
use crate::render::{Renderer, short_id};
use crate::session::{Session, SessionStore};

/// Everything a command needs besides its own arguments.
pub struct Env<'a, S, W> {
    pub store: &'a S,
    pub sessions: &'a SessionStore,
    pub cfg: &'a Config,
    pub renderer: &'a Renderer,
    pub out: &'a mut W,
    pub now: DateTime<Utc>,
}

impl<S: Store, W: Write> Env<'_, S, W> {
    fn session(&self) -> anyhow::Result<Session> {
        self.sessions.require()
    }

    fn today(&self) -> NaiveDate {
        today(self.now)
    }

    fn date(&self, expr: &str) -> anyhow::Result<DateKey> {
        parse_date_expr(expr, self.now)
    }
}

#[instrument(skip(env, command))]
pub fn dispatch<S: Store, W: Write>(
    env: &mut Env<'_, S, W>,
    command: Option<Command>,
) -> anyhow::Result<()> {
    let command = command.unwrap_or(Command::Month {
        month: None,
        week_start: None,
    });
    debug!(?command, "dispatching command");

    match command {
        Command::Login { email } => cmd_login(env, &email),
        Command::Logout => cmd_logout(env),
        Command::Whoami => cmd_whoami(env),
        Command::Month { month, week_start } => views::cmd_month(env, month.as_deref(), week_start),
        Command::Day { date } => views::cmd_day(env, date.as_deref()),
        Command::Tasks(range) => views::cmd_tasks(env, &range),
        Command::Entry(action) => records::cmd_entry(env, action),
        Command::Event(action) => records::cmd_event(env, action),
        Command::Task(action) => records::cmd_task(env, action),
        Command::Category(action) => records::cmd_category(env, action),
    }
}

fn cmd_login<S: Store, W: Write>(env: &mut Env<'_, S, W>, email: &str) -> anyhow::Result<()> {
    let session = env.sessions.login(email, env.now)?;
    info!(user_id = %session.user_id, "command login");
    writeln!(env.out, "Signed in as {}.", session.email)?;
    Ok(())
}

fn cmd_logout<S: Store, W: Write>(env: &mut Env<'_, S, W>) -> anyhow::Result<()> {
    if env.sessions.logout()? {
        writeln!(env.out, "Signed out.")?;
    } else {
        writeln!(env.out, "Not signed in.")?;
    }
    Ok(())
}

fn cmd_whoami<S: Store, W: Write>(env: &mut Env<'_, S, W>) -> anyhow::Result<()> {
    match env.sessions.current()? {
        Some(session) => writeln!(
            env.out,
            "{} ({}) since {}",
            session.email,
            short_id(session.user_id),
            session.signed_in_at.format("%Y-%m-%d %H:%M UTC")
        )?,
        None => writeln!(env.out, "Not signed in.")?,
    }
    Ok(())
}

/// The whole span of representable days.
fn all_time() -> DateRange {
    DateRange::new(NaiveDate::MIN.into(), NaiveDate::MAX.into())
}

/// Calendar month containing `day`.
fn month_of(day: NaiveDate) -> DateRange {
    use chrono::Datelike;
    DateRange::new(
        first_day_of_month(day.year(), day.month0()).into(),
        last_day_of_month(day.year(), day.month0()).into(),
    )
}

/// `--start`/`--end` bounds, each falling back to `default`'s.
fn resolve_range<S: Store, W: Write>(
    env: &Env<'_, S, W>,
    args: &RangeArgs,
    default: DateRange,
) -> anyhow::Result<DateRange> {
    let start = match args.start.as_deref() {
        Some(raw) => env.date(raw).context("invalid --start")?,
        None => default.start,
    };
    let end = match args.end.as_deref() {
        Some(raw) => env.date(raw).context("invalid --end")?,
        None => default.end,
    };
    Ok(DateRange::new(start, end))
}

/// Resolves a full id or a unique hex prefix of one of `ids`.
fn resolve_id<I>(ids: I, token: &str, kind: &str) -> anyhow::Result<Uuid>
where
    I: IntoIterator<Item = Uuid>,
{
    if let Ok(id) = Uuid::parse_str(token.trim()) {
        return Ok(id);
    }

    let prefix: String = token
        .trim()
        .to_ascii_lowercase()
        .chars()
        .filter(|c| *c != '-')
        .collect();
    if prefix.is_empty() {
        return Err(anyhow!("{kind} id cannot be empty"));
    }

    let mut matches = ids
        .into_iter()
        .filter(|id| id.simple().to_string().starts_with(&prefix));
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("{kind} not found: {token}"))?;
    if matches.next().is_some() {
        return Err(anyhow!("ambiguous {kind} id prefix: {token}"));
    }
    Ok(first)
}

/// Finds an active category by exact name (case-insensitive) or id prefix.
fn resolve_category<S: Store>(
    store: &S,
    session: &Session,
    token: &str,
) -> anyhow::Result<Category> {
    let categories = store.fetch_categories(session)?;
    let wanted = token.trim();
    if let Some(found) = categories
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(wanted))
    {
        return Ok(found.clone());
    }

    let id = resolve_id(categories.iter().map(|c| c.id), wanted, "category")?;
    categories
        .into_iter()
        .find(|c| c.id == id)
        .ok_or_else(|| anyhow!("category not found: {token}"))
}

fn parse_time(raw: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .with_context(|| format!("invalid time (expected HH:MM): {raw}"))
}
