use std::io::{IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};
use uuid::Uuid;

use crate::bucket::BucketKey;
use crate::calendar::{CellView, ChipKind, DayView, MonthView};
use crate::config::Config;
use crate::grid::weekday_labels;
use crate::model::{CalendarEvent, Category, DailyEntry, Task};

const CELL_WIDTH: usize = 12;
const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => std::io::stdout().is_terminal(),
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    /// Renderer that never emits escape codes.
    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, out, view), fields(title = %view.title))]
    pub fn month_view<W: Write>(&self, out: &mut W, view: &MonthView) -> anyhow::Result<()> {
        if view.lunar_range.is_empty() {
            writeln!(out, "{}", self.paint(&view.title, "1"))?;
        } else {
            writeln!(
                out,
                "{}  {}",
                self.paint(&view.title, "1"),
                self.paint(&view.lunar_range, "90")
            )?;
        }

        let header: Vec<String> = weekday_labels(view.grid.week_start())
            .iter()
            .map(|label| pad(label, CELL_WIDTH))
            .collect();
        writeln!(out, "{}", header.join(" ").trim_end())?;

        let chip_rows = view
            .cells
            .iter()
            .map(|cell| cell.chips.len() + usize::from(cell.overflow))
            .max()
            .unwrap_or(0);

        for week in view.weeks() {
            let heads: Vec<String> = week.iter().map(|cell| self.cell_head(cell)).collect();
            writeln!(out, "{}", heads.join(" ").trim_end())?;

            for row in 0..chip_rows {
                let line: Vec<String> = week.iter().map(|cell| self.cell_line(cell, row)).collect();
                let line = line.join(" ");
                if !strip_ansi(&line).trim().is_empty() {
                    writeln!(out, "{}", line.trim_end())?;
                }
            }
        }

        Ok(())
    }

    fn cell_head(&self, cell: &CellView) -> String {
        let day = cell.day().to_string();
        let text = if cell.lunar.is_empty() {
            day.clone()
        } else {
            format!("{day} ({})", cell.lunar)
        };
        let text = truncate(&text, CELL_WIDTH);
        let padding = CELL_WIDTH.saturating_sub(text.width());

        let painted = if cell.is_today {
            self.paint(&text, "7")
        } else if !cell.cell.is_current_month {
            self.paint(&text, "90")
        } else {
            text
        };

        let markers = match (cell.has_events, cell.has_pending_tasks) {
            (true, true) => "•◦",
            (true, false) => "•",
            (false, true) => "◦",
            (false, false) => "",
        };
        let padding = padding.saturating_sub(markers.width());
        format!("{painted}{}{}", " ".repeat(padding), self.paint(markers, "36"))
    }

    fn cell_line(&self, cell: &CellView, row: usize) -> String {
        if let Some(chip) = cell.chips.get(row) {
            let text = truncate(&chip.label, CELL_WIDTH);
            let padding = " ".repeat(CELL_WIDTH.saturating_sub(text.width()));
            let code = match chip.kind {
                ChipKind::Event => "34",
                ChipKind::Task => "35",
                ChipKind::Entry => "33",
            };
            return format!("{}{padding}", self.paint(&text, code));
        }
        if cell.overflow && row == cell.chips.len() {
            return pad("…", CELL_WIDTH);
        }
        " ".repeat(CELL_WIDTH)
    }

    #[tracing::instrument(skip(self, out, view), fields(date = %view.date))]
    pub fn day_view<W: Write>(&self, out: &mut W, view: &DayView) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&view.date.to_string(), "1"))?;
        if !view.lunar.is_empty() {
            writeln!(out, "음력 {}", view.lunar)?;
        }

        writeln!(out)?;
        writeln!(out, "{}", self.paint("일정", "1"))?;
        if view.events.is_empty() {
            writeln!(out, "  (없음)")?;
        }
        for event in &view.events {
            writeln!(
                out,
                "  {} {:>4} [{}] {}",
                self.id_cell(event.id),
                event.time_label(),
                event.event_type.label(),
                event.title
            )?;
        }

        writeln!(out)?;
        writeln!(out, "{}", self.paint("기록", "1"))?;
        if view.entries.is_empty() {
            writeln!(out, "  (없음)")?;
        }
        for (entry, category) in &view.entries {
            let category = category.as_ref().map_or("-", |c| c.name.as_str());
            let title = entry.title.as_deref().unwrap_or(category);
            writeln!(
                out,
                "  {} [{}] {}: {}",
                self.id_cell(entry.id),
                category,
                title,
                entry.content
            )?;
        }

        writeln!(out)?;
        writeln!(out, "{}", self.paint("테스크", "1"))?;
        if view.tasks.is_empty() {
            writeln!(out, "  (없음)")?;
        }
        for task in &view.tasks {
            writeln!(
                out,
                "  {} {} {}",
                self.id_cell(task.id),
                check_box(task),
                task.title
            )?;
        }

        Ok(())
    }

    /// Tasks grouped by due date, one heading per bucket.
    #[tracing::instrument(skip(self, out, groups))]
    pub fn task_groups<W: Write>(
        &self,
        out: &mut W,
        groups: &[(BucketKey, &[Task])],
    ) -> anyhow::Result<()> {
        if groups.is_empty() {
            writeln!(out, "no tasks")?;
            return Ok(());
        }

        for (idx, (key, tasks)) in groups.iter().enumerate() {
            if idx > 0 {
                writeln!(out)?;
            }
            writeln!(out, "{}", self.paint(&key.to_string(), "1"))?;
            for task in *tasks {
                let title = if task.is_done {
                    self.paint(&task.title, "90")
                } else {
                    task.title.clone()
                };
                writeln!(out, "  {} {} {}", self.id_cell(task.id), check_box(task), title)?;
            }
        }

        Ok(())
    }

    pub fn entry_table<W: Write>(
        &self,
        out: &mut W,
        entries: &[DailyEntry],
        categories: &[Category],
    ) -> anyhow::Result<()> {
        let headers = ["ID", "Date", "Category", "Title", "Content"];
        let rows = entries
            .iter()
            .map(|entry| {
                let category = categories
                    .iter()
                    .find(|c| c.id == entry.category_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                vec![
                    self.id_cell(entry.id),
                    entry.entry_date.to_string(),
                    category,
                    entry.title.clone().unwrap_or_default(),
                    entry.content.clone(),
                ]
            })
            .collect();
        write_table(out, &headers, rows)
    }

    pub fn event_table<W: Write>(
        &self,
        out: &mut W,
        events: &[CalendarEvent],
    ) -> anyhow::Result<()> {
        let headers = ["ID", "Date", "Time", "Type", "Title"];
        let rows = events
            .iter()
            .map(|event| {
                vec![
                    self.id_cell(event.id),
                    event.solar_date.to_string(),
                    event.time_label(),
                    event.event_type.label().to_string(),
                    event.title.clone(),
                ]
            })
            .collect();
        write_table(out, &headers, rows)
    }

    pub fn task_table<W: Write>(&self, out: &mut W, tasks: &[Task]) -> anyhow::Result<()> {
        let headers = ["ID", "Due", "Done", "Title"];
        let rows = tasks
            .iter()
            .map(|task| {
                vec![
                    self.id_cell(task.id),
                    task.due_date.map(|d| d.to_string()).unwrap_or_default(),
                    check_box(task).to_string(),
                    task.title.clone(),
                ]
            })
            .collect();
        write_table(out, &headers, rows)
    }

    pub fn category_table<W: Write>(
        &self,
        out: &mut W,
        categories: &[Category],
    ) -> anyhow::Result<()> {
        let headers = ["ID", "Order", "Name", "Colors"];
        let rows = categories
            .iter()
            .map(|category| {
                vec![
                    self.id_cell(category.id),
                    category.sort_order.to_string(),
                    category.name.clone(),
                    format!("{} / {}", category.color_bg, category.color_text),
                ]
            })
            .collect();
        write_table(out, &headers, rows)
    }

    fn id_cell(&self, id: Uuid) -> String {
        self.paint(&short_id(id), "33")
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || text.is_empty() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Leading hex digits of `id`, as shown in listings and accepted back as a prefix.
pub fn short_id(id: Uuid) -> String {
    let mut simple = id.simple().to_string();
    simple.truncate(SHORT_ID_LEN);
    simple
}

fn check_box(task: &Task) -> &'static str {
    if task.is_done { "[x]" } else { "[ ]" }
}

fn pad(text: &str, width: usize) -> String {
    let padding = width.saturating_sub(text.width());
    format!("{text}{}", " ".repeat(padding))
}

/// Cuts `text` to at most `width` terminal columns.
fn truncate(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

fn write_table<W: Write>(
    writer: &mut W,
    headers: &[&str],
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(*header));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| pad(header, *width))
        .collect();
    writeln!(writer, "{}", header_line.join(" ").trim_end())?;

    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    writeln!(writer, "{}", rule.join(" "))?;

    for row in rows {
        let mut line = String::new();
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            line.push_str(cell);
            line.push_str(&" ".repeat(padding));
            line.push(' ');
        }
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
