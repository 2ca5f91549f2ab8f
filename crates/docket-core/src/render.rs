use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Local, Utc};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::session::User;
use crate::task::{Status, Task};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, tasks, now))]
    pub fn print_task_table(&mut self, tasks: &[&Task], now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Age".to_string(),
            "Priority".to_string(),
            "Status".to_string(),
            "Category".to_string(),
            "Due".to_string(),
            "Title".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());

        for task in tasks {
            let id = short_id(&task.id).to_string();
            let age = format_age(task.created_at, now);
            let due = task
                .due_date
                .map(|date| date.with_timezone(&Local).format("%Y-%m-%d").to_string())
                .unwrap_or_default();

            let row = if task.status == Status::Done {
                // Finished rows paint green wholesale.
                vec![
                    self.paint(&id, "32"),
                    self.paint(&age, "32"),
                    self.paint(task.priority.display_text(), "32"),
                    self.paint(task.status.display_text(), "32"),
                    self.paint(task.category.display_text(), "32"),
                    self.paint(&due, "32"),
                    self.paint(&task.title, "32"),
                ]
            } else {
                let due = if task.is_overdue(now) {
                    self.paint(&due, "31")
                } else {
                    due
                };
                vec![
                    self.paint(&id, "33"),
                    age,
                    task.priority.display_text().to_string(),
                    task.status.display_text().to_string(),
                    task.category.display_text().to_string(),
                    due,
                    task.title.clone(),
                ]
            };

            rows.push(row);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task, now))]
    pub fn print_task_detail(&mut self, task: &Task, now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "title     {}", task.title)?;
        if let Some(description) = &task.description {
            writeln!(out, "desc      {description}")?;
        }
        writeln!(out, "status    {}", task.status.display_text())?;
        writeln!(out, "priority  {}", task.priority.display_text())?;
        writeln!(out, "category  {}", task.category.display_text())?;
        writeln!(
            out,
            "created   {}",
            task.created_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
        )?;

        if let Some(due) = task.due_date {
            let formatted = due.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string();
            let formatted = if task.is_overdue(now) {
                self.paint(&formatted, "31")
            } else {
                formatted
            };
            writeln!(out, "due       {formatted}")?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, user))]
    pub fn print_session(&mut self, user: &User) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "username  {}", user.username)?;
        writeln!(out, "email     {}", user.email)?;
        writeln!(out, "id        {}", user.id)?;

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// First eight characters of a task id, enough to stay unique in any
/// plausible collection while keeping the table narrow.
pub fn short_id(id: &str) -> &str {
    let end = id
        .char_indices()
        .nth(8)
        .map(|(idx, _)| idx)
        .unwrap_or(id.len());
    &id[..end]
}

fn format_age(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - created).num_seconds().max(0);
    if secs >= 604_800 {
        format!("{}w", secs / 604_800)
    } else if secs >= 86_400 {
        format!("{}d", secs / 86_400)
    } else if secs >= 3_600 {
        format!("{}h", secs / 3_600)
    } else if secs >= 60 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
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
