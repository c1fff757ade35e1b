use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDateTime;
use unicode_width::UnicodeWidthStr;
use utter_core::config::Config;
use utter_core::i18n::{self, Labels};
use utter_core::prefs::Language;
use utter_core::task::Task;

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

    #[tracing::instrument(skip(self, tasks, labels))]
    pub fn print_task_table(
        &self,
        tasks: &[Task],
        lang: Language,
        labels: &Labels,
        now: NaiveDateTime,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if tasks.is_empty() {
            writeln!(out, "{}", labels.no_tasks)?;
            return Ok(());
        }

        let headers = vec![
            labels.col_id.to_string(),
            labels.col_due.to_string(),
            labels.col_category.to_string(),
            labels.col_priority.to_string(),
            labels.col_summary.to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = self.paint(&short_id(task), "33");

            let due_text = task
                .due
                .map(|due| due.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            let due = if task.is_overdue(now) {
                self.paint(&due_text, "31")
            } else {
                due_text
            };

            let summary = if task.completed {
                self.paint(&format!("{} [{}]", task.summary, labels.completed), "2")
            } else {
                task.summary.clone()
            };

            rows.push(vec![
                id,
                due,
                i18n::category_label(lang, &task.category),
                i18n::priority_label(lang, task.priority).to_string(),
                summary,
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

pub fn short_id(task: &Task) -> String {
    task.id.simple().to_string()[..8].to_string()
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

#[cfg(test)]
mod tests {
    use super::strip_ansi;

    #[test]
    fn strips_color_codes() {
        assert_eq!(strip_ansi("\x1b[31mlate\x1b[0m"), "late");
        assert_eq!(strip_ansi("plain"), "plain");
    }
}
