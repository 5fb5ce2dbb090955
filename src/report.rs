//! Rendering of a finished run for the CLI.

use std::io::{self, Write};

use serde::Serialize;

use crate::run::TraceRun;
use crate::statement::Statement;
use crate::trace::models::{CallFrame, FrameId, SqlGroupSummary, StackTraceRecord, StatisticItem};

const MAX_COLUMN_WIDTH: usize = 60;
const MAX_LABEL_WIDTH: usize = 100;

/// Serialized view of a run.
#[derive(Serialize)]
pub struct RunSummary<'a> {
    pub max_call_depth: usize,
    pub roots: &'a [FrameId],
    pub frames: &'a [CallFrame],
    pub statements: &'a [Statement],
    pub statistics: &'a [StatisticItem],
    pub sql_by_where: &'a [SqlGroupSummary],
    pub sql_by_from: &'a [SqlGroupSummary],
    pub stack_traces: &'a [StackTraceRecord],
}

impl<'a> RunSummary<'a> {
    pub fn new(run: &'a TraceRun) -> Self {
        Self {
            max_call_depth: run.max_call_depth,
            roots: run.roots(),
            frames: run.frames(),
            statements: run.statements(),
            statistics: &run.statistics,
            sql_by_where: &run.sql_by_where,
            sql_by_from: &run.sql_by_from,
            stack_traces: &run.stack_traces,
        }
    }
}

pub fn write_json<W: Write>(run: &TraceRun, out: W) -> serde_json::Result<()> {
    serde_json::to_writer_pretty(out, &RunSummary::new(run))
}

/// Write the call tree, statistics and grouped SQL totals as text.
pub fn write_text<W: Write>(run: &TraceRun, out: &mut W) -> io::Result<()> {
    writeln!(out, "Call tree")?;
    writeln!(out, "=========")?;
    if run.roots().is_empty() {
        writeln!(out, "(no calls)")?;
    }
    for &root in run.roots() {
        write_frame(run, root, 0, out)?;
    }

    writeln!(out)?;
    writeln!(out, "Statistics")?;
    writeln!(out, "==========")?;
    let rows: Vec<Vec<String>> = run
        .statistics
        .iter()
        .map(|s| vec![s.category.clone(), s.label.clone(), s.value.clone()])
        .collect();
    write_table(out, &["Category", "Statistic", "Value"], &rows)?;

    for (title, groups) in [
        ("SQL by WHERE clause", &run.sql_by_where),
        ("SQL by table", &run.sql_by_from),
    ] {
        writeln!(out)?;
        writeln!(out, "{title}")?;
        writeln!(out, "{}", "=".repeat(title.len()))?;
        let rows: Vec<Vec<String>> = groups
            .iter()
            .map(|g| {
                vec![
                    g.clause.clone(),
                    g.call_count.to_string(),
                    format!("{:.3}", g.total_time),
                    if g.has_error { "yes" } else { "" }.to_string(),
                ]
            })
            .collect();
        write_table(out, &["Clause", "Calls", "Time", "Error"], &rows)?;
    }

    Ok(())
}

fn write_frame<W: Write>(
    run: &TraceRun,
    id: FrameId,
    depth: usize,
    out: &mut W,
) -> io::Result<()> {
    let frame = run.frame(id);
    let stop = frame
        .stop_line()
        .map_or_else(|| "open".to_string(), |l| l.to_string());
    let marker = if frame.has_error { " [error]" } else { "" };
    writeln!(
        out,
        "{:indent$}{} {} ({}-{}, {:.3}s){}",
        "",
        frame.kind,
        truncate(&frame.function, MAX_LABEL_WIDTH),
        frame.start_line,
        stop,
        frame.duration,
        marker,
        indent = depth * 2,
    )?;
    for &child in frame.children() {
        write_frame(run, child, depth + 1, out)?;
    }
    Ok(())
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let kept: String = value.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn write_table<W: Write>(out: &mut W, headers: &[&str], rows: &[Vec<String>]) -> io::Result<()> {
    if rows.is_empty() {
        return writeln!(out, "(none)");
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, val) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(val.chars().count());
            }
        }
    }
    for w in &mut widths {
        *w = (*w).min(MAX_COLUMN_WIDTH);
    }

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, &w)| format!("{h:w$}"))
        .collect();
    writeln!(out, "{}", header_line.join(" | ").trim_end())?;

    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(out, "{}", sep.join("-+-"))?;

    for row in rows {
        let row_line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(v, &w)| format!("{:w$}", truncate(v, w)))
            .collect();
        writeln!(out, "{}", row_line.join(" | ").trim_end())?;
    }
    Ok(())
}
