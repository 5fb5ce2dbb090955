//! End-of-run linkage and statistics.
//!
//! Runs once after the last line. SQL frames are joined to their statements
//! (copying duration and error state), stack trace records are attached to
//! the frame active at their line, and the run-level statistics and grouped
//! summaries are produced. Errors found here propagate to every ancestor of
//! the frame they land on.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::ProcessorConfig;
use crate::run::TraceRun;
use crate::statement::{SqlType, Statement};
use crate::trace::models::{FrameId, SqlGroupSummary, StatTag, StatementId, StatisticItem};

pub const EXECUTION_PATH: &str = "Execution Path";
pub const LINKAGE: &str = "Linkage";
pub const SQL_STATEMENTS: &str = "SQL Statements";

/// Links the pass could not resolve.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkageReport {
    pub unresolved_frames: usize,
    pub unresolved_stack_traces: usize,
}

/// Link frames, attach stack traces and emit statistics into `run`.
pub fn finalize(run: &mut TraceRun, config: &ProcessorConfig) -> LinkageReport {
    let report = LinkageReport {
        unresolved_frames: link_sql_frames(run),
        unresolved_stack_traces: attach_stack_traces(run, config.stack_trace_line_slack),
    };

    run.sql_by_where = group_statements(
        run.statements(),
        |s| {
            matches!(
                s.sql_type(),
                Some(SqlType::Select | SqlType::Update | SqlType::Delete)
            )
        },
        Statement::where_clause,
    );
    run.sql_by_from = group_statements(
        run.statements(),
        |s| matches!(s.sql_type(), Some(SqlType::Select | SqlType::Delete)),
        Statement::from_clause,
    );

    emit_statistics(run, &report);

    info!(
        frames = run.frames().len(),
        statements = run.statements().len(),
        unresolved_frames = report.unresolved_frames,
        unresolved_stack_traces = report.unresolved_stack_traces,
        "trace run complete"
    );
    report
}

/// Join every SQL frame to its statement. Returns the number left unlinked.
fn link_sql_frames(run: &mut TraceRun) -> usize {
    let mut unresolved = 0;

    for index in 0..run.frames().len() {
        let id = FrameId(index);
        let frame = run.frame(id);
        if !frame.kind.is_sql() {
            continue;
        }

        // A re-executed statement moves to the line of its latest execution,
        // so only that execution's frame still joins to it.
        let statement = frame
            .statement
            .filter(|&s| run.statement(s).line_number == frame.start_line)
            .or_else(|| run.statement_at_line(frame.start_line));
        let Some(statement) = statement else {
            warn!(
                start_line = frame.start_line,
                context = %frame.context,
                "no statement for SQL frame"
            );
            run.frame_mut(id).statement = None;
            unresolved += 1;
            continue;
        };

        let (duration, is_error) = {
            let s = run.statement(statement);
            (s.duration(), s.is_error)
        };
        let frame = run.frame_mut(id);
        frame.statement = Some(statement);
        frame.duration = duration;
        if is_error {
            run.mark_error_chain(id);
        }
    }

    unresolved
}

/// Last frame whose closed `[start, stop]` range contains `line_number`.
pub fn find_frame_for_line(run: &TraceRun, line_number: u64) -> Option<FrameId> {
    run.frames()
        .iter()
        .rposition(|f| f.contains_line(line_number))
        .map(FrameId)
}

/// Attach stack trace records to frames. Returns the number left unattached.
fn attach_stack_traces(run: &mut TraceRun, slack: u64) -> usize {
    let mut unresolved = 0;

    for index in 0..run.stack_traces.len() {
        let line_number = run.stack_traces[index].line_number;
        // Traces are sometimes printed just after their frame exits.
        let found = (0..=slack)
            .filter_map(|back| line_number.checked_sub(back))
            .find_map(|line| find_frame_for_line(run, line));

        match found {
            Some(frame) => {
                run.stack_traces[index].frame = Some(frame);
                run.frame_mut(frame).stack_trace = Some(index);
                run.mark_error_chain(frame);
            }
            None => {
                warn!(line_number, "no frame for stack trace");
                unresolved += 1;
            }
        }
    }

    unresolved
}

/// Group statements by a clause, keeping groups in first-seen order.
fn group_statements<F, K>(statements: &[Statement], include: F, key: K) -> Vec<SqlGroupSummary>
where
    F: Fn(&Statement) -> bool,
    K: Fn(&Statement) -> &str,
{
    let mut groups: Vec<SqlGroupSummary> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for statement in statements.iter().filter(|s| include(s)) {
        let clause = key(statement);
        let slot = *index.entry(clause).or_insert_with(|| {
            groups.push(SqlGroupSummary {
                clause: clause.to_string(),
                call_count: 0,
                total_time: 0.0,
                has_error: false,
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.call_count += 1;
        group.total_time += statement.duration();
        group.has_error |= statement.is_error;
    }

    groups
}

/// Pick the statement maximizing `score`; ties go to the later statement.
fn last_max_by<F>(statements: &[Statement], score: F) -> Option<usize>
where
    F: Fn(&Statement) -> f64,
{
    let mut best: Option<(usize, f64)> = None;
    for (i, statement) in statements.iter().enumerate() {
        let value = score(statement);
        match best {
            Some((_, current)) if value < current => {}
            _ => best = Some((i, value)),
        }
    }
    best.map(|(i, _)| i)
}

fn emit_statistics(run: &mut TraceRun, report: &LinkageReport) {
    let frames = run.frames();
    let sql_calls = frames.iter().filter(|f| f.kind.is_sql()).count();
    let error_calls = frames.iter().filter(|f| f.has_error).count();

    let mut deepest =
        StatisticItem::new(EXECUTION_PATH, "Maximum Call Depth", run.max_call_depth);
    if let Some(frame) = run.deepest_frame {
        deepest = deepest.with_tag(StatTag::Frame(frame));
    }

    let mut stats = vec![
        deepest,
        StatisticItem::new(EXECUTION_PATH, "Total Calls", frames.len()),
        StatisticItem::new(EXECUTION_PATH, "SQL Executions", sql_calls),
        StatisticItem::new(EXECUTION_PATH, "Error Calls", error_calls),
        StatisticItem::new(LINKAGE, "Unresolved SQL Frames", report.unresolved_frames),
        StatisticItem::new(
            LINKAGE,
            "Unresolved Stack Traces",
            report.unresolved_stack_traces,
        ),
    ];

    let statements = run.statements();
    if !statements.is_empty() {
        stats.push(StatisticItem::new(
            SQL_STATEMENTS,
            "Total Count",
            statements.len(),
        ));
        if let Some(i) = last_max_by(statements, Statement::duration) {
            stats.push(
                StatisticItem::new(SQL_STATEMENTS, "Longest Execution", statements[i].duration())
                    .with_tag(StatTag::Statement(StatementId(i))),
            );
        }
        if let Some(i) = last_max_by(statements, |s| f64::from(s.fetch_count)) {
            stats.push(
                StatisticItem::new(SQL_STATEMENTS, "Most Fetches", statements[i].fetch_count)
                    .with_tag(StatTag::Statement(StatementId(i))),
            );
        }
    }

    run.statistics.extend(stats);
}
