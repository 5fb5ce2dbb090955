//! Run context shared by a processor and its callers.
//!
//! A `TraceRun` owns everything one trace run produces: the statement and
//! frame arenas (whose order is creation order, so they double as the
//! statement list and the flat call list), the root list, statistics, the
//! grouped summaries and the externally supplied stack traces. It also owns
//! the run's [`IdAllocator`], so independent runs never share IDs.

use crate::ids::IdAllocator;
use crate::statement::{SqlError, Statement};
use crate::trace::models::{
    CallFrame, FrameId, SqlGroupSummary, StackTraceRecord, StatementId, StatisticItem,
};

#[derive(Debug, Default)]
pub struct TraceRun {
    pub ids: IdAllocator,
    statements: Vec<Statement>,
    frames: Vec<CallFrame>,
    roots: Vec<FrameId>,
    pub statistics: Vec<StatisticItem>,
    pub sql_by_where: Vec<SqlGroupSummary>,
    pub sql_by_from: Vec<SqlGroupSummary>,
    pub max_call_depth: usize,
    /// First frame pushed at `max_call_depth`.
    pub deepest_frame: Option<FrameId>,
    pub stack_traces: Vec<StackTraceRecord>,
}

impl TraceRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_statement(&mut self, statement: Statement) -> StatementId {
        self.statements.push(statement);
        StatementId(self.statements.len() - 1)
    }

    pub fn statement(&self, id: StatementId) -> &Statement {
        &self.statements[id.0]
    }

    pub fn statement_mut(&mut self, id: StatementId) -> &mut Statement {
        &mut self.statements[id.0]
    }

    /// All statements in creation order.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Flag a statement as failed and return its error details, creating them
    /// on first use.
    pub fn statement_error_mut(&mut self, id: StatementId) -> &mut SqlError {
        let statement = &mut self.statements[id.0];
        statement.is_error = true;
        statement.error_mut(&self.ids)
    }

    /// First statement recorded at `line_number`.
    pub fn statement_at_line(&self, line_number: u64) -> Option<StatementId> {
        self.statements
            .iter()
            .position(|s| s.line_number == line_number)
            .map(StatementId)
    }

    pub fn add_frame(&mut self, frame: CallFrame) -> FrameId {
        self.frames.push(frame);
        FrameId(self.frames.len() - 1)
    }

    pub fn frame(&self, id: FrameId) -> &CallFrame {
        &self.frames[id.0]
    }

    pub fn frame_mut(&mut self, id: FrameId) -> &mut CallFrame {
        &mut self.frames[id.0]
    }

    /// All frames in creation order.
    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    /// Top-level frames in discovery order.
    pub fn roots(&self) -> &[FrameId] {
        &self.roots
    }

    pub fn is_root(&self, id: FrameId) -> bool {
        self.roots.contains(&id)
    }

    pub fn add_root(&mut self, id: FrameId) {
        if !self.is_root(id) {
            self.roots.push(id);
        }
    }

    /// Make `child` a child of `parent`.
    ///
    /// Does nothing and returns false if `child` already has a parent, is a
    /// root, or is `parent` itself or one of its ancestors.
    pub fn attach_child(&mut self, parent: FrameId, child: FrameId) -> bool {
        if parent == child
            || self.frame(child).parent.is_some()
            || self.is_root(child)
            || self.ancestors(parent).any(|a| a == child)
        {
            return false;
        }
        self.frame_mut(child).parent = Some(parent);
        self.frame_mut(parent).children.push(child);
        true
    }

    /// Walk parent links from `id` (exclusive) to its root.
    pub fn ancestors(&self, id: FrameId) -> Ancestors<'_> {
        Ancestors {
            run: self,
            next: self.frame(id).parent,
        }
    }

    /// Number of ancestors above `id`.
    pub fn depth(&self, id: FrameId) -> usize {
        self.ancestors(id).count()
    }

    /// Flag `id` and every ancestor as errored.
    pub fn mark_error_chain(&mut self, id: FrameId) {
        let mut next = Some(id);
        while let Some(current) = next {
            let frame = self.frame_mut(current);
            frame.has_error = true;
            next = frame.parent;
        }
    }

    pub fn add_stack_trace(&mut self, line_number: u64, message: impl Into<String>) -> usize {
        let record = StackTraceRecord::new(self.ids.next_stack_trace_id(), line_number, message);
        self.stack_traces.push(record);
        self.stack_traces.len() - 1
    }

    /// Look up a statistic value by category and label.
    pub fn statistic(&self, category: &str, label: &str) -> Option<&StatisticItem> {
        self.statistics
            .iter()
            .find(|s| s.category == category && s.label == label)
    }
}

pub struct Ancestors<'a> {
    run: &'a TraceRun,
    next: Option<FrameId>,
}

impl Iterator for Ancestors<'_> {
    type Item = FrameId;

    fn next(&mut self) -> Option<FrameId> {
        let current = self.next?;
        self.next = self.run.frame(current).parent;
        Some(current)
    }
}
