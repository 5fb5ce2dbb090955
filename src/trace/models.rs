//! Call tree and run-level record types.
//!
//! Frames and statements live in arenas owned by [`TraceRun`](crate::run::TraceRun)
//! and refer to each other through the index handles defined here. A parent owns
//! its children through `children`; the child only keeps a `parent` handle for
//! ancestor walks.

use std::fmt;

use serde::Serialize;

/// Handle of a [`Statement`](crate::statement::Statement) inside a run's statement arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StatementId(pub usize);

/// Handle of a [`CallFrame`] inside a run's frame arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FrameId(pub usize);

/// What produced a call frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum CallKind {
    /// `>>> start` / `>>> resume`
    Normal,
    /// `>>> call`
    Call,
    /// `>>> start-ext`
    External,
    /// SQL execution bound to a cursor's statement when it was created.
    CobolSql,
    /// SQL execution whose statement is resolved by start line during linkage.
    Sql,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Call => "call",
            Self::External => "external",
            Self::CobolSql => "cobol-sql",
            Self::Sql => "sql",
        }
    }

    /// True for frames that represent an SQL execution.
    pub fn is_sql(&self) -> bool {
        matches!(self, Self::CobolSql | Self::Sql)
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key used to decide how frames nest.
///
/// SQL frames are keyed by their cursor number, which doubles as an indent
/// level. Programmatic frames are keyed by the runtime's nest token plus the
/// function name, and only an end marker carrying both closes them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum NestKey {
    Cursor(u32),
    Nest { nest: String, function: String },
}

impl NestKey {
    pub fn cursor(&self) -> Option<u32> {
        match self {
            Self::Cursor(c) => Some(*c),
            Self::Nest { .. } => None,
        }
    }

    pub fn nest(&self) -> Option<&str> {
        match self {
            Self::Cursor(_) => None,
            Self::Nest { nest, .. } => Some(nest),
        }
    }

    /// True if this is a programmatic key with the given nest token and function.
    pub fn matches_nest(&self, nest: &str, function: &str) -> bool {
        match self {
            Self::Cursor(_) => false,
            Self::Nest {
                nest: n,
                function: f,
            } => n == nest && f == function,
        }
    }
}

/// One node of the reconstructed call tree.
#[derive(Clone, Debug, Serialize)]
pub struct CallFrame {
    pub id: u64,
    pub kind: CallKind,
    pub context: String,
    pub start_line: u64,
    stop_line: Option<u64>,
    pub key: NestKey,
    /// Function name for programmatic frames, statement text for SQL frames.
    pub function: String,
    pub duration: f64,
    pub has_error: bool,
    pub statement: Option<StatementId>,
    /// Index into the run's stack trace list.
    pub stack_trace: Option<usize>,
    pub(crate) parent: Option<FrameId>,
    pub(crate) children: Vec<FrameId>,
}

impl CallFrame {
    pub fn new(
        id: u64,
        kind: CallKind,
        key: NestKey,
        function: String,
        context: String,
        start_line: u64,
    ) -> Self {
        Self {
            id,
            kind,
            context,
            start_line,
            stop_line: None,
            key,
            function,
            duration: 0.0,
            has_error: false,
            statement: None,
            stack_trace: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn stop_line(&self) -> Option<u64> {
        self.stop_line
    }

    pub fn is_open(&self) -> bool {
        self.stop_line.is_none()
    }

    /// Set the stop line if it has not been set yet.
    ///
    /// Returns false (and changes nothing) when the frame was already closed.
    pub fn close(&mut self, line_number: u64) -> bool {
        if self.stop_line.is_some() {
            return false;
        }
        self.stop_line = Some(line_number);
        true
    }

    /// True if `line_number` falls within `[start_line, stop_line]`.
    /// Open frames contain nothing.
    pub fn contains_line(&self, line_number: u64) -> bool {
        match self.stop_line {
            Some(stop) => self.start_line <= line_number && line_number <= stop,
            None => false,
        }
    }

    pub fn parent(&self) -> Option<FrameId> {
        self.parent
    }

    pub fn children(&self) -> &[FrameId] {
        &self.children
    }
}

/// An externally parsed stack trace entry that the linkage pass attaches to
/// the frame active at its line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StackTraceRecord {
    pub id: u64,
    pub line_number: u64,
    pub message: String,
    pub frame: Option<FrameId>,
}

impl StackTraceRecord {
    pub fn new(id: u64, line_number: u64, message: impl Into<String>) -> Self {
        Self {
            id,
            line_number,
            message: message.into(),
            frame: None,
        }
    }
}

/// What a statistic points at, if anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum StatTag {
    Statement(StatementId),
    Frame(FrameId),
}

/// One named statistic produced by the linkage pass.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatisticItem {
    pub category: String,
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<StatTag>,
}

impl StatisticItem {
    pub fn new(category: &str, label: &str, value: impl ToString) -> Self {
        Self {
            category: category.to_string(),
            label: label.to_string(),
            value: value.to_string(),
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: StatTag) -> Self {
        self.tag = Some(tag);
        self
    }
}

/// Statements grouped by a clause (WHERE text or target table text).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SqlGroupSummary {
    pub clause: String,
    pub call_count: usize,
    pub total_time: f64,
    pub has_error: bool,
}
