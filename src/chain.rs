//! Call chain builder for COBOL runtime traces.
//!
//! The builder is a stack machine fed one line at a time. Programmatic calls
//! (`>>> start` / `<<< end`) push and pop frames explicitly. SQL executions
//! have no end marker: a new execution on a cursor implicitly closes the
//! previous execution on the same cursor and any SQL frame at an equal or
//! deeper cursor, and the frame is attached under whatever programmatic frame
//! is left on top.
//!
//! Nothing in the trace says "this cursor is being executed again". The
//! builder infers it by comparing each line with the one before: a change of
//! cursor, or a bind position sequence that restarts, starts a new execution
//! of the statement already open on that cursor.

use tracing::{debug, warn};

use crate::bind::{parse_bind, BoundParameter};
use crate::classify::{classify, ClassifiedLine, CursorActivity, CursorMark, LineEvent, LineMarks};
use crate::config::ProcessorConfig;
use crate::cursor::CursorTable;
use crate::error::{Result, TraceError};
use crate::linkage;
use crate::processor::TraceProcessor;
use crate::run::TraceRun;
use crate::statement::Statement;
use crate::trace::models::{CallFrame, CallKind, FrameId, NestKey, StatementId};

/// Builds the call tree and statement catalog of one COBOL trace run.
#[derive(Debug)]
pub struct CobolTraceProcessor {
    config: ProcessorConfig,
    stack: Vec<FrameId>,
    cursors: CursorTable,
    previous: LineMarks,
    active: Option<StatementId>,
}

impl CobolTraceProcessor {
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            config,
            stack: Vec::new(),
            cursors: CursorTable::new(),
            previous: LineMarks::default(),
            active: None,
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Frames currently open, bottom of the stack first.
    pub fn open_frames(&self) -> &[FrameId] {
        &self.stack
    }

    pub fn cursors(&self) -> &CursorTable {
        &self.cursors
    }

    /// Statement that bind and error lines currently apply to.
    pub fn active_statement(&self) -> Option<StatementId> {
        self.active
    }

    fn push(&mut self, run: &mut TraceRun, id: FrameId) {
        self.stack.push(id);
        if self.stack.len() > run.max_call_depth {
            run.max_call_depth = self.stack.len();
            run.deepest_frame = Some(id);
        }
    }

    /// Pop the top frame, closing it at `line_number` if it is still open.
    fn pop_and_close(&mut self, run: &mut TraceRun, line_number: u64) {
        if let Some(top) = self.stack.pop() {
            run.frame_mut(top).close(line_number);
        }
    }

    /// Place a new SQL frame in the tree and push it.
    fn attach_sql_frame(
        &mut self,
        run: &mut TraceRun,
        frame: CallFrame,
        line_number: u64,
    ) -> FrameId {
        let cursor = frame.key.cursor();

        // Another execution on the same cursor closes the previous one.
        if let Some(&top) = self.stack.last() {
            if run.frame(top).key == frame.key {
                self.pop_and_close(run, line_number);
            }
        }

        // SQL never nests under SQL at an equal or deeper cursor.
        if let (Some(&top), Some(cursor)) = (self.stack.last(), cursor) {
            if run.frame(top).kind.is_sql() {
                while let Some(&top) = self.stack.last() {
                    match run.frame(top).key.cursor() {
                        Some(c) if c >= cursor => self.pop_and_close(run, line_number),
                        _ => break,
                    }
                }
            }
        }

        let id = run.add_frame(frame);
        match self.stack.last() {
            Some(&parent) => {
                run.attach_child(parent, id);
            }
            None => run.add_root(id),
        }
        self.push(run, id);
        id
    }

    fn start_statement(
        &mut self,
        run: &mut TraceRun,
        trace_line: u64,
        cursor: u32,
        rc: Option<u32>,
        text: &str,
        line_number: u64,
    ) {
        let mut statement = Statement::parse(&run.ids, text);
        statement.name = self.previous.statement_name.clone();
        statement.cursor_number = cursor;
        statement.rc_number = rc;
        statement.cobol = true;
        statement.context = format!("Cursor: {cursor} Line Number: {trace_line}");
        statement.line_number = line_number;

        let mut frame = CallFrame::new(
            run.ids.next_frame_id(),
            CallKind::CobolSql,
            NestKey::Cursor(cursor),
            statement.text().to_string(),
            statement.context.clone(),
            line_number,
        );

        let id = run.add_statement(statement);
        self.cursors.bind(cursor, id);
        self.active = Some(id);

        frame.statement = Some(id);
        let frame_id = self.attach_sql_frame(run, frame, line_number);
        debug!(line_number, cursor, frame = frame_id.0, "new statement");
    }

    /// Start another execution of whatever is open on the marked cursor.
    fn reexecute(&mut self, run: &mut TraceRun, mark: CursorMark, line_number: u64) {
        let CursorMark { trace_line, cursor } = mark;
        let context = format!("Cursor: {cursor} Line Number: {trace_line}");
        let frame_id = run.ids.next_frame_id();

        let frame = match self.cursors.statement(cursor) {
            Some(id) => {
                let statement = run.statement_mut(id);
                statement.binds.clear();
                statement.line_number = line_number;
                let mut frame = CallFrame::new(
                    frame_id,
                    CallKind::CobolSql,
                    NestKey::Cursor(cursor),
                    statement.text().to_string(),
                    context,
                    line_number,
                );
                frame.statement = Some(id);
                self.active = Some(id);
                frame
            }
            None => {
                debug!(line_number, cursor, "execution on cursor with no open statement");
                self.active = None;
                CallFrame::new(
                    frame_id,
                    CallKind::Sql,
                    NestKey::Cursor(cursor),
                    String::new(),
                    context,
                    line_number,
                )
            }
        };

        self.attach_sql_frame(run, frame, line_number);
    }

    fn start_program(
        &mut self,
        run: &mut TraceRun,
        kind: CallKind,
        nest: String,
        function: String,
        line_number: u64,
    ) {
        let frame = CallFrame::new(
            run.ids.next_frame_id(),
            kind,
            NestKey::Nest {
                nest: nest.clone(),
                function: function.clone(),
            },
            function,
            format!("Nest={nest}"),
            line_number,
        );
        let id = run.add_frame(frame);
        if self.stack.is_empty() {
            run.add_root(id);
        }
        self.push(run, id);
    }

    fn find_open(&self, run: &TraceRun, nest: &str, function: &str) -> Option<usize> {
        self.stack
            .iter()
            .rposition(|&id| run.frame(id).key.matches_nest(nest, function))
    }

    /// Close the frame started with the same nest token and function.
    ///
    /// Frames above it on the stack are closed too and, if nothing owns them
    /// yet, attached to the frame beneath them.
    fn end_program(
        &mut self,
        run: &mut TraceRun,
        position: usize,
        duration: Option<f64>,
        line_number: u64,
    ) {
        let unwound = self.stack.split_off(position + 1);
        let Some(matched) = self.stack.pop() else {
            return;
        };

        let mut below = matched;
        for &id in &unwound {
            run.frame_mut(id).close(line_number);
            if run.frame(id).parent().is_none() && !run.is_root(id) {
                debug!(line_number, frame = id.0, "closing unterminated frame");
                run.attach_child(below, id);
            }
            below = id;
        }

        let frame = run.frame_mut(matched);
        frame.close(line_number);
        if let Some(duration) = duration {
            frame.duration = duration;
        }
        let top_level = frame.key.nest() == Some(self.config.top_level_nest.as_str());

        match self.stack.last() {
            Some(&parent) if !top_level => {
                run.attach_child(parent, matched);
            }
            _ => {
                if run.frame(matched).parent().is_none() {
                    run.add_root(matched);
                }
            }
        }
    }

    fn record_activity(
        &mut self,
        run: &mut TraceRun,
        cursor: u32,
        activity: CursorActivity,
        delta: Option<f64>,
    ) {
        if !self.config.cursor_activity {
            return;
        }
        let Some(id) = self.cursors.statement(cursor) else {
            debug!(cursor, "activity on cursor with no open statement");
            return;
        };
        let statement = run.statement_mut(id);
        let delta = delta.unwrap_or(0.0);
        match activity {
            CursorActivity::Fetch => {
                statement.fetch_count += 1;
                statement.fetch_time += delta;
            }
            CursorActivity::Execute => statement.exec_time += delta,
        }
    }

    fn add_bind(&mut self, run: &mut TraceRun, bind: BoundParameter, line_number: u64) {
        match self.active {
            Some(id) => run.statement_mut(id).binds.push(bind),
            None => warn!(line_number, index = bind.index, "bind with no active statement"),
        }
    }

    /// New execution if the cursor changed, or if the bind positions on the
    /// same cursor restarted.
    fn is_new_execution(current: &LineMarks, previous: &LineMarks) -> bool {
        let (Some(cur), Some(prev)) = (current.cursor, previous.cursor) else {
            return false;
        };
        if cur.cursor != prev.cursor {
            return true;
        }
        match (current.bind_position, previous.bind_position) {
            (Some(cur), Some(prev)) => cur == 1 || cur < prev,
            _ => false,
        }
    }
}

impl Default for CobolTraceProcessor {
    fn default() -> Self {
        Self::new(ProcessorConfig::default())
    }
}

impl TraceProcessor for CobolTraceProcessor {
    fn init(&mut self, _run: &mut TraceRun) {
        self.stack.clear();
        self.cursors = CursorTable::new();
        self.previous = LineMarks::default();
        self.active = None;
    }

    fn process_line(&mut self, run: &mut TraceRun, text: &str, line_number: u64) -> Result<()> {
        // Everything that can fail runs before any state changes.
        let ClassifiedLine { marks, event } = classify(text, line_number)?;
        let bind = match event {
            LineEvent::Bind => Some(parse_bind(&run.ids, text, line_number)?),
            _ => None,
        };
        let end_position = match &event {
            LineEvent::ProgramEnd { nest, function, .. } => Some(
                self.find_open(run, nest, function)
                    .ok_or_else(|| TraceError::UnmatchedEnd {
                        nest: nest.clone(),
                        function: function.clone(),
                        line_number,
                    })?,
            ),
            _ => None,
        };

        // Disconnects take no part in the cursor/bind comparison with the next line.
        let remember = !matches!(event, LineEvent::Disconnect { .. });

        match event {
            LineEvent::Noise => {}
            LineEvent::NewStatement {
                trace_line,
                cursor,
                rc,
                text,
            } => self.start_statement(run, trace_line, cursor, rc, &text, line_number),
            LineEvent::Disconnect { cursor } => {
                self.cursors.disconnect(cursor);
                debug!(
                    line_number,
                    cursor,
                    open = self.cursors.open_count(),
                    "cursor disconnect"
                );
            }
            LineEvent::Activity {
                cursor,
                activity,
                delta,
            } => self.record_activity(run, cursor, activity, delta),
            LineEvent::ErrorPosition { position } => match self.active {
                Some(id) => run.statement_error_mut(id).position = Some(position),
                None => warn!(line_number, "error position with no active statement"),
            },
            LineEvent::ErrorMessage {
                return_code,
                message,
            } => match self.active {
                Some(id) => {
                    let error = run.statement_error_mut(id);
                    error.return_code = Some(return_code);
                    error.message = Some(message);
                }
                None => warn!(line_number, return_code, "error message with no active statement"),
            },
            event => {
                if let Some(mark) = marks.cursor {
                    if Self::is_new_execution(&marks, &self.previous) {
                        self.reexecute(run, mark, line_number);
                    }
                }
                match event {
                    LineEvent::Bind => {
                        if let Some(bind) = bind {
                            self.add_bind(run, bind, line_number);
                        }
                    }
                    LineEvent::ProgramStart {
                        kind,
                        nest,
                        function,
                    } => self.start_program(run, kind, nest, function, line_number),
                    LineEvent::ProgramEnd { duration, .. } => {
                        if let Some(position) = end_position {
                            self.end_program(run, position, duration, line_number);
                        }
                    }
                    _ => {}
                }
            }
        }

        if remember {
            self.previous = marks;
        }
        Ok(())
    }

    fn complete(&mut self, run: &mut TraceRun) -> Result<()> {
        if !self.stack.is_empty() {
            warn!(open = self.stack.len(), "trace ended with frames still open");
        }
        for pair in self.stack.windows(2) {
            let (below, id) = (pair[0], pair[1]);
            if run.frame(id).parent().is_none() && !run.is_root(id) {
                run.attach_child(below, id);
            }
        }
        self.stack.clear();
        self.active = None;

        linkage::finalize(run, &self.config);
        Ok(())
    }
}
