//! Processor configuration.

/// Knobs for [`CobolTraceProcessor`](crate::chain::CobolTraceProcessor).
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Nest token of top-level programmatic calls. Frames with this token are
    /// not attached to the frame below them when they end.
    pub top_level_nest: String,

    /// How many lines before a stack trace's line the linkage pass also
    /// searches. Stack traces are sometimes printed just after the frame they
    /// belong to has closed.
    pub stack_trace_line_slack: u64,

    /// Count fetches and accumulate EXE/Fetch timings on statements.
    pub cursor_activity: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            top_level_nest: "00".to_string(),
            stack_trace_line_slack: 1,
            cursor_activity: true,
        }
    }
}
