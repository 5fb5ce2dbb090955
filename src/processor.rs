//! Lifecycle shared by trace processors.
//!
//! A processor is bound to one [`TraceRun`] with `init`, fed every line of the
//! trace in order with `process_line`, and finished with a single `complete`
//! once the last line has been submitted. Processors keep their own per-run
//! state (stacks, buffers) and write everything callers may read into the run.

use crate::error::Result;
use crate::run::TraceRun;

pub trait TraceProcessor {
    /// Prepare for a new run.
    fn init(&mut self, run: &mut TraceRun);

    /// Consume one line. `line_number` is 1-based and strictly increasing.
    ///
    /// A returned error leaves `run` and the processor exactly as they were
    /// before the call; the caller is expected to stop the run.
    fn process_line(&mut self, run: &mut TraceRun, text: &str, line_number: u64) -> Result<()>;

    /// Finish the run. Must be called once, after the last line.
    fn complete(&mut self, run: &mut TraceRun) -> Result<()>;
}
