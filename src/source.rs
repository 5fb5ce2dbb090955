//! Feed trace lines from a reader or file through a processor.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::chain::CobolTraceProcessor;
use crate::config::ProcessorConfig;
use crate::error::Result;
use crate::processor::TraceProcessor;
use crate::run::TraceRun;

/// Run `processor` over every line of `reader` and complete it.
///
/// Lines are numbered from 1. Bytes that are not valid UTF-8 are replaced
/// rather than rejected; the runtime writes whatever the program passed it.
/// Stack trace records must already be in `run` when this is called.
pub fn process_reader<P, R>(processor: &mut P, run: &mut TraceRun, mut reader: R) -> Result<()>
where
    P: TraceProcessor + ?Sized,
    R: BufRead,
{
    processor.init(run);

    let mut buf = Vec::new();
    let mut line_number = 0u64;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_number += 1;
        let line = String::from_utf8_lossy(trim_line_ending(&buf));
        processor.process_line(run, &line, line_number)?;
    }

    debug!(lines = line_number, "end of trace input");
    processor.complete(run)
}

/// Process a trace file with a fresh [`CobolTraceProcessor`].
pub fn process_file(path: &Path, config: ProcessorConfig) -> Result<TraceRun> {
    let file = File::open(path)?;
    let mut run = TraceRun::new();
    let mut processor = CobolTraceProcessor::new(config);
    process_reader(&mut processor, &mut run, BufReader::new(file))?;
    Ok(run)
}

/// Process trace text held in memory.
pub fn process_str(text: &str, config: ProcessorConfig) -> Result<TraceRun> {
    let mut run = TraceRun::new();
    let mut processor = CobolTraceProcessor::new(config);
    process_reader(&mut processor, &mut run, text.as_bytes())?;
    Ok(run)
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}
