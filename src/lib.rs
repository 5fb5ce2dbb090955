//! cobtrace library - COBOL runtime SQL trace analysis.
//!
//! Reads the line-oriented trace emitted by the COBOL runtime and rebuilds
//! what happened: the SQL statements issued (with their binds, timings and
//! errors), the cursors they ran on, and the tree of program and SQL calls.
//!
//! # Modules
//!
//! - [`chain`] - the call chain builder, fed one line at a time
//! - [`statement`] / [`bind`] - SQL statement and bind parameter parsing
//! - [`cursor`] - cursor number to statement table
//! - [`linkage`] - end-of-run linkage and statistics
//! - [`source`] - drive a processor over a file or reader
//! - [`report`] - text and JSON rendering of a finished run
//!
//! # Example
//!
//! ```no_run
//! use cobtrace::{source, ProcessorConfig};
//! use std::path::Path;
//!
//! let run = source::process_file(Path::new("./trace.log"), ProcessorConfig::default())
//!     .expect("Failed to process trace");
//! println!("{} calls", run.frames().len());
//! ```

pub mod bind;
pub mod chain;
pub mod classify;
pub mod config;
pub mod cursor;
pub mod error;
pub mod ids;
pub mod linkage;
pub mod processor;
pub mod report;
pub mod run;
pub mod source;
pub mod statement;
pub mod trace;

pub use bind::{BindLayout, BoundParameter};
pub use chain::CobolTraceProcessor;
pub use config::ProcessorConfig;
pub use error::{Result, TraceError};
pub use processor::TraceProcessor;
pub use run::TraceRun;
pub use statement::{sql_id, SqlError, SqlType, Statement};
pub use trace::models::{CallFrame, CallKind, FrameId, StatementId};
