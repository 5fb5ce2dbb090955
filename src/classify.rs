//! Single-pass line classifier.
//!
//! Each trace line is matched against the marker patterns once, in a fixed
//! precedence order, and turned into a [`LineEvent`] carrying the captured
//! fields. The call chain builder then drives its state machine from a single
//! `match` on the event. [`LineMarks`] holds the captures the builder needs to
//! remember about the *previous* line (cursor, bind position, statement name),
//! and is filled in for every line, noise included.

use crate::bind::parse_number;
use crate::error::{Result, TraceError};
use crate::trace::models::CallKind;
use crate::trace::patterns::{
    BIND_TYPE_RE, CURSOR_ACTIVITY_RE, DELTA_TIME_RE, DISCONNECT_RE, ERROR_MESSAGE_RE,
    ERROR_POSITION_RE, LINE_AND_CURSOR_RE, LINE_VALID_RE, NEW_STATEMENT_RE, PROGRAM_END_RE,
    PROGRAM_START_RE, STATEMENT_NAME_RE, STATEMENT_RC_RE,
};

/// Trace-internal line counter and cursor handle found at the start of a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorMark {
    pub trace_line: u64,
    pub cursor: u32,
}

/// Captures remembered from a line for comparison with the next one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineMarks {
    pub cursor: Option<CursorMark>,
    pub bind_position: Option<u32>,
    pub statement_name: Option<String>,
}

impl LineMarks {
    pub fn scan(line: &str) -> Self {
        let cursor = LINE_AND_CURSOR_RE.captures(line).and_then(|caps| {
            Some(CursorMark {
                trace_line: caps[1].parse().ok()?,
                cursor: caps[2].parse().ok()?,
            })
        });
        let bind_position = BIND_TYPE_RE
            .captures(line)
            .and_then(|caps| caps[2].parse().ok());
        let statement_name = STATEMENT_NAME_RE
            .captures(line)
            .map(|caps| caps[2].to_string());

        Self {
            cursor,
            bind_position,
            statement_name,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorActivity {
    Fetch,
    Execute,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LineEvent {
    /// Matches no recognized marker.
    Noise,
    NewStatement {
        trace_line: u64,
        cursor: u32,
        rc: Option<u32>,
        text: String,
    },
    Disconnect {
        cursor: u32,
    },
    Activity {
        cursor: u32,
        activity: CursorActivity,
        delta: Option<f64>,
    },
    ErrorPosition {
        position: u32,
    },
    ErrorMessage {
        return_code: u32,
        message: String,
    },
    ProgramStart {
        kind: CallKind,
        nest: String,
        function: String,
    },
    ProgramEnd {
        nest: String,
        function: String,
        duration: Option<f64>,
    },
    /// Bind line; the payload is parsed by [`crate::bind::parse_bind`].
    Bind,
    /// Recognized marker with no transition of its own (commit, GETSTMT, ...).
    Other,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassifiedLine {
    pub marks: LineMarks,
    pub event: LineEvent,
}

/// Classify one line. Fails only when a marker is recognized but one of its
/// numeric captures cannot be parsed.
pub fn classify(line: &str, line_number: u64) -> Result<ClassifiedLine> {
    let marks = LineMarks::scan(line);
    let event = classify_event(line, line_number)?;
    Ok(ClassifiedLine { marks, event })
}

fn classify_event(line: &str, line_number: u64) -> Result<LineEvent> {
    if !LINE_VALID_RE.is_match(line) {
        return Ok(LineEvent::Noise);
    }

    if let Some(caps) = NEW_STATEMENT_RE.captures(line) {
        let rc = match STATEMENT_RC_RE.captures(line) {
            Some(rc) => Some(parse_number(&rc[1], line, line_number)?),
            None => None,
        };
        return Ok(LineEvent::NewStatement {
            trace_line: parse_u64(&caps[1], line, line_number)?,
            cursor: parse_number(&caps[2], line, line_number)?,
            rc,
            text: caps[4].to_string(),
        });
    }

    if let Some(caps) = DISCONNECT_RE.captures(line) {
        return Ok(LineEvent::Disconnect {
            cursor: parse_number(&caps[1], line, line_number)?,
        });
    }

    if let Some(caps) = CURSOR_ACTIVITY_RE.captures(line) {
        let activity = match &caps[2] {
            "Fetch" => CursorActivity::Fetch,
            _ => CursorActivity::Execute,
        };
        let delta = DELTA_TIME_RE
            .captures(line)
            .map(|d| parse_f64(&d[1], line, line_number))
            .transpose()?;
        return Ok(LineEvent::Activity {
            cursor: parse_number(&caps[1], line, line_number)?,
            activity,
            delta,
        });
    }

    if let Some(caps) = ERROR_POSITION_RE.captures(line) {
        return Ok(LineEvent::ErrorPosition {
            position: parse_number(&caps[1], line, line_number)?,
        });
    }

    if let Some(caps) = ERROR_MESSAGE_RE.captures(line) {
        return Ok(LineEvent::ErrorMessage {
            return_code: parse_number(&caps[1], line, line_number)?,
            message: caps[2].trim_end().to_string(),
        });
    }

    if let Some(caps) = PROGRAM_START_RE.captures(line) {
        let kind = match &caps[1] {
            "start-ext" => CallKind::External,
            "call" => CallKind::Call,
            _ => CallKind::Normal,
        };
        return Ok(LineEvent::ProgramStart {
            kind,
            nest: caps[2].to_string(),
            function: caps[3].to_string(),
        });
    }

    if let Some(caps) = PROGRAM_END_RE.captures(line) {
        let duration = caps
            .get(4)
            .map(|m| parse_f64(m.as_str(), line, line_number))
            .transpose()?;
        return Ok(LineEvent::ProgramEnd {
            nest: caps[2].to_string(),
            function: caps[3].to_string(),
            duration,
        });
    }

    if BIND_TYPE_RE.is_match(line) {
        return Ok(LineEvent::Bind);
    }

    Ok(LineEvent::Other)
}

fn parse_u64(digits: &str, line: &str, line_number: u64) -> Result<u64> {
    digits
        .parse()
        .map_err(|e| TraceError::malformed(line_number, line, format!("bad number {digits}: {e}")))
}

fn parse_f64(text: &str, line: &str, line_number: u64) -> Result<f64> {
    text.parse()
        .map_err(|e| TraceError::malformed(line_number, line, format!("bad duration {text}: {e}")))
}
