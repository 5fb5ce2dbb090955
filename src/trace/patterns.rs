//! Marker patterns recognized in COBOL runtime trace lines.
//!
//! All patterns are compiled once at first use. Timestamps in the trace look
//! like `12:00:01.250`, followed by the runtime's own line counter, two timing
//! columns and the `#<cursor>` handle.

use std::sync::LazyLock;

use regex::Regex;

/// Lines that match none of these markers are noise.
pub static LINE_VALID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(CEX Stmt=)|(COM Stmt=)|(GETSTMT Stmt=)|(GETSTMT Stmt\(cached\)=)",
        r"|(Bind position=\d+)|(Bind-\d+)|(Commit)|(Disconnect)",
        r"|(RC=\d+\s+Fetch)|(RC=\d+\s+EXE)|(EPO error pos=)|(ERR rtncd=)",
        r"|(>>>\s)|(<<<\s)",
    ))
    .expect("Invalid line filter regex pattern")
});

/// `<time> <trace line> ... #<cursor> ... COM Stmt=<text>`
pub static NEW_STATEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+:\d+:\d+.\d+\s*(\d+).*#(\d+).*(COM|CEX) Stmt=(.*)")
        .expect("Invalid statement regex pattern")
});

pub static STATEMENT_RC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"RC=(\d+)\s+(?:COM|CEX) Stmt=").expect("Invalid statement RC regex pattern")
});

/// Name announced on the line before a statement.
pub static STATEMENT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"GETSTMT Stmt(\(cached\)|)=(\w+)").expect("Invalid statement name regex pattern")
});

pub static LINE_AND_CURSOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+:\d+:\d+.\d+\s*(\d+).*#(\d+)").expect("Invalid cursor regex pattern")
});

pub static DISCONNECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#(\d+)\s+RC=\d+\s+Disconnect").expect("Invalid disconnect regex pattern")
});

pub static CURSOR_ACTIVITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#(\d+)\s+RC=\d+\s+(Fetch|EXE)\b").expect("Invalid cursor activity regex pattern")
});

/// Second timing column: time elapsed since the previous trace line.
pub static DELTA_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+:\d+:\d+.\d+\s+\d+\s+\d+\.\d+\s+(\d+\.\d+)\s+#\d+")
        .expect("Invalid delta time regex pattern")
});

pub static BIND_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Bind(\sposition=|-)(\d+), type=(\w+)").expect("Invalid bind regex pattern")
});

pub static BIND_LENGTH_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"length=(\d+), value=(.*)").expect("Invalid bind value regex pattern")
});

pub static BIND_DECIMAL_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"precision=(\d+), scale=(\d+), value=(.*)")
        .expect("Invalid decimal bind value regex pattern")
});

pub static ERROR_POSITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"EPO error pos=(\d+)").expect("Invalid error position regex pattern")
});

pub static ERROR_MESSAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ERR rtncd=(\d+) msg=(.*)").expect("Invalid error message regex pattern")
});

pub static PROGRAM_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r">>>\s+(start-ext|start|resume|call)\s+Nest=(\S+)\s+(\S+)")
        .expect("Invalid start marker regex pattern")
});

pub static PROGRAM_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<<<\s+(end-ext|end|reend)\s+Nest=(\S+)\s+(\S+)(?:.*?\bDur=(\d+(?:\.\d+)?))?")
        .expect("Invalid end marker regex pattern")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_statement_captures() {
        let line = "10:02:03.100   42 0.010 0.001 #3 RC=0 COM Stmt=SELECT 1 FROM DUAL";
        let caps = NEW_STATEMENT_RE.captures(line).unwrap();
        assert_eq!(&caps[1], "42");
        assert_eq!(&caps[2], "3");
        assert_eq!(&caps[3], "COM");
        assert_eq!(&caps[4], "SELECT 1 FROM DUAL");

        let rc = STATEMENT_RC_RE.captures(line).unwrap();
        assert_eq!(&rc[1], "0");
    }

    #[test]
    fn test_end_marker_duration_is_optional() {
        let caps = PROGRAM_END_RE
            .captures("<<< end Nest=00 FuncA Dur=0.02 CPU=0.01")
            .unwrap();
        assert_eq!(&caps[1], "end");
        assert_eq!(&caps[2], "00");
        assert_eq!(&caps[3], "FuncA");
        assert_eq!(caps.get(4).map(|m| m.as_str()), Some("0.02"));

        let caps = PROGRAM_END_RE.captures("<<< reend Nest=01 FuncB").unwrap();
        assert_eq!(&caps[1], "reend");
        assert!(caps.get(4).is_none());
    }

    #[test]
    fn test_start_ext_is_not_plain_start() {
        let caps = PROGRAM_START_RE
            .captures(">>> start-ext Nest=02 EXT.PROG")
            .unwrap();
        assert_eq!(&caps[1], "start-ext");
        assert_eq!(&caps[3], "EXT.PROG");
    }

    #[test]
    fn test_delta_time_column() {
        let line = "10:02:03.100 44 0.250 0.125 #3 RC=0 Fetch";
        let caps = DELTA_TIME_RE.captures(line).unwrap();
        assert_eq!(&caps[1], "0.125");
        let activity = CURSOR_ACTIVITY_RE.captures(line).unwrap();
        assert_eq!(&activity[1], "3");
        assert_eq!(&activity[2], "Fetch");
    }

    #[test]
    fn test_line_filter() {
        assert!(LINE_VALID_RE.is_match("#1 RC=0 Commit"));
        assert!(LINE_VALID_RE.is_match(">>> start Nest=00 FuncA"));
        assert!(!LINE_VALID_RE.is_match("10:02:03.100 40 0.0 0.0 #1 RC=0 Connect"));
    }
}
