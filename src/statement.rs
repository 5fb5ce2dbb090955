//! SQL statement records and the parser that derives their clauses.
//!
//! A [`Statement`] is built once from the raw statement text captured off a
//! `COM Stmt=` / `CEX Stmt=` line. Type, clauses, table list and the
//! content-hash SQL ID are derived at construction and cannot be changed
//! afterwards; everything else (binds, timing, error state) is filled in while
//! the trace is processed.
//!
//! The SQL ID is compared across tool versions, so [`sql_id`] must stay
//! byte-for-byte compatible: MD5 over the ASCII text plus a trailing NUL,
//! bytes 8..12 and 12..16 read as little-endian words, rendered as 13 base-32
//! digits.

use std::fmt;
use std::sync::LazyLock;

use md5::{Digest, Md5};
use regex::Regex;
use serde::Serialize;

use crate::bind::BoundParameter;
use crate::ids::IdAllocator;

const SQL_ID_ALPHABET: &[u8; 32] = b"0123456789abcdfghjkmnpqrstuvwxyz";
const SQL_ID_LEN: usize = 13;

static WHERE_CLAUSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i) WHERE (.*?)(ORDER|$)").expect("Invalid WHERE clause regex pattern")
});

static SELECT_FROM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+FROM\s*(.*?)\s*(WHERE|$)").expect("Invalid SELECT FROM regex pattern")
});

static UPDATE_TARGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)UPDATE\s*(.*?)\s*(SET|$)").expect("Invalid UPDATE target regex pattern")
});

static INSERT_TARGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)INTO\s*(.*?)\s*(VALUES|\(|$)").expect("Invalid INSERT target regex pattern")
});

static DELETE_TARGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)DELETE FROM\s*(.*?)\s*(WHERE|$)").expect("Invalid DELETE target regex pattern")
});

/// Statement kinds recognized by their leading keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum SqlType {
    Select,
    Update,
    Delete,
    Insert,
}

impl SqlType {
    /// Classify by case-insensitive keyword prefix, checked SELECT, UPDATE,
    /// DELETE, INSERT in that order.
    pub fn classify(text: &str) -> Option<Self> {
        [Self::Select, Self::Update, Self::Delete, Self::Insert]
            .into_iter()
            .find(|t| starts_with_ignore_case(text, t.as_str()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Insert => "INSERT",
        }
    }

    fn target_pattern(&self) -> &'static Regex {
        match self {
            Self::Select => &SELECT_FROM_RE,
            Self::Update => &UPDATE_TARGET_RE,
            Self::Insert => &INSERT_TARGET_RE,
            Self::Delete => &DELETE_TARGET_RE,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Error details reported by the runtime for a failed statement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SqlError {
    pub id: u64,
    pub position: Option<u32>,
    pub return_code: Option<u32>,
    pub message: Option<String>,
}

/// One SQL statement execution instance.
#[derive(Clone, Debug, Serialize)]
pub struct Statement {
    pub id: u64,
    pub line_number: u64,
    pub cursor_number: u32,
    pub name: Option<String>,
    text: String,
    sql_type: Option<SqlType>,
    where_clause: String,
    from_clause: String,
    tables: Vec<String>,
    sql_id: String,
    pub binds: Vec<BoundParameter>,
    pub exec_time: f64,
    pub fetch_time: f64,
    pub fetch_count: u32,
    /// `RC=` value on the statement line.
    pub rc_number: Option<u32>,
    pub is_error: bool,
    pub error: Option<SqlError>,
    pub cobol: bool,
    pub context: String,
}

impl Statement {
    /// Build a statement from raw text, deriving type, clauses, tables and SQL ID.
    ///
    /// Text that starts with none of the recognized keywords gets no type and
    /// empty WHERE, FROM and table fields; only its SQL ID is derived.
    pub fn parse(ids: &IdAllocator, raw: &str) -> Self {
        let text = raw.trim().to_string();
        let sql_type = SqlType::classify(&text);
        let (where_clause, from_clause, tables) = match sql_type {
            Some(t) => {
                let (from_clause, tables) = parse_from_clause(&text, t);
                (parse_where_clause(&text), from_clause, tables)
            }
            None => (String::new(), String::new(), Vec::new()),
        };
        let sql_id = sql_id(&text);

        Self {
            id: ids.next_statement_id(),
            line_number: 0,
            cursor_number: 0,
            name: None,
            text,
            sql_type,
            where_clause,
            from_clause,
            tables,
            sql_id,
            binds: Vec::new(),
            exec_time: 0.0,
            fetch_time: 0.0,
            fetch_count: 0,
            rc_number: None,
            is_error: false,
            error: None,
            cobol: false,
            context: String::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sql_type(&self) -> Option<SqlType> {
        self.sql_type
    }

    pub fn where_clause(&self) -> &str {
        &self.where_clause
    }

    /// FROM clause for SELECT, target table text for UPDATE/INSERT/DELETE.
    pub fn from_clause(&self) -> &str {
        &self.from_clause
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn sql_id(&self) -> &str {
        &self.sql_id
    }

    /// Execution time plus fetch time.
    pub fn duration(&self) -> f64 {
        self.exec_time + self.fetch_time
    }

    /// Error details, created on first use.
    pub fn error_mut(&mut self, ids: &IdAllocator) -> &mut SqlError {
        self.error.get_or_insert_with(|| SqlError {
            id: ids.next_error_id(),
            ..SqlError::default()
        })
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn parse_where_clause(text: &str) -> String {
    WHERE_CLAUSE_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

fn parse_from_clause(text: &str, sql_type: SqlType) -> (String, Vec<String>) {
    let clause = sql_type
        .target_pattern()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    if clause.is_empty() {
        return (clause, Vec::new());
    }

    let tables = match sql_type {
        // Keep the first word of each comma separated part, dropping aliases.
        SqlType::Select => clause
            .split(',')
            .filter_map(|part| part.split_whitespace().next())
            .map(str::to_string)
            .collect(),
        _ => vec![clause.clone()],
    };

    (clause, tables)
}

/// Compute the 13 character content-hash ID for statement text.
///
/// The text is hashed as given; callers pass the trimmed statement text.
/// Non-ASCII characters are hashed as `?`.
pub fn sql_id(text: &str) -> String {
    let mut data: Vec<u8> = text
        .chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect();
    data.push(0);

    let digest = Md5::digest(&data);
    let msb = u32::from_le_bytes([digest[8], digest[9], digest[10], digest[11]]) as u64;
    let lsb = u32::from_le_bytes([digest[12], digest[13], digest[14], digest[15]]) as u64;
    let value = (msb << 32) | lsb;

    let mut id = vec![0u8; SQL_ID_LEN];
    for (i, slot) in id.iter_mut().rev().enumerate() {
        *slot = SQL_ID_ALPHABET[((value >> (i * 5)) % 32) as usize];
    }
    id.into_iter().map(char::from).collect()
}
