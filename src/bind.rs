//! Bound parameter records and the bind-line parser.
//!
//! The runtime dumps binds in three shapes:
//!
//! ```text
//! Bind position=1, type=SQLPSTD, length=4, value=1
//! Bind-1, type=SQLPBUF, length=8, value=ABC,DEF
//! Bind-2, type=SQLPSPD, precision=9, scale=2, value=12.50
//! ```
//!
//! `SQLPSPD` binds carry precision and scale, every other type carries a byte
//! length. Values are free text and are kept exactly as captured.

use serde::Serialize;

use crate::error::{Result, TraceError};
use crate::ids::IdAllocator;
use crate::trace::patterns::{BIND_DECIMAL_VALUE_RE, BIND_LENGTH_VALUE_RE, BIND_TYPE_RE};

/// Type tag of binds that use the precision/scale layout.
pub const DECIMAL_BIND_TYPE: &str = "SQLPSPD";

/// Size information attached to a bind, selected by its type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BindLayout {
    Length(u32),
    Decimal { precision: u32, scale: u32 },
}

/// One parameter bound to a statement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BoundParameter {
    pub id: u64,
    /// 1-based bind position.
    pub index: u32,
    pub type_tag: String,
    pub layout: BindLayout,
    pub value: String,
}

impl BoundParameter {
    pub fn length(&self) -> Option<u32> {
        match self.layout {
            BindLayout::Length(len) => Some(len),
            BindLayout::Decimal { .. } => None,
        }
    }

    pub fn precision(&self) -> Option<u32> {
        match self.layout {
            BindLayout::Decimal { precision, .. } => Some(precision),
            BindLayout::Length(_) => None,
        }
    }

    pub fn scale(&self) -> Option<u32> {
        match self.layout {
            BindLayout::Decimal { scale, .. } => Some(scale),
            BindLayout::Length(_) => None,
        }
    }
}

/// Parse a line already known to contain a bind marker.
///
/// A line whose payload matches neither layout is a malformed marker.
pub fn parse_bind(ids: &IdAllocator, line: &str, line_number: u64) -> Result<BoundParameter> {
    let caps = BIND_TYPE_RE
        .captures(line)
        .ok_or_else(|| TraceError::malformed(line_number, line, "missing bind position/type"))?;
    let index = parse_number(&caps[2], line, line_number)?;
    let type_tag = caps[3].to_string();

    let (layout, value) = if type_tag == DECIMAL_BIND_TYPE {
        let caps = BIND_DECIMAL_VALUE_RE.captures(line).ok_or_else(|| {
            TraceError::malformed(line_number, line, "missing precision/scale/value")
        })?;
        let layout = BindLayout::Decimal {
            precision: parse_number(&caps[1], line, line_number)?,
            scale: parse_number(&caps[2], line, line_number)?,
        };
        (layout, caps[3].to_string())
    } else {
        let caps = BIND_LENGTH_VALUE_RE
            .captures(line)
            .ok_or_else(|| TraceError::malformed(line_number, line, "missing length/value"))?;
        let layout = BindLayout::Length(parse_number(&caps[1], line, line_number)?);
        (layout, caps[2].to_string())
    };

    Ok(BoundParameter {
        id: ids.next_bind_id(),
        index,
        type_tag,
        layout,
        value,
    })
}

pub(crate) fn parse_number(digits: &str, line: &str, line_number: u64) -> Result<u32> {
    digits
        .parse()
        .map_err(|e| TraceError::malformed(line_number, line, format!("bad number {digits}: {e}")))
}
