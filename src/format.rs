//! Fingerprint templates: how a decoded request is canonicalized into the
//! string it aggregates under.

use std::fmt::Write as _;
use std::mem;

use crate::{packet::types::RemoteEndpoint, proto::codec::QueryMessage};

/// Template used when the user supplies none.
pub const DEFAULT_TEMPLATE: &str = "#b:#k";

/// Request attributes a template can splice in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Bucket,
    Key,
    Source,
    SourceIp,
    Method,
}

/// One compiled template element. The tagged variant keeps literal text
/// and field lookups apart, so a key whose bytes happen to contain `#k`
/// can never be re-expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatItem {
    Literal(String),
    Field(Field),
}

/// An aggregation-fingerprint template compiled once at startup.
///
/// `#` introduces a field token: `#b` bucket, `#k` key, `#s` source
/// `ip:port`, `#i` source ip, `#m` method, matched case-insensitively.
/// `##` is a literal `#`; an unknown `#x` passes through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatPlan {
    items: Vec<FormatItem>,
}

impl FormatPlan {
    /// Compile a template. An empty or whitespace-only template falls
    /// back to [`DEFAULT_TEMPLATE`]. A trailing lone `#` is swallowed.
    pub fn compile(template: &str) -> Self {
        let template = template.trim();
        let template = if template.is_empty() {
            DEFAULT_TEMPLATE
        } else {
            template
        };

        let mut items = Vec::new();
        let mut literal = String::new();
        let mut escaped = false;
        for ch in template.chars() {
            if escaped {
                escaped = false;
                match ch.to_ascii_lowercase() {
                    '#' => literal.push('#'),
                    'b' => push_field(&mut items, &mut literal, Field::Bucket),
                    'k' => push_field(&mut items, &mut literal, Field::Key),
                    's' => push_field(&mut items, &mut literal, Field::Source),
                    'i' => push_field(&mut items, &mut literal, Field::SourceIp),
                    'm' => push_field(&mut items, &mut literal, Field::Method),
                    _ => {
                        literal.push('#');
                        literal.push(ch);
                    }
                }
            } else if ch == '#' {
                escaped = true;
            } else {
                literal.push(ch);
            }
        }
        if !literal.is_empty() {
            items.push(FormatItem::Literal(literal));
        }

        Self { items }
    }

    /// Render the fingerprint for one decoded request on one flow.
    pub fn render(&self, source: &RemoteEndpoint, msg: &QueryMessage) -> String {
        let mut out = String::new();
        for item in &self.items {
            match item {
                FormatItem::Literal(lit) => out.push_str(lit),
                FormatItem::Field(Field::Bucket) => {
                    out.push_str(&String::from_utf8_lossy(&msg.bucket));
                }
                FormatItem::Field(Field::Key) => out.push_str(&printable_bytes(&msg.key)),
                FormatItem::Field(Field::Source) => {
                    let _ = write!(out, "{source}");
                }
                FormatItem::Field(Field::SourceIp) => {
                    let _ = write!(out, "{}", source.ip());
                }
                FormatItem::Field(Field::Method) => out.push_str(msg.method.as_str()),
            }
        }
        out
    }
}

fn push_field(items: &mut Vec<FormatItem>, literal: &mut String, field: Field) {
    if !literal.is_empty() {
        items.push(FormatItem::Literal(mem::take(literal)));
    }
    items.push(FormatItem::Field(field));
}

/// Escape bytes outside `[0x20, 0x7E]` as `\xHH` for display.
pub fn printable_bytes(input: &[u8]) -> String {
    let mut out = String::with_capacity(input.len());
    for &b in input {
        if (0x20..=0x7E).contains(&b) {
            out.push(b as char);
        } else {
            let _ = write!(out, "\\x{b:02x}");
        }
    }
    out
}
