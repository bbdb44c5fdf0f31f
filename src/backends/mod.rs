//! Target language backends.
//!
//! Both backends emit the same design program; they differ only in the
//! concrete calls and literal syntax.

mod javascript;
mod python;

pub use javascript::JavascriptBackend;
pub use python::PythonBackend;

pub(crate) const DEFAULT_INDENT: usize = 2;

/// Escapes backslashes, line terminators and control characters so the text
/// fits inside a single-line string literal. Quotes are left to the caller.
pub(crate) fn escape_string_body(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' | '\u{2029}' => out.push_str(&format!("\\u{:04x}", c as u32)),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}
