//! Glob patterns used as permission keys.
//!
//! Dialect: `*` matches any run of characters (empty, and across `/`), `?`
//! matches exactly one character, everything else is literal. A pattern must
//! match the whole subject.

use regex::Regex;
use tracing::warn;

/// Compile a glob into an anchored regex.
pub fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push_str("(?s)^");
    let mut literal = String::new();
    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                source.push_str(&regex::escape(&literal));
                literal.clear();
                source.push_str(if ch == '*' { ".*" } else { "." });
            }
            _ => literal.push(ch),
        }
    }
    source.push_str(&regex::escape(&literal));
    source.push('$');
    Regex::new(&source)
}

/// Whether `subject` matches `pattern`. A pattern that fails to compile
/// matches nothing.
pub fn matches(pattern: &str, subject: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if !pattern.contains(['*', '?']) {
        return pattern == subject;
    }
    match compile(pattern) {
        Ok(re) => re.is_match(subject),
        Err(e) => {
            warn!(pattern, error = %e, "permission pattern did not compile, treating as no match");
            false
        }
    }
}
