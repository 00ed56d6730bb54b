//! Retain-glob matching.
//!
//! Patterns match the whole tag name and use the classic path-match
//! syntax:
//!
//! - `*` matches any run of characters other than `/`
//! - `?` matches one character other than `/`
//! - `[a-z0-9]` is a character class; `[^...]` negates it
//! - `\c` matches `c` literally, inside or outside a class
//!
//! Each glob is compiled to an anchored regular expression.

use regex::Regex;

use crate::error::{Result, SweepError};

/// Compiled retain globs.
#[derive(Debug, Clone, Default)]
pub struct RetainPatterns {
    patterns: Vec<Regex>,
}

impl RetainPatterns {
    /// Compiles `patterns`, failing on the first invalid glob.
    ///
    /// # Examples
    ///
    /// ```
    /// use regsweep_core::RetainPatterns;
    ///
    /// let retain = RetainPatterns::new(["v1.?", "release-*", "v[^0]*"]).unwrap();
    /// assert!(retain.retains("v1.0"));
    /// assert!(retain.retains("release-2024"));
    /// assert!(retain.retains("v2.1"));
    /// assert!(!retain.retains("v0.9"));
    /// assert!(!retain.retains("v1.10"));
    /// ```
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| compile(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Returns true if any pattern matches the whole tag name.
    #[must_use]
    pub fn retains(&self, tag: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(tag))
    }

    /// Number of patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns true if there are no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn compile(glob: &str) -> Result<Regex> {
    let invalid =
        |reason: &str| SweepError::config(format!("invalid retain pattern '{glob}': {reason}"));

    let source = translate(glob).map_err(invalid)?;
    Regex::new(&source).map_err(|e| invalid(&e.to_string()))
}

/// Rewrites a glob as an anchored regular expression.
fn translate(glob: &str) -> std::result::Result<String, &'static str> {
    let mut out = String::from("^");
    let mut chars = glob.chars();

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '\\' => {
                let escaped = chars.next().ok_or("trailing backslash")?;
                out.push_str(&regex::escape(escaped.encode_utf8(&mut [0; 4])));
            }
            '[' => translate_class(&mut chars, &mut out)?,
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }

    out.push('$');
    Ok(out)
}

/// Translates a character class; `chars` is positioned after the `[`.
fn translate_class(
    chars: &mut std::str::Chars<'_>,
    out: &mut String,
) -> std::result::Result<(), &'static str> {
    let negated = chars.clone().next() == Some('^');
    if negated {
        chars.next();
    }

    let mut ranges: Vec<(char, char)> = Vec::new();
    let mut count = 0;
    loop {
        let lo = match chars.next() {
            None => return Err("unterminated character class"),
            Some(']') if count > 0 => break,
            Some(c) => class_char(c, chars)?,
        };

        let hi = if chars.clone().next() == Some('-') {
            chars.next();
            let c = chars.next().ok_or("unterminated character class")?;
            class_char(c, chars)?
        } else {
            lo
        };

        // An inverted range is valid but matches nothing.
        if lo <= hi {
            ranges.push((lo, hi));
        }
        count += 1;
    }

    match (ranges.is_empty(), negated) {
        (true, false) => out.push_str(r"[^\x00-\x{10FFFF}]"),
        (true, true) => out.push_str(r"[\x00-\x{10FFFF}]"),
        (false, _) => {
            out.push('[');
            if negated {
                out.push('^');
            }
            for (lo, hi) in ranges {
                push_class_literal(out, lo);
                if hi != lo {
                    out.push('-');
                    push_class_literal(out, hi);
                }
            }
            out.push(']');
        }
    }
    Ok(())
}

fn class_char(
    c: char,
    chars: &mut std::str::Chars<'_>,
) -> std::result::Result<char, &'static str> {
    match c {
        '\\' => chars.next().ok_or("unterminated character class"),
        '-' | ']' => Err("malformed character class"),
        c => Ok(c),
    }
}

fn push_class_literal(out: &mut String, c: char) {
    if matches!(c, '\\' | '[' | ']' | '^' | '-' | '&' | '~') {
        out.push('\\');
    }
    out.push(c);
}
