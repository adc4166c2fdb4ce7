//! Rule-list serialization.
//!
//! Rule lists round-trip through a small CSV dialect so they can be saved,
//! shared, and reloaded. One record per rule:
//!
//! ```text
//! enabled,find,replace,whole_word,match_case,extended,regex,use_variables
//! ```
//!
//! Booleans are `1`/`0`. Fields containing a comma, quote, or line break
//! are quoted, with embedded quotes doubled. The trailing `use_variables`
//! field was a later addition; records with only seven fields still parse
//! (it defaults to off), so older lists keep loading.
//!
//! [`export_bash_script`] renders the enabled rules as a standalone
//! `sed`-based shell script for running the same list outside the engine.

use thiserror::Error;

use crate::matcher::{MatchMode, Rule};

/// A malformed rule-list record.
#[derive(Debug, Error)]
pub enum RuleListError {
    /// A record had the wrong number of fields.
    #[error("record {record}: expected 7 or 8 fields, found {found}")]
    FieldCount {
        /// 1-based record number.
        record: usize,
        /// Number of fields actually present.
        found: usize,
    },
    /// A boolean field held something other than a recognised flag value.
    #[error("record {record}: invalid boolean value {value:?}")]
    InvalidFlag {
        /// 1-based record number.
        record: usize,
        /// The offending field text.
        value: String,
    },
    /// A quoted field was never closed.
    #[error("unterminated quoted field starting in record {record}")]
    UnterminatedQuote {
        /// 1-based record number.
        record: usize,
    },
}

/// Serialize rules to CSV, one record per rule.
pub fn serialize_rules(rules: &[Rule]) -> String {
    let mut out = String::new();
    for rule in rules {
        let fields = [
            flag(rule.enabled),
            escape_field(&rule.find),
            escape_field(&rule.replace),
            flag(rule.whole_word),
            flag(rule.match_case),
            flag(rule.mode == MatchMode::Extended),
            flag(rule.mode == MatchMode::Regex),
            flag(rule.use_variables),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Parse a CSV rule list produced by [`serialize_rules`].
///
/// Blank records are skipped. When both the extended and regex flags are
/// set, regex wins.
pub fn parse_rules(input: &str) -> Result<Vec<Rule>, RuleListError> {
    let mut rules = Vec::new();
    for (record, fields) in parse_records(input)?.into_iter().enumerate() {
        let record = record + 1;
        if fields.len() == 1 && fields[0].is_empty() {
            continue;
        }
        if fields.len() != 7 && fields.len() != 8 {
            return Err(RuleListError::FieldCount {
                record,
                found: fields.len(),
            });
        }
        let parse_flag = |value: &str| -> Result<bool, RuleListError> {
            match value.trim() {
                "1" | "true" => Ok(true),
                "0" | "false" | "" => Ok(false),
                other => Err(RuleListError::InvalidFlag {
                    record,
                    value: other.to_string(),
                }),
            }
        };
        let extended = parse_flag(&fields[5])?;
        let regex = parse_flag(&fields[6])?;
        let mode = if regex {
            MatchMode::Regex
        } else if extended {
            MatchMode::Extended
        } else {
            MatchMode::Literal
        };
        rules.push(Rule {
            enabled: parse_flag(&fields[0])?,
            find: fields[1].clone(),
            replace: fields[2].clone(),
            mode,
            whole_word: parse_flag(&fields[3])?,
            match_case: parse_flag(&fields[4])?,
            use_variables: fields.get(7).map_or(Ok(false), |f| parse_flag(f))?,
        });
    }
    Ok(rules)
}

/// Render the enabled rules as a `sed`-based shell script.
///
/// Literal rules are escaped so `sed` treats them verbatim; extended rules
/// have their escapes decoded first. Rules using dynamic replacements have
/// no shell equivalent and are emitted as comments.
pub fn export_bash_script(rules: &[Rule]) -> String {
    let mut out = String::from(
        "#!/usr/bin/env bash\n\
         # Applies this replacement list to each file argument, in order.\n\
         set -eu\n\
         for file in \"$@\"; do\n",
    );
    for rule in rules.iter().filter(|r| r.enabled) {
        if rule.use_variables {
            out.push_str(&format!(
                "  # no shell equivalent for dynamic rule: {}\n",
                shell_single_quote(&rule.find)
            ));
            continue;
        }
        let (pattern, replacement) = match rule.mode {
            MatchMode::Regex => (
                sed_escape_delimiter(&rule.find),
                sed_escape_delimiter(&rule.replace),
            ),
            MatchMode::Extended => (
                sed_escape_literal(&crate::escape::decode_extended(&rule.find)),
                sed_escape_replacement(&crate::escape::decode_extended(&rule.replace)),
            ),
            MatchMode::Literal => (
                sed_escape_literal(&rule.find),
                sed_escape_replacement(&rule.replace),
            ),
        };
        let pattern = if rule.whole_word {
            format!("\\b\\({pattern}\\)\\b")
        } else {
            pattern
        };
        let flags = if rule.match_case { "g" } else { "gI" };
        out.push_str(&format!(
            "  sed -i {} \"$file\"\n",
            shell_single_quote(&format!("s/{pattern}/{replacement}/{flags}"))
        ));
    }
    out.push_str("done\n");
    out
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Split CSV text into records of fields, honoring quoted fields that may
/// span lines.
fn parse_records(input: &str) -> Result<Vec<Vec<String>>, RuleListError> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                fields.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut fields));
            }
            _ => field.push(c),
        }
    }
    if in_quotes {
        return Err(RuleListError::UnterminatedQuote {
            record: records.len() + 1,
        });
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push(fields);
    }
    Ok(records)
}

/// Escape a string for use as a literal sed pattern.
fn sed_escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '/' | '.' | '*' | '[' | ']' | '^' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a string for use as a sed replacement.
fn sed_escape_replacement(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '/' | '&') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape only the substitution delimiter, leaving regex syntax intact.
fn sed_escape_delimiter(value: &str) -> String {
    value.replace('/', "\\/")
}

fn shell_single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
