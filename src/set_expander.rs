//! DAG set-expression evaluation: `(instrs ...)` and `(instregex ...)`.
//!
//! These are the only two operators a scheduling DAG field ever uses to name
//! a set of instructions. `instrs` is a literal union; `instregex` matches
//! instruction names against a regex, with a literal-prefix fast path that
//! avoids scanning the whole (sorted) non-generic instruction table.

use regex::Regex;

use crate::error::{ElaborationError, Result};
use crate::record_db::{DagArg, DagExpr, RecordDb, RecordId};
use crate::target::TargetInstructions;

const REGEX_METACHARS: &[char] = &['(', ')', '^', '$', '|', '*', '+', '?', '.', '[', ']', '\\', '{', '}'];

pub struct SetExpander;

impl SetExpander {
    /// Expand a `(instrs ...)` / `(instregex ...)` DAG into the list of
    /// matching instruction records, in target-instruction-table order.
    pub fn expand(
        db: &impl RecordDb,
        target: &TargetInstructions,
        dag: &DagExpr,
        loc: &crate::record_db::SourceLoc,
    ) -> Result<Vec<RecordId>> {
        match dag.operator.as_str() {
            "instrs" => Self::expand_instrs(dag, loc),
            "instregex" => Self::expand_instregex(db, target, dag, loc),
            other => Err(ElaborationError::UnknownSetOperator {
                loc: loc.clone(),
                operator: other.to_string(),
            }),
        }
    }

    fn expand_instrs(
        dag: &DagExpr,
        loc: &crate::record_db::SourceLoc,
    ) -> Result<Vec<RecordId>> {
        let mut out = Vec::with_capacity(dag.args.len());
        for arg in &dag.args {
            match arg {
                DagArg::Def(id) => out.push(*id),
                other => {
                    return Err(ElaborationError::InstRegexNotAString {
                        loc: loc.clone(),
                        got: format!("{other:?}"),
                    })
                }
            }
        }
        Ok(out)
    }

    fn expand_instregex(
        db: &impl RecordDb,
        target: &TargetInstructions,
        dag: &DagExpr,
        loc: &crate::record_db::SourceLoc,
    ) -> Result<Vec<RecordId>> {
        let mut matches = Vec::new();
        for arg in &dag.args {
            let pattern = match arg {
                DagArg::Str(s) => s.clone(),
                other => {
                    return Err(ElaborationError::InstRegexNotAString {
                        loc: loc.clone(),
                        got: format!("{other:?}"),
                    })
                }
            };
            let before = matches.len();
            Self::match_one_pattern(db, target, &pattern, loc, &mut matches)?;
            if matches.len() == before {
                return Err(ElaborationError::InstRegexNoMatches {
                    loc: loc.clone(),
                    pattern,
                });
            }
        }
        Ok(matches)
    }

    /// Match a single `instregex` pattern, appending hits to `out`.
    ///
    /// Extracts a literal prefix up to the first metacharacter (after first
    /// stripping one layer of enclosing parens, mirroring the original's
    /// `removeParens`). If the prefix-extraction scan hits a top-level `|`
    /// or `?` before any other metacharacter, the prefix optimization is
    /// abandoned entirely and every non-generic instruction is scanned
    /// linearly, since those two operators can make a name that doesn't
    /// start with the literal prefix match anyway (`?` on the last prefix
    /// character, alternation changing the leading run).
    fn match_one_pattern(
        db: &impl RecordDb,
        target: &TargetInstructions,
        pattern: &str,
        loc: &crate::record_db::SourceLoc,
        out: &mut Vec<RecordId>,
    ) -> Result<()> {
        let anchored = format!("^(?:{pattern})");
        let re = Regex::new(&anchored).map_err(|e| ElaborationError::Internal {
            loc: loc.clone(),
            message: format!("invalid instregex pattern '{pattern}': {e}"),
        })?;

        // Generics are always scanned linearly: there are few of them and
        // they aren't kept in the sorted slice.
        for &id in target.generics() {
            if re.is_match(db.name_of(id)) {
                out.push(id);
            }
        }

        let body = remove_parens(pattern);
        match literal_prefix(&body) {
            Some(prefix) if !prefix.is_empty() => {
                let sorted = target.non_generic_sorted();
                let start = sorted.partition_point(|id| db.name_of(*id) < prefix.as_str());
                for &id in &sorted[start..] {
                    let name = db.name_of(id);
                    if !name.starts_with(prefix.as_str()) {
                        break;
                    }
                    if re.is_match(name) {
                        out.push(id);
                    }
                }
            }
            _ => {
                for &id in target.non_generic_sorted() {
                    if re.is_match(db.name_of(id)) {
                        out.push(id);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Drop every character enclosed in parentheses, at any nesting depth,
/// throughout the whole string. Mirrors tablegen's `removeParens`: a depth
/// counter that increments on `(`, decrements on `)`, and only keeps
/// characters seen at depth 0. This is what lets `literal_prefix` see a
/// top-level `|`/`?` that comes after a parenthesized span, e.g.
/// `"A(X)B|CD"` → `"AB|CD"`.
fn remove_parens(pattern: &str) -> String {
    let mut result = String::with_capacity(pattern.len());
    let mut paren: i32 = 0;
    for ch in pattern.chars() {
        match ch {
            '(' => paren += 1,
            ')' => paren -= 1,
            _ if paren == 0 => result.push(ch),
            _ => {}
        }
    }
    result
}

/// Returns the literal prefix of `pattern` up to (not including) the first
/// metacharacter, or `None` if a top-level `|` or `?` disables the
/// optimization before any prefix can be trusted.
fn literal_prefix(pattern: &str) -> Option<String> {
    let mut prefix = String::new();
    for ch in pattern.chars() {
        if ch == '|' || ch == '?' {
            return None;
        }
        if REGEX_METACHARS.contains(&ch) {
            break;
        }
        prefix.push(ch);
    }
    Some(prefix)
}
