//! Trigger resolution: raw input to a registered command plus argument tail.
//!
//! Precedence is fixed:
//! 1. exact alias match on the first word,
//! 2. literal-prefix trigger, longest wins,
//! 3. regex trigger, in registration order.

use std::sync::Arc;

use isaac_types::DispatchError;

use crate::descriptor::CommandDescriptor;
use crate::registry::CommandTable;

/// Suggestions are only offered within this edit distance.
pub const SUGGESTION_DISTANCE: usize = 2;

/// Which rule produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Alias,
    Prefix,
    Pattern,
}

/// A resolved command and the unparsed remainder of the input.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub descriptor: Arc<CommandDescriptor>,
    pub arg_tail: String,
    pub kind: MatchKind,
}

impl CommandTable {
    /// Resolve `input` against the table.
    ///
    /// A regex trigger with capture groups yields the captured text as the
    /// argument tail; without groups the tail is whatever follows the match.
    pub fn resolve(&self, input: &str) -> Result<Resolved, DispatchError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(DispatchError::NotFound {
                input: String::new(),
                suggestion: None,
            });
        }

        let (first, rest) = split_first_word(input);
        if let Some(&index) = self.aliases.get(first) {
            return Ok(self.resolved(index, rest, MatchKind::Alias));
        }

        let longest = self
            .prefixes
            .iter()
            .filter(|(trigger, _)| matches_prefix(input, trigger))
            .max_by_key(|(trigger, _)| trigger.len());
        if let Some((trigger, index)) = longest {
            return Ok(self.resolved(*index, &input[trigger.len()..], MatchKind::Prefix));
        }

        for (re, index) in &self.patterns {
            if let Some(caps) = re.captures(input) {
                let groups: Vec<&str> = caps
                    .iter()
                    .skip(1)
                    .flatten()
                    .map(|m| m.as_str())
                    .collect();
                let tail = if groups.is_empty() {
                    // Group 0 always participates.
                    let end = caps.get(0).map_or(0, |m| m.end());
                    input[end..].to_string()
                } else {
                    groups.join(" ")
                };
                return Ok(self.resolved(*index, &tail, MatchKind::Pattern));
            }
        }

        Err(DispatchError::NotFound {
            input: input.to_string(),
            suggestion: self.suggest(first),
        })
    }

    /// Closest registered name within [`SUGGESTION_DISTANCE`], if any.
    pub fn suggest(&self, word: &str) -> Option<String> {
        let word = word.trim_start_matches('/').to_lowercase();
        let mut best: Option<(&str, usize)> = None;
        for name in self.names() {
            let dist = levenshtein(&word, name);
            if dist > SUGGESTION_DISTANCE {
                continue;
            }
            match best {
                Some((best_name, best_dist))
                    if best_dist < dist || (best_dist == dist && best_name <= name) => {}
                _ => best = Some((name, dist)),
            }
        }
        best.map(|(name, _)| name.to_string())
    }

    fn resolved(&self, index: usize, tail: &str, kind: MatchKind) -> Resolved {
        Resolved {
            descriptor: Arc::clone(self.at(index)),
            arg_tail: tail.trim().to_string(),
            kind,
        }
    }
}

fn split_first_word(input: &str) -> (&str, &str) {
    match input.find(char::is_whitespace) {
        Some(pos) => (&input[..pos], &input[pos..]),
        None => (input, ""),
    }
}

/// `trigger` is a prefix of `input` ending on a word boundary.
fn matches_prefix(input: &str, trigger: &str) -> bool {
    input.starts_with(trigger)
        && input[trigger.len()..]
            .chars()
            .next()
            .map_or(true, char::is_whitespace)
}

/// Levenshtein distance with a single rolling row.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let n = b_chars.len();

    let mut prev_row: Vec<usize> = (0..=n).collect();
    let mut curr_row = vec![0usize; n + 1];

    for (i, a_ch) in a_chars.iter().enumerate() {
        curr_row[0] = i + 1;
        for (j, b_ch) in b_chars.iter().enumerate() {
            let cost = usize::from(a_ch != b_ch);
            curr_row[j + 1] = (prev_row[j + 1] + 1)
                .min(curr_row[j] + 1)
                .min(prev_row[j] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[n]
}
