//! Compact row-range expressions such as `1,4-7,9`.
//!
//! An expression is a comma-separated list of tokens, each either a single
//! row number or an inclusive `start-end` pair. The parsed result is a
//! [`RecipientSet`]: membership only, duplicates collapse.

use std::fmt;
use std::str::FromStr;

use crate::errors::ParseError;

/// Set of row numbers selected by a range expression.
///
/// Stored as sorted, disjoint, non-adjacent inclusive intervals so that wide
/// ranges never materialize every member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientSet {
    runs: Vec<(i64, i64)>,
}

impl RecipientSet {
    pub fn contains(&self, row: i64) -> bool {
        // Runs are sorted by start; find the last run starting at or before `row`.
        let index = self.runs.partition_point(|&(start, _)| start <= row);
        index > 0 && row <= self.runs[index - 1].1
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Number of distinct row numbers in the set.
    pub fn len(&self) -> u64 {
        self.runs
            .iter()
            .map(|&(start, end)| (end - start) as u64 + 1)
            .sum()
    }

    /// Iterates the members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.runs.iter().flat_map(|&(start, end)| start..=end)
    }

    /// Sorted, comma-joined form with maximal runs collapsed (`1,4-7,9`).
    /// For a non-empty set, parsing this string yields an equal set; members
    /// are never negative, so no token collides with the range separator.
    pub fn canonical(&self) -> String {
        self.runs
            .iter()
            .map(|&(start, end)| {
                if start == end {
                    start.to_string()
                } else {
                    format!("{start}-{end}")
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn from_intervals(mut intervals: Vec<(i64, i64)>) -> Self {
        intervals.sort_unstable();
        let mut runs: Vec<(i64, i64)> = Vec::with_capacity(intervals.len());
        for (start, end) in intervals {
            match runs.last_mut() {
                Some(last) if start <= last.1.saturating_add(1) => last.1 = last.1.max(end),
                _ => runs.push((start, end)),
            }
        }
        Self { runs }
    }
}

impl fmt::Display for RecipientSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for RecipientSet {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_range(s)
    }
}

/// Negative rows cannot be written in an expression and are dropped.
impl FromIterator<i64> for RecipientSet {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self::from_intervals(
            iter.into_iter()
                .filter(|row| *row >= 0)
                .map(|row| (row, row))
                .collect(),
        )
    }
}

/// Parses a range expression into the set of row numbers it names.
///
/// Fails on any token that is not a single integer or an integer pair, and on
/// pairs whose start exceeds their end.
pub fn parse_range(expression: &str) -> Result<RecipientSet, ParseError> {
    let mut intervals = Vec::new();

    for token in expression.split(',') {
        let parts: Vec<&str> = token.split('-').collect();
        match parts.as_slice() {
            [single] => {
                let row = parse_number(single, token)?;
                intervals.push((row, row));
            }
            [start, end] => {
                let start = parse_number(start, token)?;
                let end = parse_number(end, token)?;
                if start > end {
                    return Err(ParseError::DescendingRange { start, end });
                }
                intervals.push((start, end));
            }
            _ => return Err(ParseError::InvalidToken(token.trim().to_string())),
        }
    }

    Ok(RecipientSet::from_intervals(intervals))
}

fn parse_number(part: &str, token: &str) -> Result<i64, ParseError> {
    let part = part.trim();
    if part.is_empty() {
        return Err(ParseError::InvalidToken(token.trim().to_string()));
    }
    part.parse::<i64>()
        .map_err(|_| ParseError::InvalidNumber(part.to_string()))
}
