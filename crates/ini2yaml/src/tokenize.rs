//! splitting normalized text into statements
//!
//! A logical line is a physical line, unless a quoted string spans line breaks. Those breaks
//! are masked while splitting so a multi-line `Evaluate = '...'` block stays one statement.
use crate::normalize::{TRACE_END, TRACE_START};
use crate::util::{self, COMMENT};

/// Stand-in for line breaks inside strings (private use area)
const LINE_BREAK_MASK: char = '\u{E000}';

pub const INCLUDE: &str = "#include";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// 1-based index of the logical line
    pub number: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub key: String,
    pub value: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    TraceStart(usize),
    TraceEnd(usize),
    Include { name: String, line: usize },
    Assignment(Assignment),
}

pub fn logical_lines(text: &str) -> Vec<Line> {
    let masked: String = util::segments(text)
        .into_iter()
        .map(|segment| {
            if segment.quoted {
                segment.text.replace('\n', &LINE_BREAK_MASK.to_string())
            } else {
                segment.text.to_string()
            }
        })
        .collect();

    masked
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(COMMENT))
        .enumerate()
        .map(|(index, line)| Line {
            number: index + 1,
            text: line.replace(LINE_BREAK_MASK, "\n"),
        })
        .collect()
}

/// Split a line on its first top-level `=`
pub fn split_assignment(line: &Line) -> Option<Assignment> {
    let index = util::find_top_level(&line.text, '=')?;
    let key = line.text[..index].trim();
    if key.is_empty() {
        return None;
    }

    Some(Assignment {
        key: key.to_string(),
        value: line.text[index + 1..].trim().to_string(),
        line: line.number,
    })
}

pub fn statements(text: &str) -> Vec<Statement> {
    logical_lines(text)
        .into_iter()
        .filter_map(|line| {
            if line.text == TRACE_START {
                return Some(Statement::TraceStart(line.number));
            }
            if line.text == TRACE_END {
                return Some(Statement::TraceEnd(line.number));
            }
            if let Some(name) = line.text.strip_prefix(INCLUDE) {
                return Some(Statement::Include {
                    name: name.trim().to_string(),
                    line: line.number,
                });
            }

            let assignment = split_assignment(&line);
            if assignment.is_none() {
                tracing::trace!(line = line.number, text = %line.text, "ignoring line");
            }
            assignment.map(Statement::Assignment)
        })
        .collect()
}
