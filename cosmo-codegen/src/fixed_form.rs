//! Fixed-form line wrapping
//!
//! Fixed-form source reserves columns 1-6 and stops reading at column 72.
//! Long statements are split across continuation lines that carry a marker
//! in column 6.

/// Last column read by a fixed-form compiler
pub const COLUMN_WIDTH: usize = 72;

/// Five blanks and a continuation marker in column 6
pub const CONTINUATION_PREFIX: &str = "     -";

/// A break is never placed within this many characters of a segment start
const MIN_SEGMENT: usize = 11;

/// Characters a line may end with when a break is chosen
const BREAK_AFTER: [char; 6] = ['+', '-', '*', '/', '(', ','];

/// Wraps one statement into fixed-form lines
#[derive(Debug, Clone)]
pub struct LineBuilder<'a> {
    first_prefix: &'a str,
    continuation_prefix: &'a str,
    width: usize,
}

impl<'a> LineBuilder<'a> {
    pub fn new(first_prefix: &'a str) -> Self {
        Self {
            first_prefix,
            continuation_prefix: CONTINUATION_PREFIX,
            width: COLUMN_WIDTH,
        }
    }

    pub fn with_continuation(mut self, prefix: &'a str) -> Self {
        self.continuation_prefix = prefix;
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    fn budget(&self, prefix: &str) -> usize {
        self.width.saturating_sub(prefix.chars().count()).max(1)
    }

    /// Splits `content` into prefixed lines no wider than the column width
    pub fn wrap(&self, content: &str) -> Vec<String> {
        let chars: Vec<char> = content.chars().collect();
        let first_budget = self.budget(self.first_prefix);

        if chars.len() <= first_budget {
            return vec![format!("{}{}", self.first_prefix, content)];
        }

        let mut lines = Vec::new();
        let mut pos = 0;
        let mut prefix = self.first_prefix;
        let mut budget = first_budget;

        while pos < chars.len() {
            let end = break_point(&chars, pos, (pos + budget).min(chars.len()));
            let segment: String = chars[pos..end].iter().collect();
            lines.push(format!("{}{}", prefix, segment));

            pos = end;
            while pos < chars.len() && chars[pos].is_whitespace() {
                pos += 1;
            }

            prefix = self.continuation_prefix;
            budget = self.budget(prefix);
        }

        lines
    }

    /// Same as [`wrap`](Self::wrap), joined with newlines
    pub fn render(&self, content: &str) -> String {
        self.wrap(content).join("\n")
    }
}

/// Picks the end of the segment starting at `start`
///
/// Scans back from `max_end` for the nearest preferred break character and
/// breaks right after it; falls back to a hard break at `max_end`.
fn break_point(chars: &[char], start: usize, max_end: usize) -> usize {
    if max_end >= chars.len() {
        return chars.len();
    }

    (start + MIN_SEGMENT..max_end)
        .rev()
        .find(|&i| BREAK_AFTER.contains(&chars[i]))
        .map_or(max_end, |i| i + 1)
}
