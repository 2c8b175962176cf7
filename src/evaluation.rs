//! Score extraction from supervisor replies.
//!
//! The supervisor is asked to answer with a `分数：NN` line followed by
//! suggestions. Models drift from that format, so parsing accepts a few
//! labels, both colon widths and markdown emphasis around the value. Anything
//! unreadable collapses to a score of `0.0`, which the workflow treats as a
//! draft that has to be regenerated from scratch.

use regex::Regex;
use std::sync::LazyLock;

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:分数|评分|得分|score)[\s*_]*[:：](.*)").expect("valid marker regex")
});

static VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\s*_]*([-+]?\d+(?:\.\d+)?)").expect("valid value regex")
});

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// In `[0, 100]`; `0.0` also stands for "could not be read".
    pub score: f64,
    /// The whole supervisor reply.
    pub rationale: String,
    /// Whether the score was actually read from the reply.
    pub readable: bool,
}

impl Evaluation {
    /// Parses a supervisor reply. Never fails: the first line carrying a
    /// score label decides, and an unreadable or out-of-range value yields
    /// `0.0`.
    pub fn parse(text: &str) -> Self {
        let parsed = extract_score(text);
        Self {
            score: parsed.unwrap_or(MIN_SCORE),
            rationale: text.to_string(),
            readable: parsed.is_some(),
        }
    }

    pub fn rejected(rationale: impl Into<String>) -> Self {
        Self {
            score: MIN_SCORE,
            rationale: rationale.into(),
            readable: false,
        }
    }

    /// A zero score means the draft is off-brief rather than unpolished.
    pub fn is_off_brief(&self) -> bool {
        self.score == MIN_SCORE
    }
}

fn extract_score(text: &str) -> Option<f64> {
    let rest = text
        .lines()
        .find_map(|line| MARKER.captures(line))
        .and_then(|caps| caps.get(1))?
        .as_str();

    let value: f64 = VALUE.captures(rest)?.get(1)?.as_str().parse().ok()?;
    (MIN_SCORE..=MAX_SCORE).contains(&value).then_some(value)
}
