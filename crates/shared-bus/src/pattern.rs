//! # Channel Patterns
//!
//! Subscriptions name either a literal channel or a glob pattern. Globs follow
//! the Redis `PSUBSCRIBE` dialect:
//!
//! - `*` matches any run of characters (including none)
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]`, `[^a]` / `[!a]` match character classes
//! - `\x` matches `x` literally

use std::fmt;

/// What a subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelPattern {
    /// Exactly one channel name.
    Literal(String),
    /// Every channel name the glob matches.
    Glob(String),
}

impl ChannelPattern {
    /// Subscribe to a single, exact channel name.
    pub fn literal(channel: impl Into<String>) -> Self {
        Self::Literal(channel.into())
    }

    /// Subscribe to every channel matching `pattern`.
    pub fn glob(pattern: impl Into<String>) -> Self {
        Self::Glob(pattern.into())
    }

    /// The raw channel name or pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) | Self::Glob(s) => s,
        }
    }

    /// Whether this is a glob subscription.
    #[must_use]
    pub fn is_glob(&self) -> bool {
        matches!(self, Self::Glob(_))
    }

    /// Check whether a concrete channel name is covered by this pattern.
    #[must_use]
    pub fn matches(&self, channel: &str) -> bool {
        match self {
            Self::Literal(name) => name == channel,
            Self::Glob(pattern) => glob_match(pattern, channel),
        }
    }
}

impl fmt::Display for ChannelPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "{s}"),
            Self::Glob(s) => write!(f, "{s} (glob)"),
        }
    }
}

/// Match `text` against a Redis-style glob.
///
/// Iterative with single-star backtracking, so worst case is
/// O(pattern * text) and there is no recursion.
#[must_use]
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();

    let mut p = 0;
    let mut t = 0;
    // (pattern index of the last '*', text index it is currently absorbing up to)
    let mut star: Option<(usize, usize)> = None;

    while t < txt.len() {
        if p < pat.len() && pat[p] == '*' {
            star = Some((p, t));
            p += 1;
            continue;
        }

        if p < pat.len() {
            if let Some(next) = step(&pat, p, txt[t]) {
                p = next;
                t += 1;
                continue;
            }
        }

        match star {
            Some((star_p, star_t)) => {
                p = star_p + 1;
                t = star_t + 1;
                star = Some((star_p, star_t + 1));
            }
            None => return false,
        }
    }

    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}

/// Try to consume one text character with the (non-star) token at `p`.
/// Returns the index of the next pattern token on success.
fn step(pat: &[char], p: usize, c: char) -> Option<usize> {
    match pat[p] {
        '?' => Some(p + 1),
        '\\' if p + 1 < pat.len() => (pat[p + 1] == c).then_some(p + 2),
        '[' => match match_class(pat, p, c) {
            Some((true, next)) => Some(next),
            Some((false, _)) => None,
            // Unterminated class: the bracket is an ordinary character.
            None => (c == '[').then_some(p + 1),
        },
        literal => (literal == c).then_some(p + 1),
    }
}

/// Evaluate the class starting at `pat[open] == '['`.
///
/// Returns `(matched, index after ']')`, or `None` if the class never closes.
fn match_class(pat: &[char], open: usize, c: char) -> Option<(bool, usize)> {
    let mut i = open + 1;
    let negate = i < pat.len() && (pat[i] == '^' || pat[i] == '!');
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < pat.len() && pat[i] != ']' {
        if pat[i] == '\\' && i + 1 < pat.len() {
            matched |= pat[i + 1] == c;
            i += 2;
        } else if i + 2 < pat.len() && pat[i + 1] == '-' && pat[i + 2] != ']' {
            let (lo, hi) = if pat[i] <= pat[i + 2] {
                (pat[i], pat[i + 2])
            } else {
                (pat[i + 2], pat[i])
            };
            matched |= (lo..=hi).contains(&c);
            i += 3;
        } else {
            matched |= pat[i] == c;
            i += 1;
        }
    }

    if i >= pat.len() {
        return None;
    }
    Some((matched != negate, i + 1))
}
