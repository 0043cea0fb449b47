//! Wildcard matching for allow-list patterns
//!
//! Only `*` is special. It matches any run of characters, including the
//! empty run. Everything else matches itself, case-sensitively, and a
//! pattern must cover the whole identity.

/// Match `text` against a `*`-wildcard `pattern`.
///
/// Greedy single-pass matcher with backtracking to the last `*`.
/// Comparison is byte-wise; since `*` is ASCII and literal characters are
/// whole UTF-8 sequences, this is equivalent to matching by character.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.as_bytes();
    let text = text.as_bytes();

    let (mut p, mut t) = (0, 0);
    // (index of last `*` in pattern, text position it currently absorbs up to)
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star, absorbed)) = backtrack {
            p = star + 1;
            t = absorbed + 1;
            backtrack = Some((star, t));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&b| b == b'*')
}

/// Returns true iff `identity` matches at least one pattern.
///
/// Stops at the first match; order affects only how much work is done.
pub fn is_authorized<P: AsRef<str>>(identity: &str, patterns: &[P]) -> bool {
    patterns
        .iter()
        .any(|pattern| glob_match(pattern.as_ref(), identity))
}
