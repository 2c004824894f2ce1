//! Repairs for mathematical text mangled by PDF extraction.
//!
//! PDF-to-text conversion of calculus material scatters integral
//! bounds onto their own lines, wraps variables in italic markers, and
//! leaves Unicode bracket fragments behind. These fixes are applied to
//! hybrid-search content before it reaches the prompt.

use std::sync::LazyLock;

use regex::Regex;

/// Ordered substitution rules; applied top to bottom.
static CLEANUP_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        // Unicode bracket artifacts.
        (r"[⎡⎤⎣⎦⎧⎨⎩⎫⎬⎭]", ""),
        // Strikethrough noise, then leftover tilde pairs.
        (r"~~([^~]*)~~", "$1"),
        (r"~~~~+", ""),
        (r"~~", ""),
        // Scattered bounds: two bare single-letter lines become "from a to b".
        (r"\n\s*([a-z])\s*\n\s*([a-z])\s*\n", " from $1 to $2 "),
        // Integral bounds split across lines.
        (r"∫\s*\n+\s*([a-z0-9])\s*\n+\s*([a-z0-9])\s*\n", "∫ from $1 to $2 "),
        (r"∫\s*\n+", "∫ "),
        // Italic markers around variables: _x_ -> x, _dx_ -> dx.
        (r"\b_([a-zA-Z])_\b", "$1"),
        (r"_d([a-z])_", "d$1"),
        // Spaced-out function notation: f ( x ) -> f(x).
        (r"([a-zA-Z])\s*\(\s*([a-zA-Z])\s*\)", "$1($2)"),
        (r"([a-zA-Z])\s*\(\s*([a-zA-Z])\s*,\s*([a-zA-Z])\s*\)", "$1($2, $3)"),
        (r"([A-Z])\s*'\s*\(\s*([a-zA-Z])\s*\)", "$1'($2)"),
        // Interval notation.
        (r"\[\s*([a-z])\s*,\s*([a-z])\s*\]", "[$1, $2]"),
        // Operator spacing.
        (r"\s*−\s*", " - "),
        (r"\s*-\s*", " - "),
        (r"\s*\+\s*", " + "),
        (r"\s*=\s*", " = "),
        // Collapse blank-line runs and stray single-letter lines.
        (r"\n{3,}", "\n\n"),
        (r"\n\s+\n", "\n\n"),
        (r"\n\s*[a-z]\s*\n", "\n"),
        // OpenStax footer noise.
        (r"(?s)This OpenStax book is available.*?\.12", ""),
        // Empty bullet points, multi-space runs, orphaned ", b" lines.
        (r"\n\s*-\s*\n", "\n"),
        (r"  +", " "),
        (r"\n\s*,\s*([a-z])\s*", ", $1"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("valid cleanup pattern"),
            replacement,
        )
    })
    .collect()
});

/// Clean up corrupted mathematical notation from PDF extraction.
pub fn cleanup_math_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut out = text.to_string();
    for (regex, replacement) in CLEANUP_RULES.iter() {
        out = regex.replace_all(&out, *replacement).into_owned();
    }
    out.trim().to_string()
}

static SUSPICIOUS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"[⎡⎤⎣⎦⎧⎨⎩⎫⎬⎭]",
        r"~~[^~]+~~",
        r"_[a-z]_\s*\n\s*_[a-z]_",
        r"\n\s*\n\s*\n",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid corruption pattern"))
    .collect()
});

/// Heuristic: does this chunk look too damaged to be worth showing?
///
/// `threshold` is the tolerated count of suspicious patterns per 100
/// characters of text.
pub fn is_chunk_corrupted(text: &str, threshold: f32) -> bool {
    if text.len() < 20 {
        return true;
    }

    let suspicious: usize = SUSPICIOUS_PATTERNS
        .iter()
        .map(|p| p.find_iter(text).count())
        .sum();

    let ratio = suspicious as f32 / (text.len() as f32 / 100.0).max(1.0);
    ratio > threshold
}
