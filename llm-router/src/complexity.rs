//! Rule-based question complexity scoring.
//!
//! Heuristic keyword tables plus word-count and math-symbol signals.
//! The tables and thresholds are deliberately simple and tuned together;
//! change them via review of the decision tests, not in isolation.

use std::sync::OnceLock;

use regex::Regex;

/// Question complexity tiers, ordered so `>=` means "can handle".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ComplexityLevel {
    /// Basic definitions, simple calculations.
    Simple = 1,
    /// Standard problems, multi-step solutions.
    Moderate = 2,
    /// Proofs, derivations, advanced techniques.
    Complex = 3,
}

impl ComplexityLevel {
    /// Uppercase tier name, as recorded in router metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "SIMPLE",
            Self::Moderate => "MODERATE",
            Self::Complex => "COMPLEX",
        }
    }
}

/// Phrases that suggest a hard question. Each match adds 2.
const COMPLEX_KEYWORDS: &[&str] = &[
    "prove",
    "proof",
    "derive",
    "derivation",
    "why does",
    "explain why",
    "rigorous",
    "justify",
    "show that",
    "demonstrate",
    "integration by parts",
    "u-substitution",
    "chain rule",
    "implicit differentiation",
    "related rates",
    "optimization",
    "taylor series",
    "fourier",
];

/// Phrases that suggest an easy question. Each match adds 2.
const SIMPLE_KEYWORDS: &[&str] = &[
    "what is",
    "define",
    "definition",
    "basic",
    "simple",
    "calculate",
    "find the derivative of",
    "power rule",
    "constant rule",
];

fn math_symbol_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[∫∑∏√±∞αβγθλπ]|\\frac|\\int|\\sum").expect("valid math symbol pattern")
    })
}

/// Scores questions into [`ComplexityLevel`] tiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityAnalyzer;

impl ComplexityAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Estimate the complexity of one question.
    pub fn analyze(&self, question: &str) -> ComplexityLevel {
        let lower = question.to_lowercase();

        let mut complex_score = 0;
        for keyword in COMPLEX_KEYWORDS {
            if lower.contains(keyword) {
                complex_score += 2;
            }
        }

        let mut simple_score = 0;
        for keyword in SIMPLE_KEYWORDS {
            if lower.contains(keyword) {
                simple_score += 2;
            }
        }

        // Length signal: long questions trend complex, short ones simple.
        let word_count = question.split_whitespace().count();
        if word_count > 30 {
            complex_score += 1;
        } else if word_count < 10 {
            simple_score += 1;
        }

        // Density of mathematical notation.
        let math_symbols = math_symbol_re().find_iter(question).count();
        if math_symbols > 3 {
            complex_score += 2;
        } else if math_symbols > 1 {
            complex_score += 1;
        }

        if complex_score >= 3 {
            ComplexityLevel::Complex
        } else if simple_score >= 3 || simple_score > complex_score {
            ComplexityLevel::Simple
        } else {
            ComplexityLevel::Moderate
        }
    }
}
