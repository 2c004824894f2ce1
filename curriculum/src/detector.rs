//! Prerequisite gap detection over free-text student questions.
//!
//! Topic detection is an ordered rule table evaluated top-down: the
//! specific chain-rule patterns win over the generic keyword rows, and a
//! small limit/derivative/integral fallback catches anything the table
//! misses.

use std::collections::BTreeSet;

use tracing::debug;

use crate::graph::PrerequisiteGraph;

/// Ordered topic keyword rules. Earlier rows win.
const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "limits.introduction",
        &["limit", "limits", "approaches", "approaching"],
    ),
    (
        "derivatives.basic",
        &["derivative", "differentiate", "differentiation", "rate of change"],
    ),
    (
        "derivatives.chain_rule",
        &["chain rule", "composite", "nested function", "sin(x^2)", "cos(x^2)"],
    ),
    ("derivatives.product_rule", &["product rule", "multiply", "product"]),
    ("derivatives.quotient_rule", &["quotient rule", "divide", "fraction"]),
    (
        "integration.basic",
        &["integral", "integrate", "integration", "antiderivative"],
    ),
    (
        "integration.substitution",
        &["u-substitution", "substitution", "u sub"],
    ),
    (
        "functions.composition",
        &["composition", "composite", "f(g(x))", "nested"],
    ),
    ("algebra.factoring", &["factor", "factoring", "factorize"]),
];

/// Specific chain-rule patterns checked before the keyword table.
const CHAIN_RULE_PATTERNS: &[&str] = &["sin(x^2)", "cos(x^2)", "chain", "composite", "nested"];

/// Phrases that signal the student is confused rather than drilling.
const CONFUSION_SIGNALS: &[&str] = &[
    "don't understand",
    "confused",
    "what is",
    "what are",
    "explain",
    "help me understand",
    "not sure",
    "unclear",
    "can you explain",
];

/// Result of a full gap analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct GapAnalysis {
    /// Topic detected from the query, if any.
    pub detected_topic: Option<String>,
    /// Prerequisites of the detected topic not yet completed.
    pub missing_prerequisites: Vec<String>,
    /// True when any prerequisite is missing.
    pub has_gaps: bool,
    /// Suggested next topic on the learning path.
    pub next_topic: Option<String>,
    /// Human-readable review suggestions.
    pub suggestions: Vec<String>,
}

/// Detects prerequisite gaps given a query and a completion history.
#[derive(Debug, Clone)]
pub struct GapDetector {
    graph: PrerequisiteGraph,
}

impl GapDetector {
    pub fn new(graph: PrerequisiteGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &PrerequisiteGraph {
        &self.graph
    }

    /// Missing prerequisites for `topic`, transitively.
    pub fn detect_gaps(&self, topic: &str, completed: &BTreeSet<String>) -> Vec<String> {
        self.graph.missing_prerequisites(topic, completed)
    }

    /// Missing prerequisites that are themselves foundational, i.e. have
    /// no prerequisites of their own. These should be addressed first.
    pub fn detect_critical_gaps(&self, topic: &str, completed: &BTreeSet<String>) -> Vec<String> {
        self.detect_gaps(topic, completed)
            .into_iter()
            .filter(|gap| self.graph.prerequisites(gap).is_empty())
            .collect()
    }

    /// Detect which topic a query is about, or `None`.
    pub fn analyze_query(&self, query: &str) -> Option<String> {
        let query = query.to_lowercase();

        // Specific patterns first, then the table in row order.
        if CHAIN_RULE_PATTERNS.iter().any(|p| query.contains(p)) {
            return Some("derivatives.chain_rule".to_string());
        }

        for (topic, keywords) in TOPIC_KEYWORDS {
            if keywords.iter().any(|k| query.contains(k)) {
                return Some(topic.to_string());
            }
        }

        if query.contains("limit") {
            Some("limits.introduction".to_string())
        } else if query.contains("derivative") {
            Some("derivatives.basic".to_string())
        } else if query.contains("integral") {
            Some("integration.basic".to_string())
        } else {
            None
        }
    }

    /// True if the query contains any confusion-signal phrase.
    pub fn has_confusion_signals(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        CONFUSION_SIGNALS.iter().any(|s| query.contains(s))
    }

    /// Human-readable review suggestions for a target topic. Empty when
    /// there are no gaps.
    pub fn suggest_review(&self, target_topic: &str, completed: &BTreeSet<String>) -> Vec<String> {
        let gaps = self.detect_gaps(target_topic, completed);
        if gaps.is_empty() {
            return Vec::new();
        }

        let mut suggestions = Vec::new();

        let critical = self.detect_critical_gaps(target_topic, completed);
        if !critical.is_empty() {
            suggestions.push(format!(
                "Before learning {target_topic}, let's review these foundational concepts: {}",
                critical.join(", ")
            ));
        }

        if let Some(next) = self.next_topic(target_topic, completed) {
            suggestions.push(format!("The next topic you should learn is: {next}"));
        }

        suggestions
    }

    /// The next topic to study toward `target_topic`, or `None` when the
    /// student is ready for the target itself.
    pub fn next_topic(&self, target_topic: &str, completed: &BTreeSet<String>) -> Option<String> {
        if self.detect_gaps(target_topic, completed).is_empty() {
            return None;
        }
        self.graph
            .learning_path(target_topic, completed)
            .into_iter()
            .next()
    }

    /// Full analysis: detect the topic, its gaps, the next topic, and
    /// review suggestions.
    pub fn analyze(&self, query: &str, completed: &BTreeSet<String>) -> GapAnalysis {
        let Some(detected_topic) = self.analyze_query(query) else {
            return GapAnalysis {
                detected_topic: None,
                missing_prerequisites: Vec::new(),
                has_gaps: false,
                next_topic: None,
                suggestions: vec![
                    "Unable to detect the topic from your query. Could you be more specific?"
                        .to_string(),
                ],
            };
        };

        let missing = self.detect_gaps(&detected_topic, completed);
        let has_gaps = !missing.is_empty();
        let next_topic = self.next_topic(&detected_topic, completed);
        let suggestions = self.suggest_review(&detected_topic, completed);

        debug!(
            target: "curriculum::detector",
            topic = %detected_topic,
            gaps = missing.len(),
            "gap analysis"
        );

        GapAnalysis {
            detected_topic: Some(detected_topic),
            missing_prerequisites: missing,
            has_gaps,
            next_topic,
            suggestions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topics::build_prerequisite_graph;

    fn detector() -> GapDetector {
        GapDetector::new(build_prerequisite_graph().unwrap())
    }

    fn completed(topics: &[&str]) -> BTreeSet<String> {
        topics.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn chain_rule_patterns_beat_generic_keywords() {
        let d = detector();
        // "derivative" alone maps to derivatives.basic, but the composite
        // pattern is checked first.
        assert_eq!(
            d.analyze_query("How do I take the derivative of a composite function?"),
            Some("derivatives.chain_rule".to_string())
        );
        assert_eq!(
            d.analyze_query("differentiate sin(x^2)"),
            Some("derivatives.chain_rule".to_string())
        );
    }

    #[test]
    fn keyword_table_is_evaluated_in_row_order() {
        let d = detector();
        assert_eq!(
            d.analyze_query("What is a limit?"),
            Some("limits.introduction".to_string())
        );
        assert_eq!(
            d.analyze_query("How do I differentiate x^3?"),
            Some("derivatives.basic".to_string())
        );
        assert_eq!(
            d.analyze_query("antiderivative of 2x"),
            Some("integration.basic".to_string())
        );
        assert_eq!(
            d.analyze_query("help with u-substitution please"),
            Some("integration.substitution".to_string())
        );
        assert_eq!(d.analyze_query("what's for lunch"), None);
    }

    #[test]
    fn confusion_signals() {
        let d = detector();
        assert!(d.has_confusion_signals("I'm confused about limits"));
        assert!(d.has_confusion_signals("Can you explain the chain rule?"));
        assert!(!d.has_confusion_signals("Compute d/dx x^2"));
    }

    #[test]
    fn gaps_and_critical_gaps() {
        let d = detector();
        let gaps = d.detect_gaps("derivatives.chain_rule", &completed(&[]));
        assert!(gaps.contains(&"functions.composition".to_string()));
        assert!(gaps.contains(&"algebra.basics".to_string()));

        // Only topics with no prerequisites of their own are critical.
        let critical = d.detect_critical_gaps("derivatives.chain_rule", &completed(&[]));
        assert_eq!(critical, ["algebra.basics"]);
    }

    #[test]
    fn next_topic_follows_the_learning_path() {
        let d = detector();
        assert_eq!(
            d.next_topic("derivatives.chain_rule", &completed(&[])),
            Some("algebra.basics".to_string())
        );

        let done = completed(&[
            "algebra.basics",
            "algebra.factoring",
            "functions.notation",
            "functions.composition",
            "limits.introduction",
            "derivatives.definition",
            "derivatives.basic",
        ]);
        assert_eq!(d.next_topic("derivatives.chain_rule", &done), None);
    }

    #[test]
    fn analyze_with_gaps_produces_suggestions() {
        let d = detector();
        let analysis = d.analyze("Explain the chain rule", &completed(&["algebra.basics"]));

        assert_eq!(
            analysis.detected_topic.as_deref(),
            Some("derivatives.chain_rule")
        );
        assert!(analysis.has_gaps);
        assert!(
            analysis
                .missing_prerequisites
                .contains(&"functions.composition".to_string())
        );
        assert!(analysis.next_topic.is_some());
        assert!(!analysis.suggestions.is_empty());
    }

    #[test]
    fn analyze_without_detected_topic() {
        let d = detector();
        let analysis = d.analyze("tell me a joke", &completed(&[]));
        assert!(analysis.detected_topic.is_none());
        assert!(!analysis.has_gaps);
        assert!(analysis.missing_prerequisites.is_empty());
        assert_eq!(analysis.suggestions.len(), 1);
    }
}
