//! Static calculus topic catalog.
//!
//! Covers the pre-calculus foundations (algebra, functions, trigonometry,
//! exponentials/logarithms) through limits, derivatives, applications, and
//! integration. Topic ids are dotted `area.topic` strings; difficulty runs
//! 1 (foundational) to 5.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::errors::curriculum_error::CurriculumError;
use crate::graph::PrerequisiteGraph;

/// One catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topic {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub difficulty: u8,
    pub prerequisites: &'static [&'static str],
    pub tags: &'static [&'static str],
}

/// The complete curriculum, in teaching order.
const CALCULUS_TOPICS: &[Topic] = &[
    // Pre-Calculus: Algebra
    Topic {
        id: "algebra.basics",
        display_name: "Algebra Basics",
        description: "Fundamental algebraic operations and expressions",
        difficulty: 1,
        prerequisites: &[],
        tags: &["foundational", "algebra"],
    },
    Topic {
        id: "algebra.factoring",
        display_name: "Factoring",
        description: "Factoring polynomials and algebraic expressions",
        difficulty: 2,
        prerequisites: &["algebra.basics"],
        tags: &["algebra", "foundational"],
    },
    Topic {
        id: "algebra.rational_expressions",
        display_name: "Rational Expressions",
        description: "Working with fractions containing polynomials",
        difficulty: 2,
        prerequisites: &["algebra.factoring"],
        tags: &["algebra"],
    },
    Topic {
        id: "algebra.exponents",
        display_name: "Exponent Rules",
        description: "Laws of exponents and exponential expressions",
        difficulty: 2,
        prerequisites: &["algebra.basics"],
        tags: &["algebra", "foundational"],
    },
    // Pre-Calculus: Functions
    Topic {
        id: "functions.notation",
        display_name: "Function Notation",
        description: "Understanding f(x) notation and function evaluation",
        difficulty: 1,
        prerequisites: &["algebra.basics"],
        tags: &["functions", "foundational"],
    },
    Topic {
        id: "functions.domain_range",
        display_name: "Domain and Range",
        description: "Finding domain and range of functions",
        difficulty: 2,
        prerequisites: &["functions.notation"],
        tags: &["functions"],
    },
    Topic {
        id: "functions.composition",
        display_name: "Function Composition",
        description: "Composing functions: f(g(x))",
        difficulty: 3,
        prerequisites: &["functions.notation"],
        tags: &["functions", "important"],
    },
    Topic {
        id: "functions.inverse",
        display_name: "Inverse Functions",
        description: "Finding and understanding inverse functions",
        difficulty: 3,
        prerequisites: &["functions.notation"],
        tags: &["functions"],
    },
    // Pre-Calculus: Trigonometry
    Topic {
        id: "trig.unit_circle",
        display_name: "Unit Circle",
        description: "Understanding the unit circle and trigonometric values",
        difficulty: 2,
        prerequisites: &["algebra.basics"],
        tags: &["trigonometry", "foundational"],
    },
    Topic {
        id: "trig.identities",
        display_name: "Trigonometric Identities",
        description: "Common trig identities and their applications",
        difficulty: 3,
        prerequisites: &["trig.unit_circle"],
        tags: &["trigonometry"],
    },
    Topic {
        id: "trig.inverse",
        display_name: "Inverse Trigonometric Functions",
        description: "Arcsin, arccos, arctan and their properties",
        difficulty: 3,
        prerequisites: &["trig.unit_circle", "functions.inverse"],
        tags: &["trigonometry"],
    },
    // Pre-Calculus: Exponentials & Logarithms
    Topic {
        id: "exp_log.exponentials",
        display_name: "Exponential Functions",
        description: "Properties of exponential functions",
        difficulty: 2,
        prerequisites: &["algebra.exponents", "functions.notation"],
        tags: &["exponentials"],
    },
    Topic {
        id: "exp_log.logarithms",
        display_name: "Logarithms",
        description: "Logarithmic functions and their properties",
        difficulty: 3,
        prerequisites: &["exp_log.exponentials", "functions.inverse"],
        tags: &["logarithms"],
    },
    // Calculus: Limits
    Topic {
        id: "limits.introduction",
        display_name: "Introduction to Limits",
        description: "Understanding the concept of limits",
        difficulty: 3,
        prerequisites: &["algebra.factoring", "functions.notation"],
        tags: &["limits", "foundational", "calculus"],
    },
    Topic {
        id: "limits.techniques",
        display_name: "Limit Techniques",
        description: "Direct substitution, factoring, and rationalization",
        difficulty: 3,
        prerequisites: &["limits.introduction", "algebra.rational_expressions"],
        tags: &["limits", "calculus"],
    },
    Topic {
        id: "limits.infinity",
        display_name: "Limits at Infinity",
        description: "Limits involving infinity",
        difficulty: 4,
        prerequisites: &["limits.techniques"],
        tags: &["limits", "calculus"],
    },
    Topic {
        id: "limits.continuity",
        display_name: "Continuity",
        description: "Continuous functions and the intermediate value theorem",
        difficulty: 3,
        prerequisites: &["limits.introduction"],
        tags: &["limits", "calculus"],
    },
    // Calculus: Derivatives
    Topic {
        id: "derivatives.definition",
        display_name: "Definition of Derivative",
        description: "Understanding derivatives as limits",
        difficulty: 3,
        prerequisites: &["limits.introduction"],
        tags: &["derivatives", "foundational", "calculus"],
    },
    Topic {
        id: "derivatives.basic",
        display_name: "Basic Derivative Rules",
        description: "Power rule, constant rule, sum/difference rules",
        difficulty: 2,
        prerequisites: &["derivatives.definition"],
        tags: &["derivatives", "calculus"],
    },
    Topic {
        id: "derivatives.power_rule",
        display_name: "Power Rule",
        description: "Derivatives of x^n",
        difficulty: 2,
        prerequisites: &["derivatives.basic"],
        tags: &["derivatives", "calculus"],
    },
    Topic {
        id: "derivatives.product_rule",
        display_name: "Product Rule",
        description: "Derivatives of products of functions",
        difficulty: 3,
        prerequisites: &["derivatives.basic"],
        tags: &["derivatives", "calculus"],
    },
    Topic {
        id: "derivatives.quotient_rule",
        display_name: "Quotient Rule",
        description: "Derivatives of quotients of functions",
        difficulty: 3,
        prerequisites: &["derivatives.basic"],
        tags: &["derivatives", "calculus"],
    },
    Topic {
        id: "derivatives.chain_rule",
        display_name: "Chain Rule",
        description: "Derivatives of composite functions",
        difficulty: 4,
        prerequisites: &["derivatives.basic", "functions.composition"],
        tags: &["derivatives", "important", "calculus"],
    },
    Topic {
        id: "derivatives.trig",
        display_name: "Trigonometric Derivatives",
        description: "Derivatives of sin, cos, tan, etc.",
        difficulty: 3,
        prerequisites: &["derivatives.basic", "trig.unit_circle"],
        tags: &["derivatives", "trigonometry", "calculus"],
    },
    Topic {
        id: "derivatives.exp_log",
        display_name: "Exponential and Logarithmic Derivatives",
        description: "Derivatives of e^x and ln(x)",
        difficulty: 3,
        prerequisites: &["derivatives.basic", "exp_log.logarithms"],
        tags: &["derivatives", "exponentials", "calculus"],
    },
    // Calculus: Applications of Derivatives
    Topic {
        id: "applications.related_rates",
        display_name: "Related Rates",
        description: "Solving related rates problems",
        difficulty: 4,
        prerequisites: &["derivatives.chain_rule"],
        tags: &["applications", "calculus"],
    },
    Topic {
        id: "applications.optimization",
        display_name: "Optimization",
        description: "Finding maxima and minima",
        difficulty: 4,
        prerequisites: &["derivatives.basic"],
        tags: &["applications", "calculus"],
    },
    // Calculus: Integration
    Topic {
        id: "integration.introduction",
        display_name: "Introduction to Integration",
        description: "Understanding integrals as antiderivatives",
        difficulty: 3,
        prerequisites: &["derivatives.basic"],
        tags: &["integration", "foundational", "calculus"],
    },
    Topic {
        id: "integration.basic",
        display_name: "Basic Integration Rules",
        description: "Power rule for integration, constant multiples",
        difficulty: 3,
        prerequisites: &["integration.introduction"],
        tags: &["integration", "calculus"],
    },
    Topic {
        id: "integration.substitution",
        display_name: "U-Substitution",
        description: "Integration by substitution",
        difficulty: 4,
        prerequisites: &["integration.basic", "derivatives.chain_rule"],
        tags: &["integration", "important", "calculus"],
    },
    Topic {
        id: "integration.parts",
        display_name: "Integration by Parts",
        description: "Using the integration by parts formula",
        difficulty: 4,
        prerequisites: &["integration.basic", "derivatives.product_rule"],
        tags: &["integration", "calculus"],
    },
    Topic {
        id: "integration.trig",
        display_name: "Trigonometric Integration",
        description: "Integrals involving trig functions",
        difficulty: 4,
        prerequisites: &["integration.basic", "trig.identities"],
        tags: &["integration", "trigonometry", "calculus"],
    },
];

fn catalog_index() -> &'static HashMap<&'static str, &'static Topic> {
    static INDEX: OnceLock<HashMap<&'static str, &'static Topic>> = OnceLock::new();
    INDEX.get_or_init(|| CALCULUS_TOPICS.iter().map(|t| (t.id, t)).collect())
}

/// The full catalog in teaching order.
pub fn all_topics() -> &'static [Topic] {
    CALCULUS_TOPICS
}

/// Look up one topic by id.
pub fn topic_info(topic_id: &str) -> Option<&'static Topic> {
    catalog_index().get(topic_id).copied()
}

/// All topics at exactly this difficulty level (1-5).
pub fn topics_by_difficulty(difficulty: u8) -> Vec<&'static Topic> {
    CALCULUS_TOPICS
        .iter()
        .filter(|t| t.difficulty == difficulty)
        .collect()
}

/// Case-insensitive keyword search over display name, description, and tags.
pub fn search_topics(keyword: &str) -> Vec<&'static Topic> {
    let keyword = keyword.to_lowercase();
    CALCULUS_TOPICS
        .iter()
        .filter(|t| {
            t.display_name.to_lowercase().contains(&keyword)
                || t.description.to_lowercase().contains(&keyword)
                || t.tags.iter().any(|tag| tag.to_lowercase().contains(&keyword))
        })
        .collect()
}

/// Build the prerequisite graph for the whole catalog.
///
/// # Errors
/// `CircularDependency` if the catalog were ever edited into a cycle.
pub fn build_prerequisite_graph() -> Result<PrerequisiteGraph, CurriculumError> {
    let mut graph = PrerequisiteGraph::new();
    for topic in CALCULUS_TOPICS {
        graph.add_topic(
            topic.id,
            topic.prerequisites.iter().map(|p| p.to_string()).collect(),
        )?;
    }
    Ok(graph)
}
