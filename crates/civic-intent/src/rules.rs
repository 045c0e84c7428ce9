//! The ordered top-level rule table.
//!
//! Rules are evaluated top to bottom and the first match wins. The
//! department overrides come in a fixed order (benefits, tax, vehicle,
//! housing, waste), so "child care and tax help" resolves to benefits.
//! There is no scoring and no multi-intent resolution.

use civic_core::DepartmentContext;

use crate::patterns::Matcher;

/// What a matching rule decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    /// Answer with a greeting scoped to the current department.
    Greeting,
    /// Route to this department regardless of the current page.
    SwitchTo(DepartmentContext),
}

/// One (predicate, outcome) entry of the table.
#[derive(Debug, Clone)]
pub struct Rule {
    name: &'static str,
    matcher: Matcher,
    outcome: RuleOutcome,
}

impl Rule {
    pub fn new(name: &'static str, matcher: Matcher, outcome: RuleOutcome) -> Self {
        Self {
            name,
            matcher,
            outcome,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn outcome(&self) -> RuleOutcome {
        self.outcome
    }

    pub fn matches(&self, normalized: &str) -> bool {
        self.matcher.matches(normalized)
    }
}

/// Benefits keywords. `care` must stay ahead of the vehicle `car` keyword.
pub const BENEFITS_KEYWORDS: &[&str] = &["child", "care", "benefit", "food"];
pub const TAX_KEYWORDS: &[&str] = &["tax"];
pub const VEHICLE_KEYWORDS: &[&str] = &["vehicle", "car", "register", "park"];
pub const HOUSING_KEYWORDS: &[&str] = &["hous", "rent"];
pub const WASTE_KEYWORDS: &[&str] = &["waste", "trash", "recycl"];

/// Ordered collection of top-level rules.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleSet {
    /// The standard table: greeting first, then department overrides.
    pub fn new() -> Self {
        let rules = vec![
            Rule::new("greeting", Matcher::greeting(), RuleOutcome::Greeting),
            Rule::new(
                "benefits_keywords",
                Matcher::any(BENEFITS_KEYWORDS),
                RuleOutcome::SwitchTo(DepartmentContext::Benefits),
            ),
            Rule::new(
                "tax_keywords",
                Matcher::any(TAX_KEYWORDS),
                RuleOutcome::SwitchTo(DepartmentContext::Tax),
            ),
            Rule::new(
                "vehicle_keywords",
                Matcher::any(VEHICLE_KEYWORDS),
                RuleOutcome::SwitchTo(DepartmentContext::Vehicle),
            ),
            Rule::new(
                "housing_keywords",
                Matcher::any(HOUSING_KEYWORDS),
                RuleOutcome::SwitchTo(DepartmentContext::Housing),
            ),
            Rule::new(
                "waste_keywords",
                Matcher::any(WASTE_KEYWORDS),
                RuleOutcome::SwitchTo(DepartmentContext::Waste),
            ),
        ];
        Self { rules }
    }

    /// Build a table from explicit rules, in evaluation order.
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// First matching rule, if any.
    pub fn first_match(&self, normalized: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.matches(normalized))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}
