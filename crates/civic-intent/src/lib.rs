//! Keyword intent router for the civic services assistant.
//!
//! Maps free text plus the active department to one canned
//! [`StructuredResponse`](civic_core::StructuredResponse) through an ordered
//! rule table: greeting, department keyword overrides, per-department
//! sub-intents, then a generic fallback.

pub mod catalog;
pub mod patterns;
pub mod router;
pub mod rules;

pub use catalog::{Catalog, CatalogEntry, Variant, FALLBACK_TEXT};
pub use patterns::Matcher;
pub use router::{IntentRouter, RouteDecision};
pub use rules::{Rule, RuleOutcome, RuleSet};
