//! The intent router.
//!
//! [`IntentRouter::route`] is a pure function of `(query, context)`. The
//! async [`IntentRouter::respond`] adds a random delay so the assistant feels
//! conversational; the delay never changes the answer.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use civic_core::{DepartmentContext, PortalConfig, StructuredResponse};

use crate::catalog::Catalog;
use crate::patterns::normalize;
use crate::rules::{Rule, RuleOutcome, RuleSet};

/// Which branch of the cascade produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Greeting scoped to the given (current) context.
    Greeting(DepartmentContext),
    /// Canned answer of the given department, forced or current.
    Department(DepartmentContext),
    /// Generic fallback.
    Fallback,
}

/// Deterministic keyword router.
#[derive(Debug, Clone)]
pub struct IntentRouter {
    brand_name: String,
    department_names: HashMap<DepartmentContext, String>,
    rules: RuleSet,
    catalog: Catalog,
    latency_ms: (u64, u64),
}

impl Default for IntentRouter {
    fn default() -> Self {
        Self::from_config(&PortalConfig::default())
    }
}

impl IntentRouter {
    /// Build a router with the branding and latency range of `config`.
    pub fn from_config(config: &PortalConfig) -> Self {
        let department_names = DepartmentContext::ALL
            .into_iter()
            .map(|d| (d, config.department(d).name))
            .collect();
        Self {
            brand_name: config.brand.name.clone(),
            department_names,
            rules: RuleSet::new(),
            catalog: Catalog::new(),
            latency_ms: (config.chat.latency_min_ms, config.chat.latency_max_ms),
        }
    }

    /// Replace the simulated latency range. `(0, 0)` disables the delay.
    pub fn with_latency(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.latency_ms = (min_ms.min(max_ms), max_ms);
        self
    }

    pub fn rules(&self) -> &[Rule] {
        self.rules.rules()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn department_name(&self, dept: DepartmentContext) -> &str {
        self.department_names
            .get(&dept)
            .map(String::as_str)
            .unwrap_or_else(|| dept.as_str())
    }

    /// Decide which branch answers `query` in `context`.
    pub fn classify(&self, query: &str, context: DepartmentContext) -> RouteDecision {
        let normalized = normalize(query);
        if normalized.is_empty() {
            return RouteDecision::Fallback;
        }
        match self.rules.first_match(&normalized).map(|r| r.outcome()) {
            Some(RuleOutcome::Greeting) => RouteDecision::Greeting(context),
            Some(RuleOutcome::SwitchTo(dept)) => RouteDecision::Department(dept),
            None if context.is_home() => RouteDecision::Fallback,
            None => RouteDecision::Department(context),
        }
    }

    /// Produce the response for `query` in `context`.
    pub fn route(&self, query: &str, context: DepartmentContext) -> StructuredResponse {
        let decision = self.classify(query, context);
        debug!(department = %context, ?decision, "Routing query");

        match decision {
            RouteDecision::Greeting(dept) => self.greeting(dept),
            RouteDecision::Department(dept) => self
                .catalog
                .answer(dept, &normalize(query))
                .unwrap_or_else(|| self.catalog.fallback().clone()),
            RouteDecision::Fallback => self.catalog.fallback().clone(),
        }
    }

    /// [`route`](Self::route) after a random delay in the configured range.
    pub async fn respond(&self, query: &str, context: DepartmentContext) -> StructuredResponse {
        let delay = self.sample_latency();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.route(query, context)
    }

    fn sample_latency(&self) -> Duration {
        let (min, max) = self.latency_ms;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    fn greeting(&self, dept: DepartmentContext) -> StructuredResponse {
        match self.catalog.base(dept) {
            None => StructuredResponse::text(self.home_welcome_text()),
            Some(base) => {
                let mut resp = base.clone();
                resp.text = format!(
                    "Hello! I am the assistant for {}. How can I direct you?",
                    self.department_name(dept)
                );
                resp
            }
        }
    }

    fn home_welcome_text(&self) -> String {
        format!(
            "Welcome to {}. How can I assist you with city services today?",
            self.brand_name
        )
    }

    /// Seed message written into an empty transcript.
    pub fn welcome(&self, dept: DepartmentContext) -> StructuredResponse {
        if dept.is_home() {
            StructuredResponse::text(self.home_welcome_text())
        } else {
            StructuredResponse::text(format!(
                "Welcome to the {} assistant.",
                self.department_name(dept)
            ))
        }
    }
}
