//! Behavioural properties of the router across every department context.

use civic_core::{DepartmentContext, IconKey};
use civic_intent::{IntentRouter, RouteDecision, FALLBACK_TEXT};
use proptest::prelude::*;

fn router() -> IntentRouter {
    IntentRouter::default().with_latency(0, 0)
}

fn any_context() -> impl Strategy<Value = DepartmentContext> {
    prop_oneof![
        Just(DepartmentContext::Home),
        Just(DepartmentContext::Tax),
        Just(DepartmentContext::Vehicle),
        Just(DepartmentContext::Benefits),
        Just(DepartmentContext::Housing),
        Just(DepartmentContext::Waste),
    ]
}

proptest! {
    #[test]
    fn prop_every_query_gets_text(query in "\\PC{1,120}", dept in any_context()) {
        let resp = router().route(&query, dept);
        prop_assert!(!resp.text.is_empty());
    }

    #[test]
    fn prop_routing_is_deterministic(query in "[a-z ]{0,60}", dept in any_context()) {
        let r = router();
        prop_assert_eq!(r.route(&query, dept), r.route(&query, dept));
    }

    #[test]
    fn prop_greeting_is_never_fallback(
        greeting in prop_oneof![
            Just("hi"),
            Just("Hello"),
            Just("hey"),
            Just("Greetings"),
            Just("good morning"),
            Just("Good Afternoon"),
            Just("good evening"),
        ],
        dept in any_context(),
    ) {
        let r = router();
        let query = format!("{}, I have a question", greeting);
        prop_assert_eq!(r.classify(&query, dept), RouteDecision::Greeting(dept));
        let resp = r.route(&query, dept);
        prop_assert!(!resp.text.is_empty());
        prop_assert_ne!(resp.text, FALLBACK_TEXT);
    }
}

#[test]
fn test_benefits_override_wins_in_tax_page() {
    let r = router();
    let query = "I need child care and also tax help";
    assert_eq!(
        r.classify(query, DepartmentContext::Tax),
        RouteDecision::Department(DepartmentContext::Benefits)
    );
    let resp = r.route(query, DepartmentContext::Tax);
    assert!(resp.text.contains("Child Care Assistance"));
    assert!(resp.actions.iter().any(|a| a.icon_key == IconKey::Users));
}

#[test]
fn test_nonsense_in_home_is_stable_fallback() {
    let r = router();
    let first = r.route("xyzzy nonsense query", DepartmentContext::Home);
    let second = r.route("xyzzy nonsense query", DepartmentContext::Home);
    assert_eq!(first.text, FALLBACK_TEXT);
    assert_eq!(first, second);
    let contact = first.contact_block.unwrap();
    assert_eq!(contact.phone.as_deref(), Some("311"));
    assert_eq!(contact.email.as_deref(), Some("help@localsphere.org"));
    assert_eq!(contact.hours.as_deref(), Some("24/7"));
}

#[test]
fn test_tax_question_from_home_page() {
    let r = router();
    let resp = r.route("How do I file my taxes?", DepartmentContext::Home);
    assert!(resp.text.starts_with("To file your local taxes"));
    assert_eq!(
        resp.contact_block.unwrap().phone.as_deref(),
        Some("555-TAX-HELP")
    );
}

#[test]
fn test_link_markup_is_preserved() {
    let r = router();
    let resp = r.route("section 8 housing", DepartmentContext::Home);
    assert!(resp
        .text
        .contains("[apply for Section 8 vouchers](https://www.hud.gov/"));
}

#[test]
fn test_keyword_table_order() {
    let r = router();
    let cases = [
        ("food assistance", DepartmentContext::Benefits),
        ("car tax", DepartmentContext::Tax),
        ("parking permit", DepartmentContext::Vehicle),
        ("rent relief", DepartmentContext::Housing),
        ("trash day", DepartmentContext::Waste),
    ];
    for (query, expected) in cases {
        assert_eq!(
            r.classify(query, DepartmentContext::Home),
            RouteDecision::Department(expected),
            "{}",
            query
        );
    }
}

#[test]
fn test_shared_payment_variant() {
    let r = router();
    let resp = r.route("how do i pay", DepartmentContext::Housing);
    assert_eq!(resp.text, "Proceed to the secure payment gateway below.");
}

#[test]
fn test_rules_are_inspectable() {
    let r = router();
    let greeting = &r.rules()[0];
    assert_eq!(greeting.name(), "greeting");
    assert!(greeting.matches("hello"));
    assert!(!greeting.matches("shell"));
}
