//! Text matchers used by the rule table and the sub-intent cascade.
//!
//! Matchers run against normalized text (lowercased, trimmed). Keyword
//! matchers are plain substring checks, so `hous` covers "housing" and
//! "household"; whole-word behaviour needs a [`Matcher::Pattern`].

use regex::Regex;

/// Greeting words, matched as whole words.
pub const GREETING_PATTERN: &str =
    r"\b(hi|hello|hey|greetings|good morning|good afternoon|good evening)\b";

/// A predicate over normalized query text.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Compiled regular expression.
    Pattern(Regex),
    /// True when any keyword occurs as a substring.
    AnyOf(&'static [&'static str]),
    /// True when every inner matcher is true.
    AllOf(Vec<Matcher>),
}

impl Matcher {
    /// Whole-word greeting matcher.
    pub fn greeting() -> Self {
        Matcher::Pattern(Regex::new(GREETING_PATTERN).expect("Invalid greeting regex"))
    }

    pub fn any(keywords: &'static [&'static str]) -> Self {
        Matcher::AnyOf(keywords)
    }

    pub fn all(matchers: Vec<Matcher>) -> Self {
        Matcher::AllOf(matchers)
    }

    /// Evaluate against text that has already been normalized.
    pub fn matches(&self, normalized: &str) -> bool {
        match self {
            Matcher::Pattern(regex) => regex.is_match(normalized),
            Matcher::AnyOf(keywords) => keywords.iter().any(|k| normalized.contains(k)),
            Matcher::AllOf(inner) => inner.iter().all(|m| m.matches(normalized)),
        }
    }
}

/// Lowercase and trim raw user input.
pub fn normalize(query: &str) -> String {
    query.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  How Do I FILE?  "), "how do i file?");
        assert_eq!(normalize("\t\n"), "");
    }

    #[test]
    fn test_greeting_whole_words_only() {
        let m = Matcher::greeting();
        assert!(m.matches("hi"));
        assert!(m.matches("hello there"));
        assert!(m.matches("well, good morning!"));
        assert!(m.matches("hey, what's up"));
        assert!(!m.matches("this is a shipment"));
        assert!(!m.matches("they said"));
        assert!(!m.matches("good day"));
    }

    #[test]
    fn test_any_of_is_substring() {
        let m = Matcher::any(&["hous", "rent"]);
        assert!(m.matches("household help"));
        assert!(m.matches("pay my rent"));
        assert!(!m.matches("apartment"));
    }

    #[test]
    fn test_all_of() {
        let m = Matcher::all(vec![Matcher::any(&["tax"]), Matcher::any(&["file", "return"])]);
        assert!(m.matches("how do i file my taxes"));
        assert!(m.matches("tax return status"));
        assert!(!m.matches("tax rate"));
        assert!(!m.matches("file a complaint"));
    }

    #[test]
    fn test_empty_all_of_matches() {
        assert!(Matcher::all(vec![]).matches("anything"));
    }
}
