//! Tests for the origin allow-list

use super::*;

#[test]
fn test_missing_origin_is_allowed() {
    let policy = OriginPolicy::default();

    let decision = policy.check(None);

    assert_eq!(decision, OriginDecision::NoOrigin);
    assert!(decision.is_allowed());
    assert_eq!(decision.allow_origin(), None);
}

#[test]
fn test_default_origins_are_allowed() {
    let policy = OriginPolicy::default();

    for origin in DEFAULT_ALLOWED_ORIGINS {
        let decision = policy.check(Some(origin));
        assert!(decision.is_allowed(), "{origin} should be allowed");
        assert_eq!(decision.allow_origin(), Some(origin));
    }
}

#[test]
fn test_unknown_origin_is_denied() {
    let policy = OriginPolicy::default();

    let decision = policy.check(Some("https://evil.example.com"));

    assert_eq!(
        decision,
        OriginDecision::Denied("https://evil.example.com".to_string())
    );
    assert!(!decision.is_allowed());
    assert_eq!(decision.allow_origin(), None);
}

#[test]
fn test_origin_comparison_ignores_case_and_trailing_slash() {
    let policy = OriginPolicy::new(["https://www.growfin.ai/"]);

    assert!(policy.check(Some("https://WWW.growfin.ai")).is_allowed());
    assert!(policy.check(Some("https://www.growfin.ai/")).is_allowed());
}

#[test]
fn test_origin_must_match_scheme_and_port() {
    let policy = OriginPolicy::default();

    assert!(!policy.check(Some("http://www.growfin.ai")).is_allowed());
    assert!(!policy.check(Some("http://localhost:3000")).is_allowed());
    assert!(!policy.check(Some("https://growfin.ai.evil.com")).is_allowed());
}

#[test]
fn test_empty_entries_are_ignored() {
    let policy = OriginPolicy::new(["", "  ", "http://localhost:5173"]);

    assert_eq!(policy.allowed(), &["http://localhost:5173".to_string()]);
    assert!(!policy.check(Some("")).is_allowed());
}

#[test]
fn test_bare_domain_needs_explicit_entry() {
    let defaults = OriginPolicy::default();
    let configured = OriginPolicy::new(["https://www.growfin.ai", "https://growfin.ai"]);

    assert!(!defaults.check(Some("https://growfin.ai")).is_allowed());
    assert!(configured.check(Some("https://growfin.ai")).is_allowed());
}
