//! Integration tests for client capability negotiation through configuration.

use revsel_core::exclusion::{build_chain, PolicyConfig, PolicyKind};
use revsel_core::{ClientCapability, ClientKind, RevselError, SelectionConfig};

use ClientCapability::{Any, Cli, Embedded};

fn user_policy(requires: ClientCapability) -> PolicyConfig {
    PolicyConfig::new(PolicyKind::UserExclusion {
        excluded_users: "bot".to_string(),
    })
    .requiring(requires)
}

// ── Merge algebra ───────────────────────────────────────────────────────

#[test]
fn merge_laws_hold() {
    assert_eq!(Cli.merge(Cli).unwrap(), Cli);
    assert_eq!(Cli.merge(Any).unwrap(), Cli);
    assert_eq!(Any.merge(Any).unwrap(), Any);
    assert!(matches!(
        Cli.merge(Embedded),
        Err(RevselError::CapabilityConflict { .. })
    ));
    for a in [Cli, Embedded, Any] {
        for b in [Cli, Embedded, Any] {
            assert_eq!(a.merge(b).ok(), b.merge(a).ok(), "{a} / {b}");
        }
    }
}

#[test]
fn chain_requirement_is_order_independent() {
    let orders = [
        vec![Any, Cli, Any],
        vec![Cli, Any, Any],
        vec![Any, Any, Cli],
    ];
    for order in orders {
        let configs: Vec<PolicyConfig> = order.into_iter().map(user_policy).collect();
        let chain = build_chain(&configs).unwrap();
        assert_eq!(chain.required_client().unwrap(), Cli);
    }
}

// ── Resolution from configuration ───────────────────────────────────────

#[test]
fn no_requirement_uses_default_client() {
    let config = SelectionConfig::from_toml_str("default_client = \"embedded\"").unwrap();
    assert_eq!(config.resolve_client().unwrap(), ClientKind::Embedded);
}

#[test]
fn requirement_overrides_default_client() {
    let config = SelectionConfig::from_toml_str(
        r#"
default_client = "cli"

[[policies]]
type = "path_restriction"
excluded_regions = "docs/.*"
requires_client = "embedded"

[[policies]]
type = "message_exclusion"
excluded_message = "wip"
"#,
    )
    .unwrap();
    assert_eq!(config.resolve_client().unwrap(), ClientKind::Embedded);
}

#[test]
fn conflicting_requirements_fail_resolution() {
    let config = SelectionConfig::from_toml_str(
        r#"
[[policies]]
type = "user_exclusion"
excluded_users = "bot"
requires_client = "embedded"

[[policies]]
type = "message_exclusion"
excluded_message = "wip"
requires_client = "cli"
"#,
    )
    .unwrap();
    let err = config.resolve_client().unwrap_err();
    assert!(err.is_fatal());
    match err {
        RevselError::CapabilityConflict { left, right } => {
            assert_eq!(left, Embedded);
            assert_eq!(right, Cli);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn unknown_capability_is_a_parse_error() {
    let err = SelectionConfig::from_toml_str(
        "[[policies]]\ntype = \"user_exclusion\"\nexcluded_users = \"x\"\nrequires_client = \"jgit\"",
    )
    .unwrap_err();
    assert!(matches!(err, RevselError::Toml(_)));
}
