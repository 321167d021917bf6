//! Selection configuration loaded from TOML.
//!
//! ```toml
//! chooser = "inverse"
//! branches = ["*/master", "*/release-*"]
//! remotes = ["origin"]
//! default_client = "cli"
//!
//! [env]
//! RELEASE = "release-1"
//!
//! # read when chooser = "ancestry"
//! [ancestry]
//! maximum_age_days = 30
//! ancestor_commit = "0123456789abcdef0123456789abcdef01234567"
//!
//! [[policies]]
//! type = "user_exclusion"
//! excluded_users = "ci-bot"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::branch_spec::{compile_specs, BranchSpec, EnvVars};
use crate::capability::ClientKind;
use crate::chooser::{AncestryChooser, AncestryOptions, BuildChooser, ChooserKind};
use crate::domain::error::{Result, RevselError};
use crate::exclusion::{build_chain, ExclusionChain, PolicyConfig};
use crate::obs;

/// Top-level selection configuration for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Which chooser strategy to run.
    #[serde(default)]
    pub chooser: ChooserKind,

    /// Branch specs, in priority order.
    #[serde(default)]
    pub branches: Vec<BranchSpec>,

    /// Remote names used to qualify single-branch hints.
    #[serde(default = "default_remotes")]
    pub remotes: Vec<String>,

    /// Backend used when no policy requires a specific one.
    #[serde(default = "default_client")]
    pub default_client: ClientKind,

    /// Variables overlaid on the process environment for spec expansion.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Exclusion policies, in evaluation order.
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,

    /// Limits for the ancestry chooser.
    #[serde(default)]
    pub ancestry: AncestryOptions,
}

fn default_remotes() -> Vec<String> {
    vec!["origin".to_string()]
}

fn default_client() -> ClientKind {
    ClientKind::Cli
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            chooser: ChooserKind::default(),
            branches: Vec::new(),
            remotes: default_remotes(),
            default_client: default_client(),
            env: BTreeMap::new(),
            policies: Vec::new(),
            ancestry: AncestryOptions::default(),
        }
    }
}

impl SelectionConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// `Toml` for malformed input. `Config` for a blank or qualified remote
    /// name, or a policy that cannot be built. `InvalidBranchSpec` for a spec
    /// that does not compile under the configured environment.
    /// `InvalidObjectId` for a malformed ancestry commit.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SelectionConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.remotes.iter().any(|r| r.trim().is_empty() || r.contains('/')) {
            return Err(RevselError::Config(
                "remote names must be non-empty and contain no '/'".to_string(),
            ));
        }
        compile_specs(&self.branches, &self.environment())?;
        self.exclusion_chain()?;
        self.ancestry.ancestor()?;
        Ok(())
    }

    pub fn branch_specs(&self) -> &[BranchSpec] {
        &self.branches
    }

    /// Process environment overlaid with `[env]`.
    pub fn environment(&self) -> EnvVars {
        let configured: EnvVars = self
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        EnvVars::from_process().overlay(&configured)
    }

    pub fn chooser(&self) -> Box<dyn BuildChooser> {
        match self.chooser {
            ChooserKind::Ancestry => Box::new(AncestryChooser::new(self.ancestry.clone())),
            kind => kind.build(),
        }
    }

    pub fn exclusion_chain(&self) -> Result<ExclusionChain> {
        build_chain(&self.policies)
    }

    /// The backend every configured policy agrees on.
    ///
    /// Fails with `CapabilityConflict` before any repository is opened.
    pub fn resolve_client(&self) -> Result<ClientKind> {
        let required = self.exclusion_chain()?.required_client()?;
        let client = required.resolve(self.default_client);
        obs::emit_capability_resolved(required, client);
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclusion::PolicyKind;

    const FULL: &str = r#"
chooser = "inverse"
branches = ["*/master", "*/${RELEASE}"]
remotes = ["origin", "upstream"]
default_client = "cli"

[env]
RELEASE = "release-1"

[[policies]]
type = "user_exclusion"
excluded_users = "ci-bot\nrelease-bot"

[[policies]]
type = "message_exclusion"
excluded_message = "\\[ci skip\\]"
requires_client = "cli"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = SelectionConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.chooser, ChooserKind::Inverse);
        assert_eq!(config.branch_specs().len(), 2);
        assert_eq!(config.remotes, vec!["origin", "upstream"]);
        assert_eq!(config.policies.len(), 2);
        assert!(matches!(
            config.policies[0].kind,
            PolicyKind::UserExclusion { .. }
        ));
        assert_eq!(config.chooser().name(), "inverse");
        assert_eq!(config.exclusion_chain().unwrap().len(), 2);
    }

    #[test]
    fn test_defaults() {
        let config = SelectionConfig::from_toml_str("").unwrap();
        assert_eq!(config, SelectionConfig::default());
        assert_eq!(config.chooser, ChooserKind::Default);
        assert_eq!(config.remotes, vec!["origin"]);
        assert_eq!(config.resolve_client().unwrap(), ClientKind::Cli);
    }

    #[test]
    fn test_env_overlay_expands_specs() {
        let config = SelectionConfig::from_toml_str(FULL).unwrap();
        let env = config.environment();
        assert_eq!(env.get("RELEASE"), Some("release-1"));
        let spec = &config.branch_specs()[1];
        assert!(spec.matches("origin/release-1", &env).unwrap());
        assert!(!spec.matches("origin/release-2", &env).unwrap());
    }

    #[test]
    fn test_resolve_client_uses_policy_requirement() {
        let config = SelectionConfig::from_toml_str(
            r#"
default_client = "embedded"

[[policies]]
type = "user_exclusion"
excluded_users = "bot"
requires_client = "cli"
"#,
        )
        .unwrap();
        assert_eq!(config.resolve_client().unwrap(), ClientKind::Cli);
    }

    #[test]
    fn test_conflict_fails_fast() {
        let config = SelectionConfig::from_toml_str(
            r#"
[[policies]]
type = "user_exclusion"
excluded_users = "bot"
requires_client = "cli"

[[policies]]
type = "path_restriction"
excluded_regions = "docs/.*"
requires_client = "embedded"
"#,
        )
        .unwrap();
        let err = config.resolve_client().unwrap_err();
        assert!(matches!(err, RevselError::CapabilityConflict { .. }));
    }

    #[test]
    fn test_invalid_inputs() {
        let bad_toml = SelectionConfig::from_toml_str("chooser = ").unwrap_err();
        assert!(matches!(bad_toml, RevselError::Toml(_)));

        let bad_spec = SelectionConfig::from_toml_str("branches = [\":(\"]").unwrap_err();
        assert!(matches!(bad_spec, RevselError::InvalidBranchSpec { .. }));

        let bad_remote = SelectionConfig::from_toml_str("remotes = [\"a/b\"]").unwrap_err();
        assert!(matches!(bad_remote, RevselError::Config(_)));

        let bad_region = SelectionConfig::from_toml_str(
            "[[policies]]\ntype = \"path_restriction\"\nincluded_regions = \"(\"",
        )
        .unwrap_err();
        assert!(matches!(bad_region, RevselError::Config(_)));
    }

    #[test]
    fn test_ancestry_options() {
        let config = SelectionConfig::from_toml_str(
            r#"
chooser = "ancestry"

[ancestry]
maximum_age_days = 14
ancestor_commit = "ABCDEF0123456789abcdef0123456789abcdef01"
"#,
        )
        .unwrap();
        assert_eq!(config.chooser().name(), "ancestry");
        assert_eq!(config.ancestry.maximum_age_days, Some(14));
        assert_eq!(
            config.ancestry.ancestor().unwrap().unwrap().as_str(),
            "abcdef0123456789abcdef0123456789abcdef01"
        );

        let err = SelectionConfig::from_toml_str("[ancestry]\nancestor_commit = \"main\"")
            .unwrap_err();
        assert!(matches!(err, RevselError::InvalidObjectId(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revsel.toml");
        std::fs::write(&path, FULL).unwrap();
        let config = SelectionConfig::load(&path).unwrap();
        assert_eq!(config.chooser, ChooserKind::Inverse);

        let missing = SelectionConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, RevselError::Io(_)));
    }
}
