//! Branch specifications: glob-like patterns matched against branch names.
//!
//! A spec is either a glob (`origin/master`, `*/release-*`, `**/feature`) or,
//! when prefixed with `:`, a raw regular expression. Environment variables in
//! a spec are expanded right before matching, so the same configuration can
//! follow build parameters.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::domain::error::{Result, RevselError};
use crate::domain::revision::{Branch, Revision};

/// Ordered environment used to expand `$VAR` / `${VAR}` references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVars {
    vars: BTreeMap<String, String>,
}

fn var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("static variable pattern compiles")
    })
}

impl EnvVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment. Variables that are not
    /// valid UTF-8 are skipped.
    pub fn from_process() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Overlay `other` on top of `self`; keys in `other` win.
    pub fn overlay(mut self, other: &EnvVars) -> Self {
        for (k, v) in &other.vars {
            self.vars.insert(k.clone(), v.clone());
        }
        self
    }

    /// Substitute `$VAR` and `${VAR}`. Unknown variables are left verbatim.
    pub fn expand(&self, input: &str) -> String {
        if !input.contains('$') {
            return input.to_string();
        }
        var_pattern()
            .replace_all(input, |caps: &Captures<'_>| {
                let key = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                match self.vars.get(key) {
                    Some(value) => value.clone(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

impl FromIterator<(String, String)> for EnvVars {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

/// A specification of branches to build, rather like a refspec.
///
/// ```text
/// master
/// origin/master
/// origin/*
/// origin/*/thing
/// :^origin/(release|hotfix)-\d+$
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct BranchSpec {
    name: String,
}

impl BranchSpec {
    /// Create a spec; surrounding whitespace is trimmed and an empty name
    /// means "every branch" (`**`).
    pub fn new(name: impl AsRef<str>) -> Self {
        let trimmed = name.as_ref().trim();
        let name = if trimmed.is_empty() {
            "**".to_string()
        } else {
            trimmed.to_string()
        };
        Self { name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compile the anchored pattern for this spec under `env`.
    pub fn pattern(&self, env: &EnvVars) -> Result<Regex> {
        let expanded = self.expanded_name(env);

        let source = match expanded.strip_prefix(':') {
            Some(raw) if !raw.is_empty() => format!("^(?:{raw})$"),
            _ => {
                // Accept the legacy ways of naming a remote branch in front of
                // the glob. An unqualified name matches on any remote.
                let mut builder = String::from("^(?:refs/heads/");
                if !expanded.contains("**") && !expanded.contains('/') {
                    builder.push_str("|refs/remotes/[^/]+/|remotes/[^/]+/|[^/]+/");
                } else {
                    builder.push_str("|refs/remotes/|remotes/");
                }
                builder.push_str(")?");
                builder.push_str(&wildcard_to_regex(&expanded));
                builder.push('$');
                builder
            }
        };

        Regex::new(&source).map_err(|e| RevselError::InvalidBranchSpec {
            spec: self.name.clone(),
            reason: e.to_string(),
        })
    }

    /// Whether `item` (a branch name such as `origin/master`) matches.
    pub fn matches(&self, item: &str, env: &EnvVars) -> Result<bool> {
        Ok(self.pattern(env)?.is_match(item))
    }

    /// The subset of `names` matching this spec, in input order.
    pub fn filter_matching<'a, I>(&self, names: I, env: &EnvVars) -> Result<Vec<&'a str>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let pattern = self.pattern(env)?;
        Ok(names.into_iter().filter(|n| pattern.is_match(n)).collect())
    }

    fn expanded_name(&self, env: &EnvVars) -> String {
        let expanded = env.expand(&self.name);
        if expanded.is_empty() {
            "**".to_string()
        } else {
            expanded
        }
    }
}

impl From<String> for BranchSpec {
    fn from(name: String) -> Self {
        BranchSpec::new(name)
    }
}

impl From<&str> for BranchSpec {
    fn from(name: &str) -> Self {
        BranchSpec::new(name)
    }
}

impl From<BranchSpec> for String {
    fn from(spec: BranchSpec) -> Self {
        spec.name
    }
}

impl fmt::Display for BranchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// `**` matches across `/`, a single `*` stays within one path segment, every
/// other character is literal.
fn wildcard_to_regex(glob: &str) -> String {
    let mut out = String::new();
    let mut literal = String::new();
    let mut pending_star = false;

    let flush = |out: &mut String, literal: &mut String, pending_star: &mut bool| {
        if literal.is_empty() {
            return;
        }
        if *pending_star {
            out.push_str("[^/]*");
            *pending_star = false;
        }
        out.push_str(&regex::escape(literal));
        literal.clear();
    };

    for ch in glob.chars() {
        if ch == '*' {
            flush(&mut out, &mut literal, &mut pending_star);
            if pending_star {
                out.push_str(".*");
                pending_star = false;
            } else {
                pending_star = true;
            }
        } else {
            literal.push(ch);
        }
    }
    flush(&mut out, &mut literal, &mut pending_star);
    if pending_star {
        out.push_str("[^/]*");
    }
    out
}

/// Compile every spec once for a selection pass.
pub fn compile_specs(specs: &[BranchSpec], env: &EnvVars) -> Result<Vec<Regex>> {
    specs.iter().map(|s| s.pattern(env)).collect()
}

/// Reorder a revision's branches so names matching earlier specs come first.
///
/// Branches matching no spec keep their relative order at the end. This
/// keeps the reported branch of a re-run deterministic.
pub fn sort_branches_for_revision(
    revision: &Revision,
    order: &[BranchSpec],
    env: &EnvVars,
) -> Result<Revision> {
    let mut remaining: Vec<Branch> = revision.branches.clone();
    let mut ordered: Vec<Branch> = Vec::with_capacity(remaining.len());

    for spec in order {
        let pattern = spec.pattern(env)?;
        let (matched, rest): (Vec<Branch>, Vec<Branch>) = remaining
            .into_iter()
            .partition(|b| pattern.is_match(&b.name));
        ordered.extend(matched);
        remaining = rest;
    }
    ordered.extend(remaining);

    Ok(Revision::with_branches(revision.sha1.clone(), ordered))
}
