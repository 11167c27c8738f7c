//! Terraform version detection and gating.
//!
//! Commands that shell out to Terraform first parse the banner printed by
//! `terraform version` and check it against a version constraint, so an
//! incompatible binary is rejected before it touches any state.

use semver::{Version, VersionReq};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum VersionError {
    /// The version banner did not contain a recognizable `X.Y.Z` token.
    #[error("unable to parse a Terraform version from {0:?}")]
    InvalidSyntax(String),

    /// The constraint expression itself could not be parsed.
    #[error("invalid version constraint {0:?}")]
    InvalidConstraint(String),

    /// The detected version does not satisfy the required constraint.
    #[error("Terraform {version} does not satisfy the required constraint {constraint}")]
    ConstraintUnsatisfied {
        version: Version,
        constraint: VersionReq,
    },
}

/// Extract a structured version from the output of `terraform version`.
///
/// Accepts `Terraform vX.Y.Z` and `Terraform X.Y.Z`, with arbitrary trailing
/// content (a build hash, a `-dev` suffix, a parenthetical). Only the
/// `X.Y.Z` token immediately following the product name is significant.
pub fn parse_version_banner(banner: &str) -> Result<Version, VersionError> {
    let invalid = || VersionError::InvalidSyntax(banner.to_string());

    let (_, rest) = banner.split_once("Terraform ").ok_or_else(invalid)?;
    let token = rest.split_whitespace().next().ok_or_else(invalid)?;
    let token = token.strip_prefix('v').unwrap_or(token);

    // Cut the token at the first character that cannot be part of an
    // `X.Y.Z` core, discarding `-dev` style suffixes.
    let end = token
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(token.len());
    let core = &token[..end];
    if core.is_empty() {
        return Err(invalid());
    }

    Version::parse(core).map_err(|_| invalid())
}

/// Parse a constraint expression into a [`VersionReq`].
///
/// On top of the standard range-operator syntax this accepts the spellings
/// Terraform users are used to: a `v` prefix on versions (`>= v0.9.3`),
/// `==` for exact matches, and the pessimistic operator `~>` (mapped to
/// tilde semantics).
pub fn parse_constraint(input: &str) -> Result<VersionReq, VersionError> {
    let normalized = input
        .split(',')
        .map(normalize_comparator)
        .collect::<Vec<_>>()
        .join(", ");

    VersionReq::parse(&normalized).map_err(|_| VersionError::InvalidConstraint(input.to_string()))
}

fn normalize_comparator(comparator: &str) -> String {
    let mut rest = comparator.trim();
    let mut op = String::new();

    if let Some(tail) = rest.strip_prefix("~>") {
        op.push('~');
        rest = tail;
    } else if let Some(tail) = rest.strip_prefix("==") {
        op.push('=');
        rest = tail;
    } else {
        let idx = rest
            .find(|c: char| !matches!(c, '<' | '>' | '=' | '~' | '^'))
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(idx);
        op.push_str(head);
        rest = tail;
    }

    let version = rest.trim_start();
    let version = version.strip_prefix('v').unwrap_or(version);
    format!("{op}{version}")
}

/// Check a detected version against a constraint.
///
/// Pure comparison; returns `ConstraintUnsatisfied` carrying both values on
/// mismatch.
pub fn check_version_constraint(
    version: &Version,
    constraint: &VersionReq,
) -> Result<(), VersionError> {
    if constraint.matches(version) {
        Ok(())
    } else {
        Err(VersionError::ConstraintUnsatisfied {
            version: version.clone(),
            constraint: constraint.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn check(version_str: &str, constraint_str: &str) -> Result<(), VersionError> {
        let constraint = parse_constraint(constraint_str).unwrap();
        check_version_constraint(&version(version_str), &constraint)
    }

    #[test]
    fn test_constraint_equal() {
        assert!(check("0.9.3", ">= 0.9.3").is_ok());
    }

    #[test]
    fn test_constraint_greater_patch() {
        assert!(check("0.9.4", ">= 0.9.3").is_ok());
    }

    #[test]
    fn test_constraint_greater_major() {
        assert!(check("1.0.0", ">= 0.9.3").is_ok());
    }

    #[test]
    fn test_constraint_less_patch() {
        assert!(check("0.9.2", ">= 0.9.3").is_err());
    }

    #[test]
    fn test_constraint_less_major() {
        assert!(check("0.8.8", ">= 0.9.3").is_err());
    }

    #[test]
    fn test_constraint_with_v_prefix() {
        assert!(check("0.9.4", ">= v0.9.3").is_ok());
        assert!(check("0.9.2", ">= v0.9.3").is_err());
    }

    #[test]
    fn test_constraint_pessimistic_operator() {
        assert!(check("1.2.5", "~> 1.2.0").is_ok());
        assert!(check("1.3.0", "~> 1.2.0").is_err());
    }

    #[test]
    fn test_constraint_double_equals() {
        assert!(check("1.2.3", "== 1.2.3").is_ok());
        assert!(check("1.2.4", "== 1.2.3").is_err());
    }

    #[test]
    fn test_constraint_invalid() {
        assert_eq!(
            parse_constraint("not a constraint"),
            Err(VersionError::InvalidConstraint("not a constraint".to_string()))
        );
    }

    #[test]
    fn test_constraint_unsatisfied_carries_both_values() {
        let err = check("0.8.8", ">= 0.9.3").unwrap_err();
        match err {
            VersionError::ConstraintUnsatisfied {
                version: actual,
                constraint,
            } => {
                assert_eq!(actual, version("0.8.8"));
                assert!(constraint.matches(&version("0.9.3")));
            }
            other => panic!("Expected ConstraintUnsatisfied, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_version_normal() {
        assert_eq!(parse_version_banner("Terraform v0.9.3"), Ok(version("0.9.3")));
    }

    #[test]
    fn test_parse_version_without_v() {
        assert_eq!(parse_version_banner("Terraform 0.9.3"), Ok(version("0.9.3")));
    }

    #[test]
    fn test_parse_version_with_debug_hash() {
        assert_eq!(
            parse_version_banner(
                "Terraform v0.9.4 cad024a5fe131a546936674ef85445215bbc4226"
            ),
            Ok(version("0.9.4"))
        );
    }

    #[test]
    fn test_parse_version_with_changes() {
        assert_eq!(
            parse_version_banner(
                "Terraform v0.9.4-dev (cad024a5fe131a546936674ef85445215bbc4226+CHANGES)"
            ),
            Ok(version("0.9.4"))
        );
    }

    #[test]
    fn test_parse_version_with_dev() {
        assert_eq!(
            parse_version_banner("Terraform v0.9.4-dev"),
            Ok(version("0.9.4"))
        );
    }

    #[test]
    fn test_parse_version_multiline_banner() {
        assert_eq!(
            parse_version_banner("Terraform v1.5.7\non linux_amd64"),
            Ok(version("1.5.7"))
        );
    }

    #[test]
    fn test_parse_version_invalid_syntax() {
        assert_eq!(
            parse_version_banner("invalid-syntax"),
            Err(VersionError::InvalidSyntax("invalid-syntax".to_string()))
        );
    }

    #[test]
    fn test_parse_version_product_name_without_token() {
        assert_eq!(
            parse_version_banner("Terraform "),
            Err(VersionError::InvalidSyntax("Terraform ".to_string()))
        );
    }
}
