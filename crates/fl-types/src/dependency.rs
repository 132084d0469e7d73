//! Dependency constraint strings attached to flows.
//!
//! Grammar: `name[(==|>=|>)version]` where version is one to three numeric
//! segments. A constraint without an operator only requires the package to be
//! present.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::errors::FlowError;

/// A package version of up to three numeric segments.
///
/// Comparison zero-extends the shorter side, so `1.2` and `1.2.0` are equal.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    segments: Vec<u64>,
}

impl Version {
    /// Build a version from explicit numeric segments.
    pub fn from_segments(segments: &[u64]) -> Self {
        let raw = segments
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        Self {
            raw,
            segments: normalize(segments),
        }
    }
}

fn normalize(segments: &[u64]) -> Vec<u64> {
    let mut out = segments.to_vec();
    while out.last() == Some(&0) {
        out.pop();
    }
    out
}

impl FromStr for Version {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(FlowError::InvalidConstraint(s.to_string()));
        }
        let mut segments = Vec::with_capacity(parts.len());
        for part in parts {
            let segment = part
                .parse::<u64>()
                .map_err(|_| FlowError::InvalidConstraint(s.to_string()))?;
            segments.push(segment);
        }
        Ok(Self {
            raw: s.to_string(),
            segments: normalize(&segments),
        })
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments.cmp(&other.segments)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Comparison operator of a dependency constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    Eq,
    Ge,
    Gt,
}

impl fmt::Display for ConstraintOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Eq => "==",
            Self::Ge => ">=",
            Self::Gt => ">",
        };
        write!(f, "{symbol}")
    }
}

/// One parsed dependency line of a flow.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyConstraint {
    pub package: String,
    pub requirement: Option<(ConstraintOp, Version)>,
}

impl DependencyConstraint {
    /// Whether the installed version meets this constraint.
    pub fn is_satisfied_by(&self, installed: &Version) -> bool {
        match &self.requirement {
            None => true,
            Some((ConstraintOp::Eq, required)) => installed == required,
            Some((ConstraintOp::Ge, required)) => installed >= required,
            Some((ConstraintOp::Gt, required)) => installed > required,
        }
    }
}

fn is_package_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl FromStr for DependencyConstraint {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ">=" must be probed before ">"
        let operators = [("==", ConstraintOp::Eq), (">=", ConstraintOp::Ge), (">", ConstraintOp::Gt)];
        for (symbol, op) in operators {
            if let Some(idx) = s.find(symbol) {
                let package = &s[..idx];
                let version = &s[idx + symbol.len()..];
                if !is_package_name(package) {
                    return Err(FlowError::InvalidConstraint(s.to_string()));
                }
                let version = version.parse::<Version>()?;
                return Ok(Self {
                    package: package.to_string(),
                    requirement: Some((op, version)),
                });
            }
        }
        if !is_package_name(s) {
            return Err(FlowError::InvalidConstraint(s.to_string()));
        }
        Ok(Self {
            package: s.to_string(),
            requirement: None,
        })
    }
}

impl fmt::Display for DependencyConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.requirement {
            None => write!(f, "{}", self.package),
            Some((op, version)) => write!(f, "{}{}{}", self.package, op, version),
        }
    }
}

/// Render a `package==version` provenance entry.
pub fn format_external_version(package: &str, version: &Version) -> String {
    format!("{package}=={version}")
}
