// src/types.rs

use std::str::FromStr;

use serde::Deserialize;

/// What happens to Pending dependents when one of their dependencies does not
/// complete successfully.
///
/// - `Cascade`: a dependent of a Failed job becomes Failed, and a dependent of
///   a Cancelled job becomes Cancelled, without running. The cascade follows
///   the dependents transitively (default behaviour).
/// - `Continue`: a dependent is promoted to Ready once every dependency is in
///   any terminal state, so one failure never strands the rest of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Cascade,
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cascade" => Ok(FailurePolicy::Cascade),
            "continue" => Ok(FailurePolicy::Continue),
            other => Err(format!(
                "invalid failure_policy: {other} (expected \"cascade\" or \"continue\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_policy_case_insensitively() {
        assert_eq!("Cascade".parse(), Ok(FailurePolicy::Cascade));
        assert_eq!(" continue ".parse(), Ok(FailurePolicy::Continue));
        assert!("retry".parse::<FailurePolicy>().is_err());
    }
}
