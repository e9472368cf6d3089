//! Named selection profiles.
//!
//! A profile is an ordered list of [`SyncRule`]s. Rules are evaluated in
//! order during a sync; when two rules select the same accession the first
//! one wins.

use serde::Serialize;

use crate::error::{Error, Result};

/// One catalog query within a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncRule {
    /// Form type to match (case-insensitive, exact).
    pub form: &'static str,
    /// Maximum rows taken from the catalog for this rule.
    pub limit: usize,
    /// Only filings from the last `days` days, if set.
    pub within_days: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Profile {
    pub name: &'static str,
    pub description: &'static str,
    pub rules: &'static [SyncRule],
}

pub const DEFAULT_PROFILE: &str = "core";

const fn rule(form: &'static str, limit: usize, within_days: Option<u32>) -> SyncRule {
    SyncRule {
        form,
        limit,
        within_days,
    }
}

static PROFILES: &[Profile] = &[
    Profile {
        name: "core",
        description: "Latest annual and quarterly reports plus the past year of current reports",
        rules: &[
            rule("10-K", 1, None),
            rule("10-Q", 3, None),
            rule("8-K", 8, Some(365)),
        ],
    },
    Profile {
        name: "annual",
        description: "Annual reports, domestic and foreign",
        rules: &[
            rule("10-K", 5, None),
            rule("20-F", 5, None),
            rule("40-F", 5, None),
        ],
    },
    Profile {
        name: "quarterly",
        description: "Two years of quarterly reports",
        rules: &[rule("10-Q", 8, None)],
    },
    Profile {
        name: "events",
        description: "Current reports from the last six months",
        rules: &[rule("8-K", 25, Some(180)), rule("6-K", 25, Some(180))],
    },
    Profile {
        name: "governance",
        description: "Proxy statements and recent insider/ownership activity",
        rules: &[
            rule("DEF 14A", 2, None),
            rule("SC 13D", 5, Some(730)),
            rule("SC 13G", 5, Some(730)),
        ],
    },
    Profile {
        name: "full",
        description: "Broad corpus: annual, quarterly, current and proxy filings",
        rules: &[
            rule("10-K", 3, None),
            rule("10-Q", 6, None),
            rule("8-K", 20, Some(365)),
            rule("DEF 14A", 1, None),
            rule("20-F", 3, None),
        ],
    },
];

pub fn all() -> &'static [Profile] {
    PROFILES
}

/// Look up a profile by name.
pub fn get(name: &str) -> Result<&'static Profile> {
    PROFILES.iter().find(|p| p.name == name).ok_or_else(|| {
        Error::validation(format!(
            "unknown profile '{}'. Available: {}",
            name,
            PROFILES
                .iter()
                .map(|p| p.name)
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })
}

/// CLI entry point: print every profile and its rules.
pub fn list_profiles(json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(PROFILES)?);
        return Ok(());
    }

    println!("{:<12} {:<10} {:>5}  WINDOW", "PROFILE", "FORM", "LIMIT");
    for profile in PROFILES {
        for (i, r) in profile.rules.iter().enumerate() {
            let name = if i == 0 { profile.name } else { "" };
            let window = r
                .within_days
                .map(|d| format!("{}d", d))
                .unwrap_or_else(|| "-".to_string());
            println!("{:<12} {:<10} {:>5}  {}", name, r.form, r.limit, window);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_exists() {
        assert_eq!(get(DEFAULT_PROFILE).unwrap().name, "core");
    }

    #[test]
    fn test_unknown_profile_lists_known() {
        let err = get("nope").unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, Error::Validation(_)));
        assert!(msg.contains("core") && msg.contains("events"));
    }

    #[test]
    fn test_profiles_well_formed() {
        for p in all() {
            assert!(!p.rules.is_empty(), "profile {} has no rules", p.name);
            for r in p.rules {
                assert!(r.limit > 0, "profile {} rule {} has zero limit", p.name, r.form);
            }
        }
        let mut names: Vec<_> = all().iter().map(|p| p.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), all().len());
    }
}
