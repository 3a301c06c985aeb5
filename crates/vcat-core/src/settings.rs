use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app_config::AppConfig;
use crate::TemplateDefaults;

/// What happens to templates and variants that the latest completed import
/// set no longer references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalePolicy {
    /// Deactivate them.
    Archive,
    /// Keep them active but set `to_remove`.
    Flag,
    /// Leave them untouched.
    None,
}

impl fmt::Display for StalePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StalePolicy::Archive => write!(f, "archive"),
            StalePolicy::Flag => write!(f, "flag"),
            StalePolicy::None => write!(f, "none"),
        }
    }
}

impl FromStr for StalePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "archive" => Ok(StalePolicy::Archive),
            "flag" => Ok(StalePolicy::Flag),
            "none" => Ok(StalePolicy::None),
            other => Err(format!("expected archive, flag or none, got \"{other}\"")),
        }
    }
}

/// The subset of configuration the import engine needs.
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub window_size: usize,
    pub budget: Duration,
    pub stale_policy: StalePolicy,
    pub currency_code: String,
    pub size_attribute: String,
    pub image_batch_size: usize,
    pub defaults: TemplateDefaults,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            window_size: 80,
            budget: Duration::from_secs(600),
            stale_policy: StalePolicy::Flag,
            currency_code: "USD".to_string(),
            size_attribute: "Size".to_string(),
            image_batch_size: 50,
            defaults: TemplateDefaults::default(),
        }
    }
}

impl ImportSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            window_size: config.window_size,
            budget: Duration::from_secs(config.import_budget_secs),
            stale_policy: config.stale_policy,
            currency_code: config.currency_code.clone(),
            size_attribute: config.size_attribute.clone(),
            image_batch_size: config.image_batch_size,
            defaults: TemplateDefaults::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_policy_parses_case_insensitively() {
        assert_eq!("ARCHIVE".parse::<StalePolicy>(), Ok(StalePolicy::Archive));
        assert_eq!(" flag ".parse::<StalePolicy>(), Ok(StalePolicy::Flag));
        assert_eq!("none".parse::<StalePolicy>(), Ok(StalePolicy::None));
    }

    #[test]
    fn stale_policy_rejects_unknown_value() {
        assert!("delete".parse::<StalePolicy>().is_err());
    }

    #[test]
    fn stale_policy_display_round_trips() {
        for policy in [StalePolicy::Archive, StalePolicy::Flag, StalePolicy::None] {
            assert_eq!(policy.to_string().parse::<StalePolicy>(), Ok(policy));
        }
    }
}
