//! Named deployment environments and base-URL resolution.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Public API deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    #[default]
    Production,
    ProductionUs,
    ProductionEu,
    ProductionIndia,
}

impl Environment {
    pub const ALL: [Environment; 4] = [
        Environment::Production,
        Environment::ProductionUs,
        Environment::ProductionEu,
        Environment::ProductionIndia,
    ];

    pub fn base_url(self) -> &'static str {
        match self {
            Environment::Production => "https://api.elevenlabs.io",
            Environment::ProductionUs => "https://api.us.elevenlabs.io",
            Environment::ProductionEu => "https://api.eu.residency.elevenlabs.io",
            Environment::ProductionIndia => "https://api.in.residency.elevenlabs.io",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::ProductionUs => "production_us",
            Environment::ProductionEu => "production_eu",
            Environment::ProductionIndia => "production_india",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Environment::ALL
            .into_iter()
            .find(|env| env.name() == s)
            .ok_or_else(|| Error::UnknownEnvironment {
                name: s.to_string(),
            })
    }
}

/// Pick the base URL: an explicit URL always wins, otherwise the named environment.
pub fn resolve_base_url(explicit: Option<&str>, environment: &str) -> Result<String> {
    if let Some(url) = explicit {
        return Ok(url.to_string());
    }
    Ok(environment.parse::<Environment>()?.base_url().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_named_environments() {
        assert_eq!(
            resolve_base_url(None, "production").unwrap(),
            "https://api.elevenlabs.io"
        );
        assert_eq!(
            resolve_base_url(None, "production_us").unwrap(),
            "https://api.us.elevenlabs.io"
        );
        assert_eq!(
            resolve_base_url(None, "production_eu").unwrap(),
            "https://api.eu.residency.elevenlabs.io"
        );
        assert_eq!(
            resolve_base_url(None, "production_india").unwrap(),
            "https://api.in.residency.elevenlabs.io"
        );
    }

    #[test]
    fn explicit_url_wins() {
        assert_eq!(
            resolve_base_url(Some("https://custom.api.com"), "production_us").unwrap(),
            "https://custom.api.com"
        );
        assert_eq!(
            resolve_base_url(Some("https://custom.api.com"), "nowhere").unwrap(),
            "https://custom.api.com"
        );
    }

    #[test]
    fn unknown_environment_errors() {
        let err = resolve_base_url(None, "invalid").unwrap_err();
        assert!(matches!(err, Error::UnknownEnvironment { ref name } if name == "invalid"));
        assert_eq!(err.to_string(), "Unknown environment 'invalid'");
    }

    #[test]
    fn round_trips_names() {
        for env in Environment::ALL {
            assert_eq!(env.to_string().parse::<Environment>().unwrap(), env);
        }
        assert_eq!(Environment::default(), Environment::Production);
    }
}
