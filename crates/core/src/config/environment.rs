use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Environment the application runs in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Environment {
    Development,
    Test,
    Production,
    /// Any other named environment (e.g. "staging")
    Custom(String),
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::invalid_value(
                "environment",
                s,
                "development, test, production or a custom name",
            ));
        }

        match trimmed.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" | "testing" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            _ => Ok(Environment::Custom(trimmed.to_string())),
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Environment> for String {
    fn from(env: Environment) -> Self {
        env.name().to_string()
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Environment {
    /// Canonical name of the environment
    pub fn name(&self) -> &str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
            Environment::Custom(name) => name,
        }
    }

    /// Check if environment is development
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    /// Check if environment is production
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Whether resource reloading is on unless explicitly configured
    pub fn reload_by_default(&self) -> bool {
        !self.is_production()
    }
}

/// Build scope a plugin may be restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum BuildScope {
    Test,
    FunctionalTest,
    War,
    Run,
    All,
}

impl FromStr for BuildScope {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "test" => Ok(BuildScope::Test),
            "functional-test" | "functionaltest" => Ok(BuildScope::FunctionalTest),
            "war" => Ok(BuildScope::War),
            "run" => Ok(BuildScope::Run),
            "all" => Ok(BuildScope::All),
            _ => Err(ConfigError::invalid_value(
                "build_scope",
                s,
                "test, functional-test, war, run or all",
            )),
        }
    }
}

impl TryFrom<String> for BuildScope {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BuildScope> for String {
    fn from(scope: BuildScope) -> Self {
        scope.to_string()
    }
}

impl std::fmt::Display for BuildScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scope_str = match self {
            BuildScope::Test => "test",
            BuildScope::FunctionalTest => "functional-test",
            BuildScope::War => "war",
            BuildScope::Run => "run",
            BuildScope::All => "all",
        };
        write!(f, "{}", scope_str)
    }
}
