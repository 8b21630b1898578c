//! Build mode (`build.mode`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment the site is rendered for.
///
/// Unknown values are rejected at parse time with an error naming the option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl TryFrom<String> for BuildMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "invalid value `{other}` for `build.mode`: expected `development` or `production`"
            )),
        }
    }
}

impl From<BuildMode> for String {
    fn from(mode: BuildMode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from() {
        assert_eq!(
            BuildMode::try_from("production".to_string()),
            Ok(BuildMode::Production)
        );
        let err = BuildMode::try_from("staging".to_string()).unwrap_err();
        assert!(err.contains("build.mode"));
        assert!(err.contains("staging"));
    }
}
