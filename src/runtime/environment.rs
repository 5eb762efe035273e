//! Host environment descriptor

use serde::Serialize;

/// Build and platform information reported to the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub build_type: String,
    pub platform: String,
    pub arch: String,
}

impl Environment {
    /// The fixed descriptor for a browser-hosted client
    pub fn browser() -> Self {
        Self {
            build_type: "production".to_string(),
            platform: "web".to_string(),
            arch: "web".to_string(),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::browser()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(Environment::browser()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"buildType": "production", "platform": "web", "arch": "web"})
        );
    }
}
