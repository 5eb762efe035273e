//! URL opening

use std::process::Command;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Failed to launch opener: {0}")]
    Launch(#[from] std::io::Error),
}

/// Opens a URL in the user's browser
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), OpenError>;
}

/// Opens http(s) URLs with the platform launcher
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<(), OpenError> {
        let url = validate(url)?;

        let mut command = launcher();
        command.arg(url.as_str());
        command.spawn()?;

        tracing::debug!(url = %url, "Opened URL");
        Ok(())
    }
}

/// Accept only absolute http(s) URLs
pub fn validate(url: &str) -> Result<Url, OpenError> {
    let parsed = Url::parse(url).map_err(|e| OpenError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(OpenError::UnsupportedScheme(other.to_string())),
    }
}

#[cfg(target_os = "macos")]
fn launcher() -> Command {
    Command::new("open")
}

#[cfg(target_os = "windows")]
fn launcher() -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", "start", ""]);
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn launcher() -> Command {
    Command::new("xdg-open")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_http() {
        assert!(validate("https://example.com/docs").is_ok());
        assert!(validate("http://localhost:8088").is_ok());
    }

    #[test]
    fn test_validate_rejects_other_schemes() {
        assert!(matches!(
            validate("file:///etc/passwd"),
            Err(OpenError::UnsupportedScheme(_))
        ));
        assert!(matches!(validate("not a url"), Err(OpenError::InvalidUrl(_))));
    }
}
