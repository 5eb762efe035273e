//! Endpoint derivation
//!
//! The socket endpoint is derived from the origin of the hosting page:
//! `<ws|wss>://<page-host>/ws`, secure iff the page itself is secure.

use url::Url;

use super::error::TransportError;

/// Default socket path on the backend
pub const DEFAULT_PATH: &str = "/ws";

/// Compute the WebSocket endpoint for a page URL and socket path
pub fn endpoint_for(page_url: &str, path: &str) -> Result<String, TransportError> {
    let page = Url::parse(page_url)
        .map_err(|e| TransportError::InvalidEndpoint(format!("{}: {}", page_url, e)))?;

    let scheme = match page.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(TransportError::InvalidEndpoint(format!(
                "unsupported page scheme '{}'",
                other
            )))
        }
    };

    let host = page
        .host_str()
        .ok_or_else(|| TransportError::InvalidEndpoint(format!("{} has no host", page_url)))?;

    let port = page.port().map(|p| format!(":{}", p)).unwrap_or_default();

    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    Ok(format!("{}://{}{}{}", scheme, host, port, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_page_uses_ws() {
        let endpoint = endpoint_for("http://localhost:8088/app/index.html", DEFAULT_PATH).unwrap();
        assert_eq!(endpoint, "ws://localhost:8088/ws");
    }

    #[test]
    fn test_secure_page_uses_wss() {
        let endpoint = endpoint_for("https://example.com/", DEFAULT_PATH).unwrap();
        assert_eq!(endpoint, "wss://example.com/ws");
    }

    #[test]
    fn test_default_port_omitted() {
        let endpoint = endpoint_for("https://example.com:443", DEFAULT_PATH).unwrap();
        assert_eq!(endpoint, "wss://example.com/ws");
    }

    #[test]
    fn test_path_normalized() {
        let endpoint = endpoint_for("http://127.0.0.1:9000", "events").unwrap();
        assert_eq!(endpoint, "ws://127.0.0.1:9000/events");
    }

    #[test]
    fn test_ipv6_host() {
        let endpoint = endpoint_for("http://[::1]:8088", DEFAULT_PATH).unwrap();
        assert_eq!(endpoint, "ws://[::1]:8088/ws");
    }

    #[test]
    fn test_invalid_pages() {
        assert!(endpoint_for("not a url", DEFAULT_PATH).is_err());
        assert!(endpoint_for("file:///tmp/index.html", DEFAULT_PATH).is_err());
    }
}
