//! URL handling: split a request URL into the pieces the engine needs.

use url::{Host, Url};

use crate::error::RequestError;

/// A parsed request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: Url,
    pub tls: bool,
    /// Address to connect to (IPv6 without brackets).
    pub host: String,
    /// Value for the `Host` header; carries the port only when it is not
    /// the scheme default.
    pub host_header: String,
    pub port: u16,
    /// Origin-form request target: path plus `?query`.
    pub path: String,
}

impl Target {
    pub fn parse(raw: &str) -> Result<Self, RequestError> {
        let malformed = || RequestError::UrlMalformed(raw.to_string());
        let url = Url::parse(raw).map_err(|_| malformed())?;

        let tls = match url.scheme() {
            "http" | "ws" => false,
            "https" | "wss" => true,
            _ => return Err(malformed()),
        };
        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => return Err(malformed()),
        };
        let port = url.port_or_known_default().ok_or_else(malformed)?;
        let host_header = match url.port() {
            Some(explicit) => format!("{}:{explicit}", url.host_str().unwrap_or(&host)),
            None => url.host_str().unwrap_or(&host).to_string(),
        };

        let mut path = match url.path() {
            "" => "/".to_string(),
            p => p.to_string(),
        };
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self {
            url,
            tls,
            host,
            host_header,
            port,
            path,
        })
    }

    /// Resolve a `Location` header value against this URL. Absolute
    /// locations come back unchanged.
    pub fn resolve(&self, location: &str) -> Result<String, RequestError> {
        self.url
            .join(location)
            .map(String::from)
            .map_err(|_| RequestError::UrlMalformed(location.to_string()))
    }
}
