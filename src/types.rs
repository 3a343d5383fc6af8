//! Core types used throughout the migration orchestrator.

use crate::error::{Error, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque cluster member identifier.
pub type NodeId = String;

/// Basic-auth credentials for the remote source cluster.
///
/// `Debug` never prints the password, and the type is deliberately not
/// serializable.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create credentials from a username and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The password. Only request builders should read this.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A `host:port` pair as understood by the allowlist consumer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostPort(String);

impl HostPort {
    /// Build from separate host and port.
    pub fn new(host: &str, port: u16) -> Self {
        Self(format!("{}:{}", host, port))
    }

    /// The `host:port` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parsed location of the remote source cluster.
///
/// Parsing fails for anything that cannot be reindexed from: missing host,
/// unsupported scheme, no known port, or a query or fragment. Userinfo is
/// stripped so the URI is safe to log; credentials travel separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUri {
    url: Url,
    port: u16,
}

impl SourceUri {
    /// Parse and validate a source cluster URI.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut url =
            Url::parse(raw).map_err(|e| Error::Config(format!("malformed source URI: {}", e)))?;

        // Errors below name the URI, so drop any embedded credentials first
        if !url.username().is_empty() || url.password().is_some() {
            if url.set_username("").is_err() || url.set_password(None).is_err() {
                return Err(Error::Config(
                    "source URI cannot carry credentials".to_string(),
                ));
            }
            tracing::warn!(uri = %url, "Ignoring credentials embedded in source URI");
        }

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::Config(format!(
                    "unsupported scheme {:?} in source URI {}",
                    other, url
                )))
            }
        }

        if url.host_str().map(str::is_empty).unwrap_or(true) {
            return Err(Error::Config(format!("source URI {} has no host", url)));
        }

        if url.query().is_some() || url.fragment().is_some() {
            return Err(Error::Config(format!(
                "source URI {} must not have a query or fragment",
                url
            )));
        }

        let port = url
            .port_or_known_default()
            .ok_or_else(|| Error::Config(format!("source URI {} has no port", url)))?;

        Ok(Self { url, port })
    }

    /// URL scheme (`http` or `https`).
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Host name or address.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Explicit port, or the scheme default.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path component, `/` when none was given.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// `host:port` used for the allowlist.
    pub fn host_port(&self) -> HostPort {
        HostPort::new(self.host(), self.port)
    }

    /// Base URL with a trailing slash, for joining API paths.
    pub fn base_url(&self) -> String {
        let s = self.url.as_str();
        if s.ends_with('/') {
            s.to_string()
        } else {
            format!("{}/", s)
        }
    }
}

impl fmt::Display for SourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
