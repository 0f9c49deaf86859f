//! Connection string parsing and credential masking.
//!
//! Format: `scheme://[user[:password]@]host[:port]/database[?query]`
//!
//! Passwords may contain `@` and `:`; the userinfo always ends at the
//! **last** `@` after the scheme separator.

use std::fmt;

use thiserror::Error;

/// Replacement for the password segment in rendered connection strings.
pub const PASSWORD_MASK: &str = "****";

/// Errors produced while parsing a connection string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("connection string has no scheme separator (`://`)")]
    MissingScheme,

    #[error("connection string has an empty host")]
    EmptyHost,

    #[error("invalid port: {0}")]
    InvalidPort(String),
}

/// Split the part after `://` into `(userinfo, host_and_rest)`.
///
/// Only the text before the first `?` or `#` can hold the userinfo. Returns
/// `None` for the userinfo when no credentials are present. A candidate
/// userinfo whose user part contains `/` is really a path containing `@`,
/// so it is not treated as credentials.
fn split_userinfo(rest: &str) -> (Option<&str>, &str) {
    let end = rest.find(['?', '#']).unwrap_or(rest.len());

    for (at_pos, _) in rest[..end].rmatch_indices('@') {
        let (userinfo, after) = (&rest[..at_pos], &rest[at_pos + 1..end]);

        // An `@` in the path, behind an earlier `@` that ends the userinfo
        if !after.contains('/') && userinfo.contains('/') && userinfo.contains('@') {
            continue;
        }

        let user = userinfo.split(':').next().unwrap_or_default();
        if user.contains('/') {
            return (None, rest);
        }
        return (Some(userinfo), &rest[at_pos + 1..]);
    }
    (None, rest)
}

/// Replace the password in a connection string with [`PASSWORD_MASK`].
///
/// Scheme, user, host, port, path and query are preserved verbatim. Strings
/// without a password (or without `://`) are returned unchanged.
pub fn mask_connection_string(connection_string: &str) -> String {
    let Some(sep) = connection_string.find("://") else {
        return connection_string.to_string();
    };
    let (scheme, rest) = (&connection_string[..sep], &connection_string[sep + 3..]);

    match split_userinfo(rest) {
        (Some(userinfo), host) => match userinfo.split_once(':') {
            Some((user, _password)) => {
                format!("{}://{}:{}@{}", scheme, user, PASSWORD_MASK, host)
            }
            None => connection_string.to_string(),
        },
        (None, _) => connection_string.to_string(),
    }
}

/// A parsed connection string.
///
/// `Display` renders the masked form and `Debug` never shows the password,
/// so a `ConnectionUrl` is safe to log.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionUrl {
    scheme: String,
    user: Option<String>,
    password: Option<String>,
    host: String,
    port: Option<u16>,
    database: String,
    query: Option<String>,
}

impl ConnectionUrl {
    /// Parse a connection string.
    pub fn parse(url: &str) -> Result<Self, UrlError> {
        let (scheme, rest) = url.split_once("://").ok_or(UrlError::MissingScheme)?;

        let (userinfo, host_part) = split_userinfo(rest);
        let (user, password) = match userinfo {
            Some(info) => match info.split_once(':') {
                Some((user, password)) => (Some(user.to_string()), Some(password.to_string())),
                None => (Some(info.to_string()), None),
            },
            None => (None, None),
        };

        // Split host_part by / to separate host:port from database
        let (host_port, path) = match host_part.find('/') {
            Some(slash_pos) => (&host_part[..slash_pos], &host_part[slash_pos + 1..]),
            None => (host_part, ""),
        };

        let (database, query) = match path.split_once('?') {
            Some((database, query)) => (database, Some(query.to_string())),
            None => (path, None),
        };

        let (host, port) = split_host_port(host_port)?;
        if host.is_empty() {
            return Err(UrlError::EmptyHost);
        }

        Ok(Self {
            scheme: scheme.to_string(),
            user,
            password,
            host: host.to_string(),
            port,
            database: database.to_string(),
            query,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn has_credentials(&self) -> bool {
        self.user.is_some()
    }
}

/// Split `host[:port]`, keeping bracketed IPv6 literals intact.
fn split_host_port(host_port: &str) -> Result<(&str, Option<u16>), UrlError> {
    let colon = if host_port.starts_with('[') {
        host_port.find("]:").map(|i| i + 1)
    } else {
        host_port.rfind(':')
    };

    match colon {
        Some(colon_pos) => {
            let port_str = &host_port[colon_pos + 1..];
            let port = port_str
                .parse::<u16>()
                .map_err(|_| UrlError::InvalidPort(port_str.to_string()))?;
            Ok((&host_port[..colon_pos], Some(port)))
        }
        None => Ok((host_port, None)),
    }
}

impl fmt::Display for ConnectionUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        if let Some(user) = &self.user {
            f.write_str(user)?;
            if self.password.is_some() {
                write!(f, ":{}", PASSWORD_MASK)?;
            }
            f.write_str("@")?;
        }
        f.write_str(&self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        write!(f, "/{}", self.database)?;
        if let Some(query) = &self.query {
            write!(f, "?{}", query)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionUrl")
            .field("scheme", &self.scheme)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| PASSWORD_MASK))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("query", &self.query)
            .finish()
    }
}
