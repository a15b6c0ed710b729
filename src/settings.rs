use std::{
    fmt,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConversionError, LapsError};

/// File name of the settings file inside the users home directory
pub const SETTINGS_FILE_NAME: &str = ".laps-client.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LdapProtocol {
    Secure,
    #[default]
    Unsecure,
}

impl LdapProtocol {
    pub fn default_port(self) -> LdapPort {
        match self {
            LdapProtocol::Secure => 636,
            LdapProtocol::Unsecure => 389,
        }
    }
}

impl From<LdapProtocol> for &str {
    fn from(value: LdapProtocol) -> Self {
        match value {
            LdapProtocol::Secure => "ldaps",
            LdapProtocol::Unsecure => "ldap",
        }
    }
}

impl FromStr for LdapProtocol {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ldap" => Ok(LdapProtocol::Unsecure),
            "ldaps" => Ok(LdapProtocol::Secure),
            _ => Err(ConversionError::UnknownProtocol(s.to_owned())),
        }
    }
}

pub type LdapPort = u16;

/// Where to reach the directory.
///
/// Accepts `host`, `host:port`, `ldap://host[:port]` and `ldaps://host[:port]`.
/// IPv6 literals are given as `[addr]` or `[addr]:port`; a bare literal such as
/// `2001:db8::5` uses the default port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: LdapPort,
    pub protocol: LdapProtocol,
}

impl ServerAddress {
    /// This will construct a connection uri for [`ldap3`](mod@ldap3)
    pub fn connection_uri(&self) -> String {
        let protocol: &str = self.protocol.into();
        if self.host.contains(':') {
            format!("{}://[{}]:{}", protocol, self.host, self.port)
        } else {
            format!("{}://{}:{}", protocol, self.host, self.port)
        }
    }
}

impl FromStr for ServerAddress {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConversionError::InvalidServerAddress(s.to_owned());
        let s = s.trim();
        let (protocol, rest) = match s.split_once("://") {
            Some((scheme, rest)) => (scheme.parse()?, rest),
            None => (LdapProtocol::default(), s),
        };
        let rest = rest.trim_end_matches('/');
        let parse_port =
            |port: &str| -> Result<LdapPort, ConversionError> { port.parse().map_err(|_| invalid()) };
        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, after) = bracketed.split_once(']').ok_or_else(invalid)?;
            if !host.contains(':') {
                return Err(invalid());
            }
            match after {
                "" => (host, protocol.default_port()),
                _ => (host, parse_port(after.strip_prefix(':').ok_or_else(invalid)?)?),
            }
        } else if rest.matches(':').count() > 1 {
            (rest, protocol.default_port())
        } else {
            match rest.rsplit_once(':') {
                Some((host, port)) => (host, parse_port(port)?),
                None => (rest, protocol.default_port()),
            }
        };
        if host.is_empty() || host.contains(['/', ' ', '[', ']']) {
            return Err(invalid());
        }
        Ok(Self {
            host: host.to_owned(),
            port,
            protocol,
        })
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.connection_uri())
    }
}

/// The non-secret part of a session as it is written to disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSettings {
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub username: String,
}

/// Persistence of [`StoredSettings`]
pub trait SettingsStore {
    /// `Ok(None)` means nothing was stored yet
    fn load(&self) -> Result<Option<StoredSettings>, LapsError>;
    fn save(&self, settings: &StoredSettings) -> Result<(), LapsError>;
}

/// Settings kept as a JSON object in a single file
#[derive(Debug, Clone)]
pub struct JsonSettingsFile {
    path: PathBuf,
}

impl JsonSettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.laps-client.json`, or `None` if there is no home directory
    pub fn in_home_dir() -> Option<Self> {
        dirs::home_dir().map(|home| Self::new(home.join(SETTINGS_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> LapsError {
        LapsError::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}

impl SettingsStore for JsonSettingsFile {
    fn load(&self) -> Result<Option<StoredSettings>, LapsError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no settings at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| LapsError::MalformedSettings {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, settings: &StoredSettings) -> Result<(), LapsError> {
        let json = serde_json::to_string_pretty(settings).map_err(|source| {
            LapsError::MalformedSettings {
                path: self.path.clone(),
                source,
            }
        })?;
        std::fs::write(&self.path, json).map_err(|e| self.io_error(e))?;
        debug!("settings written to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod address_tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("dc.test.internal", "ldap://dc.test.internal:389")]
    #[case("dc.test.internal:3268", "ldap://dc.test.internal:3268")]
    #[case("ldap://10.0.0.1", "ldap://10.0.0.1:389")]
    #[case("ldaps://dc.test.internal", "ldaps://dc.test.internal:636")]
    #[case("LDAPS://dc.test.internal:3269/", "ldaps://dc.test.internal:3269")]
    #[case(" dc1 ", "ldap://dc1:389")]
    #[case("[::1]", "ldap://[::1]:389")]
    #[case("[::1]:3268", "ldap://[::1]:3268")]
    #[case("2001:db8::5", "ldap://[2001:db8::5]:389")]
    #[case("::1", "ldap://[::1]:389")]
    #[case("ldaps://[2001:db8::5]:3269", "ldaps://[2001:db8::5]:3269")]
    fn parse(#[case] input: &str, #[case] uri: &str) {
        let address: ServerAddress = input.parse().expect("valid address");
        assert_eq!(address.connection_uri(), uri);
    }

    #[rstest]
    #[case("")]
    #[case("ldap://")]
    #[case("dc:port")]
    #[case("dc:70000")]
    #[case("dc/path")]
    #[case("[::1")]
    #[case("[::1]x")]
    #[case("[::1]:port")]
    #[case("[]")]
    #[case("[dc1]")]
    fn invalid(#[case] input: &str) {
        assert_eq!(
            input.parse::<ServerAddress>(),
            Err(ConversionError::InvalidServerAddress(input.to_owned()))
        );
    }

    #[test]
    fn bare_ipv6_keeps_every_group() {
        let address: ServerAddress = "2001:db8::5".parse().expect("valid address");
        assert_eq!(address.host, "2001:db8::5");
        assert_eq!(address.port, 389);
    }

    #[test]
    fn unknown_scheme() {
        assert_eq!(
            "http://dc".parse::<ServerAddress>(),
            Err(ConversionError::UnknownProtocol("http".to_owned()))
        );
    }
}

#[cfg(test)]
mod file_tests {
    use super::*;

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonSettingsFile::new(dir.path().join(SETTINGS_FILE_NAME));
        assert!(store.load().expect("no error").is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonSettingsFile::new(dir.path().join(SETTINGS_FILE_NAME));
        let settings = StoredSettings {
            server: "dc.test.internal".into(),
            domain: "test.internal".into(),
            username: "admin".into(),
        };
        store.save(&settings).expect("writable");
        assert_eq!(store.load().expect("readable"), Some(settings));

        let raw = std::fs::read_to_string(store.path()).expect("readable");
        let json: serde_json::Value = serde_json::from_str(&raw).expect("json");
        let keys: Vec<_> = json.as_object().expect("object").keys().cloned().collect();
        assert_eq!(keys, ["domain", "server", "username"]);
    }

    #[test]
    fn malformed_content_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, "{ server: ").expect("writable");
        let err = JsonSettingsFile::new(&path).load().expect_err("malformed");
        assert!(matches!(err, LapsError::MalformedSettings { .. }));
    }

    #[test]
    fn missing_keys_default_to_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, r#"{"server": "dc1"}"#).expect("writable");
        let settings = JsonSettingsFile::new(&path)
            .load()
            .expect("readable")
            .expect("present");
        assert_eq!(settings.server, "dc1");
        assert!(settings.domain.is_empty());
    }

    #[test]
    fn unwritable_location_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonSettingsFile::new(dir.path().join("missing").join(SETTINGS_FILE_NAME));
        let err = store.save(&StoredSettings::default()).expect_err("no parent dir");
        assert!(matches!(err, LapsError::Persistence { .. }));
    }
}
