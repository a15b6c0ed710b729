use std::path::PathBuf;

use ldap3::LdapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LapsError {
    /// The server could not be reached or the connection broke down
    #[error("could not talk to {server}: {source}")]
    Connection {
        server: String,
        #[source]
        source: LdapError,
    },
    /// The server rejected the bind
    #[error("bind as {user} rejected (code {code}): {message}")]
    Auth {
        user: String,
        code: u32,
        message: String,
    },
    /// The server answered a modify with a nonzero result code
    #[error("changing {dn} failed (code {code}): {message}")]
    Modify {
        dn: String,
        code: u32,
        message: String,
    },
    /// Encapsulated LdapError
    #[error("A ldap error occured: {source}")]
    Ldap {
        #[from]
        source: LdapError,
    },
    /// Conversion Error
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// The settings file could not be read or written
    #[error("could not access {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not a valid settings file: {source}", path.display())]
    MalformedSettings {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// An operation ran without server, domain, username and password all set
    #[error("session is missing server, domain, username or password")]
    IncompleteSession,
    /// A required attribute was missing from a search entry
    #[error("{attribute} missing on {dn}")]
    MissingAttribute { dn: String, attribute: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversionError {
    /// Value lies before the unix epoch or is not a number at all
    #[error("{0:?} is not a usable directory timestamp")]
    InvalidTimestamp(String),
    /// The date cannot be expressed as directory ticks
    #[error("date is outside of the range representable in directory ticks")]
    OutOfRange,
    #[error("unknown LdapProtocol: {0}")]
    UnknownProtocol(String),
    #[error("invalid server address: {0:?}")]
    InvalidServerAddress(String),
}
