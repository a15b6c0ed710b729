use std::fmt;

use chrono::{DateTime, Utc};
use ldap3::SearchEntry;
use tracing::warn;

use crate::{
    error::LapsError,
    helpers::parse_filetime,
    query::{ATTR_ACCOUNT_NAME, ATTR_DN, ATTR_EXPIRATION, ATTR_PASSWORD},
    session::Secret,
};

/// Expiration of a LAPS password as found in the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expiration {
    At { raw: u64, time: DateTime<Utc> },
    /// The directory held something which is not a usable timestamp
    Unparsed(String),
    Missing,
}

impl Expiration {
    pub fn from_attribute(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Expiration::Missing;
        };
        match parse_filetime(raw) {
            Ok((raw, time)) => Expiration::At { raw, time },
            Err(e) => {
                warn!("keeping expiration as text: {e}");
                Expiration::Unparsed(raw.to_owned())
            }
        }
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        match self {
            Expiration::At { time, .. } => Some(*time),
            _ => None,
        }
    }
}

impl fmt::Display for Expiration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expiration::At { time, .. } => write!(f, "{}", time.format("%Y-%m-%d %H:%M:%S")),
            Expiration::Unparsed(raw) => f.write_str(raw),
            Expiration::Missing => Ok(()),
        }
    }
}

/// LAPS Information of a single computer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordRecord {
    pub password: Secret,
    pub expiration: Expiration,
    pub distinguished_name: String,
    pub account_name: Option<String>,
}

impl TryFrom<SearchEntry> for PasswordRecord {
    type Error = LapsError;

    fn try_from(entry: SearchEntry) -> Result<Self, Self::Error> {
        let password = first_value(&entry, ATTR_PASSWORD).ok_or_else(|| {
            LapsError::MissingAttribute {
                dn: entry.dn.clone(),
                attribute: ATTR_PASSWORD.to_owned(),
            }
        })?;
        let distinguished_name = first_value(&entry, ATTR_DN)
            .map(str::to_owned)
            .unwrap_or_else(|| entry.dn.clone());
        Ok(Self {
            password: Secret::new(password),
            expiration: Expiration::from_attribute(first_value(&entry, ATTR_EXPIRATION)),
            account_name: first_value(&entry, ATTR_ACCOUNT_NAME).map(str::to_owned),
            distinguished_name,
        })
    }
}

/// Attribute names come back in whatever case the schema uses
fn first_value<'a>(entry: &'a SearchEntry, attribute: &str) -> Option<&'a str> {
    entry
        .attrs
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}

/// Result of [`DirectoryClient::lookup()`](crate::DirectoryClient::lookup)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// The computer name was blank, nothing happened
    EmptyInput,
    /// A credential prompt was declined, nothing was sent
    Declined,
    NotFound { status: String },
    Found { record: PasswordRecord, status: String },
}

/// Result of [`DirectoryClient::update_expiration()`](crate::DirectoryClient::update_expiration)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No computer was looked up before
    NoTarget,
    Declined,
    Updated { expiration_raw: u64, status: String },
}
