//! Credentials and connection details for the running session.
//!
//! A [`Session`] starts out empty, is hydrated from the [`SettingsStore`] and
//! gets completed through a [`Prompter`] the first time a directory operation
//! needs it. Only server, domain and username are ever written back; the
//! password lives in memory for the lifetime of the session.

use std::fmt;

use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    error::LapsError,
    settings::{SettingsStore, StoredSettings},
};

/// A string which does not show up in `Debug` output or logs and is
/// wiped from memory when dropped
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The session fields which may have to be asked for, in prompting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialField {
    Server,
    Domain,
    Username,
    Password,
}

impl CredentialField {
    pub const ALL: [CredentialField; 4] = [
        CredentialField::Server,
        CredentialField::Domain,
        CredentialField::Username,
        CredentialField::Password,
    ];

    pub fn is_secret(self) -> bool {
        self == CredentialField::Password
    }
}

/// Everything a front end needs to ask for one field
#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub field: CredentialField,
    pub title: String,
    pub message: String,
    /// Value to pre-fill, if any
    pub default: Option<String>,
}

impl PromptRequest {
    fn for_field(field: CredentialField, session: &Session) -> Self {
        let server = session.server.as_deref().unwrap_or_default();
        let (title, message, default) = match field {
            CredentialField::Server => (
                "Server Address".to_owned(),
                "Please enter your LDAP server IP address or DNS name.".to_owned(),
                None,
            ),
            CredentialField::Domain => (
                "Domain".to_owned(),
                "Please enter your Domain name (e.g. example.com).".to_owned(),
                None,
            ),
            CredentialField::Username => (
                "Username".to_owned(),
                format!("Please enter the username which should be used to connect to »{server}«."),
                current_os_user(),
            ),
            CredentialField::Password => (
                format!(
                    "Password for »{}«",
                    session.username.as_deref().unwrap_or_default()
                ),
                format!("Please enter the password which should be used to connect to »{server}«."),
                None,
            ),
        };
        Self {
            field,
            title,
            message,
            default,
        }
    }
}

fn current_os_user() -> Option<String> {
    std::env::var("USERNAME")
        .or_else(|_| std::env::var("USER"))
        .ok()
        .filter(|user| !user.is_empty())
}

/// Front end used to fill in missing session fields.
///
/// Returning `None` (or an empty string) declines the prompt.
pub trait Prompter {
    fn prompt(&mut self, request: &PromptRequest) -> Option<String>;

    /// Receives errors which do not abort the current operation
    fn report(&mut self, _error: &LapsError) {}
}

impl<F> Prompter for F
where
    F: FnMut(&PromptRequest) -> Option<String>,
{
    fn prompt(&mut self, request: &PromptRequest) -> Option<String> {
        self(request)
    }
}

/// Fully populated credentials, borrowed from a ready [`Session`]
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    pub server: &'a str,
    pub domain: &'a str,
    pub username: &'a str,
    pub password: &'a Secret,
}

impl Credentials<'_> {
    /// `DOMAIN\user` as used for the bind
    pub fn bind_identity(&self) -> String {
        format!("{}\\{}", self.domain, self.username)
    }

    /// `server: user@domain`, used in status lines
    pub fn label(&self) -> String {
        format!("{}: {}@{}", self.server, self.username, self.domain)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    server: Option<String>,
    domain: Option<String>,
    username: Option<String>,
    password: Option<Secret>,
    /// Whether the current server, domain and username were written to the store
    saved: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session which already knows all of its fields
    pub fn with_credentials(
        server: impl Into<String>,
        domain: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let mut session = Self::new();
        session.set(CredentialField::Server, server.into());
        session.set(CredentialField::Domain, domain.into());
        session.set(CredentialField::Username, username.into());
        session.set(CredentialField::Password, password.into());
        session
    }

    /// Sets a field. Empty values leave the field unset.
    pub fn set(&mut self, field: CredentialField, value: String) {
        let value = Some(value).filter(|v| !v.is_empty());
        if !field.is_secret() {
            self.saved = false;
        }
        match field {
            CredentialField::Server => self.server = value,
            CredentialField::Domain => self.domain = value,
            CredentialField::Username => self.username = value,
            CredentialField::Password => self.password = value.map(Secret::from),
        }
    }

    pub fn is_known(&self, field: CredentialField) -> bool {
        match field {
            CredentialField::Server => self.server.is_some(),
            CredentialField::Domain => self.domain.is_some(),
            CredentialField::Username => self.username.is_some(),
            CredentialField::Password => self.password.is_some(),
        }
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// `Some` once every field is populated
    pub fn credentials(&self) -> Option<Credentials<'_>> {
        Some(Credentials {
            server: self.server.as_deref()?,
            domain: self.domain.as_deref()?,
            username: self.username.as_deref()?,
            password: self.password.as_ref()?,
        })
    }

    /// Prompts for every missing field, in the order of [`CredentialField::ALL`].
    ///
    /// Stops at the first declined prompt and returns `false`; fields filled in
    /// before that keep their value. The first success after a change of the
    /// non-secret fields saves them to `store`, a failure to do so is only reported.
    pub fn ensure_ready<P, S>(&mut self, prompter: &mut P, store: &S) -> bool
    where
        P: Prompter + ?Sized,
        S: SettingsStore + ?Sized,
    {
        if self.credentials().is_some() && self.saved {
            return true;
        }
        for field in CredentialField::ALL {
            if self.is_known(field) {
                continue;
            }
            let request = PromptRequest::for_field(field, self);
            match prompter.prompt(&request).filter(|v| !v.is_empty()) {
                Some(value) => self.set(field, value),
                None => {
                    debug!(?field, "prompt declined");
                    return false;
                }
            }
        }
        match self.save(store) {
            Ok(()) => self.saved = true,
            Err(e) => {
                warn!("could not save settings: {e}");
                prompter.report(&e);
            }
        }
        true
    }

    /// Forgets username and password after a failed lookup.
    ///
    /// Server and domain are kept, the next operation asks for credentials again.
    pub fn invalidate(&mut self) {
        if self.username.is_some() || self.password.is_some() {
            info!("discarding credentials for {:?}", self.username);
        }
        self.username = None;
        self.password = None;
        self.saved = false;
    }

    /// Fills in the stored non-secret fields. Nothing stored is not an error.
    pub fn load<S: SettingsStore + ?Sized>(&mut self, store: &S) -> Result<(), LapsError> {
        if let Some(stored) = store.load()? {
            self.set(CredentialField::Server, stored.server);
            self.set(CredentialField::Domain, stored.domain);
            self.set(CredentialField::Username, stored.username);
        }
        Ok(())
    }

    pub fn save<S: SettingsStore + ?Sized>(&self, store: &S) -> Result<(), LapsError> {
        store.save(&StoredSettings {
            server: self.server.clone().unwrap_or_default(),
            domain: self.domain.clone().unwrap_or_default(),
            username: self.username.clone().unwrap_or_default(),
        })
    }
}
