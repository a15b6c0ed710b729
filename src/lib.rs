//! # LAPS password lookup and expiration
//!
//! This crate reads the legacy [LAPS](https://learn.microsoft.com/en-us/windows-server/identity/laps/laps-overview)
//! password (`ms-Mcs-AdmPwd`) of a computer from Active Directory and can move its
//! expiration time (`ms-Mcs-AdmPwdExpirationTime`) so the managed client rotates it early.
//!
//! Central for that is [`DirectoryClient`] which owns the [`Session`] (server, domain and
//! credentials) and opens a fresh NTLM-bound connection for each operation.
//! Missing session fields are asked for through a [`Prompter`].
//!
//! ## Example
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use laps_client::{
//!     DirectoryClient, JsonSettingsFile, LookupOutcome, PromptRequest, Session,
//! };
//!
//! let mut client = DirectoryClient::new(JsonSettingsFile::new("laps-client.json"))
//!     .with_session(Session::with_credentials("dc.test.internal", "test.internal", "admin", "secret"));
//! let mut prompter = |_: &PromptRequest| -> Option<String> { None };
//!
//! if let LookupOutcome::Found { record, .. } = client
//!     .lookup("computername", &mut prompter)
//!     .expect("working domain controller")
//! {
//!     println!("{} (expires {})", record.password.expose(), record.expiration);
//!     let rotation = NaiveDate::from_ymd_opt(2030, 1, 1).expect("valid date");
//!     client
//!         .update_current_expiration(&rotation, &mut prompter)
//!         .expect("write access to the computer object");
//! }
//! ```
//!
//! ## Quirks
//!
//! If more than one computer object matches, the first entry the server returns is used.
//!
//! Expiration values which are not a timestamp after 1970 are kept as
//! [`Expiration::Unparsed`] instead of failing the lookup.

mod client;
mod error;
mod helpers;
mod ldap;
mod query;
mod session;
mod settings;
mod types;

pub use client::DirectoryClient;
pub use error::*;
pub use helpers::{
    filetime_to_datetime, parse_filetime, ToFiletime, EPOCH_AS_FILETIME, TICKS_PER_SECOND,
};
pub use ldap::{
    AdConnection, ClientOptions, Directory, DirectoryConnection, LdapDirectory, ModifyResult,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_OPERATION_TIMEOUT,
};
pub use query::{computer_filter, search_base, LookupQuery};
pub use session::{CredentialField, Credentials, PromptRequest, Prompter, Secret, Session};
pub use settings::{
    JsonSettingsFile, LdapPort, LdapProtocol, ServerAddress, SettingsStore, StoredSettings,
    SETTINGS_FILE_NAME,
};
pub use types::*;
