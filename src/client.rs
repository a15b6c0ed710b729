//! Lookup of LAPS passwords and forced expiration.
//!
//! Every operation opens its own connection from the current [`Session`]
//! credentials and drops it before returning, so a credential change between
//! two calls always takes effect.

use tracing::{debug, info, warn};

use crate::{
    error::LapsError,
    helpers::ToFiletime,
    ldap::{Directory, DirectoryConnection, LdapDirectory},
    query::{computer_filter, search_base, LookupQuery, ATTR_EXPIRATION, LOOKUP_ATTRIBUTES},
    session::{Prompter, Session},
    settings::{ServerAddress, SettingsStore},
    types::{LookupOutcome, PasswordRecord, UpdateOutcome},
};

pub struct DirectoryClient<S, D = LdapDirectory> {
    session: Session,
    store: S,
    directory: D,
    record: Option<PasswordRecord>,
}

impl<S: SettingsStore> DirectoryClient<S> {
    pub fn new(store: S) -> Self {
        Self::with_directory(store, LdapDirectory::default())
    }
}

impl<S: SettingsStore, D: Directory> DirectoryClient<S, D> {
    pub fn with_directory(store: S, directory: D) -> Self {
        Self {
            session: Session::new(),
            store,
            directory,
            record: None,
        }
    }

    /// Replaces the session, e.g. with one hydrated by [`Session::load()`]
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    /// Hydrates the session from the settings store
    pub fn load_settings(&mut self) -> Result<(), LapsError> {
        self.session.load(&self.store)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Record of the last successful lookup
    pub fn record(&self) -> Option<&PasswordRecord> {
        self.record.as_ref()
    }

    /// Looks up the LAPS password of `computer_name`.
    ///
    /// Any held record is discarded first. If the directory operation fails the
    /// username and password of the session are invalidated.
    pub fn lookup<P>(
        &mut self,
        computer_name: &str,
        prompter: &mut P,
    ) -> Result<LookupOutcome, LapsError>
    where
        P: Prompter + ?Sized,
    {
        let Some(filter) = computer_filter(computer_name) else {
            return Ok(LookupOutcome::EmptyInput);
        };
        if !self.session.ensure_ready(prompter, &self.store) {
            return Ok(LookupOutcome::Declined);
        }
        self.record = None;

        match self.search(filter) {
            Ok(Some(record)) => {
                let status = format!("Found: {} ({})", record.distinguished_name, self.label());
                info!("{status}");
                self.record = Some(record.clone());
                Ok(LookupOutcome::Found { record, status })
            }
            Ok(None) => {
                let status = format!("No Result For: {computer_name} ({})", self.label());
                info!("{status}");
                Ok(LookupOutcome::NotFound { status })
            }
            Err(e) => {
                warn!("lookup of {computer_name} failed: {e}");
                self.session.invalidate();
                Err(e)
            }
        }
    }

    fn search(&self, filter: String) -> Result<Option<PasswordRecord>, LapsError> {
        let credentials = self
            .session
            .credentials()
            .ok_or(LapsError::IncompleteSession)?;
        let address: ServerAddress = credentials.server.parse()?;
        let query = LookupQuery {
            search_base: search_base(credentials.domain),
            filter,
        };
        let mut connection = self.directory.open(&address, &credentials)?;
        let entries = connection.search(&query.search_base, &query.filter, &LOOKUP_ATTRIBUTES)?;
        if entries.len() > 1 {
            debug!("{} entries matched, using the first", entries.len());
        }
        match entries.into_iter().next() {
            Some(entry) => Ok(Some(PasswordRecord::try_from(entry)?)),
            None => Ok(None),
        }
    }

    /// Sets the expiration of `target_dn` to `new_expiration`, so the managed
    /// client rotates its password at that time.
    ///
    /// A blank `target_dn` is a no-op. A nonzero result code is returned as
    /// [`LapsError::Modify`] and the held record stays as it is.
    pub fn update_expiration<P, T>(
        &mut self,
        target_dn: &str,
        new_expiration: &T,
        prompter: &mut P,
    ) -> Result<UpdateOutcome, LapsError>
    where
        P: Prompter + ?Sized,
        T: ToFiletime + ?Sized,
    {
        if target_dn.trim().is_empty() {
            return Ok(UpdateOutcome::NoTarget);
        }
        if !self.session.ensure_ready(prompter, &self.store) {
            return Ok(UpdateOutcome::Declined);
        }
        let credentials = self
            .session
            .credentials()
            .ok_or(LapsError::IncompleteSession)?;
        let ticks = new_expiration.to_filetime()?;
        debug!("new expiration time: {ticks}");
        let address: ServerAddress = credentials.server.parse()?;

        let mut connection = self.directory.open(&address, &credentials)?;
        let result = connection.modify_replace(target_dn, ATTR_EXPIRATION, &ticks.to_string())?;
        drop(connection);

        if result.code != 0 {
            return Err(LapsError::Modify {
                dn: target_dn.to_owned(),
                code: result.code,
                message: result.message,
            });
        }
        let status = format!(
            "Expiration Date Changed Successfully: {target_dn} ({})",
            credentials.label()
        );
        info!("{status}");
        Ok(UpdateOutcome::Updated {
            expiration_raw: ticks,
            status,
        })
    }

    /// [`update_expiration()`](Self::update_expiration) for the record of the last lookup
    pub fn update_current_expiration<P, T>(
        &mut self,
        new_expiration: &T,
        prompter: &mut P,
    ) -> Result<UpdateOutcome, LapsError>
    where
        P: Prompter + ?Sized,
        T: ToFiletime + ?Sized,
    {
        let target_dn = self
            .record
            .as_ref()
            .map(|record| record.distinguished_name.clone())
            .unwrap_or_default();
        self.update_expiration(&target_dn, new_expiration, prompter)
    }

    fn label(&self) -> String {
        format!(
            "{}: {}@{}",
            self.session.server().unwrap_or_default(),
            self.session.username().unwrap_or_default(),
            self.session.domain().unwrap_or_default()
        )
    }
}
