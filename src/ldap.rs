use std::{collections::HashSet, time::Duration};

use ldap3::{
    LdapConn, LdapConnSettings, LdapError, LdapResult, Mod, Scope, SearchEntry, SearchResult,
};
use tracing::{debug, warn};

use crate::{error::LapsError, session::Credentials, settings::ServerAddress};

/// Default connection timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for a single bind, search or modify
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

/// Result code and diagnostic text of a modify
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyResult {
    pub code: u32,
    pub message: String,
}

impl From<LdapResult> for ModifyResult {
    fn from(value: LdapResult) -> Self {
        Self {
            code: value.rc,
            message: value.text,
        }
    }
}

/// Opens authenticated connections to a directory
pub trait Directory {
    type Connection: DirectoryConnection;

    fn open(
        &self,
        address: &ServerAddress,
        credentials: &Credentials<'_>,
    ) -> Result<Self::Connection, LapsError>;
}

/// A bound connection, used for exactly one operation and released on drop
pub trait DirectoryConnection {
    /// Subtree search below `base`
    fn search(
        &mut self,
        base: &str,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<SearchEntry>, LapsError>;

    /// Replaces all values of `attribute` on `dn` with `value`.
    ///
    /// A nonzero result code is not an `Err`, it is handed back for the caller to judge.
    fn modify_replace(
        &mut self,
        dn: &str,
        attribute: &str,
        value: &str,
    ) -> Result<ModifyResult, LapsError>;
}

/// [`Directory`] backed by [`ldap3`](mod@ldap3) with an NTLM bind
#[derive(Debug, Clone, Default)]
pub struct LdapDirectory {
    options: ClientOptions,
}

impl LdapDirectory {
    pub fn new(options: ClientOptions) -> Self {
        Self { options }
    }
}

impl Directory for LdapDirectory {
    type Connection = AdConnection;

    fn open(
        &self,
        address: &ServerAddress,
        credentials: &Credentials<'_>,
    ) -> Result<AdConnection, LapsError> {
        let uri = address.connection_uri();
        let connection_error = |source: LdapError| LapsError::Connection {
            server: uri.clone(),
            source,
        };
        debug!("connecting to {uri}");
        let settings = LdapConnSettings::new().set_conn_timeout(self.options.connect_timeout);
        let mut ldap = LdapConn::with_settings(settings, &uri).map_err(connection_error)?;

        let identity = credentials.bind_identity();
        let bind = ldap
            .with_timeout(self.options.operation_timeout)
            .sasl_ntlm_bind(&identity, credentials.password.expose())
            .map_err(connection_error)?;
        check_bind(&identity, bind)?;
        debug!("bound to {uri} as {identity}");
        Ok(AdConnection {
            ldap,
            timeout: self.options.operation_timeout,
        })
    }
}

/// A nonzero bind result is a rejection of `identity`, not a transport failure
fn check_bind(identity: &str, result: LdapResult) -> Result<(), LapsError> {
    if result.rc != 0 {
        return Err(LapsError::Auth {
            user: identity.to_owned(),
            code: result.rc,
            message: result.text,
        });
    }
    Ok(())
}

fn search_entries(result: SearchResult) -> Result<Vec<SearchEntry>, LapsError> {
    let (rs, _res) = result.success()?;
    Ok(rs.into_iter().map(SearchEntry::construct).collect())
}

#[derive(Debug)]
pub struct AdConnection {
    ldap: LdapConn,
    timeout: Duration,
}

impl DirectoryConnection for AdConnection {
    fn search(
        &mut self,
        base: &str,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<SearchEntry>, LapsError> {
        debug!("searching {base} for {filter}");
        let result = self.ldap.with_timeout(self.timeout).search(
            base,
            Scope::Subtree,
            filter,
            attributes.to_vec(),
        )?;
        search_entries(result)
    }

    fn modify_replace(
        &mut self,
        dn: &str,
        attribute: &str,
        value: &str,
    ) -> Result<ModifyResult, LapsError> {
        debug!("replacing {attribute} on {dn} with {value}");
        let result = self.ldap.with_timeout(self.timeout).modify(
            dn,
            vec![Mod::Replace(attribute, HashSet::from([value]))],
        )?;
        Ok(result.into())
    }
}

impl Drop for AdConnection {
    fn drop(&mut self) {
        if let Err(e) = self.ldap.unbind() {
            warn!("unbind failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::session::Secret;

    fn ldap_result(rc: u32, text: &str) -> LdapResult {
        LdapResult {
            rc,
            matched: String::new(),
            text: text.to_owned(),
            refs: vec![],
            ctrls: vec![],
        }
    }

    #[test]
    fn modify_result_carries_code_and_text() {
        let result = ModifyResult::from(ldap_result(50, "insufficient access"));
        assert_eq!(
            result,
            ModifyResult {
                code: 50,
                message: "insufficient access".into()
            }
        );
    }

    #[test]
    fn accepted_bind() {
        assert!(check_bind(r"TEST\admin", ldap_result(0, "")).is_ok());
    }

    #[rstest]
    #[case(49, "80090308: LdapErr: DSID-0C09042A, data 52e")]
    #[case(53, "unwilling to perform")]
    fn rejected_bind_is_an_auth_error(#[case] rc: u32, #[case] text: &str) {
        match check_bind(r"TEST\admin", ldap_result(rc, text)) {
            Err(LapsError::Auth {
                user,
                code,
                message,
            }) => {
                assert_eq!(user, r"TEST\admin");
                assert_eq!(code, rc);
                assert_eq!(message, text);
            }
            other => panic!("expected an auth error, got {other:?}"),
        }
    }

    #[test]
    fn empty_search_result() {
        let entries =
            search_entries(SearchResult(vec![], ldap_result(0, ""))).expect("search succeeded");
        assert!(entries.is_empty());
    }

    #[test]
    fn failed_search_is_an_ldap_error() {
        let err = search_entries(SearchResult(vec![], ldap_result(32, "no such object")))
            .expect_err("search failed");
        match err {
            LapsError::Ldap {
                source: LdapError::LdapResult { result },
            } => assert_eq!(result.rc, 32),
            other => panic!("expected an ldap result error, got {other:?}"),
        }
    }

    #[test]
    fn unreachable_server_is_a_connection_error() {
        let directory = LdapDirectory::new(ClientOptions {
            connect_timeout: Duration::from_secs(2),
            operation_timeout: Duration::from_secs(2),
        });
        let address: ServerAddress = "127.0.0.1:1".parse().expect("valid address");
        let password = Secret::new("pw");
        let credentials = Credentials {
            server: "127.0.0.1:1",
            domain: "test.internal",
            username: "admin",
            password: &password,
        };
        match directory.open(&address, &credentials) {
            Err(LapsError::Connection { server, .. }) => assert_eq!(server, "ldap://127.0.0.1:1"),
            Err(other) => panic!("expected a connection error, got {other}"),
            Ok(_) => panic!("nothing listens on port 1"),
        }
    }
}
