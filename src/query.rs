//! Construction of the search base and filter for a computer lookup.

use ldap3::ldap_escape;

/// Legacy LAPS cleartext password attribute
pub const ATTR_PASSWORD: &str = "ms-Mcs-AdmPwd";
/// Legacy LAPS expiration attribute, stored as directory ticks
pub const ATTR_EXPIRATION: &str = "ms-Mcs-AdmPwdExpirationTime";
pub const ATTR_ACCOUNT_NAME: &str = "sAMAccountName";
pub const ATTR_DN: &str = "distinguishedName";

/// Attributes requested for every lookup
pub const LOOKUP_ATTRIBUTES: [&str; 4] = [ATTR_PASSWORD, ATTR_EXPIRATION, ATTR_ACCOUNT_NAME, ATTR_DN];

/// Search base and filter for a single computer lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQuery {
    pub search_base: String,
    pub filter: String,
}

impl LookupQuery {
    /// Returns `None` if the computer name is blank
    pub fn new(domain: &str, computer_name: &str) -> Option<Self> {
        Some(Self {
            filter: computer_filter(computer_name)?,
            search_base: search_base(domain),
        })
    }
}

/// Turns `example.com` into `DC=example,DC=com`
pub fn search_base(domain: &str) -> String {
    if domain.is_empty() {
        return String::new();
    }
    domain
        .split('.')
        .map(|label| format!("DC={label}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Builds the filter matching a computer object which carries a LAPS password.
///
/// The name is escaped so that filter metacharacters match literally.
pub fn computer_filter(computer_name: &str) -> Option<String> {
    if computer_name.trim().is_empty() {
        return None;
    }
    Some(format!(
        "(&(objectCategory=computer)({ATTR_PASSWORD}=*)(name={}))",
        ldap_escape(computer_name)
    ))
}
