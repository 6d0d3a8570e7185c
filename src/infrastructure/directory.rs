//! Directory service client abstraction
//!
//! Procedures talk to Active Directory only through [`Directory`], so the
//! same code runs over LDAP, over ADSI on Windows, or against an in-memory
//! fake in tests.

use std::collections::HashMap;

use crate::domain::{AccountControl, NamingContexts, NewUser};
use crate::error::AppResult;

/// LDAP search scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Base,
    OneLevel,
    Subtree,
}

/// Search result row containing attribute values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub distinguished_name: String,
    /// Attribute names are stored lower-cased
    pub attributes: HashMap<String, Vec<String>>,
}

impl SearchResult {
    pub fn new(distinguished_name: impl Into<String>) -> Self {
        Self {
            distinguished_name: distinguished_name.into(),
            attributes: HashMap::new(),
        }
    }

    /// Builder used by tests and fakes
    pub fn with(mut self, attr: &str, value: impl Into<String>) -> Self {
        self.insert(attr, vec![value.into()]);
        self
    }

    pub fn insert(&mut self, attr: &str, values: Vec<String>) {
        self.attributes.insert(attr.to_lowercase(), values);
    }

    pub fn get(&self, attr: &str) -> Option<&String> {
        self.attributes.get(&attr.to_lowercase()).and_then(|v| v.first())
    }
}

/// Operations the maintenance procedures need from a directory service
pub trait Directory {
    /// Partition DNs advertised by RootDSE
    fn naming_contexts(&mut self) -> AppResult<NamingContexts>;

    fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&str],
        scope: SearchScope,
    ) -> AppResult<Vec<SearchResult>>;

    /// Replace `userAccountControl` on an object
    fn set_account_control(&mut self, dn: &str, flags: AccountControl) -> AppResult<()>;

    /// Create and enable a user account, returning its DN
    fn create_user(&mut self, user: &NewUser) -> AppResult<String>;

    /// Delete an object; `recursive` removes its children with it
    fn delete_object(&mut self, dn: &str, recursive: bool) -> AppResult<()>;
}

/// Read a single object, returning None when it does not exist
pub fn read_object(
    dir: &mut dyn Directory,
    dn: &str,
    attributes: &[&str],
) -> AppResult<Option<SearchResult>> {
    match dir.search(dn, "(objectClass=*)", attributes, SearchScope::Base) {
        Ok(results) => Ok(results.into_iter().next()),
        Err(crate::error::AppError::ObjectNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
