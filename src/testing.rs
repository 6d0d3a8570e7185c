//! In-memory fakes for procedure tests

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::domain::{AccountControl, FsmoRole, NamingContexts, NewUser};
use crate::error::{AppError, AppResult};
use crate::infrastructure::{
    Directory, Prober, Prompter, RoleTransferTool, SearchResult, SearchScope, ToolOutput,
};

/// Directory backed by a map of objects plus canned search responses
pub struct FakeDirectory {
    pub contexts: NamingContexts,
    /// Keyed by lower-cased DN
    objects: BTreeMap<String, SearchResult>,
    /// (base, filter fragment, rows) for one-level and subtree searches
    responses: Vec<(String, String, Vec<SearchResult>)>,
    failing: HashSet<String>,
    pub modified: Vec<(String, AccountControl)>,
    pub deleted: Vec<(String, bool)>,
    pub created: Vec<String>,
    pub searches: Vec<(String, String)>,
}

impl FakeDirectory {
    pub fn with_domain(domain_dn: &str) -> Self {
        Self {
            contexts: NamingContexts::from_default_dn(domain_dn),
            objects: BTreeMap::new(),
            responses: Vec::new(),
            failing: HashSet::new(),
            modified: Vec::new(),
            deleted: Vec::new(),
            created: Vec::new(),
            searches: Vec::new(),
        }
    }

    pub fn add_object(&mut self, object: SearchResult) {
        let key = object.distinguished_name.to_lowercase();
        match self.objects.get_mut(&key) {
            Some(existing) => existing.attributes.extend(object.attributes),
            None => {
                self.objects.insert(key, object);
            }
        }
    }

    pub fn add_role_owner(&mut self, role: FsmoRole, ntds_dn: &str) {
        let role_dn = role.role_object_dn(&self.contexts);
        self.add_object(SearchResult::new(role_dn).with("fSMORoleOwner", ntds_dn));
    }

    /// Answer searches under `base` whose filter contains `filter_fragment`
    pub fn add_search_response(&mut self, base: &str, filter_fragment: &str, rows: Vec<SearchResult>) {
        self.responses
            .push((base.to_lowercase(), filter_fragment.to_string(), rows));
    }

    /// Make every write to `dn` fail
    pub fn fail_on(&mut self, dn: &str) {
        self.failing.insert(dn.to_lowercase());
    }

    pub fn contains(&self, dn: &str) -> bool {
        self.objects.contains_key(&dn.to_lowercase())
    }

    pub fn account_control(&self, dn: &str) -> Option<AccountControl> {
        self.objects
            .get(&dn.to_lowercase())
            .and_then(|o| o.get("userAccountControl"))
            .and_then(|v| AccountControl::parse(v))
    }

    fn check_writable(&self, dn: &str) -> AppResult<()> {
        if self.failing.contains(&dn.to_lowercase()) {
            return Err(AppError::OperationFailed(format!("insufficient rights on {}", dn)));
        }
        Ok(())
    }
}

impl Directory for FakeDirectory {
    fn naming_contexts(&mut self) -> AppResult<NamingContexts> {
        Ok(self.contexts.clone())
    }

    fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        _attributes: &[&str],
        scope: SearchScope,
    ) -> AppResult<Vec<SearchResult>> {
        self.searches.push((base_dn.to_string(), filter.to_string()));
        let base = base_dn.to_lowercase();

        if scope == SearchScope::Base {
            return self
                .objects
                .get(&base)
                .cloned()
                .map(|o| vec![o])
                .ok_or_else(|| AppError::ObjectNotFound(base_dn.to_string()));
        }

        Ok(self
            .responses
            .iter()
            .filter(|(b, fragment, _)| *b == base && filter.contains(fragment.as_str()))
            .flat_map(|(_, _, rows)| rows.iter().cloned())
            // Deleted objects drop out of later searches
            .filter(|row| !self.deleted.iter().any(|(d, _)| d.eq_ignore_ascii_case(&row.distinguished_name)))
            .collect())
    }

    fn set_account_control(&mut self, dn: &str, flags: AccountControl) -> AppResult<()> {
        self.check_writable(dn)?;
        let object = self
            .objects
            .get_mut(&dn.to_lowercase())
            .ok_or_else(|| AppError::ObjectNotFound(dn.to_string()))?;
        object.insert("userAccountControl", vec![flags.0.to_string()]);
        self.modified.push((dn.to_string(), flags));
        Ok(())
    }

    fn create_user(&mut self, user: &NewUser) -> AppResult<String> {
        let dn = user.distinguished_name();
        self.check_writable(&dn)?;
        if self.contains(&dn) {
            return Err(AppError::OperationFailed(format!("{} already exists", dn)));
        }
        self.add_object(
            SearchResult::new(dn.clone())
                .with("sAMAccountName", user.sam_account_name.clone())
                .with("userAccountControl", AccountControl::enabled_user().0.to_string()),
        );
        self.created.push(dn.clone());
        Ok(dn)
    }

    fn delete_object(&mut self, dn: &str, recursive: bool) -> AppResult<()> {
        self.check_writable(dn)?;
        let key = dn.to_lowercase();
        let suffix = format!(",{}", key);
        if self.objects.remove(&key).is_none() && !self.responses.iter().any(|(_, _, rows)| {
            rows.iter().any(|r| r.distinguished_name.eq_ignore_ascii_case(dn))
        }) {
            return Err(AppError::ObjectNotFound(dn.to_string()));
        }
        if recursive {
            self.objects.retain(|k, _| !k.ends_with(&suffix));
        }
        self.deleted.push((dn.to_string(), recursive));
        Ok(())
    }
}

/// Prober with a fixed set of dead hosts
#[derive(Default)]
pub struct FakeProber {
    unreachable: HashSet<String>,
    pub probed: RefCell<Vec<String>>,
}

impl FakeProber {
    pub fn with_unreachable(hosts: &[&str]) -> Self {
        Self {
            unreachable: hosts.iter().map(|h| h.to_lowercase()).collect(),
            probed: RefCell::new(Vec::new()),
        }
    }
}

impl Prober for FakeProber {
    fn is_reachable(&self, host: &str) -> bool {
        self.probed.borrow_mut().push(host.to_string());
        !self.unreachable.contains(&host.to_lowercase())
    }
}

/// Role transfer tool that records what it was asked to seize
#[derive(Default)]
pub struct FakeTool {
    failing: HashSet<FsmoRole>,
    pub seized: RefCell<Vec<(String, FsmoRole)>>,
}

impl FakeTool {
    pub fn failing_on(roles: &[FsmoRole]) -> Self {
        Self {
            failing: roles.iter().copied().collect(),
            seized: RefCell::new(Vec::new()),
        }
    }

    pub fn seized_roles(&self) -> Vec<FsmoRole> {
        self.seized.borrow().iter().map(|(_, r)| *r).collect()
    }
}

impl RoleTransferTool for FakeTool {
    fn seize(&self, target: &str, role: FsmoRole) -> AppResult<ToolOutput> {
        self.seized.borrow_mut().push((target.to_string(), role));
        let stdout = if self.failing.contains(&role) {
            "Transfer failed, proceeding with seizure ...\r\nldap_modify_sW error 0x32(50 (Insufficient Rights).\r\n".to_string()
        } else {
            format!(
                "Transfer failed, proceeding with seizure ...\r\nServer \"{}\" knows about 5 roles\r\n",
                target
            )
        };
        Ok(ToolOutput {
            script_path: None,
            exit_code: Some(0),
            stdout,
            stderr: String::new(),
        })
    }
}

/// Answers prompts from a queue; panics if a question was not scripted
#[derive(Default)]
pub struct ScriptedPrompter {
    confirms: VecDeque<bool>,
    texts: VecDeque<String>,
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn confirming(answers: &[bool]) -> Self {
        Self {
            confirms: answers.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn typing(text: &str) -> Self {
        Self {
            texts: VecDeque::from([text.to_string()]),
            ..Default::default()
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, prompt: &str, _default: bool) -> AppResult<bool> {
        self.asked.push(prompt.to_string());
        Ok(self
            .confirms
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected confirmation: {}", prompt)))
    }

    fn read_text(&mut self, prompt: &str) -> AppResult<String> {
        self.asked.push(prompt.to_string());
        Ok(self
            .texts
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected text prompt: {}", prompt)))
    }
}

/// Fails the test if anything is asked
pub struct PanicPrompter;

impl Prompter for PanicPrompter {
    fn confirm(&mut self, prompt: &str, _default: bool) -> AppResult<bool> {
        panic!("forced run asked for confirmation: {}", prompt)
    }

    fn read_text(&mut self, prompt: &str) -> AppResult<String> {
        panic!("forced run asked for input: {}", prompt)
    }
}
