//! Active Directory access using Windows ADSI
//!
//! Binds with the current Windows user's credentials via ADSI (Active
//! Directory Service Interfaces). Only compiled on Windows.

use std::ffi::c_void;

use windows::{
    core::{Interface, BSTR, PCWSTR, VARIANT},
    Win32::Networking::ActiveDirectory::*,
    Win32::System::Com::*,
};

use super::directory::{Directory, SearchResult, SearchScope};
use crate::domain::{AccountControl, NamingContexts, NewUser};
use crate::error::{AppError, AppResult};

/// HRESULT for ERROR_DS_NO_SUCH_OBJECT
const HRESULT_NO_SUCH_OBJECT: u32 = 0x8007_2030;
/// S_ADS_NOMORE_ROWS
const S_ADS_NOMORE_ROWS: u32 = 0x0000_5012;
/// ADSI page size for subtree searches
const PAGE_SIZE: u32 = 1000;

/// ADSI-backed directory handle
pub struct AdsiDirectory {
    contexts: Option<NamingContexts>,
    com_initialized: bool,
}

impl AdsiDirectory {
    /// Initialize COM and verify RootDSE is reachable with current credentials
    pub fn connect() -> AppResult<Self> {
        // SAFETY: COM is initialized once for this thread and released in Drop
        let com_initialized = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED).is_ok() };

        let mut dir = Self {
            contexts: None,
            com_initialized,
        };
        dir.naming_contexts().map_err(|e| {
            tracing::error!(error = %e, "Failed to read RootDSE through ADSI");
            AppError::AuthenticationFailed(format!("Failed to connect to AD: {}", e))
        })?;
        tracing::info!("ADSI connection established");
        Ok(dir)
    }

    fn ldap_path(dn: &str) -> String {
        format!("LDAP://{}", dn)
    }

    /// Open an ADSI object and query the requested interface
    unsafe fn open_object<T: Interface>(dn: &str) -> AppResult<T> {
        let path_bstr = BSTR::from(Self::ldap_path(dn).as_str());
        let mut obj: Option<T> = None;
        ADsOpenObject(
            PCWSTR(path_bstr.as_ptr()),
            PCWSTR::null(),
            PCWSTR::null(),
            ADS_SECURE_AUTHENTICATION,
            &T::IID,
            &mut obj as *mut _ as *mut *mut c_void,
        )
        .map_err(|e| {
            let hresult = e.code().0 as u32;
            if hresult == HRESULT_NO_SUCH_OBJECT {
                AppError::ObjectNotFound(dn.to_string())
            } else {
                AppError::LdapError(format!("Failed to open {}: {} (HRESULT: 0x{:08X})", dn, e, hresult))
            }
        })?;

        obj.ok_or_else(|| AppError::LdapError(format!("Interface not available for {}", dn)))
    }

    unsafe fn get_string(ads: &IADs, property: &str) -> Option<String> {
        let value = ads.Get(&BSTR::from(property)).ok()?;
        BSTR::try_from(&value).ok().map(|b| b.to_string())
    }

    fn to_ads_scope(scope: SearchScope) -> i32 {
        match scope {
            SearchScope::Base => ADS_SCOPE_BASE.0,
            SearchScope::OneLevel => ADS_SCOPE_ONELEVEL.0,
            SearchScope::Subtree => ADS_SCOPE_SUBTREE.0,
        }
    }
}

impl Directory for AdsiDirectory {
    fn naming_contexts(&mut self) -> AppResult<NamingContexts> {
        if let Some(contexts) = &self.contexts {
            return Ok(contexts.clone());
        }

        // SAFETY: RootDSE is opened with the current credentials; VARIANTs are
        // owned by the windows crate wrappers and released on drop
        let contexts = unsafe {
            let root_dse: IADs = Self::open_object("RootDSE")?;
            let default = Self::get_string(&root_dse, "defaultNamingContext").ok_or_else(|| {
                AppError::LdapError("defaultNamingContext missing from RootDSE".to_string())
            })?;

            let mut contexts = NamingContexts::from_default_dn(&default);
            if let Some(config) = Self::get_string(&root_dse, "configurationNamingContext") {
                contexts.configuration = config;
            }
            if let Some(schema) = Self::get_string(&root_dse, "schemaNamingContext") {
                contexts.schema = schema;
            }
            if let Some(root) = Self::get_string(&root_dse, "rootDomainNamingContext") {
                contexts.root_domain = root;
            }
            contexts.dns_host_name = Self::get_string(&root_dse, "dnsHostName");
            contexts
        };

        self.contexts = Some(contexts.clone());
        Ok(contexts)
    }

    fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&str],
        scope: SearchScope,
    ) -> AppResult<Vec<SearchResult>> {
        tracing::info!(
            base_dn = base_dn,
            filter = filter,
            scope = ?scope,
            "ADSI SEARCH: Starting query"
        );

        // distinguishedName is always fetched so every row carries its DN
        let mut requested: Vec<&str> = attributes.to_vec();
        if !requested.iter().any(|a| a.eq_ignore_ascii_case("distinguishedName")) {
            requested.push("distinguishedName");
        }

        // SAFETY: IDirectorySearch follows the ADSI search contract: the
        // handle from ExecuteSearch is closed with CloseSearchHandle and every
        // column from GetColumn is released with FreeColumn
        unsafe {
            let search: IDirectorySearch = Self::open_object(base_dn)?;

            let mut prefs = [
                ADS_SEARCHPREF_INFO {
                    dwSearchPref: ADS_SEARCHPREF_SEARCH_SCOPE,
                    vValue: ADSVALUE {
                        dwType: ADSTYPE_INTEGER,
                        Anonymous: ADSVALUE_0 {
                            Integer: Self::to_ads_scope(scope) as u32,
                        },
                    },
                    dwStatus: ADS_STATUS_S_OK,
                },
                ADS_SEARCHPREF_INFO {
                    dwSearchPref: ADS_SEARCHPREF_PAGESIZE,
                    vValue: ADSVALUE {
                        dwType: ADSTYPE_INTEGER,
                        Anonymous: ADSVALUE_0 { Integer: PAGE_SIZE },
                    },
                    dwStatus: ADS_STATUS_S_OK,
                },
            ];

            if let Err(e) = search.SetSearchPreference(prefs.as_mut_ptr(), prefs.len() as u32) {
                tracing::warn!(error = %e, "Failed to set search preferences, continuing with defaults");
            }

            let attr_bstrs: Vec<BSTR> = requested.iter().map(|a| BSTR::from(*a)).collect();
            let attr_ptrs: Vec<PCWSTR> = attr_bstrs.iter().map(|b| PCWSTR(b.as_ptr())).collect();
            let filter_bstr = BSTR::from(filter);

            let search_handle = search
                .ExecuteSearch(
                    PCWSTR(filter_bstr.as_ptr()),
                    attr_ptrs.as_ptr(),
                    requested.len() as u32,
                )
                .map_err(|e| {
                    let hresult = e.code().0 as u32;
                    tracing::error!(
                        base_dn = base_dn,
                        filter = filter,
                        error = %e,
                        hresult = format!("0x{:08X}", hresult),
                        "ADSI SEARCH FAILED: ExecuteSearch error"
                    );
                    AppError::LdapError(format!("Search execution failed: {} (HRESULT: 0x{:08X})", e, hresult))
                })?;

            let mut results = Vec::new();
            loop {
                let row_hr = search.GetNextRow(search_handle);
                if row_hr.is_err() || row_hr.0 as u32 == S_ADS_NOMORE_ROWS {
                    break;
                }

                let mut result = SearchResult::default();
                for (attr, attr_bstr) in requested.iter().zip(&attr_bstrs) {
                    let mut column: ADS_SEARCH_COLUMN = std::mem::zeroed();
                    if search
                        .GetColumn(search_handle, PCWSTR(attr_bstr.as_ptr()), &mut column)
                        .is_ok()
                    {
                        let values = extract_column_values(&column);
                        if !values.is_empty() {
                            result.insert(attr, values);
                        }
                        if let Err(e) = search.FreeColumn(&mut column) {
                            tracing::warn!(attr = attr, error = %e, "Failed to free ADSI column");
                        }
                    }
                }
                result.distinguished_name = result
                    .get("distinguishedName")
                    .cloned()
                    .unwrap_or_default();
                results.push(result);
            }

            if let Err(e) = search.CloseSearchHandle(search_handle) {
                tracing::warn!(error = %e, "Failed to close ADSI search handle");
            }

            if results.is_empty() && scope == SearchScope::Base {
                return Err(AppError::ObjectNotFound(base_dn.to_string()));
            }

            tracing::info!(
                base_dn = base_dn,
                result_count = results.len(),
                "ADSI search completed"
            );
            Ok(results)
        }
    }

    fn set_account_control(&mut self, dn: &str, flags: AccountControl) -> AppResult<()> {
        // SAFETY: the IADs object is owned by the windows crate wrapper
        unsafe {
            let obj: IADs = Self::open_object(dn)?;
            obj.Put(&BSTR::from("userAccountControl"), &VARIANT::from(flags.0 as i32))
                .map_err(|e| AppError::LdapError(format!("Failed to set userAccountControl: {}", e)))?;
            obj.SetInfo()
                .map_err(|e| AppError::LdapError(format!("Failed to commit {}: {}", dn, e)))?;
        }
        Ok(())
    }

    fn create_user(&mut self, user: &NewUser) -> AppResult<String> {
        let dn = user.distinguished_name();

        // SAFETY: container and new object interfaces are owned wrappers;
        // password is set only after the object is committed
        unsafe {
            let container: IADsContainer = Self::open_object(&user.parent_dn)?;
            let rdn = dn
                .strip_suffix(&format!(",{}", user.parent_dn))
                .unwrap_or(&dn)
                .to_string();

            let new_obj: IADs = container
                .Create(&BSTR::from("user"), &BSTR::from(rdn.as_str()))
                .and_then(|d| d.cast())
                .map_err(|e| AppError::LdapError(format!("Failed to create user {}: {}", user.sam_account_name, e)))?;

            let mut attrs: Vec<(&str, &str)> = vec![
                ("sAMAccountName", user.sam_account_name.as_str()),
                ("userPrincipalName", user.user_principal_name.as_str()),
                ("displayName", user.display_name.as_str()),
                ("givenName", user.given_name.as_str()),
                ("sn", user.surname.as_str()),
            ];
            if let Some(description) = user.description.as_deref().filter(|d| !d.is_empty()) {
                attrs.push(("description", description));
            }
            for (name, value) in attrs {
                new_obj
                    .Put(&BSTR::from(name), &VARIANT::from(BSTR::from(value)))
                    .map_err(|e| AppError::LdapError(format!("Failed to set {}: {}", name, e)))?;
            }

            // Commit the object first (before setting password)
            new_obj
                .SetInfo()
                .map_err(|e| AppError::LdapError(format!("Failed to create user object: {}", e)))?;

            let ads_user: IADsUser = new_obj
                .cast()
                .map_err(|e| AppError::LdapError(format!("Failed to get user interface: {}", e)))?;
            ads_user
                .SetPassword(&BSTR::from(user.password.as_str()))
                .map_err(|e| AppError::LdapError(format!("Failed to set password: {}", e)))?;

            let uac = AccountControl::enabled_user();
            new_obj
                .Put(&BSTR::from("userAccountControl"), &VARIANT::from(uac.0 as i32))
                .map_err(|e| AppError::LdapError(format!("Failed to set account control: {}", e)))?;
            if user.change_password_at_logon {
                new_obj
                    .Put(&BSTR::from("pwdLastSet"), &VARIANT::from(0i32))
                    .map_err(|e| AppError::LdapError(format!("Failed to set pwdLastSet: {}", e)))?;
            }
            new_obj
                .SetInfo()
                .map_err(|e| AppError::LdapError(format!("Failed to commit user changes: {}", e)))?;
        }

        Ok(dn)
    }

    fn delete_object(&mut self, dn: &str, recursive: bool) -> AppResult<()> {
        // SAFETY: interfaces are owned wrappers; DeleteObject takes no flags
        unsafe {
            if recursive {
                let ops: IADsDeleteOps = Self::open_object(dn)?;
                ops.DeleteObject(0)
                    .map_err(|e| AppError::LdapError(format!("Failed to delete {}: {}", dn, e)))?;
                return Ok(());
            }

            let obj: IADs = Self::open_object(dn)?;
            let class = obj
                .Class()
                .map_err(|e| AppError::LdapError(format!("Failed to read class of {}: {}", dn, e)))?;
            let rdn = obj
                .Name()
                .map_err(|e| AppError::LdapError(format!("Failed to read name of {}: {}", dn, e)))?;
            let parent_dn = crate::domain::dn::parent_dn(dn)
                .ok_or_else(|| AppError::InvalidInput(format!("{} has no parent", dn)))?;
            let container: IADsContainer = Self::open_object(parent_dn)?;
            container
                .Delete(&class, &rdn)
                .map_err(|e| AppError::LdapError(format!("Failed to delete {}: {}", dn, e)))?;
        }
        Ok(())
    }
}

impl Drop for AdsiDirectory {
    fn drop(&mut self) {
        if self.com_initialized {
            // SAFETY: balances the successful CoInitializeEx in connect()
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// Extract values from an ADS_SEARCH_COLUMN
unsafe fn extract_column_values(column: &ADS_SEARCH_COLUMN) -> Vec<String> {
    let mut values = Vec::new();

    if column.pADsValues.is_null() || column.dwNumValues == 0 {
        return values;
    }

    for i in 0..column.dwNumValues as usize {
        let value = &*column.pADsValues.add(i);
        if let Some(s) = extract_adsvalue(value) {
            values.push(s);
        }
    }

    values
}

/// Extract a string from an ADSVALUE
unsafe fn extract_adsvalue(value: &ADSVALUE) -> Option<String> {
    match value.dwType {
        ADSTYPE_DN_STRING | ADSTYPE_CASE_EXACT_STRING | ADSTYPE_CASE_IGNORE_STRING
        | ADSTYPE_PRINTABLE_STRING | ADSTYPE_NUMERIC_STRING => {
            let ptr = value.Anonymous.CaseIgnoreString;
            if ptr.is_null() {
                return None;
            }
            let len = (0..).take_while(|&i| *ptr.add(i) != 0).count();
            let slice = std::slice::from_raw_parts(ptr, len);
            Some(String::from_utf16_lossy(slice))
        }
        ADSTYPE_BOOLEAN => {
            Some(if value.Anonymous.Boolean != 0 { "TRUE" } else { "FALSE" }.to_string())
        }
        ADSTYPE_INTEGER => Some(value.Anonymous.Integer.to_string()),
        // lastLogonTimestamp and friends come back as raw FILETIME ticks
        ADSTYPE_LARGE_INTEGER => Some(value.Anonymous.LargeInteger.to_string()),
        _ => None,
    }
}
