//! Distinguished name and filter helpers

/// Convert domain DN to DNS name
pub fn domain_dn_to_dns(dn: &str) -> String {
    dn.split(',')
        .map(str::trim)
        .filter(|s| s.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("DC=")))
        .map(|s| &s[3..])
        .collect::<Vec<_>>()
        .join(".")
}

/// Parent of a DN (everything after the first unescaped comma)
pub fn parent_dn(dn: &str) -> Option<&str> {
    let mut escaped = false;
    for (i, c) in dn.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            ',' if !escaped => return Some(dn[i + 1..].trim_start()),
            _ => escaped = false,
        }
    }
    None
}

/// First RDN and the parent DN, split at the first unescaped comma
fn split_first_rdn(dn: &str) -> (&str, Option<&str>) {
    match parent_dn(dn) {
        Some(parent) => {
            let head = dn[..dn.len() - parent.len()].trim_end();
            (head.strip_suffix(',').unwrap_or(head), Some(parent))
        }
        None => (dn, None),
    }
}

/// Value of the first RDN, e.g. `DC01` for `CN=DC01,CN=Servers,...`
pub fn first_rdn_value(dn: &str) -> Option<&str> {
    let (first, _) = split_first_rdn(dn);
    first.split_once('=').map(|(_, value)| value)
}

/// Extract server name from NTDS Settings DN
/// Example: CN=NTDS Settings,CN=DC01,CN=Servers,CN=Default-First-Site-Name,CN=Sites,CN=Configuration,DC=...
pub fn extract_server_from_ntds_settings(ntds_dn: &str) -> Option<String> {
    server_dn_from_ntds_settings(ntds_dn)
        .and_then(first_rdn_value)
        .map(|name| strip_mangled_suffix(name).to_string())
}

/// DN of the server object owning an NTDS Settings object
///
/// Also accepts the deleted form `CN=NTDS Settings\0ADEL:<guid>,...` that a
/// role owner takes once the holder's metadata has been removed.
pub fn server_dn_from_ntds_settings(ntds_dn: &str) -> Option<&str> {
    if !ntds_dn.to_lowercase().starts_with("cn=ntds settings") {
        return None;
    }
    parent_dn(ntds_dn)
}

/// Drop the `\0ADEL:<guid>` / `\0ACNF:<guid>` suffix AD appends to deleted
/// and conflicting RDN values
pub fn strip_mangled_suffix(value: &str) -> &str {
    let cut = value
        .find("\\0A")
        .into_iter()
        .chain(value.find('\n'))
        .min()
        .unwrap_or(value.len());
    &value[..cut]
}

/// Short host name from a DNS name, upper-cased the way AD shows server names
pub fn short_host_name(dns_name: &str) -> String {
    dns_name
        .split('.')
        .next()
        .unwrap_or(dns_name)
        .to_uppercase()
}

/// Escape a value for use inside an LDAP search filter (RFC 4515)
pub fn escape_ldap_filter(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\5c"),
            '*' => out.push_str("\\2a"),
            '(' => out.push_str("\\28"),
            ')' => out.push_str("\\29"),
            '\0' => out.push_str("\\00"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape an attribute value for use in an RDN (RFC 4514)
pub fn escape_dn_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                out.push('\\');
                out.push(c);
            }
            '#' if i == 0 => out.push_str("\\#"),
            ' ' if i == 0 || i == value.chars().count() - 1 => out.push_str("\\ "),
            _ => out.push(c),
        }
    }
    out
}

/// Loose check that a string looks like a DN (`attr=value[,attr=value]*`)
pub fn looks_like_dn(value: &str) -> bool {
    let mut rest = Some(value.trim());
    while let Some(dn) = rest {
        let (rdn, parent) = split_first_rdn(dn);
        let valid = rdn
            .split_once('=')
            .is_some_and(|(k, v)| !k.trim().is_empty() && !v.is_empty());
        if !valid {
            return false;
        }
        rest = parent;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const NTDS: &str = "CN=NTDS Settings,CN=DC01,CN=Servers,CN=Default-First-Site-Name,CN=Sites,CN=Configuration,DC=contoso,DC=com";

    #[test]
    fn test_extract_server_from_ntds_settings() {
        assert_eq!(extract_server_from_ntds_settings(NTDS).as_deref(), Some("DC01"));
        assert_eq!(
            server_dn_from_ntds_settings(NTDS),
            Some("CN=DC01,CN=Servers,CN=Default-First-Site-Name,CN=Sites,CN=Configuration,DC=contoso,DC=com")
        );
        assert_eq!(extract_server_from_ntds_settings("CN=DC01,OU=Domain Controllers,DC=x"), None);
    }

    #[test]
    fn test_extract_server_from_deleted_owner() {
        let deleted = "CN=NTDS Settings\\0ADEL:93a1,CN=DC02\\0ADEL:77b2,CN=Servers,CN=HQ,CN=Sites,CN=Configuration,DC=x";
        assert_eq!(extract_server_from_ntds_settings(deleted).as_deref(), Some("DC02"));
        assert_eq!(strip_mangled_suffix("DC02\nCNF:1"), "DC02");
        assert_eq!(strip_mangled_suffix("DC02"), "DC02");
    }

    #[test]
    fn test_parent_dn_skips_escaped_comma() {
        assert_eq!(parent_dn("CN=Smith\\, Anna,OU=Staff,DC=x"), Some("OU=Staff,DC=x"));
        assert_eq!(first_rdn_value("CN=Smith\\, Anna,OU=Staff,DC=x"), Some("Smith\\, Anna"));
        assert_eq!(parent_dn("DC=x"), None);
    }

    #[test]
    fn test_domain_dn_to_dns() {
        assert_eq!(domain_dn_to_dns("DC=corp,DC=contoso,DC=com"), "corp.contoso.com");
        assert_eq!(domain_dn_to_dns("OU=Users, dc=contoso, dc=com"), "contoso.com");
    }

    #[test]
    fn test_escape_ldap_filter() {
        assert_eq!(escape_ldap_filter("a*b(c)\\"), "a\\2ab\\28c\\29\\5c");
        assert_eq!(escape_ldap_filter("DC01"), "DC01");
    }

    #[test]
    fn test_escape_dn_value() {
        assert_eq!(escape_dn_value("Branch, West"), "Branch\\, West");
        assert_eq!(escape_dn_value("HQ"), "HQ");
    }

    #[test]
    fn test_short_host_name() {
        assert_eq!(short_host_name("dc2.corp.contoso.com"), "DC2");
        assert_eq!(short_host_name("DC2"), "DC2");
    }

    #[test]
    fn test_looks_like_dn() {
        assert!(looks_like_dn("OU=Staff,DC=contoso,DC=com"));
        assert!(looks_like_dn("OU=Smith\\, Anna,DC=contoso,DC=com"));
        assert!(!looks_like_dn("Staff"));
        assert!(!looks_like_dn("OU=Staff,"));
        assert!(!looks_like_dn(""));
    }
}
