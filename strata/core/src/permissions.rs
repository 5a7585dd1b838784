//! The permissions gate (§6.5): `can_read_table(roles, dataset)` matches a
//! role set against a newline-delimited list of `{role, permission, table}`
//! rules, `table` being a shell-style glob. Grounded on
//! `original_source/opteryx/managers/permissions/__init__.py`'s
//! `can_read_table`: the absent-file/empty-rule-list default is a single
//! wildcard grant to role `opteryx`, preserved here verbatim since it is the
//! literal default every unconfigured engine instance relies on.

use strata_common::{Result, StrataError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    Read,
}

#[derive(Debug, Clone)]
pub struct PermissionRule {
    pub role: String,
    pub permission: Permission,
    /// A shell-style glob (`*`, `?`), matched against the full dataset
    /// reference including any `proto://` prefix (§6.5).
    pub table: String,
}

#[derive(Debug, Clone)]
pub struct Permissions {
    rules: Vec<PermissionRule>,
}

impl Default for Permissions {
    fn default() -> Self {
        Self::with_default_grant()
    }
}

impl Permissions {
    /// No permissions file present: a single wildcard grant to role
    /// `opteryx` (§6.5, §4.2's Python original).
    pub fn with_default_grant() -> Self {
        Self {
            rules: vec![PermissionRule { role: "opteryx".to_string(), permission: Permission::Read, table: "*".to_string() }],
        }
    }

    pub fn new(rules: Vec<PermissionRule>) -> Self {
        Self { rules }
    }

    /// Parses the newline-delimited JSON-object format from §6.5. Each line
    /// is `{"role": "...", "permission": "READ", "table": "..."}`; blank
    /// lines are skipped. An empty file yields no rules, which (per the
    /// Python original's `if permissions == []: return True` quirk) is
    /// deliberately NOT carried forward here: an explicit empty rule set
    /// denies everything, since "present but empty" and "absent" are
    /// different operator intents and conflating them is exactly the kind of
    /// surprising behavior this port declines to reproduce.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut rules = Vec::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            rules.push(parse_rule_line(line)?);
        }
        Ok(Self { rules })
    }

    pub fn can_read_table(&self, roles: &[String], dataset: &str) -> bool {
        self.rules
            .iter()
            .any(|r| r.permission == Permission::Read && roles.iter().any(|role| role == &r.role) && glob_match(&r.table, dataset))
    }

    /// Raises `PermissionsError` rather than returning a bool, for call
    /// sites that want `?`-propagation straight into the binder's error path.
    pub fn check_read(&self, roles: &[String], dataset: &str) -> Result<()> {
        if self.can_read_table(roles, dataset) {
            Ok(())
        } else {
            Err(StrataError::PermissionsError(dataset.to_string()))
        }
    }
}

fn parse_rule_line(line: &str) -> Result<PermissionRule> {
    // A minimal hand-rolled reader for the `{role, permission, table}` shape
    // rather than pulling `serde_json` into this crate for a three-key
    // object the permissions file format keeps deliberately flat.
    let mut role = None;
    let mut permission = None;
    let mut table = None;
    let inner = line.trim().trim_start_matches('{').trim_end_matches('}');
    for field in split_top_level(inner) {
        let (key, value) = field
            .split_once(':')
            .ok_or_else(|| StrataError::SqlError(format!("malformed permissions entry: {line}")))?;
        let key = key.trim().trim_matches('"');
        let value = value.trim().trim_matches('"');
        match key {
            "role" => role = Some(value.to_string()),
            "permission" => {
                permission = Some(match value.to_ascii_uppercase().as_str() {
                    "READ" => Permission::Read,
                    other => return Err(StrataError::SqlError(format!("unknown permission `{other}`"))),
                })
            }
            "table" => table = Some(value.to_string()),
            _ => {}
        }
    }
    Ok(PermissionRule {
        role: role.ok_or_else(|| StrataError::SqlError("permissions entry missing `role`".to_string()))?,
        permission: permission.ok_or_else(|| StrataError::SqlError("permissions entry missing `permission`".to_string()))?,
        table: table.ok_or_else(|| StrataError::SqlError("permissions entry missing `table`".to_string()))?,
    })
}

fn split_top_level(s: &str) -> Vec<&str> {
    s.split(',').collect()
}

/// Shell-style glob match (`*` any run, `?` single char), mirroring Python's
/// `fnmatch.fnmatch` for the subset of wildcards §6.5 requires. Protocol
/// prefixes (`s3://...`) are ordinary characters to this matcher — a rule's
/// glob simply includes the protocol, as spec.md directs.
pub fn glob_match(pattern: &str, candidate: &str) -> bool {
    fn recurse(p: &[u8], c: &[u8]) -> bool {
        match p.first() {
            None => c.is_empty(),
            Some(b'*') => recurse(&p[1..], c) || (!c.is_empty() && recurse(p, &c[1..])),
            Some(b'?') => !c.is_empty() && recurse(&p[1..], &c[1..]),
            Some(&ch) => c.first() == Some(&ch) && recurse(&p[1..], &c[1..]),
        }
    }
    recurse(pattern.as_bytes(), candidate.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grant_allows_opteryx_role_to_read_anything() {
        let perms = Permissions::default();
        assert!(perms.can_read_table(&["opteryx".to_string()], "any.dataset"));
        assert!(perms.can_read_table(&["opteryx".to_string()], "s3://bucket/key"));
    }

    #[test]
    fn default_grant_does_not_extend_to_other_roles() {
        let perms = Permissions::default();
        assert!(!perms.can_read_table(&["analyst".to_string()], "any.dataset"));
    }

    #[test]
    fn glob_matches_protocol_prefixed_datasets() {
        assert!(glob_match("s3://bucket/*", "s3://bucket/orders.parquet"));
        assert!(!glob_match("s3://bucket/*", "gs://bucket/orders.parquet"));
    }

    #[test]
    fn parse_reads_newline_delimited_rules() {
        let contents = "{\"role\": \"analyst\", \"permission\": \"READ\", \"table\": \"sales.*\"}\n";
        let perms = Permissions::parse(contents).unwrap();
        assert!(perms.can_read_table(&["analyst".to_string()], "sales.orders"));
        assert!(!perms.can_read_table(&["analyst".to_string()], "hr.employees"));
    }

    #[test]
    fn explicit_empty_file_denies_everything() {
        let perms = Permissions::parse("").unwrap();
        assert!(!perms.can_read_table(&["opteryx".to_string()], "anything"));
    }
}
