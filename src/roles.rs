//! Access control (§4.1, §10.3): a flat `<username> <role>` table loaded
//! once at startup.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use anyhow::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    None,
    Read,
    Write,
}

impl Role {
    fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "none" => Self::None,
            "read" => Self::Read,
            "write" => Self::Write,
            _ => return None,
        })
    }

    pub fn can_read(self) -> bool {
        self >= Self::Read
    }

    pub fn can_write(self) -> bool {
        self >= Self::Write
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Read => "read",
            Self::Write => "write",
        })
    }
}

/// Usernames not listed in the table default to [`Role::None`] (§4.1): an
/// unrecognized user can connect, but every edit they submit is rejected.
#[derive(Debug, Default)]
pub struct RoleTable {
    roles: HashMap<String, Role>,
}

impl RoleTable {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("reading role table {}", path.display()))?;
        let mut roles = HashMap::new();
        for (lineno, line) in body.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let username = parts
                .next()
                .with_context(|| format!("{}:{}: missing username", path.display(), lineno + 1))?;
            let role_token = parts
                .next()
                .with_context(|| format!("{}:{}: missing role", path.display(), lineno + 1))?;
            let role = Role::parse(role_token)
                .with_context(|| format!("{}:{}: unknown role {role_token:?}", path.display(), lineno + 1))?;
            roles.insert(username.to_string(), role);
        }
        Ok(Self { roles })
    }

    pub fn role_of(&self, username: &str) -> Role {
        self.roles.get(username).copied().unwrap_or(Role::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_from(body: &str) -> RoleTable {
        let dir = temp_dir::TempDir::new().unwrap();
        let path = dir.path().join("roles.txt");
        std::fs::write(&path, body).unwrap();
        RoleTable::load(&path).unwrap()
    }

    #[test]
    fn known_users_get_their_listed_role() {
        let table = table_from("alice write\nbob read\ncarol none\n");
        assert_eq!(table.role_of("alice"), Role::Write);
        assert_eq!(table.role_of("bob"), Role::Read);
        assert_eq!(table.role_of("carol"), Role::None);
    }

    #[test]
    fn unknown_user_defaults_to_none() {
        let table = table_from("alice write\n");
        assert_eq!(table.role_of("mallory"), Role::None);
    }

    #[test]
    fn blank_lines_are_ignored() {
        let table = table_from("alice write\n\n\nbob read\n");
        assert_eq!(table.role_of("bob"), Role::Read);
    }

    #[test]
    fn ordering_reflects_privilege() {
        assert!(Role::Write > Role::Read);
        assert!(Role::Read > Role::None);
        assert!(Role::Write.can_read());
        assert!(!Role::Read.can_write());
    }
}
