use serde::{Deserialize, Serialize};

/// Operator permission level, ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Role {
    Common,
    Admin,
    Root,
}

impl From<i64> for Role {
    fn from(level: i64) -> Self {
        match level {
            l if l >= 100 => Role::Root,
            l if l >= 10 => Role::Admin,
            _ => Role::Common,
        }
    }
}

impl From<Role> for i64 {
    fn from(role: Role) -> Self {
        match role {
            Role::Common => 1,
            Role::Admin => 10,
            Role::Root => 100,
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(level) = s.parse::<i64>() {
            return Ok(Role::from(level));
        }
        match s.to_ascii_lowercase().as_str() {
            "common" | "user" => Ok(Role::Common),
            "admin" => Ok(Role::Admin),
            "root" => Ok(Role::Root),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// The signed-in operator as far as the console is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub role: Role,
}

impl Viewer {
    pub fn new(role: Role) -> Self {
        Self { role }
    }

    /// May inspect other accounts' tokens.
    pub fn is_elevated(&self) -> bool {
        self.role >= Role::Root
    }

    /// Sees admin-only columns such as the billing tag.
    pub fn is_admin(&self) -> bool {
        self.role >= Role::Admin
    }
}

/// Account record as the user list endpoint returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// An entry of the impersonation autocomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOption {
    pub id: i64,
    pub username: String,
    pub display_name: String,
}

impl From<UserRecord> for UserOption {
    fn from(record: UserRecord) -> Self {
        let display_name = record
            .display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| record.username.clone());
        Self {
            id: record.id,
            username: record.username,
            display_name,
        }
    }
}

impl UserOption {
    /// Autocomplete label: `<display name> (ID: <id>)`.
    pub fn label(&self) -> String {
        format!("{} (ID: {})", self.display_name, self.id)
    }
}
