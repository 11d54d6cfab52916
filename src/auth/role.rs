//! Account roles and the tables keyed by them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Login page, also the home of an unrecognized role.
pub const LOGIN_PATH: &str = "/login";

/// The kind of account a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// Job seeker.
    User,
    /// Recruiter.
    Company,
    /// Platform operator.
    Admin,
    /// Any role string the client does not recognize.
    Unknown(String),
}

/// Per-role lookup entry.
struct RoleEntry {
    name: &'static str,
    home: &'static str,
    profile_segment: &'static str,
}

static ROLE_TABLE: [(Role, RoleEntry); 3] = [
    (
        Role::User,
        RoleEntry {
            name: "user",
            home: "/user/dashboard",
            profile_segment: "users",
        },
    ),
    (
        Role::Company,
        RoleEntry {
            name: "company",
            home: "/company/dashboard",
            profile_segment: "companies",
        },
    ),
    (
        Role::Admin,
        RoleEntry {
            name: "admin",
            home: "/admin/dashboard",
            profile_segment: "admin",
        },
    ),
];

impl Role {
    /// Parses a role string, case-insensitively.
    pub fn parse(s: &str) -> Self {
        let normalized = s.trim().to_ascii_lowercase();
        ROLE_TABLE
            .iter()
            .find(|(_, entry)| entry.name == normalized)
            .map(|(role, _)| role.clone())
            .unwrap_or_else(|| Role::Unknown(s.trim().to_string()))
    }

    fn entry(&self) -> Option<&'static RoleEntry> {
        ROLE_TABLE
            .iter()
            .find(|(role, _)| role == self)
            .map(|(_, entry)| entry)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Role::Unknown(_))
    }

    /// Returns the string stored and sent to the backend.
    pub fn as_str(&self) -> &str {
        match self {
            Role::Unknown(raw) => raw,
            known => known.entry().map_or("", |e| e.name),
        }
    }

    /// Landing page for this role; unknown roles land on the login page.
    pub fn home_path(&self) -> &'static str {
        self.entry().map(|e| e.home).unwrap_or(LOGIN_PATH)
    }

    /// Profile endpoint for this role, or `None` for an unknown role.
    pub fn profile_path(&self) -> Option<String> {
        self.entry()
            .map(|e| format!("/api/{}/me", e.profile_segment))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Role::parse(s))
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Role::parse(&raw))
    }
}

/// Home path for an optional role; no role lands on the login page.
pub fn home_for(role: Option<&Role>) -> &'static str {
    role.map(Role::home_path).unwrap_or(LOGIN_PATH)
}
