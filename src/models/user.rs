use serde::{Deserialize, Serialize};

/// Account record created after the identity provider has issued `id`. The
/// role is fixed at signup; there is no role-switch flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Driver,
    Host,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Driver => "driver",
            Role::Host => "host",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "driver" => Some(Role::Driver),
            "host" => Some(Role::Host),
            _ => None,
        }
    }
}
