use crate::api::Row;
use crate::model::lenient_string;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A row from the `users` table. Only login reads it; the password never leaves this type.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default, deserialize_with = "lenient_string")]
    password: Option<String>,
    #[serde(rename = "nama", default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub role: Option<String>,
}

impl User {
    pub fn from_row(row: &Row) -> crate::Result<Self> {
        Ok(serde_json::from_value(Value::Object(row.clone()))?)
    }

    /// Compares the stored password with `candidate`. A user without a stored password never
    /// matches.
    pub fn password_matches(&self, candidate: &str) -> bool {
        self.password.as_deref() == Some(candidate)
    }

    /// The user as it is kept in a session: everything except the password.
    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id.clone().unwrap_or_default(),
            username: self.username.clone(),
            name: self.name.clone(),
            role: self.role.clone(),
        }
    }
}

/// The logged-in user as persisted in the session file.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Profile {
    /// The name to greet the user with.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_has_no_password() {
        let row = json!({"id": 3, "username": "admin", "password": "rahasia", "nama": "Pak RT"});
        let user = User::from_row(row.as_object().unwrap()).unwrap();
        assert!(user.password_matches("rahasia"));
        assert!(!user.password_matches("salah"));
        let profile = user.profile();
        assert_eq!(profile.id, "3");
        assert_eq!(profile.display_name(), "Pak RT");
        let json = serde_json::to_string(&profile).unwrap();
        assert!(!json.contains("rahasia"));
    }

    #[test]
    fn test_missing_password_never_matches() {
        let row = json!({"username": "tamu"});
        let user = User::from_row(row.as_object().unwrap()).unwrap();
        assert!(!user.password_matches(""));
    }
}
