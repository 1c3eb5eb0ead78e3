use std::fmt;

use serde::{Deserialize, Serialize};

/// Profile returned by `/me/`. Unlike the decoded token claims this comes
/// from the server, so it is what staff-only actions are gated on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

impl UserProfile {
    pub fn roles(&self) -> ConfirmedRoles {
        ConfirmedRoles {
            is_staff: self.is_staff,
            is_superuser: self.is_superuser,
        }
    }
}

/// Roles as confirmed by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfirmedRoles {
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl ConfirmedRoles {
    /// May approve or reject reservations
    pub fn is_admin(&self) -> bool {
        self.is_staff || self.is_superuser
    }
}

/// Body of `/token/`.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body of `/register/`.
#[derive(Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
}

impl Registration {
    pub fn passwords_match(&self) -> bool {
        self.password == self.password2
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_roles() {
        let profile: UserProfile = serde_json::from_str(
            r#"{"username": "sam", "email": "sam@example.com", "is_staff": true, "is_superuser": false}"#,
        )
        .unwrap();
        assert!(profile.roles().is_admin());

        let plain: UserProfile = serde_json::from_str(r#"{"username": "pat"}"#).unwrap();
        assert!(!plain.roles().is_admin());
        assert!(ConfirmedRoles { is_staff: false, is_superuser: true }.is_admin());
    }

    #[test]
    fn test_registration_body_and_redaction() {
        let reg = Registration {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "hunter22".to_string(),
            password2: "hunter22".to_string(),
        };
        assert!(reg.passwords_match());

        let body = serde_json::to_value(&reg).unwrap();
        assert_eq!(body["password2"], "hunter22");
        assert!(!format!("{:?}", reg).contains("hunter22"));
        assert!(!format!("{:?}", reg.credentials()).contains("hunter22"));
    }
}
