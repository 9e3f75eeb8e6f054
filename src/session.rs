//! Signed-in identity and role gates.
//!
//! Authentication happens outside the sidecar; `session.signIn` hands us the
//! asserted identity and it lives here until `session.signOut`.

use crate::error::AttendifyError;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Faculty,
    Student,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "faculty" => Some(Role::Faculty),
            "student" => Some(Role::Student),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Faculty => "faculty",
            Role::Student => "student",
        }
    }

    pub fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Faculty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub section: Option<String>,
    pub enrollment_number: Option<String>,
}

impl User {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "name": self.name,
            "email": self.email,
            "role": self.role.as_str(),
            "section": self.section,
            "enrollmentNumber": self.enrollment_number
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    Unauthenticated,
    Authenticated(User),
}

impl Session {
    /// Replaces any current identity. Students must belong to a section.
    pub fn sign_in(&mut self, user: User) -> Result<&User, AttendifyError> {
        if user.role == Role::Student
            && user.section.as_deref().map_or(true, |s| s.trim().is_empty())
        {
            return Err(AttendifyError::MissingFields {
                fields: vec!["section".to_string()],
            });
        }
        *self = Session::Authenticated(user);
        self.require_user()
    }

    pub fn sign_out(&mut self) {
        *self = Session::Unauthenticated;
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Session::Authenticated(u) => Some(u),
            Session::Unauthenticated => None,
        }
    }

    pub fn require_user(&self) -> Result<&User, AttendifyError> {
        self.user().ok_or(AttendifyError::NotAuthenticated)
    }

    /// Admin or faculty.
    pub fn require_staff(&self, action: &str) -> Result<&User, AttendifyError> {
        let user = self.require_user()?;
        if !user.role.is_staff() {
            return Err(AttendifyError::Forbidden {
                action: action.to_string(),
                required: "staff",
            });
        }
        Ok(user)
    }

    pub fn require_admin(&self, action: &str) -> Result<&User, AttendifyError> {
        let user = self.require_user()?;
        if user.role != Role::Admin {
            return Err(AttendifyError::Forbidden {
                action: action.to_string(),
                required: "admin",
            });
        }
        Ok(user)
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Session::Unauthenticated => json!({ "authenticated": false, "user": null }),
            Session::Authenticated(u) => json!({ "authenticated": true, "user": u.to_json() }),
        }
    }
}
