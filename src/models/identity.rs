use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// An account as cached on this device or mirrored in the cloud.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    /// Unique in both stores; the login lookup key.
    pub email: String,
    pub profile_image_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(
        username: impl Into<String>,
        email: &str,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            password_hash: password_hash.into(),
            email: normalize_email(email),
            profile_image_ref: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_profile_image(mut self, image_ref: impl Into<String>) -> Self {
        self.profile_image_ref = Some(image_ref.into());
        self
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} <{}>", self.username, self.email)?;
        writeln!(f, "ID:      {}", self.id)?;
        write!(f, "Created: {}", self.created_at.format("%Y-%m-%d %H:%M UTC"))?;
        if let Some(image) = &self.profile_image_ref {
            write!(f, "\nImage:   {}", image)?;
        }
        Ok(())
    }
}

/// Emails are compared case-insensitively and without surrounding whitespace.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
