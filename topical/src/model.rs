use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static INITIALS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2}$").unwrap());

/// Number of entries in the author color palette.
pub const THEME_COUNT: u8 = 6;

/// Reasons a join request is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("Initials must be exactly two capital letters")]
    InvalidInitials,
    #[error("Please pick one of the available colors")]
    InvalidTheme,
}

/// Self-asserted identity kept in the session cookie.
///
/// A `User` can only be built through [`User::new`] (deserialization goes
/// through it as well), so holding one means the initials are two uppercase
/// ASCII letters and the theme is inside the palette.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UserRecord")]
pub struct User {
    initials: String,
    theme: u8,
}

#[derive(Deserialize)]
struct UserRecord {
    initials: String,
    theme: u8,
}

impl TryFrom<UserRecord> for User {
    type Error = IdentityError;

    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        User::new(&record.initials, record.theme)
    }
}

impl User {
    pub fn new(initials: &str, theme: u8) -> Result<Self, IdentityError> {
        if !INITIALS_RE.is_match(initials) {
            return Err(IdentityError::InvalidInitials);
        }
        if theme >= THEME_COUNT {
            return Err(IdentityError::InvalidTheme);
        }
        Ok(Self {
            initials: initials.to_string(),
            theme,
        })
    }

    /// Build a user from raw join form fields.
    pub fn from_form(initials: &str, theme: &str) -> Result<Self, IdentityError> {
        let initials = initials.trim();
        if !INITIALS_RE.is_match(initials) {
            return Err(IdentityError::InvalidInitials);
        }
        let theme = theme
            .trim()
            .parse::<u8>()
            .map_err(|_| IdentityError::InvalidTheme)?;
        Self::new(initials, theme)
    }

    pub fn initials(&self) -> &str {
        &self.initials
    }

    pub fn theme(&self) -> u8 {
        self.theme
    }
}

/// A topic with its full message thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub id: i64,
    pub title: String,
    pub messages: Vec<Message>,
}

/// A row of the recent topics list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSummary {
    pub id: i64,
    pub title: String,
    pub message_count: i64,
    /// Initials of whoever posted the opening message.
    pub author_initials: String,
    pub author_theme: u8,
    pub last_posted: i64,
}

/// A persisted message. `content` holds sanitized HTML when loaded through
/// [`crate::store::TopicStore::topic`], and the raw text everywhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: i64,
    pub topic_id: i64,
    pub content: String,
    pub author_initials: String,
    pub author_theme: u8,
    pub posted: i64,
}

/// A message about to be written.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub topic_id: i64,
    pub content: String,
    pub author: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_two_capital_letters() {
        let user = User::new("AK", 3).unwrap();
        assert_eq!(user.initials(), "AK");
        assert_eq!(user.theme(), 3);
    }

    #[test]
    fn rejects_malformed_initials() {
        for bad in ["", "A", "ABC", "ak", "Ak", "A1", "12", "Ä K"] {
            assert_eq!(
                User::new(bad, 0),
                Err(IdentityError::InvalidInitials),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn rejects_theme_outside_palette() {
        assert_eq!(User::new("AK", THEME_COUNT), Err(IdentityError::InvalidTheme));
        assert_eq!(User::from_form("AK", "-1"), Err(IdentityError::InvalidTheme));
        assert_eq!(User::from_form("AK", "blue"), Err(IdentityError::InvalidTheme));
        assert!(User::from_form("AK", " 5 ").is_ok());
    }

    #[test]
    fn form_reports_initials_before_theme() {
        assert_eq!(User::from_form("", ""), Err(IdentityError::InvalidInitials));
        assert_eq!(User::from_form(" JK ", "x"), Err(IdentityError::InvalidTheme));
    }

    #[test]
    fn deserializing_revalidates() {
        let ok: User = serde_json::from_str(r#"{"initials":"JK","theme":0}"#).unwrap();
        assert_eq!(ok, User::new("JK", 0).unwrap());
        assert!(serde_json::from_str::<User>(r#"{"initials":"jk","theme":0}"#).is_err());
        assert!(serde_json::from_str::<User>(r#"{"initials":"JK","theme":42}"#).is_err());
    }
}
