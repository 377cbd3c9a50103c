//! Cookie backed session holding the visitor's identity and flash queue.
//!
//! The whole session travels in one cookie as an HS256 signed token, so the
//! server keeps no session state. Anything that fails to verify (bad
//! signature, expired, garbage) is treated as an anonymous visitor.

use crate::model::User;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    response::{IntoResponseParts, ResponseParts},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc, time::Duration};
use time::OffsetDateTime;
use tracing::{debug, warn};

pub const COOKIE_NAME: &str = "topical";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("session cookie is not a valid header value")]
    Header(#[from] axum::http::header::InvalidHeaderValue),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    exp: u64,
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    flashes: Vec<String>,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Signs and verifies session cookies.
#[derive(Clone)]
pub struct SessionStore {
    keys: Arc<Keys>,
    ttl: Duration,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("keys", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl SessionStore {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
            }),
            ttl,
        }
    }

    /// Read the session carried by a request. Never fails.
    pub fn load(&self, headers: &HeaderMap) -> Session {
        let mut session = Session {
            user: None,
            flashes: Vec::new(),
            dirty: false,
            store: self.clone(),
        };
        if let Some(token) = cookie_value(headers, COOKIE_NAME) {
            match self.decode(token) {
                Ok(claims) => {
                    session.user = claims.user;
                    session.flashes = claims.flashes;
                }
                Err(e) => {
                    debug!(error = %e, "discarding unreadable session cookie");
                    // overwrite the bad cookie on the way out
                    session.dirty = true;
                }
            }
        }
        session
    }

    /// `Set-Cookie` value carrying the given session.
    pub fn cookie(&self, session: &Session) -> Result<HeaderValue, SessionError> {
        let token = self.encode(session)?;
        let value = format!(
            "{COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.ttl.as_secs()
        );
        Ok(HeaderValue::from_str(&value)?)
    }

    fn encode(&self, session: &Session) -> Result<String, SessionError> {
        let now = u64::try_from(OffsetDateTime::now_utc().unix_timestamp()).unwrap_or(0);
        let claims = Claims {
            exp: now.saturating_add(self.ttl.as_secs()),
            user: session.user.clone(),
            flashes: session.flashes.clone(),
        };
        Ok(encode(&Header::default(), &claims, &self.keys.encoding)?)
    }

    fn decode(&self, token: &str) -> Result<Claims, SessionError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.keys.decoding, &validation)?;
        Ok(data.claims)
    }
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

/// Per-request view of the session.
///
/// Extract it in a handler, mutate it, and return it as part of the response
/// so that changes are written back in a `Set-Cookie` header.
pub struct Session {
    user: Option<User>,
    flashes: Vec<String>,
    dirty: bool,
    store: SessionStore,
}

impl Session {
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn save_user(&mut self, user: User) {
        self.user = Some(user);
        self.dirty = true;
    }

    /// Queue a notice for the next page the visitor sees.
    pub fn save_flash(&mut self, message: impl Into<String>) {
        self.flashes.push(message.into());
        self.dirty = true;
    }

    /// Return and clear all queued notices.
    pub fn take_flashes(&mut self) -> Vec<String> {
        if !self.flashes.is_empty() {
            self.dirty = true;
        }
        std::mem::take(&mut self.flashes)
    }

    pub fn is_modified(&self) -> bool {
        self.dirty
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    SessionStore: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(SessionStore::from_ref(state).load(&parts.headers))
    }
}

impl IntoResponseParts for Session {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if self.dirty {
            match self.store.cookie(&self) {
                Ok(value) => {
                    res.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(e) => warn!(error = %e, "failed to write session cookie"),
            }
        }
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(b"test", Duration::from_secs(3600))
    }

    /// Turn a session into the request headers a browser would send back.
    fn round_trip(store: &SessionStore, session: &Session) -> HeaderMap {
        let set_cookie = store.cookie(session).unwrap();
        let pair = set_cookie.to_str().unwrap().split(';').next().unwrap().to_string();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(&pair).unwrap());
        headers
    }

    #[test]
    fn no_cookie_is_anonymous() {
        let session = store().load(&HeaderMap::new());
        assert!(session.user().is_none());
        assert!(!session.is_modified());
    }

    #[test]
    fn save_and_return_user() {
        let store = store();
        let mut session = store.load(&HeaderMap::new());
        session.save_user(User::new("JK", 0).unwrap());
        assert!(session.is_modified());
        let next = store.load(&round_trip(&store, &session));
        assert_eq!(next.user(), Some(&User::new("JK", 0).unwrap()));
    }

    #[test]
    fn flashes_are_read_once() {
        let store = store();
        let mut session = store.load(&HeaderMap::new());
        session.save_flash("1st");
        session.save_flash("2nd");

        let mut next = store.load(&round_trip(&store, &session));
        assert_eq!(next.take_flashes(), ["1st", "2nd"]);
        assert!(next.take_flashes().is_empty());

        let mut after = store.load(&round_trip(&store, &next));
        assert!(after.take_flashes().is_empty());
        assert!(!after.is_modified());
    }

    #[test]
    fn tampered_cookie_is_anonymous() {
        let store = store();
        let mut session = store.load(&HeaderMap::new());
        session.save_user(User::new("JK", 0).unwrap());
        let headers = round_trip(&store, &session);
        let forged = SessionStore::new(b"other key", Duration::from_secs(3600));
        let loaded = forged.load(&headers);
        assert!(loaded.user().is_none());
        assert!(loaded.is_modified());

        let mut garbage = HeaderMap::new();
        garbage.insert(header::COOKIE, HeaderValue::from_static("topical=not-a-token"));
        assert!(store.load(&garbage).user().is_none());
    }

    #[test]
    fn expired_cookie_is_anonymous() {
        let claims = Claims {
            exp: (OffsetDateTime::now_utc().unix_timestamp() - 3600) as u64,
            user: Some(User::new("JK", 0).unwrap()),
            flashes: vec!["old".into()],
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test")).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("other=1; {COOKIE_NAME}={token}")).unwrap(),
        );
        let mut session = store().load(&headers);
        assert!(session.user().is_none());
        assert!(session.take_flashes().is_empty());
    }

    #[test]
    fn huge_ttl_saturates_expiry() {
        let store = SessionStore::new(b"test", Duration::from_secs(u64::MAX));
        let mut session = store.load(&HeaderMap::new());
        session.save_user(User::new("JK", 0).unwrap());
        let headers = round_trip(&store, &session);
        assert_eq!(store.load(&headers).user().map(User::initials), Some("JK"));
    }

    #[test]
    fn cookie_attributes() {
        let store = store();
        let mut session = store.load(&HeaderMap::new());
        session.save_flash("hi");
        let value = store.cookie(&session).unwrap();
        let value = value.to_str().unwrap();
        assert!(value.starts_with("topical="));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("Path=/"));
        assert!(value.contains("Max-Age=3600"));
    }
}
