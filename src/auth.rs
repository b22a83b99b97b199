use crate::error::{CheckError, Result};
use base64::Engine;
use serde::Deserialize;
use std::fmt;
use url::Url;

const BEARER_PREFIX: &str = "Bearer ";

/// Where to fetch a token for a registry that answered `401`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub realm: String,
    /// Everything from the challenge except `realm`, in header order.
    pub params: Vec<(String, String)>,
}

impl AuthChallenge {
    /// Parses a `WWW-Authenticate: Bearer realm="...",service="...",scope="..."` value.
    pub fn parse(header: &str) -> Result<Self> {
        if header.trim().is_empty() {
            return Err(CheckError::MalformedChallenge(
                "no WWW-Authenticate data".to_string(),
            ));
        }

        let query = header
            .strip_prefix(BEARER_PREFIX)
            .unwrap_or(header)
            .replace(',', "&")
            .replace('"', "");

        let mut realm = None;
        let mut params = Vec::new();
        for (key, value) in parse_query(&query)? {
            if key == "realm" {
                realm.get_or_insert(value);
            } else {
                params.push((key, value));
            }
        }

        let realm = realm
            .filter(|r| !r.is_empty())
            .ok_or_else(|| CheckError::MalformedChallenge(format!("no realm in '{}'", header)))?;
        Url::parse(&realm)
            .map_err(|e| CheckError::MalformedChallenge(format!("realm '{}': {}", realm, e)))?;

        Ok(Self { realm, params })
    }
}

fn parse_query(query: &str) -> Result<Vec<(String, String)>> {
    for pair in query.split('&') {
        if pair.contains(';') || !has_valid_escapes(pair) {
            return Err(CheckError::MalformedChallenge(format!(
                "invalid query component '{}'",
                pair
            )));
        }
    }

    Ok(url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect())
}

fn has_valid_escapes(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .map_or(false, |hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

/// Registry login supplied interactively.
///
/// An empty `username` means the user declined to authenticate.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn declined() -> Self {
        Self::default()
    }

    pub fn is_declined(&self) -> bool {
        self.username.is_empty()
    }

    pub fn basic_header(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.username, self.password));
        format!("Basic {}", encoded)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Token endpoint response. Endpoints disagree on whether the bearer value
/// lives in `token` or `access_token`.
#[derive(Debug, Deserialize)]
pub struct Token {
    token: Option<String>,
    access_token: Option<String>,
    #[allow(dead_code)]
    expires_in: Option<u64>,
    #[allow(dead_code)]
    issued_at: Option<String>,
}

impl Token {
    pub fn bearer(&self) -> Result<&str> {
        [&self.token, &self.access_token]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|t| !t.is_empty())
            .ok_or_else(|| {
                CheckError::TokenDecode("response carries neither token nor access_token".into())
            })
    }
}
