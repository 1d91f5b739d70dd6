//! Wire encodings for request parameters.
//!
//! # Design
//! Chatwork takes GET parameters as a query string and everything else as a
//! form body, with booleans as `1`/`0` and id lists as comma-joined strings.
//! Query strings and form bodies are percent-encoded the same way, so a value
//! means the same thing whichever side of the `?` it lands on.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

/// One account id or a list of them, sent as `"1,2,3"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "OneOrMany")]
pub struct AccountIds(Vec<u64>);

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(u64),
    Many(Vec<u64>),
}

impl From<OneOrMany> for AccountIds {
    fn from(ids: OneOrMany) -> Self {
        match ids {
            OneOrMany::One(id) => AccountIds(vec![id]),
            OneOrMany::Many(ids) => AccountIds(ids),
        }
    }
}

impl AccountIds {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AccountIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

impl From<u64> for AccountIds {
    fn from(id: u64) -> Self {
        AccountIds(vec![id])
    }
}

impl From<Vec<u64>> for AccountIds {
    fn from(ids: Vec<u64>) -> Self {
        AccountIds(ids)
    }
}

impl From<&[u64]> for AccountIds {
    fn from(ids: &[u64]) -> Self {
        AccountIds(ids.to_vec())
    }
}

impl<const N: usize> From<[u64; N]> for AccountIds {
    fn from(ids: [u64; N]) -> Self {
        AccountIds(ids.to_vec())
    }
}

impl FromIterator<u64> for AccountIds {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        AccountIds(iter.into_iter().collect())
    }
}

/// A task deadline in epoch seconds.
///
/// Hosts sometimes hand numbers over in exponential notation (`1.7e9`); the
/// API only accepts digits, so every constructor normalises to an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawDeadline")]
pub struct Deadline(u64);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDeadline {
    Secs(u64),
    Float(f64),
    Text(String),
}

impl TryFrom<RawDeadline> for Deadline {
    type Error = ApiError;

    fn try_from(raw: RawDeadline) -> Result<Self, Self::Error> {
        match raw {
            RawDeadline::Secs(secs) => Ok(Deadline(secs)),
            RawDeadline::Float(secs) => Deadline::from_f64(secs),
            RawDeadline::Text(text) => text.parse(),
        }
    }
}

const DEADLINE_FORMAT: &[&str] = &["epoch seconds"];

impl Deadline {
    pub fn from_f64(secs: f64) -> Result<Self, ApiError> {
        if !secs.is_finite() || secs < 0.0 || secs > u64::MAX as f64 {
            return Err(ApiError::InvalidParameter {
                name: "limit",
                value: secs.to_string(),
                allowed: DEADLINE_FORMAT,
            });
        }
        Ok(Deadline(secs.round() as u64))
    }

    pub fn as_secs(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Deadline {
    fn from(secs: u64) -> Self {
        Deadline(secs)
    }
}

impl From<u32> for Deadline {
    fn from(secs: u32) -> Self {
        Deadline(u64::from(secs))
    }
}

impl FromStr for Deadline {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(secs) = trimmed.parse::<u64>() {
            return Ok(Deadline(secs));
        }
        let secs = trimmed.parse::<f64>().map_err(|_| ApiError::InvalidParameter {
            name: "limit",
            value: s.to_string(),
            allowed: DEADLINE_FORMAT,
        })?;
        Deadline::from_f64(secs)
    }
}

/// Wire form of a boolean flag.
pub fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// A value that may appear in a query string. `None` means "leave it out":
/// zero, the empty string, and `false` are all omitted.
pub trait QueryValue {
    fn query_value(&self) -> Option<String>;
}

impl QueryValue for u64 {
    fn query_value(&self) -> Option<String> {
        (*self != 0).then(|| self.to_string())
    }
}

impl QueryValue for bool {
    fn query_value(&self) -> Option<String> {
        (*self).then(|| flag(true).to_string())
    }
}

impl QueryValue for &str {
    fn query_value(&self) -> Option<String> {
        (!self.is_empty()).then(|| self.to_string())
    }
}

impl QueryValue for String {
    fn query_value(&self) -> Option<String> {
        self.as_str().query_value()
    }
}

impl<T: QueryValue> QueryValue for Option<T> {
    fn query_value(&self) -> Option<String> {
        self.as_ref().and_then(QueryValue::query_value)
    }
}

/// Builder for the `?key=value&...` suffix of GET requests.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pairs: Vec<(&'static str, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: &'static str, value: impl QueryValue) -> Self {
        if let Some(value) = value.query_value() {
            self.pairs.push((key, value));
        }
        self
    }

    /// `""` when nothing survived, otherwise `?` plus the pairs in insertion
    /// order.
    pub fn finish(&self) -> String {
        if self.pairs.is_empty() {
            return String::new();
        }
        format!("?{}", encode_pairs(&self.pairs))
    }
}

/// Ordered `application/x-www-form-urlencoded` body.
#[derive(Debug, Clone, Default)]
pub struct Form {
    pairs: Vec<(&'static str, String)>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.pairs.push((key, value.to_string()));
        self
    }

    /// Adds the field only when a value is present.
    pub fn optional<V: fmt::Display>(self, key: &'static str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.field(key, value),
            None => self,
        }
    }

    /// Adds `1`/`0` when the flag is set; an unset flag stays absent.
    pub fn flag(self, key: &'static str, value: Option<bool>) -> Self {
        self.optional(key, value.map(flag))
    }

    /// Adds a comma-joined id list unless it is empty.
    pub fn ids(self, key: &'static str, ids: &AccountIds) -> Self {
        if ids.is_empty() {
            return self;
        }
        self.field(key, ids)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn encode(&self) -> String {
        encode_pairs(&self.pairs)
    }
}

fn encode_pairs(pairs: &[(&'static str, String)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// `multipart/form-data` body for file uploads.
#[derive(Debug, Clone)]
pub struct Multipart {
    boundary: String,
    body: Vec<u8>,
}

impl Default for Multipart {
    fn default() -> Self {
        Self::new()
    }
}

impl Multipart {
    pub fn new() -> Self {
        Self::with_boundary(format!("chatwork-{}", Uuid::new_v4().simple()))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            body: Vec::new(),
        }
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.open_part(&format!("Content-Disposition: form-data; name=\"{}\"", quote(name)));
        self.body.extend_from_slice(b"\r\n");
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, content: &[u8]) -> Self {
        self.open_part(&format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
            quote(name),
            quote(filename)
        ));
        self.body
            .extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.body
    }

    fn open_part(&mut self, disposition: &str) {
        self.body
            .extend_from_slice(format!("--{}\r\n{disposition}\r\n", self.boundary).as_bytes());
    }
}

fn quote(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_lists_join_without_spaces() {
        assert_eq!(AccountIds::from(vec![1, 2, 3]).to_string(), "1,2,3");
        assert_eq!(AccountIds::from(42).to_string(), "42");
        assert_eq!(AccountIds::from([7, 8]).to_string(), "7,8");
    }

    #[test]
    fn deadline_from_exponential_string() {
        let deadline: Deadline = "1.7e9".parse().unwrap();
        assert_eq!(deadline.to_string(), "1700000000");
    }

    #[test]
    fn deadline_from_float() {
        assert_eq!(Deadline::from_f64(1.5e9).unwrap().to_string(), "1500000000");
        assert!(matches!(
            Deadline::from_f64(f64::NAN),
            Err(ApiError::InvalidParameter { name: "limit", .. })
        ));
        assert!(matches!(
            Deadline::from_f64(-1.0),
            Err(ApiError::InvalidParameter { name: "limit", .. })
        ));
    }

    #[test]
    fn deadline_rejects_garbage() {
        assert!(matches!(
            "tomorrow".parse::<Deadline>(),
            Err(ApiError::InvalidParameter { name: "limit", .. })
        ));
    }

    #[test]
    fn query_drops_falsy_values() {
        let query = Query::new().param("status", "open").param("account_id", 0u64);
        assert_eq!(query.finish(), "?status=open");
    }

    #[test]
    fn query_empty_when_nothing_set() {
        let query = Query::new()
            .param("force", false)
            .param("status", None::<&str>)
            .param("name", "");
        assert_eq!(query.finish(), "");
    }

    #[test]
    fn query_keeps_insertion_order_and_encodes() {
        let query = Query::new()
            .param("b", 2u64)
            .param("a", "x y&z")
            .param("force", true);
        assert_eq!(query.finish(), "?b=2&a=x%20y%26z&force=1");
    }

    #[test]
    fn form_flags_and_optionals() {
        let form = Form::new()
            .field("body", "hello world")
            .flag("self_unread", Some(false))
            .flag("force", None)
            .optional("description", None::<&str>)
            .ids("to_ids", &AccountIds::from(vec![1, 2]));
        assert_eq!(form.encode(), "body=hello%20world&self_unread=0&to_ids=1%2C2");
        assert_eq!(form.get("to_ids"), Some("1,2"));
        assert_eq!(form.get("force"), None);
    }

    #[test]
    fn multipart_layout() {
        let body = Multipart::with_boundary("XYZ")
            .file("file", "a\"b.txt", "text/plain", b"data")
            .text("message", "hi")
            .finish();
        let text = String::from_utf8(body).unwrap();
        assert_eq!(
            text,
            "--XYZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a%22b.txt\"\r\n\
             Content-Type: text/plain\r\n\r\ndata\r\n\
             --XYZ\r\nContent-Disposition: form-data; name=\"message\"\r\n\r\nhi\r\n\
             --XYZ--\r\n"
        );
    }
}
