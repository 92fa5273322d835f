//! Dynamic JSON value tree.
//!
//! A [`Wrapper`] holds any JSON value. Dictionary keys are kept in
//! `camelCase` and encoded as `snake_case`; accessors return `Option`s and
//! can optionally coerce between leaf kinds.
//!
//! # Example
//!
//! ```
//! use composable_request_core::wrapper;
//! use composable_request_core::wrapper::Wrapper;
//!
//! let user = wrapper!({ "user_id": 42, "name": "Alice", "bio": Wrapper::Null });
//!
//! assert_eq!(user["userId"].int(false), Some(42));
//! assert!(user["bio"].is_empty());
//! assert_eq!(user.json_representation().unwrap(), r#"{"name":"Alice","user_id":42}"#);
//! ```

use crate::case::{camel_cased, snake_cased};
use crate::error::CodingError;
use chrono::{DateTime, TimeDelta, Utc};
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;
use std::path::Path;
use url::Url;

static EMPTY: Wrapper = Wrapper::Null;

/// A dynamic JSON value.
///
/// Equality is structural: values of different variants never compare
/// equal, so `Int(1) != Double(1.0)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Wrapper {
    /// `null`, also used as the empty sentinel
    #[default]
    Null,
    /// A boolean
    Bool(bool),
    /// An integer
    Int(i64),
    /// A floating point number
    Double(f64),
    /// A string
    String(String),
    /// An ordered list of values
    Array(Vec<Wrapper>),
    /// A dictionary keyed by `camelCase` strings
    Dictionary(BTreeMap<String, Wrapper>),
}

impl Wrapper {
    /// The empty sentinel.
    #[must_use]
    pub const fn empty() -> Self {
        Self::Null
    }

    /// Whether no accessor can produce a value out of `self`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        if matches!(self, Self::Null) {
            return true;
        }
        self.array().is_none()
            && self.bool(false).is_none()
            && self.date(false).is_none()
            && self.dictionary().is_none()
            && self.double(false).is_none()
            && self.int(false).is_none()
            && self.string(false).is_none()
            && self.url().is_none()
    }

    /// `Some(self)` unless empty.
    #[must_use]
    pub fn optional(&self) -> Option<&Self> {
        if self.is_empty() { None } else { Some(self) }
    }

    /// Decode a JSON payload, camel-casing every dictionary key.
    ///
    /// # Errors
    ///
    /// Returns [`CodingError::Decoding`] on malformed or truncated input.
    pub fn decode(data: &[u8]) -> Result<Self, CodingError> {
        serde_json::from_slice(data).map_err(|e| CodingError::Decoding(e.to_string()))
    }

    /// Encode into a JSON payload, snake-casing every dictionary key.
    ///
    /// # Errors
    ///
    /// Returns [`CodingError::Encoding`] if a leaf has no JSON
    /// representation (non-finite doubles).
    pub fn encode(&self) -> Result<Vec<u8>, CodingError> {
        serde_json::to_vec(self).map_err(|e| CodingError::Encoding(e.to_string()))
    }

    /// The JSON text of `self`.
    ///
    /// # Errors
    ///
    /// Same as [`Wrapper::encode`].
    pub fn json_representation(&self) -> Result<String, CodingError> {
        serde_json::to_string(self).map_err(|e| CodingError::Encoding(e.to_string()))
    }

    /// The value stored at `key`, or the empty sentinel.
    ///
    /// `key` is camel-cased like [`insert`](Self::insert) does, so
    /// `"user_id"` and `"userId"` find the same value.
    #[must_use]
    pub fn get(&self, key: &str) -> &Self {
        match self {
            Self::Dictionary(dictionary) => dictionary
                .get(key)
                .or_else(|| dictionary.get(&camel_cased(key)))
                .unwrap_or(&EMPTY),
            _ => &EMPTY,
        }
    }

    /// The value stored at `index`, or the empty sentinel.
    #[must_use]
    pub fn at(&self, index: usize) -> &Self {
        match self {
            Self::Array(array) => array.get(index).unwrap_or(&EMPTY),
            _ => &EMPTY,
        }
    }

    /// Store `value` at `key`. Does nothing unless `self` is a dictionary.
    pub fn insert(&mut self, key: &str, value: impl Into<Self>) {
        if let Self::Dictionary(dictionary) = self {
            dictionary.insert(camel_cased(key), value.into());
        }
    }

    /// Replace the value at `index`. Does nothing unless `self` is an
    /// array long enough to hold it.
    pub fn replace(&mut self, index: usize, value: impl Into<Self>) {
        if let Self::Array(array) = self {
            if let Some(slot) = array.get_mut(index) {
                *slot = value.into();
            }
        }
    }

    /// A copy of `self` with `value` stored at `key`.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Self>) -> Self {
        self.insert(key, value);
        self
    }

    /// The underlying array.
    #[must_use]
    pub fn array(&self) -> Option<&[Self]> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    /// The underlying dictionary.
    #[must_use]
    pub const fn dictionary(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Dictionary(dictionary) => Some(dictionary),
            _ => None,
        }
    }

    /// A boolean. Numbers map to `true` when nonzero; strings are only
    /// read when `converting`.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn bool(&self, converting: bool) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Int(value) => Some(*value != 0),
            Self::Double(value) => Some(*value != 0.0),
            Self::String(string) if converting => match string.to_ascii_lowercase().as_str() {
                "y" | "yes" | "t" | "true" | "1" => Some(true),
                "n" | "no" | "f" | "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// An integer. Doubles are truncated; strings are only parsed when
    /// `converting`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn int(&self, converting: bool) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Double(value) => Some(*value as i64),
            Self::String(string) if converting => string.parse().ok(),
            _ => None,
        }
    }

    /// A double. Strings are only parsed when `converting`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn double(&self, converting: bool) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Double(value) => Some(*value),
            Self::String(string) if converting => string.parse().ok(),
            _ => None,
        }
    }

    /// A string. Numbers are rendered only when `converting`.
    #[must_use]
    pub fn string(&self, converting: bool) -> Option<String> {
        match self {
            Self::String(string) => Some(string.clone()),
            Self::Int(value) if converting => Some(value.to_string()),
            Self::Double(value) if converting => Some(value.to_string()),
            _ => None,
        }
    }

    /// The underlying string slice, without any conversion.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(string) => Some(string),
            _ => None,
        }
    }

    /// A date, as seconds since the Unix epoch.
    ///
    /// See [`Wrapper::date_from`].
    #[must_use]
    pub fn date(&self, converting: bool) -> Option<DateTime<Utc>> {
        self.date_from(DateTime::UNIX_EPOCH, converting)
    }

    /// A date, counting seconds from `reference`.
    ///
    /// Numbers are normalized to seconds by magnitude: anything past ten
    /// integer digits is read as milli-, micro- or nanoseconds. Strings
    /// are only parsed when `converting`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn date_from(&self, reference: DateTime<Utc>, converting: bool) -> Option<DateTime<Utc>> {
        let value = match self {
            Self::Int(value) => *value as f64,
            Self::Double(value) => *value,
            Self::String(string) if converting => string.parse().ok()?,
            _ => return None,
        };
        let seconds = epoch_seconds(value);
        if !seconds.is_finite() {
            return None;
        }
        let delta = TimeDelta::microseconds((seconds * 1_000_000.0).round() as i64);
        reference.checked_add_signed(delta)
    }

    /// A URL. Strings that are not absolute URLs are read as local paths.
    #[must_use]
    pub fn url(&self) -> Option<Url> {
        let string = self.as_str()?;
        Url::parse(string).ok().or_else(|| file_url(string))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn epoch_seconds(value: f64) -> f64 {
    let exponent = (value.log10().floor() - 9.0).max(0.0);
    value / 10f64.powi(exponent as i32)
}

fn file_url(path: &str) -> Option<Url> {
    let path = Path::new(path);
    if path.is_absolute() {
        Url::from_file_path(path).ok()
    } else {
        Url::from_file_path(std::env::current_dir().ok()?.join(path)).ok()
    }
}

impl Index<&str> for Wrapper {
    type Output = Self;

    fn index(&self, key: &str) -> &Self {
        self.get(key)
    }
}

impl Index<usize> for Wrapper {
    type Output = Self;

    fn index(&self, index: usize) -> &Self {
        self.at(index)
    }
}

impl fmt::Display for Wrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}

impl Serialize for Wrapper {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Int(value) => serializer.serialize_i64(*value),
            Self::Double(value) if value.is_finite() => serializer.serialize_f64(*value),
            Self::Double(value) => Err(ser::Error::custom(format!(
                "{value} has no JSON representation"
            ))),
            Self::String(string) => serializer.serialize_str(string),
            Self::Array(array) => {
                let mut sequence = serializer.serialize_seq(Some(array.len()))?;
                for element in array {
                    sequence.serialize_element(element)?;
                }
                sequence.end()
            },
            Self::Dictionary(dictionary) => {
                let mut map = serializer.serialize_map(Some(dictionary.len()))?;
                for (key, value) in dictionary {
                    map.serialize_entry(&snake_cased(key), value)?;
                }
                map.end()
            },
        }
    }
}

impl<'de> Deserialize<'de> for Wrapper {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(WrapperVisitor)
    }
}

struct WrapperVisitor;

impl<'de> Visitor<'de> for WrapperVisitor {
    type Value = Wrapper;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Wrapper, E> {
        Ok(Wrapper::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Wrapper, E> {
        Ok(Wrapper::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Wrapper, D::Error> {
        Wrapper::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Wrapper, E> {
        Ok(Wrapper::Bool(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Wrapper, E> {
        Ok(Wrapper::Int(value))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Wrapper, E> {
        Ok(i64::try_from(value).map_or(Wrapper::Double(value as f64), Wrapper::Int))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Wrapper, E> {
        Ok(Wrapper::Double(value))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Wrapper, E> {
        Ok(Wrapper::String(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Wrapper, E> {
        Ok(Wrapper::String(value))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Wrapper, A::Error> {
        let mut array = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(element) = access.next_element()? {
            array.push(element);
        }
        Ok(Wrapper::Array(array))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Wrapper, A::Error> {
        let mut dictionary = BTreeMap::new();
        while let Some((key, value)) = access.next_entry::<String, Wrapper>()? {
            dictionary.insert(camel_cased(&key), value);
        }
        Ok(Wrapper::Dictionary(dictionary))
    }
}

// Literal construction

impl From<bool> for Wrapper {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Wrapper {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Wrapper {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for Wrapper {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for Wrapper {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Wrapper {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Wrapper {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Wrapper {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Wrapper {
    fn from(values: Vec<T>) -> Self {
        values.into_iter().map(Into::into).collect()
    }
}

/// Collects into an array, dropping empty members.
impl FromIterator<Wrapper> for Wrapper {
    fn from_iter<I: IntoIterator<Item = Wrapper>>(iter: I) -> Self {
        Self::Array(iter.into_iter().filter(|value| !value.is_empty()).collect())
    }
}

/// Collects into a dictionary, dropping empty members and camel-casing keys.
/// The last value wins on duplicate keys.
impl FromIterator<(String, Wrapper)> for Wrapper {
    fn from_iter<I: IntoIterator<Item = (String, Wrapper)>>(iter: I) -> Self {
        Self::Dictionary(
            iter.into_iter()
                .filter(|(_, value)| !value.is_empty())
                .map(|(key, value)| (camel_cased(&key), value))
                .collect(),
        )
    }
}

/// Build a [`Wrapper`] from a literal.
///
/// ```
/// use composable_request_core::wrapper;
///
/// let tags = wrapper!(["a", "b"]);
/// let user = wrapper!({ "name": "Alice", "tags": tags });
/// assert_eq!(user["tags"][1].as_str(), Some("b"));
/// ```
#[macro_export]
macro_rules! wrapper {
    (null) => {
        $crate::wrapper::Wrapper::Null
    };
    ([ $($element:expr),* $(,)? ]) => {
        <$crate::wrapper::Wrapper as ::std::iter::FromIterator<$crate::wrapper::Wrapper>>::from_iter(
            [$($crate::wrapper::Wrapper::from($element)),*]
        )
    };
    ({ $($key:literal : $value:expr),* $(,)? }) => {
        <$crate::wrapper::Wrapper as ::std::iter::FromIterator<(
            ::std::string::String,
            $crate::wrapper::Wrapper,
        )>>::from_iter([$((
            ::std::string::String::from($key),
            $crate::wrapper::Wrapper::from($value),
        )),*])
    };
    ($other:expr) => {
        $crate::wrapper::Wrapper::from($other)
    };
}
