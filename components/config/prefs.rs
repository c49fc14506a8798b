/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Preferences that control the session history and the back/forward page
//! cache. There is one process-wide set of preferences, read through [`get`]
//! and replaced through [`set`].

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use log::debug;
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};

static PREFERENCES: LazyLock<RwLock<Preferences>> =
    LazyLock::new(|| RwLock::new(Preferences::default()));

/// Get a read-only handle to the current preferences. Do not hold on to the
/// guard across a call to [`set`].
#[inline]
pub fn get() -> RwLockReadGuard<'static, Preferences> {
    PREFERENCES.read()
}

/// Replace the current preferences.
pub fn set(preferences: Preferences) {
    *PREFERENCES.write() = preferences;
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl PrefValue {
    fn type_name(&self) -> &'static str {
        match self {
            PrefValue::Bool(_) => "bool",
            PrefValue::Int(_) => "int",
            PrefValue::Str(_) => "string",
        }
    }
}

impl From<bool> for PrefValue {
    fn from(value: bool) -> Self {
        PrefValue::Bool(value)
    }
}

impl From<i64> for PrefValue {
    fn from(value: i64) -> Self {
        PrefValue::Int(value)
    }
}

impl From<String> for PrefValue {
    fn from(value: String) -> Self {
        PrefValue::Str(value)
    }
}

impl From<&str> for PrefValue {
    fn from(value: &str) -> Self {
        PrefValue::Str(value.to_owned())
    }
}

#[derive(Debug)]
pub enum PrefError {
    /// No preference with this name exists.
    UnknownPreference(String),
    /// The preference exists, but holds a different type of value.
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    /// A preferences file could not be parsed.
    Json(serde_json::Error),
}

impl fmt::Display for PrefError {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PrefError::UnknownPreference(name) => write!(formatter, "unknown preference {name:?}"),
            PrefError::TypeMismatch {
                name,
                expected,
                found,
            } => write!(
                formatter,
                "preference {name:?} expects a {expected} value but got a {found}"
            ),
            PrefError::Json(error) => write!(formatter, "invalid preferences file: {error}"),
        }
    }
}

impl std::error::Error for PrefError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PrefError::Json(error) => Some(error),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PrefError {
    fn from(error: serde_json::Error) -> Self {
        PrefError::Json(error)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Preferences {
    /// The maximum number of pages held by the back/forward page cache. Zero
    /// disables the page cache entirely. Negative values are treated as zero.
    pub page_cache_capacity: i64,
    /// How long a cached page stays eligible for restore, in milliseconds.
    /// Zero keeps pages until they are evicted by capacity.
    pub page_cache_expiration_ms: i64,
    /// Whether pages containing plugins may enter the page cache.
    pub page_cache_supports_plugins: bool,
    /// The maximum number of entries in a page's back/forward list.
    pub session_history_max_length: i64,
    pub session_history_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            page_cache_capacity: 3,
            page_cache_expiration_ms: 30 * 60 * 1000,
            page_cache_supports_plugins: false,
            session_history_max_length: 100,
            session_history_enabled: true,
        }
    }
}

impl Preferences {
    /// Parse a JSON object of preferences. Any preference missing from the
    /// object keeps its default value.
    pub fn from_json_str(json: &str) -> Result<Self, PrefError> {
        let preferences: Preferences = serde_json::from_str(json)?;
        debug!("Loaded preferences {preferences:?}");
        Ok(preferences)
    }

    pub fn exists(name: &str) -> bool {
        matches!(
            name,
            "page_cache_capacity" |
                "page_cache_expiration_ms" |
                "page_cache_supports_plugins" |
                "session_history_max_length" |
                "session_history_enabled"
        )
    }

    pub fn get_value(&self, name: &str) -> Option<PrefValue> {
        let value = match name {
            "page_cache_capacity" => self.page_cache_capacity.into(),
            "page_cache_expiration_ms" => self.page_cache_expiration_ms.into(),
            "page_cache_supports_plugins" => self.page_cache_supports_plugins.into(),
            "session_history_max_length" => self.session_history_max_length.into(),
            "session_history_enabled" => self.session_history_enabled.into(),
            _ => return None,
        };
        Some(value)
    }

    pub fn set_value(&mut self, name: &str, value: PrefValue) -> Result<(), PrefError> {
        let mismatch = |expected: &'static str, value: &PrefValue| PrefError::TypeMismatch {
            name: name.to_owned(),
            expected,
            found: value.type_name(),
        };
        match (name, value) {
            ("page_cache_capacity", PrefValue::Int(value)) => self.page_cache_capacity = value,
            ("page_cache_expiration_ms", PrefValue::Int(value)) => {
                self.page_cache_expiration_ms = value
            },
            ("page_cache_supports_plugins", PrefValue::Bool(value)) => {
                self.page_cache_supports_plugins = value
            },
            ("session_history_max_length", PrefValue::Int(value)) => {
                self.session_history_max_length = value
            },
            ("session_history_enabled", PrefValue::Bool(value)) => {
                self.session_history_enabled = value
            },
            (
                "page_cache_capacity" | "page_cache_expiration_ms" | "session_history_max_length",
                value,
            ) => return Err(mismatch("int", &value)),
            ("page_cache_supports_plugins" | "session_history_enabled", value) => {
                return Err(mismatch("bool", &value));
            },
            (name, _) => return Err(PrefError::UnknownPreference(name.to_owned())),
        }
        Ok(())
    }

    /// The page cache capacity, clamped to be non-negative.
    pub fn page_cache_capacity(&self) -> usize {
        usize::try_from(self.page_cache_capacity.max(0)).unwrap_or(usize::MAX)
    }

    /// The time-to-live of a cached page, or `None` if pages never expire.
    pub fn page_cache_expiration(&self) -> Option<Duration> {
        match u64::try_from(self.page_cache_expiration_ms) {
            Ok(0) | Err(_) => None,
            Ok(milliseconds) => Some(Duration::from_millis(milliseconds)),
        }
    }

    pub fn session_history_max_length(&self) -> usize {
        usize::try_from(self.session_history_max_length.max(0)).unwrap_or(usize::MAX)
    }
}
