#![forbid(unsafe_code)]

//! Shared vocabulary for the engine boundary.

use std::{collections::BTreeMap, fmt};

use bytes::Bytes;

/// Engine-assigned session identifier.
///
/// Unique among live sessions while registered. The registry treats it as an
/// opaque key; only the engine mints new ones.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// License persistence class requested for a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LicenseType {
    #[default]
    Temporary = 0,
    PersistentUsageRecord = 1,
    PersistentLicense = 2,
}

impl LicenseType {
    /// Map an external license-type code.
    ///
    /// Unrecognized codes fall back to [`LicenseType::Temporary`].
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::PersistentUsageRecord,
            2 => Self::PersistentLicense,
            _ => Self::Temporary,
        }
    }
}

/// Container format of the initialization data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InitDataType {
    #[default]
    Cenc,
    WebM,
}

impl InitDataType {
    /// Parse the external type string (`"cenc"` / `"webm"`).
    ///
    /// Returns `None` for an unrecognized value so the caller can leave its
    /// prior default in place.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cenc" => Some(Self::Cenc),
            "webm" => Some(Self::WebM),
            _ => None,
        }
    }
}

/// Kind of an engine-emitted license message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    LicenseRequest = 0,
    LicenseRenewal = 1,
    LicenseRelease = 2,
    IndividualizationRequest = 3,
}

impl MessageType {
    /// Numeric code used as the outgoing message tag prefix.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Usability state the engine reports for one decryption key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineKeyStatus {
    Usable,
    Expired,
    OutputRestricted,
    StatusPending,
    InternalError,
    Released,
}

/// Key identifier to status, as reported by the engine for one session.
///
/// Ordered so that "first key" is deterministic.
pub type KeyStatusMap = BTreeMap<Bytes, EngineKeyStatus>;
