#![forbid(unsafe_code)]

//! Stable caller-facing tags.
//!
//! The engine's internal status enums are mapped onto these before anything
//! reaches the caller, so engine upgrades cannot leak new states through the
//! callback surface.

use crate::{
    engine::EngineStatus,
    types::EngineKeyStatus,
};

/// Stable key-status tag delivered per key on every status update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyStatusTag {
    Usable,
    Expired,
    OutputRestricted,
    StatusPending,
    InternalError,
    Released,
    Unknown,
}

impl KeyStatusTag {
    /// Stable string form of the tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Usable => "Usable",
            Self::Expired => "Expired",
            Self::OutputRestricted => "OutputRestricted",
            Self::StatusPending => "StatusPending",
            Self::InternalError => "InternalError",
            Self::Released => "Released",
            Self::Unknown => "Unknown",
        }
    }
}

impl From<EngineKeyStatus> for KeyStatusTag {
    fn from(status: EngineKeyStatus) -> Self {
        match status {
            EngineKeyStatus::Usable => Self::Usable,
            EngineKeyStatus::Expired => Self::Expired,
            EngineKeyStatus::OutputRestricted => Self::OutputRestricted,
            EngineKeyStatus::StatusPending => Self::StatusPending,
            EngineKeyStatus::InternalError => Self::InternalError,
            EngineKeyStatus::Released => Self::Released,
        }
    }
}

/// Stable tag for a generic key error reported to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionErrorTag {
    NeedsDeviceCertificate,
    SessionNotFound,
    DecryptError,
    TypeError,
    QuotaExceeded,
    NotSupported,
    UnexpectedError,
}

impl SessionErrorTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NeedsDeviceCertificate => "NeedsDeviceCertificate",
            Self::SessionNotFound => "SessionNotFound",
            Self::DecryptError => "DecryptError",
            Self::TypeError => "TypeError",
            Self::QuotaExceeded => "QuotaExceeded",
            Self::NotSupported => "NotSupported",
            Self::UnexpectedError => "UnexpectedError",
        }
    }
}

impl From<EngineStatus> for SessionErrorTag {
    fn from(status: EngineStatus) -> Self {
        match status {
            EngineStatus::NeedsDeviceCertificate => Self::NeedsDeviceCertificate,
            EngineStatus::SessionNotFound => Self::SessionNotFound,
            EngineStatus::DecryptError => Self::DecryptError,
            EngineStatus::TypeError => Self::TypeError,
            EngineStatus::QuotaExceeded => Self::QuotaExceeded,
            EngineStatus::NotSupported => Self::NotSupported,
            EngineStatus::Unexpected => Self::UnexpectedError,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(EngineKeyStatus::Usable, KeyStatusTag::Usable, "Usable")]
    #[case(EngineKeyStatus::Expired, KeyStatusTag::Expired, "Expired")]
    #[case(
        EngineKeyStatus::OutputRestricted,
        KeyStatusTag::OutputRestricted,
        "OutputRestricted"
    )]
    #[case(EngineKeyStatus::StatusPending, KeyStatusTag::StatusPending, "StatusPending")]
    #[case(EngineKeyStatus::InternalError, KeyStatusTag::InternalError, "InternalError")]
    #[case(EngineKeyStatus::Released, KeyStatusTag::Released, "Released")]
    fn key_status_mapping(
        #[case] status: EngineKeyStatus,
        #[case] tag: KeyStatusTag,
        #[case] text: &str,
    ) {
        assert_eq!(KeyStatusTag::from(status), tag);
        assert_eq!(tag.as_str(), text);
    }

    #[rstest]
    #[case(EngineStatus::NeedsDeviceCertificate, "NeedsDeviceCertificate")]
    #[case(EngineStatus::SessionNotFound, "SessionNotFound")]
    #[case(EngineStatus::DecryptError, "DecryptError")]
    #[case(EngineStatus::TypeError, "TypeError")]
    #[case(EngineStatus::QuotaExceeded, "QuotaExceeded")]
    #[case(EngineStatus::NotSupported, "NotSupported")]
    #[case(EngineStatus::Unexpected, "UnexpectedError")]
    fn error_tag_mapping(#[case] status: EngineStatus, #[case] text: &str) {
        assert_eq!(SessionErrorTag::from(status).as_str(), text);
    }
}
