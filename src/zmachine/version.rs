//! Per-version capabilities
use crate::{error::*, fatal_error};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// What to do with a story file for a version other than 3, 5 or 8
pub enum VersionPolicy {
    /// Refuse to load the story
    Reject,
    /// Run the story with version 3 semantics
    Fallback,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// How the status line is produced
pub enum StatusLine {
    /// The interpreter draws it before each read, from globals 0-2
    Interpreter,
    /// The story draws it in the upper window
    Story,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Capability record for a supported version
pub struct Version {
    number: u8,
    packing: usize,
    object_entry_size: usize,
    property_defaults: usize,
    attributes: u8,
    max_object: usize,
    dictionary_words: usize,
    status_line: StatusLine,
}

const V3: Version = Version {
    number: 3,
    packing: 2,
    object_entry_size: 9,
    property_defaults: 31,
    attributes: 32,
    max_object: 255,
    dictionary_words: 2,
    status_line: StatusLine::Interpreter,
};

const V5: Version = Version {
    number: 5,
    packing: 4,
    object_entry_size: 14,
    property_defaults: 63,
    attributes: 48,
    max_object: 65535,
    dictionary_words: 3,
    status_line: StatusLine::Story,
};

const V8: Version = Version {
    number: 8,
    packing: 8,
    ..V5
};

impl TryFrom<u8> for Version {
    type Error = RuntimeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(V3),
            5 => Ok(V5),
            8 => Ok(V8),
            _ => fatal_error!(
                ErrorCode::UnsupportedVersion,
                "Version {} stories are not supported",
                value
            ),
        }
    }
}

impl Version {
    /// Select the capability record for a story version, applying `policy` to unsupported versions
    ///
    /// # Arguments
    /// * `version` - Version byte from the story header
    /// * `policy` - [VersionPolicy] for versions other than 3, 5, or 8
    ///
    /// # Returns
    /// [Result] with the [Version] or a [RuntimeError]
    pub fn select(version: u8, policy: VersionPolicy) -> Result<Version, RuntimeError> {
        match (Version::try_from(version), policy) {
            (Ok(v), _) => Ok(v),
            (Err(_), VersionPolicy::Fallback) => {
                warn!(target: "app::state", "Version {} story will run with version 3 semantics", version);
                Ok(V3)
            }
            (Err(e), VersionPolicy::Reject) => Err(e),
        }
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    /// Packed address multiplier for routines and strings
    pub fn packing(&self) -> usize {
        self.packing
    }

    pub fn object_entry_size(&self) -> usize {
        self.object_entry_size
    }

    pub fn property_defaults(&self) -> usize {
        self.property_defaults
    }

    /// Number of attributes per object
    pub fn attributes(&self) -> u8 {
        self.attributes
    }

    pub fn max_object(&self) -> usize {
        self.max_object
    }

    /// Encoded words per dictionary entry
    pub fn dictionary_words(&self) -> usize {
        self.dictionary_words
    }

    pub fn status_line(&self) -> StatusLine {
        self.status_line
    }
}
