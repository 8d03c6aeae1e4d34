use serde::{Deserialize, Serialize};

use crate::Error;

/// The protocol version a stream declares in its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Version {
    /// Type references inside payloads are absolute type ids.
    V80 = 0x80,
    /// Type references index a list sent in each value message header.
    #[default]
    V81 = 0x81,
}

impl Version {
    pub fn byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Version {
    type Error = Error;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            0x80 => Ok(Version::V80),
            0x81 => Ok(Version::V81),
            b => Err(Error::UnsupportedVersion(b)),
        }
    }
}

/// Options shared by encoders and decoders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub version: Version,
    /// Largest length prefix a decoder accepts before reading a payload.
    pub max_message_len: usize,
    /// Deepest nesting of composite values a decoder walks.
    pub max_depth: usize,
    /// Most type descriptions one inbound type stream may send.
    pub max_types: usize,
}

pub(crate) const DEFAULT_MAX_DEPTH: usize = 128;

impl Default for Config {
    fn default() -> Self {
        Config {
            version: Version::default(),
            max_message_len: 64 << 20,
            max_depth: DEFAULT_MAX_DEPTH,
            max_types: 1 << 16,
        }
    }
}

impl Config {
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn with_max_message_len(mut self, max: usize) -> Self {
        self.max_message_len = max;
        self
    }

    pub fn with_max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }

    pub fn with_max_types(mut self, max: usize) -> Self {
        self.max_types = max;
        self
    }
}
