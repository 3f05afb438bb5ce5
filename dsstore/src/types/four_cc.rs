//! Four-character codes.
//!
//! Attribute codes (`Iloc`, `bwsp`, `cmmt`, ...) and value type tags
//! (`bool`, `ustr`, ...) are both stored as four raw bytes.

use std::fmt;
use std::str::FromStr;

/// A four-byte tag, compared bytewise.
///
/// # Invariants
///
/// - Always exactly 4 bytes; no encoding is assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// The smallest possible code, used as a lower bound when searching all
    /// codes of a filename.
    pub const MIN: Self = Self([0; 4]);

    /// Icon location within the window (`blob`, see `IconLocation`).
    pub const ICON_LOCATION: Self = Self(*b"Iloc");
    /// Spotlight comment (`ustr`).
    pub const COMMENT: Self = Self(*b"cmmt");
    /// Browser window settings (`blob`, binary plist).
    pub const BROWSER_WINDOW: Self = Self(*b"bwsp");
    /// Icon view properties (`blob`, binary plist).
    pub const ICON_VIEW: Self = Self(*b"icvp");
    /// View style (`type`).
    pub const VIEW_STYLE: Self = Self(*b"vstl");
    /// Logical size (`comp`).
    pub const LOGICAL_SIZE: Self = Self(*b"lg1S");
    /// Modification date (`dutc`).
    pub const MODIFICATION_DATE: Self = Self(*b"moDD");

    /// Create a code from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(bytes: &[u8; 4]) -> Self {
        Self(*bytes)
    }
}

impl FromStr for FourCC {
    type Err = FourCCError;

    /// Parse a code from text. The text must be exactly four bytes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| FourCCError::InvalidLength(s.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Latin-1, one char per byte, so non-ASCII tags still print losslessly.
        for &b in &self.0 {
            write!(f, "{}", char::from(b))?;
        }
        Ok(())
    }
}

/// Error returned when parsing a `FourCC` from text fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FourCCError {
    /// The text was not exactly four bytes long.
    InvalidLength(usize),
}

impl fmt::Display for FourCCError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength(len) => {
                write!(f, "four-character code must be 4 bytes, got {len}")
            }
        }
    }
}

impl std::error::Error for FourCCError {}
