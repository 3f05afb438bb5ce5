//! Store configuration.
//!
//! # Environment Variables
//!
//! - `DSSTORE_PAGE_SIZE`: node size for newly created stores (default: `4096`)
//!
//! # Invariants
//!
//! - `page_size` is a power of two between `MIN_PAGE_SIZE` and `MAX_PAGE_SIZE`

/// Configuration for creating stores.
///
/// Opening an existing store always uses the page size recorded in the
/// file; the configured value only applies to new files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Size in bytes of each B-tree node block.
    pub page_size: u32,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl StoreConfig {
    /// Page size Finder uses.
    pub const DEFAULT_PAGE_SIZE: u32 = 4096;
    pub const MIN_PAGE_SIZE: u32 = 512;
    pub const MAX_PAGE_SIZE: u32 = 65536;

    const PAGE_SIZE_VAR: &'static str = "DSSTORE_PAGE_SIZE";

    /// Configuration with a given page size, validated.
    pub fn with_page_size(page_size: u32) -> Result<Self, ConfigError> {
        if !Self::is_valid_page_size(page_size) {
            return Err(ConfigError::InvalidValue {
                name: "page_size".to_string(),
                message: Self::page_size_message(&page_size.to_string()),
            });
        }
        Ok(Self { page_size })
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `DSSTORE_PAGE_SIZE` is set but is not a power of
    /// two in range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            page_size: Self::load_page_size(std::env::var(Self::PAGE_SIZE_VAR).ok())?,
        })
    }

    fn load_page_size(value: Option<String>) -> Result<u32, ConfigError> {
        let Some(value) = value else {
            return Ok(Self::DEFAULT_PAGE_SIZE);
        };
        match value.trim().parse::<u32>() {
            Ok(size) if Self::is_valid_page_size(size) => Ok(size),
            _ => Err(ConfigError::InvalidValue {
                name: Self::PAGE_SIZE_VAR.to_string(),
                message: Self::page_size_message(&value),
            }),
        }
    }

    /// Whether `size` can be used as a node size.
    #[must_use]
    pub const fn is_valid_page_size(size: u32) -> bool {
        size.is_power_of_two() && size >= Self::MIN_PAGE_SIZE && size <= Self::MAX_PAGE_SIZE
    }

    fn page_size_message(value: &str) -> String {
        format!(
            "'{value}' is not a power of two between {} and {}",
            Self::MIN_PAGE_SIZE,
            Self::MAX_PAGE_SIZE
        )
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}
