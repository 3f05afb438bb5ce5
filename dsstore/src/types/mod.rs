//! Value-level types shared by the storage layer and the public API.

pub mod cursor;
pub mod four_cc;
pub mod record;
pub mod value;

pub use cursor::{Cursor, CursorError};
pub use four_cc::{FourCC, FourCCError};
pub use record::{Record, compare_filenames};
pub use value::{IconLocation, MacTime, Value, ValueError};
