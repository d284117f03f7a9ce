//! Core value types shared by the decoder

pub mod handle;
pub mod julian_date;
pub mod version;

pub use handle::{Handle, HandleReference};
pub use julian_date::{CalendarTime, JulianDate, TimestampError};
pub use version::DwgVersion;
