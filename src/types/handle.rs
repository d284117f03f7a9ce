//! Handle types for DWG objects
//!
//! Handles are file-unique identifiers for every object stored in a drawing.
//! Objects refer to each other through handle references that carry a code
//! telling whether the value is absolute or an offset from the referring
//! object's own handle.

use std::fmt;

/// A file-unique object identifier
///
/// Handle 0 is reserved and never identifies an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Handle(u64);

impl Handle {
    /// The null handle (0)
    pub const NULL: Handle = Handle(0);

    /// Create a new handle from a u64 value
    #[inline]
    pub const fn new(value: u64) -> Self {
        Handle(value)
    }

    /// Get the raw u64 value
    #[inline]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Check if this is the null handle
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Handle {
    fn from(value: u64) -> Self {
        Handle(value)
    }
}

impl From<Handle> for u64 {
    fn from(handle: Handle) -> Self {
        handle.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#X}", self.0)
    }
}

/// A handle reference as stored in an object's handle stream
///
/// `code` is the high nibble of the first byte, `value` the raw counter
/// bytes that follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleReference {
    pub code: u8,
    pub value: u64,
}

impl HandleReference {
    pub const fn new(code: u8, value: u64) -> Self {
        Self { code, value }
    }

    /// Resolve the reference against the handle of the object containing it.
    ///
    /// Codes 2..=5 are absolute. Codes 6, 8, 0xA and 0xC are relative to
    /// `base`. Returns `None` for a null reference or an unknown code.
    pub fn resolve(&self, base: Handle) -> Option<Handle> {
        let b = base.value();
        let resolved = match self.code {
            0x2..=0x5 => self.value,
            0x6 => b.checked_add(1)?,
            0x8 => b.checked_sub(1)?,
            0xA => b.checked_add(self.value)?,
            0xC => b.checked_sub(self.value)?,
            _ => return None,
        };
        if resolved == 0 {
            None
        } else {
            Some(Handle(resolved))
        }
    }
}
