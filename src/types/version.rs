//! DWG format revisions

use std::fmt;

use crate::error::{DwgError, Result};

/// Supported DWG revisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DwgVersion {
    /// AutoCAD 2004-2006
    R18,
    /// AutoCAD 2007-2009
    R21,
}

impl DwgVersion {
    /// Identify the revision from the first six bytes of a file.
    ///
    /// Anything that is not `AC1018` or `AC1021` fails with
    /// [`DwgError::UnsupportedVersion`]. Later revisions are recognised by
    /// name in the message so the diagnosis is clear.
    pub fn from_magic(raw: &[u8]) -> Result<Self> {
        let magic = raw.get(..6).ok_or_else(|| {
            DwgError::UnsupportedVersion(format!("file too short ({} bytes)", raw.len()))
        })?;

        match magic {
            b"AC1018" => Ok(DwgVersion::R18),
            b"AC1021" => Ok(DwgVersion::R21),
            b"AC1024" | b"AC1027" | b"AC1032" => Err(DwgError::UnsupportedVersion(format!(
                "{} (R24 and later are not implemented)",
                String::from_utf8_lossy(magic)
            ))),
            other => Err(DwgError::UnsupportedVersion(
                other
                    .iter()
                    .map(|&b| {
                        if b.is_ascii_graphic() {
                            (b as char).to_string()
                        } else {
                            format!("\\x{:02X}", b)
                        }
                    })
                    .collect(),
            )),
        }
    }

    /// The six-character magic string
    pub fn magic(&self) -> &'static str {
        match self {
            DwgVersion::R18 => "AC1018",
            DwgVersion::R21 => "AC1021",
        }
    }

    /// Strings in R21 sections are UTF-16
    pub fn is_unicode(&self) -> bool {
        matches!(self, DwgVersion::R21)
    }
}

impl fmt::Display for DwgVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.magic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_magic() {
        assert_eq!(DwgVersion::from_magic(b"AC1018\0\0").unwrap(), DwgVersion::R18);
        assert_eq!(DwgVersion::from_magic(b"AC1021").unwrap(), DwgVersion::R21);
    }

    #[test]
    fn test_later_revisions_rejected() {
        let err = DwgVersion::from_magic(b"AC1032").unwrap_err();
        assert!(matches!(err, DwgError::UnsupportedVersion(ref m) if m.contains("AC1032")));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            DwgVersion::from_magic(b"PK\x03\x04zz"),
            Err(DwgError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            DwgVersion::from_magic(b"AC10"),
            Err(DwgError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(DwgVersion::R21.to_string(), "AC1021");
        assert!(DwgVersion::R21.is_unicode());
        assert!(!DwgVersion::R18.is_unicode());
    }
}
