//! One forensic examination of one file.
//!
//! A [`DwgSession`] owns the file bytes and the decoded document. Decoding
//! happens once, when the session is created; the three operations then
//! read from the result.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::document::DwgDocument;
use crate::error::Result;
use crate::handle_distribution::HandleDistribution;
use crate::io::dwg::reader::{DwgReader, DwgReaderConfiguration};
use crate::metadata::{extract_metadata, MetadataRecord};
use crate::report::ValidationReport;

pub struct DwgSession {
    path: Option<PathBuf>,
    raw: Vec<u8>,
    document: DwgDocument,
    /// Findings of the decode pass
    findings: ValidationReport,
}

impl DwgSession {
    /// Load and decode a file with the default configuration.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, DwgReaderConfiguration::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, config: DwgReaderConfiguration) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read(path)?;
        debug!(path = %path.display(), size = raw.len(), "loaded file");
        let mut session = Self::from_bytes(raw, config)?;
        session.path = Some(path.to_path_buf());
        Ok(session)
    }

    /// Decode a file already in memory.
    ///
    /// Fails only when the version is unsupported or the section table
    /// cannot be located (or on any localized error with failsafe off).
    pub fn from_bytes(raw: Vec<u8>, config: DwgReaderConfiguration) -> Result<Self> {
        let mut findings = ValidationReport::new();
        let document = DwgReader::new(&raw)
            .with_config(config)
            .read(&mut findings)?;
        info!(
            version = %document.version(),
            issues = findings.issues().len(),
            "decoded file"
        );
        Ok(Self {
            path: None,
            raw,
            document,
            findings,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn document(&self) -> &DwgDocument {
        &self.document
    }

    /// Structural report: every decode finding plus the metadata checks.
    pub fn validate(&self) -> ValidationReport {
        let mut report = self.findings.clone();
        extract_metadata(&self.document, &mut report);
        report
    }

    pub fn extract_metadata(&self) -> MetadataRecord {
        let mut scratch = ValidationReport::new();
        extract_metadata(&self.document, &mut scratch)
    }

    pub fn handle_distribution(&self) -> HandleDistribution {
        HandleDistribution::from_records(&self.document.objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DwgError;
    use std::io::Write;

    #[test]
    fn test_open_missing_file() {
        let err = DwgSession::open("/nonexistent/drawing.dwg").err().unwrap();
        assert!(matches!(err, DwgError::Io(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unsupported_version_gives_no_session() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut raw = vec![0u8; 0x200];
        raw[..6].copy_from_slice(b"AC1015");
        file.write_all(&raw).unwrap();

        let err = DwgSession::open(file.path()).err().unwrap();
        assert!(matches!(err, DwgError::UnsupportedVersion(ref v) if v == "AC1015"));
    }
}
