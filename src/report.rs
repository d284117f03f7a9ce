//! Validation findings.
//!
//! Every check the decoder performs leaves a [`Finding`] in a
//! [`ValidationReport`]. Localized decode errors are turned into findings at
//! the call site through [`ValidationReport::record_error`] so one broken
//! section, page or object never hides the rest of the file.

use std::fmt;

use tracing::warn;

use crate::error::DwgError;

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Pass,
    Fail,
    Warning,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
            Self::Warning => write!(f, "WARN"),
        }
    }
}

/// Category of a non-passing finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FindingKind {
    /// A structure could not be parsed (bad sentinel, truncated field).
    SyntaxError,
    /// A stored checksum or CRC does not match the computed value.
    InvalidCrc,
    /// A section name that no DWG writer produces.
    UnknownSection,
    /// An object type code that is neither built in nor a registered class.
    UnknownObject,
    /// Bytes outside every referenced structure: non-zero padding, slack
    /// space, records the handle map does not list.
    UnusedArea,
    /// Values that are internally inconsistent (offsets, ids, sizes).
    Corrupted,
    /// A handle reference to an object that does not exist.
    UnresolvedReference,
    /// A page-map gap or a hole in the handle sequence.
    HandleGap,
    /// A stored timestamp that is not a valid calendar time.
    TimestampRange,
    /// A stored integrity value that is kept but not recomputed.
    Unverified,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SyntaxError => "SyntaxError",
            Self::InvalidCrc => "InvalidCrc",
            Self::UnknownSection => "UnknownSection",
            Self::UnknownObject => "UnknownObject",
            Self::UnusedArea => "UnusedArea",
            Self::Corrupted => "Corrupted",
            Self::UnresolvedReference => "UnresolvedReference",
            Self::HandleGap => "HandleGap",
            Self::TimestampRange => "TimestampRange",
            Self::Unverified => "Unverified",
        };
        f.write_str(name)
    }
}

/// A single check result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Name of the check, usually the section or structure it concerns.
    pub check: String,
    pub outcome: Outcome,
    /// `None` for passing checks.
    pub kind: Option<FindingKind>,
    pub detail: String,
    /// Absolute file offset or section-relative offset the finding points at.
    pub offset: Option<u64>,
}

impl Finding {
    pub fn pass(check: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            outcome: Outcome::Pass,
            kind: None,
            detail: detail.into(),
            offset: None,
        }
    }

    pub fn fail(kind: FindingKind, check: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            outcome: Outcome::Fail,
            kind: Some(kind),
            detail: detail.into(),
            offset: None,
        }
    }

    pub fn warning(kind: FindingKind, check: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            outcome: Outcome::Warning,
            kind: Some(kind),
            detail: detail.into(),
            offset: None,
        }
    }

    /// Attach an offset.
    pub fn at(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn is_issue(&self) -> bool {
        self.outcome != Outcome::Pass
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.outcome, self.check)?;
        if let Some(kind) = self.kind {
            write!(f, " ({})", kind)?;
        }
        if let Some(offset) = self.offset {
            write!(f, " @{:#X}", offset)?;
        }
        write!(f, ": {}", self.detail)
    }
}

/// Ordered collection of findings for one file.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    findings: Vec<Finding>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self { findings: Vec::new() }
    }

    /// Record a finding. Issues are also logged at `warn` level.
    pub fn push(&mut self, finding: Finding) {
        if finding.is_issue() {
            warn!(check = %finding.check, "{}", finding);
        }
        self.findings.push(finding);
    }

    pub fn pass(&mut self, check: impl Into<String>, detail: impl Into<String>) {
        self.push(Finding::pass(check, detail));
    }

    pub fn fail(&mut self, kind: FindingKind, check: impl Into<String>, detail: impl Into<String>) {
        self.push(Finding::fail(kind, check, detail));
    }

    pub fn warning(
        &mut self,
        kind: FindingKind,
        check: impl Into<String>,
        detail: impl Into<String>,
    ) {
        self.push(Finding::warning(kind, check, detail));
    }

    /// Turn a localized decode error into a failing finding.
    pub fn record_error(&mut self, check: impl Into<String>, err: &DwgError) {
        let kind = match err {
            DwgError::CorruptLocator { .. }
            | DwgError::ObjectOverrun { .. }
            | DwgError::Decompression(_)
            | DwgError::Io(_) => FindingKind::Corrupted,
            DwgError::MalformedVarInt { .. }
            | DwgError::UnalignedRead { .. }
            | DwgError::TruncatedStream { .. }
            | DwgError::InvalidSentinel(_)
            | DwgError::InvalidFormat(_)
            | DwgError::UnsupportedVersion(_) => FindingKind::SyntaxError,
        };
        let offset = match err {
            DwgError::ObjectOverrun { offset, .. } => Some(*offset),
            DwgError::MalformedVarInt { position } => Some(*position),
            _ => None,
        };
        let mut finding = Finding::fail(kind, check, err.to_string());
        finding.offset = offset;
        self.push(finding);
    }

    /// Append every finding of another report.
    pub fn extend(&mut self, other: ValidationReport) {
        self.findings.extend(other.findings);
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Failing and warning findings only.
    pub fn issues(&self) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.is_issue()).collect()
    }

    pub fn has_kind(&self, kind: FindingKind) -> bool {
        self.findings.iter().any(|f| f.kind == Some(kind))
    }

    pub fn of_kind(&self, kind: FindingKind) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.kind == Some(kind)).collect()
    }

    /// A report is valid when nothing failed and every handle reference
    /// resolved.
    pub fn is_valid(&self) -> bool {
        !self.findings.iter().any(|f| {
            f.outcome == Outcome::Fail || f.kind == Some(FindingKind::UnresolvedReference)
        })
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Finding> {
        self.findings.iter()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({} findings, {} issues)",
            if self.is_valid() { "VALID" } else { "INVALID" },
            self.findings.len(),
            self.issues().len()
        )?;
        for finding in &self.findings {
            writeln!(f, "  {}", finding)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ValidationReport {
    type Item = &'a Finding;
    type IntoIter = std::slice::Iter<'a, Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.findings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_are_not_issues() {
        let mut r = ValidationReport::new();
        r.pass("magic", "AC1018");
        r.pass("header_crc", "0x1234ABCD");
        assert_eq!(r.len(), 2);
        assert!(r.issues().is_empty());
        assert!(r.is_valid());
    }

    #[test]
    fn test_warning_keeps_report_valid() {
        let mut r = ValidationReport::new();
        r.warning(FindingKind::UnusedArea, "preamble", "non-zero padding");
        assert_eq!(r.issues().len(), 1);
        assert!(r.is_valid());
    }

    #[test]
    fn test_unresolved_reference_invalidates() {
        let mut r = ValidationReport::new();
        r.warning(FindingKind::UnresolvedReference, "handles", "0x2A -> 0x99");
        assert!(!r.is_valid());
    }

    #[test]
    fn test_record_error() {
        let mut r = ValidationReport::new();
        r.record_error("AcDb:Handles", &DwgError::MalformedVarInt { position: 0x10 });
        let f = &r.findings()[0];
        assert_eq!(f.outcome, Outcome::Fail);
        assert_eq!(f.kind, Some(FindingKind::SyntaxError));
        assert_eq!(f.offset, Some(0x10));
        assert!(!r.is_valid());
    }

    #[test]
    fn test_display() {
        let f =
            Finding::fail(FindingKind::InvalidCrc, "AcDb:Header", "checksum mismatch").at(0x480);
        assert_eq!(
            f.to_string(),
            "[FAIL] AcDb:Header (InvalidCrc) @0x480: checksum mismatch"
        );
    }
}
