//! Document metadata extraction.
//!
//! Pulls a fixed set of keys out of a decoded document. Header variables
//! win over summary info for the timestamps; the summary info supplies the
//! author strings; app info and the aux header supply the application
//! version and save counter. A key with no usable source is left out.

use std::fmt;

use indexmap::IndexMap;
use tracing::debug;

use crate::document::DwgDocument;
use crate::report::{FindingKind, ValidationReport};
use crate::types::julian_date::MS_PER_DAY;
use crate::types::{CalendarTime, JulianDate};

const CHECK: &str = "metadata";

/// Recognised metadata keys, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataKey {
    Title,
    Subject,
    Author,
    Keywords,
    Comments,
    LastSavedBy,
    RevisionNumber,
    CreateTime,
    UpdateTime,
    TotalEditingTime,
    DrawingUnits,
    ApplicationVersion,
    MaintenanceVersion,
    NumberOfSaves,
    FingerprintGuid,
    VersionGuid,
}

impl MetadataKey {
    pub const ALL: [MetadataKey; 16] = [
        MetadataKey::Title,
        MetadataKey::Subject,
        MetadataKey::Author,
        MetadataKey::Keywords,
        MetadataKey::Comments,
        MetadataKey::LastSavedBy,
        MetadataKey::RevisionNumber,
        MetadataKey::CreateTime,
        MetadataKey::UpdateTime,
        MetadataKey::TotalEditingTime,
        MetadataKey::DrawingUnits,
        MetadataKey::ApplicationVersion,
        MetadataKey::MaintenanceVersion,
        MetadataKey::NumberOfSaves,
        MetadataKey::FingerprintGuid,
        MetadataKey::VersionGuid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataKey::Title => "title",
            MetadataKey::Subject => "subject",
            MetadataKey::Author => "author",
            MetadataKey::Keywords => "keywords",
            MetadataKey::Comments => "comments",
            MetadataKey::LastSavedBy => "last_saved_by",
            MetadataKey::RevisionNumber => "revision_number",
            MetadataKey::CreateTime => "create_time",
            MetadataKey::UpdateTime => "update_time",
            MetadataKey::TotalEditingTime => "total_editing_time",
            MetadataKey::DrawingUnits => "drawing_units",
            MetadataKey::ApplicationVersion => "application_version",
            MetadataKey::MaintenanceVersion => "maintenance_version",
            MetadataKey::NumberOfSaves => "number_of_saves",
            MetadataKey::FingerprintGuid => "fingerprint_guid",
            MetadataKey::VersionGuid => "version_guid",
        }
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded metadata value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Text(String),
    Timestamp(CalendarTime),
    /// Elapsed days and milliseconds
    Duration(JulianDate),
    Number(u64),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Text(text) => f.write_str(text),
            MetadataValue::Timestamp(time) => write!(f, "{}", time),
            MetadataValue::Duration(duration) => f.write_str(&duration.to_duration_string()),
            MetadataValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Flat key/value view of a document's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord {
    values: IndexMap<MetadataKey, MetadataValue>,
}

impl MetadataRecord {
    pub fn get(&self, key: MetadataKey) -> Option<&MetadataValue> {
        self.values.get(&key)
    }

    pub fn text(&self, key: MetadataKey) -> Option<&str> {
        match self.values.get(&key) {
            Some(MetadataValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn contains(&self, key: MetadataKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetadataKey, &MetadataValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn insert(&mut self, key: MetadataKey, value: MetadataValue) {
        self.values.insert(key, value);
    }

    /// Insert non-empty text.
    fn insert_text(&mut self, key: MetadataKey, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.insert(key, MetadataValue::Text(text.to_string()));
        }
    }
}

impl fmt::Display for MetadataRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.values {
            writeln!(f, "{:<20} {}", key.as_str(), value)?;
        }
        Ok(())
    }
}

/// Name of an INSUNITS code.
pub fn insertion_units_name(code: i16) -> Option<&'static str> {
    const NAMES: [&str; 25] = [
        "Unitless",
        "Inches",
        "Feet",
        "Miles",
        "Millimeters",
        "Centimeters",
        "Meters",
        "Kilometers",
        "Microinches",
        "Mils",
        "Yards",
        "Angstroms",
        "Nanometers",
        "Microns",
        "Decimeters",
        "Decameters",
        "Hectometers",
        "Gigameters",
        "Astronomical units",
        "Light years",
        "Parsecs",
        "US Survey Feet",
        "US Survey Inch",
        "US Survey Yard",
        "US Survey Mile",
    ];
    usize::try_from(code).ok().and_then(|i| NAMES.get(i).copied())
}

/// Extract the metadata of `doc`. Timestamps that do not convert are
/// recorded in `report` and left out.
pub fn extract_metadata(doc: &DwgDocument, report: &mut ValidationReport) -> MetadataRecord {
    let mut record = MetadataRecord::default();
    let vars = doc.header_variables.as_ref();
    let summary = doc.summary_info.as_ref();

    if let Some(summary) = summary {
        record.insert_text(MetadataKey::Title, &summary.title);
        record.insert_text(MetadataKey::Subject, &summary.subject);
        record.insert_text(MetadataKey::Author, &summary.author);
        record.insert_text(MetadataKey::Keywords, &summary.keywords);
        record.insert_text(MetadataKey::Comments, &summary.comments);
        record.insert_text(MetadataKey::LastSavedBy, &summary.last_saved_by);
        record.insert_text(MetadataKey::RevisionNumber, &summary.revision_number);
    }

    let create = [
        ("TDCREATE", vars.and_then(|v| v.create_date)),
        ("summary info create date", summary.map(|s| s.create_date)),
    ];
    if let Some(time) = first_timestamp(&create, report) {
        record.insert(MetadataKey::CreateTime, MetadataValue::Timestamp(time));
    }
    let update = [
        ("TDUPDATE", vars.and_then(|v| v.update_date)),
        ("summary info modified date", summary.map(|s| s.modified_date)),
    ];
    if let Some(time) = first_timestamp(&update, report) {
        record.insert(MetadataKey::UpdateTime, MetadataValue::Timestamp(time));
    }

    let editing = [
        ("TDINDWG", vars.and_then(|v| v.total_editing_time)),
        ("summary info editing time", summary.map(|s| s.total_editing_time)),
    ];
    if let Some(duration) = first_duration(&editing, report) {
        record.insert(MetadataKey::TotalEditingTime, MetadataValue::Duration(duration));
    }

    if let Some(code) = vars.and_then(|v| v.insertion_units) {
        match insertion_units_name(code) {
            Some(name) => record.insert_text(MetadataKey::DrawingUnits, name),
            None => report.warning(
                FindingKind::Corrupted,
                CHECK,
                format!("INSUNITS {} is not a unit code", code),
            ),
        }
    }

    if let Some(version) = doc.app_info.as_ref().and_then(|a| a.application_version()) {
        record.insert_text(MetadataKey::ApplicationVersion, version);
    }

    match &doc.aux_header {
        Some(aux) => {
            record.insert(
                MetadataKey::MaintenanceVersion,
                MetadataValue::Number(aux.maintenance_version as u64),
            );
            record.insert(
                MetadataKey::NumberOfSaves,
                MetadataValue::Number(aux.number_of_saves as u64),
            );
        }
        None => record.insert(
            MetadataKey::MaintenanceVersion,
            MetadataValue::Number(doc.header.maintenance_version as u64),
        ),
    }

    if let Some(vars) = vars {
        if let Some(guid) = &vars.fingerprint_guid {
            record.insert_text(MetadataKey::FingerprintGuid, guid);
        }
        if let Some(guid) = &vars.version_guid {
            record.insert_text(MetadataKey::VersionGuid, guid);
        }
    }

    // keep report order stable whatever the fill order above
    record.values.sort_keys();
    debug!(keys = record.len(), "extracted metadata");
    record
}

/// First candidate that is set and converts. Each set candidate that does
/// not convert is reported.
fn first_timestamp(
    candidates: &[(&str, Option<JulianDate>)],
    report: &mut ValidationReport,
) -> Option<CalendarTime> {
    for (source, date) in candidates {
        let Some(date) = date.filter(|d| !d.is_unset()) else {
            continue;
        };
        match date.to_calendar() {
            Ok(time) => return Some(time),
            Err(err) => report.warning(
                FindingKind::TimestampRange,
                CHECK,
                format!("{} ({}, {}): {}", source, date.day, date.milliseconds, err),
            ),
        }
    }
    None
}

fn first_duration(
    candidates: &[(&str, Option<JulianDate>)],
    report: &mut ValidationReport,
) -> Option<JulianDate> {
    for (source, duration) in candidates {
        let Some(duration) = *duration else {
            continue;
        };
        if duration.day < 0 || !(0..MS_PER_DAY as i64).contains(&duration.milliseconds) {
            report.warning(
                FindingKind::TimestampRange,
                CHECK,
                format!(
                    "{} ({}, {}) is not a duration",
                    source, duration.day, duration.milliseconds
                ),
            );
            continue;
        }
        return Some(duration);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_names() {
        assert_eq!(insertion_units_name(0), Some("Unitless"));
        assert_eq!(insertion_units_name(4), Some("Millimeters"));
        assert_eq!(insertion_units_name(24), Some("US Survey Mile"));
        assert_eq!(insertion_units_name(25), None);
        assert_eq!(insertion_units_name(-1), None);
    }

    #[test]
    fn test_header_date_wins_over_summary() {
        let mut report = ValidationReport::new();
        let candidates = [
            ("TDCREATE", Some(JulianDate::new(2_453_372, 43_200_000))),
            ("summary", Some(JulianDate::new(2_400_000, 0))),
        ];
        let time = first_timestamp(&candidates, &mut report).unwrap();
        assert_eq!(time.to_string(), "2005-01-01 12:00:00.000");
        assert!(report.is_empty());
    }

    #[test]
    fn test_bad_header_date_falls_back_with_warning() {
        let mut report = ValidationReport::new();
        let candidates = [
            ("TDCREATE", Some(JulianDate::new(-5, 0))),
            ("summary", Some(JulianDate::new(2_453_372, 0))),
        ];
        let time = first_timestamp(&candidates, &mut report).unwrap();
        assert_eq!(time.year, 2005);
        assert_eq!(report.of_kind(FindingKind::TimestampRange).len(), 1);
    }

    #[test]
    fn test_unset_dates_are_absent_without_warning() {
        let mut report = ValidationReport::new();
        let candidates = [("TDCREATE", Some(JulianDate::default())), ("summary", None)];
        assert!(first_timestamp(&candidates, &mut report).is_none());
        assert!(report.is_empty());
    }

    #[test]
    fn test_out_of_range_milliseconds() {
        let mut report = ValidationReport::new();
        let candidates = [("TDUPDATE", Some(JulianDate::new(2_453_371, 86_400_000)))];
        assert!(first_timestamp(&candidates, &mut report).is_none());
        assert!(report.has_kind(FindingKind::TimestampRange));
    }

    #[test]
    fn test_duration_display() {
        let value = MetadataValue::Duration(JulianDate::new(1, 5_400_000));
        assert_eq!(value.to_string(), "1 days 1 hours 30 minutes");

        let mut report = ValidationReport::new();
        let bad = [("TDINDWG", Some(JulianDate::new(0, -1)))];
        assert!(first_duration(&bad, &mut report).is_none());
        assert_eq!(report.issues().len(), 1);
    }

    #[test]
    fn test_empty_text_is_left_out() {
        let mut record = MetadataRecord::default();
        record.insert_text(MetadataKey::Author, "  ");
        record.insert_text(MetadataKey::Title, "Plan");
        assert!(!record.contains(MetadataKey::Author));
        assert_eq!(record.text(MetadataKey::Title), Some("Plan"));
        assert_eq!(record.len(), 1);
    }
}
