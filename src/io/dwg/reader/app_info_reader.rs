//! DWG application info (`AcDb:AppInfo`) reader.
//!
//! Names the application that last saved the drawing. Strings are UTF-16
//! in both revisions; R21 adds 16-byte checksums in front of the version,
//! comment and product strings.

use tracing::debug;

use crate::error::Result;
use crate::io::dwg::constants::section_names;
use crate::io::dwg::reader::raw_reader::RawReader;
use crate::io::dwg::reader::DwgReaderConfiguration;
use crate::report::ValidationReport;
use crate::types::DwgVersion;

const CHECK: &str = section_names::APP_INFO;

/// Application info data read from the `AcDb:AppInfo` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppInfo {
    /// Usually "AppInfoDataList"
    pub name: String,
    /// R21 only
    pub version: String,
    /// R21 only
    pub comment: String,
    /// Product XML element
    pub product: String,
    /// Application version, e.g. "2.7.2.0"
    pub app_info_version: String,
    /// Version, comment and product checksums (R21 only)
    pub checksums: Vec<[u8; 16]>,
}

impl AppInfo {
    /// Best available application version string.
    pub fn application_version(&self) -> Option<&str> {
        [&self.version, &self.app_info_version, &self.product]
            .into_iter()
            .map(|s| s.as_str())
            .find(|s| !s.is_empty())
    }
}

pub struct DwgAppInfoReader<'a> {
    data: &'a [u8],
    version: DwgVersion,
}

impl<'a> DwgAppInfoReader<'a> {
    pub fn new(version: DwgVersion, data: &'a [u8]) -> Self {
        Self { data, version }
    }

    /// Read the section. `None` when the fields could not be decoded.
    pub fn read(
        &self,
        config: &DwgReaderConfiguration,
        report: &mut ValidationReport,
    ) -> Result<Option<AppInfo>> {
        let mut reader = RawReader::new(self.data);
        let decoded = match self.version {
            DwgVersion::R18 => read_r18(&mut reader),
            DwgVersion::R21 => read_r21(&mut reader),
        };
        match decoded {
            Ok(info) => {
                debug!(version = ?info.application_version(), "read app info");
                reader.check_slack(CHECK, report);
                report.pass(CHECK, "app info decoded");
                Ok(Some(info))
            }
            Err(err) => {
                config.absorb(report, CHECK, err)?;
                Ok(None)
            }
        }
    }
}

fn read_r18(r: &mut RawReader<'_>) -> Result<AppInfo> {
    let name = r.read_unicode_text()?;
    // RL, 2 in files written by AutoCAD
    r.read_u32()?;
    // undocumented string, "4001"
    r.read_unicode_text()?;
    let product = r.read_unicode_text()?;
    let app_info_version = r.read_unicode_text()?;

    Ok(AppInfo {
        name,
        product,
        app_info_version,
        ..Default::default()
    })
}

fn read_r21(r: &mut RawReader<'_>) -> Result<AppInfo> {
    let mut info = AppInfo::default();
    // RL, 3
    r.read_u32()?;
    info.name = r.read_unicode_text()?;
    r.read_u32()?;
    info.checksums.push(read_checksum(r)?);
    info.version = r.read_unicode_text()?;
    info.checksums.push(read_checksum(r)?);
    info.comment = r.read_unicode_text()?;
    info.checksums.push(read_checksum(r)?);
    info.product = r.read_unicode_text()?;
    info.app_info_version = r.read_unicode_text()?;
    Ok(info)
}

fn read_checksum(r: &mut RawReader<'_>) -> Result<[u8; 16]> {
    let mut checksum = [0u8; 16];
    checksum.copy_from_slice(r.read_bytes(16)?);
    Ok(checksum)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::report::FindingKind;

    pub(crate) fn unicode(out: &mut Vec<u8>, s: &str) {
        let units: Vec<u16> = s.encode_utf16().chain(Some(0)).collect();
        out.extend_from_slice(&(units.len() as u16).to_le_bytes());
        for u in units {
            out.extend_from_slice(&u.to_le_bytes());
        }
    }

    /// An R18 app info section naming `version`.
    pub(crate) fn r18_app_info(version: &str) -> Vec<u8> {
        let mut out = Vec::new();
        unicode(&mut out, "AppInfoDataList");
        out.extend_from_slice(&2u32.to_le_bytes());
        unicode(&mut out, "4001");
        unicode(&mut out, "<ProductInformation name =\"AutoCAD\"/>");
        unicode(&mut out, version);
        out
    }

    fn read(version: DwgVersion, data: &[u8]) -> (Option<AppInfo>, ValidationReport) {
        let mut report = ValidationReport::new();
        let info = DwgAppInfoReader::new(version, data)
            .read(&DwgReaderConfiguration::default(), &mut report)
            .unwrap();
        (info, report)
    }

    #[test]
    fn test_reads_r18_app_info() {
        let (info, report) = read(DwgVersion::R18, &r18_app_info("17.0.54.0"));
        let info = info.unwrap();
        assert!(report.issues().is_empty());
        assert_eq!(info.name, "AppInfoDataList");
        assert_eq!(info.application_version(), Some("17.0.54.0"));
        assert!(info.checksums.is_empty());
    }

    #[test]
    fn test_reads_r21_app_info() {
        let mut data = 3u32.to_le_bytes().to_vec();
        unicode(&mut data, "AppInfoDataList");
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&[0xAB; 16]);
        unicode(&mut data, "21.0s (LMS Tech)");
        data.extend_from_slice(&[0; 16]);
        unicode(&mut data, "");
        data.extend_from_slice(&[0; 16]);
        unicode(&mut data, "<ProductInformation/>");
        unicode(&mut data, "2.7.2.0");

        let (info, report) = read(DwgVersion::R21, &data);
        let info = info.unwrap();
        assert!(report.issues().is_empty());
        assert_eq!(info.application_version(), Some("21.0s (LMS Tech)"));
        assert_eq!(info.app_info_version, "2.7.2.0");
        assert_eq!(info.checksums[0], [0xAB; 16]);
    }

    #[test]
    fn test_falls_back_to_product() {
        let info = AppInfo {
            product: "<ProductInformation/>".into(),
            ..Default::default()
        };
        assert_eq!(info.application_version(), Some("<ProductInformation/>"));
        assert_eq!(AppInfo::default().application_version(), None);
    }

    #[test]
    fn test_slack_and_truncation() {
        let mut data = r18_app_info("1.0");
        data.push(0x7F);
        let (info, report) = read(DwgVersion::R18, &data);
        assert!(info.is_some());
        assert!(report.has_kind(FindingKind::UnusedArea));

        let (info, report) = read(DwgVersion::R18, &data[..10]);
        assert!(info.is_none());
        assert!(!report.is_valid());
    }
}
