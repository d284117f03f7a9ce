//! DWG header variables (`AcDb:Header`) reader.
//!
//! The section holds several hundred system variables in a fixed order.
//! Only the ones with forensic value are kept: the creation and update
//! times, the editing timers, the drawing units and the two GUIDs. The rest
//! are walked over by type so the fields further down can be reached.
//!
//! In R21 text and handles live in their own streams, located through the
//! bit size that follows the section size.

use encoding_rs::Encoding;
use tracing::debug;

use crate::error::{DwgError, Result};
use crate::io::dwg::constants::{section_names, sentinels};
use crate::io::dwg::reader::bit_reader::BitReader;
use crate::io::dwg::reader::framed::{check_frame, DATA_START};
use crate::io::dwg::reader::merged_reader::MergedReader;
use crate::io::dwg::reader::stream_reader::DwgStreamReader;
use crate::io::dwg::reader::DwgReaderConfiguration;
use crate::report::ValidationReport;
use crate::types::{DwgVersion, HandleReference, JulianDate};

const CHECK: &str = section_names::HEADER;

/// Header variables with forensic value.
///
/// Fields stay `None` when the walk failed before reaching them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderVariables {
    pub menu_name: Option<String>,
    /// TDCREATE
    pub create_date: Option<JulianDate>,
    /// TDUPDATE
    pub update_date: Option<JulianDate>,
    /// TDINDWG, a duration
    pub total_editing_time: Option<JulianDate>,
    /// TDUSRTIMER, a duration
    pub user_elapsed_time: Option<JulianDate>,
    /// HANDSEED: the next handle the application would hand out
    pub handle_seed: Option<u64>,
    /// INSUNITS
    pub insertion_units: Option<i16>,
    pub fingerprint_guid: Option<String>,
    pub version_guid: Option<String>,
}

pub struct DwgHeaderReader<'a> {
    data: &'a [u8],
    version: DwgVersion,
    encoding: &'static Encoding,
}

impl<'a> DwgHeaderReader<'a> {
    pub fn new(version: DwgVersion, data: &'a [u8], encoding: &'static Encoding) -> Self {
        Self {
            data,
            version,
            encoding,
        }
    }

    /// Read the variables. A walk that breaks off keeps what it got.
    pub fn read(
        &self,
        config: &DwgReaderConfiguration,
        report: &mut ValidationReport,
    ) -> Result<HeaderVariables> {
        let mut vars = HeaderVariables::default();
        match self.read_into(&mut vars, config, report) {
            Ok(()) => {
                debug!(handle_seed = ?vars.handle_seed, "read header variables");
                report.pass(CHECK, "header variables decoded");
            }
            Err(err) => config.absorb(report, CHECK, err)?,
        }
        Ok(vars)
    }

    fn read_into(
        &self,
        vars: &mut HeaderVariables,
        config: &DwgReaderConfiguration,
        report: &mut ValidationReport,
    ) -> Result<()> {
        let body_end = check_frame(
            self.data,
            &sentinels::HEADER_START,
            &sentinels::HEADER_END,
            CHECK,
            config,
            report,
        )?;
        let body = &self.data[..body_end];
        let mut main =
            BitReader::at(body, self.version, DATA_START as u64 * 8).with_encoding(self.encoding);

        match self.version {
            DwgVersion::R18 => read_variables(&mut main, vars, self.version, |r: &mut BitReader<'a>| {
                r.read_handle()
            }),
            DwgVersion::R21 => {
                let initial = main.position_in_bits();
                let bit_size = main.read_raw_long()? as u32 as u64;
                let last = (initial + bit_size).checked_sub(1).ok_or_else(|| {
                    DwgError::InvalidFormat("header stream size is zero".to_string())
                })?;

                let mut text = BitReader::new(body, self.version);
                let text = text.set_position_by_flag(last)?.map(|_| text);
                let handles = BitReader::at(body, self.version, last + 1);

                let mut merged = MergedReader::new(main, text, Some(handles));
                read_variables(&mut merged, vars, self.version, |r: &mut MergedReader<'a>| {
                    r.main_mut().read_handle()
                })
            }
        }
    }
}

/// Walk the variables in file order.
///
/// `read_seed` reads HANDSEED, which stays in the main stream even when
/// the other handles are split off.
fn read_variables<R, F>(
    r: &mut R,
    vars: &mut HeaderVariables,
    version: DwgVersion,
    read_seed: F,
) -> Result<()>
where
    R: DwgStreamReader,
    F: FnOnce(&mut R) -> Result<HandleReference>,
{
    let r21 = version == DwgVersion::R21;

    // Unknown BD x4 (412148564080.0, 1.0, 1.0, 1.0), TV x4 ("m", "", "", ""),
    // BL x2 (24, 0)
    doubles(r, 4)?;
    texts(r, 4)?;
    longs(r, 2)?;

    // DIMASO DIMSHO PLINEGEN ORTHOMODE REGENMODE FILLMODE QTEXTMODE
    // PSLTSCALE LIMCHECK, an undocumented bit, USRTIMER SKPOLY ANGDIR
    // SPLFRAME MIRRTEXT WORLDVIEW TILEMODE PLIMCHECK VISRETAIN DISPSILH
    // PELLIPSE
    bits(r, 21)?;
    // PROXYGRAPHICS TREEDEPTH LUNITS LUPREC AUNITS AUPREC ATTMODE PDMODE
    shorts(r, 8)?;
    // unknown
    longs(r, 3)?;
    // USERI1-5, SPLINESEGS SURFU SURFV SURFTYPE SURFTAB1 SURFTAB2
    // SPLINETYPE SHADEDGE SHADEDIF UNITMODE MAXACTVP ISOLINES CMLJUST
    // TEXTQLTY
    shorts(r, 19)?;
    // LTSCALE TEXTSIZE TRACEWID SKETCHINC FILLETRAD THICKNESS ANGBASE
    // PDSIZE PLINEWID USERR1-5 CHAMFERA-D FACETRES CMLSCALE CELTSCALE
    doubles(r, 21)?;
    vars.menu_name = Some(r.read_variable_text()?);

    vars.create_date = Some(r.read_julian_date()?);
    vars.update_date = Some(r.read_julian_date()?);
    longs(r, 3)?;
    vars.total_editing_time = Some(r.read_julian_date()?);
    vars.user_elapsed_time = Some(r.read_julian_date()?);
    // CECOLOR
    r.skip_cm_color()?;

    vars.handle_seed = Some(read_seed(r)?.value);

    // CLAYER TEXTSTYLE CELTYPE [CMATERIAL] DIMSTYLE CMLSTYLE
    handles(r, if r21 { 6 } else { 5 })?;
    // PSVPSCALE
    doubles(r, 1)?;

    // paper space, then model space
    for _ in 0..2 {
        // INSBASE EXTMIN EXTMAX
        points(r, 3)?;
        // LIMMIN LIMMAX
        r.read_2raw_double()?;
        r.read_2raw_double()?;
        // ELEVATION
        doubles(r, 1)?;
        // UCSORG UCSXDIR UCSYDIR, UCSNAME, UCSORTHOREF
        points(r, 3)?;
        handles(r, 2)?;
        // UCSORTHOVIEW, UCSBASE
        shorts(r, 1)?;
        handles(r, 1)?;
        // UCSORG TOP BOTTOM LEFT RIGHT FRONT BACK
        points(r, 6)?;
    }
    // DIMPOST DIMAPOST
    texts(r, 2)?;

    // DIMSCALE DIMASZ DIMEXO DIMDLI DIMEXE DIMRND DIMDLE DIMTP DIMTM
    doubles(r, 9)?;
    if r21 {
        // DIMFXL DIMJOGANG, DIMTFILL, DIMTFILLCLR
        doubles(r, 2)?;
        shorts(r, 1)?;
        r.skip_cm_color()?;
    }
    // DIMTOL DIMLIM DIMTIH DIMTOH DIMSE1 DIMSE2, DIMTAD DIMZIN DIMAZIN
    bits(r, 6)?;
    shorts(r, 3)?;
    if r21 {
        // DIMARCSYM
        shorts(r, 1)?;
    }
    // DIMTXT DIMCEN DIMTSZ DIMALTF DIMLFAC DIMTVP DIMTFAC DIMGAP DIMALTRND
    doubles(r, 9)?;
    // DIMALT, DIMALTD, DIMTOFL DIMSAH DIMTIX DIMSOXD
    bits(r, 1)?;
    shorts(r, 1)?;
    bits(r, 4)?;
    // DIMCLRD DIMCLRE DIMCLRT
    for _ in 0..3 {
        r.skip_cm_color()?;
    }
    // DIMADEC DIMDEC DIMTDEC DIMALTU DIMALTTD DIMAUNIT DIMFRAC DIMLUNIT
    // DIMDSEP DIMTMOVE DIMJUST
    shorts(r, 11)?;
    // DIMSD1 DIMSD2, DIMTOLJ DIMTZIN DIMALTZ DIMALTTZ, DIMUPT, DIMATFIT
    bits(r, 2)?;
    shorts(r, 4)?;
    bits(r, 1)?;
    shorts(r, 1)?;
    if r21 {
        // DIMFXLON
        bits(r, 1)?;
    }
    // DIMTXSTY DIMLDRBLK DIMBLK DIMBLK1 DIMBLK2 [DIMLTYPE DIMLTEX1 DIMLTEX2]
    handles(r, if r21 { 8 } else { 5 })?;
    // DIMLWD DIMLWE
    shorts(r, 2)?;

    // BLOCK LAYER STYLE LINETYPE VIEW UCS VPORT APPID DIMSTYLE control
    // objects, ACAD_GROUP ACAD_MLINESTYLE and named object dictionaries
    handles(r, 12)?;
    // TSTACKALIGN TSTACKSIZE, HYPERLINKBASE STYLESHEET
    shorts(r, 2)?;
    texts(r, 2)?;
    // LAYOUTS PLOTSETTINGS PLOTSTYLES MATERIALS COLORS [VISUALSTYLE]
    handles(r, if r21 { 6 } else { 5 })?;

    // CELWEIGHT ENDCAPS JOINSTYLE LWDISPLAY XEDIT EXTNAMES PSTYLEMODE
    // OLESTARTUP flags
    longs(r, 1)?;
    vars.insertion_units = Some(r.read_bit_short()?);
    // CEPSNTYPE; CPSNID follows only for type 3
    if r.read_bit_short()? == 3 {
        handles(r, 1)?;
    }
    vars.fingerprint_guid = Some(r.read_variable_text()?);
    vars.version_guid = Some(r.read_variable_text()?);
    Ok(())
}

fn bits<R: DwgStreamReader>(r: &mut R, count: usize) -> Result<()> {
    for _ in 0..count {
        r.read_bit()?;
    }
    Ok(())
}

fn shorts<R: DwgStreamReader>(r: &mut R, count: usize) -> Result<()> {
    for _ in 0..count {
        r.read_bit_short()?;
    }
    Ok(())
}

fn longs<R: DwgStreamReader>(r: &mut R, count: usize) -> Result<()> {
    for _ in 0..count {
        r.read_bit_long()?;
    }
    Ok(())
}

fn doubles<R: DwgStreamReader>(r: &mut R, count: usize) -> Result<()> {
    for _ in 0..count {
        r.read_bit_double()?;
    }
    Ok(())
}

fn points<R: DwgStreamReader>(r: &mut R, count: usize) -> Result<()> {
    for _ in 0..count {
        r.read_3bit_double()?;
    }
    Ok(())
}

fn texts<R: DwgStreamReader>(r: &mut R, count: usize) -> Result<()> {
    for _ in 0..count {
        r.read_variable_text()?;
    }
    Ok(())
}

fn handles<R: DwgStreamReader>(r: &mut R, count: usize) -> Result<()> {
    for _ in 0..count {
        r.read_handle()?;
    }
    Ok(())
}
