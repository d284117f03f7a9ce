//! DWG object type codes.
//!
//! Types 0x01..=0x52 and the two proxy types have fixed codes. Codes from
//! 500 upwards are class numbers registered in `AcDb:Classes`.

use std::fmt;

/// First code that refers to a class in `AcDb:Classes`.
pub const FIRST_CLASS_NUMBER: u16 = 500;
/// Proxy entity code, also the class item id of entity classes.
pub const PROXY_ENTITY: u16 = 0x1F2;
/// Proxy object code, also the class item id of object classes.
pub const PROXY_OBJECT: u16 = 0x1F3;

/// Whether a record carries the entity common data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    Entity,
    Object,
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectClass::Entity => f.write_str("E"),
            ObjectClass::Object => f.write_str("O"),
        }
    }
}

use self::ObjectClass::{Entity as E, Object as O};

/// Fixed type table: (code, name, class).
static FIXED_TYPES: &[(u16, &str, ObjectClass)] = &[
    (0x01, "TEXT", E),
    (0x02, "ATTRIB", E),
    (0x03, "ATTDEF", E),
    (0x04, "BLOCK", E),
    (0x05, "ENDBLK", E),
    (0x06, "SEQEND", E),
    (0x07, "INSERT", E),
    (0x08, "MINSERT", E),
    (0x0A, "VERTEX_2D", E),
    (0x0B, "VERTEX_3D", E),
    (0x0C, "VERTEX_MESH", E),
    (0x0D, "VERTEX_PFACE", E),
    (0x0E, "VERTEX_PFACE_FACE", E),
    (0x0F, "POLYLINE_2D", E),
    (0x10, "POLYLINE_3D", E),
    (0x11, "ARC", E),
    (0x12, "CIRCLE", E),
    (0x13, "LINE", E),
    (0x14, "DIMENSION_ORDINATE", E),
    (0x15, "DIMENSION_LINEAR", E),
    (0x16, "DIMENSION_ALIGNED", E),
    (0x17, "DIMENSION_ANG3PT", E),
    (0x18, "DIMENSION_ANG2LN", E),
    (0x19, "DIMENSION_RADIUS", E),
    (0x1A, "DIMENSION_DIAMETER", E),
    (0x1B, "POINT", E),
    (0x1C, "3DFACE", E),
    (0x1D, "POLYLINE_PFACE", E),
    (0x1E, "POLYLINE_MESH", E),
    (0x1F, "SOLID", E),
    (0x20, "TRACE", E),
    (0x21, "SHAPE", E),
    (0x22, "VIEWPORT", E),
    (0x23, "ELLIPSE", E),
    (0x24, "SPLINE", E),
    (0x25, "REGION", E),
    (0x26, "3DSOLID", E),
    (0x27, "BODY", E),
    (0x28, "RAY", E),
    (0x29, "XLINE", E),
    (0x2A, "DICTIONARY", O),
    (0x2B, "OLEFRAME", E),
    (0x2C, "MTEXT", E),
    (0x2D, "LEADER", E),
    (0x2E, "TOLERANCE", E),
    (0x2F, "MLINE", E),
    (0x30, "BLOCK_CONTROL", O),
    (0x31, "BLOCK_HEADER", O),
    (0x32, "LAYER_CONTROL", O),
    (0x33, "LAYER", O),
    (0x34, "STYLE_CONTROL", O),
    (0x35, "STYLE", O),
    (0x38, "LTYPE_CONTROL", O),
    (0x39, "LTYPE", O),
    (0x3C, "VIEW_CONTROL", O),
    (0x3D, "VIEW", O),
    (0x3E, "UCS_CONTROL", O),
    (0x3F, "UCS", O),
    (0x40, "VPORT_CONTROL", O),
    (0x41, "VPORT", O),
    (0x42, "APPID_CONTROL", O),
    (0x43, "APPID", O),
    (0x44, "DIMSTYLE_CONTROL", O),
    (0x45, "DIMSTYLE", O),
    (0x46, "VP_ENT_HDR_CONTROL", O),
    (0x47, "VP_ENT_HDR", O),
    (0x48, "GROUP", O),
    (0x49, "MLINESTYLE", O),
    (0x4A, "OLE2FRAME", E),
    (0x4C, "LONG_TRANSACTION", E),
    (0x4D, "LWPOLYLINE", E),
    (0x4E, "HATCH", E),
    (0x4F, "XRECORD", O),
    (0x50, "ACDBPLACEHOLDER", O),
    (0x51, "VBA_PROJECT", O),
    (0x52, "LAYOUT", O),
    (PROXY_ENTITY, "ACAD_PROXY_ENTITY", E),
    (PROXY_OBJECT, "ACAD_PROXY_OBJECT", O),
];

/// Look up a fixed type code.
pub fn fixed_type(code: u16) -> Option<(&'static str, ObjectClass)> {
    FIXED_TYPES
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|&(_, name, class)| (name, class))
}

/// Name used for codes that resolve nowhere.
pub fn unknown_type_name(code: u16) -> String {
    format!("UNKNOWN(0x{:X})", code)
}
