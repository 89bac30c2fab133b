use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{GdscError, Result};
use crate::provider::BytecodeProvider;

/// Tag bit selecting the 64-bit representation of an int/float constant.
pub const WIDE_VALUE_FLAG: u32 = 1 << 16;

/// A constant value embedded in compiled script bytecode.
///
/// One closed union serves both the compile and decompile paths. The
/// type tag written to the wire is *not* fixed: it is the index of the
/// type's name in the active descriptor's type table, so the same value
/// serializes to different tags under different engine revisions.
///
/// Composite values keep their fields as flat `f32` arrays in wire
/// order, which makes the codec a plain flatten/unflatten.
#[derive(Debug, Clone)]
pub enum GdValue {
    Nil,
    Bool(bool),
    Int32(u32),
    Int64(u64),
    Float32(f32),
    Float64(f64),
    Str(String),
    Vector2([f32; 2]),
    Rect2 { position: [f32; 2], size: [f32; 2] },
    Vector3([f32; 3]),
    Transform2d { origin: [f32; 2], x: [f32; 2], y: [f32; 2] },
    Plane { normal: [f32; 3], d: f32 },
    Quat([f32; 4]),
    Aabb { position: [f32; 3], size: [f32; 3] },
    Basis([[f32; 3]; 3]),
    Transform { basis: [[f32; 3]; 3], origin: [f32; 3] },
    Color([f32; 4]),
    /// Decode-only: the wire layout for encoding is not fully known.
    NodePath {
        names: Vec<String>,
        subnames: Vec<String>,
        absolute: bool,
    },
}

// Equality and hashing go through float bit patterns so that pool
// deduplication treats NaN payloads and signed zeros consistently.
impl PartialEq for GdValue {
    fn eq(&self, other: &Self) -> bool {
        use GdValue::*;
        match (self, other) {
            (Nil, Nil) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int32(a), Int32(b)) => a == b,
            (Int64(a), Int64(b)) => a == b,
            (Float32(a), Float32(b)) => a.to_bits() == b.to_bits(),
            (Float64(a), Float64(b)) => a.to_bits() == b.to_bits(),
            (Str(a), Str(b)) => a == b,
            (Vector2(a), Vector2(b)) => bits2(a) == bits2(b),
            (
                Rect2 { position: ap, size: asz },
                Rect2 { position: bp, size: bsz },
            ) => bits2(ap) == bits2(bp) && bits2(asz) == bits2(bsz),
            (Vector3(a), Vector3(b)) => bits3(a) == bits3(b),
            (
                Transform2d { origin: ao, x: ax, y: ay },
                Transform2d { origin: bo, x: bx, y: by },
            ) => bits2(ao) == bits2(bo) && bits2(ax) == bits2(bx) && bits2(ay) == bits2(by),
            (
                Plane { normal: an, d: ad },
                Plane { normal: bn, d: bd },
            ) => bits3(an) == bits3(bn) && ad.to_bits() == bd.to_bits(),
            (Quat(a), Quat(b)) => bits4(a) == bits4(b),
            (
                Aabb { position: ap, size: asz },
                Aabb { position: bp, size: bsz },
            ) => bits3(ap) == bits3(bp) && bits3(asz) == bits3(bsz),
            (Basis(a), Basis(b)) => a.iter().zip(b).all(|(ra, rb)| bits3(ra) == bits3(rb)),
            (
                Transform { basis: ab, origin: ao },
                Transform { basis: bb, origin: bo },
            ) => {
                ab.iter().zip(bb).all(|(ra, rb)| bits3(ra) == bits3(rb))
                    && bits3(ao) == bits3(bo)
            }
            (Color(a), Color(b)) => bits4(a) == bits4(b),
            (
                NodePath { names: an, subnames: asn, absolute: aa },
                NodePath { names: bn, subnames: bsn, absolute: ba },
            ) => an == bn && asn == bsn && aa == ba,
            _ => false,
        }
    }
}

impl Eq for GdValue {}

impl Hash for GdValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        use GdValue::*;
        std::mem::discriminant(self).hash(state);
        match self {
            Nil => {}
            Bool(v) => v.hash(state),
            Int32(v) => v.hash(state),
            Int64(v) => v.hash(state),
            Float32(v) => v.to_bits().hash(state),
            Float64(v) => v.to_bits().hash(state),
            Str(v) => v.hash(state),
            Vector2(v) => bits2(v).hash(state),
            Rect2 { position, size } => {
                bits2(position).hash(state);
                bits2(size).hash(state);
            }
            Vector3(v) => bits3(v).hash(state),
            Transform2d { origin, x, y } => {
                bits2(origin).hash(state);
                bits2(x).hash(state);
                bits2(y).hash(state);
            }
            Plane { normal, d } => {
                bits3(normal).hash(state);
                d.to_bits().hash(state);
            }
            Quat(v) => bits4(v).hash(state),
            Aabb { position, size } => {
                bits3(position).hash(state);
                bits3(size).hash(state);
            }
            Basis(rows) => {
                for r in rows {
                    bits3(r).hash(state);
                }
            }
            Transform { basis, origin } => {
                for r in basis {
                    bits3(r).hash(state);
                }
                bits3(origin).hash(state);
            }
            Color(v) => bits4(v).hash(state),
            NodePath { names, subnames, absolute } => {
                names.hash(state);
                subnames.hash(state);
                absolute.hash(state);
            }
        }
    }
}

fn bits2(a: &[f32; 2]) -> [u32; 2] {
    a.map(f32::to_bits)
}

fn bits3(a: &[f32; 3]) -> [u32; 3] {
    a.map(f32::to_bits)
}

fn bits4(a: &[f32; 4]) -> [u32; 4] {
    a.map(f32::to_bits)
}

impl GdValue {
    /// Write the type tag word followed by the value's fixed payload.
    pub fn serialize<W: Write>(&self, w: &mut W, provider: &BytecodeProvider) -> Result<()> {
        use GdValue::*;
        match self {
            Nil => {
                w.write_u32::<LittleEndian>(provider.type_id("Nil")?)?;
            }
            Bool(v) => {
                w.write_u32::<LittleEndian>(provider.type_id("bool")?)?;
                w.write_u32::<LittleEndian>(u32::from(*v))?;
            }
            Int32(v) => {
                w.write_u32::<LittleEndian>(provider.type_id("int")?)?;
                w.write_u32::<LittleEndian>(*v)?;
            }
            Int64(v) => {
                w.write_u32::<LittleEndian>(provider.type_id("int")? | WIDE_VALUE_FLAG)?;
                w.write_u64::<LittleEndian>(*v)?;
            }
            Float32(v) => {
                w.write_u32::<LittleEndian>(provider.type_id("float")?)?;
                w.write_f32::<LittleEndian>(*v)?;
            }
            Float64(v) => {
                w.write_u32::<LittleEndian>(provider.type_id("float")? | WIDE_VALUE_FLAG)?;
                w.write_f64::<LittleEndian>(*v)?;
            }
            Str(v) => {
                w.write_u32::<LittleEndian>(provider.type_id("String")?)?;
                write_padded_string(w, v)?;
            }
            Vector2(v) => {
                w.write_u32::<LittleEndian>(provider.type_id("Vector2")?)?;
                write_floats(w, v)?;
            }
            Rect2 { position, size } => {
                w.write_u32::<LittleEndian>(provider.type_id("Rect2")?)?;
                write_floats(w, position)?;
                write_floats(w, size)?;
            }
            Vector3(v) => {
                w.write_u32::<LittleEndian>(provider.type_id("Vector3")?)?;
                write_floats(w, v)?;
            }
            Transform2d { origin, x, y } => {
                w.write_u32::<LittleEndian>(provider.type_id_any(&["Transform2D", "Matrix32"])?)?;
                write_floats(w, origin)?;
                write_floats(w, x)?;
                write_floats(w, y)?;
            }
            Plane { normal, d } => {
                w.write_u32::<LittleEndian>(provider.type_id("Plane")?)?;
                write_floats(w, normal)?;
                w.write_f32::<LittleEndian>(*d)?;
            }
            Quat(v) => {
                w.write_u32::<LittleEndian>(provider.type_id("Quat")?)?;
                write_floats(w, v)?;
            }
            Aabb { position, size } => {
                w.write_u32::<LittleEndian>(provider.type_id("AABB")?)?;
                write_floats(w, position)?;
                write_floats(w, size)?;
            }
            Basis(rows) => {
                w.write_u32::<LittleEndian>(provider.type_id_any(&["Basis", "Matrix3"])?)?;
                for r in rows {
                    write_floats(w, r)?;
                }
            }
            Transform { basis, origin } => {
                w.write_u32::<LittleEndian>(provider.type_id("Transform")?)?;
                for r in basis {
                    write_floats(w, r)?;
                }
                write_floats(w, origin)?;
            }
            Color(v) => {
                w.write_u32::<LittleEndian>(provider.type_id("Color")?)?;
                write_floats(w, v)?;
            }
            NodePath { .. } => {
                return Err(GdscError::Unimplemented(
                    "node path constants cannot be re-encoded",
                ));
            }
        }
        Ok(())
    }

    /// Read one constant: tag word, then the tagged type's fixed payload.
    pub fn deserialize<R: Read>(r: &mut R, provider: &BytecodeProvider) -> Result<GdValue> {
        let tag = r.read_u32::<LittleEndian>()?;
        let wide = tag & WIDE_VALUE_FLAG != 0;
        let name = provider.type_name(tag & 0xFF)?;
        let value = match name {
            "Nil" => GdValue::Nil,
            "bool" => GdValue::Bool(r.read_u32::<LittleEndian>()? != 0),
            "int" => {
                if wide {
                    GdValue::Int64(r.read_u64::<LittleEndian>()?)
                } else {
                    GdValue::Int32(r.read_u32::<LittleEndian>()?)
                }
            }
            "float" => {
                if wide {
                    GdValue::Float64(r.read_f64::<LittleEndian>()?)
                } else {
                    GdValue::Float32(r.read_f32::<LittleEndian>()?)
                }
            }
            "String" => GdValue::Str(read_padded_string(r)?),
            "Vector2" => GdValue::Vector2(read_floats(r)?),
            "Rect2" => GdValue::Rect2 {
                position: read_floats(r)?,
                size: read_floats(r)?,
            },
            "Vector3" => GdValue::Vector3(read_floats(r)?),
            "Transform2D" | "Matrix32" => GdValue::Transform2d {
                origin: read_floats(r)?,
                x: read_floats(r)?,
                y: read_floats(r)?,
            },
            "Plane" => GdValue::Plane {
                normal: read_floats(r)?,
                d: r.read_f32::<LittleEndian>()?,
            },
            "Quat" => GdValue::Quat(read_floats(r)?),
            "AABB" => GdValue::Aabb {
                position: read_floats(r)?,
                size: read_floats(r)?,
            },
            "Basis" | "Matrix3" => GdValue::Basis([
                read_floats(r)?,
                read_floats(r)?,
                read_floats(r)?,
            ]),
            "Transform" => GdValue::Transform {
                basis: [read_floats(r)?, read_floats(r)?, read_floats(r)?],
                origin: read_floats(r)?,
            },
            "Color" => GdValue::Color(read_floats(r)?),
            "NodePath" => read_node_path(r)?,
            "RID" => return Err(GdscError::Unimplemented("RID constants")),
            other => {
                return Err(GdscError::Format(format!(
                    "constant type {other:?} has no known payload layout"
                )));
            }
        };
        Ok(value)
    }
}

fn write_floats<W: Write, const N: usize>(w: &mut W, v: &[f32; N]) -> Result<()> {
    for f in v {
        w.write_f32::<LittleEndian>(*f)?;
    }
    Ok(())
}

fn read_floats<R: Read, const N: usize>(r: &mut R) -> Result<[f32; N]> {
    let mut out = [0.0f32; N];
    for f in &mut out {
        *f = r.read_f32::<LittleEndian>()?;
    }
    Ok(out)
}

/// Length-prefixed UTF-8, zero-padded to a 4-byte boundary.
pub(crate) fn write_padded_string<W: Write>(w: &mut W, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    w.write_u32::<LittleEndian>(bytes.len() as u32)?;
    w.write_all(bytes)?;
    if bytes.len() % 4 != 0 {
        let padding = 4 - bytes.len() % 4;
        w.write_all(&[0u8; 4][..padding])?;
    }
    Ok(())
}

pub(crate) fn read_padded_string<R: Read>(r: &mut R) -> Result<String> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes)?;
    if len % 4 != 0 {
        let mut pad = [0u8; 4];
        r.read_exact(&mut pad[..4 - len % 4])?;
    }
    String::from_utf8(bytes)
        .map_err(|e| GdscError::Format(format!("constant string is not UTF-8: {e}")))
}

fn read_node_path<R: Read>(r: &mut R) -> Result<GdValue> {
    let first = r.read_u32::<LittleEndian>()?;
    if first & 0x8000_0000 == 0 {
        // The short (plain string) node path layout predates the
        // flagged one and is not produced by the supported revisions.
        return Err(GdscError::Unimplemented("unflagged node path constants"));
    }
    let name_count = first & 0x7FFF_FFFF;
    let mut subname_count = r.read_u32::<LittleEndian>()?;
    let flags = r.read_u32::<LittleEndian>()?;
    if flags & 2 != 0 {
        subname_count += 1;
    }
    let mut names = Vec::with_capacity(name_count as usize);
    for _ in 0..name_count {
        names.push(read_padded_string(r)?);
    }
    let mut subnames = Vec::with_capacity(subname_count as usize);
    for _ in 0..subname_count {
        subnames.push(read_padded_string(r)?);
    }
    Ok(GdValue::NodePath {
        names,
        subnames,
        absolute: flags & 1 != 0,
    })
}

/// Real literals keep an explicit decimal point so they re-tokenize as
/// floats rather than ints.
fn fmt_real(s: String) -> String {
    if s.contains('.') || s.contains('e') || s.contains("inf") || s.contains("NaN") {
        s
    } else {
        s + ".0"
    }
}

fn join<T: fmt::Display>(vals: &[T]) -> String {
    vals.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn vec2(v: &[f32; 2]) -> String {
    format!("Vector2({}, {})", v[0], v[1])
}

fn vec3(v: &[f32; 3]) -> String {
    format!("Vector3({}, {}, {})", v[0], v[1], v[2])
}

impl fmt::Display for GdValue {
    /// GDScript literal syntax, as the engine's own stringifier writes it.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use GdValue::*;
        match self {
            Nil => write!(f, "null"),
            Bool(v) => write!(f, "{v}"),
            Int32(v) => write!(f, "{v}"),
            Int64(v) => write!(f, "{v}"),
            Float32(v) => write!(f, "{}", fmt_real(v.to_string())),
            Float64(v) => write!(f, "{}", fmt_real(v.to_string())),
            Str(v) => write!(f, "\"{}\"", v.replace('"', "\\\"")),
            Vector2(v) => write!(f, "{}", vec2(v)),
            Rect2 { position, size } => write!(
                f,
                "Rect2({}, {}, {}, {})",
                position[0], position[1], size[0], size[1]
            ),
            Vector3(v) => write!(f, "{}", vec3(v)),
            Transform2d { origin, x, y } => {
                write!(f, "Transform2D({}, {}, {})", vec2(x), vec2(y), vec2(origin))
            }
            Plane { normal, d } => write!(f, "Plane({}, {})", vec3(normal), d),
            Quat(v) => write!(f, "Quat({})", join(v)),
            Aabb { position, size } => write!(f, "AABB({}, {})", vec3(position), vec3(size)),
            Basis(rows) => write!(
                f,
                "Basis({}, {}, {})",
                vec3(&rows[0]),
                vec3(&rows[1]),
                vec3(&rows[2])
            ),
            Transform { basis, origin } => write!(
                f,
                "Transform(Basis({}, {}, {}), {})",
                vec3(&basis[0]),
                vec3(&basis[1]),
                vec3(&basis[2]),
                vec3(origin)
            ),
            Color(v) => write!(f, "Color({})", join(v)),
            NodePath { names, subnames, absolute } => {
                let mut path = String::new();
                if *absolute {
                    path.push('/');
                }
                path.push_str(&names.join("/"));
                for sn in subnames {
                    path.push(':');
                    path.push_str(sn);
                }
                write!(f, "@\"{path}\"")
            }
        }
    }
}
