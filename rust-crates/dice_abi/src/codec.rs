//! Value codec for the contract's ABI wire format.
//!
//! Call arguments use the top-level encoding: minimal big-endian bytes,
//! rendered as hex and joined with `@` behind the function name. Return
//! payloads are nested-encoded: every field has a fixed width, so a list of
//! structs is a plain concatenation of fixed-size records.

use crate::schema::{
    FieldType,
    TypeSchema,
};
use std::fmt;
use thiserror::Error;

pub const ARG_SEPARATOR: &str = "@";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    Bool,
}

impl Primitive {
    pub fn parse(name: &str) -> Option<Self> {
        let primitive = match name {
            "u8" => Primitive::U8,
            "u16" => Primitive::U16,
            "u32" => Primitive::U32,
            "u64" => Primitive::U64,
            "i8" => Primitive::I8,
            "i16" => Primitive::I16,
            "i32" => Primitive::I32,
            "i64" => Primitive::I64,
            "bool" => Primitive::Bool,
            _ => return None,
        };
        Some(primitive)
    }

    pub fn width(self) -> usize {
        match self {
            Primitive::U8 | Primitive::I8 | Primitive::Bool => 1,
            Primitive::U16 | Primitive::I16 => 2,
            Primitive::U32 | Primitive::I32 => 4,
            Primitive::U64 | Primitive::I64 => 8,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64
        )
    }

    fn bounds(self) -> (i128, i128) {
        match self {
            Primitive::U8 => (0, u8::MAX.into()),
            Primitive::U16 => (0, u16::MAX.into()),
            Primitive::U32 => (0, u32::MAX.into()),
            Primitive::U64 => (0, u64::MAX.into()),
            Primitive::I8 => (i8::MIN.into(), i8::MAX.into()),
            Primitive::I16 => (i16::MIN.into(), i16::MAX.into()),
            Primitive::I32 => (i32::MIN.into(), i32::MAX.into()),
            Primitive::I64 => (i64::MIN.into(), i64::MAX.into()),
            Primitive::Bool => (0, 1),
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Primitive::U8 => "u8",
            Primitive::U16 => "u16",
            Primitive::U32 => "u32",
            Primitive::U64 => "u64",
            Primitive::I8 => "i8",
            Primitive::I16 => "i16",
            Primitive::I32 => "i32",
            Primitive::I64 => "i64",
            Primitive::Bool => "bool",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Int(i128),
    Bool(bool),
    Variant {
        enum_name: String,
        variant: String,
        discriminant: u8,
    },
}

impl From<u32> for AbiValue {
    fn from(value: u32) -> Self {
        AbiValue::Int(value.into())
    }
}

impl From<i32> for AbiValue {
    fn from(value: i32) -> Self {
        AbiValue::Int(value.into())
    }
}

impl From<u64> for AbiValue {
    fn from(value: u64) -> Self {
        AbiValue::Int(value.into())
    }
}

impl From<i64> for AbiValue {
    fn from(value: i64) -> Self {
        AbiValue::Int(value.into())
    }
}

impl From<bool> for AbiValue {
    fn from(value: bool) -> Self {
        AbiValue::Bool(value)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("value {value} does not fit {ty}")]
    OutOfRange { value: i128, ty: Primitive },
    #[error("value {value:?} cannot be encoded as {ty}")]
    TypeMismatch { value: AbiValue, ty: String },
    #[error("unknown struct type `{0}`")]
    UnknownStruct(String),
    #[error("`{type_name}` has {expected} fields, got {actual} values")]
    ArityMismatch {
        type_name: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("return payload is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("unknown struct type `{0}`")]
    UnknownStruct(String),
    #[error("field `{field}` of `{type_name}` has unresolvable type `{ty}`")]
    UnknownFieldType {
        type_name: String,
        field: String,
        ty: String,
    },
    #[error(
        "payload of {actual} bytes is not a whole number of `{type_name}` records ({record_size} bytes each)"
    )]
    LengthMismatch {
        type_name: String,
        record_size: usize,
        actual: usize,
    },
    #[error("discriminant {discriminant} is not declared by enum `{enum_name}`")]
    UnknownDiscriminant { enum_name: String, discriminant: u64 },
    #[error("field `{field}` holds {byte:#04x}, which is not a bool")]
    InvalidBool { field: String, byte: u8 },
    #[error("decoded `{type_name}` has no field `{field}`")]
    MissingField { type_name: String, field: String },
    #[error("field `{field}` holds {value:?}, expected {expected}")]
    UnexpectedValue {
        field: String,
        value: AbiValue,
        expected: &'static str,
    },
    #[error("payload decoded to zero `{0}` records")]
    Empty(String),
}

/// Encodes a single primitive and renders it as lowercase hex.
///
/// `nested` selects the fixed-width encoding used inside structs and lists;
/// otherwise the top-level (minimal) encoding used for call arguments applies.
pub fn encode_value(
    value: &AbiValue,
    ty: Primitive,
    nested: bool,
) -> Result<String, EncodeError> {
    let bytes = encode_bytes(value, ty, nested)?;
    Ok(hex::encode(bytes))
}

fn encode_bytes(
    value: &AbiValue,
    ty: Primitive,
    nested: bool,
) -> Result<Vec<u8>, EncodeError> {
    let int = match (value, ty) {
        (AbiValue::Bool(b), Primitive::Bool) => i128::from(*b),
        (AbiValue::Int(n), ty) if ty != Primitive::Bool => {
            let (min, max) = ty.bounds();
            if *n < min || *n > max {
                return Err(EncodeError::OutOfRange { value: *n, ty });
            }
            *n
        }
        (other, ty) => {
            return Err(EncodeError::TypeMismatch {
                value: other.clone(),
                ty: ty.to_string(),
            });
        }
    };
    let full = int.to_be_bytes();
    let fixed = &full[full.len() - ty.width()..];
    if nested {
        Ok(fixed.to_vec())
    } else {
        Ok(trim_top_level(fixed, ty.is_signed()).to_vec())
    }
}

// Drops redundant sign bytes while keeping the value's sign readable.
fn trim_top_level(bytes: &[u8], signed: bool) -> &[u8] {
    let negative = signed && bytes.first().is_some_and(|b| b & 0x80 != 0);
    let mut start = 0;
    if negative {
        while start + 1 < bytes.len()
            && bytes[start] == 0xff
            && bytes[start + 1] & 0x80 != 0
        {
            start += 1;
        }
        return &bytes[start..];
    }
    while start < bytes.len() && bytes[start] == 0 {
        start += 1;
    }
    if signed && start < bytes.len() && bytes[start] & 0x80 != 0 {
        start -= 1;
    }
    &bytes[start..]
}

/// Joins a function name and its encoded arguments into call data text.
pub fn encode_call(function: &str, encoded_args: &[String]) -> String {
    std::iter::once(function)
        .chain(encoded_args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(ARG_SEPARATOR)
}

/// Nested-encodes one record of `type_name`, values given in declared order.
pub fn encode_struct(
    values: &[AbiValue],
    type_name: &str,
    schema: &TypeSchema,
) -> Result<Vec<u8>, EncodeError> {
    let fields = schema
        .struct_fields(type_name)
        .ok_or_else(|| EncodeError::UnknownStruct(type_name.to_string()))?;
    if fields.len() != values.len() {
        return Err(EncodeError::ArityMismatch {
            type_name: type_name.to_string(),
            expected: fields.len(),
            actual: values.len(),
        });
    }
    let mut out = Vec::new();
    for (field, value) in fields.iter().zip(values) {
        match (schema.resolve(&field.ty), value) {
            (Some(FieldType::Primitive(primitive)), value) => {
                out.extend(encode_bytes(value, primitive, true)?);
            }
            (
                Some(FieldType::Enum(enum_name)),
                AbiValue::Variant {
                    enum_name: given,
                    discriminant,
                    ..
                },
            ) if given == enum_name => out.push(*discriminant),
            (_, value) => {
                return Err(EncodeError::TypeMismatch {
                    value: value.clone(),
                    ty: field.ty.clone(),
                });
            }
        }
    }
    Ok(out)
}

/// One decoded struct, fields in declared order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedStruct {
    pub type_name: String,
    pub fields: Vec<(String, AbiValue)>,
}

impl DecodedStruct {
    pub fn field(&self, name: &str) -> Result<&AbiValue, DecodeError> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
            .ok_or_else(|| DecodeError::MissingField {
                type_name: self.type_name.clone(),
                field: name.to_string(),
            })
    }
}

pub fn decode_hex(text: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(hex::decode(text.trim())?)
}

/// Decodes a top-level list of nested-encoded `type_name` records.
pub fn decode_struct_list(
    bytes: &[u8],
    type_name: &str,
    schema: &TypeSchema,
) -> Result<Vec<DecodedStruct>, DecodeError> {
    let fields = schema
        .struct_fields(type_name)
        .ok_or_else(|| DecodeError::UnknownStruct(type_name.to_string()))?;
    let mut layout = Vec::with_capacity(fields.len());
    for field in fields {
        let ty = schema.resolve(&field.ty).ok_or_else(|| {
            DecodeError::UnknownFieldType {
                type_name: type_name.to_string(),
                field: field.name.clone(),
                ty: field.ty.clone(),
            }
        })?;
        layout.push((field.name.as_str(), ty));
    }
    let record_size: usize = layout.iter().map(|(_, ty)| ty.width()).sum();
    if record_size == 0 || bytes.len() % record_size != 0 {
        return Err(DecodeError::LengthMismatch {
            type_name: type_name.to_string(),
            record_size,
            actual: bytes.len(),
        });
    }
    bytes
        .chunks_exact(record_size)
        .map(|record| decode_record(record, type_name, &layout, schema))
        .collect()
}

fn decode_record(
    record: &[u8],
    type_name: &str,
    layout: &[(&str, FieldType<'_>)],
    schema: &TypeSchema,
) -> Result<DecodedStruct, DecodeError> {
    let mut offset = 0;
    let mut fields = Vec::with_capacity(layout.len());
    for (name, ty) in layout {
        let raw = &record[offset..offset + ty.width()];
        offset += ty.width();
        let value = match ty {
            FieldType::Primitive(Primitive::Bool) => match raw[0] {
                0 => AbiValue::Bool(false),
                1 => AbiValue::Bool(true),
                byte => {
                    return Err(DecodeError::InvalidBool {
                        field: name.to_string(),
                        byte,
                    });
                }
            },
            FieldType::Primitive(primitive) => {
                AbiValue::Int(read_int(raw, primitive.is_signed()))
            }
            FieldType::Enum(enum_name) => decode_variant(raw[0], enum_name, schema)?,
        };
        fields.push((name.to_string(), value));
    }
    Ok(DecodedStruct {
        type_name: type_name.to_string(),
        fields,
    })
}

fn decode_variant(
    tag: u8,
    enum_name: &str,
    schema: &TypeSchema,
) -> Result<AbiValue, DecodeError> {
    schema
        .enum_variants(enum_name)
        .and_then(|variants| variants.iter().find(|v| v.discriminant == tag))
        .map(|v| AbiValue::Variant {
            enum_name: enum_name.to_string(),
            variant: v.name.clone(),
            discriminant: tag,
        })
        .ok_or_else(|| DecodeError::UnknownDiscriminant {
            enum_name: enum_name.to_string(),
            discriminant: tag.into(),
        })
}

fn read_int(raw: &[u8], signed: bool) -> i128 {
    let negative = signed && raw.first().is_some_and(|b| b & 0x80 != 0);
    let mut buf = if negative { [0xff; 16] } else { [0; 16] };
    buf[16 - raw.len()..].copy_from_slice(raw);
    i128::from_be_bytes(buf)
}
