use crate::codec::Primitive;
use serde::Deserialize;
use sha2::{
    Digest,
    Sha256,
};
use std::collections::BTreeMap;
use thiserror::Error;

/// The ABI document the client ships with. Field order must match the
/// deployed contract's layout.
pub const BUNDLED_ABI: &str = include_str!("../abi/dice.abi.json");

pub const BET_STRUCT: &str = "Bet";
pub const BET_TYPE_ENUM: &str = "BetType";

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid ABI document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("field `{field}` of `{type_name}` has unknown type `{ty}`")]
    UnknownFieldType {
        type_name: String,
        field: String,
        ty: String,
    },
    #[error("enum `{enum_name}` declares discriminant {discriminant} more than once")]
    DuplicateDiscriminant { enum_name: String, discriminant: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TypeDef {
    Struct { fields: Vec<FieldDef> },
    Enum { variants: Vec<VariantDef> },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VariantDef {
    pub name: String,
    pub discriminant: u8,
}

/// A struct field's type once resolved against the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType<'a> {
    Primitive(Primitive),
    Enum(&'a str),
}

impl FieldType<'_> {
    /// Width of the field in nested encoding. Enum tags take one byte.
    pub fn width(&self) -> usize {
        match self {
            FieldType::Primitive(primitive) => primitive.width(),
            FieldType::Enum(_) => 1,
        }
    }
}

#[derive(Deserialize)]
struct AbiDocument {
    types: BTreeMap<String, TypeDef>,
}

/// Read-only description of the contract's data layouts.
///
/// Loaded once at startup and shared by reference; there is no mutation path.
#[derive(Debug, Clone)]
pub struct TypeSchema {
    types: BTreeMap<String, TypeDef>,
    fingerprint: String,
}

impl TypeSchema {
    pub fn from_json(document: &str) -> Result<Self, SchemaError> {
        let parsed: AbiDocument = serde_json::from_str(document)?;
        let schema = Self {
            types: parsed.types,
            fingerprint: fingerprint(document.as_bytes()),
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn bundled() -> Result<Self, SchemaError> {
        Self::from_json(BUNDLED_ABI)
    }

    /// Hex SHA-256 of the document this schema was parsed from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    pub fn struct_fields(&self, name: &str) -> Option<&[FieldDef]> {
        match self.types.get(name)? {
            TypeDef::Struct { fields } => Some(fields),
            TypeDef::Enum { .. } => None,
        }
    }

    pub fn enum_variants(&self, name: &str) -> Option<&[VariantDef]> {
        match self.types.get(name)? {
            TypeDef::Enum { variants } => Some(variants),
            TypeDef::Struct { .. } => None,
        }
    }

    pub fn declares_discriminant(&self, enum_name: &str, discriminant: u64) -> bool {
        self.enum_variants(enum_name)
            .map(|variants| {
                variants
                    .iter()
                    .any(|v| u64::from(v.discriminant) == discriminant)
            })
            .unwrap_or(false)
    }

    pub fn resolve<'a>(&'a self, ty: &'a str) -> Option<FieldType<'a>> {
        if let Some(primitive) = Primitive::parse(ty) {
            return Some(FieldType::Primitive(primitive));
        }
        match self.types.get(ty)? {
            TypeDef::Enum { .. } => Some(FieldType::Enum(ty)),
            TypeDef::Struct { .. } => None,
        }
    }

    /// Fixed size in bytes of one nested-encoded record of `struct_name`.
    pub fn record_size(&self, struct_name: &str) -> Option<usize> {
        self.struct_fields(struct_name)?
            .iter()
            .map(|field| self.resolve(&field.ty).map(|ty| ty.width()))
            .sum()
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for (name, def) in &self.types {
            match def {
                TypeDef::Struct { fields } => {
                    for field in fields {
                        if self.resolve(&field.ty).is_none() {
                            return Err(SchemaError::UnknownFieldType {
                                type_name: name.clone(),
                                field: field.name.clone(),
                                ty: field.ty.clone(),
                            });
                        }
                    }
                }
                TypeDef::Enum { variants } => {
                    let mut seen = Vec::with_capacity(variants.len());
                    for variant in variants {
                        if seen.contains(&variant.discriminant) {
                            return Err(SchemaError::DuplicateDiscriminant {
                                enum_name: name.clone(),
                                discriminant: variant.discriminant,
                            });
                        }
                        seen.push(variant.discriminant);
                    }
                }
            }
        }
        Ok(())
    }
}

fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
