use crate::error::EncodingError;

use super::{length_prefixed, TypeComponent};

const TYPE_IS_ARRAY: u8 = 0x80;
const TYPE_SIZE_SPECIFIED: u8 = 0x40;

const ARRAY_DYNAMIC: u8 = 0x00;
const ARRAY_FIXED: u8 = 0x01;

/// Base type of a struct member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    /// Reference to another struct type by name.
    Custom(String),
    Int,
    Uint,
    Address,
    Bool,
    String,
    FixedBytes,
    DynamicBytes,
}

impl FieldType {
    fn code(&self) -> u8 {
        match self {
            FieldType::Custom(_) => 0,
            FieldType::Int => 1,
            FieldType::Uint => 2,
            FieldType::Address => 3,
            FieldType::Bool => 4,
            FieldType::String => 5,
            FieldType::FixedBytes => 6,
            FieldType::DynamicBytes => 7,
        }
    }
}

/// One dimension of an array type, outermost first.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArrayLevel {
    Dynamic,
    Fixed(u8),
}

/// A member declaration inside a struct type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDefinition {
    pub field_type: FieldType,
    /// Byte width for sized types such as `uint64` (8) or `bytes4` (4).
    pub size: Option<u8>,
    pub array_levels: Vec<ArrayLevel>,
    pub key: String,
}

impl FieldDefinition {
    pub fn new(field_type: FieldType, key: impl Into<String>) -> Self {
        FieldDefinition {
            field_type,
            size: None,
            array_levels: Vec::new(),
            key: key.into(),
        }
    }

    pub fn with_size(mut self, size: u8) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_array_level(mut self, level: ArrayLevel) -> Self {
        self.array_levels.push(level);
        self
    }

    /// Parses a Solidity-style type such as `uint256`, `bytes32[]` or `Person[2][]`.
    pub fn parse(type_str: &str, key: impl Into<String>) -> Result<Self, EncodingError> {
        let unsupported = || EncodingError::UnsupportedType(type_str.to_string());

        let (base, mut dims) = match type_str.find('[') {
            Some(i) => type_str.split_at(i),
            None => (type_str, ""),
        };

        let mut array_levels = Vec::new();
        while !dims.is_empty() {
            let inner = dims.strip_prefix('[').ok_or_else(unsupported)?;
            let close = inner.find(']').ok_or_else(unsupported)?;
            let level = match &inner[..close] {
                "" => ArrayLevel::Dynamic,
                n => ArrayLevel::Fixed(n.parse().map_err(|_| unsupported())?),
            };
            array_levels.push(level);
            dims = &inner[close + 1..];
        }

        let (field_type, size) = match base {
            "address" => (FieldType::Address, None),
            "bool" => (FieldType::Bool, None),
            "string" => (FieldType::String, None),
            "bytes" => (FieldType::DynamicBytes, None),
            "int" => (FieldType::Int, Some(32)),
            "uint" => (FieldType::Uint, Some(32)),
            _ => {
                if let Some(digits) = numeric_suffix(base, "uint") {
                    (FieldType::Uint, Some(int_width(digits).ok_or_else(unsupported)?))
                } else if let Some(digits) = numeric_suffix(base, "int") {
                    (FieldType::Int, Some(int_width(digits).ok_or_else(unsupported)?))
                } else if let Some(digits) = numeric_suffix(base, "bytes") {
                    let n: u8 = digits.parse().map_err(|_| unsupported())?;
                    if !(1..=32).contains(&n) {
                        return Err(unsupported());
                    }
                    (FieldType::FixedBytes, Some(n))
                } else if is_identifier(base) {
                    (FieldType::Custom(base.to_string()), None)
                } else {
                    return Err(unsupported());
                }
            }
        };

        Ok(FieldDefinition {
            field_type,
            size,
            array_levels,
            key: key.into(),
        })
    }

    /// Wire form of a field declaration:
    /// `desc || [nameLen || name] || [size] || [levels || (kind || [size])*] || keyLen || key`.
    pub fn encode(&self) -> Result<Vec<u8>, EncodingError> {
        let mut desc = self.field_type.code();
        if !self.array_levels.is_empty() {
            desc |= TYPE_IS_ARRAY;
        }
        if self.size.is_some() {
            desc |= TYPE_SIZE_SPECIFIED;
        }

        let mut out = vec![desc];
        if let FieldType::Custom(name) = &self.field_type {
            out.extend(length_prefixed("type name", name.as_bytes())?);
        }
        if let Some(size) = self.size {
            out.push(size);
        }
        if !self.array_levels.is_empty() {
            let count = u8::try_from(self.array_levels.len()).map_err(|_| {
                EncodingError::FieldTooLong {
                    field: "array levels",
                    len: self.array_levels.len(),
                    max: u8::MAX as usize,
                }
            })?;
            out.push(count);
            for level in &self.array_levels {
                match level {
                    ArrayLevel::Dynamic => out.push(ARRAY_DYNAMIC),
                    ArrayLevel::Fixed(n) => out.extend_from_slice(&[ARRAY_FIXED, *n]),
                }
            }
        }
        out.extend(length_prefixed("key name", self.key.as_bytes())?);
        Ok(out)
    }
}

/// The digits after `prefix`, when everything after it is a non-empty number.
fn numeric_suffix<'a>(base: &'a str, prefix: &str) -> Option<&'a str> {
    let digits = base.strip_prefix(prefix)?;
    (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())).then_some(digits)
}

/// Byte width of an `intN`/`uintN` type.
fn int_width(bits: &str) -> Option<u8> {
    let bits: u16 = bits.parse().ok()?;
    (bits > 0 && bits <= 256 && bits % 8 == 0).then_some((bits / 8) as u8)
}

fn is_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();
    matches!(bytes.next(), Some(b) if b.is_ascii_alphabetic() || b == b'_' || b == b'$')
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$')
}

/// A named struct type and its ordered members.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeStruct {
    pub name: String,
    pub members: Vec<FieldDefinition>,
}

impl TypeStruct {
    pub fn new(name: impl Into<String>, members: Vec<FieldDefinition>) -> Self {
        TypeStruct {
            name: name.into(),
            members,
        }
    }

    /// Definition commands for this type: its name, then one per member.
    pub fn definition_commands(&self) -> Result<Vec<(TypeComponent, Vec<u8>)>, EncodingError> {
        let mut commands = Vec::with_capacity(1 + self.members.len());
        commands.push((TypeComponent::Name, self.name.as_bytes().to_vec()));
        for member in &self.members {
            commands.push((TypeComponent::Field, member.encode()?));
        }
        Ok(commands)
    }
}
