use core::convert::Infallible;

use crate::address::Address;
use crate::error::{EncodingError, WalkError};

use super::DataComponent;

/// An unsigned or signed integer of up to 256 bits.
///
/// Stored as a big-endian magnitude and a sign; negative values are
/// rendered in two's complement when encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Number {
    magnitude: [u8; 32],
    negative: bool,
    bits: u16,
}

impl Number {
    pub fn uint(bits: u16, value: u128) -> Self {
        let mut magnitude = [0u8; 32];
        magnitude[16..].copy_from_slice(&value.to_be_bytes());
        Number {
            magnitude,
            negative: false,
            bits,
        }
    }

    pub fn int(bits: u16, value: i128) -> Self {
        let mut number = Number::uint(bits, value.unsigned_abs());
        number.negative = value < 0;
        number
    }

    /// Builds a number from a big-endian magnitude of at most 32 bytes.
    pub fn from_be_bytes(bits: u16, magnitude: &[u8], negative: bool) -> Result<Self, EncodingError> {
        if magnitude.len() > 32 {
            return Err(EncodingError::FieldTooLong {
                field: "integer",
                len: magnitude.len(),
                max: 32,
            });
        }
        let mut buf = [0u8; 32];
        buf[32 - magnitude.len()..].copy_from_slice(magnitude);
        Ok(Number {
            magnitude: buf,
            negative,
            bits,
        })
    }

    pub fn bits(&self) -> u16 {
        self.bits
    }

    /// The low `bits / 8` bytes of the 256-bit two's-complement value.
    pub fn encode(&self) -> Vec<u8> {
        let mut word = self.magnitude;
        if self.negative {
            for b in word.iter_mut() {
                *b = !*b;
            }
            for b in word.iter_mut().rev() {
                let (sum, carry) = b.overflowing_add(1);
                *b = sum;
                if !carry {
                    break;
                }
            }
        }
        let width = ((self.bits / 8) as usize).min(32);
        word[32 - width..].to_vec()
    }
}

/// A primitive value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AtomicValue {
    Number(Number),
    Bool(bool),
    Address(Address),
    String(String),
    /// `fixed_size` is set for `bytesN` values.
    Bytes {
        data: Vec<u8>,
        fixed_size: Option<u8>,
    },
}

impl AtomicValue {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            AtomicValue::Number(n) => n.encode(),
            AtomicValue::Bool(b) => vec![*b as u8],
            AtomicValue::Address(a) => a.0.to_vec(),
            AtomicValue::String(s) => s.as_bytes().to_vec(),
            AtomicValue::Bytes {
                data,
                fixed_size: Some(size),
            } if *size > 0 => {
                // bytesN is left-aligned, so short input is right-padded
                let mut out = data.clone();
                out.resize(*size as usize, 0);
                out
            }
            AtomicValue::Bytes { data, .. } => data.clone(),
        }
    }
}

/// A struct instance with its members in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructItem {
    pub type_name: String,
    pub members: Vec<(String, TypedItem)>,
}

impl StructItem {
    pub fn new(type_name: impl Into<String>) -> Self {
        StructItem {
            type_name: type_name.into(),
            members: Vec::new(),
        }
    }

    pub fn member(mut self, name: impl Into<String>, item: impl Into<TypedItem>) -> Self {
        self.members.push((name.into(), item.into()));
        self
    }
}

/// A node of a typed-data value tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypedItem {
    Struct(StructItem),
    Array(Vec<TypedItem>),
    Atomic(AtomicValue),
}

impl From<StructItem> for TypedItem {
    fn from(item: StructItem) -> Self {
        TypedItem::Struct(item)
    }
}

impl From<AtomicValue> for TypedItem {
    fn from(value: AtomicValue) -> Self {
        TypedItem::Atomic(value)
    }
}

/// One struct data command: its component and payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataCommand {
    pub component: DataComponent,
    pub value: Vec<u8>,
}

impl TypedItem {
    pub fn component(&self) -> DataComponent {
        match self {
            TypedItem::Struct(_) => DataComponent::Root,
            TypedItem::Array(_) => DataComponent::Array,
            TypedItem::Atomic(_) => DataComponent::Atomic,
        }
    }

    /// The struct data command announcing this node.
    pub fn data_command(&self) -> Result<DataCommand, EncodingError> {
        let value = match self {
            TypedItem::Struct(s) => s.type_name.as_bytes().to_vec(),
            TypedItem::Array(items) => {
                let count = u8::try_from(items.len()).map_err(|_| EncodingError::FieldTooLong {
                    field: "array",
                    len: items.len(),
                    max: u8::MAX as usize,
                })?;
                vec![count]
            }
            TypedItem::Atomic(value) => {
                let encoded = value.encode();
                if encoded.is_empty() {
                    Vec::new()
                } else {
                    let len = u16::try_from(encoded.len()).map_err(|_| EncodingError::FieldTooLong {
                        field: "atomic value",
                        len: encoded.len(),
                        max: u16::MAX as usize,
                    })?;
                    let mut out = Vec::with_capacity(2 + encoded.len());
                    out.extend_from_slice(&len.to_be_bytes());
                    out.extend(encoded);
                    out
                }
            }
        };
        Ok(DataCommand {
            component: self.component(),
            value,
        })
    }

    /// Pre-order traversal. Struct members extend the path with `.name`,
    /// array elements with `.[]`; at the root the dot is omitted. The first
    /// visitor error stops the walk.
    pub fn walk<'a, E, F>(&'a self, path: &str, visit: &mut F) -> Result<(), WalkError<E>>
    where
        F: FnMut(&str, &'a TypedItem) -> Result<(), E>,
    {
        visit(path, self).map_err(|source| WalkError {
            path: path.to_string(),
            source,
        })?;
        match self {
            TypedItem::Struct(s) => {
                for (name, member) in &s.members {
                    member.walk(&child_path(path, name), visit)?;
                }
            }
            TypedItem::Array(items) => {
                let element_path = child_path(path, "[]");
                for item in items {
                    item.walk(&element_path, visit)?;
                }
            }
            TypedItem::Atomic(_) => {}
        }
        Ok(())
    }

    /// Every node with its path, in walk order.
    pub fn nodes(&self, path: &str) -> Vec<(String, &TypedItem)> {
        let mut nodes = Vec::new();
        let walked = self.walk(path, &mut |p, item| {
            nodes.push((p.to_string(), item));
            Ok::<(), Infallible>(())
        });
        if let Err(err) = walked {
            match err.source {}
        }
        nodes
    }
}

fn child_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}
