use crate::address::Address;
use crate::error::{ClearSigningError, WalkError};

use super::clear_sign::{ClearSigning, CoinRefMap, FieldFormat};
use super::item::{AtomicValue, Number, StructItem, TypedItem};
use super::types::{FieldDefinition, FieldType, TypeStruct};
use crate::constants::VERIFYING_CONTRACT_COIN_REF;

pub const DOMAIN_TYPE_NAME: &str = "EIP712Domain";

/// The signing domain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
    /// Included only when non-zero.
    pub salt: [u8; 32],
}

impl Domain {
    fn has_salt(&self) -> bool {
        self.salt != [0u8; 32]
    }

    pub fn type_struct(&self) -> TypeStruct {
        let mut members = vec![
            FieldDefinition::new(FieldType::String, "name"),
            FieldDefinition::new(FieldType::String, "version"),
            FieldDefinition::new(FieldType::Uint, "chainId").with_size(32),
            FieldDefinition::new(FieldType::Address, "verifyingContract"),
        ];
        if self.has_salt() {
            members.push(FieldDefinition::new(FieldType::FixedBytes, "salt").with_size(32));
        }
        TypeStruct::new(DOMAIN_TYPE_NAME, members)
    }

    pub fn struct_item(&self) -> TypedItem {
        let mut item = StructItem::new(DOMAIN_TYPE_NAME)
            .member("name", AtomicValue::String(self.name.clone()))
            .member("version", AtomicValue::String(self.version.clone()))
            .member(
                "chainId",
                AtomicValue::Number(Number::uint(256, self.chain_id as u128)),
            )
            .member(
                "verifyingContract",
                AtomicValue::Address(self.verifying_contract),
            );
        if self.has_salt() {
            item = item.member(
                "salt",
                AtomicValue::Bytes {
                    data: self.salt.to_vec(),
                    fixed_size: Some(32),
                },
            );
        }
        TypedItem::Struct(item)
    }
}

/// A complete typed-data message ready to be streamed to the device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Every struct type, including the domain type, in the order they are sent.
    pub types: Vec<TypeStruct>,
    pub domain: Domain,
    pub primary: TypedItem,
    pub clear_signing: Option<ClearSigning>,
}

impl Message {
    pub fn new(types: Vec<TypeStruct>, domain: Domain, primary: StructItem) -> Self {
        Message {
            types,
            domain,
            primary: TypedItem::Struct(primary),
            clear_signing: None,
        }
    }

    pub fn with_clear_signing(mut self, clear_signing: ClearSigning) -> Self {
        self.clear_signing = Some(clear_signing);
        self
    }

    /// Maps every coin reference used by a clear-signed field to the token
    /// contract it names: the address value of a `token` field, or the
    /// domain's verifying contract for an `amount` field using reference 255.
    /// The first address seen for a reference wins.
    pub fn coin_ref_map(&self) -> Result<CoinRefMap, WalkError<ClearSigningError>> {
        let mut map = CoinRefMap::new();
        let Some(cs) = &self.clear_signing else {
            return Ok(map);
        };
        self.primary.walk("", &mut |path, item| {
            let Some(field) = cs.fields.get(path) else {
                return Ok(());
            };
            let TypedItem::Atomic(value) = item else {
                return Err(ClearSigningError::NotAtomic {
                    path: path.to_string(),
                });
            };
            match field.format {
                FieldFormat::Token => {
                    let AtomicValue::Address(address) = value else {
                        return Err(ClearSigningError::NotAnAddress {
                            path: path.to_string(),
                        });
                    };
                    map.entry(field.coin_ref).or_insert(*address);
                }
                FieldFormat::Amount if field.coin_ref == VERIFYING_CONTRACT_COIN_REF => {
                    map.entry(field.coin_ref)
                        .or_insert(self.domain.verifying_contract);
                }
                _ => {}
            }
            Ok(())
        })?;
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eip712::clear_sign::ClearSigningField;
    use crate::eip712::DataComponent;

    fn domain(salt: [u8; 32]) -> Domain {
        Domain {
            name: "Permit2".into(),
            version: "1".into(),
            chain_id: 1,
            verifying_contract: Address([0xee; 20]),
            salt,
        }
    }

    fn cs_field(format: FieldFormat, coin_ref: u8) -> ClearSigningField {
        ClearSigningField {
            format,
            label: "x".into(),
            signature: vec![1],
            coin_ref,
        }
    }

    fn permit() -> StructItem {
        StructItem::new("Permit")
            .member("token", AtomicValue::Address(Address([0x11; 20])))
            .member("amount", AtomicValue::Number(Number::uint(160, 1000)))
            .member("deadline", AtomicValue::Number(Number::uint(48, 1)))
    }

    #[test]
    fn test_domain_without_salt() {
        let d = domain([0; 32]);
        let ty = d.type_struct();
        assert_eq!(ty.name, "EIP712Domain");
        assert_eq!(ty.members.len(), 4);
        assert_eq!(ty.members[2].size, Some(32));

        let nodes = d.struct_item().nodes("").len();
        assert_eq!(nodes, 5);
    }

    #[test]
    fn test_domain_with_salt() {
        let d = domain([0x5a; 32]);
        assert_eq!(d.type_struct().members.len(), 5);
        let item = d.struct_item();
        let nodes = item.nodes("");
        let (path, salt) = nodes.last().unwrap();
        assert_eq!(path, "salt");
        let cmd = salt.data_command().unwrap();
        assert_eq!(cmd.component, DataComponent::Atomic);
        assert_eq!(&cmd.value[..2], &[0x00, 0x20]);
    }

    #[test]
    fn test_coin_ref_map() {
        let mut cs = ClearSigning::default();
        cs.fields.insert("token".into(), cs_field(FieldFormat::Token, 0));
        cs.fields.insert("amount".into(), cs_field(FieldFormat::Amount, 255));
        cs.fields.insert("deadline".into(), cs_field(FieldFormat::Datetime, 0));
        let message = Message::new(vec![], domain([0; 32]), permit()).with_clear_signing(cs);

        let map = message.coin_ref_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&0], Address([0x11; 20]));
        assert_eq!(map[&255], Address([0xee; 20]));
    }

    #[test]
    fn test_coin_ref_map_keeps_first_token() {
        let primary = StructItem::new("Batch").member(
            "tokens",
            TypedItem::Array(vec![
                AtomicValue::Address(Address([0x11; 20])).into(),
                AtomicValue::Address(Address([0x22; 20])).into(),
            ]),
        );
        let mut cs = ClearSigning::default();
        cs.fields.insert("tokens.[]".into(), cs_field(FieldFormat::Token, 0));
        let message = Message::new(vec![], domain([0; 32]), primary).with_clear_signing(cs);

        let map = message.coin_ref_map().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&0], Address([0x11; 20]));
    }

    #[test]
    fn test_coin_ref_map_rejects_bad_token_field() {
        let mut cs = ClearSigning::default();
        cs.fields.insert("amount".into(), cs_field(FieldFormat::Token, 0));
        let message = Message::new(vec![], domain([0; 32]), permit()).with_clear_signing(cs);
        let err = message.coin_ref_map().unwrap_err();
        assert_eq!(err.path, "amount");
        assert_eq!(
            err.source,
            ClearSigningError::NotAnAddress {
                path: "amount".into()
            }
        );

        let primary = StructItem::new("Outer").member("inner", permit());
        let mut cs = ClearSigning::default();
        cs.fields.insert("inner".into(), cs_field(FieldFormat::Raw, 0));
        let message = Message::new(vec![], domain([0; 32]), primary).with_clear_signing(cs);
        assert!(matches!(
            message.coin_ref_map().unwrap_err().source,
            ClearSigningError::NotAtomic { .. }
        ));
    }

    #[test]
    fn test_coin_ref_map_without_clear_signing() {
        let message = Message::new(vec![], domain([0; 32]), permit());
        assert!(message.coin_ref_map().unwrap().is_empty());
    }
}
