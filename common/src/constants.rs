/// Class byte shared by every Ethereum app instruction.
pub const CLA: u8 = 0xE0;

pub const INS_GET_PUBLIC_KEY: u8 = 0x02;
pub const INS_SIGN_TRANSACTION: u8 = 0x04;
pub const INS_GET_CONFIGURATION: u8 = 0x06;
pub const INS_SIGN_PERSONAL_MESSAGE: u8 = 0x08;
pub const INS_PROVIDE_ERC20_INFORMATION: u8 = 0x0A;
pub const INS_SIGN_EIP712: u8 = 0x0C;
pub const INS_ETH2_GET_PUBLIC_KEY: u8 = 0x0E;
pub const INS_ETH2_SET_WITHDRAWAL_INDEX: u8 = 0x10;
pub const INS_PERFORM_PRIVACY_OPERATION: u8 = 0x18;
pub const INS_EIP712_STRUCT_DEFINITION: u8 = 0x1A;
pub const INS_EIP712_STRUCT_DATA: u8 = 0x1C;
pub const INS_EIP712_CLEAR_SIGNING: u8 = 0x1E;

pub const P1_WITHOUT_CONFIRM: u8 = 0x00;
pub const P1_WITH_CONFIRM: u8 = 0x01;

// Chunk markers for transaction and personal-message signing.
pub const P1_FIRST_CHUNK: u8 = 0x00;
pub const P1_MORE_CHUNK: u8 = 0x80;

// Chunk markers for EIP-712 struct data.
pub const P1_PARTIAL_DATA: u8 = 0x01;
pub const P1_COMPLETE_DATA: u8 = 0x00;

pub const P2_NO_CHAIN_CODE: u8 = 0x00;
pub const P2_WITH_CHAIN_CODE: u8 = 0x01;

pub const P2_PRIVACY_PUBLIC_KEY: u8 = 0x00;
pub const P2_PRIVACY_SHARED_SECRET: u8 = 0x01;

/// Second parameter of `INS_SIGN_EIP712` selecting the full-message mode.
pub const P2_EIP712_FULL: u8 = 0x01;

/// Maximum data bytes in a short APDU.
pub const MAX_APDU_DATA_LENGTH: usize = 255;

/// Sentinel coin reference standing for the domain's verifying contract.
pub const VERIFYING_CONTRACT_COIN_REF: u8 = 0xFF;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eip712_instructions_are_distinct() {
        let ins = [
            INS_SIGN_EIP712,
            INS_EIP712_STRUCT_DEFINITION,
            INS_EIP712_STRUCT_DATA,
            INS_EIP712_CLEAR_SIGNING,
        ];
        for (i, a) in ins.iter().enumerate() {
            for b in &ins[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
