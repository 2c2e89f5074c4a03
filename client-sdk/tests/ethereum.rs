use hex_literal::hex;
use ledger_eth_client_sdk::common::apdu::APDUCommand;
use ledger_eth_client_sdk::common::EncodingError;
use ledger_eth_client_sdk::test_utils::{ok, signature_response, status, MockDevice};
use ledger_eth_client_sdk::transport::FrameTransport;
use ledger_eth_client_sdk::{CallContext, ClientError, EthereumClient};

const PATH: &str = "m/44'/60'/0'/0/0";
const PATH_BYTES: [u8; 21] = hex!("05 8000002c 8000003c 80000000 00000000 00000000");

fn client(device: MockDevice) -> EthereumClient<FrameTransport<MockDevice>> {
    EthereumClient::new(FrameTransport::new(device))
}

/// Legacy EIP-155 transaction with `data_len` bytes of calldata and an
/// RLP-encoded chain id.
fn legacy_tx(data_len: u8, chain_id: &[u8]) -> Vec<u8> {
    let mut body = vec![0x01, 0x01, 0x82, 0x52, 0x08, 0x94];
    body.extend_from_slice(&[0x11; 20]);
    body.push(0x80);
    if data_len < 56 {
        body.push(0x80 + data_len);
    } else {
        body.extend_from_slice(&[0xb8, data_len]);
    }
    body.extend(std::iter::repeat(0xaa).take(data_len as usize));
    body.extend_from_slice(chain_id);
    body.extend_from_slice(&[0x80, 0x80]);
    let mut raw = if body.len() < 56 {
        vec![0xc0 + body.len() as u8]
    } else {
        vec![0xf8, body.len() as u8]
    };
    raw.extend(body);
    raw
}

#[tokio::test]
async fn test_sign_legacy_transaction_avoids_chain_id_boundary() {
    // 21 path bytes + 2 list header + 27 field bytes + 205 calldata bytes put
    // the chain id exactly at offset 255 of the payload
    let raw = legacy_tx(203, &[0x01]);
    assert_eq!(raw.len(), 237);
    assert_eq!(raw[234], 0x01);

    let device = MockDevice::scripted(vec![ok(&[]), signature_response(0x25)]);
    let log = device.log();
    let client = client(device);

    let sig = client
        .sign_transaction(&CallContext::background(), PATH, &raw)
        .await
        .unwrap();
    assert_eq!(sig.v, 0x25);
    assert_eq!(sig.r, [0x11; 32]);
    assert_eq!(sig.s, [0x22; 32]);

    let commands = log.commands();
    assert_eq!(commands.len(), 2);
    assert_eq!((commands[0].ins, commands[0].p1), (0x04, 0x00));
    assert_eq!((commands[1].ins, commands[1].p1), (0x04, 0x80));
    assert_eq!(commands[0].data.len(), 254);
    assert_eq!(commands[1].data.len(), 4);
    assert_eq!(&commands[0].data[..21], &PATH_BYTES);
    assert_eq!(commands[1].data, hex!("aa 01 80 80"));
}

#[tokio::test]
async fn test_sign_legacy_transaction_without_boundary() {
    let raw = legacy_tx(100, &[0x01]);
    let device = MockDevice::scripted(vec![signature_response(0x26)]);
    let log = device.log();

    let sig = client(device)
        .sign_transaction(&CallContext::background(), PATH, &raw)
        .await
        .unwrap();
    assert_eq!(sig.v, 0x26);
    let commands = log.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].data.len(), 21 + raw.len());
}

#[tokio::test]
async fn test_sign_legacy_transaction_recovers_large_v() {
    // chain 137: the device answers 35 + parity
    let raw = legacy_tx(10, &[0x81, 0x89]);

    let device = MockDevice::scripted(vec![signature_response(36)]);
    let sig = client(device)
        .sign_transaction(&CallContext::background(), PATH, &raw)
        .await
        .unwrap();
    assert_eq!(sig.v, 137 * 2 + 35 + 1);
}

#[tokio::test]
async fn test_sign_dynamic_fee_transaction_in_chunks() {
    let mut body = vec![0x01, 0x80, 0x01, 0x02, 0x03, 0x94];
    body.extend_from_slice(&[0x22; 20]);
    body.extend_from_slice(&[0x80, 0xb9, 0x01, 0x2c]);
    body.extend_from_slice(&[0xbb; 300]);
    body.push(0xc0);
    let mut raw = vec![0x02, 0xf9];
    raw.extend_from_slice(&(body.len() as u16).to_be_bytes());
    raw.extend(body);

    let device = MockDevice::scripted(vec![ok(&[]), signature_response(0x01)]);
    let log = device.log();
    let sig = client(device)
        .sign_transaction(&CallContext::background(), PATH, &raw)
        .await
        .unwrap();
    // typed transactions keep the raw parity
    assert_eq!(sig.v, 1);

    let commands = log.commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].data.len(), 255);
    assert_eq!(commands[1].data.len(), 21 + raw.len() - 255);
    assert_eq!(commands[1].p1, 0x80);
}

#[tokio::test]
async fn test_blob_transaction_is_rejected_before_io() {
    let mut body = vec![0x01, 0x80, 0x01, 0x02, 0x03, 0x94];
    body.extend_from_slice(&[0x33; 20]);
    body.extend_from_slice(&[0x80, 0x80, 0xc0, 0x01, 0xc0]);
    let mut raw = vec![0x03, 0xc0 + body.len() as u8];
    raw.extend(body);

    let device = MockDevice::always_ok(vec![]);
    let log = device.log();
    let err = client(device)
        .sign_transaction(&CallContext::background(), PATH, &raw)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Encoding(EncodingError::UnsupportedTxType(0x03))
    ));
    assert!(log.is_empty());
}

#[tokio::test]
async fn test_malformed_transaction_is_rejected_before_io() {
    let device = MockDevice::always_ok(vec![]);
    let log = device.log();
    let err = client(device)
        .sign_transaction(&CallContext::background(), PATH, &hex!("f8 05 01 02"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Encoding(_)));
    assert!(log.is_empty());
}

#[tokio::test]
async fn test_sign_personal_message() {
    let message = vec![0x42; 300];
    let device = MockDevice::scripted(vec![ok(&[]), signature_response(0x1c)]);
    let log = device.log();
    let sig = client(device)
        .sign_personal_message(&CallContext::background(), PATH, &message)
        .await
        .unwrap();
    assert_eq!(sig.v, 28);

    let commands = log.commands();
    assert_eq!(commands.len(), 2);
    assert_eq!((commands[0].ins, commands[0].p1), (0x08, 0x00));
    assert_eq!((commands[1].ins, commands[1].p1), (0x08, 0x80));
    assert_eq!(&commands[0].data[21..25], &hex!("0000012c"));
    assert_eq!(commands[1].data.len(), 21 + 4 + 300 - 255);
}

#[tokio::test]
async fn test_rejection_aborts_chunked_signing() {
    let message = vec![0x42; 600];
    let device = MockDevice::scripted(vec![ok(&[]), status(0x6985)]);
    let log = device.log();
    let err = client(device)
        .sign_personal_message(&CallContext::background(), PATH, &message)
        .await
        .unwrap_err();
    assert_eq!(err.status_word(), Some(0x6985));
    assert_eq!(log.len(), 2);
}

#[tokio::test]
async fn test_get_address() {
    let mut response = vec![65, 0x04];
    response.extend_from_slice(&[0xaa; 64]);
    response.push(40);
    response.extend_from_slice(b"5aaeb6053f3e94c9b9a09f33669435e7ef1beaed");
    response.extend_from_slice(&[0xcc; 32]);

    let device = MockDevice::always_ok(response);
    let log = device.log();
    let info = client(device)
        .get_address(&CallContext::background(), PATH, true, true, Some(1))
        .await
        .unwrap();
    assert_eq!(
        info.address.to_string(),
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
    );
    assert_eq!(info.chain_code, Some([0xcc; 32]));

    let command: APDUCommand = log.commands().remove(0);
    assert_eq!((command.ins, command.p1, command.p2), (0x02, 0x01, 0x01));
    assert_eq!(&command.data[..21], &PATH_BYTES);
    assert_eq!(&command.data[21..], &1u64.to_be_bytes());
}

#[tokio::test]
async fn test_invalid_path_is_rejected_before_io() {
    let device = MockDevice::always_ok(vec![]);
    let log = device.log();
    let err = client(device)
        .get_address(&CallContext::background(), "m/44'/sixty'", false, false, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Encoding(EncodingError::InvalidBip32Path { .. })
    ));
    assert!(log.is_empty());
}

#[tokio::test]
async fn test_sign_eip712_hashed() {
    let device = MockDevice::always_ok(signature_response(0x1b)[..65].to_vec());
    let log = device.log();
    let client = client(device);
    let sig = client
        .sign_eip712_hashed(&CallContext::background(), PATH, &[1; 32], &[2; 32])
        .await
        .unwrap();
    assert_eq!(sig.v, 27);
    let command = log.commands().remove(0);
    assert_eq!((command.ins, command.p1, command.p2), (0x0C, 0x00, 0x00));
    assert_eq!(command.data.len(), 21 + 64);

    let err = client
        .sign_eip712_hashed(&CallContext::background(), PATH, &[1; 31], &[2; 32])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Encoding(EncodingError::InvalidLength { .. })
    ));
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn test_auxiliary_instructions() {
    let device = MockDevice::new(|cmd| match cmd.ins {
        0x0A => ok(&[0x04]),
        0x0E => ok(&[0x99; 48]),
        0x18 => ok(&[cmd.p2; 32]),
        _ => ok(&[]),
    });
    let log = device.log();
    let client = client(device);
    let ctx = CallContext::background();

    assert_eq!(client.provide_erc20_information(&ctx, &[1, 2, 3]).await.unwrap(), 4);
    assert_eq!(client.eth2_get_public_key(&ctx, "m/12381/3600/0/0", false).await.unwrap(), vec![0x99; 48]);
    client.eth2_set_withdrawal_index(&ctx, 7).await.unwrap();
    assert_eq!(client.get_privacy_public_key(&ctx, PATH, true).await.unwrap(), vec![0x00; 32]);
    assert_eq!(
        client.get_privacy_shared_secret(&ctx, PATH, &[0x05; 32], false).await.unwrap(),
        vec![0x01; 32]
    );

    let commands = log.commands();
    assert_eq!(commands.len(), 5);
    assert_eq!(commands[2].data, hex!("00000007"));
    assert_eq!((commands[3].p1, commands[3].p2), (0x01, 0x00));
    assert_eq!((commands[4].p1, commands[4].p2), (0x00, 0x01));
    assert_eq!(&commands[4].data[21..], &[0x05; 32]);
}
