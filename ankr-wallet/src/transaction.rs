//! Transfer transactions
//!
//! A transfer is a header plus a message, serialized with a canonical
//! tag-length-value encoding (1-byte tag, 4-byte big-endian length, value)
//! in a fixed field order. The signature covers exactly
//! `TLV(0x01, header) || TLV(0x02, message)`. The envelope appends the
//! signer's public key and the signature so a node can verify it.

use ankr_crypto_keystore::{derive_address, KeyPair};
use ed25519_dalek::{Signature, VerifyingKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::error::{WalletError, WalletResult};
use crate::rpc_pool::{Endpoint, RpcClient};

const TAG_HEADER: u8 = 0x01;
const TAG_MESSAGE: u8 = 0x02;
const TAG_PUBLIC_KEY: u8 = 0x03;
const TAG_SIGNATURE: u8 = 0x04;

const TAG_HEADER_CHAIN_ID: u8 = 0x01;
const TAG_HEADER_GAS_LIMIT: u8 = 0x02;
const TAG_HEADER_GAS_PRICE: u8 = 0x03;
const TAG_HEADER_VERSION: u8 = 0x04;
const TAG_HEADER_MEMO: u8 = 0x05;

const TAG_AMOUNT_SYMBOL: u8 = 0x01;
const TAG_AMOUNT_DECIMALS: u8 = 0x02;
const TAG_AMOUNT_VALUE: u8 = 0x03;

const TAG_MSG_FROM: u8 = 0x01;
const TAG_MSG_TO: u8 = 0x02;
const TAG_MSG_AMOUNT: u8 = 0x03;

/// Hex characters in an account address
const ADDRESS_HEX_LEN: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Currency {
    pub symbol: String,
    pub decimals: u8,
}

impl Currency {
    pub fn new(symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
        }
    }
}

/// A value in the smallest unit of `currency`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amount {
    pub currency: Currency,
    pub value: u128,
}

impl Amount {
    pub fn new(currency: Currency, value: u128) -> Self {
        Self { currency, value }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency.symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxHeader {
    pub chain_id: String,
    pub gas_limit: u64,
    pub gas_price: Amount,
    pub version: String,
    pub memo: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferMsg {
    pub from: String,
    pub to: String,
    pub amounts: Vec<Amount>,
}

/// Result of a committed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: String,
    pub height: u64,
}

// ============================================================================
// Canonical encoding
// ============================================================================

#[derive(Default)]
struct TlvWriter {
    buf: Vec<u8>,
}

impl TlvWriter {
    fn put(&mut self, tag: u8, value: &[u8]) -> WalletResult<()> {
        let len = u32::try_from(value.len()).map_err(|_| {
            WalletError::InvalidTransfer(format!("field 0x{:02x} is too large", tag))
        })?;
        self.buf.push(tag);
        self.buf.extend_from_slice(&len.to_be_bytes());
        self.buf.extend_from_slice(value);
        Ok(())
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

struct TlvReader<'a> {
    data: &'a [u8],
}

impl<'a> TlvReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn peek_tag(&self) -> Option<u8> {
        self.data.first().copied()
    }

    fn expect(&mut self, tag: u8) -> WalletResult<&'a [u8]> {
        let data = self.data;
        if data.len() < 5 {
            return Err(WalletError::Format(format!(
                "truncated field, expected tag 0x{:02x}",
                tag
            )));
        }
        if data[0] != tag {
            return Err(WalletError::Format(format!(
                "expected tag 0x{:02x}, found 0x{:02x}",
                tag, data[0]
            )));
        }
        let len = u32::from_be_bytes([data[1], data[2], data[3], data[4]]) as usize;
        let rest = &data[5..];
        if rest.len() < len {
            return Err(WalletError::Format(format!(
                "field 0x{:02x} declares {} bytes, {} available",
                tag,
                len,
                rest.len()
            )));
        }
        let (value, remaining) = rest.split_at(len);
        self.data = remaining;
        Ok(value)
    }

    fn finish(self) -> WalletResult<()> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(WalletError::Format(format!(
                "{} trailing bytes",
                self.data.len()
            )))
        }
    }
}

/// Big-endian bytes with leading zeros removed; zero encodes as empty
fn minimal_be(value: u128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

fn read_minimal_be(bytes: &[u8], max_len: usize) -> WalletResult<u128> {
    if bytes.len() > max_len {
        return Err(WalletError::Format(format!(
            "integer of {} bytes exceeds {} bytes",
            bytes.len(),
            max_len
        )));
    }
    if bytes.first() == Some(&0) {
        return Err(WalletError::Format("integer has a leading zero byte".to_string()));
    }
    Ok(bytes.iter().fold(0u128, |acc, b| (acc << 8) | u128::from(*b)))
}

fn read_string(bytes: &[u8]) -> WalletResult<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| WalletError::Format(e.to_string()))
}

fn encode_amount(amount: &Amount) -> WalletResult<Vec<u8>> {
    let mut w = TlvWriter::default();
    w.put(TAG_AMOUNT_SYMBOL, amount.currency.symbol.as_bytes())?;
    w.put(TAG_AMOUNT_DECIMALS, &[amount.currency.decimals])?;
    w.put(TAG_AMOUNT_VALUE, &minimal_be(amount.value))?;
    Ok(w.finish())
}

fn decode_amount(bytes: &[u8]) -> WalletResult<Amount> {
    let mut r = TlvReader::new(bytes);
    let symbol = read_string(r.expect(TAG_AMOUNT_SYMBOL)?)?;
    let decimals = match r.expect(TAG_AMOUNT_DECIMALS)? {
        [d] => *d,
        other => {
            return Err(WalletError::Format(format!(
                "decimals must be 1 byte, got {}",
                other.len()
            )))
        }
    };
    let value = read_minimal_be(r.expect(TAG_AMOUNT_VALUE)?, 16)?;
    r.finish()?;
    Ok(Amount::new(Currency::new(symbol, decimals), value))
}

impl TxHeader {
    pub fn encode(&self) -> WalletResult<Vec<u8>> {
        let mut w = TlvWriter::default();
        w.put(TAG_HEADER_CHAIN_ID, self.chain_id.as_bytes())?;
        w.put(TAG_HEADER_GAS_LIMIT, &minimal_be(u128::from(self.gas_limit)))?;
        w.put(TAG_HEADER_GAS_PRICE, &encode_amount(&self.gas_price)?)?;
        w.put(TAG_HEADER_VERSION, self.version.as_bytes())?;
        w.put(TAG_HEADER_MEMO, self.memo.as_bytes())?;
        Ok(w.finish())
    }

    pub fn decode(bytes: &[u8]) -> WalletResult<Self> {
        let mut r = TlvReader::new(bytes);
        let chain_id = read_string(r.expect(TAG_HEADER_CHAIN_ID)?)?;
        let gas_limit = read_minimal_be(r.expect(TAG_HEADER_GAS_LIMIT)?, 8)? as u64;
        let gas_price = decode_amount(r.expect(TAG_HEADER_GAS_PRICE)?)?;
        let version = read_string(r.expect(TAG_HEADER_VERSION)?)?;
        let memo = read_string(r.expect(TAG_HEADER_MEMO)?)?;
        r.finish()?;
        Ok(Self {
            chain_id,
            gas_limit,
            gas_price,
            version,
            memo,
        })
    }
}

impl TransferMsg {
    pub fn encode(&self) -> WalletResult<Vec<u8>> {
        let mut w = TlvWriter::default();
        w.put(TAG_MSG_FROM, self.from.as_bytes())?;
        w.put(TAG_MSG_TO, self.to.as_bytes())?;
        for amount in &self.amounts {
            w.put(TAG_MSG_AMOUNT, &encode_amount(amount)?)?;
        }
        Ok(w.finish())
    }

    pub fn decode(bytes: &[u8]) -> WalletResult<Self> {
        let mut r = TlvReader::new(bytes);
        let from = read_string(r.expect(TAG_MSG_FROM)?)?;
        let to = read_string(r.expect(TAG_MSG_TO)?)?;
        let mut amounts = Vec::new();
        while r.peek_tag() == Some(TAG_MSG_AMOUNT) {
            amounts.push(decode_amount(r.expect(TAG_MSG_AMOUNT)?)?);
        }
        r.finish()?;
        Ok(Self { from, to, amounts })
    }
}

/// Bytes covered by the signature
pub fn sign_bytes(header: &TxHeader, message: &TransferMsg) -> WalletResult<Vec<u8>> {
    let mut w = TlvWriter::default();
    w.put(TAG_HEADER, &header.encode()?)?;
    w.put(TAG_MESSAGE, &message.encode()?)?;
    Ok(w.finish())
}

// ============================================================================
// Signed envelope
// ============================================================================

/// A signed transfer ready for broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEnvelope {
    pub header: TxHeader,
    pub message: TransferMsg,
    pub public_key: [u8; PUBLIC_KEY_LENGTH],
    pub signature: [u8; SIGNATURE_LENGTH],
}

impl SignedEnvelope {
    pub fn encode(&self) -> WalletResult<Vec<u8>> {
        let mut w = TlvWriter::default();
        w.put(TAG_HEADER, &self.header.encode()?)?;
        w.put(TAG_MESSAGE, &self.message.encode()?)?;
        w.put(TAG_PUBLIC_KEY, &self.public_key)?;
        w.put(TAG_SIGNATURE, &self.signature)?;
        Ok(w.finish())
    }

    pub fn decode(bytes: &[u8]) -> WalletResult<Self> {
        let mut r = TlvReader::new(bytes);
        let header = TxHeader::decode(r.expect(TAG_HEADER)?)?;
        let message = TransferMsg::decode(r.expect(TAG_MESSAGE)?)?;
        let public_key = <[u8; PUBLIC_KEY_LENGTH]>::try_from(r.expect(TAG_PUBLIC_KEY)?)
            .map_err(|_| WalletError::Format("public key must be 32 bytes".to_string()))?;
        let signature = <[u8; SIGNATURE_LENGTH]>::try_from(r.expect(TAG_SIGNATURE)?)
            .map_err(|_| WalletError::Format("signature must be 64 bytes".to_string()))?;
        r.finish()?;
        Ok(Self {
            header,
            message,
            public_key,
            signature,
        })
    }

    /// Check the signature and that the signer owns `message.from`
    pub fn verify(&self) -> WalletResult<()> {
        let public_key =
            VerifyingKey::from_bytes(&self.public_key).map_err(|_| WalletError::Integrity)?;
        if derive_address(&public_key) != self.message.from {
            return Err(WalletError::Integrity);
        }
        let signature = Signature::from_bytes(&self.signature);
        let bytes = sign_bytes(&self.header, &self.message)?;
        public_key
            .verify_strict(&bytes, &signature)
            .map_err(|_| WalletError::Integrity)
    }

    /// Uppercase hex SHA-256 of the encoded envelope
    pub fn tx_hash(&self) -> WalletResult<String> {
        Ok(hex::encode_upper(Sha256::digest(self.encode()?)))
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct TransactionBuilder {
    header: TxHeader,
    message: TransferMsg,
}

impl TransactionBuilder {
    pub fn new(header: TxHeader, message: TransferMsg) -> Self {
        Self { header, message }
    }

    /// Validate, then sign with `key`.
    ///
    /// An empty `from` is filled with the key's address; any other `from`
    /// must equal it.
    pub fn build(self, key: &KeyPair) -> WalletResult<SignedEnvelope> {
        let Self { header, mut message } = self;

        if message.from.is_empty() {
            message.from = key.address().to_string();
        } else if message.from != key.address() {
            return Err(WalletError::InvalidTransfer(format!(
                "sender {} does not match signing key {}",
                message.from,
                key.address()
            )));
        }
        validate_address(&message.to)?;
        if message.amounts.is_empty() {
            return Err(WalletError::InvalidTransfer(
                "transfer has no amounts".to_string(),
            ));
        }
        if let Some(zero) = message.amounts.iter().find(|a| a.value == 0) {
            return Err(WalletError::InvalidTransfer(format!(
                "amount of {} is zero",
                zero.currency.symbol
            )));
        }
        if header.chain_id.is_empty() {
            return Err(WalletError::InvalidTransfer("chain id is empty".to_string()));
        }

        let bytes = sign_bytes(&header, &message)?;
        let signature = key.sign(&bytes);
        debug!("Signed transfer of {} bytes", bytes.len());

        Ok(SignedEnvelope {
            header,
            message,
            public_key: key.public_key().to_bytes(),
            signature: signature.to_bytes(),
        })
    }
}

/// Broadcast `envelope` to `endpoint` and wait for the commit. No retry.
pub async fn submit(
    envelope: &SignedEnvelope,
    endpoint: &Endpoint,
    timeout: Duration,
) -> WalletResult<Receipt> {
    let client = RpcClient::new(endpoint.clone(), timeout)?;
    let receipt = client.broadcast_tx_commit(envelope).await?;
    let local_hash = envelope.tx_hash()?;
    if !receipt.tx_hash.eq_ignore_ascii_case(&local_hash) {
        debug!(
            "Node reported hash {} for local hash {}",
            receipt.tx_hash, local_hash
        );
    }
    Ok(receipt)
}

/// Check an account address: 40 hex characters
pub fn validate_address(address: &str) -> WalletResult<()> {
    if address.len() != ADDRESS_HEX_LEN || !address.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WalletError::InvalidTransfer(format!(
            "invalid address {:?}",
            address
        )));
    }
    Ok(())
}

/// Parse a non-negative decimal integer in the smallest unit, as typed on
/// the command line
pub fn parse_amount(s: &str) -> WalletResult<u128> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WalletError::InvalidTransfer(format!(
            "cannot parse amount {:?}",
            s
        )));
    }
    s.parse::<u128>()
        .map_err(|_| WalletError::InvalidTransfer(format!("amount {} is too large", s)))
}

// ============================================================================
// Transfer state machine
// ============================================================================

/// Progress of one transfer. Stages only move forward, one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    Idle,
    KeyLoaded,
    PasswordVerified,
    EndpointSelected,
    Signed,
    Submitted,
    Confirmed,
    Failed,
}

impl TransferStage {
    fn successor(self) -> Option<Self> {
        use TransferStage::*;
        match self {
            Idle => Some(KeyLoaded),
            KeyLoaded => Some(PasswordVerified),
            PasswordVerified => Some(EndpointSelected),
            EndpointSelected => Some(Signed),
            Signed => Some(Submitted),
            Submitted => Some(Confirmed),
            Confirmed | Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TransferStage::Confirmed | TransferStage::Failed)
    }

    /// Move to `next`, which must directly follow the current stage
    pub fn advance(&mut self, next: TransferStage) -> WalletResult<()> {
        if self.successor() != Some(next) {
            return Err(WalletError::InvalidTransfer(format!(
                "cannot move from {:?} to {:?}",
                self, next
            )));
        }
        debug!("Transfer {:?} -> {:?}", self, next);
        *self = next;
        Ok(())
    }

    /// Mark the transfer failed. No effect once terminal.
    pub fn fail(&mut self) {
        if !self.is_terminal() {
            debug!("Transfer {:?} -> Failed", self);
            *self = TransferStage::Failed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ankr() -> Currency {
        Currency::new("ANKR", 18)
    }

    fn header() -> TxHeader {
        TxHeader {
            chain_id: "ankr-chain".to_string(),
            gas_limit: 20_000,
            gas_price: Amount::new(ankr(), 10_000_000_000_000_000),
            version: "1.0".to_string(),
            memo: "rent".to_string(),
        }
    }

    fn message(from: &str) -> TransferMsg {
        TransferMsg {
            from: from.to_string(),
            to: "B508ED0D54597D516A680E7951F18CAD24C7EC9F".to_string(),
            amounts: vec![Amount::new(ankr(), 5_000_000_000_000_000_000)],
        }
    }

    mod encoding {
        use super::*;

        #[test]
        fn test_minimal_be() {
            assert!(minimal_be(0).is_empty());
            assert_eq!(minimal_be(1), vec![1]);
            assert_eq!(minimal_be(20_000), vec![0x4e, 0x20]);
            assert_eq!(minimal_be(u128::MAX).len(), 16);
            assert_eq!(read_minimal_be(&[0x4e, 0x20], 8).unwrap(), 20_000);
            assert_eq!(read_minimal_be(&[], 8).unwrap(), 0);
            assert!(read_minimal_be(&[0, 1], 8).is_err());
            assert!(read_minimal_be(&[1; 9], 8).is_err());
        }

        #[test]
        fn test_header_layout() {
            let bytes = header().encode().unwrap();
            assert_eq!(bytes[0], TAG_HEADER_CHAIN_ID);
            assert_eq!(&bytes[1..5], &10u32.to_be_bytes());
            assert_eq!(&bytes[5..15], b"ankr-chain");
            assert_eq!(bytes[15], TAG_HEADER_GAS_LIMIT);
            assert_eq!(&bytes[16..20], &2u32.to_be_bytes());
            assert_eq!(&bytes[20..22], &[0x4e, 0x20]);
            assert_eq!(TxHeader::decode(&bytes).unwrap(), header());
        }

        #[test]
        fn test_encoding_is_canonical() {
            let a = sign_bytes(&header(), &message("A")).unwrap();
            let b = sign_bytes(&header(), &message("A")).unwrap();
            assert_eq!(a, b);
            let mut other = header();
            other.memo = "rent!".to_string();
            assert_ne!(a, sign_bytes(&other, &message("A")).unwrap());
        }

        #[test]
        fn test_message_with_several_amounts() {
            let mut msg = message("A");
            msg.amounts.push(Amount::new(Currency::new("USDT", 6), 7));
            let decoded = TransferMsg::decode(&msg.encode().unwrap()).unwrap();
            assert_eq!(decoded, msg);
        }

        #[test]
        fn test_decode_rejects_garbage() {
            let mut bytes = header().encode().unwrap();
            assert!(matches!(
                TxHeader::decode(&bytes[..bytes.len() - 1]),
                Err(WalletError::Format(_))
            ));
            bytes.push(0);
            assert!(matches!(TxHeader::decode(&bytes), Err(WalletError::Format(_))));
            assert!(matches!(
                SignedEnvelope::decode(&[0x02, 0, 0, 0, 0]),
                Err(WalletError::Format(_))
            ));
        }
    }

    mod signing {
        use super::*;

        #[test]
        fn test_build_and_verify() {
            let key = KeyPair::generate().unwrap();
            let envelope = TransactionBuilder::new(header(), message(""))
                .build(&key)
                .unwrap();
            assert_eq!(envelope.message.from, key.address());
            envelope.verify().unwrap();

            let decoded = SignedEnvelope::decode(&envelope.encode().unwrap()).unwrap();
            assert_eq!(decoded, envelope);
            decoded.verify().unwrap();
        }

        #[test]
        fn test_tampered_envelope_fails_verification() {
            let key = KeyPair::generate().unwrap();
            let mut envelope = TransactionBuilder::new(header(), message(key.address()))
                .build(&key)
                .unwrap();
            envelope.message.amounts[0].value += 1;
            assert!(matches!(envelope.verify(), Err(WalletError::Integrity)));
        }

        #[test]
        fn test_foreign_public_key_fails_verification() {
            let key = KeyPair::generate().unwrap();
            let other = KeyPair::generate().unwrap();
            let mut envelope = TransactionBuilder::new(header(), message(""))
                .build(&key)
                .unwrap();
            envelope.public_key = other.public_key().to_bytes();
            assert!(matches!(envelope.verify(), Err(WalletError::Integrity)));
        }

        #[test]
        fn test_sender_mismatch_rejected() {
            let key = KeyPair::generate().unwrap();
            let result = TransactionBuilder::new(header(), message("0000000000000000000000000000000000000000"))
                .build(&key);
            assert!(matches!(result, Err(WalletError::InvalidTransfer(_))));
        }

        #[test]
        fn test_invalid_transfers_rejected() {
            let key = KeyPair::generate().unwrap();

            let mut bad_to = message("");
            bad_to.to = "not-an-address".to_string();
            let mut no_amounts = message("");
            no_amounts.amounts.clear();
            let mut zero = message("");
            zero.amounts[0].value = 0;

            for msg in [bad_to, no_amounts, zero] {
                let result = TransactionBuilder::new(header(), msg).build(&key);
                assert!(matches!(result, Err(WalletError::InvalidTransfer(_))));
            }
        }

        #[test]
        fn test_tx_hash() {
            let key = KeyPair::generate().unwrap();
            let envelope = TransactionBuilder::new(header(), message(""))
                .build(&key)
                .unwrap();
            let hash = envelope.tx_hash().unwrap();
            assert_eq!(hash.len(), 64);
            assert_eq!(hash, hash.to_uppercase());
            assert_eq!(hash, envelope.tx_hash().unwrap());
        }
    }

    mod amounts {
        use super::*;

        #[test]
        fn test_parse_amount() {
            assert_eq!(parse_amount("0").unwrap(), 0);
            assert_eq!(
                parse_amount("5000000000000000000").unwrap(),
                5_000_000_000_000_000_000
            );
            assert_eq!(parse_amount(" 42 ").unwrap(), 42);
            for bad in ["", "-1", "1.5", "1e18", "abc", "+3"] {
                assert!(parse_amount(bad).is_err(), "accepted {:?}", bad);
            }
            assert!(parse_amount("340282366920938463463374607431768211456").is_err());
        }

        #[test]
        fn test_validate_address() {
            assert!(validate_address("B508ED0D54597D516A680E7951F18CAD24C7EC9F").is_ok());
            assert!(validate_address("B508ED0D").is_err());
            assert!(validate_address("Z508ED0D54597D516A680E7951F18CAD24C7EC9F").is_err());
        }
    }

    mod stages {
        use super::*;

        #[test]
        fn test_happy_path() {
            use TransferStage::*;
            let mut stage = Idle;
            for next in [
                KeyLoaded,
                PasswordVerified,
                EndpointSelected,
                Signed,
                Submitted,
                Confirmed,
            ] {
                stage.advance(next).unwrap();
            }
            assert_eq!(stage, Confirmed);
            assert!(stage.is_terminal());
        }

        #[test]
        fn test_skipping_a_stage_is_rejected() {
            let mut stage = TransferStage::KeyLoaded;
            assert!(stage.advance(TransferStage::Signed).is_err());
            assert_eq!(stage, TransferStage::KeyLoaded);
        }

        #[test]
        fn test_failed_is_terminal() {
            let mut stage = TransferStage::EndpointSelected;
            stage.fail();
            assert_eq!(stage, TransferStage::Failed);
            assert!(stage.advance(TransferStage::Signed).is_err());

            let mut done = TransferStage::Confirmed;
            done.fail();
            assert_eq!(done, TransferStage::Confirmed);
        }
    }
}
