//! # Ethereum Personal-Message Signatures (secp256k1)
//!
//! Adapters for the signer and recovery ports using the wallet
//! `personal_sign` scheme (EIP-191, version `0x45`).
//!
//! ## Format
//!
//! - Hash: `keccak256("\x19Ethereum Signed Message:\n" || len(message) || message)`
//! - Signature: 65 bytes `r || s || v` as hex, `0x` prefix optional, v in {0, 1, 27, 28}
//! - Address: last 20 bytes of `keccak256` of the uncompressed public key
//!
//! ## Security Notes
//!
//! - **Malleability Prevention (EIP-2)**: S must be STRICTLY LESS THAN SECP256K1_HALF_ORDER
//! - **Constant-Time Operations**: Uses `subtle` crate for the S comparison
//! - Uses k256 crate for cryptographic operations

use crate::domain::address::{keccak256, Address, Hash};
use crate::ports::outbound::{AddressRecovery, MessageSigner, RecoveryError, SignerError};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use subtle::Choice;
use zeroize::{Zeroize, Zeroizing};

/// EIP-191 prefix for personal messages
const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Length of an `r || s || v` signature
const SIGNATURE_LENGTH: usize = 65;

/// secp256k1 curve order n
/// n = 0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141
const SECP256K1_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// Half of the secp256k1 curve order (for malleability check).
const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

// =============================================================================
// RECOVERY
// =============================================================================

/// Recovers the signing address of a `personal_sign` signature.
#[derive(Debug, Clone, Copy, Default)]
pub struct EthereumRecovery;

impl EthereumRecovery {
    pub fn new() -> Self {
        Self
    }
}

impl AddressRecovery for EthereumRecovery {
    fn recover_address(&self, message: &str, signature: &str) -> Result<Address, RecoveryError> {
        let bytes = decode_signature(signature)?;
        let hash = hash_personal_message(message);
        recover_address(&hash, &bytes)
    }
}

/// EIP-191 personal message hash.
pub fn hash_personal_message(message: &str) -> Hash {
    let mut data = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + 20 + message.len());
    data.extend_from_slice(PERSONAL_MESSAGE_PREFIX.as_bytes());
    data.extend_from_slice(message.len().to_string().as_bytes());
    data.extend_from_slice(message.as_bytes());
    keccak256(&data)
}

/// Decode a hex `r || s || v` signature.
fn decode_signature(signature: &str) -> Result<[u8; SIGNATURE_LENGTH], RecoveryError> {
    let digits = signature.strip_prefix("0x").unwrap_or(signature);
    if digits.len() != SIGNATURE_LENGTH * 2 {
        return Err(RecoveryError::InvalidFormat);
    }
    let mut bytes = [0u8; SIGNATURE_LENGTH];
    hex::decode_to_slice(digits, &mut bytes).map_err(|_| RecoveryError::InvalidFormat)?;
    Ok(bytes)
}

/// Recover the signer's address from a message hash and `r || s || v`.
pub fn recover_address(
    message_hash: &Hash,
    signature: &[u8; SIGNATURE_LENGTH],
) -> Result<Address, RecoveryError> {
    let recovery_id = parse_recovery_id(signature[64])?;

    let mut s = [0u8; 32];
    s.copy_from_slice(&signature[32..64]);
    if !is_low_s(&s) {
        return Err(RecoveryError::MalleableSignature);
    }

    // Note: sig_bytes is zeroized once parsed
    let mut sig_bytes = [0u8; 64];
    sig_bytes.copy_from_slice(&signature[..64]);
    let sig = Signature::from_slice(&sig_bytes);
    sig_bytes.zeroize();
    let sig = sig.map_err(|_| RecoveryError::InvalidFormat)?;

    let recovered_key = VerifyingKey::recover_from_prehash(message_hash, &sig, recovery_id)
        .map_err(|_| RecoveryError::RecoveryFailed)?;

    Ok(address_from_pubkey(&recovered_key))
}

/// Derive Ethereum address from public key.
pub fn address_from_pubkey(public_key: &VerifyingKey) -> Address {
    let pubkey_bytes = public_key.to_encoded_point(false);
    let pubkey_slice = pubkey_bytes.as_bytes();

    // Keccak256 hash of public key (without 0x04 prefix)
    let hash = keccak256(&pubkey_slice[1..]);

    // Take last 20 bytes as address
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    Address(address)
}

/// Check if S value is in lower half of curve order (EIP-2 malleability protection).
///
/// Per EIP-2: S must be STRICTLY LESS THAN half_order (not equal).
/// Runs in fixed time regardless of input.
fn is_low_s(s: &[u8; 32]) -> bool {
    let mut less = Choice::from(0u8);
    let mut greater = Choice::from(0u8);

    for i in 0..32 {
        let a = s[i];
        let b = SECP256K1_HALF_ORDER[i];
        let undecided = !(less | greater);
        less |= undecided & Choice::from(u8::from(a < b));
        greater |= undecided & Choice::from(u8::from(a > b));
    }

    less.into()
}

/// Parse recovery ID from v value.
///
/// Valid v values: 0, 1, 27, 28
fn parse_recovery_id(v: u8) -> Result<RecoveryId, RecoveryError> {
    let id = match v {
        0 | 27 => 0,
        1 | 28 => 1,
        _ => return Err(RecoveryError::InvalidRecoveryId(v)),
    };

    RecoveryId::try_from(id).map_err(|_| RecoveryError::InvalidRecoveryId(v))
}

/// Invert S value: s' = n - s
fn invert_s(s: &[u8; 32]) -> [u8; 32] {
    let mut result = [0u8; 32];
    let mut borrow: i32 = 0;

    for i in (0..32).rev() {
        let diff = i32::from(SECP256K1_ORDER[i]) - i32::from(s[i]) - borrow;
        if diff < 0 {
            result[i] = (diff + 256) as u8;
            borrow = 1;
        } else {
            result[i] = diff as u8;
            borrow = 0;
        }
    }

    result
}

// =============================================================================
// SIGNING
// =============================================================================

/// `personal_sign` signer over an in-process secp256k1 key.
///
/// Produces low-S signatures with v in {27, 28}, `0x`-prefixed hex.
pub struct LocalWallet {
    signing_key: SigningKey,
    address: Address,
}

impl LocalWallet {
    pub fn new(signing_key: SigningKey) -> Self {
        let address = address_from_pubkey(signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    /// Generate a fresh random key.
    pub fn random() -> Self {
        Self::new(SigningKey::random(&mut rand::thread_rng()))
    }

    /// Load a 32-byte private key from hex, `0x` prefix optional.
    pub fn from_hex(private_key: &str) -> Result<Self, SignerError> {
        let digits = private_key.strip_prefix("0x").unwrap_or(private_key);
        let bytes = Zeroizing::new(hex::decode(digits).map_err(|_| SignerError::InvalidKey)?);
        let signing_key = SigningKey::from_slice(&bytes).map_err(|_| SignerError::InvalidKey)?;
        Ok(Self::new(signing_key))
    }

    /// Address this wallet signs as.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a message, returning the hex `r || s || v` signature.
    pub fn sign_personal(&self, message: &str) -> Result<String, SignerError> {
        let hash = hash_personal_message(message);
        let (sig, recid) = self
            .signing_key
            .sign_prehash_recoverable(&hash)
            .map_err(|e| SignerError::Unavailable(e.to_string()))?;

        let sig_bytes = sig.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&sig_bytes[..32]);
        s.copy_from_slice(&sig_bytes[32..]);

        // Normalize S to low value (EIP-2), flipping the recovery id with it
        let (s, flipped) = if is_low_s(&s) {
            (s, false)
        } else {
            (invert_s(&s), true)
        };
        let v = 27 + (recid.to_byte() ^ u8::from(flipped));

        let mut out = [0u8; SIGNATURE_LENGTH];
        out[..32].copy_from_slice(&r);
        out[32..64].copy_from_slice(&s);
        out[64] = v;

        Ok(format!("0x{}", hex::encode(out)))
    }
}

impl std::fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl MessageSigner for LocalWallet {
    async fn sign_message(&self, message: &str) -> Result<String, SignerError> {
        self.sign_personal(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key (Hardhat/Anvil account #0)
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_wallet_address_from_known_key() {
        let wallet = LocalWallet::from_hex(DEV_KEY).unwrap();
        assert_eq!(wallet.address().to_string(), DEV_ADDRESS);
    }

    #[test]
    fn test_hash_personal_message_known_vector() {
        // keccak256("\x19Ethereum Signed Message:\n11hello world")
        assert_eq!(
            hex::encode(hash_personal_message("hello world")),
            "d9eba16ed0ecae432b71fe008c98cc872bb4cc214d3220a36f365326cf807d68"
        );
    }

    #[test]
    fn test_sign_then_recover() {
        let wallet = LocalWallet::random();
        let signature = wallet.sign_personal("Issued At: now").unwrap();
        assert_eq!(signature.len(), 2 + SIGNATURE_LENGTH * 2);

        let recovered = EthereumRecovery
            .recover_address("Issued At: now", &signature)
            .unwrap();
        assert_eq!(recovered, wallet.address());
    }

    #[test]
    fn test_recover_accepts_unprefixed_and_raw_v() {
        let wallet = LocalWallet::random();
        let signature = wallet.sign_personal("msg").unwrap();
        let mut bytes = decode_signature(&signature).unwrap();
        bytes[64] -= 27;
        let raw = hex::encode(bytes);

        assert_eq!(
            EthereumRecovery.recover_address("msg", &raw).unwrap(),
            wallet.address()
        );
    }

    #[test]
    fn test_wrong_message_recovers_other_address() {
        let wallet = LocalWallet::random();
        let signature = wallet.sign_personal("original").unwrap();
        let recovered = EthereumRecovery.recover_address("tampered", &signature);
        assert_ne!(recovered.ok(), Some(wallet.address()));
    }

    #[test]
    fn test_malleable_signature_rejected() {
        let wallet = LocalWallet::random();
        let signature = wallet.sign_personal("msg").unwrap();
        let mut bytes = decode_signature(&signature).unwrap();
        let mut s = [0u8; 32];
        s.copy_from_slice(&bytes[32..64]);
        bytes[32..64].copy_from_slice(&invert_s(&s));

        assert_eq!(
            EthereumRecovery.recover_address("msg", &hex::encode(bytes)),
            Err(RecoveryError::MalleableSignature)
        );
    }

    #[test]
    fn test_bad_signature_formats() {
        assert_eq!(
            EthereumRecovery.recover_address("msg", "0x1234"),
            Err(RecoveryError::InvalidFormat)
        );
        assert_eq!(
            EthereumRecovery.recover_address("msg", &"zz".repeat(SIGNATURE_LENGTH)),
            Err(RecoveryError::InvalidFormat)
        );

        let mut bytes = [0x11u8; SIGNATURE_LENGTH];
        bytes[64] = 29;
        assert_eq!(
            EthereumRecovery.recover_address("msg", &hex::encode(bytes)),
            Err(RecoveryError::InvalidRecoveryId(29))
        );

        let zero = [0u8; SIGNATURE_LENGTH];
        assert_eq!(
            EthereumRecovery.recover_address("msg", &hex::encode(zero)),
            Err(RecoveryError::InvalidFormat)
        );
    }

    #[test]
    fn test_is_low_s_boundary() {
        assert!(!is_low_s(&SECP256K1_HALF_ORDER));

        let mut below = SECP256K1_HALF_ORDER;
        below[31] -= 1;
        assert!(is_low_s(&below));

        let mut above = SECP256K1_HALF_ORDER;
        above[31] += 1;
        assert!(!is_low_s(&above));
    }

    #[test]
    fn test_invalid_private_key() {
        assert_eq!(
            LocalWallet::from_hex("0x00").unwrap_err(),
            SignerError::InvalidKey
        );
        assert_eq!(
            LocalWallet::from_hex(&"00".repeat(32)).unwrap_err(),
            SignerError::InvalidKey
        );
        assert_eq!(
            LocalWallet::from_hex("not hex").unwrap_err(),
            SignerError::InvalidKey
        );
    }

    #[test]
    fn test_debug_hides_key() {
        let wallet = LocalWallet::from_hex(DEV_KEY).unwrap();
        let debug = format!("{wallet:?}");
        assert!(!debug.contains(&DEV_KEY[2..]));
        assert!(debug.contains(DEV_ADDRESS));
    }
}
