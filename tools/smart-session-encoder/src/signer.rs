//! Signing strategies for user operations.
//!
//! Owner signatures follow the Safe4337 `SafeOp` EIP-712 scheme; session-key signatures sign
//! the raw user-operation hash and travel inside a smart-session `Use` envelope.

use alloy_primitives::{aliases::U192, Address, Bytes, B256, U256};
use async_trait::async_trait;
use k256::ecdsa::SigningKey;

use smart_session_types::{addresses::SMART_SESSIONS, SmartSessionMode};

use crate::{
    encoder::{dummy_session_signature, encode_session_signature, keccak256_bytes, ownable_mock_signature},
    error::SignerError,
    user_op::{low_u128_bytes, validator_nonce_key, UserOperation},
};

/// Where a user operation will be validated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SigningContext {
    pub entry_point: Address,
    pub chain_id: u64,
}

/// A way of authorising user operations for one account.
#[async_trait]
pub trait UserOperationSigner: Send + Sync {
    /// Nonce key selecting the validator on the account.
    fn nonce_key(&self) -> U192;

    /// Placeholder of the same shape as a real signature, for gas estimation.
    fn dummy_signature(&self) -> Bytes;

    async fn sign_user_operation(
        &self,
        op: &UserOperation,
        ctx: &SigningContext,
    ) -> Result<Bytes, SignerError>;
}

/// secp256k1 key held in process.
#[derive(Clone)]
pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner").field("address", &self.address).finish_non_exhaustive()
    }
}

impl LocalSigner {
    pub fn new(key: SigningKey) -> Self {
        let point = key.verifying_key().to_encoded_point(false);
        // Uncompressed SEC1 point: 0x04 || x || y; the address is the low 20 bytes of keccak(x || y).
        let hash = keccak256_bytes(&point.as_bytes()[1..]);
        let address = Address::from_slice(&hash[12..32]);
        Self { key, address }
    }

    /// Parse a 32-byte hex private key, with or without `0x`.
    pub fn from_hex(hex_key: &str) -> Result<Self, SignerError> {
        let raw = hex::decode(hex_key.trim().trim_start_matches("0x"))
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        let key = SigningKey::from_slice(&raw).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self::new(key))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte digest as-is; returns `r || s || v` with `v` in {27, 28}.
    pub fn sign_hash(&self, digest: B256) -> Result<[u8; 65], SignerError> {
        let (signature, recovery_id) = self.key.sign_prehash_recoverable(digest.as_slice())?;
        let (r, s) = signature.split_bytes();

        let mut out = [0u8; 65];
        out[0..32].copy_from_slice(&r[..]);
        out[32..64].copy_from_slice(&s[..]);
        out[64] = 27 + recovery_id.to_byte();
        Ok(out)
    }

    /// EIP-191 `personal_sign` over raw bytes.
    pub fn sign_message(&self, message: &[u8]) -> Result<[u8; 65], SignerError> {
        self.sign_hash(eip191_hash(message))
    }
}

/// `keccak256("\x19Ethereum Signed Message:\n" || len || message)`.
pub fn eip191_hash(message: &[u8]) -> B256 {
    let mut buf = Vec::with_capacity(26 + 20 + message.len());
    buf.extend_from_slice(b"\x19Ethereum Signed Message:\n");
    buf.extend_from_slice(message.len().to_string().as_bytes());
    buf.extend_from_slice(message);
    keccak256_bytes(&buf)
}

/// Signs as the account owner through the Safe4337-compatible module.
#[derive(Clone, Debug)]
pub struct OwnerSigner {
    key: LocalSigner,
    /// EIP-712 verifying contract of the `SafeOp` domain.
    module: Address,
    nonce_key: U192,
    valid_after: u64,
    valid_until: u64,
}

impl OwnerSigner {
    pub fn new(key: LocalSigner, module: Address) -> Self {
        Self { key, module, nonce_key: U192::ZERO, valid_after: 0, valid_until: 0 }
    }

    /// Nonce key whose validator bits are zero, so the Safe's owners validate.
    pub fn with_nonce_key(mut self, key: u32) -> Self {
        self.nonce_key = U192::from(key);
        self
    }

    pub fn with_validity(mut self, valid_after: u64, valid_until: u64) -> Self {
        self.valid_after = valid_after;
        self.valid_until = valid_until;
        self
    }

    pub fn address(&self) -> Address {
        self.key.address()
    }

    fn envelope(&self, signature: &[u8]) -> Bytes {
        let mut buf = Vec::with_capacity(12 + signature.len());
        buf.extend_from_slice(&uint48_bytes(self.valid_after));
        buf.extend_from_slice(&uint48_bytes(self.valid_until));
        buf.extend_from_slice(signature);
        Bytes::from(buf)
    }

    /// EIP-712 digest of the `SafeOp` the module reconstructs during validation.
    pub fn safe_op_digest(&self, op: &UserOperation, ctx: &SigningContext) -> B256 {
        let domain_type_hash = keccak256_bytes(b"EIP712Domain(uint256 chainId,address verifyingContract)");
        let mut domain_buf = Vec::with_capacity(32 * 3);
        domain_buf.extend_from_slice(domain_type_hash.as_slice());
        domain_buf.extend_from_slice(&U256::from(ctx.chain_id).to_be_bytes::<32>());
        domain_buf.extend_from_slice(&pad_address(self.module));
        let domain_separator = keccak256_bytes(&domain_buf);

        let safe_op_type_hash = keccak256_bytes(
            b"SafeOp(address safe,uint256 nonce,bytes initCode,bytes callData,uint128 verificationGasLimit,uint128 callGasLimit,uint256 preVerificationGas,uint128 maxPriorityFeePerGas,uint128 maxFeePerGas,bytes paymasterAndData,uint48 validAfter,uint48 validUntil,address entryPoint)",
        );

        let mut struct_buf = Vec::with_capacity(32 * 14);
        struct_buf.extend_from_slice(safe_op_type_hash.as_slice());
        struct_buf.extend_from_slice(&pad_address(op.sender));
        struct_buf.extend_from_slice(&op.nonce.to_be_bytes::<32>());
        struct_buf.extend_from_slice(keccak256_bytes(&op.init_code()).as_slice());
        struct_buf.extend_from_slice(keccak256_bytes(&op.call_data).as_slice());
        struct_buf.extend_from_slice(&pad_u128(op.verification_gas_limit));
        struct_buf.extend_from_slice(&pad_u128(op.call_gas_limit));
        struct_buf.extend_from_slice(&op.pre_verification_gas.to_be_bytes::<32>());
        struct_buf.extend_from_slice(&pad_u128(op.max_priority_fee_per_gas));
        struct_buf.extend_from_slice(&pad_u128(op.max_fee_per_gas));
        struct_buf.extend_from_slice(keccak256_bytes(&op.paymaster_and_data()).as_slice());
        struct_buf.extend_from_slice(&U256::from(self.valid_after).to_be_bytes::<32>());
        struct_buf.extend_from_slice(&U256::from(self.valid_until).to_be_bytes::<32>());
        struct_buf.extend_from_slice(&pad_address(ctx.entry_point));
        let struct_hash = keccak256_bytes(&struct_buf);

        let mut final_buf = Vec::with_capacity(2 + 32 + 32);
        final_buf.extend_from_slice(b"\x19\x01");
        final_buf.extend_from_slice(domain_separator.as_slice());
        final_buf.extend_from_slice(struct_hash.as_slice());
        keccak256_bytes(&final_buf)
    }
}

#[async_trait]
impl UserOperationSigner for OwnerSigner {
    fn nonce_key(&self) -> U192 {
        self.nonce_key
    }

    fn dummy_signature(&self) -> Bytes {
        self.envelope(&ownable_mock_signature(1))
    }

    async fn sign_user_operation(
        &self,
        op: &UserOperation,
        ctx: &SigningContext,
    ) -> Result<Bytes, SignerError> {
        let digest = self.safe_op_digest(op, ctx);
        let signature = self.key.sign_hash(digest)?;
        Ok(self.envelope(&signature))
    }
}

/// Signs with a delegated session key under an already enabled permission.
#[derive(Clone, Debug)]
pub struct SessionKeySigner {
    key: LocalSigner,
    permission_id: B256,
    threshold: u64,
}

impl SessionKeySigner {
    pub fn new(key: LocalSigner, permission_id: B256) -> Self {
        Self { key, permission_id, threshold: 1 }
    }

    /// Number of validator signatures the mock placeholder stands in for.
    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn permission_id(&self) -> B256 {
        self.permission_id
    }

    pub fn address(&self) -> Address {
        self.key.address()
    }
}

#[async_trait]
impl UserOperationSigner for SessionKeySigner {
    fn nonce_key(&self) -> U192 {
        validator_nonce_key(SMART_SESSIONS)
    }

    fn dummy_signature(&self) -> Bytes {
        dummy_session_signature(self.permission_id, self.threshold)
    }

    async fn sign_user_operation(
        &self,
        op: &UserOperation,
        ctx: &SigningContext,
    ) -> Result<Bytes, SignerError> {
        let hash = op.hash(ctx.entry_point, ctx.chain_id);
        let signature = self.key.sign_message(hash.as_slice())?;
        Ok(encode_session_signature(SmartSessionMode::Use, self.permission_id, &signature))
    }
}

fn pad_address(address: Address) -> [u8; 32] {
    let mut padded = [0u8; 32];
    padded[12..32].copy_from_slice(address.as_slice());
    padded
}

fn pad_u128(value: U256) -> [u8; 32] {
    let mut padded = [0u8; 32];
    padded[16..32].copy_from_slice(&low_u128_bytes(value));
    padded
}

fn uint48_bytes(value: u64) -> [u8; 6] {
    let be = value.to_be_bytes();
    let mut out = [0u8; 6];
    out.copy_from_slice(&be[2..8]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    // Hardhat / anvil account #0.
    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn ctx() -> SigningContext {
        SigningContext { entry_point: Address::repeat_byte(0xee), chain_id: 11_155_111 }
    }

    fn recover(digest: B256, sig: &[u8]) -> Address {
        let signature = Signature::from_slice(&sig[0..64]).unwrap();
        let recid = RecoveryId::from_byte(sig[64] - 27).unwrap();
        let vk = VerifyingKey::recover_from_prehash(digest.as_slice(), &signature, recid).unwrap();
        let point = vk.to_encoded_point(false);
        Address::from_slice(&keccak256_bytes(&point.as_bytes()[1..])[12..32])
    }

    #[test]
    fn derives_known_address() {
        let signer = LocalSigner::from_hex(KEY).unwrap();
        assert_eq!(signer.address(), address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
    }

    #[test]
    fn rejects_bad_keys() {
        assert!(matches!(LocalSigner::from_hex("0x1234"), Err(SignerError::InvalidKey(_))));
        assert!(matches!(LocalSigner::from_hex("zz"), Err(SignerError::InvalidKey(_))));
    }

    #[test]
    fn personal_sign_recovers_to_signer() {
        let signer = LocalSigner::from_hex(KEY).unwrap();
        let message = B256::repeat_byte(0x42);
        let sig = signer.sign_message(message.as_slice()).unwrap();
        assert!(sig[64] == 27 || sig[64] == 28);
        assert_eq!(recover(eip191_hash(message.as_slice()), &sig), signer.address());
    }

    #[tokio::test]
    async fn session_signature_wraps_personal_sign_of_op_hash() {
        let key = LocalSigner::from_hex(KEY).unwrap();
        let id = B256::repeat_byte(0x99);
        let signer = SessionKeySigner::new(key.clone(), id);
        let op = UserOperation { sender: Address::repeat_byte(1), ..Default::default() };

        let sig = signer.sign_user_operation(&op, &ctx()).await.unwrap();
        assert_eq!(sig.len(), 1 + 32 + 65);
        assert_eq!(sig[0], SmartSessionMode::Use as u8);
        assert_eq!(&sig[1..33], id.as_slice());

        let op_hash = op.hash(ctx().entry_point, ctx().chain_id);
        assert_eq!(recover(eip191_hash(op_hash.as_slice()), &sig[33..]), key.address());
    }

    #[test]
    fn session_dummy_signature_is_stateless() {
        let signer = SessionKeySigner::new(LocalSigner::from_hex(KEY).unwrap(), B256::repeat_byte(0x01));
        let first = signer.dummy_signature();
        let second = signer.dummy_signature();
        assert_eq!(first, second);
        assert_eq!(first[0], SmartSessionMode::Use as u8);
        assert_eq!(&first[1..33], B256::repeat_byte(0x01).as_slice());
        assert_eq!(first.len(), 1 + 32 + 65);
    }

    #[tokio::test]
    async fn owner_signature_prefixes_validity_window() {
        let key = LocalSigner::from_hex(KEY).unwrap();
        let signer = OwnerSigner::new(key.clone(), Address::repeat_byte(0x75)).with_validity(1, 0x0102_0304_0506);
        let op = UserOperation { sender: Address::repeat_byte(1), ..Default::default() };

        let sig = signer.sign_user_operation(&op, &ctx()).await.unwrap();
        assert_eq!(sig.len(), 12 + 65);
        assert_eq!(&sig[0..6], &[0, 0, 0, 0, 0, 1]);
        assert_eq!(&sig[6..12], &[1, 2, 3, 4, 5, 6]);
        assert_eq!(recover(signer.safe_op_digest(&op, &ctx()), &sig[12..]), key.address());
        assert_eq!(signer.dummy_signature().len(), sig.len());
    }

    #[test]
    fn nonce_keys_select_validators() {
        let key = LocalSigner::from_hex(KEY).unwrap();
        let session = SessionKeySigner::new(key.clone(), B256::ZERO);
        assert_eq!(session.nonce_key(), validator_nonce_key(SMART_SESSIONS));
        let owner = OwnerSigner::new(key, Address::ZERO).with_nonce_key(7);
        assert_eq!(owner.nonce_key(), U192::from(7u64));
    }

    #[test]
    fn safe_op_digest_depends_on_module() {
        let key = LocalSigner::from_hex(KEY).unwrap();
        let op = UserOperation::default();
        let a = OwnerSigner::new(key.clone(), Address::repeat_byte(1)).safe_op_digest(&op, &ctx());
        let b = OwnerSigner::new(key, Address::repeat_byte(2)).safe_op_digest(&op, &ctx());
        assert_ne!(a, b);
    }
}
