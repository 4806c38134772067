//! In-memory collaborators for off-chain testing.
//!
//! These stand in for the bundler and the ABI registry so the dispatcher, lifecycle and
//! registry logic can be exercised without network access.

use std::sync::Mutex;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;

use smart_session_types::addresses::{ENTRY_POINT_V07, SEPOLIA_CHAIN_ID};

use crate::{
    abi::{AbiEntry, AbiSource},
    client::{
        AccountAbstractionClient, GasEstimate, GasPrice, Sponsorship, TransactionReceipt, UserOperationReceipt,
    },
    contracts::{IERC7579Account, IEntryPoint},
    error::{AbiError, ClientError},
    user_op::UserOperation,
};

/// How the mock bundler answers receipt polls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReceiptBehaviour {
    Success,
    Reverted(String),
    /// Never included; the dispatcher times out.
    Pending,
}

/// Mock bundler + chain. Every submitted operation is recorded.
#[derive(Debug)]
pub struct MockAccountClient {
    pub nonce: U256,
    pub module_installed: bool,
    pub receipt: ReceiptBehaviour,
    pub reject_send: Option<String>,
    sent: Mutex<Vec<UserOperation>>,
    estimated: Mutex<Vec<UserOperation>>,
}

impl Default for MockAccountClient {
    fn default() -> Self {
        Self {
            nonce: U256::ZERO,
            module_installed: false,
            receipt: ReceiptBehaviour::Success,
            reject_send: None,
            sent: Mutex::new(Vec::new()),
            estimated: Mutex::new(Vec::new()),
        }
    }
}

impl MockAccountClient {
    pub fn with_receipt(mut self, receipt: ReceiptBehaviour) -> Self {
        self.receipt = receipt;
        self
    }

    pub fn rejecting(mut self, reason: impl Into<String>) -> Self {
        self.reject_send = Some(reason.into());
        self
    }

    pub fn installed(mut self) -> Self {
        self.module_installed = true;
        self
    }

    /// Operations accepted by `send_user_operation`, in submission order.
    pub fn sent(&self) -> Vec<UserOperation> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Operations handed to gas estimation or sponsorship.
    pub fn estimated(&self) -> Vec<UserOperation> {
        self.estimated.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn note_estimate(&self, op: &UserOperation) {
        if let Ok(mut estimated) = self.estimated.lock() {
            estimated.push(op.clone());
        }
    }
}

/// Deterministic transaction hash for a user-operation hash.
pub fn mock_tx_hash(op_hash: B256) -> B256 {
    let mut b = op_hash.0;
    b[0] ^= 0xff;
    B256::from(b)
}

#[async_trait]
impl AccountAbstractionClient for MockAccountClient {
    fn entry_point(&self) -> Address {
        ENTRY_POINT_V07
    }

    fn chain_id(&self) -> u64 {
        SEPOLIA_CHAIN_ID
    }

    async fn call(&self, _to: Address, data: Bytes) -> Result<Bytes, ClientError> {
        if data.starts_with(&IEntryPoint::getNonceCall::SELECTOR) {
            return Ok(Bytes::from(self.nonce.to_be_bytes::<32>().to_vec()));
        }
        if data.starts_with(&IERC7579Account::isModuleInstalledCall::SELECTOR) {
            let mut word = [0u8; 32];
            word[31] = self.module_installed as u8;
            return Ok(Bytes::from(word.to_vec()));
        }
        Err(ClientError::Other("unsupported eth_call".to_string()))
    }

    async fn gas_price(&self) -> Result<GasPrice, ClientError> {
        Ok(GasPrice { max_fee_per_gas: U256::from(2_000_000_000u64), max_priority_fee_per_gas: U256::from(1_000_000_000u64) })
    }

    async fn estimate_user_operation_gas(&self, op: &UserOperation) -> Result<GasEstimate, ClientError> {
        self.note_estimate(op);
        Ok(GasEstimate {
            pre_verification_gas: U256::from(50_000u64),
            verification_gas_limit: U256::from(300_000u64),
            call_gas_limit: U256::from(200_000u64),
            ..Default::default()
        })
    }

    async fn sponsor_user_operation(&self, op: &UserOperation) -> Result<Sponsorship, ClientError> {
        self.note_estimate(op);
        Ok(Sponsorship {
            paymaster: Address::repeat_byte(0x99),
            paymaster_data: Bytes::from(vec![0xaa; 8]),
            paymaster_verification_gas_limit: U256::from(40_000u64),
            paymaster_post_op_gas_limit: U256::from(10_000u64),
            pre_verification_gas: U256::from(50_000u64),
            verification_gas_limit: U256::from(300_000u64),
            call_gas_limit: U256::from(200_000u64),
        })
    }

    async fn send_user_operation(&self, op: &UserOperation) -> Result<B256, ClientError> {
        if let Some(reason) = &self.reject_send {
            return Err(ClientError::Other(reason.clone()));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| ClientError::Other("mock state poisoned".to_string()))?;
        sent.push(op.clone());
        Ok(op.hash(ENTRY_POINT_V07, SEPOLIA_CHAIN_ID))
    }

    async fn get_user_operation_receipt(&self, hash: B256) -> Result<Option<UserOperationReceipt>, ClientError> {
        let (success, reason) = match &self.receipt {
            ReceiptBehaviour::Success => (true, None),
            ReceiptBehaviour::Reverted(reason) => (false, Some(reason.clone())),
            ReceiptBehaviour::Pending => return Ok(None),
        };
        Ok(Some(UserOperationReceipt {
            user_op_hash: hash,
            success,
            reason,
            receipt: TransactionReceipt { transaction_hash: mock_tx_hash(hash) },
        }))
    }
}

/// ABI source answering from a fixed list, or failing with a fixed HTTP status.
#[derive(Debug)]
pub struct StaticAbiSource {
    response: Result<Vec<AbiEntry>, u16>,
    fetches: Mutex<Vec<Address>>,
}

impl StaticAbiSource {
    pub fn new(entries: Vec<AbiEntry>) -> Self {
        Self { response: Ok(entries), fetches: Mutex::new(Vec::new()) }
    }

    /// Always answers HTTP 500.
    pub fn unavailable() -> Self {
        Self { response: Err(500), fetches: Mutex::new(Vec::new()) }
    }

    pub fn fetches(&self) -> Vec<Address> {
        self.fetches.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AbiSource for StaticAbiSource {
    async fn fetch_abi(&self, address: Address) -> Result<Vec<AbiEntry>, AbiError> {
        if let Ok(mut fetches) = self.fetches.lock() {
            fetches.push(address);
        }
        match &self.response {
            Ok(entries) if entries.is_empty() => Err(AbiError::Empty),
            Ok(entries) => Ok(entries.clone()),
            Err(status) => Err(AbiError::Status(*status)),
        }
    }
}
