//! EntryPoint v0.7 user operations: JSON-RPC form, packing, hashing and ERC-7579
//! execution call data.

use alloy_primitives::{aliases::U192, Address, Bytes, FixedBytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use serde::{Deserialize, Serialize};

use crate::{
    contracts::{Execution, IERC7579Account},
    encoder::{keccak256_bytes, Call},
};

/// Unpacked v0.7 user operation, as exchanged with bundlers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,
    pub nonce: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_data: Option<Bytes>,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_verification_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_post_op_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_data: Option<Bytes>,
    pub signature: Bytes,
}

impl UserOperation {
    /// `factory || factoryData`, empty for deployed accounts.
    pub fn init_code(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        if let Some(factory) = self.factory {
            buf.extend_from_slice(factory.as_slice());
            if let Some(data) = &self.factory_data {
                buf.extend_from_slice(data);
            }
        }
        buf
    }

    /// `paymaster || uint128 verificationGas || uint128 postOpGas || paymasterData`.
    pub fn paymaster_and_data(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        if let Some(paymaster) = self.paymaster {
            buf.extend_from_slice(paymaster.as_slice());
            buf.extend_from_slice(&low_u128_bytes(
                self.paymaster_verification_gas_limit.unwrap_or_default(),
            ));
            buf.extend_from_slice(&low_u128_bytes(self.paymaster_post_op_gas_limit.unwrap_or_default()));
            if let Some(data) = &self.paymaster_data {
                buf.extend_from_slice(data);
            }
        }
        buf
    }

    /// `bytes32(verificationGasLimit << 128 | callGasLimit)`.
    pub fn account_gas_limits(&self) -> B256 {
        pack_u128_pair(self.verification_gas_limit, self.call_gas_limit)
    }

    /// `bytes32(maxPriorityFeePerGas << 128 | maxFeePerGas)`.
    pub fn gas_fees(&self) -> B256 {
        pack_u128_pair(self.max_priority_fee_per_gas, self.max_fee_per_gas)
    }

    /// Hash the EntryPoint asks the account to validate.
    pub fn hash(&self, entry_point: Address, chain_id: u64) -> B256 {
        let mut packed = Vec::with_capacity(32 * 8);
        let mut sender_padded = [0u8; 32];
        sender_padded[12..32].copy_from_slice(self.sender.as_slice());
        packed.extend_from_slice(&sender_padded);
        packed.extend_from_slice(&self.nonce.to_be_bytes::<32>());
        packed.extend_from_slice(keccak256_bytes(&self.init_code()).as_slice());
        packed.extend_from_slice(keccak256_bytes(&self.call_data).as_slice());
        packed.extend_from_slice(self.account_gas_limits().as_slice());
        packed.extend_from_slice(&self.pre_verification_gas.to_be_bytes::<32>());
        packed.extend_from_slice(self.gas_fees().as_slice());
        packed.extend_from_slice(keccak256_bytes(&self.paymaster_and_data()).as_slice());
        let inner = keccak256_bytes(&packed);

        let mut outer = Vec::with_capacity(32 * 3);
        outer.extend_from_slice(inner.as_slice());
        let mut ep_padded = [0u8; 32];
        ep_padded[12..32].copy_from_slice(entry_point.as_slice());
        outer.extend_from_slice(&ep_padded);
        outer.extend_from_slice(&U256::from(chain_id).to_be_bytes::<32>());
        keccak256_bytes(&outer)
    }
}

pub(crate) fn low_u128_bytes(value: U256) -> [u8; 16] {
    let word = value.to_be_bytes::<32>();
    let mut out = [0u8; 16];
    out.copy_from_slice(&word[16..32]);
    out
}

fn pack_u128_pair(hi: U256, lo: U256) -> B256 {
    let mut b = [0u8; 32];
    b[0..16].copy_from_slice(&low_u128_bytes(hi));
    b[16..32].copy_from_slice(&low_u128_bytes(lo));
    FixedBytes(b)
}

/// Nonce key routing validation to `validator` on Safe7579: the address right-padded to 24 bytes.
pub fn validator_nonce_key(validator: Address) -> U192 {
    let mut key = [0u8; 24];
    key[0..20].copy_from_slice(validator.as_slice());
    U192::from_be_bytes(key)
}

const CALL_TYPE_BATCH: u8 = 0x01;

/// ERC-7579 `execute(mode, executionCalldata)` for `calls`.
///
/// One call uses single mode (`target || value || callData`); more use batch mode over
/// `abi.encode(Execution[])`.
pub fn encode_execute(calls: &[Call]) -> Bytes {
    let mut mode = [0u8; 32];
    let execution_calldata = match calls {
        [call] => {
            let mut buf = Vec::with_capacity(20 + 32 + call.data.len());
            buf.extend_from_slice(call.to.as_slice());
            buf.extend_from_slice(&call.value.to_be_bytes::<32>());
            buf.extend_from_slice(&call.data);
            buf
        }
        _ => {
            mode[0] = CALL_TYPE_BATCH;
            let executions: Vec<Execution> = calls
                .iter()
                .map(|c| Execution { target: c.to, value: c.value, callData: c.data.clone() })
                .collect();
            executions.abi_encode()
        }
    };

    IERC7579Account::executeCall {
        mode: FixedBytes(mode),
        executionCalldata: Bytes::from(execution_calldata),
    }
    .abi_encode()
    .into()
}
