//! Account-abstraction collaborators: the chain RPC and the ERC-4337 bundler/paymaster.

use alloy_primitives::{aliases::U192, Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use ethers::providers::{Http, Provider};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use smart_session_types::addresses::{ENTRY_POINT_V07, SEPOLIA_CHAIN_ID};

use crate::{contracts::IEntryPoint, error::ClientError, user_op::UserOperation};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasPrice {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

/// Tiered gas prices returned by `pimlico_getUserOperationGasPrice`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GasPriceTiers {
    pub slow: GasPrice,
    pub standard: GasPrice,
    pub fast: GasPrice,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    pub pre_verification_gas: U256,
    pub verification_gas_limit: U256,
    pub call_gas_limit: U256,
    #[serde(default)]
    pub paymaster_verification_gas_limit: Option<U256>,
    #[serde(default)]
    pub paymaster_post_op_gas_limit: Option<U256>,
}

/// Paymaster fields and gas limits from `pm_sponsorUserOperation`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sponsorship {
    pub paymaster: Address,
    pub paymaster_data: Bytes,
    pub paymaster_verification_gas_limit: U256,
    pub paymaster_post_op_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub verification_gas_limit: U256,
    pub call_gas_limit: U256,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    pub user_op_hash: B256,
    pub success: bool,
    #[serde(default)]
    pub reason: Option<String>,
    pub receipt: TransactionReceipt,
}

/// Operations the dispatcher needs from the chain and the bundler.
#[async_trait]
pub trait AccountAbstractionClient: Send + Sync {
    fn entry_point(&self) -> Address;

    fn chain_id(&self) -> u64;

    /// `eth_call` against the latest block.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ClientError>;

    async fn gas_price(&self) -> Result<GasPrice, ClientError>;

    async fn estimate_user_operation_gas(&self, op: &UserOperation) -> Result<GasEstimate, ClientError>;

    async fn sponsor_user_operation(&self, op: &UserOperation) -> Result<Sponsorship, ClientError>;

    /// Submit to the bundler; returns the user-operation hash.
    async fn send_user_operation(&self, op: &UserOperation) -> Result<B256, ClientError>;

    /// `None` while the operation is not yet included.
    async fn get_user_operation_receipt(&self, hash: B256) -> Result<Option<UserOperationReceipt>, ClientError>;

    /// EntryPoint `getNonce(sender, key)`.
    async fn get_nonce(&self, sender: Address, key: U192) -> Result<U256, ClientError> {
        let data = IEntryPoint::getNonceCall { sender, key }.abi_encode();
        let out = self.call(self.entry_point(), Bytes::from(data)).await?;
        let decoded = IEntryPoint::getNonceCall::abi_decode_returns(&out, true).map_err(|e| {
            ClientError::Decode { method: "getNonce", reason: e.to_string() }
        })?;
        Ok(decoded.nonce)
    }
}

/// JSON-RPC client over two HTTP endpoints: the chain node and the bundler.
#[derive(Clone, Debug)]
pub struct BundlerRpcClient {
    rpc: Provider<Http>,
    bundler: Provider<Http>,
    entry_point: Address,
    chain_id: u64,
}

impl BundlerRpcClient {
    pub fn new(rpc_url: &str, bundler_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            rpc: provider(rpc_url)?,
            bundler: provider(bundler_url)?,
            entry_point: ENTRY_POINT_V07,
            chain_id: SEPOLIA_CHAIN_ID,
        })
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_entry_point(mut self, entry_point: Address) -> Self {
        self.entry_point = entry_point;
        self
    }

    async fn bundler_request<P, R>(&self, method: &'static str, params: P) -> Result<R, ClientError>
    where
        P: std::fmt::Debug + Serialize + Send + Sync,
        R: std::fmt::Debug + Serialize + DeserializeOwned + Send,
    {
        debug!(method, "bundler request");
        Ok(self.bundler.request(method, params).await?)
    }
}

fn provider(url: &str) -> Result<Provider<Http>, ClientError> {
    Provider::<Http>::try_from(url).map_err(|e| ClientError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl AccountAbstractionClient for BundlerRpcClient {
    fn entry_point(&self) -> Address {
        self.entry_point
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ClientError> {
        let tx = json!({ "to": to, "data": data });
        Ok(self.rpc.request("eth_call", (tx, "latest")).await?)
    }

    async fn gas_price(&self) -> Result<GasPrice, ClientError> {
        let tiers: GasPriceTiers = self
            .bundler_request("pimlico_getUserOperationGasPrice", serde_json::Value::Array(vec![]))
            .await?;
        Ok(tiers.fast)
    }

    async fn estimate_user_operation_gas(&self, op: &UserOperation) -> Result<GasEstimate, ClientError> {
        self.bundler_request("eth_estimateUserOperationGas", (op, self.entry_point)).await
    }

    async fn sponsor_user_operation(&self, op: &UserOperation) -> Result<Sponsorship, ClientError> {
        self.bundler_request("pm_sponsorUserOperation", (op, self.entry_point)).await
    }

    async fn send_user_operation(&self, op: &UserOperation) -> Result<B256, ClientError> {
        self.bundler_request("eth_sendUserOperation", (op, self.entry_point)).await
    }

    async fn get_user_operation_receipt(&self, hash: B256) -> Result<Option<UserOperationReceipt>, ClientError> {
        self.bundler_request("eth_getUserOperationReceipt", [hash]).await
    }
}
