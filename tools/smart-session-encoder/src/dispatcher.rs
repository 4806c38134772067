//! Build, sign, submit and confirm one user operation per call bundle.

use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256};
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::{
    client::{AccountAbstractionClient, UserOperationReceipt},
    encoder::Call,
    error::{ClientError, DispatchError, SignerError},
    signer::{SigningContext, UserOperationSigner},
    user_op::{encode_execute, UserOperation},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub poll_interval: Duration,
    pub receipt_timeout: Duration,
    /// Ask the paymaster to sponsor instead of estimating gas directly.
    pub sponsor: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            receipt_timeout: Duration::from_secs(120),
            sponsor: true,
        }
    }
}

/// Underlying cause, flattened into [`DispatchError::TransactionFailed`] before it leaves.
#[derive(Debug, Error)]
enum Failure {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Signer(#[from] SignerError),
    #[error("no receipt for user operation {0} after {1:?}")]
    Timeout(B256, Duration),
    #[error("user operation {hash} reverted: {}", .reason.as_deref().unwrap_or("no reason given"))]
    Reverted { hash: B256, reason: Option<String> },
}

/// Submits user operations for one smart account and waits for their receipts.
pub struct UserOperationDispatcher<C> {
    client: C,
    account: Address,
    config: DispatcherConfig,
}

impl<C: AccountAbstractionClient> UserOperationDispatcher<C> {
    pub fn new(client: C, account: Address) -> Self {
        Self { client, account, config: DispatcherConfig::default() }
    }

    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn context(&self) -> SigningContext {
        SigningContext { entry_point: self.client.entry_point(), chain_id: self.client.chain_id() }
    }

    /// Submit `calls` as one operation signed by `signer`; resolves to the transaction hash
    /// once the bundler reports a successful receipt.
    pub async fn dispatch(&self, calls: &[Call], signer: &dyn UserOperationSigner) -> Result<B256, DispatchError> {
        match self.try_dispatch(calls, signer).await {
            Ok(tx_hash) => Ok(tx_hash),
            Err(failure) => {
                warn!(account = %self.account, error = %failure, "user operation failed");
                Err(DispatchError::TransactionFailed { reason: failure.to_string() })
            }
        }
    }

    async fn try_dispatch(&self, calls: &[Call], signer: &dyn UserOperationSigner) -> Result<B256, Failure> {
        let mut op = self.try_prepare(calls, signer).await?;
        op.signature = signer.sign_user_operation(&op, &self.context()).await?;

        let op_hash = self.client.send_user_operation(&op).await?;
        info!(%op_hash, calls = calls.len(), "user operation submitted");

        let receipt = self.wait_for_receipt(op_hash).await?;
        if !receipt.success {
            return Err(Failure::Reverted { hash: op_hash, reason: receipt.reason });
        }
        let tx_hash = receipt.receipt.transaction_hash;
        info!(%op_hash, %tx_hash, "user operation confirmed");
        Ok(tx_hash)
    }

    /// Unsigned operation with nonce, fees and gas filled in, carrying the signer's dummy
    /// signature.
    pub async fn prepare(
        &self,
        calls: &[Call],
        signer: &dyn UserOperationSigner,
    ) -> Result<UserOperation, DispatchError> {
        self.try_prepare(calls, signer)
            .await
            .map_err(|e| DispatchError::TransactionFailed { reason: e.to_string() })
    }

    async fn try_prepare(&self, calls: &[Call], signer: &dyn UserOperationSigner) -> Result<UserOperation, ClientError> {
        let nonce = self.client.get_nonce(self.account, signer.nonce_key()).await?;
        let fees = self.client.gas_price().await?;

        let mut op = UserOperation {
            sender: self.account,
            nonce,
            call_data: encode_execute(calls),
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            signature: signer.dummy_signature(),
            ..Default::default()
        };

        if self.config.sponsor {
            let sponsorship = self.client.sponsor_user_operation(&op).await?;
            op.paymaster = Some(sponsorship.paymaster);
            op.paymaster_data = Some(sponsorship.paymaster_data);
            op.paymaster_verification_gas_limit = Some(sponsorship.paymaster_verification_gas_limit);
            op.paymaster_post_op_gas_limit = Some(sponsorship.paymaster_post_op_gas_limit);
            op.pre_verification_gas = sponsorship.pre_verification_gas;
            op.verification_gas_limit = sponsorship.verification_gas_limit;
            op.call_gas_limit = sponsorship.call_gas_limit;
        } else {
            let estimate = self.client.estimate_user_operation_gas(&op).await?;
            op.pre_verification_gas = estimate.pre_verification_gas;
            op.verification_gas_limit = estimate.verification_gas_limit;
            op.call_gas_limit = estimate.call_gas_limit;
        }
        debug!(nonce = %op.nonce, call_data_len = op.call_data.len(), "prepared user operation");
        Ok(op)
    }

    async fn wait_for_receipt(&self, hash: B256) -> Result<UserOperationReceipt, Failure> {
        let deadline = Instant::now() + self.config.receipt_timeout;
        loop {
            if let Some(receipt) = self.client.get_user_operation_receipt(hash).await? {
                return Ok(receipt);
            }
            if Instant::now() >= deadline {
                return Err(Failure::Timeout(hash, self.config.receipt_timeout));
            }
            sleep(self.config.poll_interval).await;
        }
    }

    /// `eth_call` passthrough for account reads.
    pub async fn read(&self, to: Address, data: Bytes) -> Result<Bytes, ClientError> {
        self.client.call(to, data).await
    }
}
