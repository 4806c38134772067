use alloy_primitives::B256;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("action index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid selector `{0}`: expected 0x-prefixed 4-byte hex, a function signature or `native-transfer`")]
    InvalidSelector(String),
}

/// Failures of the external ABI registry.
#[derive(Debug, Error)]
pub enum AbiError {
    #[error("ABI request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ABI request returned HTTP {0}")]
    Status(u16),

    #[error("malformed ABI response: {0}")]
    Malformed(String),

    #[error("invalid or empty ABI received")]
    Empty,
}

#[derive(Debug, Error)]
pub enum CalldataError {
    #[error("function `{function}` takes {expected} arguments, got {got}")]
    ArgumentCount { function: String, expected: usize, got: usize },

    #[error("invalid type `{kind}`: {reason}")]
    InvalidType { kind: String, reason: String },

    #[error("cannot encode `{value}` as {kind}: {reason}")]
    InvalidValue { value: String, kind: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    Signing(#[from] k256::ecdsa::Error),
}

/// Errors from the bundler / chain RPC collaborators.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid endpoint url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("rpc error: {0}")]
    Rpc(#[from] ethers::providers::ProviderError),

    #[error("could not decode `{method}` result: {reason}")]
    Decode { method: &'static str, reason: String },

    #[error("{0}")]
    Other(String),
}

/// The single failure a dispatch surfaces, whatever went wrong underneath.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("transaction failed: {reason}")]
    TransactionFailed { reason: String },
}

impl DispatchError {
    pub fn reason(&self) -> &str {
        match self {
            DispatchError::TransactionFailed { reason } => reason,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InstallError {
    #[error("smart sessions module already installed (permission {0})")]
    AlreadyInstalled(B256),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpdateError {
    #[error("no installed session to update")]
    NotInstalled,

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
