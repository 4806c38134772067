//! Contract ABI lookup against an external registry, and the callable-function view the
//! action registry offers for a target.

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use smart_session_types::{FunctionSelector, NATIVE_TRANSFER_SELECTOR};

use crate::{encoder::selector, error::AbiError};

/// Name of the synthetic option standing for a plain value transfer.
pub const NATIVE_TRANSFER: &str = "native-transfer";

pub const DEFAULT_ABI_BASE_URL: &str = "https://abidata.net";
pub const DEFAULT_ABI_NETWORK: &str = "sepolia";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<AbiParam>,
}

impl AbiParam {
    /// Canonical type as it appears in a function signature (tuples expanded).
    pub fn canonical_type(&self) -> String {
        match self.kind.strip_prefix("tuple") {
            Some(suffix) => {
                let inner: Vec<String> = self.components.iter().map(AbiParam::canonical_type).collect();
                format!("({}){}", inner.join(","), suffix)
            }
            None => self.kind.clone(),
        }
    }
}

/// One raw entry of a JSON ABI; non-function entries are kept so filtering stays explicit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state_mutability: Option<String>,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
}

/// A state-changing function a session action may target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiFunction {
    pub name: String,
    pub state_mutability: String,
    pub inputs: Vec<AbiParam>,
    pub outputs: Vec<AbiParam>,
}

impl AbiFunction {
    pub fn native_transfer() -> Self {
        Self {
            name: NATIVE_TRANSFER.to_string(),
            state_mutability: "payable".to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn is_native_transfer(&self) -> bool {
        self.name == NATIVE_TRANSFER
    }

    /// `name(type1,type2,...)`.
    pub fn signature(&self) -> String {
        let types: Vec<String> = self.inputs.iter().map(AbiParam::canonical_type).collect();
        format!("{}({})", self.name, types.join(","))
    }

    pub fn selector(&self) -> FunctionSelector {
        if self.is_native_transfer() {
            return NATIVE_TRANSFER_SELECTOR;
        }
        selector(&self.signature())
    }
}

/// Which functions of a fetched ABI are offered as action selectors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbiFilter {
    /// Function names that are never offered (administrative close-type calls).
    pub denylist: Vec<String>,
}

impl Default for AbiFilter {
    fn default() -> Self {
        Self { denylist: vec!["CloseStream".to_string()] }
    }
}

impl AbiFilter {
    /// State-changing, non-denylisted functions followed by exactly one native-transfer entry.
    pub fn usable_functions(&self, entries: &[AbiEntry]) -> Vec<AbiFunction> {
        let mut functions: Vec<AbiFunction> = entries
            .iter()
            .filter(|e| e.kind == "function")
            .filter(|e| matches!(e.state_mutability.as_deref(), Some("nonpayable") | Some("payable")))
            .filter_map(|e| {
                let name = e.name.clone()?;
                if name == NATIVE_TRANSFER || self.denylist.iter().any(|d| *d == name) {
                    return None;
                }
                Some(AbiFunction {
                    name,
                    state_mutability: e.state_mutability.clone().unwrap_or_default(),
                    inputs: e.inputs.clone(),
                    outputs: e.outputs.clone(),
                })
            })
            .collect();
        functions.push(AbiFunction::native_transfer());
        functions
    }
}

/// Result of resolving a target's selectors. Always has at least the native-transfer option.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AbiState {
    Ready(Vec<AbiFunction>),
    Unavailable { reason: String, options: Vec<AbiFunction> },
}

impl AbiState {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        AbiState::Unavailable { reason: reason.into(), options: vec![AbiFunction::native_transfer()] }
    }

    pub fn options(&self) -> &[AbiFunction] {
        match self {
            AbiState::Ready(options) => options,
            AbiState::Unavailable { options, .. } => options,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, AbiState::Ready(_))
    }

    /// Option whose selector is `selector`, if offered.
    pub fn find(&self, selector: FunctionSelector) -> Option<&AbiFunction> {
        self.options().iter().find(|f| f.selector() == selector)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&AbiFunction> {
        self.options().iter().find(|f| f.name == name)
    }
}

/// External source of contract ABIs.
#[async_trait]
pub trait AbiSource: Send + Sync {
    async fn fetch_abi(&self, address: Address) -> Result<Vec<AbiEntry>, AbiError>;
}

/// Resolve the selectors of `address`; failures turn into [`AbiState::Unavailable`].
pub async fn resolve<S: AbiSource + ?Sized>(source: &S, filter: &AbiFilter, address: Address) -> AbiState {
    match source.fetch_abi(address).await {
        Ok(entries) => {
            let functions = filter.usable_functions(&entries);
            debug!(%address, count = functions.len(), "resolved callable functions");
            AbiState::Ready(functions)
        }
        Err(err) => {
            warn!(%address, error = %err, "ABI unavailable, offering native transfer only");
            AbiState::unavailable(format!("Failed to fetch contract ABI: {err}"))
        }
    }
}

#[derive(Deserialize)]
struct AbiResponse {
    abi: Option<serde_json::Value>,
}

/// HTTP client for an abidata-style registry: `GET {base}/{address}?network={network}`.
#[derive(Clone, Debug)]
pub struct AbiDataClient {
    http: reqwest::Client,
    base_url: String,
    network: String,
}

impl Default for AbiDataClient {
    fn default() -> Self {
        Self::new(DEFAULT_ABI_BASE_URL, DEFAULT_ABI_NETWORK)
    }
}

impl AbiDataClient {
    pub fn new(base_url: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            network: network.into(),
        }
    }

    pub fn url_for(&self, address: Address) -> String {
        format!("{}/{}", self.base_url, address)
    }
}

#[async_trait]
impl AbiSource for AbiDataClient {
    async fn fetch_abi(&self, address: Address) -> Result<Vec<AbiEntry>, AbiError> {
        let response = self
            .http
            .get(self.url_for(address))
            .query(&[("network", self.network.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AbiError::Status(status.as_u16()));
        }

        let body: AbiResponse = response
            .json()
            .await
            .map_err(|e| AbiError::Malformed(e.to_string()))?;
        parse_abi(body.abi)
    }
}

fn parse_abi(abi: Option<serde_json::Value>) -> Result<Vec<AbiEntry>, AbiError> {
    let value = match abi {
        Some(serde_json::Value::Array(items)) if !items.is_empty() => serde_json::Value::Array(items),
        _ => return Err(AbiError::Empty),
    };
    serde_json::from_value(value).map_err(|e| AbiError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entries() -> Vec<AbiEntry> {
        serde_json::from_value(json!([
            { "type": "function", "name": "mint", "stateMutability": "nonpayable", "inputs": [], "outputs": [] },
            { "type": "function", "name": "balanceOf", "stateMutability": "view",
              "inputs": [{ "name": "owner", "type": "address" }], "outputs": [{ "name": "", "type": "uint256" }] },
            { "type": "function", "name": "deposit", "stateMutability": "payable", "inputs": [] },
            { "type": "function", "name": "CloseStream", "stateMutability": "nonpayable", "inputs": [] },
            { "type": "event", "name": "Transfer", "inputs": [] },
            { "type": "constructor", "stateMutability": "nonpayable", "inputs": [] }
        ]))
        .unwrap()
    }

    #[test]
    fn filters_read_only_and_denylisted() {
        let functions = AbiFilter::default().usable_functions(&entries());
        let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["mint", "deposit", NATIVE_TRANSFER]);
    }

    #[test]
    fn native_transfer_appended_once_and_last() {
        let mut raw = entries();
        raw.push(AbiEntry {
            kind: "function".into(),
            name: Some(NATIVE_TRANSFER.into()),
            state_mutability: Some("payable".into()),
            inputs: vec![],
            outputs: vec![],
        });
        let functions = AbiFilter::default().usable_functions(&raw);
        assert_eq!(functions.iter().filter(|f| f.is_native_transfer()).count(), 1);
        assert!(functions.last().unwrap().is_native_transfer());
    }

    #[test]
    fn no_usable_functions_still_offers_native_transfer() {
        let view_only: Vec<AbiEntry> = entries().into_iter().filter(|e| e.name.as_deref() == Some("balanceOf")).collect();
        let functions = AbiFilter::default().usable_functions(&view_only);
        assert_eq!(functions, vec![AbiFunction::native_transfer()]);
    }

    #[test]
    fn tuple_signature_expands_components() {
        let f: AbiFunction = serde_json::from_value(json!({
            "name": "submit",
            "stateMutability": "nonpayable",
            "inputs": [
                { "name": "order", "type": "tuple", "components": [
                    { "name": "maker", "type": "address" },
                    { "name": "amounts", "type": "uint256[]" }
                ]},
                { "name": "batch", "type": "tuple[]", "components": [{ "name": "id", "type": "bytes32" }] }
            ],
            "outputs": []
        }))
        .unwrap();
        assert_eq!(f.signature(), "submit((address,uint256[]),(bytes32)[])");
    }

    #[test]
    fn native_transfer_selector_is_zero() {
        assert_eq!(AbiFunction::native_transfer().selector(), NATIVE_TRANSFER_SELECTOR);
    }

    #[test]
    fn empty_or_missing_abi_is_rejected() {
        assert!(matches!(parse_abi(None), Err(AbiError::Empty)));
        assert!(matches!(parse_abi(Some(json!([]))), Err(AbiError::Empty)));
        assert!(matches!(parse_abi(Some(json!("not an abi"))), Err(AbiError::Empty)));
        assert!(matches!(parse_abi(Some(json!([{ "name": "x" }]))), Err(AbiError::Malformed(_))));
    }

    #[test]
    fn url_has_no_double_slash() {
        let client = AbiDataClient::new("https://abidata.net/", "sepolia");
        assert_eq!(client.url_for(Address::ZERO), format!("https://abidata.net/{}", Address::ZERO));
    }
}
