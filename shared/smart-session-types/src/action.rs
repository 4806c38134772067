use alloy_primitives::{Address, Bytes, FixedBytes};
use serde::{Deserialize, Serialize};

/// 4-byte function identifier.
pub type FunctionSelector = FixedBytes<4>;

/// Selector reserved for a plain value transfer with no call data.
pub const NATIVE_TRANSFER_SELECTOR: FunctionSelector = FixedBytes([0u8; 4]);

/// A policy module plus the bytes it is initialised with for one session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyData {
    pub policy: Address,
    pub init_data: Bytes,
}

/// One allowed (target, selector, policies) triple within a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub target: Address,
    pub selector: FunctionSelector,
    pub policies: Vec<PolicyData>,
}

impl Action {
    pub fn new(target: Address, selector: FunctionSelector, policies: Vec<PolicyData>) -> Self {
        Self { target, selector, policies }
    }

    /// Row placeholder: null target, zero selector.
    pub fn unset(policies: Vec<PolicyData>) -> Self {
        Self::new(Address::ZERO, NATIVE_TRANSFER_SELECTOR, policies)
    }

    pub fn is_native_transfer(&self) -> bool {
        self.selector == NATIVE_TRANSFER_SELECTOR
    }
}

/// Editable column of an action row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionField {
    Target(Address),
    Selector(FunctionSelector),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_action_is_native_transfer_to_zero() {
        let action = Action::unset(vec![]);
        assert_eq!(action.target, Address::ZERO);
        assert!(action.is_native_transfer());
    }

    #[test]
    fn action_serialises_camel_case() {
        let action = Action::new(
            Address::repeat_byte(0x11),
            FixedBytes([0xa9, 0x05, 0x9c, 0xbb]),
            vec![PolicyData { policy: Address::repeat_byte(0x22), init_data: Bytes::new() }],
        );
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["selector"], "0xa9059cbb");
        assert_eq!(json["policies"][0]["initData"], "0x");
    }
}
