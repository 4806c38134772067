use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

use crate::action::{Action, PolicyData};

/// Mode byte prefixed to every smart-session signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SmartSessionMode {
    /// Use a permission that is already enabled on the account.
    Use = 0x00,
    Enable = 0x01,
    UnsafeEnable = 0x02,
}

impl TryFrom<u8> for SmartSessionMode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use SmartSessionMode::*;
        let mode = match value {
            0x00 => Use,
            0x01 => Enable,
            0x02 => UnsafeEnable,
            _ => return Err(()),
        };
        Ok(mode)
    }
}

/// ERC-7739 typed-content allowances and ERC-1271 policies of a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Erc7739Policies {
    pub allowed_content: Vec<String>,
    pub erc1271_policies: Vec<PolicyData>,
}

/// Delegated permission record scoping a session validator to a set of actions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub validator: Address,
    pub validator_init_data: Bytes,
    pub salt: B256,
    pub user_op_policies: Vec<PolicyData>,
    pub erc7739_policies: Erc7739Policies,
    pub actions: Vec<Action>,
}

impl Session {
    /// Returns a new session carrying `actions`; `self` is left untouched.
    pub fn with_actions(&self, actions: Vec<Action>) -> Self {
        Self { actions, ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trips_through_u8() {
        for mode in [SmartSessionMode::Use, SmartSessionMode::Enable, SmartSessionMode::UnsafeEnable] {
            assert_eq!(SmartSessionMode::try_from(mode as u8), Ok(mode));
        }
        assert!(SmartSessionMode::try_from(0x03).is_err());
    }

    #[test]
    fn with_actions_replaces_instead_of_mutating() {
        let base = Session {
            validator: Address::repeat_byte(1),
            validator_init_data: Bytes::new(),
            salt: B256::ZERO,
            user_op_policies: vec![],
            erc7739_policies: Erc7739Policies::default(),
            actions: vec![],
        };
        let next = base.with_actions(vec![Action::unset(vec![])]);
        assert!(base.actions.is_empty());
        assert_eq!(next.actions.len(), 1);
        assert_eq!(next.validator, base.validator);
    }
}
