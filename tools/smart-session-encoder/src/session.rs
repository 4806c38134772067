//! Session descriptor construction and permission id derivation.

use alloy_primitives::{Address, Bytes, FixedBytes, B256, U256};
use alloy_sol_types::SolValue;

use smart_session_types::{
    addresses::{OWNABLE_VALIDATOR, SUDO_POLICY},
    Action, Erc7739Policies, PolicyData, Session,
};

use crate::encoder::keccak256_bytes;

/// Default session salt: UTF-8 "2" right-padded to 32 bytes.
///
/// Fixed so that rebuilding the same session yields the same permission id.
pub const DEFAULT_SALT: B256 = {
    let mut b = [0u8; 32];
    b[0] = b'2';
    FixedBytes(b)
};

/// Unconditional allow policy; takes no init data.
pub fn sudo_policy() -> PolicyData {
    PolicyData { policy: SUDO_POLICY, init_data: Bytes::new() }
}

/// Session validator parameters shared by every session built from one config.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorConfig {
    pub validator: Address,
    pub threshold: u64,
    /// Keys allowed to sign for the session (the session key address).
    pub owners: Vec<Address>,
    pub salt: B256,
    pub user_op_policies: Vec<PolicyData>,
    /// Applied to actions that carry no policies of their own.
    pub default_action_policies: Vec<PolicyData>,
}

impl ValidatorConfig {
    /// OwnableValidator with a single session key at threshold 1.
    pub fn ownable(session_key: Address) -> Self {
        Self {
            validator: OWNABLE_VALIDATOR,
            threshold: 1,
            owners: vec![session_key],
            salt: DEFAULT_SALT,
            user_op_policies: Vec::new(),
            default_action_policies: vec![sudo_policy()],
        }
    }

    pub fn with_salt(mut self, salt: B256) -> Self {
        self.salt = salt;
        self
    }
}

/// `abi.encode(uint256 threshold, address[] owners)`, the OwnableValidator install payload.
pub fn validator_init_data(config: &ValidatorConfig) -> Bytes {
    let encoded = (U256::from(config.threshold), config.owners.clone()).abi_encode_params();
    Bytes::from(encoded)
}

/// Assemble a session from `actions`. Pure: equal inputs give equal sessions.
pub fn build_session(actions: &[Action], config: &ValidatorConfig) -> Session {
    let actions = actions
        .iter()
        .map(|action| {
            if action.policies.is_empty() {
                Action { policies: config.default_action_policies.clone(), ..action.clone() }
            } else {
                action.clone()
            }
        })
        .collect();

    Session {
        validator: config.validator,
        validator_init_data: validator_init_data(config),
        salt: config.salt,
        user_op_policies: config.user_op_policies.clone(),
        erc7739_policies: Erc7739Policies::default(),
        actions,
    }
}

/// SmartSessions permission id: `keccak256(abi.encode(validator, validatorInitData, salt))`.
///
/// The action list does not feed the id, so an update keeps the id of the session it replaces.
pub fn permission_id(session: &Session) -> B256 {
    let encoded = (
        session.validator,
        session.validator_init_data.clone(),
        session.salt,
    )
        .abi_encode_params();
    keccak256_bytes(&encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smart_session_types::ActionField;

    fn key() -> Address {
        Address::repeat_byte(0x5e)
    }

    #[test]
    fn default_salt_is_padded_ascii_two() {
        assert_eq!(DEFAULT_SALT[0], 0x32);
        assert!(DEFAULT_SALT[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn validator_init_data_layout() {
        let data = validator_init_data(&ValidatorConfig::ownable(key()));
        // threshold word, array offset, array length, one address word
        assert_eq!(data.len(), 32 * 4);
        assert_eq!(U256::from_be_slice(&data[0..32]), U256::from(1u64));
        assert_eq!(U256::from_be_slice(&data[32..64]), U256::from(64u64));
        assert_eq!(U256::from_be_slice(&data[64..96]), U256::from(1u64));
        assert_eq!(&data[96 + 12..128], key().as_slice());
    }

    #[test]
    fn actions_without_policies_get_sudo() {
        let actions = vec![Action::new(Address::repeat_byte(1), FixedBytes([1, 2, 3, 4]), vec![])];
        let session = build_session(&actions, &ValidatorConfig::ownable(key()));
        assert_eq!(session.actions[0].policies, vec![sudo_policy()]);
    }

    #[test]
    fn explicit_policies_are_kept() {
        let custom = PolicyData { policy: Address::repeat_byte(9), init_data: Bytes::from(vec![1u8]) };
        let actions = vec![Action::new(Address::repeat_byte(1), FixedBytes([1, 2, 3, 4]), vec![custom.clone()])];
        let session = build_session(&actions, &ValidatorConfig::ownable(key()));
        assert_eq!(session.actions[0].policies, vec![custom]);
    }

    #[test]
    fn permission_id_ignores_actions_but_tracks_salt() {
        let config = ValidatorConfig::ownable(key());
        let empty = build_session(&[], &config);
        let registry = crate::registry::ActionRegistry::default();
        let edited = registry
            .update(&registry.add_default(&empty.actions), 0, ActionField::Target(Address::repeat_byte(7)))
            .unwrap();
        let with_actions = empty.with_actions(edited);
        assert_eq!(permission_id(&empty), permission_id(&with_actions));

        let salted = build_session(&[], &config.with_salt(B256::repeat_byte(3)));
        assert_ne!(permission_id(&empty), permission_id(&salted));
    }
}
