//! Encoders for the module calls and signature envelopes used by smart sessions.

use alloy_primitives::{Address, Bytes, FixedBytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use sha3::{Digest, Keccak256};
use tracing::debug;

use smart_session_types::{
    addresses::{MODULE_TYPE_VALIDATOR, REGISTRY, SMART_SESSIONS},
    Session, SmartSessionMode,
};

use crate::contracts::{self, IERC7579Account, IRegistry, ISmartSession};

/// Mock ECDSA signature the OwnableValidator accepts as well-formed during estimation.
const OWNABLE_MOCK_SIGNATURE: [u8; 65] = [
    0xe8, 0xb9, 0x47, 0x48, 0x58, 0x0c, 0xa0, 0xb4, 0x99, 0x3c, 0x9a, 0x1b, 0x86, 0xb5, 0xbe, 0x85,
    0x1b, 0xfc, 0x07, 0x6f, 0xf5, 0xce, 0x3a, 0x1f, 0xf6, 0x5b, 0xf1, 0x63, 0x92, 0xac, 0xfc, 0xb8,
    0x00, 0xf9, 0xb4, 0xf1, 0xae, 0xf1, 0x55, 0x5c, 0x7f, 0xce, 0x55, 0x99, 0xff, 0xfb, 0x17, 0xe7,
    0xc6, 0x35, 0x50, 0x21, 0x54, 0xa0, 0x33, 0x3b, 0xa2, 0x1f, 0x3a, 0xe4, 0x91, 0x83, 0x9a, 0xf5,
    0x1c,
];

/// One call inside a user operation bundle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl Call {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self { to, value: U256::ZERO, data: data.into() }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

pub(crate) fn keccak256_bytes(bytes: &[u8]) -> B256 {
    let mut h = Keccak256::new();
    h.update(bytes);
    let out = h.finalize();
    let mut b = [0u8; 32];
    b.copy_from_slice(&out[..]);
    FixedBytes(b)
}

/// First four bytes of `keccak256(signature)`.
pub fn selector(signature: &str) -> FixedBytes<4> {
    let h = keccak256_bytes(signature.as_bytes());
    FixedBytes([h[0], h[1], h[2], h[3]])
}

/// SmartSessions `onInstall` payload: `abi.encode(Session[])`.
pub fn smart_sessions_init_data(sessions: &[Session]) -> Bytes {
    let sessions: Vec<contracts::Session> = sessions.iter().map(contracts::Session::from).collect();
    let data = sessions.abi_encode();
    debug!(len = data.len(), "encoded smart sessions init data");
    Bytes::from(data)
}

/// `installModule(1, module, initData)` on the account itself.
pub fn install_module_call(account: Address, module: Address, init_data: Bytes) -> Call {
    let data = IERC7579Account::installModuleCall {
        moduleTypeId: U256::from(MODULE_TYPE_VALIDATOR),
        module,
        initData: init_data,
    }
    .abi_encode();
    Call::new(account, data)
}

/// `trustAttesters(threshold, attesters)` on the module registry.
///
/// The registry requires attesters sorted ascending with no duplicates.
pub fn trust_attesters_call(threshold: u8, attesters: &[Address]) -> Call {
    let mut attesters = attesters.to_vec();
    attesters.sort();
    attesters.dedup();
    let data = IRegistry::trustAttestersCall { threshold, attesters }.abi_encode();
    Call::new(REGISTRY, data)
}

pub fn enable_sessions_call(sessions: &[Session]) -> Call {
    let sessions = sessions.iter().map(contracts::Session::from).collect();
    let data = ISmartSession::enableSessionsCall { sessions }.abi_encode();
    Call::new(SMART_SESSIONS, data)
}

pub fn remove_session_call(permission_id: B256) -> Call {
    let data = ISmartSession::removeSessionCall { permissionId: permission_id }.abi_encode();
    Call::new(SMART_SESSIONS, data)
}

/// `isModuleInstalled(1, SMART_SESSIONS, 0x)` call data.
pub fn is_smart_sessions_installed_call() -> Bytes {
    IERC7579Account::isModuleInstalledCall {
        moduleTypeId: U256::from(MODULE_TYPE_VALIDATOR),
        module: SMART_SESSIONS,
        additionalContext: Bytes::new(),
    }
    .abi_encode()
    .into()
}

/// Smart-session signature envelope: `mode || permissionId || signature`.
pub fn encode_session_signature(mode: SmartSessionMode, permission_id: B256, signature: &[u8]) -> Bytes {
    let mut buf = Vec::with_capacity(1 + 32 + signature.len());
    buf.push(mode as u8);
    buf.extend_from_slice(permission_id.as_slice());
    buf.extend_from_slice(signature);
    Bytes::from(buf)
}

/// `threshold` concatenated copies of the OwnableValidator mock signature.
pub fn ownable_mock_signature(threshold: u64) -> Vec<u8> {
    let n = threshold.max(1) as usize;
    let mut buf = Vec::with_capacity(OWNABLE_MOCK_SIGNATURE.len().saturating_mul(n));
    for _ in 0..n {
        buf.extend_from_slice(&OWNABLE_MOCK_SIGNATURE);
    }
    buf
}

/// Placeholder signature with the exact shape of a `Use` signature for `permission_id`.
pub fn dummy_session_signature(permission_id: B256, threshold: u64) -> Bytes {
    encode_session_signature(SmartSessionMode::Use, permission_id, &ownable_mock_signature(threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use smart_session_types::addresses::{MOCK_ATTESTER, RHINESTONE_ATTESTER};

    #[test]
    fn known_selectors() {
        assert_eq!(selector("mint()"), FixedBytes([0x12, 0x49, 0xc5, 0x8b]));
        assert_eq!(selector("transfer(address,uint256)"), FixedBytes([0xa9, 0x05, 0x9c, 0xbb]));
    }

    #[test]
    fn trust_attesters_sorts_and_targets_registry() {
        let call = trust_attesters_call(1, &[MOCK_ATTESTER, RHINESTONE_ATTESTER, MOCK_ATTESTER]);
        assert_eq!(call.to, REGISTRY);
        let decoded = IRegistry::trustAttestersCall::abi_decode(&call.data, true).unwrap();
        assert_eq!(decoded.threshold, 1);
        assert_eq!(decoded.attesters, vec![RHINESTONE_ATTESTER, MOCK_ATTESTER]);
    }

    #[test]
    fn install_module_targets_account() {
        let account = Address::repeat_byte(0xaa);
        let call = install_module_call(account, SMART_SESSIONS, Bytes::from(vec![1, 2, 3]));
        assert_eq!(call.to, account);
        assert_eq!(call.value, U256::ZERO);
        let decoded = IERC7579Account::installModuleCall::abi_decode(&call.data, true).unwrap();
        assert_eq!(decoded.moduleTypeId, U256::from(1u64));
        assert_eq!(decoded.module, SMART_SESSIONS);
        assert_eq!(decoded.initData, Bytes::from(vec![1, 2, 3]));
    }

    #[test]
    fn remove_session_round_trips_id() {
        let id = B256::repeat_byte(0x42);
        let call = remove_session_call(id);
        assert_eq!(call.to, SMART_SESSIONS);
        let decoded = ISmartSession::removeSessionCall::abi_decode(&call.data, true).unwrap();
        assert_eq!(decoded.permissionId, id);
    }

    #[test]
    fn session_signature_layout() {
        let id = B256::repeat_byte(0x07);
        let sig = encode_session_signature(SmartSessionMode::Use, id, &[0xaa; 65]);
        assert_eq!(sig.len(), 1 + 32 + 65);
        assert_eq!(sig[0], 0x00);
        assert_eq!(&sig[1..33], id.as_slice());
        assert_eq!(&sig[33..], &[0xaa; 65]);
    }

    #[test]
    fn mock_signature_scales_with_threshold() {
        assert_eq!(ownable_mock_signature(1).len(), 65);
        assert_eq!(ownable_mock_signature(3).len(), 195);
        assert_eq!(ownable_mock_signature(1)[64], 0x1c);
    }

    #[test]
    fn zero_threshold_still_yields_one_signature() {
        let sig = ownable_mock_signature(0);
        assert_eq!(sig, ownable_mock_signature(1));
    }
}
