//! Solidity ABI bindings for SmartSessions, ERC-7579 accounts, the module registry and
//! the v0.7 EntryPoint, plus conversions from the shared session types.

use alloy_sol_types::sol;

use smart_session_types as types;

sol! {
    struct PolicyData {
        address policy;
        bytes initData;
    }

    struct ActionData {
        bytes4 actionTargetSelector;
        address actionTarget;
        PolicyData[] actionPolicies;
    }

    struct ERC7739Data {
        string[] allowedERC7739Content;
        PolicyData[] erc1271Policies;
    }

    struct Session {
        address sessionValidator;
        bytes sessionValidatorInitData;
        bytes32 salt;
        PolicyData[] userOpPolicies;
        ERC7739Data erc7739Policies;
        ActionData[] actions;
    }

    /// ERC-7579 batch entry.
    struct Execution {
        address target;
        uint256 value;
        bytes callData;
    }

    interface ISmartSession {
        function enableSessions(Session[] memory sessions) external returns (bytes32[] memory permissionIds);
        function removeSession(bytes32 permissionId) external;
    }

    interface IERC7579Account {
        function execute(bytes32 mode, bytes calldata executionCalldata) external payable;
        function installModule(uint256 moduleTypeId, address module, bytes calldata initData) external payable;
        function isModuleInstalled(uint256 moduleTypeId, address module, bytes calldata additionalContext)
            external
            view
            returns (bool);
    }

    interface IRegistry {
        function trustAttesters(uint8 threshold, address[] calldata attesters) external;
    }

    interface IEntryPoint {
        function getNonce(address sender, uint192 key) external view returns (uint256 nonce);
    }
}

impl From<&types::PolicyData> for PolicyData {
    fn from(p: &types::PolicyData) -> Self {
        PolicyData { policy: p.policy, initData: p.init_data.clone() }
    }
}

impl From<&types::Action> for ActionData {
    fn from(a: &types::Action) -> Self {
        ActionData {
            actionTargetSelector: a.selector,
            actionTarget: a.target,
            actionPolicies: a.policies.iter().map(PolicyData::from).collect(),
        }
    }
}

impl From<&types::Session> for Session {
    fn from(s: &types::Session) -> Self {
        Session {
            sessionValidator: s.validator,
            sessionValidatorInitData: s.validator_init_data.clone(),
            salt: s.salt,
            userOpPolicies: s.user_op_policies.iter().map(PolicyData::from).collect(),
            erc7739Policies: ERC7739Data {
                allowedERC7739Content: s.erc7739_policies.allowed_content.clone(),
                erc1271Policies: s.erc7739_policies.erc1271_policies.iter().map(PolicyData::from).collect(),
            },
            actions: s.actions.iter().map(ActionData::from).collect(),
        }
    }
}
