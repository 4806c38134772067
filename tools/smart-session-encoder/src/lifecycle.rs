//! Install and update of the SmartSessions validator on an account.
//!
//! Bundles are explicit ordered lists and each one is submitted as a single user operation,
//! so the account executes them atomically:
//! - install: `trustAttesters` on the registry, then `installModule` on the account.
//! - update: `removeSession(permissionId)`, then `enableSessions([session])`.

use alloy_primitives::{Address, B256};
use alloy_sol_types::SolCall;
use tracing::{info, warn};

use smart_session_types::{
    addresses::{MOCK_ATTESTER, RHINESTONE_ATTESTER, SMART_SESSIONS},
    Session,
};

use crate::{
    client::AccountAbstractionClient,
    contracts::IERC7579Account,
    dispatcher::UserOperationDispatcher,
    encoder::{
        enable_sessions_call, install_module_call, is_smart_sessions_installed_call, remove_session_call,
        smart_sessions_init_data, trust_attesters_call, Call,
    },
    error::{InstallError, UpdateError},
    session::permission_id,
    signer::UserOperationSigner,
};

/// Attestation sources the account is told to trust when the module is installed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrustConfig {
    pub threshold: u8,
    pub attesters: Vec<Address>,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self { threshold: 1, attesters: vec![RHINESTONE_ATTESTER, MOCK_ATTESTER] }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionState {
    Uninstalled,
    Installed { permission_id: B256 },
}

/// Ordered install bundle for `account`.
pub fn install_calls(account: Address, session: &Session, trust: &TrustConfig) -> Vec<Call> {
    vec![
        trust_attesters_call(trust.threshold, &trust.attesters),
        install_module_call(account, SMART_SESSIONS, smart_sessions_init_data(std::slice::from_ref(session))),
    ]
}

/// Ordered update bundle replacing the session that shares `session`'s permission id.
pub fn update_calls(session: &Session) -> Vec<Call> {
    vec![
        remove_session_call(permission_id(session)),
        enable_sessions_call(std::slice::from_ref(session)),
    ]
}

/// Drives one account through `Uninstalled -> Installed -> Installed` using owner-signed
/// operations.
///
/// State is local: the controller does not read the chain. Seed it with
/// [`PermissionController::with_state`] after checking [`is_module_installed`].
pub struct PermissionController<'a, C> {
    dispatcher: &'a UserOperationDispatcher<C>,
    owner: &'a dyn UserOperationSigner,
    trust: TrustConfig,
    state: PermissionState,
}

impl<'a, C: AccountAbstractionClient> PermissionController<'a, C> {
    pub fn new(dispatcher: &'a UserOperationDispatcher<C>, owner: &'a dyn UserOperationSigner) -> Self {
        Self { dispatcher, owner, trust: TrustConfig::default(), state: PermissionState::Uninstalled }
    }

    pub fn with_state(mut self, state: PermissionState) -> Self {
        self.state = state;
        self
    }

    pub fn with_trust(mut self, trust: TrustConfig) -> Self {
        self.trust = trust;
        self
    }

    pub fn state(&self) -> PermissionState {
        self.state
    }

    pub async fn install(&mut self, session: &Session) -> Result<B256, InstallError> {
        if let PermissionState::Installed { permission_id } = self.state {
            return Err(InstallError::AlreadyInstalled(permission_id));
        }
        let calls = install_calls(self.dispatcher.account(), session, &self.trust);
        let tx_hash = self.dispatcher.dispatch(&calls, self.owner).await?;

        let id = permission_id(session);
        info!(%tx_hash, permission_id = %id, "smart sessions installed");
        self.state = PermissionState::Installed { permission_id: id };
        Ok(tx_hash)
    }

    pub async fn update(&mut self, session: &Session) -> Result<B256, UpdateError> {
        if self.state == PermissionState::Uninstalled {
            return Err(UpdateError::NotInstalled);
        }
        let id = permission_id(session);
        if let PermissionState::Installed { permission_id: current } = self.state {
            if current != id {
                warn!(%current, new = %id, "update targets a different permission id; the current one stays enabled");
            }
        }
        let calls = update_calls(session);
        let tx_hash = self.dispatcher.dispatch(&calls, self.owner).await?;

        info!(%tx_hash, permission_id = %id, "session updated");
        self.state = PermissionState::Installed { permission_id: id };
        Ok(tx_hash)
    }
}

/// Whether the account reports SmartSessions as an installed validator. Read failures
/// count as not installed.
pub async fn is_module_installed<C: AccountAbstractionClient>(dispatcher: &UserOperationDispatcher<C>) -> bool {
    let account = dispatcher.account();
    let out = match dispatcher.read(account, is_smart_sessions_installed_call()).await {
        Ok(out) => out,
        Err(err) => {
            warn!(%account, error = %err, "isModuleInstalled read failed");
            return false;
        }
    };
    IERC7579Account::isModuleInstalledCall::abi_decode_returns(&out, true)
        .map(|r| r._0)
        .unwrap_or(false)
}
