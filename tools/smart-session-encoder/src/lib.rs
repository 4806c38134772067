//! Smart-session construction, module call encoding and user-operation dispatch.
//!
//! The flow mirrors how a Safe7579 account delegates to a session key:
//! - [`registry`] edits the (target, selector, policies) action list and resolves
//!   selectors from a contract ABI.
//! - [`session`] turns actions into a [`Session`](smart_session_types::Session) and
//!   derives its permission id.
//! - [`lifecycle`] installs or updates the SmartSessions module with owner-signed bundles.
//! - [`dispatcher`] builds, signs, submits and confirms user operations.

pub mod abi;
pub mod calldata;
pub mod client;
pub mod contracts;
pub mod debounce;
pub mod dispatcher;
pub mod encoder;
pub mod error;
pub mod history;
pub mod lifecycle;
pub mod mock;
pub mod registry;
pub mod session;
pub mod signer;
pub mod user_op;


pub use abi::{AbiDataClient, AbiFilter, AbiFunction, AbiSource, AbiState};
pub use client::{AccountAbstractionClient, BundlerRpcClient};
pub use dispatcher::{DispatcherConfig, UserOperationDispatcher};
pub use encoder::Call;
pub use error::{DispatchError, InstallError, UpdateError};
pub use history::TransactionHistory;
pub use lifecycle::{is_module_installed, PermissionController, PermissionState, TrustConfig};
pub use registry::ActionRegistry;
pub use session::{build_session, permission_id, ValidatorConfig};
pub use signer::{LocalSigner, OwnerSigner, SessionKeySigner, UserOperationSigner};
pub use user_op::UserOperation;
