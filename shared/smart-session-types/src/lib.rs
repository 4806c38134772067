//! Shared types for smart-session actions, sessions, policies and submission records.
//!
//! These are plain data: encoding into ABI payloads lives in `smart-session-encoder`.

pub mod action;
pub mod addresses;
pub mod record;
pub mod session;

pub use action::{Action, ActionField, FunctionSelector, PolicyData, NATIVE_TRANSFER_SELECTOR};
pub use record::TransactionRecord;
pub use session::{Erc7739Policies, Session, SmartSessionMode};
