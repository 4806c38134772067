//! Well-known deployments (module-sdk canonical addresses, EntryPoint v0.7).

use alloy_primitives::{address, Address};

pub const SMART_SESSIONS: Address = address!("00000000002B0eCfbD0496EE71e01257dA0E37DE");
pub const OWNABLE_VALIDATOR: Address = address!("000000000013fdB5234E4E3162a810F54d9f7E98");
pub const SUDO_POLICY: Address = address!("0000003111cD8e92337C100F22B7A9dbf8DEE301");

/// ERC-7484 module registry.
pub const REGISTRY: Address = address!("000000000069E2a187AEFFb852bF3cCdC95151B2");
pub const RHINESTONE_ATTESTER: Address = address!("000000333034E9f539ce08819E12c1b8Cb29084d");
pub const MOCK_ATTESTER: Address = address!("6D0515e8E499468DCe9583626f0cA15b887f9d03");

pub const ENTRY_POINT_V07: Address = address!("0000000071727De22E5E9d8BAf0edAc6f37da032");
/// Safe7579 adapter: the Safe4337-compatible module that verifies owner `SafeOp` signatures.
pub const SAFE_7579_ADAPTER: Address = address!("3Fdb5BC686e861480ef99A6E3FaAe03c0b9F32e2");

// ERC-7579 module type IDs.
pub const MODULE_TYPE_VALIDATOR: u64 = 1;

pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;
