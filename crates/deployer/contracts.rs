//! Fixed ABI surface of the factory, the vesting contract and the token.

use timelocks_common::{Address, H160};

pub const COMPUTE_TIMELOCK_ADDRESS_SIGNATURE: &str =
    "computeTimelockAddress(address,address,address,uint256,uint256)";
pub const DEPLOY_TIMELOCK_SIGNATURE: &str =
    "deployTimelock(address,address,address,uint256,uint256,uint256,uint256,uint256)";
/// Emitted by the factory with the new timelock as first (indexed) argument.
pub const TIMELOCK_DEPLOYED_EVENT: &str = "TimelockDeployed(address,address,uint256,uint256)";
/// Constructor of the vesting contract, as consumed by source verification.
pub const TIMELOCK_CONSTRUCTOR_SIGNATURE: &str =
    "constructor(address,address,address,uint256,uint256,uint256)";

pub const ALLOWANCE_SIGNATURE: &str = "allowance(address,address)";
pub const APPROVE_SIGNATURE: &str = "approve(address,uint256)";

pub const FACTORY_DEPLOYMENT_NAME: &str = "TimelockFactory";
pub const TIMELOCK_DEPLOYMENT_PREFIX: &str = "Timelock-";
pub const DEFAULT_TIMELOCK_CONTRACT: &str =
    "src/timelocks/TimelockedDelegator.sol:TimelockedDelegator";

/// Deterministic deployment proxy present at the same address on most EVM chains.
/// Calldata is `salt ++ init_code`; the created address follows CREATE2.
// 0x4e59b44847b379578588920ca78fbf26c0b4956c
pub const CREATE2_DEPLOYER_ADDRESS: Address = H160([
    0x4e, 0x59, 0xb4, 0x48, 0x47, 0xb3, 0x79, 0x57, 0x85, 0x88, 0x92, 0x0c, 0xa7, 0x8f, 0xbf, 0x26,
    0xc0, 0xb4, 0x95, 0x6c,
]);
