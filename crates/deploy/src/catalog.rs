//! The RabbitSwap V3 deployment plans.

use alloy_core::primitives::Bytes;

use crate::{
    contract::{Arg, ContractSpec, label_to_bytes32},
    error::DeployError,
    plan::Plan,
    step::{CallSpec, Step},
};

/// Registry names of the deployed contracts.
pub mod names {
    pub const FACTORY: &str = "RabbitSwapV3Factory";
    pub const MULTICALL: &str = "RabbitSwapInterfaceMulticall";
    pub const TICK_LENS: &str = "TickLens";
    pub const QUOTER_V2: &str = "QuoterV2";
    pub const PROXY_ADMIN: &str = "ProxyAdmin";
    pub const NFT_DESCRIPTOR_LIBRARY: &str = "NFTDescriptorLibraryV1";
    pub const NFT_POSITION_DESCRIPTOR: &str = "NFTPositionDescriptorV1";
    pub const NFT_POSITION_DESCRIPTOR_PROXY: &str = "NFTPositionDescriptorProxy";
    pub const NFT_POSITION_MANAGER: &str = "NFTPositionManager";
    pub const SWAP_ROUTER: &str = "SwapRouter";
    pub const WETH: &str = "WETH";
    pub const SWAP_ROUTER_TEST: &str = "SwapRouterTest";
    pub const NFT_POSITION_MANAGER_TEST: &str = "NonfungiblePositionManagerTest";
}

/// Fully qualified contract identifiers.
pub mod contracts {
    pub const FACTORY: &str = "contracts/core/RabbitSwapV3Factory.sol:RabbitSwapV3Factory";
    pub const MULTICALL: &str =
        "contracts/periphery/lens/RabbitSwapInterfaceMulticall.sol:RabbitSwapInterfaceMulticall";
    pub const TICK_LENS: &str = "contracts/periphery/lens/TickLens.sol:TickLens";
    pub const QUOTER_V2: &str = "contracts/periphery/lens/QuoterV2.sol:QuoterV2";
    pub const PROXY_ADMIN: &str = "@openzeppelin/contracts/proxy/ProxyAdmin.sol:ProxyAdmin";
    pub const NFT_DESCRIPTOR: &str =
        "contracts/periphery/libraries/NFTDescriptor.sol:NFTDescriptor";
    pub const NFT_POSITION_DESCRIPTOR: &str = "contracts/periphery/NonfungibleTokenPositionDescriptor.sol:NonfungibleTokenPositionDescriptor";
    pub const TRANSPARENT_PROXY: &str = "@openzeppelin/contracts/proxy/TransparentUpgradeableProxy.sol:TransparentUpgradeableProxy";
    pub const NFT_POSITION_MANAGER: &str =
        "contracts/periphery/NonfungiblePositionManager.sol:NonfungiblePositionManager";
    pub const SWAP_ROUTER: &str = "contracts/periphery/SwapRouter.sol:SwapRouter";
    pub const WETH: &str = "contracts/external/WETH.sol:WETH";
    pub const SWAP_ROUTER_TEST: &str = "contracts/periphery/test/SwapRouterTest.sol:SwapRouterTest";
    pub const NFT_POSITION_MANAGER_TEST: &str =
        "contracts/periphery/test/NonfungiblePositionManagerTest.sol:NonfungiblePositionManagerTest";
}

const ONE_BP_FEE: u64 = 100;
const ONE_BP_TICK_SPACING: i64 = 1;
/// 20% of swap fees go to the protocol for both tokens.
const PROTOCOL_FEE_DEFAULT: u64 = 2_000;

/// The currency label used when none is configured.
pub const DEFAULT_NATIVE_CURRENCY_LABEL: &str = "ETH";

/// The plans that can be selected by name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum PlanKind {
    /// Factory, fee configuration and the periphery.
    #[default]
    Core,
    /// Wrapped native token.
    Weth,
    SwapRouterTest,
    PositionManagerTest,
    /// Write a message through the deployed position manager test contract.
    PositionManagerTestWrite,
}

/// Inputs that vary between networks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogParams {
    /// Native currency label shown by the position descriptor, e.g. `ETH` or `VIC`.
    pub native_currency_label: String,
}

impl Default for CatalogParams {
    fn default() -> Self {
        Self {
            native_currency_label: DEFAULT_NATIVE_CURRENCY_LABEL.to_string(),
        }
    }
}

impl PlanKind {
    /// Build the plan.
    pub fn plan(self, params: &CatalogParams) -> Result<Plan, DeployError> {
        Ok(match self {
            Self::Core => core(params)?,
            Self::Weth => weth(),
            Self::SwapRouterTest => swap_router_test(),
            Self::PositionManagerTest => position_manager_test(),
            Self::PositionManagerTestWrite => position_manager_test_write(),
        })
    }
}

fn core(params: &CatalogParams) -> Result<Plan, DeployError> {
    let currency_label = label_to_bytes32(&params.native_currency_label)?;

    Ok(Plan::new(PlanKind::Core.to_string())
        .step(Step::deploy(
            "DEPLOY_V3_CORE_FACTORY",
            names::FACTORY,
            ContractSpec::new(contracts::FACTORY),
        ))
        .step(Step::call(
            "ADD_1BP_FEE_TIER",
            CallSpec::new(names::FACTORY, "enableFeeAmount(uint24,int24)")
                .arg(Arg::uint(ONE_BP_FEE, 24))
                .arg(Arg::int(ONE_BP_TICK_SPACING, 24)),
        ))
        .step(Step::call(
            "SET_PROTOCOL_FEE_DEFAULT",
            CallSpec::new(names::FACTORY, "setFeeProtocolDefault(uint16,uint16)")
                .arg(Arg::uint(PROTOCOL_FEE_DEFAULT, 16))
                .arg(Arg::uint(PROTOCOL_FEE_DEFAULT, 16)),
        ))
        .step(Step::deploy(
            "DEPLOY_MULTICALL2",
            names::MULTICALL,
            ContractSpec::new(contracts::MULTICALL),
        ))
        .step(Step::deploy(
            "DEPLOY_TICK_LENS",
            names::TICK_LENS,
            ContractSpec::new(contracts::TICK_LENS),
        ))
        .step(Step::deploy(
            "DEPLOY_QUOTER_V2",
            names::QUOTER_V2,
            ContractSpec::new(contracts::QUOTER_V2)
                .arg(Arg::registry(names::FACTORY))
                .arg(Arg::registry(names::WETH)),
        ))
        .step(Step::deploy(
            "DEPLOY_PROXY_ADMIN",
            names::PROXY_ADMIN,
            ContractSpec::new(contracts::PROXY_ADMIN),
        ))
        .step(Step::deploy(
            "DEPLOY_NFT_DESCRIPTOR_LIBRARY_V1",
            names::NFT_DESCRIPTOR_LIBRARY,
            ContractSpec::new(contracts::NFT_DESCRIPTOR),
        ))
        .step(Step::deploy(
            "DEPLOY_NFT_POSITION_DESCRIPTOR_V1",
            names::NFT_POSITION_DESCRIPTOR,
            ContractSpec::new(contracts::NFT_POSITION_DESCRIPTOR)
                .link(contracts::NFT_DESCRIPTOR, names::NFT_DESCRIPTOR_LIBRARY)
                .arg(Arg::registry(names::WETH))
                .arg(Arg::Bytes32(currency_label)),
        ))
        .step(Step::deploy(
            "DEPLOY_TRANSPARENT_PROXY_DESCRIPTOR",
            names::NFT_POSITION_DESCRIPTOR_PROXY,
            ContractSpec::new(contracts::TRANSPARENT_PROXY)
                .arg(Arg::registry(names::NFT_POSITION_DESCRIPTOR))
                .arg(Arg::registry(names::PROXY_ADMIN))
                .arg(Arg::Bytes(Bytes::new())),
        ))
        .step(Step::deploy(
            "DEPLOY_NONFUNGIBLE_POSITION_MANAGER",
            names::NFT_POSITION_MANAGER,
            ContractSpec::new(contracts::NFT_POSITION_MANAGER)
                .arg(Arg::registry(names::FACTORY))
                .arg(Arg::registry(names::WETH))
                .arg(Arg::registry(names::NFT_POSITION_DESCRIPTOR_PROXY)),
        ))
        .step(Step::deploy(
            "DEPLOY_SWAP_ROUTER",
            names::SWAP_ROUTER,
            ContractSpec::new(contracts::SWAP_ROUTER)
                .arg(Arg::registry(names::FACTORY))
                .arg(Arg::registry(names::WETH)),
        )))
}

fn weth() -> Plan {
    Plan::new(PlanKind::Weth.to_string()).step(Step::deploy(
        "DEPLOY_WETH",
        names::WETH,
        ContractSpec::new(contracts::WETH),
    ))
}

fn swap_router_test() -> Plan {
    Plan::new(PlanKind::SwapRouterTest.to_string()).step(Step::deploy(
        "DEPLOY_SWAP_ROUTER_TEST",
        names::SWAP_ROUTER_TEST,
        ContractSpec::new(contracts::SWAP_ROUTER_TEST)
            .arg(Arg::registry(names::FACTORY))
            .arg(Arg::registry(names::WETH)),
    ))
}

fn position_manager_test() -> Plan {
    Plan::new(PlanKind::PositionManagerTest.to_string()).step(Step::deploy(
        "DEPLOY_NFT_POSITION_MANAGER_TEST",
        names::NFT_POSITION_MANAGER_TEST,
        ContractSpec::new(contracts::NFT_POSITION_MANAGER_TEST)
            .arg(Arg::registry(names::FACTORY))
            .arg(Arg::registry(names::WETH))
            .arg(Arg::registry(names::NFT_POSITION_DESCRIPTOR_PROXY)),
    ))
}

fn position_manager_test_write() -> Plan {
    Plan::new(PlanKind::PositionManagerTestWrite.to_string()).step(Step::call(
        "WRITE_NFT_POSITION_MANAGER_TEST",
        CallSpec::new(names::NFT_POSITION_MANAGER_TEST, "write(string)")
            .arg(Arg::String("Hello, World!".to_string())),
    ))
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::Address;
    use strum::IntoEnumIterator;

    use super::*;
    use crate::registry::RegistryRecord;

    fn labels(plan: &Plan) -> Vec<&str> {
        plan.steps.iter().map(|step| step.label.as_str()).collect()
    }

    #[test]
    fn test_core_plan_order() {
        let plan = PlanKind::Core.plan(&CatalogParams::default()).unwrap();

        assert_eq!(
            labels(&plan),
            vec![
                "DEPLOY_V3_CORE_FACTORY",
                "ADD_1BP_FEE_TIER",
                "SET_PROTOCOL_FEE_DEFAULT",
                "DEPLOY_MULTICALL2",
                "DEPLOY_TICK_LENS",
                "DEPLOY_QUOTER_V2",
                "DEPLOY_PROXY_ADMIN",
                "DEPLOY_NFT_DESCRIPTOR_LIBRARY_V1",
                "DEPLOY_NFT_POSITION_DESCRIPTOR_V1",
                "DEPLOY_TRANSPARENT_PROXY_DESCRIPTOR",
                "DEPLOY_NONFUNGIBLE_POSITION_MANAGER",
                "DEPLOY_SWAP_ROUTER",
            ]
        );
    }

    #[test]
    fn test_core_plan_needs_only_weth() {
        let plan = PlanKind::Core.plan(&CatalogParams::default()).unwrap();

        assert!(plan.validate("testnet", &RegistryRecord::new(), 0).is_err());

        let existing = RegistryRecord::from([(names::WETH.to_string(), Address::repeat_byte(1))]);
        plan.validate("testnet", &existing, 0).unwrap();
    }

    #[test]
    fn test_test_plans_follow_core() {
        let params = CatalogParams::default();
        let plan = Plan::new("all")
            .extend(PlanKind::Weth.plan(&params).unwrap())
            .extend(PlanKind::Core.plan(&params).unwrap())
            .extend(PlanKind::SwapRouterTest.plan(&params).unwrap())
            .extend(PlanKind::PositionManagerTest.plan(&params).unwrap())
            .extend(PlanKind::PositionManagerTestWrite.plan(&params).unwrap());

        plan.validate("testnet", &RegistryRecord::new(), 0).unwrap();
    }

    #[test]
    fn test_plan_kind_names() {
        let names: Vec<String> = PlanKind::iter().map(|kind| kind.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "core",
                "weth",
                "swap-router-test",
                "position-manager-test",
                "position-manager-test-write",
            ]
        );
        assert_eq!(
            "swap-router-test".parse::<PlanKind>().unwrap(),
            PlanKind::SwapRouterTest
        );
    }

    #[test]
    fn test_currency_label_must_fit() {
        let params = CatalogParams {
            native_currency_label: "A".repeat(33),
        };
        assert!(matches!(
            PlanKind::Core.plan(&params),
            Err(DeployError::InvalidArgument(_))
        ));
    }
}
