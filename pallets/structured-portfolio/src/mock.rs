// Copyright 2021 Centrifuge Foundation (centrifuge.io).
//
// This file is part of the Centrifuge chain project.
// Centrifuge is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version (see http://www.gnu.org/licenses).
// Centrifuge is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

use std::time::Duration;

use cfg_mocks::{
	pallet_mock_asset_registry, pallet_mock_flow_control, pallet_mock_lender_eligibility,
	pallet_mock_protocol_fee,
};
use cfg_primitives::{
	Balance, PortfolioId, TrancheIndex, MAX_ACTIVE_LOANS, MAX_TRANCHES, SECONDS_PER_DAY,
	SECONDS_PER_YEAR,
};
use cfg_traits::{Millis, Seconds, TimeAsSecs};
use codec::{Decode, Encode, MaxEncodedLen};
use frame_support::{
	parameter_types,
	traits::{ConstU128, ConstU16, ConstU32, ConstU64, Contains},
};
use frame_system::EnsureRoot;
use orml_traits::asset_registry::AssetMetadata;
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};
use sp_core::H256;
use sp_runtime::{
	testing::Header,
	traits::{BlakeTwo256, IdentityLookup},
	RuntimeDebug,
};

use crate::{self as pallet_structured_portfolio};

pub const BLOCK_TIME: Duration = Duration::from_secs(12);
pub const BLOCK_TIME_MS: u64 = BLOCK_TIME.as_millis() as u64;
pub const DAY: Seconds = SECONDS_PER_DAY;
pub const YEAR: Seconds = SECONDS_PER_YEAR;

/// First moment of every test, in seconds
pub const START: Seconds = 1_700_000_000;

pub const MANAGER: AccountId = 1;
pub const LENDER: AccountId = 2;
pub const OTHER_LENDER: AccountId = 3;
pub const BORROWER: AccountId = 4;
pub const TREASURY: AccountId = 5;
pub const BENEFICIARY: AccountId = 6;
pub const ANY: AccountId = 100;

pub const AUSD: CurrencyId = CurrencyId::AUSD;
pub const AUSD_DECIMALS: u32 = 6;

type UncheckedExtrinsic = frame_system::mocking::MockUncheckedExtrinsic<Runtime>;
type Block = frame_system::mocking::MockBlock<Runtime>;

pub type AccountId = u128;

#[derive(
	Clone,
	Copy,
	Debug,
	Encode,
	Decode,
	Eq,
	PartialEq,
	Ord,
	PartialOrd,
	TypeInfo,
	MaxEncodedLen,
	Serialize,
	Deserialize,
)]
pub enum CurrencyId {
	AUSD,
	Tranche(PortfolioId, TrancheIndex),
}

#[derive(Clone, Copy, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub struct TrancheCurrency {
	pub portfolio_id: PortfolioId,
	pub tranche: TrancheIndex,
}

impl cfg_traits::TrancheCurrency<PortfolioId> for TrancheCurrency {
	fn generate(portfolio_id: PortfolioId, tranche: TrancheIndex) -> Self {
		Self {
			portfolio_id,
			tranche,
		}
	}
}

impl From<TrancheCurrency> for CurrencyId {
	fn from(currency: TrancheCurrency) -> Self {
		CurrencyId::Tranche(currency.portfolio_id, currency.tranche)
	}
}

frame_support::construct_runtime!(
	pub enum Runtime where
		Block = Block,
		NodeBlock = Block,
		UncheckedExtrinsic = UncheckedExtrinsic,
	{
		System: frame_system,
		Timer: pallet_timestamp,
		Balances: pallet_balances,
		OrmlTokens: orml_tokens,
		MockAssetRegistry: pallet_mock_asset_registry,
		MockLenderEligibility: pallet_mock_lender_eligibility,
		MockFlowControl: pallet_mock_flow_control,
		MockProtocolFee: pallet_mock_protocol_fee,
		StructuredPortfolio: pallet_structured_portfolio,
	}
);

impl frame_system::Config for Runtime {
	type AccountData = pallet_balances::AccountData<Balance>;
	type AccountId = AccountId;
	type BaseCallFilter = frame_support::traits::Everything;
	type BlockHashCount = ConstU64<250>;
	type BlockLength = ();
	type BlockNumber = u64;
	type BlockWeights = ();
	type DbWeight = ();
	type Hash = H256;
	type Hashing = BlakeTwo256;
	type Header = Header;
	type Index = u64;
	type Lookup = IdentityLookup<Self::AccountId>;
	type MaxConsumers = ConstU32<16>;
	type OnKilledAccount = ();
	type OnNewAccount = ();
	type OnSetCode = ();
	type PalletInfo = PalletInfo;
	type RuntimeCall = RuntimeCall;
	type RuntimeEvent = RuntimeEvent;
	type RuntimeOrigin = RuntimeOrigin;
	type SS58Prefix = ConstU16<42>;
	type SystemWeightInfo = ();
	type Version = ();
}

impl pallet_timestamp::Config for Runtime {
	type MinimumPeriod = ConstU64<BLOCK_TIME_MS>;
	type Moment = Millis;
	type OnTimestampSet = ();
	type WeightInfo = ();
}

impl pallet_balances::Config for Runtime {
	type AccountStore = System;
	type Balance = Balance;
	type DustRemoval = ();
	type ExistentialDeposit = ConstU128<1>;
	type FreezeIdentifier = ();
	type HoldIdentifier = ();
	type MaxFreezes = ();
	type MaxHolds = ConstU32<1>;
	type MaxLocks = ();
	type MaxReserves = ();
	type ReserveIdentifier = ();
	type RuntimeEvent = RuntimeEvent;
	type WeightInfo = ();
}

orml_traits::parameter_type_with_key! {
	pub ExistentialDeposits: |_currency_id: CurrencyId| -> Balance {
		0
	};
}

parameter_types! {
	pub const MaxLocks: u32 = 10;
	pub const MaxReserves: u32 = 10;
}

impl orml_tokens::Config for Runtime {
	type Amount = i64;
	type Balance = Balance;
	type CurrencyHooks = ();
	type CurrencyId = CurrencyId;
	type DustRemovalWhitelist = frame_support::traits::Nothing;
	type ExistentialDeposits = ExistentialDeposits;
	type MaxLocks = MaxLocks;
	type MaxReserves = MaxReserves;
	type ReserveIdentifier = [u8; 8];
	type RuntimeEvent = RuntimeEvent;
	type WeightInfo = ();
}

impl pallet_mock_asset_registry::Config for Runtime {
	type AssetId = CurrencyId;
	type Balance = Balance;
	type CustomMetadata = ();
}

impl pallet_mock_lender_eligibility::Config for Runtime {
	type PortfolioId = PortfolioId;
}

impl pallet_mock_flow_control::Config for Runtime {
	type Balance = Balance;
	type PortfolioId = PortfolioId;
}

impl pallet_mock_protocol_fee::Config for Runtime {}

pub struct StableCurrencies;
impl Contains<CurrencyId> for StableCurrencies {
	fn contains(currency: &CurrencyId) -> bool {
		matches!(currency, CurrencyId::AUSD)
	}
}

parameter_types! {
	#[derive(scale_info::TypeInfo, Eq, PartialEq, PartialOrd, Debug, Clone, Copy)]
	pub const MaxTranches: u32 = MAX_TRANCHES;

	pub const MaxActiveLoans: u32 = MAX_ACTIVE_LOANS;
}

impl pallet_structured_portfolio::Config for Runtime {
	type AssetRegistry = MockAssetRegistry;
	type Balance = Balance;
	type CurrencyId = CurrencyId;
	type CustomMetadata = ();
	type FlowControl = MockFlowControl;
	type LenderEligibility = MockLenderEligibility;
	type MaxActiveLoans = MaxActiveLoans;
	type MaxTranches = MaxTranches;
	type PauseOrigin = EnsureRoot<AccountId>;
	type PortfolioCurrency = StableCurrencies;
	type ProtocolFee = MockProtocolFee;
	type RuntimeEvent = RuntimeEvent;
	type Time = Timer;
	type Tokens = OrmlTokens;
	type TrancheCurrency = TrancheCurrency;
	type WeightInfo = ();
}

pub fn new_test_ext() -> sp_io::TestExternalities {
	let storage = frame_system::GenesisConfig::default()
		.build_storage::<Runtime>()
		.unwrap();

	let mut ext = sp_io::TestExternalities::new(storage);
	ext.execute_with(|| {
		System::set_block_number(1);
		Timer::set_timestamp(START * 1000);
	});
	ext
}

pub fn now() -> Seconds {
	<Timer as TimeAsSecs>::now()
}

pub fn advance_time(elapsed: Seconds) {
	Timer::set_timestamp(Timer::get() + elapsed * 1000);
}

/// Permissive defaults for the policies around the portfolio. Tests override
/// single calls after this.
pub fn config_mocks() {
	MockAssetRegistry::mock_metadata(|currency| match currency {
		CurrencyId::AUSD => Some(metadata(AUSD_DECIMALS)),
		CurrencyId::Tranche(..) => None,
	});
	MockAssetRegistry::mock_register_asset(|_, _| Ok(()));
	MockLenderEligibility::mock_is_allowed(|_, _, _| true);
	MockFlowControl::mock_max_deposit(|_, _, _| Balance::MAX);
	MockFlowControl::mock_max_withdraw(|_, _, _| Balance::MAX);
	MockProtocolFee::mock_effective_fee_rate(|_| 0);
	MockProtocolFee::mock_treasury(|| TREASURY);
}

pub fn metadata(decimals: u32) -> AssetMetadata<Balance, ()> {
	AssetMetadata {
		decimals,
		name: Vec::new(),
		symbol: Vec::new(),
		existential_deposit: 0,
		location: None,
		additional: (),
	}
}
