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

use cfg_primitives::{TrancheIndex, BASIS_PRECISION};
use cfg_traits::Seconds;
use codec::{Decode, Encode, MaxEncodedLen};
use frame_support::{pallet_prelude::RuntimeDebug, traits::Get};
use scale_info::TypeInfo;
use sp_arithmetic::{
	traits::{AtLeast32BitUnsigned, Bounded, EnsureAdd, Saturating, Zero},
	Rounding,
};
use sp_runtime::{DispatchError, TypeId};
use sp_std::{cmp::min, vec::Vec};

use crate::tranches::{mul_div, Allocation, Tranches};

#[derive(Encode, Decode, Clone, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub struct PortfolioLocator<PortfolioId> {
	pub portfolio_id: PortfolioId,
}

// The TypeId impl we derive portfolio accounts from
impl<PortfolioId> TypeId for PortfolioLocator<PortfolioId> {
	const TYPE_ID: [u8; 4] = *b"port";
}

#[derive(Encode, Decode, Clone, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub struct TrancheLocator<PortfolioId> {
	pub portfolio_id: PortfolioId,
	pub tranche: TrancheIndex,
}

// The TypeId impl we derive tranche reserve accounts from
impl<PortfolioId> TypeId for TrancheLocator<PortfolioId> {
	const TYPE_ID: [u8; 4] = *b"trch";
}

#[derive(Clone, Copy, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub enum PortfolioStatus {
	/// Lenders deposit into the tranche reserves, no loans can be funded.
	CapitalFormation,
	/// Liquidity is pooled and lent out.
	Live,
	/// Liquidity is distributed back into the tranche reserves.
	Closed,
}

#[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub struct PortfolioParameters<Balance> {
	/// Expected lifetime once the portfolio is started.
	pub duration: Seconds,
	/// After this moment anyone can close a portfolio that never started.
	pub capital_formation_deadline: Seconds,
	/// Deposits required to start the portfolio.
	pub minimum_size: Balance,
}

/// A transfer queued during an operation and executed once all storage
/// changes are done.
#[derive(Clone, Eq, PartialEq, RuntimeDebug)]
pub struct Payout<AccountId, Balance> {
	pub from: AccountId,
	pub to: AccountId,
	pub amount: Balance,
}

#[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub struct PortfolioDetails<AccountId, Balance, CurrencyId, MaxTranches>
where
	MaxTranches: Get<u32>,
{
	pub manager: AccountId,
	/// Currency that the portfolio is denominated in (immutable).
	pub currency: CurrencyId,
	pub status: PortfolioStatus,
	pub parameters: PortfolioParameters<Balance>,
	pub start_date: Seconds,
	/// Predicted end once started, moved earlier if closed ahead of time.
	pub end_date: Seconds,
	/// Liquid assets accounted to the portfolio while it is live. Tokens sent
	/// to the portfolio account by other means are not part of it.
	pub virtual_token_balance: Balance,
	/// Blocks every lender, loan and checkpoint operation while set.
	pub paused: bool,
	/// List of tranches, ordered junior to senior.
	pub tranches: Tranches<AccountId, Balance, MaxTranches>,
}

impl<AccountId, Balance, CurrencyId, MaxTranches>
	PortfolioDetails<AccountId, Balance, CurrencyId, MaxTranches>
where
	Balance: AtLeast32BitUnsigned + Copy,
	MaxTranches: Get<u32>,
{
	pub fn is_live(&self) -> bool {
		self.status == PortfolioStatus::Live
	}

	/// Value of the portfolio. While live it is the pooled liquidity plus
	/// loans, minus the fees it owes. Otherwise the tranche reserves hold it.
	pub fn total_assets(&self, loans_value: Balance) -> Result<Balance, DispatchError> {
		match self.status {
			PortfolioStatus::CapitalFormation => self.tranches.total_reserve(),
			PortfolioStatus::Live => Ok(self
				.virtual_token_balance
				.ensure_add(loans_value)?
				.saturating_sub(self.tranches.total_unpaid_fees()?)),
			PortfolioStatus::Closed => self.tranches.total_net_reserve(),
		}
	}

	/// Pooled liquidity that is not owed as fees. Nothing is pooled outside
	/// of the live status.
	pub fn liquid_assets(&self) -> Result<Balance, DispatchError> {
		Ok(self
			.virtual_token_balance
			.saturating_sub(self.tranches.total_unpaid_fees()?))
	}

	/// Waterfall for the current status, ordered junior to senior.
	pub fn waterfall(
		&self,
		loans_value: Balance,
		now: Seconds,
	) -> Result<Vec<Allocation<Balance>>, DispatchError> {
		match self.status {
			PortfolioStatus::CapitalFormation => Ok(self.tranches.capital_formation_waterfall()),
			PortfolioStatus::Live => self
				.tranches
				.live_waterfall(self.total_assets(loans_value)?, min(now, self.end_date)),
			PortfolioStatus::Closed => self.tranches.closed_waterfall(),
		}
	}

	/// Lowest value tranche `index` can have without breaking the ratio of
	/// the tranche directly above it.
	pub fn min_value_complying_with_ratio(
		&self,
		values: &[Balance],
		index: TrancheIndex,
	) -> Result<Balance, DispatchError> {
		if !self.is_live() || self.tranches.is_senior(index) {
			return Ok(Zero::zero());
		}

		let above = index.saturating_add(1);
		let ratio = match self.tranches.get_tranche(above) {
			Some(tranche) if !tranche.min_subordinate_ratio.is_zero() => {
				tranche.min_subordinate_ratio
			}
			_ => return Ok(Zero::zero()),
		};
		let value = value_at(values, above)?;

		mul_div(
			value,
			u128::from(ratio),
			u128::from(BASIS_PRECISION),
			Rounding::Up,
		)
	}

	/// Highest value tranche `index` can have without breaking its own ratio
	/// against the tranche directly below it.
	pub fn max_value_complying_with_ratio(
		&self,
		values: &[Balance],
		index: TrancheIndex,
	) -> Result<Balance, DispatchError> {
		if !self.is_live() || index.is_zero() {
			return Ok(Balance::max_value());
		}

		let ratio = match self.tranches.get_tranche(index) {
			Some(tranche) if !tranche.min_subordinate_ratio.is_zero() => {
				tranche.min_subordinate_ratio
			}
			_ => return Ok(Balance::max_value()),
		};
		let below = value_at(values, index.saturating_sub(1))?;

		mul_div(
			below,
			u128::from(BASIS_PRECISION),
			u128::from(ratio),
			Rounding::Down,
		)
	}
}

fn value_at<Balance: Copy>(values: &[Balance], index: TrancheIndex) -> Result<Balance, DispatchError> {
	usize::try_from(index)
		.ok()
		.and_then(|index| values.get(index))
		.copied()
		.ok_or(DispatchError::Other("Missing tranche value"))
}
