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

//! Tranche storage layout and the senior-to-junior waterfall.
//!
//! Tranches are kept ordered junior to senior: index `0` is the equity
//! tranche, which owns the residual, and the last index is the most senior
//! tranche. The waterfall walks them in reverse.

use cfg_primitives::{BasisPoints, TrancheIndex, BASIS_PRECISION, SECONDS_PER_YEAR};
use cfg_traits::{time::elapsed, Seconds};
use codec::{Decode, Encode, MaxEncodedLen};
use frame_support::{pallet_prelude::RuntimeDebug, traits::Get, BoundedVec};
use rev_slice::{RevSlice, SliceExt};
use scale_info::TypeInfo;
use sp_arithmetic::{
	helpers_128bit::multiply_by_rational_with_rounding,
	traits::{
		AtLeast32BitUnsigned, EnsureAdd, EnsureAddAssign, EnsureSub, EnsureSubAssign, Saturating,
		Zero,
	},
	ArithmeticError, Rounding,
};
use sp_runtime::DispatchError;
use sp_std::{cmp::min, vec::Vec};

use crate::checkpoint::{Checkpoint, Fees};

/// Index of the equity tranche.
pub const EQUITY: TrancheIndex = 0;

/// `x * numerator / denominator` over `u128` with explicit rounding.
pub fn mul_div<Balance: AtLeast32BitUnsigned + Copy>(
	x: Balance,
	numerator: u128,
	denominator: u128,
	rounding: Rounding,
) -> Result<Balance, DispatchError> {
	let x: u128 = x.try_into().map_err(|_| ArithmeticError::Overflow)?;
	let result = multiply_by_rational_with_rounding(x, numerator, denominator, rounding)
		.ok_or(ArithmeticError::Overflow)?;
	Balance::try_from(result).map_err(|_| ArithmeticError::Overflow.into())
}

/// Simple interest of `rate` basis points per year on `x` over `elapsed`
/// seconds, rounded down.
pub fn accrued_on<Balance: AtLeast32BitUnsigned + Copy>(
	x: Balance,
	rate: BasisPoints,
	elapsed: Seconds,
) -> Result<Balance, DispatchError> {
	if x.is_zero() || rate.is_zero() || elapsed.is_zero() {
		return Ok(Zero::zero());
	}

	let numerator = u128::from(rate)
		.checked_mul(u128::from(elapsed))
		.ok_or(ArithmeticError::Overflow)?;
	let denominator = u128::from(BASIS_PRECISION) * u128::from(SECONDS_PER_YEAR);

	mul_div(x, numerator, denominator, Rounding::Down)
}

/// `x` grown by `apy` over `elapsed` seconds.
pub fn grown<Balance: AtLeast32BitUnsigned + Copy>(
	x: Balance,
	apy: BasisPoints,
	elapsed: Seconds,
) -> Result<Balance, DispatchError> {
	x.ensure_add(accrued_on(x, apy, elapsed)?)
		.map_err(Into::into)
}

#[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub struct ManagerFee<AccountId> {
	/// Yearly rate charged on the tranche value, in basis points.
	pub rate: BasisPoints,
	pub beneficiary: AccountId,
}

#[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub struct TrancheInput<AccountId> {
	pub target_apy: BasisPoints,
	pub min_subordinate_ratio: BasisPoints,
	pub manager_fee: ManagerFee<AccountId>,
}

#[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub struct Tranche<AccountId, Balance> {
	/// Expected yearly return, zero for equity.
	pub target_apy: BasisPoints,
	/// Minimum value of the tranche directly below, relative to this
	/// tranche's value. Zero for equity.
	pub min_subordinate_ratio: BasisPoints,
	pub manager_fee: ManagerFee<AccountId>,
	pub checkpoint: Checkpoint<Balance>,
	/// Value the tranche was entitled to but did not receive at the last
	/// checkpoint.
	pub deficit: Balance,
	pub unpaid_fees: Fees<Balance>,
	/// Liquid assets owned by the tranche outside of the pooled liquidity.
	/// Holds deposits during capital formation and distributions once the
	/// portfolio is closed.
	pub reserve: Balance,
	pub distributed_assets: Balance,
	pub max_value_on_close: Balance,
}

impl<AccountId, Balance> Tranche<AccountId, Balance>
where
	Balance: AtLeast32BitUnsigned + Copy,
{
	pub fn new(input: TrancheInput<AccountId>) -> Self {
		Self {
			target_apy: input.target_apy,
			min_subordinate_ratio: input.min_subordinate_ratio,
			manager_fee: input.manager_fee,
			checkpoint: Checkpoint::default(),
			deficit: Zero::zero(),
			unpaid_fees: Fees::default(),
			reserve: Zero::zero(),
			distributed_assets: Zero::zero(),
			max_value_on_close: Zero::zero(),
		}
	}

	/// What the tranche is owed at `accrual_end`, including the deficit.
	pub fn target_value(&self, accrual_end: Seconds) -> Result<Balance, DispatchError> {
		let elapsed = elapsed(self.checkpoint.timestamp, accrual_end);
		let base = self.checkpoint.total_assets.ensure_add(self.deficit)?;

		grown(base, self.target_apy, elapsed)
	}

	/// Liquid reserve net of the fees it still owes.
	pub fn net_reserve(&self) -> Result<Balance, DispatchError> {
		Ok(self
			.reserve
			.saturating_sub(self.unpaid_fees.total()?))
	}

	/// Room left before the tranche reaches its value on close.
	pub fn closing_room(&self) -> Balance {
		self.max_value_on_close
			.saturating_sub(self.distributed_assets)
	}
}

/// Result of the waterfall for a single tranche.
#[derive(Clone, Copy, Default, Eq, PartialEq, RuntimeDebug)]
pub struct Allocation<Balance> {
	/// Value the tranche was aiming for.
	pub target: Balance,
	/// Value the tranche actually holds.
	pub value: Balance,
}

impl<Balance: AtLeast32BitUnsigned + Copy> Allocation<Balance> {
	pub fn settled(value: Balance) -> Self {
		Self {
			target: value,
			value,
		}
	}

	pub fn shortfall(&self) -> Balance {
		self.target.saturating_sub(self.value)
	}
}

/// Amounts a tranche receives out of a distribution after close.
#[derive(Clone, Copy, Eq, PartialEq, RuntimeDebug)]
pub struct Distribution<Balance> {
	pub tranche: TrancheIndex,
	pub fees: Fees<Balance>,
	pub assets: Balance,
}

#[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub struct Tranches<AccountId, Balance, MaxTranches>
where
	MaxTranches: Get<u32>,
{
	pub tranches: BoundedVec<Tranche<AccountId, Balance>, MaxTranches>,
}

impl<AccountId, Balance, MaxTranches> Tranches<AccountId, Balance, MaxTranches>
where
	Balance: AtLeast32BitUnsigned + Copy,
	MaxTranches: Get<u32>,
{
	pub fn new(tranches: BoundedVec<Tranche<AccountId, Balance>, MaxTranches>) -> Self {
		Self { tranches }
	}

	pub fn num_tranches(&self) -> usize {
		self.tranches.len()
	}

	pub fn get_tranche(&self, index: TrancheIndex) -> Option<&Tranche<AccountId, Balance>> {
		usize::try_from(index)
			.ok()
			.and_then(|index| self.tranches.get(index))
	}

	pub fn get_mut_tranche(
		&mut self,
		index: TrancheIndex,
	) -> Option<&mut Tranche<AccountId, Balance>> {
		usize::try_from(index)
			.ok()
			.and_then(|index| self.tranches.get_mut(index))
	}

	pub fn is_senior(&self, index: TrancheIndex) -> bool {
		usize::try_from(index)
			.map(|index| index.saturating_add(1) == self.tranches.len())
			.unwrap_or(false)
	}

	/// Non-equity tranches ordered most senior first.
	pub fn non_residual_senior_first(&self) -> &RevSlice<Tranche<AccountId, Balance>> {
		self.tranches
			.split_first()
			.map(|(_, non_residual)| non_residual)
			.unwrap_or(&[])
			.rev()
	}

	/// Tranches with their index, most senior first.
	pub fn indexed_senior_first_mut(
		&mut self,
	) -> impl Iterator<Item = (TrancheIndex, &mut Tranche<AccountId, Balance>)> + '_ {
		self.tranches
			.iter_mut()
			.enumerate()
			.rev()
			.map(|(index, tranche)| (index as TrancheIndex, tranche))
	}

	pub fn reserves(&self) -> Vec<Balance> {
		self.tranches.iter().map(|tranche| tranche.reserve).collect()
	}

	pub fn total_reserve(&self) -> Result<Balance, DispatchError> {
		self.tranches
			.iter()
			.try_fold(Balance::zero(), |sum, tranche| {
				sum.ensure_add(tranche.reserve).map_err(Into::into)
			})
	}

	pub fn total_net_reserve(&self) -> Result<Balance, DispatchError> {
		self.tranches
			.iter()
			.try_fold(Balance::zero(), |sum, tranche| {
				sum.ensure_add(tranche.net_reserve()?).map_err(Into::into)
			})
	}

	pub fn total_unpaid_fees(&self) -> Result<Balance, DispatchError> {
		self.tranches
			.iter()
			.try_fold(Balance::zero(), |sum, tranche| {
				sum.ensure_add(tranche.unpaid_fees.total()?)
					.map_err(Into::into)
			})
	}

	/// Waterfall while the portfolio is live.
	///
	/// Non-equity tranches are served from `total_assets` most senior first,
	/// each up to its target value. The equity tranche takes the residual.
	/// The result is ordered like the tranches, junior to senior.
	pub fn live_waterfall(
		&self,
		total_assets: Balance,
		accrual_end: Seconds,
	) -> Result<Vec<Allocation<Balance>>, DispatchError> {
		let mut remaining = total_assets;
		let mut allocations = Vec::with_capacity(self.num_tranches());

		for tranche in self.non_residual_senior_first() {
			let target = tranche.target_value(accrual_end)?;
			let value = min(target, remaining);
			remaining = remaining.ensure_sub(value)?;
			allocations.push(Allocation { target, value });
		}

		if !self.tranches.is_empty() {
			allocations.push(Allocation::settled(remaining));
		}
		allocations.reverse();

		Ok(allocations)
	}

	/// Waterfall before start: every tranche owns its raw deposits.
	pub fn capital_formation_waterfall(&self) -> Vec<Allocation<Balance>> {
		self.reserves()
			.into_iter()
			.map(Allocation::settled)
			.collect()
	}

	/// Waterfall after close: every tranche owns its reserve net of unpaid
	/// fees. Reserves only grow through distributions, so time alone never
	/// changes these values.
	pub fn closed_waterfall(&self) -> Result<Vec<Allocation<Balance>>, DispatchError> {
		self.tranches
			.iter()
			.map(|tranche| tranche.net_reserve().map(Allocation::settled))
			.collect()
	}

	/// Splits `amount` senior first. Each tranche settles its unpaid fees
	/// first, protocol before manager, and is then filled up to its value on
	/// close. The equity tranche keeps whatever is left.
	///
	/// The result is ordered most senior first.
	pub fn distribute(
		&mut self,
		amount: Balance,
	) -> Result<Vec<Distribution<Balance>>, DispatchError> {
		let mut remaining = amount;
		let mut distributions = Vec::with_capacity(self.num_tranches());

		for (index, tranche) in self.indexed_senior_first_mut() {
			let fees = tranche.unpaid_fees.settle_from(&mut remaining)?;

			let assets = if index == EQUITY {
				remaining
			} else {
				min(tranche.closing_room(), remaining)
			};

			remaining.ensure_sub_assign(assets)?;
			tranche.reserve.ensure_add_assign(assets)?;
			tranche.distributed_assets.ensure_add_assign(assets)?;

			distributions.push(Distribution {
				tranche: index,
				fees,
				assets,
			});
		}

		Ok(distributions)
	}
}

/// Checks that every tranche is covered by the one directly below it:
/// `value[i - 1] * BASIS_PRECISION >= value[i] * min_subordinate_ratio[i]`.
pub fn ratios_hold<AccountId, Balance>(
	tranches: &[Tranche<AccountId, Balance>],
	values: &[Balance],
) -> Result<bool, DispatchError>
where
	Balance: AtLeast32BitUnsigned + Copy,
{
	for (index, tranche) in tranches.iter().enumerate().skip(1) {
		if tranche.min_subordinate_ratio.is_zero() {
			continue;
		}

		let value = values
			.get(index)
			.copied()
			.ok_or(DispatchError::Other("Missing tranche value"))?;
		let subordinate = values
			.get(index - 1)
			.copied()
			.ok_or(DispatchError::Other("Missing tranche value"))?;

		let required = mul_div(
			value,
			u128::from(tranche.min_subordinate_ratio),
			u128::from(BASIS_PRECISION),
			Rounding::Up,
		)?;

		if subordinate < required {
			return Ok(false);
		}
	}

	Ok(true)
}

#[cfg(test)]
mod test {
	use cfg_primitives::{Balance, SECONDS_PER_DAY};

	use super::*;
	use crate::mock::MaxTranches;

	type TTranche = Tranche<u64, Balance>;
	type TTranches = Tranches<u64, Balance, MaxTranches>;

	const YEAR: Seconds = SECONDS_PER_YEAR;

	fn tranche(target_apy: BasisPoints, min_subordinate_ratio: BasisPoints) -> TTranche {
		Tranche::new(TrancheInput {
			target_apy,
			min_subordinate_ratio,
			manager_fee: ManagerFee {
				rate: 0,
				beneficiary: 0,
			},
		})
	}

	fn live_tranche(target_apy: BasisPoints, total_assets: Balance) -> TTranche {
		let mut tranche = tranche(target_apy, 0);
		tranche.checkpoint = Checkpoint {
			total_assets,
			protocol_fee_rate: 0,
			timestamp: 0,
		};
		tranche
	}

	fn tranches(tranches: Vec<TTranche>) -> TTranches {
		Tranches::new(BoundedVec::truncate_from(tranches))
	}

	fn values(allocations: &[Allocation<Balance>]) -> Vec<Balance> {
		allocations.iter().map(|allocation| allocation.value).collect()
	}

	#[test]
	fn grown_is_simple_interest() {
		assert_eq!(grown(1000u128, 300, YEAR), Ok(1030));
		assert_eq!(grown(1000u128, 500, YEAR), Ok(1050));
		assert_eq!(grown(1000u128, 500, YEAR / 2), Ok(1025));
		assert_eq!(grown(1000u128, 0, YEAR), Ok(1000));
		assert_eq!(grown(1000u128, 500, 0), Ok(1000));
	}

	#[test]
	fn accrual_rounds_down() {
		// 1 * 10% over a day is far below one unit
		assert_eq!(accrued_on(1u128, 1000, SECONDS_PER_DAY), Ok(0));
		assert_eq!(accrued_on(365_000u128, 1000, SECONDS_PER_DAY), Ok(100));
	}

	#[test]
	fn live_waterfall_serves_senior_first() {
		let tranches = tranches(vec![
			live_tranche(0, 1000),
			live_tranche(500, 1000),
			live_tranche(300, 1000),
		]);

		let allocations = tranches.live_waterfall(3000, YEAR).unwrap();
		assert_eq!(values(&allocations), vec![920, 1050, 1030]);
		assert_eq!(allocations.iter().map(|a| a.value).sum::<Balance>(), 3000);
	}

	#[test]
	fn live_waterfall_wipes_equity_first() {
		let tranches = tranches(vec![
			live_tranche(0, 1000),
			live_tranche(500, 1000),
			live_tranche(300, 1000),
		]);

		assert_eq!(
			values(&tranches.live_waterfall(2000, 0).unwrap()),
			vec![0, 1000, 1000]
		);
		assert_eq!(
			values(&tranches.live_waterfall(1500, 0).unwrap()),
			vec![0, 500, 1000]
		);

		let allocations = tranches.live_waterfall(400, 0).unwrap();
		assert_eq!(values(&allocations), vec![0, 0, 400]);
		assert_eq!(allocations[2].shortfall(), 600);
		assert_eq!(allocations[1].shortfall(), 1000);
	}

	#[test]
	fn live_waterfall_grows_deficit() {
		let mut senior = live_tranche(1000, 500);
		senior.deficit = 500;
		let tranches = tranches(vec![live_tranche(0, 0), senior]);

		let allocations = tranches.live_waterfall(5000, YEAR).unwrap();
		assert_eq!(allocations[1], Allocation { target: 1100, value: 1100 });
		assert_eq!(allocations[0].value, 3900);
	}

	#[test]
	fn closed_waterfall_is_net_of_unpaid_fees() {
		let mut senior = tranche(300, 0);
		senior.reserve = 1000;
		senior.unpaid_fees = Fees {
			protocol: 10,
			manager: 5,
		};
		let mut equity = tranche(0, 0);
		equity.reserve = 3;
		equity.unpaid_fees.protocol = 7;

		let tranches = tranches(vec![equity, senior]);
		assert_eq!(
			values(&tranches.closed_waterfall().unwrap()),
			vec![0, 985]
		);
	}

	#[test]
	fn distribution_fills_senior_then_equity() {
		let mut senior = tranche(300, 0);
		senior.max_value_on_close = 1030;
		senior.distributed_assets = 1000;
		senior.unpaid_fees.protocol = 4;
		let mut junior = tranche(500, 0);
		junior.max_value_on_close = 1050;
		let mut tranches = tranches(vec![tranche(0, 0), junior, senior]);

		let distributions = tranches.distribute(100).unwrap();
		assert_eq!(distributions[0].tranche, 2);
		assert_eq!(distributions[0].fees.protocol, 4);
		assert_eq!(distributions[0].assets, 30);
		assert_eq!(distributions[1].assets, 66);
		assert_eq!(distributions[2].assets, 0);

		let distributions = tranches.distribute(2000).unwrap();
		assert_eq!(distributions[0].assets, 0);
		assert_eq!(distributions[1].assets, 984);
		assert_eq!(distributions[2].assets, 1016);

		assert_eq!(tranches.reserves(), vec![1016, 1050, 30]);
	}

	#[test]
	fn ratios_are_pairwise() {
		let layout = vec![tranche(0, 0), tranche(500, 5000), tranche(300, 2000)];

		// junior 1000 needs equity >= 500, senior 3000 needs junior >= 600
		assert_eq!(ratios_hold(&layout, &[500, 1000, 3000]), Ok(true));
		assert_eq!(ratios_hold(&layout, &[499, 1000, 3000]), Ok(false));
		assert_eq!(ratios_hold(&layout, &[500, 1000, 5001]), Ok(false));
		assert_eq!(ratios_hold(&layout, &[0, 0, 0]), Ok(true));
	}

	#[test]
	fn senior_detection() {
		let tranches = tranches(vec![tranche(0, 0), tranche(100, 0)]);
		assert!(tranches.is_senior(1));
		assert!(!tranches.is_senior(0));
		assert!(tranches.get_tranche(2).is_none());
	}
}
