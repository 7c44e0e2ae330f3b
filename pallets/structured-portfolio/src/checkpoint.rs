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

//! Tranche checkpoints and fee accrual.
//!
//! A checkpoint freezes the value of a tranche at a point in time. Fees
//! accrue linearly on the frozen value until the next checkpoint. Committing
//! a checkpoint charges the accrued fees against the current waterfall
//! value, pays what the available cash allows and carries the rest as unpaid
//! fees.

use cfg_primitives::BasisPoints;
use cfg_traits::{time::elapsed, Seconds};
use codec::{Decode, Encode, MaxEncodedLen};
use frame_support::pallet_prelude::RuntimeDebug;
use scale_info::TypeInfo;
use sp_arithmetic::traits::{
	AtLeast32BitUnsigned, EnsureAdd, EnsureAddAssign, EnsureSub, EnsureSubAssign, Zero,
};
use sp_runtime::DispatchError;
use sp_std::cmp::{max, min};

use crate::tranches::{accrued_on, Allocation, Tranche};

#[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub struct Checkpoint<Balance> {
	/// Value of the tranche right after the checkpoint was committed.
	pub total_assets: Balance,
	/// Protocol fee rate locked in until the next checkpoint.
	pub protocol_fee_rate: BasisPoints,
	pub timestamp: Seconds,
}

impl<Balance: Zero> Default for Checkpoint<Balance> {
	fn default() -> Self {
		Self {
			total_assets: Zero::zero(),
			protocol_fee_rate: 0,
			timestamp: 0,
		}
	}
}

/// A pair of fee buckets, one for the protocol and one for the tranche
/// manager.
#[derive(Clone, Copy, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub struct Fees<Balance> {
	pub protocol: Balance,
	pub manager: Balance,
}

impl<Balance: Zero> Default for Fees<Balance> {
	fn default() -> Self {
		Self {
			protocol: Zero::zero(),
			manager: Zero::zero(),
		}
	}
}

impl<Balance> Fees<Balance>
where
	Balance: AtLeast32BitUnsigned + Copy,
{
	pub fn total(&self) -> Result<Balance, DispatchError> {
		self.protocol.ensure_add(self.manager).map_err(Into::into)
	}

	pub fn is_zero(&self) -> bool {
		self.protocol.is_zero() && self.manager.is_zero()
	}

	/// Pays these fees out of `cash`, protocol first. Returns what was paid
	/// and leaves the rest in `self`.
	pub fn settle_from(&mut self, cash: &mut Balance) -> Result<Fees<Balance>, DispatchError> {
		let protocol = min(self.protocol, *cash);
		cash.ensure_sub_assign(protocol)?;
		self.protocol.ensure_sub_assign(protocol)?;

		let manager = min(self.manager, *cash);
		cash.ensure_sub_assign(manager)?;
		self.manager.ensure_sub_assign(manager)?;

		Ok(Fees { protocol, manager })
	}
}

/// How the deficit of a non-equity tranche is derived on commit.
#[derive(Clone, Copy, Eq, PartialEq, RuntimeDebug)]
pub enum Phase {
	/// The portfolio is live, manager fees accrue and the deficit is the distance
	/// to the waterfall target.
	Live,
	/// The portfolio is closed, manager fees stop and the deficit is the distance
	/// to the value on close.
	Closed,
}

/// Outcome of committing the checkpoint of one tranche.
#[derive(Clone, Copy, Eq, PartialEq, RuntimeDebug)]
pub struct Commit<Balance> {
	/// Part of the charged fees paid out of the available cash.
	pub paid: Fees<Balance>,
	/// Fees that accrued but were not covered by the tranche value.
	pub waived: Balance,
}

impl<AccountId, Balance> Tranche<AccountId, Balance>
where
	Balance: AtLeast32BitUnsigned + Copy,
{
	/// Fees accrued on the checkpointed value up to `now`.
	pub fn accrued_fees(&self, now: Seconds, phase: Phase) -> Result<Fees<Balance>, DispatchError> {
		let elapsed = elapsed(self.checkpoint.timestamp, now);
		let assets = self.checkpoint.total_assets;

		let protocol = accrued_on(assets, self.checkpoint.protocol_fee_rate, elapsed)?;
		let manager = match phase {
			Phase::Live => accrued_on(assets, self.manager_fee.rate, elapsed)?,
			Phase::Closed => Zero::zero(),
		};

		Ok(Fees { protocol, manager })
	}

	/// Commits a new checkpoint from the waterfall `allocation`.
	///
	/// `cash` is the liquidity the fees are paid from. Older unpaid fees are
	/// expected to be settled with [`Fees::settle_from`] before the waterfall
	/// is computed; this only pays the fees charged for the current period.
	pub fn commit_checkpoint(
		&mut self,
		allocation: Allocation<Balance>,
		is_equity: bool,
		phase: Phase,
		cash: &mut Balance,
		now: Seconds,
		protocol_fee_rate: BasisPoints,
	) -> Result<Commit<Balance>, DispatchError> {
		let value = allocation.value;
		let accrued = self.accrued_fees(now, phase)?;

		let protocol = min(accrued.protocol, value);
		let manager = min(accrued.manager, value.ensure_sub(protocol)?);
		let charged = Fees { protocol, manager };
		let waived = accrued.total()?.ensure_sub(charged.total()?)?;

		if is_equity {
			self.deficit.ensure_add_assign(waived)?;
		} else {
			self.deficit = match phase {
				Phase::Live => allocation.shortfall(),
				Phase::Closed => self.closing_room(),
			};
		}

		let mut owed = charged;
		let paid = owed.settle_from(cash)?;
		self.unpaid_fees.protocol.ensure_add_assign(owed.protocol)?;
		self.unpaid_fees.manager.ensure_add_assign(owed.manager)?;

		self.checkpoint = Checkpoint {
			total_assets: value.ensure_sub(charged.total()?)?,
			protocol_fee_rate,
			timestamp: max(now, self.checkpoint.timestamp),
		};

		Ok(Commit { paid, waived })
	}

	/// Resets the checkpoint to the tranche reserve. Used when the tranche
	/// leaves capital formation.
	pub fn init_checkpoint(&mut self, now: Seconds, protocol_fee_rate: BasisPoints) {
		self.checkpoint = Checkpoint {
			total_assets: self.reserve,
			protocol_fee_rate,
			timestamp: now,
		};
		self.deficit = Zero::zero();
	}

	/// Debits a withdrawal from the checkpointed value.
	pub fn withdraw_from_checkpoint(&mut self, amount: Balance) -> Result<(), DispatchError> {
		self.checkpoint
			.total_assets
			.ensure_sub_assign(amount)
			.map_err(Into::into)
	}

	/// Credits a deposit to the checkpointed value.
	pub fn deposit_into_checkpoint(&mut self, amount: Balance) -> Result<(), DispatchError> {
		self.checkpoint
			.total_assets
			.ensure_add_assign(amount)
			.map_err(Into::into)
	}
}
