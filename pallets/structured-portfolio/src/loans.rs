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

//! Fixed-installment loans and their valuation.

use cfg_traits::{time::elapsed, Seconds};
use codec::{Decode, Encode, MaxEncodedLen};
use frame_support::pallet_prelude::RuntimeDebug;
use scale_info::TypeInfo;
use sp_arithmetic::{
	traits::{AtLeast32BitUnsigned, EnsureAdd, EnsureAddAssign, EnsureMul, Zero},
	Rounding,
};
use sp_runtime::DispatchError;

use crate::tranches::mul_div;

#[derive(Clone, Copy, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub enum LoanStatus {
	/// Registered by the manager, waiting for the recipient.
	Created,
	/// Agreed by the recipient, waiting to be funded.
	Accepted,
	/// Funded and contributing to the portfolio value.
	Started,
	Repaid,
	Canceled,
	Defaulted,
}

#[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub struct LoanTerms<AccountId, Balance> {
	pub principal: Balance,
	/// Interest due at the end of every period.
	pub period_payment: Balance,
	pub period_count: u32,
	pub period_duration: Seconds,
	/// Time after a missed installment before the loan can be defaulted.
	pub grace_period: Seconds,
	pub recipient: AccountId,
	pub can_be_repaid_after_default: bool,
}

#[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub struct Loan<AccountId, Balance> {
	pub terms: LoanTerms<AccountId, Balance>,
	pub status: LoanStatus,
	pub periods_repaid: u32,
	pub start_date: Seconds,
}

impl<AccountId, Balance> Loan<AccountId, Balance>
where
	Balance: AtLeast32BitUnsigned + Copy,
{
	pub fn new(terms: LoanTerms<AccountId, Balance>) -> Self {
		Self {
			terms,
			status: LoanStatus::Created,
			periods_repaid: 0,
			start_date: 0,
		}
	}

	pub fn is_last_period(&self) -> bool {
		self.periods_repaid.saturating_add(1) >= self.terms.period_count
	}

	/// Amount expected by the next call to repay: the period payment, plus
	/// the principal on the last period.
	pub fn next_installment(&self) -> Result<Balance, DispatchError> {
		if self.is_last_period() {
			self.terms
				.period_payment
				.ensure_add(self.terms.principal)
				.map_err(Into::into)
		} else {
			Ok(self.terms.period_payment)
		}
	}

	/// Whole periods elapsed since the start, bounded by the period count.
	fn periods_passed(&self, now: Seconds) -> u32 {
		let elapsed = elapsed(self.start_date, now);
		let periods = elapsed
			.checked_div(self.terms.period_duration)
			.unwrap_or_default();

		u32::try_from(periods)
			.unwrap_or(u32::MAX)
			.min(self.terms.period_count)
	}

	/// Value of the loan for the portfolio at `now`.
	///
	/// A started loan is worth its principal, the installments that are due
	/// but unpaid and the interest accrued in the current period. Any other
	/// status is worth nothing.
	pub fn value(&self, now: Seconds) -> Result<Balance, DispatchError> {
		if self.status != LoanStatus::Started {
			return Ok(Zero::zero());
		}

		let periods_passed = self.periods_passed(now);
		let owed = periods_passed.saturating_sub(self.periods_repaid);
		let due = self
			.terms
			.period_payment
			.ensure_mul(Balance::from(owed))?;

		let running = if periods_passed < self.terms.period_count
			&& self.periods_repaid <= periods_passed
		{
			let elapsed = elapsed(self.start_date, now);
			let in_period = elapsed
				.checked_rem(self.terms.period_duration)
				.unwrap_or_default();

			mul_div(
				self.terms.period_payment,
				u128::from(in_period),
				u128::from(self.terms.period_duration),
				Rounding::Down,
			)?
		} else {
			Zero::zero()
		};

		self.terms
			.principal
			.ensure_add(due)?
			.ensure_add(running)
			.map_err(Into::into)
	}

	/// Whether the next installment is late beyond the grace period.
	pub fn is_overdue(&self, now: Seconds) -> Result<bool, DispatchError> {
		let due_date = u64::from(self.periods_repaid.saturating_add(1))
			.ensure_mul(self.terms.period_duration)?
			.ensure_add(self.start_date)?
			.ensure_add(self.terms.grace_period)?;

		Ok(now > due_date)
	}

	/// Whether the loan accepts installments.
	pub fn is_repayable(&self) -> bool {
		match self.status {
			LoanStatus::Started => true,
			LoanStatus::Defaulted => self.terms.can_be_repaid_after_default,
			_ => false,
		}
	}

	/// Registers one installment. Returns `true` if it was the last one.
	pub fn register_installment(&mut self) -> Result<bool, DispatchError> {
		let last = self.is_last_period();
		self.periods_repaid.ensure_add_assign(1)?;

		if last {
			self.status = LoanStatus::Repaid;
		}

		Ok(last)
	}

	pub fn start(&mut self, now: Seconds) {
		self.status = LoanStatus::Started;
		self.start_date = now;
	}
}

/// Adds up the value of the given loans.
pub fn total_value<AccountId, Balance>(
	loans: impl IntoIterator<Item = Loan<AccountId, Balance>>,
	now: Seconds,
) -> Result<Balance, DispatchError>
where
	Balance: AtLeast32BitUnsigned + Copy,
{
	loans.into_iter().try_fold(Balance::zero(), |sum, loan| {
		sum.ensure_add(loan.value(now)?).map_err(Into::into)
	})
}
