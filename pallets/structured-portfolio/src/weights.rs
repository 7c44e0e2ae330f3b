// Copyright 2021 Centrifuge Foundation (centrifuge.io).
// This file is part of Centrifuge chain project.

// Centrifuge is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version (see http://www.gnu.org/licenses).

// Centrifuge is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

use frame_support::weights::Weight;

/// `n` is the number of tranches and `m` the number of active loans of the
/// portfolio.
pub trait WeightInfo {
	fn create_portfolio(n: u32) -> Weight;
	fn deposit(n: u32, m: u32) -> Weight;
	fn withdraw(n: u32, m: u32) -> Weight;
	fn start(n: u32, m: u32) -> Weight;
	fn close(n: u32, m: u32) -> Weight;
	fn update_checkpoints(n: u32, m: u32) -> Weight;
	fn add_loan() -> Weight;
	fn accept_loan() -> Weight;
	fn fund_loan(n: u32, m: u32) -> Weight;
	fn repay_loan(n: u32, m: u32) -> Weight;
	fn mark_loan_as_defaulted(n: u32, m: u32) -> Weight;
	fn cancel_loan() -> Weight;
	fn update_loan_grace_period() -> Weight;
	fn set_tranche_min_subordinate_ratio(n: u32, m: u32) -> Weight;
	fn set_minimum_size() -> Weight;
	fn set_manager_fee(n: u32, m: u32) -> Weight;
	fn set_paused() -> Weight;
}

impl WeightInfo for () {
	fn create_portfolio(_: u32) -> Weight {
		Weight::zero()
	}

	fn deposit(_: u32, _: u32) -> Weight {
		Weight::zero()
	}

	fn withdraw(_: u32, _: u32) -> Weight {
		Weight::zero()
	}

	fn start(_: u32, _: u32) -> Weight {
		Weight::zero()
	}

	fn close(_: u32, _: u32) -> Weight {
		Weight::zero()
	}

	fn update_checkpoints(_: u32, _: u32) -> Weight {
		Weight::zero()
	}

	fn add_loan() -> Weight {
		Weight::zero()
	}

	fn accept_loan() -> Weight {
		Weight::zero()
	}

	fn fund_loan(_: u32, _: u32) -> Weight {
		Weight::zero()
	}

	fn repay_loan(_: u32, _: u32) -> Weight {
		Weight::zero()
	}

	fn mark_loan_as_defaulted(_: u32, _: u32) -> Weight {
		Weight::zero()
	}

	fn cancel_loan() -> Weight {
		Weight::zero()
	}

	fn update_loan_grace_period() -> Weight {
		Weight::zero()
	}

	fn set_tranche_min_subordinate_ratio(_: u32, _: u32) -> Weight {
		Weight::zero()
	}

	fn set_minimum_size() -> Weight {
		Weight::zero()
	}

	fn set_manager_fee(_: u32, _: u32) -> Weight {
		Weight::zero()
	}

	fn set_paused() -> Weight {
		Weight::zero()
	}
}
