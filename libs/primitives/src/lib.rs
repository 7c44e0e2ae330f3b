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

// Ensure we're `no_std` when compiling for WebAssembly.
#![cfg_attr(not(feature = "std"), no_std)]

pub use constants::*;
pub use types::*;

/// Common types shared by the structured portfolio crates
pub mod types {
	/// Balance of an account.
	pub type Balance = u128;

	/// IBalance is the signed version of the Balance, used to bound value
	/// deltas.
	pub type IBalance = i128;

	/// PortfolioId type we use.
	pub type PortfolioId = u64;

	/// A representation of a loan identifier
	pub type LoanId = u64;

	/// Position of a tranche inside a portfolio. Index 0 is the equity
	/// tranche, the highest index is the most senior one.
	pub type TrancheIndex = u64;

	/// Rates and ratios are expressed in basis points out of
	/// [`super::constants::BASIS_PRECISION`].
	pub type BasisPoints = u32;
}

/// Common constants
pub mod constants {
	use super::types::BasisPoints;

	// Seconds units
	pub const SECONDS_PER_MINUTE: u64 = 60;
	pub const SECONDS_PER_HOUR: u64 = SECONDS_PER_MINUTE * 60;
	pub const SECONDS_PER_DAY: u64 = SECONDS_PER_HOUR * 24;
	pub const SECONDS_PER_YEAR: u64 = SECONDS_PER_DAY * 365;

	/// 100% expressed in basis points.
	pub const BASIS_PRECISION: BasisPoints = 10_000;

	/// Upper bound of tranches a single portfolio can be created with.
	pub const MAX_TRANCHES: u32 = 5;

	/// Upper bound of loans that can contribute to the value of a portfolio
	/// at the same time.
	pub const MAX_ACTIVE_LOANS: u32 = 100;
}
