// Copyright 2021 Centrifuge GmbH (centrifuge.io).
// This file is part of Centrifuge chain project.

// Centrifuge is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version (see http://www.gnu.org/licenses).

// Centrifuge is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

//! # A common trait lib for structured portfolios
//!
//! This crate provides the traits a structured portfolio uses to talk to its
//! surroundings.

// Ensure we're `no_std` when compiling for WebAssembly.
#![cfg_attr(not(feature = "std"), no_std)]

use cfg_primitives::TrancheIndex;

/// Traits describing the policies around a portfolio.
pub mod portfolio;

/// Time helpers.
pub mod time;

pub use time::{Millis, Seconds, TimeAsSecs};

/// A trait for converting from a PortfolioId and a tranche index
/// into a given Self::Currency
pub trait TrancheCurrency<PortfolioId> {
	fn generate(portfolio_id: PortfolioId, tranche: TrancheIndex) -> Self;
}
