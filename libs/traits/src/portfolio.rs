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

//! Boundaries between a structured portfolio and the policies around it.
//!
//! The portfolio consumes [`LenderEligibility`], [`FlowControl`] and
//! [`ProtocolFee`]. It exposes [`TrancheRatioBounds`] and
//! [`TrancheValuation`] so that those policies can derive their own limits
//! from the current tranche values.

use cfg_primitives::{BasisPoints, TrancheIndex};
use sp_runtime::DispatchError;

/// Decides whether an account may receive shares of a tranche.
pub trait LenderEligibility<AccountId> {
	type PortfolioId;

	fn is_allowed(portfolio_id: Self::PortfolioId, tranche: TrancheIndex, who: &AccountId) -> bool;
}

/// User-facing limits for tranche deposits and withdrawals.
///
/// Implementations own their ceilings, floors and fees. They are expected to
/// consult [`TrancheRatioBounds`] to keep the subordination ratios intact.
pub trait FlowControl<AccountId> {
	type PortfolioId;
	type Balance;

	/// Maximum amount `who` can deposit into the tranche right now.
	fn max_deposit(
		portfolio_id: Self::PortfolioId,
		tranche: TrancheIndex,
		who: &AccountId,
	) -> Self::Balance;

	/// Maximum amount `who` can withdraw from the tranche right now.
	fn max_withdraw(
		portfolio_id: Self::PortfolioId,
		tranche: TrancheIndex,
		who: &AccountId,
	) -> Self::Balance;
}

/// Source of the protocol fee charged on tranche value.
pub trait ProtocolFee<AccountId> {
	/// Fee rate in basis points per year that applies to the given
	/// contributor, usually the sovereign account of a portfolio.
	fn effective_fee_rate(contributor: &AccountId) -> BasisPoints;

	/// Destination of the collected protocol fees.
	fn treasury() -> AccountId;
}

/// Read-only bound calculators derived from the current waterfall.
pub trait TrancheRatioBounds {
	type PortfolioId;
	type Balance;

	/// Checks the chained subordination ratios of the current waterfall.
	fn check_tranches_ratios(portfolio_id: Self::PortfolioId) -> Result<(), DispatchError>;

	/// Lowest value the tranche can shrink to without breaking the ratio of
	/// the tranche directly above it.
	fn min_tranche_value_complying_with_ratio(
		portfolio_id: Self::PortfolioId,
		tranche: TrancheIndex,
	) -> Result<Self::Balance, DispatchError>;

	/// Highest value the tranche can grow to without breaking its own ratio
	/// against the tranche directly below it.
	fn max_tranche_value_complying_with_ratio(
		portfolio_id: Self::PortfolioId,
		tranche: TrancheIndex,
	) -> Result<Self::Balance, DispatchError>;
}

/// Share accounting view of a tranche.
pub trait TrancheValuation {
	type PortfolioId;
	type Balance;

	/// Value owned by the tranche holders, net of unpaid fees.
	fn total_assets(
		portfolio_id: Self::PortfolioId,
		tranche: TrancheIndex,
	) -> Result<Self::Balance, DispatchError>;

	fn convert_to_shares(
		portfolio_id: Self::PortfolioId,
		tranche: TrancheIndex,
		assets: Self::Balance,
	) -> Result<Self::Balance, DispatchError>;

	fn convert_to_assets(
		portfolio_id: Self::PortfolioId,
		tranche: TrancheIndex,
		shares: Self::Balance,
	) -> Result<Self::Balance, DispatchError>;
}
