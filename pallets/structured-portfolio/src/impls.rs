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

use cfg_traits::portfolio::{TrancheRatioBounds, TrancheValuation};

use super::*;

impl<T: Config> TrancheRatioBounds for Pallet<T> {
	type Balance = T::Balance;
	type PortfolioId = PortfolioId;

	fn check_tranches_ratios(portfolio_id: Self::PortfolioId) -> Result<(), DispatchError> {
		let portfolio = Self::get_portfolio(portfolio_id)?;

		match portfolio.status {
			PortfolioStatus::Closed => Ok(()),
			_ => Self::ensure_ratios(portfolio_id, &portfolio, T::Time::now()),
		}
	}

	fn min_tranche_value_complying_with_ratio(
		portfolio_id: Self::PortfolioId,
		tranche: TrancheIndex,
	) -> Result<Self::Balance, DispatchError> {
		let portfolio = Self::get_portfolio(portfolio_id)?;
		Self::ensure_tranche(&portfolio, tranche)?;

		let values = Self::waterfall_values(portfolio_id, &portfolio, T::Time::now())?;
		portfolio.min_value_complying_with_ratio(&values, tranche)
	}

	fn max_tranche_value_complying_with_ratio(
		portfolio_id: Self::PortfolioId,
		tranche: TrancheIndex,
	) -> Result<Self::Balance, DispatchError> {
		let portfolio = Self::get_portfolio(portfolio_id)?;
		Self::ensure_tranche(&portfolio, tranche)?;

		let values = Self::waterfall_values(portfolio_id, &portfolio, T::Time::now())?;
		portfolio.max_value_complying_with_ratio(&values, tranche)
	}
}

impl<T: Config> TrancheValuation for Pallet<T> {
	type Balance = T::Balance;
	type PortfolioId = PortfolioId;

	fn total_assets(
		portfolio_id: Self::PortfolioId,
		tranche: TrancheIndex,
	) -> Result<Self::Balance, DispatchError> {
		Self::calculate_waterfall_for_tranche(portfolio_id, tranche)
	}

	fn convert_to_shares(
		portfolio_id: Self::PortfolioId,
		tranche: TrancheIndex,
		assets: Self::Balance,
	) -> Result<Self::Balance, DispatchError> {
		let tranche_assets = Self::calculate_waterfall_for_tranche(portfolio_id, tranche)?;
		Self::shares_for(portfolio_id, tranche, assets, tranche_assets, Rounding::Down)
	}

	fn convert_to_assets(
		portfolio_id: Self::PortfolioId,
		tranche: TrancheIndex,
		shares: Self::Balance,
	) -> Result<Self::Balance, DispatchError> {
		let tranche_assets = Self::calculate_waterfall_for_tranche(portfolio_id, tranche)?;
		let supply = T::Tokens::total_issuance(Self::tranche_currency(portfolio_id, tranche));

		if supply.is_zero() {
			return Ok(shares);
		}

		let tranche_assets: u128 = tranche_assets
			.try_into()
			.map_err(|_| ArithmeticError::Overflow)?;
		let supply: u128 = supply.try_into().map_err(|_| ArithmeticError::Overflow)?;

		mul_div(shares, tranche_assets, supply, Rounding::Down)
	}
}
