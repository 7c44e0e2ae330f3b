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

use cfg_primitives::{Balance, LoanId, PortfolioId, TrancheIndex};
use frame_support::{assert_noop, assert_ok};
use sp_runtime::DispatchError;

use crate::{
	checkpoint::Fees,
	loans::LoanStatus,
	mock::*,
	pallet::{ActiveLoans, Error, Event, LastPortfolioId, Loans, Portfolios},
	portfolio::{PortfolioParameters, PortfolioStatus},
	tranches::{ManagerFee, TrancheInput},
	LoanTermsOf, PortfolioDetailsOf, TrancheInputOf,
};

const EQUITY: TrancheIndex = 0;
const JUNIOR: TrancheIndex = 1;
const SENIOR: TrancheIndex = 2;

mod flows;
mod util;
