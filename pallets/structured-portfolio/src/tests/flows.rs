use super::*;

mod deposit {
	use super::*;

	#[test]
	fn in_capital_formation_fills_tranche_reserve() {
		new_test_ext().execute_with(|| {
			config_mocks();
			let portfolio_id = util::create_portfolio(util::three_tranches());

			util::deposit(LENDER, portfolio_id, JUNIOR, 1000);
			util::deposit(OTHER_LENDER, portfolio_id, JUNIOR, 500);

			assert_eq!(util::shares(portfolio_id, JUNIOR, LENDER), 1000);
			assert_eq!(util::shares(portfolio_id, JUNIOR, OTHER_LENDER), 500);
			assert_eq!(util::tranche_balance(portfolio_id, JUNIOR), 1500);
			assert_eq!(util::waterfall(portfolio_id), vec![0, 1500, 0]);

			System::assert_last_event(
				Event::<Runtime>::Deposited {
					portfolio_id,
					tranche: JUNIOR,
					who: OTHER_LENDER,
					assets: 500,
					shares: 500,
				}
				.into(),
			);
		});
	}

	#[test]
	fn while_live_prices_shares_at_tranche_value() {
		new_test_ext().execute_with(|| {
			config_mocks();
			let portfolio_id = util::live_portfolio(util::three_tranches(), &[1000, 1000, 1000]);

			advance_time(YEAR);
			util::deposit(OTHER_LENDER, portfolio_id, SENIOR, 1030);

			assert_eq!(util::shares(portfolio_id, SENIOR, OTHER_LENDER), 1000);
			assert_eq!(util::portfolio(portfolio_id).virtual_token_balance, 4030);
			assert_eq!(util::portfolio_balance(portfolio_id), 4030);
			assert_eq!(util::waterfall(portfolio_id), vec![920, 1050, 2060]);
		});
	}

	#[test]
	fn with_policy_restrictions() {
		new_test_ext().execute_with(|| {
			config_mocks();
			let portfolio_id = util::create_portfolio(util::three_tranches());
			util::fund_account(LENDER, 1000);

			MockLenderEligibility::mock_is_allowed(|_, tranche, _| tranche != SENIOR);
			assert_noop!(
				StructuredPortfolio::deposit(
					RuntimeOrigin::signed(LENDER),
					portfolio_id,
					SENIOR,
					1000
				),
				Error::<Runtime>::NotAllowed
			);

			MockFlowControl::mock_max_deposit(|_, _, _| 999);
			assert_noop!(
				StructuredPortfolio::deposit(
					RuntimeOrigin::signed(LENDER),
					portfolio_id,
					JUNIOR,
					1000
				),
				Error::<Runtime>::DepositLimitExceeded
			);

			assert_ok!(StructuredPortfolio::deposit(
				RuntimeOrigin::signed(LENDER),
				portfolio_id,
				JUNIOR,
				999
			));
		});
	}

	#[test]
	fn with_wrong_tranche() {
		new_test_ext().execute_with(|| {
			config_mocks();
			let portfolio_id = util::create_portfolio(util::three_tranches());
			util::fund_account(LENDER, 1000);

			assert_noop!(
				StructuredPortfolio::deposit(RuntimeOrigin::signed(LENDER), portfolio_id, 3, 1000),
				Error::<Runtime>::InvalidTrancheIndex
			);
		});
	}
}

mod withdraw {
	use super::*;

	#[test]
	fn in_capital_formation_burns_shares() {
		new_test_ext().execute_with(|| {
			config_mocks();
			let portfolio_id = util::create_portfolio(util::three_tranches());
			util::deposit(LENDER, portfolio_id, EQUITY, 1000);

			assert_ok!(StructuredPortfolio::withdraw(
				RuntimeOrigin::signed(LENDER),
				portfolio_id,
				EQUITY,
				400
			));

			assert_eq!(util::shares(portfolio_id, EQUITY, LENDER), 600);
			assert_eq!(util::balance(LENDER), 400);
			assert_eq!(util::tranche_balance(portfolio_id, EQUITY), 600);
			assert_eq!(util::waterfall(portfolio_id), vec![600, 0, 0]);
		});
	}

	#[test]
	fn while_live_rounds_shares_up() {
		new_test_ext().execute_with(|| {
			config_mocks();
			let portfolio_id = util::live_portfolio(util::three_tranches(), &[1000, 1000, 1000]);

			advance_time(YEAR);
			assert_ok!(StructuredPortfolio::withdraw(
				RuntimeOrigin::signed(LENDER),
				portfolio_id,
				JUNIOR,
				100
			));

			// 100 * 1000 / 1050 = 95.2
			assert_eq!(util::shares(portfolio_id, JUNIOR, LENDER), 904);
			assert_eq!(util::balance(LENDER), 100);
			assert_eq!(util::portfolio_balance(portfolio_id), 2900);
			assert_eq!(util::waterfall(portfolio_id), vec![920, 950, 1030]);
		});
	}

	#[test]
	fn without_enough_shares() {
		new_test_ext().execute_with(|| {
			config_mocks();
			let portfolio_id = util::create_portfolio(util::three_tranches());

			assert_noop!(
				StructuredPortfolio::withdraw(
					RuntimeOrigin::signed(LENDER),
					portfolio_id,
					SENIOR,
					1
				),
				Error::<Runtime>::InsufficientTrancheAssets
			);

			util::deposit(LENDER, portfolio_id, SENIOR, 1000);

			assert_noop!(
				StructuredPortfolio::withdraw(
					RuntimeOrigin::signed(OTHER_LENDER),
					portfolio_id,
					SENIOR,
					10
				),
				Error::<Runtime>::InsufficientShares
			);
			assert_noop!(
				StructuredPortfolio::withdraw(
					RuntimeOrigin::signed(LENDER),
					portfolio_id,
					SENIOR,
					1001
				),
				Error::<Runtime>::InsufficientTrancheAssets
			);
		});
	}

	#[test]
	fn while_live_limited_by_liquidity() {
		new_test_ext().execute_with(|| {
			config_mocks();
			let portfolio_id = util::live_portfolio(util::three_tranches(), &[1000, 1000, 1000]);
			util::start_loan(portfolio_id, util::loan_terms(2500, 0, 1, 30 * DAY));

			assert_noop!(
				StructuredPortfolio::withdraw(
					RuntimeOrigin::signed(LENDER),
					portfolio_id,
					SENIOR,
					501
				),
				Error::<Runtime>::InsufficientLiquidity
			);

			assert_ok!(StructuredPortfolio::withdraw(
				RuntimeOrigin::signed(LENDER),
				portfolio_id,
				SENIOR,
				500
			));
		});
	}

	#[test]
	fn with_flow_limit() {
		new_test_ext().execute_with(|| {
			config_mocks();
			let portfolio_id = util::create_portfolio(util::three_tranches());
			util::deposit(LENDER, portfolio_id, SENIOR, 1000);

			MockFlowControl::mock_max_withdraw(|_, _, _| 0);
			assert_noop!(
				StructuredPortfolio::withdraw(
					RuntimeOrigin::signed(LENDER),
					portfolio_id,
					SENIOR,
					1
				),
				Error::<Runtime>::WithdrawLimitExceeded
			);
		});
	}
}

mod valuation {
	use cfg_traits::portfolio::TrancheValuation;

	use super::*;

	#[test]
	fn converts_between_shares_and_assets() {
		new_test_ext().execute_with(|| {
			config_mocks();
			let portfolio_id = util::live_portfolio(util::three_tranches(), &[1000, 1000, 1000]);
			advance_time(YEAR);

			assert_eq!(
				<StructuredPortfolio as TrancheValuation>::total_assets(portfolio_id, SENIOR),
				Ok(1030)
			);
			assert_eq!(
				StructuredPortfolio::convert_to_shares(portfolio_id, SENIOR, 103),
				Ok(100)
			);
			assert_eq!(
				StructuredPortfolio::convert_to_assets(portfolio_id, SENIOR, 100),
				Ok(103)
			);
			assert_eq!(
				StructuredPortfolio::convert_to_assets(portfolio_id, EQUITY, 1000),
				Ok(920)
			);
		});
	}

	#[test]
	fn is_one_to_one_without_supply() {
		new_test_ext().execute_with(|| {
			config_mocks();
			let portfolio_id = util::create_portfolio(util::three_tranches());

			assert_eq!(
				StructuredPortfolio::convert_to_shares(portfolio_id, SENIOR, 500),
				Ok(500)
			);
			assert_eq!(
				StructuredPortfolio::convert_to_assets(portfolio_id, SENIOR, 500),
				Ok(500)
			);
			assert_eq!(
				StructuredPortfolio::convert_to_assets(portfolio_id, 7, 500),
				Err(Error::<Runtime>::InvalidTrancheIndex.into())
			);
		});
	}
}
