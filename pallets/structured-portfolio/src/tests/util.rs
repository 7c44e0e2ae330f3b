use frame_support::traits::fungibles::{Inspect, Mutate};

use super::*;

pub fn tranche(target_apy: u32, min_subordinate_ratio: u32) -> TrancheInputOf<Runtime> {
	TrancheInput {
		target_apy,
		min_subordinate_ratio,
		manager_fee: ManagerFee {
			rate: 0,
			beneficiary: BENEFICIARY,
		},
	}
}

/// Equity, a 5% junior tranche and a 3% senior tranche.
pub fn three_tranches() -> Vec<TrancheInputOf<Runtime>> {
	vec![tranche(0, 0), tranche(500, 0), tranche(300, 0)]
}

pub fn parameters() -> PortfolioParameters<Balance> {
	PortfolioParameters {
		duration: YEAR,
		capital_formation_deadline: START + 30 * DAY,
		minimum_size: 0,
	}
}

pub fn create_portfolio(tranches: Vec<TrancheInputOf<Runtime>>) -> PortfolioId {
	assert_ok!(StructuredPortfolio::create_portfolio(
		RuntimeOrigin::signed(MANAGER),
		AUSD,
		tranches,
		parameters(),
	));

	LastPortfolioId::<Runtime>::get()
}

pub fn fund_account(who: AccountId, amount: Balance) {
	assert_ok!(OrmlTokens::mint_into(AUSD, &who, amount));
}

pub fn deposit(who: AccountId, portfolio_id: PortfolioId, tranche: TrancheIndex, amount: Balance) {
	fund_account(who, amount);
	assert_ok!(StructuredPortfolio::deposit(
		RuntimeOrigin::signed(who),
		portfolio_id,
		tranche,
		amount
	));
}

pub fn start(portfolio_id: PortfolioId) {
	assert_ok!(StructuredPortfolio::start(
		RuntimeOrigin::signed(MANAGER),
		portfolio_id
	));
}

/// Creates a portfolio, deposits `amounts` from `LENDER` into each tranche
/// and starts it.
pub fn live_portfolio(tranches: Vec<TrancheInputOf<Runtime>>, amounts: &[Balance]) -> PortfolioId {
	let portfolio_id = create_portfolio(tranches);
	for (index, amount) in amounts.iter().enumerate() {
		if *amount > 0 {
			deposit(LENDER, portfolio_id, index as TrancheIndex, *amount);
		}
	}
	start(portfolio_id);
	portfolio_id
}

pub fn loan_terms(
	principal: Balance,
	period_payment: Balance,
	period_count: u32,
	period_duration: u64,
) -> LoanTermsOf<Runtime> {
	crate::loans::LoanTerms {
		principal,
		period_payment,
		period_count,
		period_duration,
		grace_period: DAY,
		recipient: BORROWER,
		can_be_repaid_after_default: false,
	}
}

pub fn add_loan(portfolio_id: PortfolioId, terms: LoanTermsOf<Runtime>) -> LoanId {
	assert_ok!(StructuredPortfolio::add_loan(
		RuntimeOrigin::signed(MANAGER),
		portfolio_id,
		terms
	));
	crate::pallet::LastLoanId::<Runtime>::get(portfolio_id)
}

pub fn accept_loan(portfolio_id: PortfolioId, loan_id: LoanId) {
	assert_ok!(StructuredPortfolio::accept_loan(
		RuntimeOrigin::signed(BORROWER),
		portfolio_id,
		loan_id
	));
}

/// Adds, accepts and funds a loan.
pub fn start_loan(portfolio_id: PortfolioId, terms: LoanTermsOf<Runtime>) -> LoanId {
	let loan_id = add_loan(portfolio_id, terms);
	accept_loan(portfolio_id, loan_id);
	assert_ok!(StructuredPortfolio::fund_loan(
		RuntimeOrigin::signed(MANAGER),
		portfolio_id,
		loan_id
	));
	loan_id
}

pub fn repay(portfolio_id: PortfolioId, loan_id: LoanId, who: AccountId, amount: Balance) {
	fund_account(who, amount);
	assert_ok!(StructuredPortfolio::repay_loan(
		RuntimeOrigin::signed(who),
		portfolio_id,
		loan_id,
		amount
	));
}

pub fn balance(who: AccountId) -> Balance {
	OrmlTokens::balance(AUSD, &who)
}

pub fn shares(portfolio_id: PortfolioId, tranche: TrancheIndex, who: AccountId) -> Balance {
	OrmlTokens::balance(
		StructuredPortfolio::tranche_currency(portfolio_id, tranche),
		&who,
	)
}

pub fn portfolio_balance(portfolio_id: PortfolioId) -> Balance {
	balance(StructuredPortfolio::portfolio_account(portfolio_id))
}

pub fn tranche_balance(portfolio_id: PortfolioId, tranche: TrancheIndex) -> Balance {
	balance(StructuredPortfolio::tranche_account(portfolio_id, tranche))
}

pub fn waterfall(portfolio_id: PortfolioId) -> Vec<Balance> {
	StructuredPortfolio::calculate_waterfall(portfolio_id).unwrap()
}

pub fn portfolio(portfolio_id: PortfolioId) -> PortfolioDetailsOf<Runtime> {
	Portfolios::<Runtime>::get(portfolio_id).unwrap()
}

pub fn loan_status(portfolio_id: PortfolioId, loan_id: LoanId) -> LoanStatus {
	Loans::<Runtime>::get(portfolio_id, loan_id).unwrap().status
}

pub fn update_checkpoints(portfolio_id: PortfolioId) {
	assert_ok!(StructuredPortfolio::update_checkpoints(
		RuntimeOrigin::signed(ANY),
		portfolio_id
	));
}
