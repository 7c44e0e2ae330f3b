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

//! # Structured Portfolio pallet
//!
//! A portfolio of fixed-installment loans funded by a stack of tranches.
//! Tranche values follow a waterfall: senior tranches are served first up to
//! their target return and the equity tranche owns the residual. Every state
//! changing operation first commits a checkpoint per tranche, which accrues
//! protocol and manager fees and records the deficit of tranches that did
//! not reach their target.
//!
//! A portfolio moves from `CapitalFormation` to `Live` to `Closed`. During
//! capital formation lenders deposit into the tranche reserves. Starting the
//! portfolio pools the reserves so the manager can fund loans. Closing
//! distributes the pooled liquidity back into the tranche reserves, senior
//! first.
#![cfg_attr(not(feature = "std"), no_std)]

use cfg_primitives::{IBalance, LoanId, PortfolioId, TrancheIndex};
use cfg_traits::{
	portfolio::{FlowControl, LenderEligibility, ProtocolFee},
	Seconds, TimeAsSecs, TrancheCurrency,
};
use checkpoint::Phase;
use frame_support::{
	dispatch::DispatchResult,
	ensure,
	traits::{
		fungibles::{Inspect, Mutate},
		tokens::{Fortitude, Precision, Preservation},
	},
	transactional, BoundedVec,
};
use frame_system::pallet_prelude::*;
use loans::{Loan, LoanStatus, LoanTerms};
use orml_traits::asset_registry::{AssetMetadata, Inspect as OrmlInspect, Mutate as OrmlMutate};
pub use pallet::*;
use portfolio::{
	Payout, PortfolioDetails, PortfolioLocator, PortfolioParameters, PortfolioStatus,
	TrancheLocator,
};
use sp_arithmetic::Rounding;
use sp_runtime::{
	traits::{
		AccountIdConversion, AtLeast32BitUnsigned, EnsureAdd, EnsureAddAssign, EnsureSubAssign,
		Get, Zero,
	},
	ArithmeticError, DispatchError,
};
use sp_std::vec::Vec;
use tranches::{mul_div, ratios_hold, Allocation, Tranche, TrancheInput, Tranches, EQUITY};
pub use weights::*;

pub mod checkpoint;
mod impls;
pub mod loans;
#[cfg(test)]
mod mock;
pub mod portfolio;
#[cfg(test)]
mod tests;
pub mod tranches;
pub mod weights;

pub const LOG_TARGET: &str = "runtime::structured-portfolio";

/// Type alias for the details of a portfolio
pub type PortfolioDetailsOf<T> = PortfolioDetails<
	<T as frame_system::Config>::AccountId,
	<T as Config>::Balance,
	<T as Config>::CurrencyId,
	<T as Config>::MaxTranches,
>;

/// Type alias for the tranches of a portfolio
pub type TranchesOf<T> = Tranches<
	<T as frame_system::Config>::AccountId,
	<T as Config>::Balance,
	<T as Config>::MaxTranches,
>;

pub type TrancheInputOf<T> = TrancheInput<<T as frame_system::Config>::AccountId>;

pub type LoanOf<T> = Loan<<T as frame_system::Config>::AccountId, <T as Config>::Balance>;

pub type LoanTermsOf<T> = LoanTerms<<T as frame_system::Config>::AccountId, <T as Config>::Balance>;

pub type PayoutOf<T> = Payout<<T as frame_system::Config>::AccountId, <T as Config>::Balance>;

#[frame_support::pallet]
pub mod pallet {
	use cfg_primitives::BasisPoints;
	use frame_support::{pallet_prelude::*, traits::Contains};

	use super::*;

	#[pallet::config]
	pub trait Config: frame_system::Config {
		type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;

		type Balance: Member
			+ Parameter
			+ AtLeast32BitUnsigned
			+ Default
			+ Copy
			+ MaxEncodedLen
			+ TypeInfo;

		type CurrencyId: Parameter + Member + Copy + MaxEncodedLen;

		/// The currency of the tranche shares
		type TrancheCurrency: TrancheCurrency<PortfolioId> + Into<Self::CurrencyId>;

		/// The type for handling transfers, burning and minting of
		/// multi-assets.
		type Tokens: Mutate<Self::AccountId>
			+ Inspect<Self::AccountId, AssetId = Self::CurrencyId, Balance = Self::Balance>;

		/// Source of the portfolio currency decimals. Tranche tokens are
		/// registered here with the same decimals.
		type AssetRegistry: OrmlMutate<
			AssetId = Self::CurrencyId,
			Balance = Self::Balance,
			CustomMetadata = Self::CustomMetadata,
		>;

		/// Custom metadata attached to every tranche token
		type CustomMetadata: Parameter + Member + TypeInfo + Default;

		/// Fetching method for the time of the current block
		type Time: TimeAsSecs;

		/// Currencies a portfolio can be denominated in
		type PortfolioCurrency: Contains<Self::CurrencyId>;

		/// Who may hold shares of a tranche
		type LenderEligibility: LenderEligibility<Self::AccountId, PortfolioId = PortfolioId>;

		/// Deposit and withdraw limits per lender
		type FlowControl: FlowControl<
			Self::AccountId,
			PortfolioId = PortfolioId,
			Balance = Self::Balance,
		>;

		/// Source of the protocol fee rate and treasury
		type ProtocolFee: ProtocolFee<Self::AccountId>;

		/// Origin allowed to pause and unpause portfolios
		type PauseOrigin: EnsureOrigin<Self::RuntimeOrigin>;

		/// Max number of Tranches
		#[pallet::constant]
		type MaxTranches: Get<u32> + Member + PartialOrd + scale_info::TypeInfo;

		/// Max number of loans contributing to the value of a portfolio
		#[pallet::constant]
		type MaxActiveLoans: Get<u32>;

		/// Weight Information
		type WeightInfo: WeightInfo;
	}

	#[pallet::pallet]
	#[pallet::generate_store(pub(super) trait Store)]
	pub struct Pallet<T>(_);

	#[pallet::storage]
	pub type LastPortfolioId<T: Config> = StorageValue<_, PortfolioId, ValueQuery>;

	#[pallet::storage]
	#[pallet::getter(fn portfolio)]
	pub type Portfolios<T: Config> =
		StorageMap<_, Blake2_128Concat, PortfolioId, PortfolioDetailsOf<T>>;

	#[pallet::storage]
	pub type LastLoanId<T: Config> = StorageMap<_, Blake2_128Concat, PortfolioId, LoanId, ValueQuery>;

	#[pallet::storage]
	#[pallet::getter(fn loan)]
	pub type Loans<T: Config> =
		StorageDoubleMap<_, Blake2_128Concat, PortfolioId, Blake2_128Concat, LoanId, LoanOf<T>>;

	/// Started loans of a portfolio. Order has no meaning.
	#[pallet::storage]
	#[pallet::getter(fn active_loans)]
	pub type ActiveLoans<T: Config> = StorageMap<
		_,
		Blake2_128Concat,
		PortfolioId,
		BoundedVec<LoanId, T::MaxActiveLoans>,
		ValueQuery,
	>;

	#[pallet::event]
	#[pallet::generate_deposit(pub(super) fn deposit_event)]
	pub enum Event<T: Config> {
		/// A portfolio was created.
		PortfolioCreated {
			portfolio_id: PortfolioId,
			manager: T::AccountId,
			currency: T::CurrencyId,
		},
		/// A portfolio changed its status.
		PortfolioStatusChanged {
			portfolio_id: PortfolioId,
			status: PortfolioStatus,
		},
		/// Assets were deposited into a tranche.
		Deposited {
			portfolio_id: PortfolioId,
			tranche: TrancheIndex,
			who: T::AccountId,
			assets: T::Balance,
			shares: T::Balance,
		},
		/// Assets were withdrawn from a tranche.
		Withdrawn {
			portfolio_id: PortfolioId,
			tranche: TrancheIndex,
			who: T::AccountId,
			assets: T::Balance,
			shares: T::Balance,
		},
		/// A tranche checkpoint was committed.
		CheckpointUpdated {
			portfolio_id: PortfolioId,
			tranche: TrancheIndex,
			total_assets: T::Balance,
			deficit: T::Balance,
			value_change: IBalance,
		},
		/// Protocol fees of a tranche were paid to the treasury.
		ProtocolFeePaid {
			portfolio_id: PortfolioId,
			tranche: TrancheIndex,
			treasury: T::AccountId,
			amount: T::Balance,
		},
		/// Manager fees of a tranche were paid to its beneficiary.
		ManagerFeePaid {
			portfolio_id: PortfolioId,
			tranche: TrancheIndex,
			beneficiary: T::AccountId,
			amount: T::Balance,
		},
		LoanAdded {
			portfolio_id: PortfolioId,
			loan_id: LoanId,
			recipient: T::AccountId,
		},
		LoanAccepted {
			portfolio_id: PortfolioId,
			loan_id: LoanId,
		},
		LoanFunded {
			portfolio_id: PortfolioId,
			loan_id: LoanId,
			principal: T::Balance,
		},
		LoanRepaid {
			portfolio_id: PortfolioId,
			loan_id: LoanId,
			amount: T::Balance,
		},
		LoanDefaulted {
			portfolio_id: PortfolioId,
			loan_id: LoanId,
		},
		LoanCanceled {
			portfolio_id: PortfolioId,
			loan_id: LoanId,
		},
		LoanGracePeriodUpdated {
			portfolio_id: PortfolioId,
			loan_id: LoanId,
			grace_period: Seconds,
		},
		TrancheRatioUpdated {
			portfolio_id: PortfolioId,
			tranche: TrancheIndex,
			min_subordinate_ratio: BasisPoints,
		},
		MinimumSizeUpdated {
			portfolio_id: PortfolioId,
			minimum_size: T::Balance,
		},
		ManagerFeeUpdated {
			portfolio_id: PortfolioId,
			tranche: TrancheIndex,
			rate: BasisPoints,
			beneficiary: T::AccountId,
		},
		/// A portfolio was paused or unpaused.
		PauseUpdated {
			portfolio_id: PortfolioId,
			paused: bool,
		},
	}

	#[pallet::error]
	pub enum Error<T> {
		/// The caller is not the manager of the portfolio.
		NotManager,
		/// The lender is not allowed to hold shares of the tranche.
		NotAllowed,
		/// Only the recipient of the loan can perform this action.
		NotLoanRecipient,
		/// The portfolio can not be closed by this caller before its end date.
		CannotCloseBeforeEndDate,
		/// The manager can not close a portfolio with active loans.
		ActiveLoansExist,
		/// The equity tranche can not have a target return or a subordination
		/// ratio.
		NonZeroEquityApy,
		/// The tranche values break a subordination ratio.
		TrancheRatioNotMet,
		/// Durations and period counts must be non-zero.
		ZeroDuration,
		/// A portfolio needs at least the equity tranche.
		NoTranches,
		/// More tranches than allowed were given.
		TooManyTranches,
		/// The portfolio can not be denominated in this currency.
		InvalidCurrency,
		/// The asset registry holds no metadata for the portfolio currency.
		MetadataForCurrencyNotFound,
		/// A tranche token is registered with other decimals than the
		/// portfolio currency.
		DecimalsMismatch,
		FailedToRegisterTrancheMetadata,
		/// The deposits do not reach the minimum size of the portfolio.
		MinimumSizeNotReached,
		/// The repayment must equal the next installment.
		InvalidRepaymentAmount,
		PortfolioNotLive,
		PortfolioNotInCapitalFormation,
		PortfolioAlreadyClosed,
		PortfolioClosed,
		PortfolioNotStarted,
		/// The portfolio is paused.
		PortfolioPaused,
		/// Checkpoints only exist once the portfolio left capital formation.
		NoCheckpointsBeforeStart,
		LoanNotActive,
		LoanNotAccepted,
		/// The loan is not late enough to be defaulted.
		LoanNotOverdue,
		/// The loan status does not allow this action.
		InvalidLoanStatus,
		/// Not enough liquid assets once unpaid fees are set aside.
		InsufficientLiquidity,
		/// The tranche does not hold enough assets.
		InsufficientTrancheAssets,
		DepositLimitExceeded,
		WithdrawLimitExceeded,
		/// The lender does not hold enough shares.
		InsufficientShares,
		/// The active loan set of the portfolio is full.
		TooManyActiveLoans,
		/// A value change does not fit into a signed balance.
		ArithmeticBound,
		PortfolioNotFound,
		LoanNotFound,
		InvalidTrancheIndex,
	}

	#[pallet::call]
	impl<T: Config> Pallet<T> {
		/// Create a new portfolio in capital formation.
		///
		/// The caller becomes the manager. Tranches are given junior to
		/// senior, the first one being the equity tranche.
		#[pallet::weight(T::WeightInfo::create_portfolio(T::MaxTranches::get()))]
		#[transactional]
		#[pallet::call_index(0)]
		pub fn create_portfolio(
			origin: OriginFor<T>,
			currency: T::CurrencyId,
			tranche_inputs: Vec<TrancheInputOf<T>>,
			parameters: PortfolioParameters<T::Balance>,
		) -> DispatchResult {
			let manager = ensure_signed(origin)?;

			ensure!(!tranche_inputs.is_empty(), Error::<T>::NoTranches);
			ensure!(
				tranche_inputs.len() <= T::MaxTranches::get() as usize,
				Error::<T>::TooManyTranches
			);
			ensure!(
				tranche_inputs
					.first()
					.map(|equity| equity.target_apy.is_zero()
						&& equity.min_subordinate_ratio.is_zero())
					.unwrap_or(false),
				Error::<T>::NonZeroEquityApy
			);
			ensure!(!parameters.duration.is_zero(), Error::<T>::ZeroDuration);
			ensure!(
				T::PortfolioCurrency::contains(&currency),
				Error::<T>::InvalidCurrency
			);
			let decimals = T::AssetRegistry::metadata(&currency)
				.map(|metadata| metadata.decimals)
				.ok_or(Error::<T>::MetadataForCurrencyNotFound)?;

			let tranches = BoundedVec::try_from(
				tranche_inputs
					.into_iter()
					.map(Tranche::new)
					.collect::<Vec<_>>(),
			)
			.map_err(|_| Error::<T>::TooManyTranches)?;

			let portfolio_id = LastPortfolioId::<T>::try_mutate(|last_id| {
				last_id.ensure_add_assign(1)?;
				Ok::<_, ArithmeticError>(*last_id)
			})?;

			for tranche in 0..tranches.len() {
				Self::register_tranche_token(portfolio_id, tranche as TrancheIndex, decimals)?;
			}

			Portfolios::<T>::insert(
				portfolio_id,
				PortfolioDetails {
					manager: manager.clone(),
					currency,
					status: PortfolioStatus::CapitalFormation,
					parameters,
					start_date: 0,
					end_date: 0,
					virtual_token_balance: Zero::zero(),
					paused: false,
					tranches: TranchesOf::<T>::new(tranches),
				},
			);

			Self::deposit_event(Event::PortfolioCreated {
				portfolio_id,
				manager,
				currency,
			});

			Ok(())
		}

		/// Deposit assets into a tranche in exchange for its shares.
		#[pallet::weight(T::WeightInfo::deposit(T::MaxTranches::get(), T::MaxActiveLoans::get()))]
		#[transactional]
		#[pallet::call_index(1)]
		pub fn deposit(
			origin: OriginFor<T>,
			portfolio_id: PortfolioId,
			tranche: TrancheIndex,
			amount: T::Balance,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;

			let (currency, payouts, shares) = Self::mutate_portfolio(portfolio_id, |portfolio| {
				Self::ensure_not_paused(portfolio)?;
				Self::ensure_tranche(portfolio, tranche)?;
				ensure!(
					T::LenderEligibility::is_allowed(portfolio_id, tranche, &who),
					Error::<T>::NotAllowed
				);
				ensure!(
					amount <= T::FlowControl::max_deposit(portfolio_id, tranche, &who),
					Error::<T>::DepositLimitExceeded
				);

				let now = T::Time::now();
				let mut payouts = Vec::new();

				let destination = match portfolio.status {
					PortfolioStatus::CapitalFormation => {
						Self::tranche_account(portfolio_id, tranche)
					}
					PortfolioStatus::Live => {
						Self::commit_checkpoints(portfolio_id, portfolio, now, &mut payouts)?;
						Self::portfolio_account(portfolio_id)
					}
					PortfolioStatus::Closed => Err(Error::<T>::PortfolioClosed)?,
				};

				let assets = Self::tranche_value(portfolio_id, portfolio, tranche, now)?;
				let shares = Self::shares_for(portfolio_id, tranche, amount, assets, Rounding::Down)?;

				let is_live = portfolio.is_live();
				let tranche_details = Self::tranche_mut(portfolio, tranche)?;
				if is_live {
					tranche_details.deposit_into_checkpoint(amount)?;
					portfolio.virtual_token_balance.ensure_add_assign(amount)?;
					Self::ensure_ratios(portfolio_id, portfolio, now)?;
				} else {
					tranche_details.reserve.ensure_add_assign(amount)?;
				}

				payouts.push(Payout {
					from: who.clone(),
					to: destination,
					amount,
				});

				Ok((portfolio.currency, payouts, shares))
			})?;

			Self::execute_payouts(currency, payouts)?;
			T::Tokens::mint_into(Self::tranche_currency(portfolio_id, tranche), &who, shares)?;

			Self::deposit_event(Event::Deposited {
				portfolio_id,
				tranche,
				who,
				assets: amount,
				shares,
			});

			Ok(())
		}

		/// Withdraw assets from a tranche by burning its shares.
		#[pallet::weight(T::WeightInfo::withdraw(T::MaxTranches::get(), T::MaxActiveLoans::get()))]
		#[transactional]
		#[pallet::call_index(2)]
		pub fn withdraw(
			origin: OriginFor<T>,
			portfolio_id: PortfolioId,
			tranche: TrancheIndex,
			amount: T::Balance,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;

			let (currency, payouts, shares) = Self::mutate_portfolio(portfolio_id, |portfolio| {
				Self::ensure_not_paused(portfolio)?;
				Self::ensure_tranche(portfolio, tranche)?;
				ensure!(
					amount <= T::FlowControl::max_withdraw(portfolio_id, tranche, &who),
					Error::<T>::WithdrawLimitExceeded
				);

				let now = T::Time::now();
				let mut payouts = Vec::new();

				let source = match portfolio.status {
					PortfolioStatus::CapitalFormation => {
						Self::tranche_account(portfolio_id, tranche)
					}
					PortfolioStatus::Live => {
						Self::commit_checkpoints(portfolio_id, portfolio, now, &mut payouts)?;
						ensure!(
							amount <= portfolio.liquid_assets()?,
							Error::<T>::InsufficientLiquidity
						);
						Self::portfolio_account(portfolio_id)
					}
					PortfolioStatus::Closed => {
						Self::commit_checkpoints(portfolio_id, portfolio, now, &mut payouts)?;
						Self::tranche_account(portfolio_id, tranche)
					}
				};

				let assets = Self::tranche_value(portfolio_id, portfolio, tranche, now)?;
				ensure!(amount <= assets, Error::<T>::InsufficientTrancheAssets);

				let shares = Self::shares_for(portfolio_id, tranche, amount, assets, Rounding::Up)?;
				ensure!(
					T::Tokens::balance(Self::tranche_currency(portfolio_id, tranche), &who) >= shares,
					Error::<T>::InsufficientShares
				);

				let status = portfolio.status;
				let tranche_details = Self::tranche_mut(portfolio, tranche)?;
				match status {
					PortfolioStatus::CapitalFormation => {
						tranche_details.reserve.ensure_sub_assign(amount)?;
					}
					PortfolioStatus::Live => {
						tranche_details.withdraw_from_checkpoint(amount)?;
						portfolio.virtual_token_balance.ensure_sub_assign(amount)?;
						Self::ensure_ratios(portfolio_id, portfolio, now)?;
					}
					PortfolioStatus::Closed => {
						tranche_details.reserve.ensure_sub_assign(amount)?;
						tranche_details.withdraw_from_checkpoint(amount)?;
					}
				}

				payouts.push(Payout {
					from: source,
					to: who.clone(),
					amount,
				});

				Ok((portfolio.currency, payouts, shares))
			})?;

			Self::execute_payouts(currency, payouts)?;
			T::Tokens::burn_from(
				Self::tranche_currency(portfolio_id, tranche),
				&who,
				shares,
				Precision::Exact,
				Fortitude::Polite,
			)?;

			Self::deposit_event(Event::Withdrawn {
				portfolio_id,
				tranche,
				who,
				assets: amount,
				shares,
			});

			Ok(())
		}

		/// Start the portfolio, pooling the tranche reserves.
		#[pallet::weight(T::WeightInfo::start(T::MaxTranches::get(), T::MaxActiveLoans::get()))]
		#[transactional]
		#[pallet::call_index(3)]
		pub fn start(origin: OriginFor<T>, portfolio_id: PortfolioId) -> DispatchResult {
			let who = ensure_signed(origin)?;

			let (currency, payouts) = Self::mutate_portfolio(portfolio_id, |portfolio| {
				Self::ensure_manager(portfolio, &who)?;
				Self::ensure_not_paused(portfolio)?;
				ensure!(
					portfolio.status == PortfolioStatus::CapitalFormation,
					Error::<T>::PortfolioNotInCapitalFormation
				);

				let total = portfolio.tranches.total_reserve()?;
				ensure!(
					total >= portfolio.parameters.minimum_size,
					Error::<T>::MinimumSizeNotReached
				);
				ensure!(
					ratios_hold(&portfolio.tranches.tranches, &portfolio.tranches.reserves())?,
					Error::<T>::TrancheRatioNotMet
				);

				let now = T::Time::now();
				let portfolio_account = Self::portfolio_account(portfolio_id);
				let protocol_fee_rate = T::ProtocolFee::effective_fee_rate(&portfolio_account);

				let mut payouts = Vec::with_capacity(portfolio.tranches.num_tranches());
				for (index, tranche) in portfolio.tranches.tranches.iter_mut().enumerate() {
					tranche.init_checkpoint(now, protocol_fee_rate);
					payouts.push(Payout {
						from: Self::tranche_account(portfolio_id, index as TrancheIndex),
						to: portfolio_account.clone(),
						amount: tranche.reserve,
					});
					tranche.reserve = Zero::zero();
				}

				portfolio.virtual_token_balance = total;
				portfolio.status = PortfolioStatus::Live;
				portfolio.start_date = now;
				portfolio.end_date = now.ensure_add(portfolio.parameters.duration)?;

				Ok((portfolio.currency, payouts))
			})?;

			Self::execute_payouts(currency, payouts)?;

			log::info!(target: LOG_TARGET, "Portfolio {portfolio_id} started");
			Self::deposit_event(Event::PortfolioStatusChanged {
				portfolio_id,
				status: PortfolioStatus::Live,
			});

			Ok(())
		}

		/// Close the portfolio.
		///
		/// A portfolio in capital formation can be closed by its manager at
		/// any time, or by anyone after the capital formation deadline. A
		/// live portfolio can be closed by its manager once no loan is
		/// active, or by anyone after the end date. Closing a live portfolio
		/// distributes its liquidity into the tranche reserves, senior first.
		#[pallet::weight(T::WeightInfo::close(T::MaxTranches::get(), T::MaxActiveLoans::get()))]
		#[transactional]
		#[pallet::call_index(4)]
		pub fn close(origin: OriginFor<T>, portfolio_id: PortfolioId) -> DispatchResult {
			let who = ensure_signed(origin)?;

			let (currency, payouts) = Self::mutate_portfolio(portfolio_id, |portfolio| {
				Self::ensure_not_paused(portfolio)?;

				let now = T::Time::now();
				let mut payouts = Vec::new();

				match portfolio.status {
					PortfolioStatus::Closed => Err(Error::<T>::PortfolioAlreadyClosed)?,
					PortfolioStatus::CapitalFormation => {
						ensure!(
							who == portfolio.manager
								|| now >= portfolio.parameters.capital_formation_deadline,
							Error::<T>::CannotCloseBeforeEndDate
						);

						let protocol_fee_rate = T::ProtocolFee::effective_fee_rate(
							&Self::portfolio_account(portfolio_id),
						);
						for (index, tranche) in portfolio.tranches.tranches.iter_mut().enumerate() {
							tranche.init_checkpoint(now, protocol_fee_rate);
							if index as TrancheIndex != EQUITY {
								tranche.distributed_assets = tranche.reserve;
								tranche.max_value_on_close = tranche.reserve;
							}
						}

						portfolio.status = PortfolioStatus::Closed;
						portfolio.end_date = now;
					}
					PortfolioStatus::Live => {
						if now < portfolio.end_date {
							ensure!(
								who == portfolio.manager,
								Error::<T>::CannotCloseBeforeEndDate
							);
							ensure!(
								ActiveLoans::<T>::get(portfolio_id).is_empty(),
								Error::<T>::ActiveLoansExist
							);
							portfolio.end_date = now;
						}

						Self::commit_checkpoints(portfolio_id, portfolio, now, &mut payouts)?;

						for (index, tranche) in portfolio.tranches.tranches.iter_mut().enumerate() {
							tranche.max_value_on_close = if index as TrancheIndex == EQUITY {
								Zero::zero()
							} else {
								tranche.checkpoint.total_assets.ensure_add(tranche.deficit)?
							};
							tranche.distributed_assets = Zero::zero();
						}

						let liquidity = portfolio.virtual_token_balance;
						portfolio.virtual_token_balance = Zero::zero();
						portfolio.status = PortfolioStatus::Closed;

						Self::distribute(
							portfolio_id,
							portfolio,
							liquidity,
							&Self::portfolio_account(portfolio_id),
							&mut payouts,
						)?;
						Self::commit_checkpoints(portfolio_id, portfolio, now, &mut payouts)?;
					}
				}

				Ok((portfolio.currency, payouts))
			})?;

			Self::execute_payouts(currency, payouts)?;

			log::info!(target: LOG_TARGET, "Portfolio {portfolio_id} closed");
			Self::deposit_event(Event::PortfolioStatusChanged {
				portfolio_id,
				status: PortfolioStatus::Closed,
			});

			Ok(())
		}

		/// Commit the checkpoints of every tranche, paying the accrued fees.
		///
		/// Can be called by anyone once the portfolio left capital formation.
		#[pallet::weight(T::WeightInfo::update_checkpoints(T::MaxTranches::get(), T::MaxActiveLoans::get()))]
		#[transactional]
		#[pallet::call_index(5)]
		pub fn update_checkpoints(origin: OriginFor<T>, portfolio_id: PortfolioId) -> DispatchResult {
			ensure_signed(origin)?;

			let (currency, payouts) = Self::mutate_portfolio(portfolio_id, |portfolio| {
				Self::ensure_not_paused(portfolio)?;

				let mut payouts = Vec::new();
				Self::commit_checkpoints(portfolio_id, portfolio, T::Time::now(), &mut payouts)?;
				Ok((portfolio.currency, payouts))
			})?;

			Self::execute_payouts(currency, payouts)
		}

		/// Register a loan offer. The recipient has to accept it before it can
		/// be funded.
		#[pallet::weight(T::WeightInfo::add_loan())]
		#[pallet::call_index(6)]
		pub fn add_loan(
			origin: OriginFor<T>,
			portfolio_id: PortfolioId,
			terms: LoanTermsOf<T>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;

			let portfolio = Self::get_portfolio(portfolio_id)?;
			Self::ensure_manager(&portfolio, &who)?;
			Self::ensure_not_paused(&portfolio)?;
			ensure!(portfolio.is_live(), Error::<T>::PortfolioNotLive);
			ensure!(
				!terms.period_duration.is_zero() && !terms.period_count.is_zero(),
				Error::<T>::ZeroDuration
			);

			let loan_id = LastLoanId::<T>::try_mutate(portfolio_id, |last_id| {
				last_id.ensure_add_assign(1)?;
				Ok::<_, ArithmeticError>(*last_id)
			})?;

			let recipient = terms.recipient.clone();
			Loans::<T>::insert(portfolio_id, loan_id, Loan::new(terms));

			Self::deposit_event(Event::LoanAdded {
				portfolio_id,
				loan_id,
				recipient,
			});

			Ok(())
		}

		/// Accept a loan offer as its recipient.
		#[pallet::weight(T::WeightInfo::accept_loan())]
		#[pallet::call_index(7)]
		pub fn accept_loan(
			origin: OriginFor<T>,
			portfolio_id: PortfolioId,
			loan_id: LoanId,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;

			Self::mutate_loan(portfolio_id, loan_id, |loan| {
				ensure!(loan.terms.recipient == who, Error::<T>::NotLoanRecipient);
				ensure!(
					loan.status == LoanStatus::Created,
					Error::<T>::InvalidLoanStatus
				);
				loan.status = LoanStatus::Accepted;
				Ok(())
			})?;

			Self::deposit_event(Event::LoanAccepted {
				portfolio_id,
				loan_id,
			});

			Ok(())
		}

		/// Fund an accepted loan, sending the principal to its recipient.
		#[pallet::weight(T::WeightInfo::fund_loan(T::MaxTranches::get(), T::MaxActiveLoans::get()))]
		#[transactional]
		#[pallet::call_index(8)]
		pub fn fund_loan(
			origin: OriginFor<T>,
			portfolio_id: PortfolioId,
			loan_id: LoanId,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;

			let (currency, payouts, principal) =
				Self::mutate_portfolio(portfolio_id, |portfolio| {
					Self::ensure_manager(portfolio, &who)?;
					Self::ensure_not_paused(portfolio)?;
					ensure!(portfolio.is_live(), Error::<T>::PortfolioNotLive);

					let now = T::Time::now();
					let mut payouts = Vec::new();

					let mut loan = Self::get_loan(portfolio_id, loan_id)?;
					ensure!(
						loan.status == LoanStatus::Accepted,
						Error::<T>::LoanNotAccepted
					);

					Self::commit_checkpoints(portfolio_id, portfolio, now, &mut payouts)?;

					let principal = loan.terms.principal;
					ensure!(
						principal <= portfolio.liquid_assets()?,
						Error::<T>::InsufficientLiquidity
					);

					ActiveLoans::<T>::try_mutate(portfolio_id, |active| {
						active
							.try_push(loan_id)
							.map_err(|_| Error::<T>::TooManyActiveLoans)
					})?;

					portfolio.virtual_token_balance.ensure_sub_assign(principal)?;
					loan.start(now);

					payouts.push(Payout {
						from: Self::portfolio_account(portfolio_id),
						to: loan.terms.recipient.clone(),
						amount: principal,
					});
					Loans::<T>::insert(portfolio_id, loan_id, loan);

					Ok((portfolio.currency, payouts, principal))
				})?;

			Self::execute_payouts(currency, payouts)?;

			Self::deposit_event(Event::LoanFunded {
				portfolio_id,
				loan_id,
				principal,
			});

			Ok(())
		}

		/// Repay the next installment of a loan.
		///
		/// While the portfolio is live only the recipient can repay, after it
		/// closed anyone can. A repayment after close is distributed into the
		/// tranche reserves, senior first.
		#[pallet::weight(T::WeightInfo::repay_loan(T::MaxTranches::get(), T::MaxActiveLoans::get()))]
		#[transactional]
		#[pallet::call_index(9)]
		pub fn repay_loan(
			origin: OriginFor<T>,
			portfolio_id: PortfolioId,
			loan_id: LoanId,
			amount: T::Balance,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;

			let (currency, payouts) = Self::mutate_portfolio(portfolio_id, |portfolio| {
				Self::ensure_not_paused(portfolio)?;
				let mut loan = Self::get_loan(portfolio_id, loan_id)?;

				match portfolio.status {
					PortfolioStatus::CapitalFormation => Err(Error::<T>::PortfolioNotStarted)?,
					PortfolioStatus::Live => {
						ensure!(loan.terms.recipient == who, Error::<T>::NotLoanRecipient)
					}
					PortfolioStatus::Closed => (),
				}
				ensure!(loan.is_repayable(), Error::<T>::LoanNotActive);
				ensure!(
					amount == loan.next_installment()?,
					Error::<T>::InvalidRepaymentAmount
				);

				let now = T::Time::now();
				let mut payouts = Vec::new();

				Self::commit_checkpoints(portfolio_id, portfolio, now, &mut payouts)?;

				let was_defaulted = loan.status == LoanStatus::Defaulted;
				if loan.register_installment()? && !was_defaulted {
					Self::remove_active_loan(portfolio_id, loan_id);
				}
				Loans::<T>::insert(portfolio_id, loan_id, loan);

				if portfolio.is_live() {
					portfolio.virtual_token_balance.ensure_add_assign(amount)?;
					payouts.push(Payout {
						from: who.clone(),
						to: Self::portfolio_account(portfolio_id),
						amount,
					});
				} else {
					Self::distribute(portfolio_id, portfolio, amount, &who, &mut payouts)?;
				}

				if was_defaulted || !portfolio.is_live() {
					Self::commit_checkpoints(portfolio_id, portfolio, now, &mut payouts)?;
				}

				Ok((portfolio.currency, payouts))
			})?;

			Self::execute_payouts(currency, payouts)?;

			Self::deposit_event(Event::LoanRepaid {
				portfolio_id,
				loan_id,
				amount,
			});

			Ok(())
		}

		/// Mark a loan whose installment is late beyond its grace period as
		/// defaulted. The loan stops contributing to the portfolio value.
		#[pallet::weight(T::WeightInfo::mark_loan_as_defaulted(T::MaxTranches::get(), T::MaxActiveLoans::get()))]
		#[transactional]
		#[pallet::call_index(10)]
		pub fn mark_loan_as_defaulted(
			origin: OriginFor<T>,
			portfolio_id: PortfolioId,
			loan_id: LoanId,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;

			let (currency, payouts) = Self::mutate_portfolio(portfolio_id, |portfolio| {
				Self::ensure_manager(portfolio, &who)?;
				Self::ensure_not_paused(portfolio)?;

				let mut loan = Self::get_loan(portfolio_id, loan_id)?;
				ensure!(
					loan.status == LoanStatus::Started,
					Error::<T>::LoanNotActive
				);

				let now = T::Time::now();
				ensure!(loan.is_overdue(now)?, Error::<T>::LoanNotOverdue);

				let mut payouts = Vec::new();
				Self::commit_checkpoints(portfolio_id, portfolio, now, &mut payouts)?;

				Self::remove_active_loan(portfolio_id, loan_id);
				loan.status = LoanStatus::Defaulted;
				Loans::<T>::insert(portfolio_id, loan_id, loan);

				Self::commit_checkpoints(portfolio_id, portfolio, now, &mut payouts)?;

				Ok((portfolio.currency, payouts))
			})?;

			Self::execute_payouts(currency, payouts)?;

			log::warn!(target: LOG_TARGET, "Loan {loan_id} of portfolio {portfolio_id} defaulted");
			Self::deposit_event(Event::LoanDefaulted {
				portfolio_id,
				loan_id,
			});

			Ok(())
		}

		/// Cancel a loan offer that was not funded yet.
		#[pallet::weight(T::WeightInfo::cancel_loan())]
		#[pallet::call_index(11)]
		pub fn cancel_loan(
			origin: OriginFor<T>,
			portfolio_id: PortfolioId,
			loan_id: LoanId,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			Self::ensure_manager(&Self::get_portfolio(portfolio_id)?, &who)?;

			Self::mutate_loan(portfolio_id, loan_id, |loan| {
				ensure!(
					matches!(loan.status, LoanStatus::Created | LoanStatus::Accepted),
					Error::<T>::InvalidLoanStatus
				);
				loan.status = LoanStatus::Canceled;
				Ok(())
			})?;

			Self::deposit_event(Event::LoanCanceled {
				portfolio_id,
				loan_id,
			});

			Ok(())
		}

		#[pallet::weight(T::WeightInfo::update_loan_grace_period())]
		#[pallet::call_index(12)]
		pub fn update_loan_grace_period(
			origin: OriginFor<T>,
			portfolio_id: PortfolioId,
			loan_id: LoanId,
			grace_period: Seconds,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			Self::ensure_manager(&Self::get_portfolio(portfolio_id)?, &who)?;

			Self::mutate_loan(portfolio_id, loan_id, |loan| {
				ensure!(
					loan.status == LoanStatus::Started,
					Error::<T>::LoanNotActive
				);
				loan.terms.grace_period = grace_period;
				Ok(())
			})?;

			Self::deposit_event(Event::LoanGracePeriodUpdated {
				portfolio_id,
				loan_id,
				grace_period,
			});

			Ok(())
		}

		#[pallet::weight(T::WeightInfo::set_tranche_min_subordinate_ratio(T::MaxTranches::get(), T::MaxActiveLoans::get()))]
		#[transactional]
		#[pallet::call_index(13)]
		pub fn set_tranche_min_subordinate_ratio(
			origin: OriginFor<T>,
			portfolio_id: PortfolioId,
			tranche: TrancheIndex,
			min_subordinate_ratio: BasisPoints,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;

			Self::mutate_portfolio(portfolio_id, |portfolio| {
				Self::ensure_manager(portfolio, &who)?;
				Self::ensure_tranche(portfolio, tranche)?;
				ensure!(tranche != EQUITY, Error::<T>::NonZeroEquityApy);
				ensure!(
					portfolio.status != PortfolioStatus::Closed,
					Error::<T>::PortfolioClosed
				);

				Self::tranche_mut(portfolio, tranche)?.min_subordinate_ratio =
					min_subordinate_ratio;

				if portfolio.is_live() {
					Self::ensure_ratios(portfolio_id, portfolio, T::Time::now())?;
				}

				Ok(())
			})?;

			Self::deposit_event(Event::TrancheRatioUpdated {
				portfolio_id,
				tranche,
				min_subordinate_ratio,
			});

			Ok(())
		}

		#[pallet::weight(T::WeightInfo::set_minimum_size())]
		#[pallet::call_index(14)]
		pub fn set_minimum_size(
			origin: OriginFor<T>,
			portfolio_id: PortfolioId,
			minimum_size: T::Balance,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;

			Self::mutate_portfolio(portfolio_id, |portfolio| {
				Self::ensure_manager(portfolio, &who)?;
				ensure!(
					portfolio.status == PortfolioStatus::CapitalFormation,
					Error::<T>::PortfolioNotInCapitalFormation
				);
				portfolio.parameters.minimum_size = minimum_size;
				Ok(())
			})?;

			Self::deposit_event(Event::MinimumSizeUpdated {
				portfolio_id,
				minimum_size,
			});

			Ok(())
		}

		/// Change the manager fee of a tranche. Fees accrued so far are
		/// committed at the old rate.
		#[pallet::weight(T::WeightInfo::set_manager_fee(T::MaxTranches::get(), T::MaxActiveLoans::get()))]
		#[transactional]
		#[pallet::call_index(15)]
		pub fn set_manager_fee(
			origin: OriginFor<T>,
			portfolio_id: PortfolioId,
			tranche: TrancheIndex,
			rate: BasisPoints,
			beneficiary: T::AccountId,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;

			let (currency, payouts) = Self::mutate_portfolio(portfolio_id, |portfolio| {
				Self::ensure_manager(portfolio, &who)?;
				Self::ensure_tranche(portfolio, tranche)?;
				ensure!(
					portfolio.status != PortfolioStatus::Closed,
					Error::<T>::PortfolioClosed
				);

				let mut payouts = Vec::new();
				if portfolio.is_live() {
					Self::commit_checkpoints(portfolio_id, portfolio, T::Time::now(), &mut payouts)?;
				}

				let tranche_details = Self::tranche_mut(portfolio, tranche)?;
				tranche_details.manager_fee.rate = rate;
				tranche_details.manager_fee.beneficiary = beneficiary.clone();

				Ok((portfolio.currency, payouts))
			})?;

			Self::execute_payouts(currency, payouts)?;

			Self::deposit_event(Event::ManagerFeeUpdated {
				portfolio_id,
				tranche,
				rate,
				beneficiary,
			});

			Ok(())
		}

		/// Pause or unpause a portfolio. A paused portfolio rejects lender
		/// flows, loan funding and repayment, checkpoint updates and status
		/// changes. Loan offers can still be accepted or canceled.
		#[pallet::weight(T::WeightInfo::set_paused())]
		#[pallet::call_index(16)]
		pub fn set_paused(
			origin: OriginFor<T>,
			portfolio_id: PortfolioId,
			paused: bool,
		) -> DispatchResult {
			T::PauseOrigin::ensure_origin(origin)?;

			Self::mutate_portfolio(portfolio_id, |portfolio| {
				portfolio.paused = paused;
				Ok(())
			})?;

			log::info!(target: LOG_TARGET, "Portfolio {portfolio_id} paused: {paused}");
			Self::deposit_event(Event::PauseUpdated {
				portfolio_id,
				paused,
			});

			Ok(())
		}
	}
}

impl<T: Config> Pallet<T> {
	pub fn portfolio_account(portfolio_id: PortfolioId) -> T::AccountId {
		PortfolioLocator { portfolio_id }.into_account_truncating()
	}

	pub fn tranche_account(portfolio_id: PortfolioId, tranche: TrancheIndex) -> T::AccountId {
		TrancheLocator {
			portfolio_id,
			tranche,
		}
		.into_account_truncating()
	}

	pub fn tranche_currency(portfolio_id: PortfolioId, tranche: TrancheIndex) -> T::CurrencyId {
		T::TrancheCurrency::generate(portfolio_id, tranche).into()
	}

	/// Tranche tokens carry the decimals of the portfolio currency. A token
	/// the registry already knows must agree on them.
	fn register_tranche_token(
		portfolio_id: PortfolioId,
		tranche: TrancheIndex,
		decimals: u32,
	) -> DispatchResult {
		let currency = Self::tranche_currency(portfolio_id, tranche);

		if let Some(metadata) = T::AssetRegistry::metadata(&currency) {
			ensure!(metadata.decimals == decimals, Error::<T>::DecimalsMismatch);
			return Ok(());
		}

		let metadata = AssetMetadata {
			decimals,
			name: Vec::new(),
			symbol: Vec::new(),
			existential_deposit: Zero::zero(),
			location: None,
			additional: T::CustomMetadata::default(),
		};

		T::AssetRegistry::register_asset(Some(currency), metadata)
			.map_err(|_| Error::<T>::FailedToRegisterTrancheMetadata.into())
	}

	pub(crate) fn get_portfolio(
		portfolio_id: PortfolioId,
	) -> Result<PortfolioDetailsOf<T>, DispatchError> {
		Portfolios::<T>::get(portfolio_id).ok_or_else(|| Error::<T>::PortfolioNotFound.into())
	}

	fn get_loan(portfolio_id: PortfolioId, loan_id: LoanId) -> Result<LoanOf<T>, DispatchError> {
		Loans::<T>::get(portfolio_id, loan_id).ok_or_else(|| Error::<T>::LoanNotFound.into())
	}

	fn mutate_portfolio<R>(
		portfolio_id: PortfolioId,
		f: impl FnOnce(&mut PortfolioDetailsOf<T>) -> Result<R, DispatchError>,
	) -> Result<R, DispatchError> {
		Portfolios::<T>::try_mutate(portfolio_id, |maybe_portfolio| {
			let portfolio = maybe_portfolio
				.as_mut()
				.ok_or(Error::<T>::PortfolioNotFound)?;
			f(portfolio)
		})
	}

	fn mutate_loan(
		portfolio_id: PortfolioId,
		loan_id: LoanId,
		f: impl FnOnce(&mut LoanOf<T>) -> DispatchResult,
	) -> DispatchResult {
		Loans::<T>::try_mutate(portfolio_id, loan_id, |maybe_loan| {
			let loan = maybe_loan.as_mut().ok_or(Error::<T>::LoanNotFound)?;
			f(loan)
		})
	}

	fn ensure_manager(portfolio: &PortfolioDetailsOf<T>, who: &T::AccountId) -> DispatchResult {
		ensure!(portfolio.manager == *who, Error::<T>::NotManager);
		Ok(())
	}

	fn ensure_not_paused(portfolio: &PortfolioDetailsOf<T>) -> DispatchResult {
		ensure!(!portfolio.paused, Error::<T>::PortfolioPaused);
		Ok(())
	}

	fn ensure_tranche(portfolio: &PortfolioDetailsOf<T>, tranche: TrancheIndex) -> DispatchResult {
		ensure!(
			portfolio.tranches.get_tranche(tranche).is_some(),
			Error::<T>::InvalidTrancheIndex
		);
		Ok(())
	}

	fn tranche_mut(
		portfolio: &mut PortfolioDetailsOf<T>,
		tranche: TrancheIndex,
	) -> Result<&mut Tranche<T::AccountId, T::Balance>, DispatchError> {
		portfolio
			.tranches
			.get_mut_tranche(tranche)
			.ok_or_else(|| Error::<T>::InvalidTrancheIndex.into())
	}

	fn remove_active_loan(portfolio_id: PortfolioId, loan_id: LoanId) {
		ActiveLoans::<T>::mutate(portfolio_id, |active| {
			if let Some(position) = active.iter().position(|id| *id == loan_id) {
				active.swap_remove(position);
			}
		});
	}

	/// Value of the started loans of a portfolio at `now`.
	pub fn loans_value(portfolio_id: PortfolioId, now: Seconds) -> Result<T::Balance, DispatchError> {
		loans::total_value(
			ActiveLoans::<T>::get(portfolio_id)
				.into_iter()
				.filter_map(|loan_id| Loans::<T>::get(portfolio_id, loan_id)),
			now,
		)
	}

	/// Loans only count towards the portfolio value while it is live.
	fn live_loans_value(
		portfolio_id: PortfolioId,
		portfolio: &PortfolioDetailsOf<T>,
		now: Seconds,
	) -> Result<T::Balance, DispatchError> {
		if portfolio.is_live() {
			Self::loans_value(portfolio_id, now)
		} else {
			Ok(Zero::zero())
		}
	}

	fn allocations(
		portfolio_id: PortfolioId,
		portfolio: &PortfolioDetailsOf<T>,
		now: Seconds,
	) -> Result<Vec<Allocation<T::Balance>>, DispatchError> {
		portfolio.waterfall(Self::live_loans_value(portfolio_id, portfolio, now)?, now)
	}

	/// Value of the whole portfolio, which the waterfall splits among the
	/// tranches.
	pub fn total_assets(portfolio_id: PortfolioId) -> Result<T::Balance, DispatchError> {
		let portfolio = Self::get_portfolio(portfolio_id)?;
		portfolio.total_assets(Self::live_loans_value(
			portfolio_id,
			&portfolio,
			T::Time::now(),
		)?)
	}

	/// Pooled liquidity of a live portfolio that is not owed as fees.
	pub fn liquid_assets(portfolio_id: PortfolioId) -> Result<T::Balance, DispatchError> {
		Self::get_portfolio(portfolio_id)?.liquid_assets()
	}

	fn waterfall_values(
		portfolio_id: PortfolioId,
		portfolio: &PortfolioDetailsOf<T>,
		now: Seconds,
	) -> Result<Vec<T::Balance>, DispatchError> {
		Ok(Self::allocations(portfolio_id, portfolio, now)?
			.into_iter()
			.map(|allocation| allocation.value)
			.collect())
	}

	fn tranche_value(
		portfolio_id: PortfolioId,
		portfolio: &PortfolioDetailsOf<T>,
		tranche: TrancheIndex,
		now: Seconds,
	) -> Result<T::Balance, DispatchError> {
		Self::waterfall_values(portfolio_id, portfolio, now)?
			.get(tranche as usize)
			.copied()
			.ok_or_else(|| Error::<T>::InvalidTrancheIndex.into())
	}

	/// Current value of every tranche, ordered junior to senior.
	pub fn calculate_waterfall(portfolio_id: PortfolioId) -> Result<Vec<T::Balance>, DispatchError> {
		let portfolio = Self::get_portfolio(portfolio_id)?;
		Self::waterfall_values(portfolio_id, &portfolio, T::Time::now())
	}

	/// Current value of a single tranche.
	pub fn calculate_waterfall_for_tranche(
		portfolio_id: PortfolioId,
		tranche: TrancheIndex,
	) -> Result<T::Balance, DispatchError> {
		let portfolio = Self::get_portfolio(portfolio_id)?;
		Self::ensure_tranche(&portfolio, tranche)?;
		Self::tranche_value(portfolio_id, &portfolio, tranche, T::Time::now())
	}

	fn ensure_ratios(
		portfolio_id: PortfolioId,
		portfolio: &PortfolioDetailsOf<T>,
		now: Seconds,
	) -> DispatchResult {
		let values = Self::waterfall_values(portfolio_id, portfolio, now)?;
		ensure!(
			ratios_hold(&portfolio.tranches.tranches, &values)?,
			Error::<T>::TrancheRatioNotMet
		);
		Ok(())
	}

	/// Shares matching `amount` at the current share price of the tranche.
	/// The first deposit into an empty tranche is converted one to one.
	fn shares_for(
		portfolio_id: PortfolioId,
		tranche: TrancheIndex,
		amount: T::Balance,
		tranche_assets: T::Balance,
		rounding: Rounding,
	) -> Result<T::Balance, DispatchError> {
		let supply = T::Tokens::total_issuance(Self::tranche_currency(portfolio_id, tranche));

		if supply.is_zero() || tranche_assets.is_zero() {
			return match rounding {
				Rounding::Down => Ok(amount),
				_ => Err(Error::<T>::InsufficientShares.into()),
			};
		}

		let supply: u128 = supply.try_into().map_err(|_| ArithmeticError::Overflow)?;
		let tranche_assets: u128 = tranche_assets
			.try_into()
			.map_err(|_| ArithmeticError::Overflow)?;

		mul_div(amount, supply, tranche_assets, rounding)
	}

	/// Signed change between two values of a tranche.
	pub fn value_change(from: T::Balance, to: T::Balance) -> Result<IBalance, DispatchError> {
		if to >= from {
			Self::to_signed(to - from)
		} else {
			Self::checked_negate(Self::to_signed(from - to)?)
		}
	}

	fn to_signed(value: T::Balance) -> Result<IBalance, DispatchError> {
		let value: u128 = value
			.try_into()
			.map_err(|_| Error::<T>::ArithmeticBound)?;
		IBalance::try_from(value).map_err(|_| Error::<T>::ArithmeticBound.into())
	}

	pub fn checked_negate(value: IBalance) -> Result<IBalance, DispatchError> {
		value
			.checked_neg()
			.ok_or_else(|| Error::<T>::ArithmeticBound.into())
	}

	/// Commits a checkpoint for every tranche.
	///
	/// Unpaid fees are settled from the available cash first. The waterfall
	/// is then computed and every tranche charges the fees accrued since its
	/// last checkpoint. Fee transfers are queued into `payouts`.
	pub(crate) fn commit_checkpoints(
		portfolio_id: PortfolioId,
		portfolio: &mut PortfolioDetailsOf<T>,
		now: Seconds,
		payouts: &mut Vec<PayoutOf<T>>,
	) -> DispatchResult {
		let phase = match portfolio.status {
			PortfolioStatus::CapitalFormation => Err(Error::<T>::NoCheckpointsBeforeStart)?,
			PortfolioStatus::Live => Phase::Live,
			PortfolioStatus::Closed => Phase::Closed,
		};

		let portfolio_account = Self::portfolio_account(portfolio_id);
		let protocol_fee_rate = T::ProtocolFee::effective_fee_rate(&portfolio_account);

		let mut pooled_cash = portfolio.virtual_token_balance;
		let mut settled = Vec::with_capacity(portfolio.tranches.num_tranches());
		for tranche in portfolio.tranches.tranches.iter_mut() {
			let cash = match phase {
				Phase::Live => &mut pooled_cash,
				Phase::Closed => &mut tranche.reserve,
			};
			settled.push(tranche.unpaid_fees.settle_from(cash)?);
		}
		portfolio.virtual_token_balance = pooled_cash;

		let allocations = Self::allocations(portfolio_id, portfolio, now)?;

		let mut fees_paid = Vec::with_capacity(allocations.len());
		for (index, (tranche, allocation)) in portfolio
			.tranches
			.tranches
			.iter_mut()
			.zip(allocations)
			.enumerate()
		{
			let index = index as TrancheIndex;
			let previous = tranche.checkpoint.total_assets;

			let mut reserve = tranche.reserve;
			let cash = match phase {
				Phase::Live => &mut pooled_cash,
				Phase::Closed => &mut reserve,
			};
			let commit = tranche.commit_checkpoint(
				allocation,
				index == EQUITY,
				phase,
				cash,
				now,
				protocol_fee_rate,
			)?;
			tranche.reserve = reserve;

			if !commit.waived.is_zero() {
				log::warn!(
					target: LOG_TARGET,
					"Portfolio {portfolio_id} tranche {index}: {:?} of accrued fees exceed the tranche value",
					commit.waived
				);
			}

			Self::deposit_event(Event::CheckpointUpdated {
				portfolio_id,
				tranche: index,
				total_assets: tranche.checkpoint.total_assets,
				deficit: tranche.deficit,
				value_change: Self::value_change(previous, tranche.checkpoint.total_assets)?,
			});

			fees_paid.push((index, tranche.manager_fee.beneficiary.clone(), commit.paid));
		}
		portfolio.virtual_token_balance = pooled_cash;

		let treasury = T::ProtocolFee::treasury();
		for ((index, beneficiary, paid), settled) in fees_paid.into_iter().zip(settled) {
			let source = match phase {
				Phase::Live => portfolio_account.clone(),
				Phase::Closed => Self::tranche_account(portfolio_id, index),
			};

			Self::pay_fees(
				portfolio_id,
				index,
				&source,
				&treasury,
				&beneficiary,
				paid.protocol.ensure_add(settled.protocol)?,
				paid.manager.ensure_add(settled.manager)?,
				payouts,
			);
		}

		log::debug!(
			target: LOG_TARGET,
			"Portfolio {portfolio_id} checkpoints committed at {now}"
		);

		Ok(())
	}

	/// Splits `amount` coming from `from` over the tranche reserves of a
	/// closed portfolio, senior first.
	fn distribute(
		portfolio_id: PortfolioId,
		portfolio: &mut PortfolioDetailsOf<T>,
		amount: T::Balance,
		from: &T::AccountId,
		payouts: &mut Vec<PayoutOf<T>>,
	) -> DispatchResult {
		let treasury = T::ProtocolFee::treasury();

		for distribution in portfolio.tranches.distribute(amount)? {
			let beneficiary = portfolio
				.tranches
				.get_tranche(distribution.tranche)
				.map(|tranche| tranche.manager_fee.beneficiary.clone())
				.ok_or(Error::<T>::InvalidTrancheIndex)?;

			Self::pay_fees(
				portfolio_id,
				distribution.tranche,
				from,
				&treasury,
				&beneficiary,
				distribution.fees.protocol,
				distribution.fees.manager,
				payouts,
			);

			payouts.push(Payout {
				from: from.clone(),
				to: Self::tranche_account(portfolio_id, distribution.tranche),
				amount: distribution.assets,
			});
		}

		Ok(())
	}

	#[allow(clippy::too_many_arguments)]
	fn pay_fees(
		portfolio_id: PortfolioId,
		tranche: TrancheIndex,
		source: &T::AccountId,
		treasury: &T::AccountId,
		beneficiary: &T::AccountId,
		protocol_fee: T::Balance,
		manager_fee: T::Balance,
		payouts: &mut Vec<PayoutOf<T>>,
	) {
		if !protocol_fee.is_zero() {
			payouts.push(Payout {
				from: source.clone(),
				to: treasury.clone(),
				amount: protocol_fee,
			});
			Self::deposit_event(Event::ProtocolFeePaid {
				portfolio_id,
				tranche,
				treasury: treasury.clone(),
				amount: protocol_fee,
			});
		}

		if !manager_fee.is_zero() {
			payouts.push(Payout {
				from: source.clone(),
				to: beneficiary.clone(),
				amount: manager_fee,
			});
			Self::deposit_event(Event::ManagerFeePaid {
				portfolio_id,
				tranche,
				beneficiary: beneficiary.clone(),
				amount: manager_fee,
			});
		}
	}

	/// Executes the queued transfers. Called once every storage change of
	/// the operation is done.
	fn execute_payouts(currency: T::CurrencyId, payouts: Vec<PayoutOf<T>>) -> DispatchResult {
		for payout in payouts {
			if payout.amount.is_zero() || payout.from == payout.to {
				continue;
			}

			T::Tokens::transfer(
				currency,
				&payout.from,
				&payout.to,
				payout.amount,
				Preservation::Expendable,
			)?;
		}

		Ok(())
	}
}
