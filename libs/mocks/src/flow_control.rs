#[frame_support::pallet]
pub mod pallet {
	use cfg_primitives::TrancheIndex;
	use cfg_traits::portfolio::FlowControl;
	use frame_support::pallet_prelude::*;
	use mock_builder::{execute_call, register_call};

	#[pallet::config]
	pub trait Config: frame_system::Config {
		type PortfolioId: Parameter + Member + Copy + MaxEncodedLen;
		type Balance: Parameter + Member + Copy;
	}

	#[pallet::pallet]
	#[pallet::generate_store(pub(super) trait Store)]
	pub struct Pallet<T>(_);

	#[pallet::storage]
	pub(super) type CallIds<T: Config> = StorageMap<
		_,
		Blake2_128Concat,
		<Blake2_128 as frame_support::StorageHasher>::Output,
		mock_builder::CallId,
	>;

	impl<T: Config> Pallet<T> {
		pub fn mock_max_deposit(
			f: impl Fn(T::PortfolioId, TrancheIndex, &T::AccountId) -> T::Balance + 'static,
		) {
			register_call!(move |(a, b, c): (T::PortfolioId, TrancheIndex, T::AccountId)| f(a, b, &c));
		}

		pub fn mock_max_withdraw(
			f: impl Fn(T::PortfolioId, TrancheIndex, &T::AccountId) -> T::Balance + 'static,
		) {
			register_call!(move |(a, b, c): (T::PortfolioId, TrancheIndex, T::AccountId)| f(a, b, &c));
		}
	}

	impl<T: Config> FlowControl<T::AccountId> for Pallet<T> {
		type Balance = T::Balance;
		type PortfolioId = T::PortfolioId;

		fn max_deposit(a: Self::PortfolioId, b: TrancheIndex, c: &T::AccountId) -> T::Balance {
			execute_call!((a, b, c.clone()))
		}

		fn max_withdraw(a: Self::PortfolioId, b: TrancheIndex, c: &T::AccountId) -> T::Balance {
			execute_call!((a, b, c.clone()))
		}
	}
}
