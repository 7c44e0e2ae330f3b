#[frame_support::pallet]
pub mod pallet {
	use cfg_primitives::TrancheIndex;
	use cfg_traits::portfolio::LenderEligibility;
	use frame_support::pallet_prelude::*;
	use mock_builder::{execute_call, register_call};

	#[pallet::config]
	pub trait Config: frame_system::Config {
		type PortfolioId: Parameter + Member + Copy + MaxEncodedLen;
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
		pub fn mock_is_allowed(
			f: impl Fn(T::PortfolioId, TrancheIndex, &T::AccountId) -> bool + 'static,
		) {
			register_call!(move |(a, b, c): (T::PortfolioId, TrancheIndex, T::AccountId)| f(a, b, &c));
		}
	}

	impl<T: Config> LenderEligibility<T::AccountId> for Pallet<T> {
		type PortfolioId = T::PortfolioId;

		fn is_allowed(a: Self::PortfolioId, b: TrancheIndex, c: &T::AccountId) -> bool {
			execute_call!((a, b, c.clone()))
		}
	}
}
