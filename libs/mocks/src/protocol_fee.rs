#[frame_support::pallet]
pub mod pallet {
	use cfg_primitives::BasisPoints;
	use cfg_traits::portfolio::ProtocolFee;
	use frame_support::pallet_prelude::*;
	use mock_builder::{execute_call, register_call};

	#[pallet::config]
	pub trait Config: frame_system::Config {}

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
		pub fn mock_effective_fee_rate(f: impl Fn(&T::AccountId) -> BasisPoints + 'static) {
			register_call!(move |a: T::AccountId| f(&a));
		}

		pub fn mock_treasury(f: impl Fn() -> T::AccountId + 'static) {
			register_call!(move |()| f());
		}
	}

	impl<T: Config> ProtocolFee<T::AccountId> for Pallet<T> {
		fn effective_fee_rate(a: &T::AccountId) -> BasisPoints {
			execute_call!(a.clone())
		}

		fn treasury() -> T::AccountId {
			execute_call!(())
		}
	}
}
