#[frame_support::pallet]
pub mod pallet {
	use frame_support::pallet_prelude::*;
	use mock_builder::{execute_call, register_call};
	use orml_traits::asset_registry::{AssetMetadata, Inspect, Mutate};
	use xcm::{v3::prelude::MultiLocation, VersionedMultiLocation};

	type MetadataOf<T> = AssetMetadata<<T as Config>::Balance, <T as Config>::CustomMetadata>;

	#[pallet::config]
	pub trait Config: frame_system::Config {
		type AssetId: Parameter;
		type Balance: Parameter;
		type CustomMetadata: Parameter + Member + TypeInfo;
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
		pub fn mock_metadata(f: impl Fn(&T::AssetId) -> Option<MetadataOf<T>> + 'static) {
			register_call!(move |a: T::AssetId| f(&a));
		}

		pub fn mock_register_asset(
			f: impl Fn(Option<T::AssetId>, MetadataOf<T>) -> DispatchResult + 'static,
		) {
			register_call!(move |(a, b)| f(a, b));
		}
	}

	impl<T: Config> Inspect for Pallet<T> {
		type AssetId = T::AssetId;
		type Balance = T::Balance;
		type CustomMetadata = T::CustomMetadata;

		fn asset_id(_: &MultiLocation) -> Option<Self::AssetId> {
			None
		}

		fn metadata(a: &Self::AssetId) -> Option<MetadataOf<T>> {
			execute_call!(a.clone())
		}

		fn metadata_by_location(_: &MultiLocation) -> Option<MetadataOf<T>> {
			None
		}

		fn location(_: &Self::AssetId) -> Result<Option<MultiLocation>, DispatchError> {
			Ok(None)
		}
	}

	impl<T: Config> Mutate for Pallet<T> {
		fn register_asset(a: Option<Self::AssetId>, b: MetadataOf<T>) -> DispatchResult {
			execute_call!((a, b))
		}

		fn update_asset(
			_: Self::AssetId,
			_: Option<u32>,
			_: Option<Vec<u8>>,
			_: Option<Vec<u8>>,
			_: Option<Self::Balance>,
			_: Option<Option<VersionedMultiLocation>>,
			_: Option<Self::CustomMetadata>,
		) -> DispatchResult {
			Err(DispatchError::Other("tranche tokens are never updated"))
		}
	}
}
