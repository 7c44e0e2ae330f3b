pub mod asset_registry;
pub mod flow_control;
pub mod lender_eligibility;
pub mod protocol_fee;

pub use asset_registry::pallet as pallet_mock_asset_registry;
pub use flow_control::pallet as pallet_mock_flow_control;
pub use lender_eligibility::pallet as pallet_mock_lender_eligibility;
pub use protocol_fee::pallet as pallet_mock_protocol_fee;
