pub mod asset_filter;
pub mod lineage;

pub use asset_filter::AssetFilterEvaluator;
pub use lineage::LineageWalker;
