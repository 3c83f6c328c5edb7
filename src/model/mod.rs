pub mod asset;
pub mod audit;
pub mod common;
pub mod custom_metadata;
pub mod lineage;
pub mod mutation;
pub mod search;
pub mod updater;
pub mod user_context;
pub mod wire;

pub use asset::*;
pub use audit::*;
pub use common::*;
pub use custom_metadata::*;
pub use lineage::*;
pub use mutation::*;
pub use search::*;
pub use updater::*;
pub use user_context::*;
pub use wire::*;
