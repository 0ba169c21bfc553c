pub mod assets;
pub mod client;
pub mod copier;

pub use assets::{AssetPages, AssetResponse};
pub use client::{NexusClient, USER_AGENT};
pub use copier::StreamCopier;
