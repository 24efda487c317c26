pub mod manifest_flow;

pub use manifest_flow::{resolve, ManifestFlow};
