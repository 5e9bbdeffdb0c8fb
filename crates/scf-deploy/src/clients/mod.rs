//! Remote client implementations
//!
//! Concrete [`scf_deploy_sdk::ObjectStorage`] and
//! [`scf_deploy_sdk::FunctionPlatform`] adapters used by the binary.

pub mod cos;
pub mod platform;

pub use cos::CosStorage;
pub use platform::HttpPlatform;
