//! scf-deploy SDK - Resource model and client contracts
//!
//! This crate provides the types that describe a deployable resource tree
//! (namespaces, functions, triggers) and the traits that remote clients
//! implement so the orchestrator can drive them.

pub mod error;
pub mod resource;
pub mod services;

pub mod prelude {
    //! Common imports for client implementations
    pub use crate::error::ClientError;
    pub use crate::resource::{
        ArtifactReference, FunctionProperties, FunctionSpec, NamespaceEntry, ResourceTree,
        TriggerSpec,
    };
    pub use crate::services::{ClientFuture, FunctionPlatform, ObjectStorage};
}

// Re-export key types at crate root
pub use error::ClientError;
pub use resource::{ArtifactReference, FunctionSpec, ResourceTree, TriggerSpec};
pub use services::{ClientFuture, FunctionPlatform, ObjectStorage};
