//! Remote client traits
//!
//! The orchestrator talks to object storage and to the compute platform only
//! through these traits. Implementations must be `Send + Sync` so a single
//! client can serve concurrent function deploys.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::error::ClientError;
use crate::resource::{FunctionSpec, TriggerSpec};

/// Boxed future returned by client calls
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send + 'a>>;

/// Object storage used to stage function archives
pub trait ObjectStorage: Send + Sync {
    /// Upload `data` under `key` in `bucket`
    fn upload<'a>(&'a self, bucket: &'a str, key: &'a str, data: Bytes) -> ClientFuture<'a, ()>;
}

/// Remote compute-platform control plane
pub trait FunctionPlatform: Send + Sync {
    /// Create or (when `forced`) overwrite a function
    fn upsert_function<'a>(
        &'a self,
        spec: &'a FunctionSpec,
        name: &'a str,
        namespace: &'a str,
        forced: bool,
    ) -> ClientFuture<'a, ()>;

    /// Create or replace one trigger of an already deployed function
    fn upsert_trigger<'a>(
        &'a self,
        trigger: &'a TriggerSpec,
        trigger_name: &'a str,
        function_name: &'a str,
        namespace: &'a str,
    ) -> ClientFuture<'a, ()>;
}
