//! In-memory clients for tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use scf_deploy_sdk::resource::{FunctionProperties, FunctionSpec};
use scf_deploy_sdk::{ClientError, ClientFuture, FunctionPlatform, ObjectStorage, TriggerSpec};
use serde_json::{json, Map, Value};

use crate::template::FUNCTION_TYPE;

pub fn function(code_uri: &str) -> FunctionSpec {
    let mut spec = FunctionSpec::new(
        FunctionProperties::new(code_uri).with_attribute("Handler", json!("index.main")),
    );
    spec.kind = Some(FUNCTION_TYPE.to_string());
    spec
}

pub fn trigger(kind: &str) -> TriggerSpec {
    let mut config = Map::new();
    config.insert("Type".into(), Value::String(kind.to_string()));
    config.insert("Properties".into(), json!({ "Enable": true }));
    TriggerSpec::new(config)
}

/// Records uploads; optionally rejects all of them
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<Vec<(String, String, usize)>>,
    failure: Option<String>,
}

impl MemoryStorage {
    pub fn failing(message: &str) -> Self {
        Self {
            objects: Mutex::default(),
            failure: Some(message.to_string()),
        }
    }

    /// `(bucket, key, size)` per upload
    pub fn objects(&self) -> Vec<(String, String, usize)> {
        self.objects.lock().unwrap().clone()
    }
}

impl ObjectStorage for MemoryStorage {
    fn upload<'a>(&'a self, bucket: &'a str, key: &'a str, data: Bytes) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            if let Some(message) = &self.failure {
                return Err(ClientError::new(message.clone()));
            }
            self.objects
                .lock()
                .unwrap()
                .push((bucket.to_string(), key.to_string(), data.len()));
            Ok(())
        })
    }
}

#[derive(Debug, Clone)]
pub enum Call {
    Function {
        namespace: String,
        name: String,
        forced: bool,
        spec: FunctionSpec,
    },
    Trigger {
        namespace: String,
        function: String,
        trigger: String,
    },
}

impl Call {
    pub fn namespace(&self) -> &str {
        match self {
            Call::Function { namespace, .. } | Call::Trigger { namespace, .. } => namespace,
        }
    }
}

/// Platform double that fails the configured functions and triggers
#[derive(Default)]
pub struct ScriptedPlatform {
    calls: Mutex<Vec<Call>>,
    failing_functions: HashSet<String>,
    failing_triggers: HashSet<(String, String)>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedPlatform {
    pub fn fail_function(mut self, name: &str) -> Self {
        self.failing_functions.insert(name.to_string());
        self
    }

    pub fn fail_trigger(mut self, function: &str, trigger: &str) -> Self {
        self.failing_triggers
            .insert((function.to_string(), trigger.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// `(function, trigger)` per trigger call
    pub fn trigger_calls(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Trigger { function, trigger, .. } => Some((function, trigger)),
                Call::Function { .. } => None,
            })
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FunctionPlatform for ScriptedPlatform {
    fn upsert_function<'a>(
        &'a self,
        spec: &'a FunctionSpec,
        name: &'a str,
        namespace: &'a str,
        forced: bool,
    ) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            self.enter(Call::Function {
                namespace: namespace.to_string(),
                name: name.to_string(),
                forced,
                spec: spec.clone(),
            })
            .await;

            if self.failing_functions.contains(name) {
                return Err(ClientError::new(format!("function {} rejected", name))
                    .with_code("InvalidParameterValue")
                    .with_request_id(format!("req-{}", name)));
            }
            Ok(())
        })
    }

    fn upsert_trigger<'a>(
        &'a self,
        _trigger: &'a TriggerSpec,
        trigger_name: &'a str,
        function_name: &'a str,
        namespace: &'a str,
    ) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            self.enter(Call::Trigger {
                namespace: namespace.to_string(),
                function: function_name.to_string(),
                trigger: trigger_name.to_string(),
            })
            .await;

            let key = (function_name.to_string(), trigger_name.to_string());
            if self.failing_triggers.contains(&key) {
                return Err(ClientError::new(format!("trigger {} rejected", trigger_name))
                    .with_request_id(format!("req-{}", trigger_name)));
            }
            Ok(())
        })
    }
}
