//! Compute-platform control plane over HTTP
//!
//! Each call posts a JSON parameter object to the configured endpoint, naming
//! the action in the `X-TC-Action` header. Responses use the platform's
//! envelope:
//!
//! ```json
//! {"Response": {"Error": {"Code": "ResourceInUse.Function", "Message": "..."}, "RequestId": "..."}}
//! ```
//!
//! Requests are not signed; the endpoint is expected to be a gateway that
//! adds credentials.

use std::time::Duration;

use base64::Engine;
use scf_deploy_sdk::resource::{FunctionSpec, COS_BUCKET_NAME, COS_OBJECT_NAME, LOCAL_ZIP_FILE};
use scf_deploy_sdk::{ArtifactReference, ClientError, ClientFuture, FunctionPlatform, TriggerSpec};
use serde_json::{json, Map, Value};

use crate::config::AppConfig;
use crate::error::{Error, Result};

const API_VERSION: &str = "2018-04-16";

/// Artifact attributes, sent as `Code` rather than configuration
const NON_CONFIG_KEYS: &[&str] = &[COS_BUCKET_NAME, COS_OBJECT_NAME, LOCAL_ZIP_FILE];

/// Function and trigger upserts against the control plane
pub struct HttpPlatform {
    client: reqwest::Client,
    endpoint: String,
    region: String,
}

impl HttpPlatform {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        if config.uses_default_api_endpoint() {
            tracing::warn!(
                "Requests to {} are unsigned and will be rejected; set SCF_API_ENDPOINT to a signing gateway",
                config.api_endpoint
            );
        }

        Ok(Self {
            client,
            endpoint: config.api_endpoint.clone(),
            region: config.region.clone(),
        })
    }

    async fn call(&self, action: &str, params: Map<String, Value>) -> std::result::Result<Value, ClientError> {
        tracing::debug!("{} -> {}", action, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-TC-Action", action)
            .header("X-TC-Region", &self.region)
            .header("X-TC-Version", API_VERSION)
            .json(&params)
            .send()
            .await
            .map_err(|e| ClientError::new(format!("{} request failed: {}", action, e)))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| ClientError::new(format!("{} returned an unreadable response ({}): {}", action, status, e)))?;

        parse_response(status.as_u16(), payload)
    }

    async fn deploy_function(
        &self,
        spec: &FunctionSpec,
        name: &str,
        namespace: &str,
        forced: bool,
    ) -> std::result::Result<(), ClientError> {
        let code = code_params(spec).await?;

        let mut create = config_params(spec, name, namespace);
        create.insert("Code".to_string(), Value::Object(code.clone()));

        let err = match self.call("CreateFunction", create).await {
            Ok(_) => return Ok(()),
            Err(err) if err.is_resource_in_use() => err,
            Err(err) => return Err(err),
        };

        if !forced {
            let mut exists = ClientError::new(format!(
                "Function '{}' already exists in namespace '{}', use --forced to overwrite it",
                name, namespace
            ));
            exists.code = err.code;
            exists.request_id = err.request_id;
            return Err(exists);
        }

        let mut update_code = identity_params(name, namespace);
        if let Some(handler) = spec.properties.attribute("Handler") {
            update_code.insert("Handler".to_string(), handler.clone());
        }
        update_code.extend(code);
        self.call("UpdateFunctionCode", update_code).await?;

        self.call("UpdateFunctionConfiguration", config_params(spec, name, namespace))
            .await?;
        Ok(())
    }

    async fn deploy_trigger(
        &self,
        trigger: &TriggerSpec,
        trigger_name: &str,
        function_name: &str,
        namespace: &str,
    ) -> std::result::Result<(), ClientError> {
        let params = trigger_params(trigger, trigger_name, function_name, namespace)?;

        match self.call("CreateTrigger", params.clone()).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_resource_in_use() => {
                let mut delete = identity_params(function_name, namespace);
                delete.insert("TriggerName".to_string(), json!(trigger_name));
                delete.insert("Type".to_string(), params["Type"].clone());
                self.call("DeleteTrigger", delete).await?;
                self.call("CreateTrigger", params).await?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

impl FunctionPlatform for HttpPlatform {
    fn upsert_function<'a>(
        &'a self,
        spec: &'a FunctionSpec,
        name: &'a str,
        namespace: &'a str,
        forced: bool,
    ) -> ClientFuture<'a, ()> {
        Box::pin(self.deploy_function(spec, name, namespace, forced))
    }

    fn upsert_trigger<'a>(
        &'a self,
        trigger: &'a TriggerSpec,
        trigger_name: &'a str,
        function_name: &'a str,
        namespace: &'a str,
    ) -> ClientFuture<'a, ()> {
        Box::pin(self.deploy_trigger(trigger, trigger_name, function_name, namespace))
    }
}

fn parse_response(status: u16, payload: Value) -> std::result::Result<Value, ClientError> {
    let response = match payload {
        Value::Object(mut map) if map.contains_key("Response") => map.remove("Response").unwrap_or_default(),
        other => other,
    };

    let request_id = response
        .get("RequestId")
        .and_then(Value::as_str)
        .map(str::to_string);

    if let Some(error) = response.get("Error") {
        let message = error
            .get("Message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        let mut err = ClientError::new(message);
        err.code = error.get("Code").and_then(Value::as_str).map(str::to_string);
        err.request_id = request_id;
        return Err(err);
    }

    if !(200..300).contains(&status) {
        let mut err = ClientError::new(format!("HTTP {}", status)).with_code(status.to_string());
        err.request_id = request_id;
        return Err(err);
    }

    Ok(response)
}

fn identity_params(name: &str, namespace: &str) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("FunctionName".to_string(), json!(name));
    params.insert("Namespace".to_string(), json!(namespace));
    params
}

/// Declared configuration, with `Environment` converted to the API's
/// `{Variables: [{Key, Value}]}` list form
fn config_params(spec: &FunctionSpec, name: &str, namespace: &str) -> Map<String, Value> {
    let mut params = identity_params(name, namespace);
    for (key, value) in spec.properties.attributes() {
        if NON_CONFIG_KEYS.contains(&key) {
            continue;
        }
        let value = match (key, value) {
            ("Environment", Value::Object(env)) => environment_param(env),
            _ => value.clone(),
        };
        params.insert(key.to_string(), value);
    }
    params
}

fn environment_param(env: &Map<String, Value>) -> Value {
    let Some(Value::Object(vars)) = env.get("Variables") else {
        return Value::Object(env.clone());
    };
    let variables: Vec<Value> = vars
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            json!({ "Key": key, "Value": value })
        })
        .collect();
    json!({ "Variables": variables })
}

async fn code_params(spec: &FunctionSpec) -> std::result::Result<Map<String, Value>, ClientError> {
    let mut code = Map::new();
    match spec.properties.artifact() {
        Some(ArtifactReference::Remote { bucket, object_key }) => {
            code.insert("CosBucketName".to_string(), json!(bucket));
            code.insert("CosObjectName".to_string(), json!(object_key));
        }
        Some(ArtifactReference::Local { path }) => {
            let bytes = tokio::fs::read(&path).await.map_err(|e| {
                ClientError::new(format!("failed to read archive {}: {}", path.display(), e))
            })?;
            let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
            code.insert("ZipFile".to_string(), json!(encoded));
        }
        None => return Err(ClientError::new("function has no packaged code")),
    }
    Ok(code)
}

fn trigger_params(
    trigger: &TriggerSpec,
    trigger_name: &str,
    function_name: &str,
    namespace: &str,
) -> std::result::Result<Map<String, Value>, ClientError> {
    let kind = trigger
        .kind()
        .ok_or_else(|| ClientError::new(format!("trigger '{}' has no Type", trigger_name)))?
        .to_lowercase();
    let properties = trigger.properties().cloned().unwrap_or_default();

    let desc = match (kind.as_str(), properties.get("CronExpression")) {
        ("timer", Some(Value::String(cron))) => cron.clone(),
        _ => Value::Object(properties.clone()).to_string(),
    };
    let enable = match properties.get("Enable") {
        Some(Value::Bool(false)) => "CLOSE",
        _ => "OPEN",
    };

    let mut params = identity_params(function_name, namespace);
    params.insert("TriggerName".to_string(), json!(trigger_name));
    params.insert("Type".to_string(), json!(kind));
    params.insert("TriggerDesc".to_string(), json!(desc));
    params.insert("Enable".to_string(), json!(enable));
    Ok(params)
}
