//! COS object storage over the S3-compatible API

use bytes::Bytes;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use scf_deploy_sdk::{ClientError, ClientFuture, ObjectStorage};

use crate::config::AppConfig;
use crate::error::{Error, Result};

/// Uploads function archives to COS
pub struct CosStorage {
    region: Region,
    credentials: Credentials,
    appid: Option<String>,
}

impl CosStorage {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let (Some(secret_id), Some(secret_key)) = (&config.secret_id, &config.secret_key) else {
            return Err(Error::Config(
                "uploading to COS requires SCF_SECRET_ID and SCF_SECRET_KEY".to_string(),
            ));
        };

        let credentials = Credentials::new(Some(secret_id.as_str()), Some(secret_key.as_str()), None, None, None)
            .map_err(|e| Error::Config(format!("invalid COS credentials: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.cos_endpoint(),
        };

        Ok(Self {
            region,
            credentials,
            appid: config.appid.clone(),
        })
    }

    /// COS bucket names carry the account app id as a suffix
    pub fn full_bucket_name(&self, bucket: &str) -> String {
        full_bucket_name(bucket, self.appid.as_deref())
    }
}

fn full_bucket_name(bucket: &str, appid: Option<&str>) -> String {
    match appid {
        Some(appid) if !appid.is_empty() && !bucket.ends_with(&format!("-{}", appid)) => {
            format!("{}-{}", bucket, appid)
        }
        _ => bucket.to_string(),
    }
}

impl ObjectStorage for CosStorage {
    fn upload<'a>(&'a self, bucket: &'a str, key: &'a str, data: Bytes) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            let name = self.full_bucket_name(bucket);
            let target = Bucket::new(&name, self.region.clone(), self.credentials.clone())
                .map_err(|e| ClientError::new(format!("invalid bucket '{}': {}", name, e)))?;

            tracing::debug!("Uploading {} bytes to cos://{}/{}", data.len(), name, key);

            let response = target
                .put_object(key, &data)
                .await
                .map_err(|e| ClientError::new(e.to_string()))?;

            match response.status_code() {
                200..=299 => Ok(()),
                status => Err(ClientError::new(format!(
                    "upload to bucket '{}' returned HTTP {}",
                    name, status
                ))
                .with_code(status.to_string())),
            }
        })
    }
}
