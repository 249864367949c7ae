use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketVersioningStatus, ServerSideEncryption, ServerSideEncryptionByDefault,
    ServerSideEncryptionConfiguration, ServerSideEncryptionRule, VersioningConfiguration,
};
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use tracing::{error, info};

use crate::{storage_endpoint, AccessKeyRecord, Be3Error, Be3Result};

/// Reseller-issued key for one storage endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct StorageCredentials {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
}

impl From<&AccessKeyRecord> for StorageCredentials {
    fn from(key: &AccessKeyRecord) -> Self {
        Self {
            endpoint: storage_endpoint(&key.storage_dn),
            access_key: key.access_key.clone(),
            secret_key: key.secret_key.clone(),
        }
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn create_bucket(&self, creds: &StorageCredentials, bucket: &str) -> Be3Result<()>;
    async fn enable_versioning(&self, creds: &StorageCredentials, bucket: &str) -> Be3Result<()>;
    async fn enable_default_encryption(
        &self,
        creds: &StorageCredentials,
        bucket: &str,
    ) -> Be3Result<()>;
    async fn delete_bucket(&self, creds: &StorageCredentials, bucket: &str) -> Be3Result<()>;
    async fn put_object(
        &self,
        creds: &StorageCredentials,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Be3Result<()>;
    async fn delete_object(
        &self,
        creds: &StorageCredentials,
        bucket: &str,
        key: &str,
    ) -> Be3Result<()>;
}

/// S3-compatible client, one per call since every user signs with their own key
pub struct S3StorageService {
    signing_region: String,
}

impl S3StorageService {
    pub fn new(signing_region: String) -> Self {
        Self { signing_region }
    }

    fn client(&self, creds: &StorageCredentials) -> S3Client {
        let credentials = Credentials::new(
            &creds.access_key,
            &creds.secret_key,
            None,
            None,
            "be3-reseller-key",
        );
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(self.signing_region.clone()))
            .endpoint_url(&creds.endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();
        S3Client::from_conf(config)
    }
}

fn storage_error<E>(operation: &str, bucket: &str, err: SdkError<E>) -> Be3Error
where
    E: ProvideErrorMetadata + std::fmt::Debug,
{
    match &err {
        SdkError::ServiceError(service_err) => {
            let code = service_err.err().code().unwrap_or("UnknownServiceError");
            let message = service_err.err().message().unwrap_or("No error message provided");
            error!(
                "S3 {} on {} failed - Error Code: {}, Message: {}",
                operation, bucket, code, message
            );
            Be3Error::StorageError {
                code: code.to_string(),
                message: message.to_string(),
            }
        }
        _ => {
            error!("S3 {} on {} failed: {:?}", operation, bucket, err);
            Be3Error::StorageError {
                code: "DispatchFailure".to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl ObjectStorage for S3StorageService {
    async fn create_bucket(&self, creds: &StorageCredentials, bucket: &str) -> Be3Result<()> {
        info!("Creating bucket {} at {}", bucket, creds.endpoint);
        self.client(creds)
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| storage_error("create_bucket", bucket, e))?;
        Ok(())
    }

    async fn enable_versioning(&self, creds: &StorageCredentials, bucket: &str) -> Be3Result<()> {
        let configuration = VersioningConfiguration::builder()
            .status(BucketVersioningStatus::Enabled)
            .build();
        self.client(creds)
            .put_bucket_versioning()
            .bucket(bucket)
            .versioning_configuration(configuration)
            .send()
            .await
            .map_err(|e| storage_error("put_bucket_versioning", bucket, e))?;
        Ok(())
    }

    async fn enable_default_encryption(
        &self,
        creds: &StorageCredentials,
        bucket: &str,
    ) -> Be3Result<()> {
        let build_error = |e: aws_sdk_s3::error::BuildError| {
            Be3Error::InternalError(format!("Failed to build encryption rule: {}", e))
        };
        let by_default = ServerSideEncryptionByDefault::builder()
            .sse_algorithm(ServerSideEncryption::Aes256)
            .build()
            .map_err(build_error)?;
        let configuration = ServerSideEncryptionConfiguration::builder()
            .rules(
                ServerSideEncryptionRule::builder()
                    .apply_server_side_encryption_by_default(by_default)
                    .build(),
            )
            .build()
            .map_err(build_error)?;

        self.client(creds)
            .put_bucket_encryption()
            .bucket(bucket)
            .server_side_encryption_configuration(configuration)
            .send()
            .await
            .map_err(|e| storage_error("put_bucket_encryption", bucket, e))?;
        Ok(())
    }

    async fn delete_bucket(&self, creds: &StorageCredentials, bucket: &str) -> Be3Result<()> {
        info!("Deleting bucket {} at {}", bucket, creds.endpoint);
        self.client(creds)
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| storage_error("delete_bucket", bucket, e))?;
        Ok(())
    }

    async fn put_object(
        &self,
        creds: &StorageCredentials,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Be3Result<()> {
        info!("Uploading {} ({} bytes) to {}", key, body.len(), bucket);
        self.client(creds)
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(|e| storage_error("put_object", bucket, e))?;
        Ok(())
    }

    async fn delete_object(
        &self,
        creds: &StorageCredentials,
        bucket: &str,
        key: &str,
    ) -> Be3Result<()> {
        self.client(creds)
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error("delete_object", bucket, e))?;
        Ok(())
    }
}
