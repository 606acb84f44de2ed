use anyhow::{anyhow, Result};
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::time::Duration;
use url::Url;

use crate::config::AppConfig;

/// S3-compatible content store for uploaded post images.
#[derive(Clone)]
pub struct ObjectStorage {
    client: Client,
    bucket: String,
    public_endpoint: Option<String>,
}

impl ObjectStorage {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let region_provider = RegionProviderChain::first_try(Region::new(config.s3_region.clone()));
        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config)
            .region(shared_config.region().cloned())
            .endpoint_url(config.s3_endpoint.clone())
            .force_path_style(true);
        if let Some(provider) = shared_config.credentials_provider() {
            s3_builder = s3_builder.credentials_provider(provider);
        }
        let s3_config = s3_builder.build();

        let client = Client::from_conf(s3_config);

        Ok(Self {
            client,
            bucket: config.s3_bucket.clone(),
            public_endpoint: config.s3_public_endpoint.clone(),
        })
    }

    /// Creates the bucket when it does not exist yet (local and test setups).
    pub async fn ensure_bucket(&self) -> Result<()> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            return Ok(());
        }

        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|err| anyhow!("failed to create bucket {}: {}", self.bucket, err))?;
        tracing::info!(bucket = %self.bucket, "created content bucket");
        Ok(())
    }

    /// Writes `key` only when nothing is stored there yet. Returns `false`
    /// when the key is already taken.
    pub async fn put_object_if_absent(
        &self,
        key: &str,
        content_type: &str,
        data: bytes::Bytes,
    ) -> Result<bool> {
        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .if_none_match("*")
            .body(ByteStream::from(data))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                let status = err.raw_response().map(|response| response.status().as_u16());
                // 412 when the key exists, 409 when a concurrent write to it is in flight.
                if matches!(status, Some(412) | Some(409)) {
                    return Ok(false);
                }
                Err(err.into())
            }
        }
    }

    pub async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    pub async fn get_object(&self, key: &str) -> Result<bytes::Bytes> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(object.body.collect().await?.into_bytes())
    }

    /// Presigned GET URL for `key`, rewritten to the public endpoint when one is configured.
    pub async fn presigned_get_url(&self, key: &str, expires_in_seconds: u64) -> Result<String> {
        let presign_config = PresigningConfig::expires_in(Duration::from_secs(expires_in_seconds))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await?;

        let url = presigned.uri().to_string();
        match self.public_endpoint {
            Some(ref public_endpoint) => rewrite_presigned_url(&url, public_endpoint),
            None => Ok(url),
        }
    }
}

fn rewrite_presigned_url(original: &str, public_endpoint: &str) -> Result<String> {
    let mut original_url = Url::parse(original)?;
    let public_url = if public_endpoint.contains("://") {
        Url::parse(public_endpoint)?
    } else {
        Url::parse(&format!("http://{}", public_endpoint))?
    };

    original_url
        .set_scheme(public_url.scheme())
        .map_err(|_| anyhow!("invalid scheme for public endpoint"))?;
    original_url
        .set_host(public_url.host_str())
        .map_err(|_| anyhow!("invalid host for public endpoint"))?;
    original_url.set_port(public_url.port()).ok();

    Ok(original_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::rewrite_presigned_url;

    #[test]
    fn rewrites_host_and_keeps_signature() {
        let url = rewrite_presigned_url(
            "http://minio:9000/folio/posts/cat.gif?X-Amz-Signature=abc",
            "https://cdn.example.com",
        )
        .unwrap();
        assert_eq!(url, "https://cdn.example.com/folio/posts/cat.gif?X-Amz-Signature=abc");
    }

    #[test]
    fn accepts_endpoint_without_scheme() {
        let url = rewrite_presigned_url("http://minio:9000/b/k", "localhost:4566").unwrap();
        assert_eq!(url, "http://localhost:4566/b/k");
    }
}
