//! S3-compatible gateway built on `object_store`.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{Attribute, GetOptions, ObjectStore, PutOptions, PutPayload};
use std::{collections::HashMap, time::Duration};
use tracing::{debug, info};

use super::{
    GatewayError, GatewayResult, ListPage, ObjectInfo, ObjectRecord, ObjectStoreGateway,
};

/// Connection settings for an S3 (or S3-compatible) bucket.
#[derive(Debug, Clone, Default)]
pub struct S3GatewayConfig {
    pub bucket: String,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services like MinIO.
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Allow plain-HTTP endpoints (local development only).
    pub allow_http: bool,
}

/// Gateway over a real bucket.
///
/// Keys pass through unchanged except for `object_store` path normalization,
/// which drops a trailing `/` — zero-byte markers for empty folders are not
/// representable on this backend. Non-empty folders still list correctly
/// because their prefixes are derived from child keys.
#[derive(Debug)]
pub struct S3Gateway {
    store: AmazonS3,
}

impl S3Gateway {
    pub fn new(config: S3GatewayConfig) -> GatewayResult<Self> {
        if config.bucket.is_empty() {
            return Err(GatewayError::Unconfigured("bucket name is required".into()));
        }

        let mut builder = AmazonS3Builder::new().with_bucket_name(&config.bucket);
        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
            builder = builder.with_virtual_hosted_style_request(false);
        }
        if let Some(access_key) = &config.access_key_id {
            builder = builder.with_access_key_id(access_key);
        }
        if let Some(secret_key) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret_key);
        }
        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|err| GatewayError::Unconfigured(format!("failed to build S3 client: {err}")))?;

        info!("created S3 gateway for bucket `{}`", config.bucket);
        Ok(Self { store })
    }
}

fn map_err(err: object_store::Error, key: &str) -> GatewayError {
    match err {
        object_store::Error::NotFound { .. } => GatewayError::NotFound(key.to_string()),
        other => GatewayError::Transfer(other.to_string()),
    }
}

#[async_trait]
impl ObjectStoreGateway for S3Gateway {
    async fn probe(&self) -> GatewayResult<()> {
        debug!("S3 PROBE");
        self.store
            .list_with_delimiter(None)
            .await
            .map_err(|err| GatewayError::Connection(err.to_string()))?;
        Ok(())
    }

    async fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        _token: Option<String>,
    ) -> GatewayResult<ListPage> {
        let path = Path::from(prefix);
        debug!("S3 LIST: {}", path);

        // `object_store` drives S3 continuation tokens internally, so the
        // whole result always comes back as a single page here.
        if delimiter.is_some() {
            let result = self
                .store
                .list_with_delimiter(Some(&path))
                .await
                .map_err(|err| GatewayError::Transfer(err.to_string()))?;

            return Ok(ListPage {
                common_prefixes: result
                    .common_prefixes
                    .iter()
                    .map(|p| format!("{p}/"))
                    .collect(),
                objects: result
                    .objects
                    .into_iter()
                    .map(|meta| ObjectRecord {
                        key: meta.location.to_string(),
                        size: meta.size,
                        last_modified: meta.last_modified,
                    })
                    .collect(),
                next_token: None,
            });
        }

        let mut stream = self.store.list(Some(&path));
        let mut objects = Vec::new();
        while let Some(entry) = stream.next().await {
            let meta = entry.map_err(|err| GatewayError::Transfer(err.to_string()))?;
            objects.push(ObjectRecord {
                key: meta.location.to_string(),
                size: meta.size,
                last_modified: meta.last_modified,
            });
        }

        Ok(ListPage {
            common_prefixes: Vec::new(),
            objects,
            next_token: None,
        })
    }

    async fn get(&self, key: &str) -> GatewayResult<Bytes> {
        let path = Path::from(key);
        debug!("S3 GET: {}", path);

        let result = self.store.get(&path).await.map_err(|err| map_err(err, key))?;
        result
            .bytes()
            .await
            .map_err(|err| GatewayError::Transfer(format!("failed to read body: {err}")))
    }

    async fn put(&self, key: &str, data: Bytes, content_type: Option<String>) -> GatewayResult<()> {
        let path = Path::from(key);
        debug!("S3 PUT: {}", path);

        let mut options = PutOptions::default();
        if let Some(ct) = content_type {
            options.attributes.insert(Attribute::ContentType, ct.into());
        }
        self.store
            .put_opts(&path, PutPayload::from_bytes(data), options)
            .await
            .map_err(|err| GatewayError::Transfer(err.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> GatewayResult<()> {
        let path = Path::from(key);
        debug!("S3 DELETE: {}", path);

        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(err) => Err(GatewayError::Transfer(err.to_string())),
        }
    }

    async fn delete_many(&self, keys: &[String]) -> GatewayResult<()> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }

    async fn copy(&self, src: &str, dst: &str) -> GatewayResult<()> {
        let src_path = Path::from(src);
        let dst_path = Path::from(dst);
        debug!("S3 COPY: {} -> {}", src_path, dst_path);

        self.store
            .copy(&src_path, &dst_path)
            .await
            .map_err(|err| map_err(err, src))
    }

    async fn head(&self, key: &str) -> GatewayResult<ObjectInfo> {
        let path = Path::from(key);
        debug!("S3 HEAD: {}", path);

        let options = GetOptions {
            head: true,
            ..Default::default()
        };
        let result = self
            .store
            .get_opts(&path, options)
            .await
            .map_err(|err| map_err(err, key))?;

        let mut content_type = None;
        let mut user_metadata = HashMap::new();
        for (attr, value) in result.attributes.iter() {
            match attr {
                Attribute::ContentType => content_type = Some(value.to_string()),
                Attribute::Metadata(name) => {
                    user_metadata.insert(name.to_string(), value.to_string());
                }
                _ => {}
            }
        }

        Ok(ObjectInfo {
            size: result.meta.size,
            content_type,
            last_modified: result.meta.last_modified,
            etag: result.meta.e_tag.clone(),
            storage_class: "STANDARD".to_string(),
            user_metadata,
        })
    }

    async fn presign(&self, key: &str, ttl: Duration) -> GatewayResult<String> {
        let path = Path::from(key);
        debug!("S3 PRESIGN: {} ({}s)", path, ttl.as_secs());

        let url = self
            .store
            .signed_url(Method::GET, &path, ttl)
            .await
            .map_err(|err| GatewayError::Transfer(format!("presign failed: {err}")))?;
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Requires a running MinIO; ignored by default.
    #[tokio::test]
    #[ignore]
    async fn minio_round_trip() {
        let gateway = S3Gateway::new(S3GatewayConfig {
            bucket: "test-bucket".to_string(),
            endpoint: Some("http://localhost:9000".to_string()),
            access_key_id: Some("minioadmin".to_string()),
            secret_access_key: Some("minioadmin".to_string()),
            allow_http: true,
            ..Default::default()
        })
        .unwrap();

        let data = Bytes::from_static(b"hello");
        gateway.put("app/test.txt", data.clone(), None).await.unwrap();
        assert_eq!(gateway.get("app/test.txt").await.unwrap(), data);
        gateway.delete("app/test.txt").await.unwrap();
    }

    #[test]
    fn empty_bucket_is_unconfigured() {
        let err = S3Gateway::new(S3GatewayConfig::default()).unwrap_err();
        assert!(matches!(err, GatewayError::Unconfigured(_)));
    }
}
