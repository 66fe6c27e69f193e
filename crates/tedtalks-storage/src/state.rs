//! JSON documents on top of [`objects`](crate::objects), paired with the
//! ETag they were read at.

use aws_sdk_s3::Client;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::StorageError;
use crate::objects::{self, WriteCondition};

/// A document that does not parse is `Malformed`, not a transport error, so
/// callers can quarantine it instead of retrying.
pub async fn load_document<T: DeserializeOwned>(
    client: &Client,
    bucket: &str,
    key: &str,
) -> Result<(T, String), StorageError> {
    let object = objects::get_object(client, bucket, key).await?;
    let value = serde_json::from_slice(&object.body).map_err(|e| StorageError::Malformed {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    Ok((value, object.etag))
}

pub async fn save_document<T: Serialize>(
    client: &Client,
    bucket: &str,
    key: &str,
    value: &T,
    condition: WriteCondition<'_>,
) -> Result<String, StorageError> {
    let body = serde_json::to_vec(value)?;
    objects::put_object(client, bucket, key, body, condition).await
}
