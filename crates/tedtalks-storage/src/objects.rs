//! Raw S3 access for conversation documents.
//!
//! Reads always carry the object's ETag and writes are always conditional,
//! which is what the store's compare-and-set is built on.

use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_smithy_types::byte_stream::ByteStream;

use crate::error::StorageError;

/// Body and ETag of a fetched object.
pub struct StoredObject {
    pub body: Vec<u8>,
    pub etag: String,
}

/// Precondition attached to a PUT.
#[derive(Debug, Clone, Copy)]
pub enum WriteCondition<'a> {
    /// Only overwrite the version with this ETag.
    IfMatch(&'a str),
    /// Only create; fail if the key already exists.
    IfAbsent,
}

/// Timeouts and dispatch failures never reached S3, so they say nothing
/// about the object and are worth retrying.
fn connection_failure<E, R>(operation: &str, err: &SdkError<E, R>) -> Option<StorageError> {
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            Some(StorageError::Unavailable(format!("{operation}: {err}")))
        }
        _ => None,
    }
}

pub async fn get_object(
    client: &Client,
    bucket: &str,
    key: &str,
) -> Result<StoredObject, StorageError> {
    let resp = match client.get_object().bucket(bucket).key(key).send().await {
        Ok(resp) => resp,
        Err(e) => {
            if let Some(unavailable) = connection_failure("GetObject", &e) {
                return Err(unavailable);
            }
            let err = e.into_service_error();
            return Err(if err.is_no_such_key() {
                StorageError::NotFound {
                    key: key.to_string(),
                }
            } else {
                StorageError::GetObject(err.to_string())
            });
        }
    };

    let etag = resp
        .e_tag()
        .ok_or_else(|| StorageError::GetObject(format!("{key}: response carried no ETag")))?
        .to_string();
    let body = resp
        .body
        .collect()
        .await
        .map_err(|e| StorageError::Unavailable(format!("reading {key}: {e}")))?
        .into_bytes()
        .to_vec();

    Ok(StoredObject { body, etag })
}

/// Put a JSON document under `condition`. Returns the new ETag, or
/// `StorageError::PreconditionFailed` if the condition did not hold.
pub async fn put_object(
    client: &Client,
    bucket: &str,
    key: &str,
    body: Vec<u8>,
    condition: WriteCondition<'_>,
) -> Result<String, StorageError> {
    let req = client
        .put_object()
        .bucket(bucket)
        .key(key)
        .content_type("application/json")
        .body(ByteStream::from(body));
    let req = match condition {
        WriteCondition::IfMatch(etag) => req.if_match(etag),
        WriteCondition::IfAbsent => req.if_none_match("*"),
    };

    let resp = req.send().await.map_err(|e| {
        if let Some(unavailable) = connection_failure("PutObject", &e) {
            return unavailable;
        }
        // 412 when the condition does not hold, 409 when a concurrent
        // conditional write to the same key won.
        let status = e.raw_response().map(|r| r.status().as_u16());
        let err = e.into_service_error();
        if matches!(status, Some(412 | 409)) || err.to_string().contains("PreconditionFailed") {
            StorageError::PreconditionFailed {
                key: key.to_string(),
            }
        } else {
            StorageError::PutObject(err.to_string())
        }
    })?;

    Ok(resp.e_tag().unwrap_or_default().to_string())
}

/// Every key under `prefix`, across all result pages.
pub async fn list_keys(
    client: &Client,
    bucket: &str,
    prefix: &str,
) -> Result<Vec<String>, StorageError> {
    let mut pages = client
        .list_objects_v2()
        .bucket(bucket)
        .prefix(prefix)
        .into_paginator()
        .send();

    let mut keys = Vec::new();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| {
            connection_failure("ListObjectsV2", &e)
                .unwrap_or_else(|| StorageError::ListObjects(e.into_service_error().to_string()))
        })?;
        keys.extend(page.contents().iter().filter_map(|obj| obj.key()).map(str::to_string));
    }
    Ok(keys)
}
