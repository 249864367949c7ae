use axum::extract::{Multipart, State};
use be3_shared::{
    format_size, now_string, object_url, storage_endpoint, BucketRecord, ObjectDescriptor,
    StorageCredentials, UserRecord,
};
use bytes::Bytes;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::auth::CurrentUser;
use crate::extract::{ValidJson, ValidQuery};
use crate::response::{ApiResponse, HandlerResult};
use crate::state::AppState;
use crate::types::{BucketBody, BucketQuery, ObjectRemoveBody};

/// Request body cap for uploads, the Lambda payload limit
pub const MAX_UPLOAD_BYTES: usize = 6 * 1024 * 1024;

fn credentials(user: &UserRecord, storage_dn: &str) -> Result<StorageCredentials, ApiResponse> {
    user.reseller
        .access_key(storage_dn)
        .map(StorageCredentials::from)
        .ok_or_else(|| ApiResponse::not_found("Access key not found"))
}

fn bucket_index(
    user: &UserRecord,
    bucket_name: &str,
    storage_dn: &str,
) -> Result<usize, ApiResponse> {
    user.reseller
        .bucket_position(bucket_name, storage_dn)
        .ok_or_else(|| ApiResponse::not_found("Bucket not found"))
}

pub async fn create_bucket(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidJson(body): ValidJson<BucketBody>,
) -> HandlerResult {
    let mut user = current.record;
    let creds = credentials(&user, &body.storage_dn)?;
    if user
        .reseller
        .bucket_position(&body.bucket_name, &body.storage_dn)
        .is_some()
    {
        return Err(ApiResponse::conflict("Bucket already exists"));
    }

    // Versioning and encryption can only be applied to an existing bucket
    state.storage.create_bucket(&creds, &body.bucket_name).await?;

    let mut bucket = BucketRecord {
        bucket_name: body.bucket_name.clone(),
        storage_dn: body.storage_dn.clone(),
        endpoint: storage_endpoint(&body.storage_dn),
        created_at: now_string(),
        versioning: false,
        default_encryption: false,
        files: Vec::new(),
    };

    let mut configured = Ok(());
    if body.versioning {
        configured = state.storage.enable_versioning(&creds, &body.bucket_name).await;
        bucket.versioning = configured.is_ok();
    }
    if body.default_encryption && configured.is_ok() {
        configured = state
            .storage
            .enable_default_encryption(&creds, &body.bucket_name)
            .await;
        bucket.default_encryption = configured.is_ok();
    }

    user.reseller.buckets.push(bucket.clone());
    user.log_activity("Reseller bucket created");
    state.users.save_user(&mut user).await?;

    if let Err(e) = configured {
        error!("Bucket {} created without full configuration: {}", bucket.bucket_name, e);
        return Err(ApiResponse::bad_request(
            bucket,
            "Bucket created but its configuration failed",
        ));
    }
    Ok(ApiResponse::success(bucket, "Bucket created successfully"))
}

pub async fn delete_bucket(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidQuery(query): ValidQuery<BucketQuery>,
) -> HandlerResult {
    let mut user = current.record;
    let index = bucket_index(&user, &query.bucket_name, &query.storage_dn)?;
    let creds = credentials(&user, &query.storage_dn)?;

    state.storage.delete_bucket(&creds, &query.bucket_name).await?;

    user.reseller.buckets.remove(index);
    user.log_activity("Reseller bucket deleted");
    state.users.save_user(&mut user).await?;

    Ok(ApiResponse::success(Value::Null, "Bucket deleted successfully"))
}

pub async fn list_buckets(current: CurrentUser) -> HandlerResult {
    Ok(ApiResponse::success(
        &current.record.reseller.buckets,
        "Buckets fetched successfully",
    ))
}

struct UploadedFile {
    name: String,
    content_type: Option<String>,
    data: Bytes,
}

/// Multipart form: `bucket_name`, `storage_dn` and one or more file parts
pub async fn upload_object(
    State(state): State<AppState>,
    current: CurrentUser,
    mut multipart: Multipart,
) -> HandlerResult {
    let mut bucket_name = None;
    let mut storage_dn = None;
    let mut files = Vec::new();

    let bad_form = |e: axum::extract::multipart::MultipartError| {
        ApiResponse::bad_request(Value::Null, e.body_text())
    };
    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(bad_form)?;
                files.push(UploadedFile {
                    name: file_name,
                    content_type,
                    data,
                });
            }
            None => {
                let value = field.text().await.map_err(bad_form)?;
                match field_name.as_str() {
                    "bucket_name" => bucket_name = Some(value),
                    "storage_dn" => storage_dn = Some(value),
                    _ => {}
                }
            }
        }
    }

    let mut missing = Vec::new();
    if bucket_name.as_deref().map_or(true, str::is_empty) {
        missing.push("bucket_name: field required".to_string());
    }
    if storage_dn.as_deref().map_or(true, str::is_empty) {
        missing.push("storage_dn: field required".to_string());
    }
    if files.is_empty() {
        missing.push("file: field required".to_string());
    }
    if !missing.is_empty() {
        return Err(ApiResponse::bad_request(missing, "Validation error"));
    }
    let bucket_name = bucket_name.unwrap_or_default();
    let storage_dn = storage_dn.unwrap_or_default();

    let mut user = current.record;
    let index = bucket_index(&user, &bucket_name, &storage_dn)?;
    let creds = credentials(&user, &storage_dn)?;

    let mut uploaded = Vec::with_capacity(files.len());
    let mut failure = None;
    for file in files {
        let size = format_size(file.data.len());
        let stored = state
            .storage
            .put_object(
                &creds,
                &bucket_name,
                &file.name,
                file.data,
                file.content_type.as_deref(),
            )
            .await;
        if let Err(e) = stored {
            error!("Upload of {} to {} failed: {}", file.name, bucket_name, e);
            failure = Some((file.name, e));
            break;
        }
        info!("Uploaded {} to {}", file.name, bucket_name);

        uploaded.push(ObjectDescriptor {
            url: object_url(&bucket_name, &storage_dn, &file.name),
            name: file.name,
            created_at: now_string(),
            size,
            content_type: file.content_type,
        });
    }

    // Whatever reached the bucket is recorded, even when a later file failed
    if !uploaded.is_empty() {
        let bucket = &mut user.reseller.buckets[index];
        for descriptor in &uploaded {
            bucket.files.retain(|f| f.name != descriptor.name);
            bucket.files.push(descriptor.clone());
        }
        user.log_activity("Reseller file uploaded");
        state.users.save_user(&mut user).await?;
    }

    match failure {
        None => Ok(ApiResponse::success(uploaded, "File uploaded successfully")),
        Some((_, e)) if uploaded.is_empty() => Err(e.into()),
        Some((failed, e)) => Err(ApiResponse::bad_request(
            json!({
                "uploaded": uploaded,
                "failed": failed,
                "error": e.to_string(),
            }),
            "Some files failed to upload",
        )),
    }
}

pub async fn list_objects(
    current: CurrentUser,
    ValidQuery(query): ValidQuery<BucketQuery>,
) -> HandlerResult {
    let user = current.record;
    let index = bucket_index(&user, &query.bucket_name, &query.storage_dn)?;

    Ok(ApiResponse::success(
        &user.reseller.buckets[index].files,
        "Files fetched successfully",
    ))
}

pub async fn delete_object(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidJson(body): ValidJson<ObjectRemoveBody>,
) -> HandlerResult {
    let mut user = current.record;
    let index = bucket_index(&user, &body.bucket_name, &body.storage_dn)?;
    let position = user.reseller.buckets[index]
        .files
        .iter()
        .position(|f| f.name == body.object_name)
        .ok_or_else(|| ApiResponse::not_found("File not found"))?;
    let creds = credentials(&user, &body.storage_dn)?;

    state
        .storage
        .delete_object(&creds, &body.bucket_name, &body.object_name)
        .await?;

    user.reseller.buckets[index].files.remove(position);
    user.log_activity("Reseller file deleted");
    state.users.save_user(&mut user).await?;

    Ok(ApiResponse::success(Value::Null, "File deleted successfully"))
}
