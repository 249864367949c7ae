use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::types::{AttributeValue, Select};
use aws_sdk_dynamodb::Client as DynamoClient;
use serde_dynamo::{from_item, from_items, to_item};
use tracing::{error, info, warn};

use crate::{paginate, Be3Error, Be3Result, UserRecord, USER_SORT_KEY};

pub const USERNAME_INDEX: &str = "username-index";
pub const EMAIL_INDEX: &str = "email-index";

/// Profile records in the single table
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, pk: &str) -> Be3Result<Option<UserRecord>>;
    async fn find_by_username(&self, username: &str) -> Be3Result<Option<UserRecord>>;
    async fn find_by_email(&self, email: &str) -> Be3Result<Option<UserRecord>>;
    async fn count_by_username(&self, username: &str) -> Be3Result<usize>;
    /// Full scan of profile records, sliced by offset and limit
    async fn scan_users(&self, limit: usize, offset: usize) -> Be3Result<Vec<UserRecord>>;
    /// Insert a new record, fails with Conflict when `pk` is taken
    async fn create_user(&self, user: &UserRecord) -> Be3Result<()>;
    /// Write back a fetched record. Fails with Conflict when someone else saved
    /// it since it was read; on success `user.version` is bumped.
    async fn save_user(&self, user: &mut UserRecord) -> Be3Result<()>;
    async fn delete_user(&self, pk: &str) -> Be3Result<()>;
}

pub struct DynamoDBService {
    client: DynamoClient,
    table_name: String,
}

fn dynamo_error<E>(operation: &str, err: SdkError<E>) -> Be3Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let detail = DisplayErrorContext(&err).to_string();
    error!("DynamoDB {} failed: {}", operation, detail);
    Be3Error::DynamoDBError(format!("{} failed: {}", operation, detail))
}

impl DynamoDBService {
    pub fn new(client: DynamoClient, table_name: String) -> Self {
        Self { client, table_name }
    }

    fn key(pk: &str) -> HashMap<String, AttributeValue> {
        HashMap::from([
            ("pk".to_string(), AttributeValue::S(pk.to_string())),
            ("sk".to_string(), AttributeValue::S(USER_SORT_KEY.to_string())),
        ])
    }

    async fn query_index(
        &self,
        index_name: &str,
        attribute: &str,
        value: &str,
    ) -> Be3Result<Vec<UserRecord>> {
        let output = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name(index_name)
            .key_condition_expression("#attr = :value")
            .filter_expression("#sk = :sk")
            .expression_attribute_names("#attr", attribute)
            .expression_attribute_names("#sk", "sk")
            .expression_attribute_values(":value", AttributeValue::S(value.to_string()))
            .expression_attribute_values(":sk", AttributeValue::S(USER_SORT_KEY.to_string()))
            .send()
            .await
            .map_err(|e| dynamo_error("query", e))?;

        Ok(from_items(output.items.unwrap_or_default())?)
    }
}

#[async_trait]
impl UserRepository for DynamoDBService {
    async fn get_user(&self, pk: &str) -> Be3Result<Option<UserRecord>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(pk)))
            .send()
            .await
            .map_err(|e| dynamo_error("get_item", e))?;

        match output.item {
            Some(item) => Ok(Some(from_item(item)?)),
            None => Ok(None),
        }
    }

    async fn find_by_username(&self, username: &str) -> Be3Result<Option<UserRecord>> {
        Ok(self
            .query_index(USERNAME_INDEX, "username", username)
            .await?
            .into_iter()
            .next())
    }

    async fn find_by_email(&self, email: &str) -> Be3Result<Option<UserRecord>> {
        Ok(self
            .query_index(EMAIL_INDEX, "email", email)
            .await?
            .into_iter()
            .next())
    }

    async fn count_by_username(&self, username: &str) -> Be3Result<usize> {
        let output = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name(USERNAME_INDEX)
            .select(Select::Count)
            .key_condition_expression("#username = :username")
            .expression_attribute_names("#username", "username")
            .expression_attribute_values(":username", AttributeValue::S(username.to_string()))
            .send()
            .await
            .map_err(|e| dynamo_error("query", e))?;

        Ok(output.count.max(0) as usize)
    }

    async fn scan_users(&self, limit: usize, offset: usize) -> Be3Result<Vec<UserRecord>> {
        let mut users: Vec<UserRecord> = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression("#sk = :sk")
                .expression_attribute_names("#sk", "sk")
                .expression_attribute_values(":sk", AttributeValue::S(USER_SORT_KEY.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| dynamo_error("scan", e))?;

            let page: Vec<UserRecord> = from_items(output.items.unwrap_or_default())?;
            users.extend(page);

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        info!("Scanned {} user records", users.len());
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(paginate(&users, limit, offset))
    }

    async fn create_user(&self, user: &UserRecord) -> Be3Result<()> {
        let item: HashMap<String, AttributeValue> = to_item(user)?;

        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(pk)")
            .send()
            .await;

        match result {
            Ok(_) => {
                info!("Created user record {}", user.pk);
                Ok(())
            }
            Err(SdkError::ServiceError(ref inner))
                if inner.err().is_conditional_check_failed_exception() =>
            {
                warn!("User record {} already exists", user.pk);
                Err(Be3Error::Conflict("User already exists".to_string()))
            }
            Err(e) => Err(dynamo_error("put_item", e)),
        }
    }

    async fn save_user(&self, user: &mut UserRecord) -> Be3Result<()> {
        let expected = user.version;
        user.version = expected + 1;

        let item: HashMap<String, AttributeValue> = match to_item(&*user) {
            Ok(item) => item,
            Err(e) => {
                user.version = expected;
                return Err(e.into());
            }
        };

        // The record must still exist and carry the version we read
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression(
                "attribute_exists(pk) AND (attribute_not_exists(#version) OR #version = :expected)",
            )
            .expression_attribute_names("#version", "version")
            .expression_attribute_values(":expected", AttributeValue::N(expected.to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(ref inner))
                if inner.err().is_conditional_check_failed_exception() =>
            {
                user.version = expected;
                warn!("Lost update prevented on user record {}", user.pk);
                Err(Be3Error::Conflict(
                    "Record was modified by another request, please retry".to_string(),
                ))
            }
            Err(e) => {
                user.version = expected;
                Err(dynamo_error("put_item", e))
            }
        }
    }

    async fn delete_user(&self, pk: &str) -> Be3Result<()> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(pk)))
            .send()
            .await
            .map_err(|e| dynamo_error("delete_item", e))?;

        info!("Deleted user record {}", pk);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewUser, Role};
    use aws_sdk_dynamodb::config::retry::RetryConfig;
    use aws_sdk_dynamodb::config::{BehaviorVersion, Credentials, Region};
    use wiremock::matchers::{body_string_contains, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const AMZ_JSON: &str = "application/x-amz-json-1.0";

    fn service_for(server: &MockServer) -> DynamoDBService {
        let config = aws_sdk_dynamodb::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(server.uri())
            .credentials_provider(Credentials::new("test", "test", None, None, "test"))
            .retry_config(RetryConfig::disabled())
            .build();
        DynamoDBService::new(DynamoClient::from_conf(config), "be3-users".to_string())
    }

    fn stored_user(version: u64) -> UserRecord {
        let mut user = UserRecord::new(
            "sub-123",
            NewUser {
                username: "jdoe1".into(),
                email: "jdoe@example.com".into(),
                first_name: "John".into(),
                last_name: None,
                phone_number: None,
                company: None,
                agreement: Some(true),
                role: Role::User,
                quota: 100,
            },
            true,
        );
        user.version = version;
        user
    }

    fn put_item() -> wiremock::MockBuilder {
        Mock::given(method("POST"))
            .and(header("x-amz-target", "DynamoDB_20120810.PutItem"))
            .and(body_string_contains("#version = :expected"))
    }

    #[tokio::test]
    async fn test_save_sends_read_version_and_bumps_it() {
        let server = MockServer::start().await;
        put_item()
            .and(body_string_contains(r#""N":"4""#))
            .respond_with(ResponseTemplate::new(200).set_body_raw("{}", AMZ_JSON))
            .expect(1)
            .mount(&server)
            .await;

        let mut user = stored_user(4);
        service_for(&server).save_user(&mut user).await.unwrap();

        assert_eq!(user.version, 5);
    }

    #[tokio::test]
    async fn test_save_rejected_by_version_condition_is_a_conflict() {
        let server = MockServer::start().await;
        put_item()
            .respond_with(ResponseTemplate::new(400).set_body_raw(
                r#"{"__type":"com.amazonaws.dynamodb.v20120810#ConditionalCheckFailedException","message":"The conditional request failed"}"#,
                AMZ_JSON,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let mut user = stored_user(4);
        let err = service_for(&server).save_user(&mut user).await.unwrap_err();

        match err {
            Be3Error::Conflict(msg) => {
                assert_eq!(msg, "Record was modified by another request, please retry")
            }
            other => panic!("expected a conflict, got {:?}", other),
        }
        assert_eq!(user.version, 4);
    }

    #[tokio::test]
    async fn test_other_save_failures_keep_the_read_version() {
        let server = MockServer::start().await;
        put_item()
            .respond_with(ResponseTemplate::new(400).set_body_raw(
                r#"{"__type":"com.amazonaws.dynamodb.v20120810#ResourceNotFoundException","message":"Requested resource not found"}"#,
                AMZ_JSON,
            ))
            .mount(&server)
            .await;

        let mut user = stored_user(2);
        let err = service_for(&server).save_user(&mut user).await.unwrap_err();

        assert!(matches!(err, Be3Error::DynamoDBError(_)));
        assert_eq!(user.version, 2);
    }
}
