#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use be3_api::{build_router, AppState};
use be3_shared::{
    AccessKeyRecord, AssignedRegion, Be3Error, Be3Result, CodeDelivery, HttpMethod, IdentityErrorKind,
    IdentityProvider, IdentityUser, NewUser, ObjectStorage, ResellerApi, ResellerResponse, Role,
    SignUpOutcome, SignUpRequest, StorageCredentials, TokenSet, UserRecord, UserRepository,
};
use bytes::Bytes;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const PASSWORD: &str = "Passw0rd!";
pub const VALID_CODE: &str = "123456";
pub const STORAGE_DN: &str = "o1p2.or.idrivee2-12.com";

fn provider_error(code: &str, message: &str) -> Be3Error {
    Be3Error::IdentityProvider {
        kind: IdentityErrorKind::from_code(Some(code)),
        code: code.to_string(),
        message: message.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct FakeAccount {
    pub sub: String,
    pub password: String,
    pub email: String,
    pub name: String,
    pub confirmed: bool,
    pub groups: Vec<String>,
}

#[derive(Default)]
pub struct IdentityState {
    pub accounts: HashMap<String, FakeAccount>,
    /// access token -> username
    pub access_tokens: HashMap<String, String>,
    /// refresh token -> username
    pub refresh_tokens: HashMap<String, String>,
    pub issued: u32,
    pub fail_group_add: bool,
}

/// User pool stand-in with the provider's error codes
#[derive(Default)]
pub struct FakeIdentity {
    pub state: Mutex<IdentityState>,
}

impl FakeIdentity {
    pub fn seed_account(&self, username: &str, email: &str, confirmed: bool) -> String {
        let mut state = self.state.lock().unwrap();
        let sub = format!("sub-{}", username);
        state.accounts.insert(
            username.to_string(),
            FakeAccount {
                sub: sub.clone(),
                password: PASSWORD.to_string(),
                email: email.to_string(),
                name: username.to_string(),
                confirmed,
                groups: Vec::new(),
            },
        );
        sub
    }

    fn issue(state: &mut IdentityState, username: &str, with_refresh: bool) -> TokenSet {
        state.issued += 1;
        let access_token = format!("access-{}-{}", username, state.issued);
        state
            .access_tokens
            .insert(access_token.clone(), username.to_string());
        let refresh_token = with_refresh.then(|| {
            let token = format!("refresh-{}-{}", username, state.issued);
            state
                .refresh_tokens
                .insert(token.clone(), username.to_string());
            token
        });
        TokenSet {
            access_token,
            refresh_token,
            id_token: Some(format!("id-{}", username)),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
        }
    }

    pub fn issue_token(&self, username: &str) -> String {
        let mut state = self.state.lock().unwrap();
        Self::issue(&mut state, username, false).access_token
    }

    pub fn account(&self, username: &str) -> Option<FakeAccount> {
        self.state.lock().unwrap().accounts.get(username).cloned()
    }

    pub fn fail_group_add(&self) {
        self.state.lock().unwrap().fail_group_add = true;
    }

    fn delivery(email: &str) -> CodeDelivery {
        CodeDelivery {
            destination: Some(format!("{}***", &email[..1])),
            delivery_medium: Some("EMAIL".to_string()),
            attribute_name: Some("email".to_string()),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn sign_up(&self, request: &SignUpRequest) -> Be3Result<SignUpOutcome> {
        let mut state = self.state.lock().unwrap();
        if state.accounts.contains_key(&request.username) {
            return Err(provider_error("UsernameExistsException", "User already exists"));
        }
        let sub = format!("sub-{}", request.username);
        state.accounts.insert(
            request.username.clone(),
            FakeAccount {
                sub: sub.clone(),
                password: request.password.clone(),
                email: request.email.clone(),
                name: request.name.clone(),
                confirmed: false,
                groups: Vec::new(),
            },
        );
        Ok(SignUpOutcome {
            user_sub: sub,
            user_confirmed: false,
        })
    }

    async fn confirm_sign_up(&self, username: &str, code: &str) -> Be3Result<()> {
        let mut state = self.state.lock().unwrap();
        let account = state
            .accounts
            .get_mut(username)
            .ok_or_else(|| provider_error("UserNotFoundException", "Username/client id combination not found."))?;
        if code != VALID_CODE {
            return Err(provider_error("CodeMismatchException", "Invalid verification code provided"));
        }
        account.confirmed = true;
        Ok(())
    }

    async fn resend_confirmation_code(&self, username: &str) -> Be3Result<CodeDelivery> {
        let state = self.state.lock().unwrap();
        let account = state
            .accounts
            .get(username)
            .ok_or_else(|| provider_error("UserNotFoundException", "User not found"))?;
        Ok(Self::delivery(&account.email))
    }

    async fn initiate_auth(&self, username: &str, password: &str) -> Be3Result<TokenSet> {
        let mut state = self.state.lock().unwrap();
        let account = state
            .accounts
            .get(username)
            .cloned()
            .ok_or_else(|| provider_error("UserNotFoundException", "User does not exist."))?;
        if account.password != password {
            return Err(provider_error("NotAuthorizedException", "Incorrect username or password."));
        }
        if !account.confirmed {
            return Err(provider_error("UserNotConfirmedException", "User is not confirmed."));
        }
        Ok(Self::issue(&mut state, username, true))
    }

    async fn refresh_auth(&self, username: &str, refresh_token: &str) -> Be3Result<TokenSet> {
        let mut state = self.state.lock().unwrap();
        match state.refresh_tokens.get(refresh_token) {
            Some(owner) if owner == username => Ok(Self::issue(&mut state, username, false)),
            _ => Err(provider_error("NotAuthorizedException", "Invalid Refresh Token")),
        }
    }

    async fn forgot_password(&self, username: &str) -> Be3Result<CodeDelivery> {
        self.resend_confirmation_code(username).await
    }

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        password: &str,
    ) -> Be3Result<()> {
        let mut state = self.state.lock().unwrap();
        let account = state
            .accounts
            .get_mut(username)
            .ok_or_else(|| provider_error("UserNotFoundException", "User not found"))?;
        if code != VALID_CODE {
            return Err(provider_error("ExpiredCodeException", "Invalid code provided"));
        }
        account.password = password.to_string();
        Ok(())
    }

    async fn change_password(
        &self,
        access_token: &str,
        old_password: &str,
        new_password: &str,
    ) -> Be3Result<()> {
        let mut state = self.state.lock().unwrap();
        let username = state
            .access_tokens
            .get(access_token)
            .cloned()
            .ok_or_else(|| provider_error("NotAuthorizedException", "Invalid Access Token"))?;
        let account = state
            .accounts
            .get_mut(&username)
            .ok_or_else(|| provider_error("UserNotFoundException", "User not found"))?;
        if account.password != old_password {
            return Err(provider_error("NotAuthorizedException", "Incorrect username or password."));
        }
        account.password = new_password.to_string();
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Be3Result<IdentityUser> {
        let state = self.state.lock().unwrap();
        let username = state
            .access_tokens
            .get(access_token)
            .ok_or_else(|| provider_error("NotAuthorizedException", "Invalid Access Token"))?;
        let account = state
            .accounts
            .get(username)
            .ok_or_else(|| provider_error("UserNotFoundException", "User does not exist."))?;
        Ok(IdentityUser {
            username: username.clone(),
            sub: account.sub.clone(),
        })
    }

    async fn global_sign_out(&self, access_token: &str) -> Be3Result<()> {
        let mut state = self.state.lock().unwrap();
        let username = state
            .access_tokens
            .get(access_token)
            .cloned()
            .ok_or_else(|| provider_error("NotAuthorizedException", "Invalid Access Token"))?;
        state.access_tokens.retain(|_, owner| *owner != username);
        state.refresh_tokens.retain(|_, owner| *owner != username);
        Ok(())
    }

    async fn admin_delete_user(&self, username: &str) -> Be3Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .accounts
            .remove(username)
            .map(|_| ())
            .ok_or_else(|| provider_error("UserNotFoundException", "User does not exist."))
    }

    async fn admin_add_user_to_group(&self, username: &str, group: &str) -> Be3Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_group_add {
            return Err(provider_error("ResourceNotFoundException", "Group not found."));
        }
        let account = state
            .accounts
            .get_mut(username)
            .ok_or_else(|| provider_error("UserNotFoundException", "User does not exist."))?;
        account.groups.push(group.to_string());
        Ok(())
    }

    async fn admin_update_user_attributes(
        &self,
        username: &str,
        attributes: &[(&str, &str)],
    ) -> Be3Result<()> {
        let mut state = self.state.lock().unwrap();
        let account = state
            .accounts
            .get_mut(username)
            .ok_or_else(|| provider_error("UserNotFoundException", "User does not exist."))?;
        for (name, value) in attributes {
            if *name == "name" {
                account.name = value.to_string();
            }
        }
        Ok(())
    }
}

/// Table stand-in honoring the same version check as the DynamoDB service
#[derive(Default)]
pub struct InMemoryUsers {
    pub records: Mutex<HashMap<String, UserRecord>>,
    pub fail_create: AtomicBool,
    /// Next save finds the record already bumped by another writer
    pub concurrent_write: AtomicBool,
}

impl InMemoryUsers {
    pub fn insert(&self, user: UserRecord) {
        self.records.lock().unwrap().insert(user.pk.clone(), user);
    }

    pub fn get(&self, pk: &str) -> Option<UserRecord> {
        self.records.lock().unwrap().get(pk).cloned()
    }

    pub fn by_username(&self, username: &str) -> Option<UserRecord> {
        self.records
            .lock()
            .unwrap()
            .values()
            .find(|u| u.username == username)
            .cloned()
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn get_user(&self, pk: &str) -> Be3Result<Option<UserRecord>> {
        Ok(self.get(pk))
    }

    async fn find_by_username(&self, username: &str) -> Be3Result<Option<UserRecord>> {
        Ok(self.by_username(username))
    }

    async fn find_by_email(&self, email: &str) -> Be3Result<Option<UserRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn count_by_username(&self, username: &str) -> Be3Result<usize> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.username == username)
            .count())
    }

    async fn scan_users(&self, limit: usize, offset: usize) -> Be3Result<Vec<UserRecord>> {
        let mut users: Vec<UserRecord> = self.records.lock().unwrap().values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users.into_iter().skip(offset).take(limit).collect())
    }

    async fn create_user(&self, user: &UserRecord) -> Be3Result<()> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Be3Error::DynamoDBError("put_item failed: throttled".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&user.pk) {
            return Err(Be3Error::Conflict("User already exists".to_string()));
        }
        records.insert(user.pk.clone(), user.clone());
        Ok(())
    }

    async fn save_user(&self, user: &mut UserRecord) -> Be3Result<()> {
        let mut records = self.records.lock().unwrap();
        if self.concurrent_write.swap(false, Ordering::SeqCst) {
            if let Some(stored) = records.get_mut(&user.pk) {
                stored.version += 1;
            }
        }
        match records.get(&user.pk) {
            Some(stored) if stored.version == user.version => {
                user.version += 1;
                records.insert(user.pk.clone(), user.clone());
                Ok(())
            }
            _ => Err(Be3Error::Conflict(
                "Record was modified by another request, please retry".to_string(),
            )),
        }
    }

    async fn delete_user(&self, pk: &str) -> Be3Result<()> {
        self.records.lock().unwrap().remove(pk);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResellerCall {
    pub method: HttpMethod,
    pub path: String,
    pub form: HashMap<String, String>,
}

/// Records every call; answers 200 `{"success": true}` unless told otherwise
#[derive(Default)]
pub struct FakeReseller {
    pub calls: Mutex<Vec<ResellerCall>>,
    pub responses: Mutex<HashMap<String, ResellerResponse>>,
}

impl FakeReseller {
    pub fn respond(&self, path: &str, status: u16, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), ResellerResponse { status, body });
    }

    pub fn calls_to(&self, path: &str) -> Vec<ResellerCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.path == path)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ResellerApi for FakeReseller {
    async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        form: &[(&str, String)],
    ) -> Be3Result<ResellerResponse> {
        self.calls.lock().unwrap().push(ResellerCall {
            method,
            path: path.to_string(),
            form: form
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        });
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or(ResellerResponse {
                status: 200,
                body: json!({"success": true}),
            }))
    }
}

/// Object store stand-in, logs `operation:bucket[/key]`
#[derive(Default)]
pub struct FakeStorage {
    pub operations: Mutex<Vec<String>>,
    /// `operation` or `operation:target` -> S3 error code to fail with
    pub failures: Mutex<HashMap<String, String>>,
    pub objects: Mutex<HashMap<String, Bytes>>,
}

impl FakeStorage {
    pub fn fail(&self, operation: &str, code: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation.to_string(), code.to_string());
    }

    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().unwrap().clone()
    }

    fn record(&self, operation: &str, target: String) -> Be3Result<()> {
        let entry = format!("{}:{}", operation, target);
        let failures = self.failures.lock().unwrap();
        if let Some(code) = failures.get(operation).or_else(|| failures.get(&entry)) {
            return Err(Be3Error::StorageError {
                code: code.clone(),
                message: format!("{} failed", operation),
            });
        }
        self.operations.lock().unwrap().push(entry);
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn create_bucket(&self, _creds: &StorageCredentials, bucket: &str) -> Be3Result<()> {
        self.record("create_bucket", bucket.to_string())
    }

    async fn enable_versioning(&self, _creds: &StorageCredentials, bucket: &str) -> Be3Result<()> {
        self.record("enable_versioning", bucket.to_string())
    }

    async fn enable_default_encryption(
        &self,
        _creds: &StorageCredentials,
        bucket: &str,
    ) -> Be3Result<()> {
        self.record("enable_default_encryption", bucket.to_string())
    }

    async fn delete_bucket(&self, _creds: &StorageCredentials, bucket: &str) -> Be3Result<()> {
        self.record("delete_bucket", bucket.to_string())
    }

    async fn put_object(
        &self,
        _creds: &StorageCredentials,
        bucket: &str,
        key: &str,
        body: Bytes,
        _content_type: Option<&str>,
    ) -> Be3Result<()> {
        self.record("put_object", format!("{}/{}", bucket, key))?;
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{}/{}", bucket, key), body);
        Ok(())
    }

    async fn delete_object(
        &self,
        _creds: &StorageCredentials,
        bucket: &str,
        key: &str,
    ) -> Be3Result<()> {
        self.record("delete_object", format!("{}/{}", bucket, key))
    }
}

pub struct TestApp {
    pub router: Router,
    pub identity: Arc<FakeIdentity>,
    pub users: Arc<InMemoryUsers>,
    pub reseller: Arc<FakeReseller>,
    pub storage: Arc<FakeStorage>,
}

impl TestApp {
    pub fn new() -> Self {
        let identity = Arc::new(FakeIdentity::default());
        let users = Arc::new(InMemoryUsers::default());
        let reseller = Arc::new(FakeReseller::default());
        let storage = Arc::new(FakeStorage::default());
        let state = AppState::new(
            identity.clone(),
            users.clone(),
            reseller.clone(),
            storage.clone(),
        );
        Self {
            router: build_router(state),
            identity,
            users,
            reseller,
            storage,
        }
    }

    /// Confirmed account plus profile record, returns the record and a valid access token
    pub fn seed_user(&self, username: &str, role: Role) -> (UserRecord, String) {
        let email = format!("{}@example.com", username);
        let sub = self.identity.seed_account(username, &email, true);
        let user = UserRecord::new(
            sub,
            NewUser {
                username: username.to_string(),
                email,
                first_name: "Test".to_string(),
                last_name: Some(username.to_string()),
                phone_number: None,
                company: None,
                agreement: Some(true),
                role,
                quota: 100,
            },
            true,
        );
        self.users.insert(user.clone());
        let token = self.identity.issue_token(username);
        (user, token)
    }

    /// Seeded user with a reseller account, one region and an access key for it
    pub fn seed_reseller_user(&self, username: &str) -> (UserRecord, String) {
        let (mut user, token) = self.seed_user(username, Role::Retailer);
        user.reseller.created_at = Some("2024-01-01 00:00:00".to_string());
        user.reseller.user_enabled = true;
        user.reseller.assigned_regions.push(AssignedRegion {
            region: "us-west-2".to_string(),
            storage_dn: STORAGE_DN.to_string(),
            assigned_at: "2024-01-01 00:00:00".to_string(),
        });
        user.reseller.reseller_access_key.push(AccessKeyRecord {
            access_key: "AKID".to_string(),
            secret_key: "SECRET".to_string(),
            name: Some("default".to_string()),
            storage_dn: STORAGE_DN.to_string(),
            email: user.email.clone(),
            created_at: "2024-01-01 00:00:00".to_string(),
        });
        self.users.insert(user.clone());
        (user, token)
    }

    pub async fn send(&self, request: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, body))
    }

    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };
        self.send(request).await
    }
}
