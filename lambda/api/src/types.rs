use be3_shared::{
    is_known_quota, is_known_region, is_valid_bucket_name, is_valid_date, is_valid_email, Role,
    DEFAULT_QUOTA, DEFAULT_RESELLER_QUOTA,
};
use serde::Deserialize;

use crate::extract::Validate;

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 100;

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_quota() -> u64 {
    DEFAULT_QUOTA
}

fn default_reseller_quota() -> u64 {
    DEFAULT_RESELLER_QUOTA
}

fn required(errors: &mut Vec<String>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(format!("{}: field required", field));
    }
}

fn email(errors: &mut Vec<String>, value: &str) {
    if !is_valid_email(value) {
        errors.push("email: value is not a valid email address".to_string());
    }
}

fn length(errors: &mut Vec<String>, field: &str, value: &str, min: usize, max: usize) {
    let len = value.chars().count();
    if len < min || len > max {
        errors.push(format!(
            "{}: must be between {} and {} characters",
            field, min, max
        ));
    }
}

#[derive(Debug, Deserialize)]
pub struct SignUpBody {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    #[serde(default)]
    pub role: Role,
    pub company: Option<String>,
    #[serde(default)]
    pub agreement: Option<bool>,
    #[serde(default = "default_quota")]
    pub quota: u64,
}

impl Validate for SignUpBody {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        email(&mut errors, &self.email);
        length(&mut errors, "username", &self.username, 5, 20);
        length(&mut errors, "password", &self.password, 8, 15);
        required(&mut errors, "first_name", &self.first_name);
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub username: String,
    pub password: String,
}

impl Validate for LoginBody {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        required(&mut errors, "username", &self.username);
        required(&mut errors, "password", &self.password);
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenBody {
    pub username: String,
    pub refresh_token: String,
}

impl Validate for RefreshTokenBody {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        required(&mut errors, "username", &self.username);
        required(&mut errors, "refresh_token", &self.refresh_token);
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct ConfirmSignUpBody {
    pub username: String,
    pub code: String,
}

impl Validate for ConfirmSignUpBody {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        required(&mut errors, "username", &self.username);
        required(&mut errors, "code", &self.code);
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct EmailBody {
    pub email: String,
}

impl Validate for EmailBody {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        email(&mut errors, &self.email);
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct ConfirmForgotPasswordBody {
    pub email: String,
    pub password: String,
    pub code: String,
}

impl Validate for ConfirmForgotPasswordBody {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        email(&mut errors, &self.email);
        length(&mut errors, "password", &self.password, 8, 15);
        required(&mut errors, "code", &self.code);
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordBody {
    pub old_password: String,
    pub new_password: String,
}

impl Validate for ChangePasswordBody {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        required(&mut errors, "old_password", &self.old_password);
        length(&mut errors, "new_password", &self.new_password, 8, 15);
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserBody {
    pub pk: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl Validate for UpdateUserBody {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        required(&mut errors, "first_name", &self.first_name);
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub pk: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl Validate for PageQuery {
    fn validate(&self) -> Vec<String> {
        if self.limit == 0 || self.limit > MAX_LIMIT {
            vec![format!("limit: must be between 1 and {}", MAX_LIMIT)]
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PkQuery {
    pub pk: Option<String>,
}

impl Validate for PkQuery {
    fn validate(&self) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

impl Validate for EmailQuery {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        email(&mut errors, &self.email);
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateResellerUserBody {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: Option<String>,
    #[serde(default = "default_reseller_quota")]
    pub quota: u64,
}

impl Validate for CreateResellerUserBody {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        email(&mut errors, &self.email);
        required(&mut errors, "password", &self.password);
        required(&mut errors, "first_name", &self.first_name);
        if !is_known_quota(self.quota) {
            errors.push(format!("quota: {} is not an offered quota", self.quota));
        }
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct StorageUsageBody {
    pub email: String,
    pub date_from: String,
    pub date_to: String,
}

impl Validate for StorageUsageBody {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        email(&mut errors, &self.email);
        for (field, value) in [("date_from", &self.date_from), ("date_to", &self.date_to)] {
            if !is_valid_date(value) {
                errors.push(format!("{}: expected YYYY-MM-DD", field));
            }
        }
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignRegionBody {
    pub email: String,
    pub region_key: String,
}

impl Validate for AssignRegionBody {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        email(&mut errors, &self.email);
        if !is_known_region(&self.region_key) {
            errors.push(format!("region_key: unknown region {}", self.region_key));
        }
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct RemoveRegionBody {
    pub email: String,
    pub storage_dn: String,
}

impl Validate for RemoveRegionBody {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        email(&mut errors, &self.email);
        required(&mut errors, "storage_dn", &self.storage_dn);
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct AccessKeyBody {
    pub email: String,
    pub storage_dn: String,
    pub name: String,
}

impl Validate for AccessKeyBody {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        email(&mut errors, &self.email);
        required(&mut errors, "storage_dn", &self.storage_dn);
        required(&mut errors, "name", &self.name);
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct StorageDnQuery {
    pub storage_dn: String,
}

impl Validate for StorageDnQuery {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        required(&mut errors, "storage_dn", &self.storage_dn);
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct BucketBody {
    pub bucket_name: String,
    pub storage_dn: String,
    #[serde(default)]
    pub default_encryption: bool,
    #[serde(default)]
    pub versioning: bool,
}

impl Validate for BucketBody {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !is_valid_bucket_name(&self.bucket_name) {
            errors.push("bucket_name: not a valid bucket name".to_string());
        }
        required(&mut errors, "storage_dn", &self.storage_dn);
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct BucketQuery {
    pub storage_dn: String,
    pub bucket_name: String,
}

impl Validate for BucketQuery {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        required(&mut errors, "storage_dn", &self.storage_dn);
        required(&mut errors, "bucket_name", &self.bucket_name);
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct ObjectRemoveBody {
    pub bucket_name: String,
    pub object_name: String,
    pub storage_dn: String,
}

impl Validate for ObjectRemoveBody {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        required(&mut errors, "bucket_name", &self.bucket_name);
        required(&mut errors, "object_name", &self.object_name);
        required(&mut errors, "storage_dn", &self.storage_dn);
        errors
    }
}
