use serde::{Deserialize, Serialize};

use crate::utils::now_string;

/// Sort key of the profile record in the single table
pub const USER_SORT_KEY: &str = "user";
pub const DEFAULT_QUOTA: u64 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Retailer,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Retailer => "retailer",
            Role::User => "user",
        }
    }
}

/// Token pair as issued by the identity provider. `ExpiresIn` is relative, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    pub token_type: String,
    pub expires_in: i64,
}

/// Last issued token pair, kept on the user record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CachedTokens {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    pub token_type: String,
    /// Unix seconds
    pub expires_at: i64,
}

impl CachedTokens {
    pub fn issued(tokens: &TokenSet, issued_at: i64) -> Self {
        Self {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            id_token: tokens.id_token.clone(),
            token_type: tokens.token_type.clone(),
            expires_at: issued_at + tokens.expires_in,
        }
    }

    /// A refresh answer carries no refresh token; the previous one stays valid.
    pub fn refreshed(&self, tokens: &TokenSet, issued_at: i64) -> Self {
        let mut next = Self::issued(tokens, issued_at);
        if next.refresh_token.is_none() {
            next.refresh_token = self.refresh_token.clone();
        }
        next
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    pub action: String,
    pub time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignedRegion {
    pub region: String,
    pub storage_dn: String,
    pub assigned_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessKeyRecord {
    pub access_key: String,
    pub secret_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub storage_dn: String,
    pub email: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectDescriptor {
    pub name: String,
    pub created_at: String,
    pub size: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BucketRecord {
    pub bucket_name: String,
    pub storage_dn: String,
    pub endpoint: String,
    pub created_at: String,
    #[serde(default)]
    pub versioning: bool,
    #[serde(default)]
    pub default_encryption: bool,
    #[serde(default)]
    pub files: Vec<ObjectDescriptor>,
}

/// Reseller (iDrive E2) account state nested in the user record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ResellerProfile {
    /// Set once the reseller account exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub user_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota: Option<u64>,
    #[serde(default)]
    pub assigned_regions: Vec<AssignedRegion>,
    #[serde(default)]
    pub available_regions: Vec<serde_json::Value>,
    #[serde(default)]
    pub reseller_access_key: Vec<AccessKeyRecord>,
    #[serde(default)]
    pub buckets: Vec<BucketRecord>,
}

impl ResellerProfile {
    pub fn exists(&self) -> bool {
        self.created_at.is_some()
    }

    pub fn region(&self, storage_dn: &str) -> Option<&AssignedRegion> {
        self.assigned_regions
            .iter()
            .find(|r| r.storage_dn == storage_dn)
    }

    pub fn has_region_key(&self, region_key: &str) -> bool {
        self.assigned_regions.iter().any(|r| r.region == region_key)
    }

    pub fn access_key(&self, storage_dn: &str) -> Option<&AccessKeyRecord> {
        self.reseller_access_key
            .iter()
            .find(|k| k.storage_dn == storage_dn)
    }

    pub fn bucket_position(&self, bucket_name: &str, storage_dn: &str) -> Option<usize> {
        self.buckets
            .iter()
            .position(|b| b.bucket_name == bucket_name && b.storage_dn == storage_dn)
    }
}

/// Profile record, `pk` is the identity provider's `sub`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub pk: String,
    pub sk: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agreement: Option<bool>,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_quota")]
    pub quota: u64,
    #[serde(default)]
    pub email_verified: bool,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_tokens: Option<CachedTokens>,
    #[serde(default)]
    pub activity_log: Vec<ActivityEntry>,
    #[serde(default)]
    pub reseller: ResellerProfile,
    /// Optimistic concurrency counter, bumped on every save
    #[serde(default)]
    pub version: u64,
}

fn default_quota() -> u64 {
    DEFAULT_QUOTA
}

/// Fields collected at sign-up
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub company: Option<String>,
    pub agreement: Option<bool>,
    pub role: Role,
    pub quota: u64,
}

impl UserRecord {
    pub fn new(pk: impl Into<String>, new_user: NewUser, email_verified: bool) -> Self {
        let now = now_string();
        Self {
            pk: pk.into(),
            sk: USER_SORT_KEY.to_string(),
            username: new_user.username,
            email: new_user.email,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            phone_number: new_user.phone_number,
            company: new_user.company,
            agreement: new_user.agreement,
            role: new_user.role,
            quota: new_user.quota,
            email_verified,
            created_at: now.clone(),
            updated_at: now,
            access_tokens: None,
            activity_log: Vec::new(),
            reseller: ResellerProfile::default(),
            version: 0,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Append to the activity log and bump `updated_at`
    pub fn log_activity(&mut self, action: impl Into<String>) {
        let now = now_string();
        self.activity_log.push(ActivityEntry {
            action: action.into(),
            time: now.clone(),
        });
        self.updated_at = now;
    }

    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            pk: self.pk.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone_number: self.phone_number.clone(),
            company: self.company.clone(),
            role: self.role,
            quota: self.quota,
            email_verified: self.email_verified,
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            summary: self.summary(),
            reseller: self.reseller.clone(),
        }
    }
}

/// Listing view, no tokens and no keys
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub pk: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub company: Option<String>,
    pub role: Role,
    pub quota: u64,
    pub email_verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub summary: UserSummary,
    pub reseller: ResellerProfile,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnumEntry {
    pub name: &'static str,
    pub value: serde_json::Value,
}

/// Static catalogue served to the front end
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnumsCatalogue {
    pub regions: Vec<EnumEntry>,
    pub quotas: Vec<EnumEntry>,
    pub roles: Vec<EnumEntry>,
}

const REGIONS: &[(&str, &str)] = &[
    ("Oregon", "us-west-2"),
    ("LosAngeles", "us-west-1"),
    ("Virginia", "us-east-1"),
    ("Dallas", "us-east-2"),
    ("Phoenix", "us-west-3"),
    ("Chicago", "us-central-1"),
    ("SanJose", "us-central-2"),
    ("Miami", "us-south-1"),
    ("Montreal", "ca-central-1"),
    ("Ireland", "eu-west-1"),
    ("London", "eu-west-2"),
    ("Frankfurt", "eu-central-1"),
    ("Paris", "eu-west-3"),
];

/// Quota steps in MB, 100 GB to 1 TB
const QUOTAS: &[(&str, u64)] = &[
    ("gb_100", 102400),
    ("gb_200", 204800),
    ("gb_300", 307200),
    ("gb_400", 409600),
    ("gb_500", 512000),
    ("gb_600", 614400),
    ("gb_700", 716800),
    ("gb_800", 819200),
    ("gb_900", 921600),
    ("gb_1000", 1024000),
];

impl EnumsCatalogue {
    pub fn build() -> Self {
        Self {
            regions: REGIONS
                .iter()
                .map(|(name, key)| EnumEntry {
                    name,
                    value: serde_json::Value::from(*key),
                })
                .collect(),
            quotas: QUOTAS
                .iter()
                .map(|(name, mb)| EnumEntry {
                    name,
                    value: serde_json::Value::from(*mb),
                })
                .collect(),
            roles: [Role::Admin, Role::Retailer, Role::User]
                .iter()
                .map(|role| EnumEntry {
                    name: role.as_str(),
                    value: serde_json::Value::from(role.as_str()),
                })
                .collect(),
        }
    }
}

pub fn is_known_region(region_key: &str) -> bool {
    REGIONS.iter().any(|(_, key)| *key == region_key)
}

pub fn is_known_quota(quota_mb: u64) -> bool {
    QUOTAS.iter().any(|(_, mb)| *mb == quota_mb)
}

/// Smallest reseller quota step
pub const DEFAULT_RESELLER_QUOTA: u64 = 102400;
