use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{Be3Error, Be3Result};

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current UTC time in the table's `YYYY-MM-DD HH:MM:SS` format
pub fn now_string() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Get current Unix timestamp
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Validate email format (basic validation)
pub fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && email.len() > 5
        }
        None => false,
    }
}

/// Dates sent to the usage statistics endpoint
pub fn is_valid_date(date: &str) -> bool {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
}

/// S3 naming rules: 3-63 chars of lowercase letters, digits, dots and hyphens
pub fn is_valid_bucket_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    (3..=63).contains(&bytes.len())
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'.' || *b == b'-')
        && bytes[0].is_ascii_alphanumeric()
        && bytes[bytes.len() - 1].is_ascii_alphanumeric()
        && !name.contains("..")
}

pub fn encode_base64(value: &str) -> String {
    STANDARD.encode(value.as_bytes())
}

/// Cognito SECRET_HASH: base64(HMAC-SHA256(client_secret, username + client_id))
pub fn secret_hash(username: &str, client_id: &str, client_secret: &str) -> Be3Result<String> {
    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes())
        .map_err(|e| Be3Error::InternalError(format!("Invalid client secret: {}", e)))?;
    mac.update(username.as_bytes());
    mac.update(client_id.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Shortest decimal form of a rounded size, whole numbers keep one decimal
fn render_size(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Human readable object size, rounded to two decimals: KB below 1024 KB, MB from there
pub fn format_size(bytes: usize) -> String {
    let kb = round2(bytes as f64 / 1024.0);
    if kb < 1024.0 {
        format!("{} KB", render_size(kb))
    } else {
        format!("{} MB", render_size(round2(kb / 1024.0)))
    }
}

pub fn storage_endpoint(storage_dn: &str) -> String {
    format!("https://{}", storage_dn)
}

pub fn object_url(bucket_name: &str, storage_dn: &str, object_name: &str) -> String {
    format!("https://{}.{}/{}", bucket_name, storage_dn, object_name)
}

/// Offset/limit slice over an already fetched list
pub fn paginate<T: Clone>(items: &[T], limit: usize, offset: usize) -> Vec<T> {
    items.iter().skip(offset).take(limit).cloned().collect()
}
