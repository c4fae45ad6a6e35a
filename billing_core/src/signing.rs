//! AWS Signature Version 4 for outbound requests.

use crate::credentials::Credentials;
use crate::error::{BillingError, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

pub fn amz_date(time: DateTime<Utc>) -> String {
    time.format("%Y%m%dT%H%M%SZ").to_string()
}

pub struct RequestSigner<'a> {
    credentials: &'a Credentials,
    region: &'a str,
    service: &'a str,
}

impl<'a> RequestSigner<'a> {
    pub fn new(credentials: &'a Credentials, region: &'a str, service: &'a str) -> Self {
        Self {
            credentials,
            region,
            service,
        }
    }

    /// Computes the `Authorization` header value.
    ///
    /// `headers` must use lowercase names and already contain `host` and
    /// `x-amz-date`; every entry is signed. `query` is expected pre-encoded.
    pub fn authorization(
        &self,
        method: &str,
        path: &str,
        query: &str,
        headers: &BTreeMap<String, String>,
        payload: &[u8],
    ) -> Result<String> {
        let date_time = headers
            .get("x-amz-date")
            .ok_or_else(|| BillingError::Signing("x-amz-date header is required".to_string()))?;
        let date = date_time
            .get(..8)
            .ok_or_else(|| BillingError::Signing(format!("malformed x-amz-date: {}", date_time)))?;

        let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");
        let canonical_request = canonical_request(
            method,
            path,
            query,
            &canonical_headers(headers),
            &signed_headers,
            &sha256_hex(payload),
        );

        let scope = format!("{}/{}/{}/aws4_request", date, self.region, self.service);
        let string_to_sign = string_to_sign(&canonical_request, date_time, &scope);
        let key = signing_key(&self.credentials.secret_access_key, date, self.region, self.service)?;
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

        Ok(format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.credentials.access_key_id, scope, signed_headers, signature
        ))
    }
}

pub fn signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let date_key = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date.as_bytes())?;
    let region_key = hmac_sha256(&date_key, region.as_bytes())?;
    let service_key = hmac_sha256(&region_key, service.as_bytes())?;
    hmac_sha256(&service_key, b"aws4_request")
}

fn canonical_request(
    method: &str,
    path: &str,
    query: &str,
    canonical_headers: &str,
    signed_headers: &str,
    payload_hash: &str,
) -> String {
    let path = if path.is_empty() { "/" } else { path };
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method,
        path,
        canonical_query_string(query),
        canonical_headers,
        signed_headers,
        payload_hash
    )
}

fn string_to_sign(canonical_request: &str, date_time: &str, scope: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        date_time,
        scope,
        sha256_hex(canonical_request.as_bytes())
    )
}

fn canonical_query_string(query: &str) -> String {
    let mut params = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .collect::<Vec<_>>();
    params.sort();

    params
        .into_iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("&")
}

fn canonical_headers(headers: &BTreeMap<String, String>) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, normalize_header_value(value)))
        .collect()
}

fn normalize_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| BillingError::Signing(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
