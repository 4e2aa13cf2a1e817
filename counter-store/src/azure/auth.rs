use {
    base64::prelude::*,
    chrono::{DateTime, Utc},
    hmac::{Hmac, Mac},
    sha2::Sha256,
    crate::{connection::AccountKey, error::TableStoreError},
};

type HmacSha256 = Hmac<Sha256>;

/// RFC 1123 date, as expected in `x-ms-date`.
pub(crate) fn request_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// `Authorization` header value for the SharedKeyLite scheme of the table service.
/// `path` is the request url path, already percent-encoded.
pub(crate) fn shared_key_lite(account_name: &str, account_key: &AccountKey, date: &str, path: &str) -> Result<String, TableStoreError> {
    let string_to_sign = format!("{date}\n/{account_name}{path}");

    let mut mac = HmacSha256::new_from_slice(account_key.as_bytes())
        .map_err(|err| TableStoreError::InternalError { description: format!("failed to init request signing: {err:?}") })?;
    mac.update(string_to_sign.as_bytes());
    let signature = BASE64_STANDARD.encode(mac.finalize().into_bytes());

    Ok(format!("SharedKeyLite {account_name}:{signature}"))
}
