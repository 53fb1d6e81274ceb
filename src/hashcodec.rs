//! Gateway digest construction and verification.
//!
//! Two independent schemes, both keyed by merchant-side secrets:
//! the initiation digest sent with a virtual-POS payment form, and the
//! callback digest the gateway posts back. Everything here is pure; key
//! material always arrives as arguments.

use sha1::Sha1;
use sha2::{Digest, Sha512};
use std::collections::BTreeMap;

pub const HASH_FIELD: &str = "hash";
/// Colon-delimited, ordered list of the field names the digest covers.
pub const HASH_PARAMS_FIELD: &str = "hashparams";

/// `SHA1(provision_password + "0" + terminal_id)`, uppercase hex.
pub fn hashed_password(provision_password: &str, terminal_id: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(provision_password.as_bytes());
    hasher.update(b"0");
    hasher.update(terminal_id.as_bytes());
    hex::encode_upper(hasher.finalize())
}

/// Inputs bound together by the initiation digest. The gateway reflects the
/// order context back in the callback only if this digest checked out.
pub struct InitiationHashInput<'a> {
    pub terminal_id: &'a str,
    pub order_id: &'a str,
    pub amount_minor: &'a str,
    pub currency_code: &'a str,
    pub success_url: &'a str,
    pub error_url: &'a str,
    pub txn_type: &'a str,
    pub installment_count: &'a str,
    pub store_key: &'a str,
    pub hashed_password: &'a str,
}

/// `secure3dhash` for the payment-initiation form, uppercase hex SHA512.
pub fn initiation_hash(input: &InitiationHashInput<'_>) -> String {
    sha512_upper_hex(&[
        input.terminal_id,
        input.order_id,
        input.amount_minor,
        input.currency_code,
        input.success_url,
        input.error_url,
        input.txn_type,
        input.installment_count,
        input.store_key,
        input.hashed_password,
    ])
}

/// Verifies a callback payload against its claimed digest.
///
/// The payload's `hashparams` dictates which fields are hashed and in what
/// order; a field named there but absent from the payload contributes the
/// empty string, matching gateway behavior. Returns `false` on any missing
/// `hash`/`hashparams` or on mismatch, never an error. A forged `hashparams`
/// cannot pass: the appended store key is secret.
pub fn verify_callback(fields: &BTreeMap<String, String>, store_key: &str) -> bool {
    let claimed = match fields.get(HASH_FIELD) {
        Some(h) if !h.is_empty() => h,
        _ => return false,
    };
    let hash_params = match fields.get(HASH_PARAMS_FIELD) {
        Some(p) if !p.is_empty() => p,
        _ => return false,
    };

    let mut parts: Vec<&str> = Vec::new();
    for name in hash_params.split(':') {
        parts.push(fields.get(name).map(String::as_str).unwrap_or(""));
    }
    parts.push(store_key);

    sha512_upper_hex(&parts) == *claimed
}

fn sha512_upper_hex(parts: &[&str]) -> String {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode_upper(hasher.finalize())
}
