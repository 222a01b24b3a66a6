use anyhow::{Result, anyhow};

pub const ADDRESS_BYTES: usize = 20;
pub const TX_HASH_BYTES: usize = 32;
pub const MAX_DESCRIPTION_LEN: usize = 2_000;
pub const MAX_ADMIN_NOTES_LEN: usize = 2_000;
pub const MAX_DOCUMENT_REF_LEN: usize = 512;
pub const MAX_ACCOUNT_NAME_LEN: usize = 128;
pub const MAX_EMAIL_LEN: usize = 254;
/// Credits in a single sell request. Keeps per-status sums well inside `i64`.
pub const MAX_SELL_AMOUNT: i64 = 1_000_000_000_000;

/// Canonical form of a chain address: `0x` followed by 40 lowercase hex digits.
pub fn normalize_wallet_address(value: &str) -> Result<String> {
    normalize_hex_with_expected(value, ADDRESS_BYTES, "wallet address")
}

/// Canonical form of a transaction hash: `0x` followed by 64 lowercase hex digits.
pub fn normalize_transaction_hash(value: &str) -> Result<String> {
    normalize_hex_with_expected(value, TX_HASH_BYTES, "transaction hash")
}

pub fn normalize_hex_with_expected(value: &str, expected_len: usize, label: &str) -> Result<String> {
    assert!(expected_len > 0, "Expected length must be > 0");
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("{label} cannot be empty"));
    }
    let Some(digits) = strip_hex_prefix(trimmed) else {
        return Err(anyhow!("{label} must start with 0x"));
    };
    let bytes =
        hex::decode(digits).map_err(|err| anyhow!("Failed to decode {label} as hex: {err}"))?;
    if bytes.len() != expected_len {
        return Err(anyhow!(
            "{label} must be {expected_len} bytes, got {}",
            bytes.len()
        ));
    }
    Ok(format!("0x{}", hex::encode(bytes)))
}

/// Trims free text; blank input collapses to `None`.
pub fn canonicalize_text(value: Option<&str>, max_len: usize, label: &str) -> Result<Option<String>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > max_len {
        return Err(anyhow!("{label} exceeds {max_len} character limit"));
    }
    Ok(Some(trimmed.to_string()))
}

pub fn canonicalize_document_ref(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Document reference cannot be empty"));
    }
    if trimmed.chars().count() > MAX_DOCUMENT_REF_LEN {
        return Err(anyhow!(
            "Document reference exceeds {MAX_DOCUMENT_REF_LEN} character limit"
        ));
    }
    Ok(trimmed.to_string())
}

pub fn canonicalize_account_name(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Name cannot be empty"));
    }
    if trimmed.chars().count() > MAX_ACCOUNT_NAME_LEN {
        return Err(anyhow!(
            "Name exceeds {MAX_ACCOUNT_NAME_LEN} character limit"
        ));
    }
    Ok(trimmed.to_string())
}

pub fn normalize_email(value: &str) -> Result<String> {
    let normalized = value.trim().to_ascii_lowercase();
    if normalized.len() > MAX_EMAIL_LEN {
        return Err(anyhow!("Email exceeds {MAX_EMAIL_LEN} character limit"));
    }
    match normalized.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(normalized),
        _ => Err(anyhow!("Email address is malformed")),
    }
}

fn strip_hex_prefix(value: &str) -> Option<&str> {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
}
