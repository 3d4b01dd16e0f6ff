//! Channel URL normalization
//!
//! Reproduces the historical normalization exactly: creators paste anything
//! from `@handle`-less bare names to full `https://t.me/...` links, and every
//! stored URL must come out canonical so the join-gate button renders a
//! working link.

use crate::core::{AppError, AppResult};

/// Canonical host prefix every channel URL must carry.
const HOST_PREFIX: &str = "t.me/";

/// Normalize creator input into a canonical `https://t.me/...` URL.
///
/// Steps, in order: trim; strip one leading `http://`/`https://`
/// (case-insensitive); strip trailing slashes; prepend `t.me/` unless the
/// remainder already starts with it (case-insensitive); re-prepend
/// `https://`. The result must be exactly `https://t.me/` plus a non-empty
/// rest, with the prefix in canonical case; anything else is rejected.
/// Normalization is idempotent over its own output.
pub fn normalize_channel_url(input: &str) -> AppResult<String> {
    let mut rest = input.trim().to_string();

    let lower = rest.to_ascii_lowercase();
    if lower.starts_with("https://") {
        rest = rest.split_off(8);
    } else if lower.starts_with("http://") {
        rest = rest.split_off(7);
    }

    while rest.ends_with('/') {
        rest.pop();
    }

    // A scheme other than http/https survives stripping; such input can
    // never become a valid channel link.
    if rest.contains("://") {
        return Err(AppError::InvalidChannelUrl(input.to_string()));
    }

    if !rest.to_ascii_lowercase().starts_with(HOST_PREFIX) {
        rest = format!("{}{}", HOST_PREFIX, rest);
    }

    let url = format!("https://{}", rest);

    let Some(name) = url.strip_prefix("https://t.me/") else {
        return Err(AppError::InvalidChannelUrl(input.to_string()));
    };
    if name.is_empty() {
        return Err(AppError::InvalidChannelUrl(input.to_string()));
    }

    Ok(url)
}
