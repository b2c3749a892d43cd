//! Cache key construction for discovery payloads.
//!
//! Keys have the shape `{mode}:{scope}:{fingerprint}` where the scope is the
//! tenant slug (or `adhoc`) and the fingerprint summarizes the inputs the
//! payload was computed from.

use sha2::{Digest, Sha256};

use super::models::Mode;

const FINGERPRINT_LEN: usize = 16;

/// Stable hash over the organization set, facility filter and API key.
///
/// Order and duplicates in the id lists do not affect the result.
pub fn scope_fingerprint(
    organization_ids: &[String],
    facility_ids: &[String],
    api_key: &str,
    include_past: bool,
) -> String {
    let mut orgs: Vec<&str> = organization_ids.iter().map(String::as_str).collect();
    orgs.sort_unstable();
    orgs.dedup();
    let mut facilities: Vec<&str> = facility_ids.iter().map(String::as_str).collect();
    facilities.sort_unstable();
    facilities.dedup();

    let mut hasher = Sha256::new();
    hasher.update(b"orgs=");
    hasher.update(orgs.join(",").as_bytes());
    hasher.update(b"|facilities=");
    hasher.update(facilities.join(",").as_bytes());
    hasher.update(b"|key=");
    hasher.update(api_key.as_bytes());
    if include_past {
        hasher.update(b"|past");
    }

    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(FINGERPRINT_LEN);
    digest
}

pub fn cache_key(mode: Mode, scope: &str, fingerprint: &str) -> String {
    format!("{}:{}:{}", mode.as_str(), scope, fingerprint)
}

/// Long-lived fallback slot for the last successful full payload
pub fn last_known_good_key(scope: &str, fingerprint: &str) -> String {
    format!("lkg:{scope}:{fingerprint}")
}

pub fn refresh_marker_key(slug: &str) -> String {
    format!("last-refreshed:{slug}")
}

/// Glob matching every payload and fallback entry of a tenant
pub fn tenant_pattern(slug: &str) -> String {
    format!("*:{slug}:*")
}
