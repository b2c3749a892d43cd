//! Cache data structures with TTL support

use std::time::{Duration, Instant};

/// Serialized cache value with TTL support
#[derive(Debug, Clone)]
pub struct CachedValue {
    pub data: String,
    pub cached_at: Instant,
    pub ttl_seconds: u64,
}

impl CachedValue {
    /// Creates a new cached entry
    pub fn new(data: String, ttl_seconds: u64) -> Self {
        Self {
            data,
            cached_at: Instant::now(),
            ttl_seconds,
        }
    }

    /// Gets the TTL duration for this cache entry
    pub fn get_ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Checks if the cached data is expired
    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() >= self.get_ttl()
    }
}

/// Redis-style glob match supporting `*` (any run) and `?` (one character)
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut p, mut k) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut star_k = 0usize;

    while k < key.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == key[k]) {
            p += 1;
            k += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            star_k = k;
            p += 1;
        } else if let Some(star_p) = star {
            p = star_p + 1;
            star_k += 1;
            k = star_k;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_value_expiry() {
        let value = CachedValue::new("x".to_string(), 60);
        assert!(!value.is_expired());

        let expired = CachedValue::new("x".to_string(), 0);
        assert!(expired.is_expired());
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*:acme:*", "full:acme:abc123"));
        assert!(glob_match("*:acme:*", "lkg:acme:abc123"));
        assert!(!glob_match("*:acme:*", "full:acme2:abc123"));
        assert!(!glob_match("*:acme:*", "last-refreshed:acme"));
        assert!(glob_match("full:*", "full:adhoc:ff"));
        assert!(glob_match("full:?cme:*", "full:acme:1"));
        assert!(glob_match("*", ""));
        assert!(!glob_match("", "a"));
        assert!(glob_match("a*b*c", "axxbyyc"));
        assert!(!glob_match("a*b*c", "axxbyy"));
    }
}
