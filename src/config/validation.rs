use crate::config::tenants::TenantConfig;
use crate::error::AppError;
use chrono_tz::Tz;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

/// Validates the upstream API domain and log file path
///
/// # Validation Rules
/// - API domain cannot be empty
/// - API domain must be a valid URL or domain name
/// - If log file path is provided, it cannot be empty
/// - Log file path parent directory must exist or be creatable
pub fn validate_config(api_domain: &str, log_file_path: &Option<String>) -> Result<(), AppError> {
    if api_domain.is_empty() {
        return Err(AppError::config_error("API domain cannot be empty"));
    }

    // Check if API domain looks like a valid URL or domain
    if !api_domain.starts_with("http://") && !api_domain.starts_with("https://") {
        // If it doesn't start with protocol, it should at least look like a domain
        if !api_domain.contains('.') && !api_domain.starts_with("localhost") {
            return Err(AppError::config_error(
                "API domain must be a valid URL or domain name",
            ));
        }
    }

    if let Some(log_path) = log_file_path {
        if log_path.is_empty() {
            return Err(AppError::config_error("Log file path cannot be empty"));
        }

        if let Some(parent) = Path::new(log_path).parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::config_error(format!(
                    "Cannot create log directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    Ok(())
}

/// Validates tenant definitions
///
/// # Validation Rules
/// - Slugs are non-empty, unique and contain no `:` (the cache key separator)
/// - Time zones are IANA names
/// - Organization ids are non-empty strings
pub fn validate_tenants(tenants: &[TenantConfig]) -> Result<(), AppError> {
    let mut seen = HashSet::new();

    for tenant in tenants {
        if tenant.slug.trim().is_empty() {
            return Err(AppError::config_error("Tenant slug cannot be empty"));
        }
        if tenant.slug.contains(':') {
            return Err(AppError::config_error(format!(
                "Tenant slug '{}' cannot contain ':'",
                tenant.slug
            )));
        }
        if !seen.insert(tenant.slug.as_str()) {
            return Err(AppError::config_error(format!(
                "Duplicate tenant slug '{}'",
                tenant.slug
            )));
        }
        if Tz::from_str(&tenant.timezone).is_err() {
            return Err(AppError::config_error(format!(
                "Tenant '{}' has unknown time zone '{}'",
                tenant.slug, tenant.timezone
            )));
        }
        if tenant.organization_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(AppError::config_error(format!(
                "Tenant '{}' has an empty organization id",
                tenant.slug
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_api_domain() {
        assert!(validate_config("https://api.example.com", &None).is_ok());
        assert!(validate_config("localhost:8080", &None).is_ok());
        assert!(validate_config("", &None).is_err());
        assert!(validate_config("invalid_domain", &None).is_err());
        assert!(validate_config("https://api.example.com", &Some(String::new())).is_err());
    }

    #[test]
    fn test_validate_tenants_rejects_duplicates() {
        let tenants = vec![
            TenantConfig::new("acme", vec!["10".to_string()]),
            TenantConfig::new("acme", vec!["20".to_string()]),
        ];
        let err = validate_tenants(&tenants).unwrap_err();
        assert!(err.to_string().contains("Duplicate tenant slug"));
    }

    #[test]
    fn test_validate_tenants_rejects_bad_values() {
        let mut bad_zone = TenantConfig::new("acme", vec!["10".to_string()]);
        bad_zone.timezone = "Nowhere/Land".to_string();
        assert!(validate_tenants(&[bad_zone]).is_err());

        let bad_slug = TenantConfig::new("ac:me", vec!["10".to_string()]);
        assert!(validate_tenants(&[bad_slug]).is_err());

        let empty_org = TenantConfig::new("acme", vec![" ".to_string()]);
        assert!(validate_tenants(&[empty_org]).is_err());

        // Zero organizations is reported per request, not at load time
        let no_orgs = TenantConfig::new("acme", vec![]);
        assert!(validate_tenants(&[no_orgs]).is_ok());
    }
}
