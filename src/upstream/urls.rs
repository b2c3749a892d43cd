//! URL building utilities for upstream endpoints

/// Builds the programs URL for one organization.
///
/// # Arguments
/// * `api_domain` - The base API domain
/// * `org_id` - The upstream organization id
/// * `expand` - Comma separated relationships to embed
/// * `facility_ids` - Optional facility filter, sent comma separated
///
/// # Example
/// ```
/// use discovery_events::upstream::build_programs_url;
///
/// let url = build_programs_url("https://api.example.com", "10", "sessions", &[]);
/// assert_eq!(url, "https://api.example.com/v1/organizations/10/programs?expand=sessions");
///
/// let url = build_programs_url("https://api.example.com/", "10", "sessions", &["3".to_string(), "4".to_string()]);
/// assert_eq!(url, "https://api.example.com/v1/organizations/10/programs?expand=sessions&facilityId=3,4");
/// ```
pub fn build_programs_url(
    api_domain: &str,
    org_id: &str,
    expand: &str,
    facility_ids: &[String],
) -> String {
    let base = api_domain.trim_end_matches('/');
    let mut url = format!("{base}/v1/organizations/{org_id}/programs?expand={expand}");
    if !facility_ids.is_empty() {
        url.push_str("&facilityId=");
        url.push_str(&facility_ids.join(","));
    }
    url
}
