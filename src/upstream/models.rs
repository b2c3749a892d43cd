//! Wire models of the upstream programs endpoint
//!
//! The upstream nests occurrences as program → session → events/segments.
//! Everything below the program id is optional on the wire: a missing or
//! `null` collection is read as empty so that partial records still flatten.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Text(String),
    Number(i64),
}

impl From<IdRepr> for String {
    fn from(id: IdRepr) -> Self {
        match id {
            IdRepr::Text(s) => s,
            IdRepr::Number(n) => n.to_string(),
        }
    }
}

/// Ids arrive as strings from some endpoints and integers from others
fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    IdRepr::deserialize(deserializer).map(String::from)
}

fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<IdRepr>::deserialize(deserializer)?.map(String::from))
}

fn de_vec_or_null<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Envelope of `GET /organizations/{id}/programs`. Programs are kept as raw
/// JSON so one malformed record does not discard its siblings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgramsResponse {
    #[serde(default, deserialize_with = "de_vec_or_null")]
    pub data: Vec<serde_json::Value>,
}

impl ProgramsResponse {
    /// Parses each program independently, skipping the ones that do not match
    /// the expected shape.
    pub fn into_programs(self, org_id: &str) -> Vec<Program> {
        let total = self.data.len();
        let programs: Vec<Program> = self
            .data
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<Program>(value) {
                Ok(program) => Some(program),
                Err(e) => {
                    warn!("Skipping malformed program for organization {org_id}: {e}");
                    None
                }
            })
            .collect();

        if programs.len() < total {
            warn!(
                "Organization {}: kept {} of {} programs",
                org_id,
                programs.len(),
                total
            );
        }
        programs
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "registrationOpen", default)]
    pub registration_open: Option<bool>,
    #[serde(default, deserialize_with = "de_vec_or_null")]
    pub sessions: Vec<Session>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "registrationOpen", default)]
    pub registration_open: Option<bool>,
    #[serde(default)]
    pub facility: Option<FacilityRef>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "de_vec_or_null")]
    pub events: Vec<UpstreamEvent>,
    #[serde(default, deserialize_with = "de_vec_or_null")]
    pub segments: Vec<UpstreamEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityRef {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// IANA zone of the facility, when the upstream provides one
    #[serde(default)]
    pub timezone: Option<String>,
}

/// One dated occurrence of a session (an event or a segment)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamEvent {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(rename = "facilityId", default, deserialize_with = "de_opt_id")]
    pub facility_id: Option<String>,
    #[serde(rename = "spotsRemaining", default)]
    pub spots_remaining: Option<i64>,
    #[serde(default)]
    pub capacity: Option<i64>,
    #[serde(default)]
    pub price: Option<f64>,
}
