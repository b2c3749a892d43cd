pub mod client;
pub mod fetch_utils;
pub mod http_client;
pub mod models;
pub mod urls;

pub use client::{HttpUpstreamClient, ProgramQuery, UpstreamClient};
pub use http_client::create_http_client_with_timeout;
pub use models::{FacilityRef, Program, ProgramsResponse, Session, UpstreamEvent};
pub use urls::build_programs_url;
