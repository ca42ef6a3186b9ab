//! Wire shapes of the ISE External RESTful Services (ERS) API.

use serde::{Deserialize, Serialize};

/// `GET endpointgroup` page
#[derive(Debug, Deserialize)]
pub struct SearchResultEnvelope {
    #[serde(rename = "SearchResult")]
    pub search_result: SearchResult,
}

#[derive(Debug, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(rename = "nextPage", default)]
    pub next_page: Option<Link>,
}

#[derive(Debug, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Link {
    pub href: String,
}

/// `GET endpoint/name/{mac}` body
#[derive(Debug, Deserialize)]
pub struct EndpointEnvelope {
    #[serde(rename = "ERSEndPoint")]
    pub endpoint: Endpoint,
}

#[derive(Debug, Deserialize)]
pub struct Endpoint {
    pub id: String,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(rename = "groupId", default)]
    pub group_id: Option<String>,
}

/// Body of `PUT endpoint/{id}` and `POST endpoint`
#[derive(Debug, Serialize)]
pub struct EndpointUpdate<'a> {
    #[serde(rename = "ERSEndPoint")]
    pub endpoint: EndpointUpdateFields<'a>,
}

#[derive(Debug, Serialize)]
pub struct EndpointUpdateFields<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<&'a str>,
    #[serde(rename = "groupId")]
    pub group_id: &'a str,
    #[serde(rename = "staticGroupAssignment")]
    pub static_group_assignment: bool,
}
