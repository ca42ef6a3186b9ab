//! Cisco ISE endpoint-group management over the ERS API.

mod client;
mod error;
mod ers;

use std::collections::BTreeMap;

use serde::Serialize;

pub use client::IseClient;
pub use error::IseError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointGroup {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// Group assignment of one endpoint. A missing endpoint is data, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupLookup {
    Found(String),
    NotFound,
}

/// Backend answer to a group change, as returned by the backend
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub status: u16,
    pub endpoint_id: Option<String>,
    /// The endpoint did not exist and was created with the group
    pub created: bool,
    pub body: String,
}

/// Endpoint identity store. MAC arguments may be in any notation; they are
/// normalized before reaching the backend.
pub trait IdentityBackend {
    fn list_groups(&self) -> Result<Vec<EndpointGroup>, IseError>;

    fn group_id_for_mac(&self, mac: &str) -> Result<GroupLookup, IseError>;

    fn update_group(&self, mac: &str, group_id: &str) -> Result<UpdateOutcome, IseError>;
}

/// Group id to display name
pub fn group_catalog(groups: &[EndpointGroup]) -> BTreeMap<String, String> {
    groups
        .iter()
        .map(|g| (g.id.clone(), g.name.clone()))
        .collect()
}

/// Id of the first group called `name`. Names are not assumed to be unique.
pub fn group_id_by_name<'a>(groups: &'a [EndpointGroup], name: &str) -> Option<&'a str> {
    groups
        .iter()
        .find(|g| g.name == name)
        .map(|g| g.id.as_str())
}

/// Accept either a group id or a group name
pub fn resolve_group_id<'a>(groups: &'a [EndpointGroup], id_or_name: &str) -> Option<&'a str> {
    groups
        .iter()
        .find(|g| g.id == id_or_name)
        .map(|g| g.id.as_str())
        .or_else(|| group_id_by_name(groups, id_or_name))
}

/// Display name of the group `mac` is assigned to, `None` when the endpoint is
/// unknown or its group is not in the catalog
pub fn current_group_name<B>(backend: &B, mac: &str) -> Result<Option<String>, IseError>
where
    B: IdentityBackend + ?Sized,
{
    let GroupLookup::Found(group_id) = backend.group_id_for_mac(mac)? else {
        return Ok(None);
    };
    let groups = backend.list_groups()?;
    Ok(groups
        .into_iter()
        .find(|g| g.id == group_id)
        .map(|g| g.name))
}
