//! Blocking ERS client.

use std::collections::HashSet;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use super::ers::{
    EndpointEnvelope, EndpointUpdate, EndpointUpdateFields, SearchResultEnvelope,
};
use super::{EndpointGroup, GroupLookup, IdentityBackend, IseError, UpdateOutcome};
use crate::config::{IseConfig, Secret};
use crate::mac::{MacFormat, NormalizedMac, normalize};

const JSON: &str = "application/json";

pub struct IseClient {
    client: Client,
    base_url: Url,
    username: String,
    password: Secret,
    mac_format: MacFormat,
}

impl IseClient {
    const PAGE_SIZE: usize = 100;
    /// Guard against a backend that keeps handing out new page links
    const MAX_PAGES: usize = 1000;

    pub fn new(config: &IseConfig) -> Result<Self, IseError> {
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;

        warn!(
            host = base_url.host_str().unwrap_or_default(),
            "TLS certificate validation is disabled for the identity backend"
        );
        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            mac_format: config.mac_format,
        })
    }

    fn url(&self, path: &str) -> Result<Url, IseError> {
        Ok(self.base_url.join(path)?)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(&self.username, Some(self.password.expose()))
            .header(ACCEPT, JSON)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, IseError> {
        Ok(self.authorized(request).send()?)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, IseError> {
        debug!(%url, "GET");
        let response = reject_failure(self.send(self.client.get(url))?)?;
        decode(response)
    }

    fn normalize(&self, mac: &str) -> Result<NormalizedMac, IseError> {
        Ok(normalize(mac, self.mac_format)?)
    }

    /// The endpoint record for `mac`, or `None` when ISE answers 404
    fn find_endpoint(
        &self,
        mac: &NormalizedMac,
    ) -> Result<Option<super::ers::Endpoint>, IseError> {
        let url = self.url(&format!("endpoint/name/{}", mac))?;
        debug!(%url, "GET");
        let response = self.send(self.client.get(url))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let envelope: EndpointEnvelope = decode(reject_failure(response)?)?;
        Ok(Some(envelope.endpoint))
    }

    fn write_endpoint(
        &self,
        request: RequestBuilder,
        body: &EndpointUpdate<'_>,
    ) -> Result<(StatusCode, Option<String>, String), IseError> {
        let response = self
            .send(request.header(CONTENT_TYPE, JSON).json(body))?;
        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text()?;

        if !status.is_success() {
            return Err(IseError::BackendRejected {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok((status, location, text))
    }
}

fn reject_failure(response: Response) -> Result<Response, IseError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(IseError::BackendRejected {
        status: status.as_u16(),
        body,
    })
}

fn decode<T: DeserializeOwned>(response: Response) -> Result<T, IseError> {
    let text = response.text()?;
    serde_json::from_str(&text).map_err(|e| IseError::UnexpectedResponse(e.to_string()))
}

/// Last path segment of a `Location` header
fn id_from_location(location: &str) -> Option<String> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

impl IdentityBackend for IseClient {
    fn list_groups(&self) -> Result<Vec<EndpointGroup>, IseError> {
        let mut groups = Vec::new();
        let mut reported_total = None;
        let mut visited = HashSet::new();
        let mut next = Some(self.url(&format!("endpointgroup?size={}", Self::PAGE_SIZE))?);

        while let Some(url) = next.take() {
            if !visited.insert(url.to_string()) {
                warn!(%url, "endpoint group paging revisited a page; stopping");
                break;
            }
            if visited.len() > Self::MAX_PAGES {
                warn!(pages = Self::MAX_PAGES, "endpoint group paging limit reached");
                break;
            }

            let page: SearchResultEnvelope = self.get_json(url)?;
            reported_total = page.search_result.total.or(reported_total);
            groups.extend(page.search_result.resources.into_iter().map(|r| EndpointGroup {
                id: r.id,
                name: r.name,
                description: r.description,
            }));
            next = match page.search_result.next_page {
                Some(link) => Some(self.url(&link.href)?),
                None => None,
            };
        }

        if let Some(total) = reported_total
            && total != groups.len() as u64
        {
            warn!(total, fetched = groups.len(), "endpoint group total differs from fetched");
        }
        info!(count = groups.len(), "fetched endpoint groups");
        Ok(groups)
    }

    fn group_id_for_mac(&self, mac: &str) -> Result<GroupLookup, IseError> {
        let mac = self.normalize(mac)?;
        match self.find_endpoint(&mac)? {
            Some(endpoint) => {
                debug!(
                    id = %endpoint.id,
                    mac = endpoint.mac.as_deref().unwrap_or_default(),
                    group = endpoint.group_id.as_deref().unwrap_or_default(),
                    "endpoint found"
                );
                Ok(endpoint
                    .group_id
                    .filter(|id| !id.is_empty())
                    .map(GroupLookup::Found)
                    .unwrap_or(GroupLookup::NotFound))
            }
            None => Ok(GroupLookup::NotFound),
        }
    }

    fn update_group(&self, mac: &str, group_id: &str) -> Result<UpdateOutcome, IseError> {
        let mac = self.normalize(mac)?;
        let mac_text = mac.to_string();

        match self.find_endpoint(&mac)? {
            Some(endpoint) => {
                let body = EndpointUpdate {
                    endpoint: EndpointUpdateFields {
                        id: Some(&endpoint.id),
                        mac: None,
                        group_id,
                        static_group_assignment: true,
                    },
                };
                let url = self.url(&format!("endpoint/{}", endpoint.id))?;
                debug!(%url, %mac, group_id, "PUT");
                let (status, _, body) = self.write_endpoint(self.client.put(url), &body)?;
                info!(%mac, group_id, status = status.as_u16(), "endpoint group updated");
                Ok(UpdateOutcome {
                    status: status.as_u16(),
                    endpoint_id: Some(endpoint.id),
                    created: false,
                    body,
                })
            }
            None => {
                let body = EndpointUpdate {
                    endpoint: EndpointUpdateFields {
                        id: None,
                        mac: Some(&mac_text),
                        group_id,
                        static_group_assignment: true,
                    },
                };
                let url = self.url("endpoint")?;
                debug!(%url, %mac, group_id, "POST");
                let (status, location, body) =
                    self.write_endpoint(self.client.post(url), &body)?;
                info!(%mac, group_id, status = status.as_u16(), "endpoint created");
                Ok(UpdateOutcome {
                    status: status.as_u16(),
                    endpoint_id: location.as_deref().and_then(id_from_location),
                    created: true,
                    body,
                })
            }
        }
    }
}
