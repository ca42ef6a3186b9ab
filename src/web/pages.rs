//! Route handlers. Each one runs the blocking core call on the blocking pool
//! and renders a template with the result.

use std::collections::BTreeMap;
use std::net::IpAddr;

use actix_web::http::StatusCode;
use actix_web::web::{Data, Form, Path, ServiceConfig};
use actix_web::{HttpResponse, get, post};
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use tokio::task;
use tracing::warn;

use super::{AppState, render, render_error};
use crate::config::IseConfig;
use crate::ise::{GroupLookup, IdentityBackend, IseClient, IseError, group_catalog};
use crate::mac::{MacFormat, normalize};

pub fn routes(cfg: &mut ServiceConfig) {
    cfg.service(index)
        .service(check_result)
        .service(mac_page)
        .service(update_mac)
        .service(search_endpoint);
}

/// Current assignment of one endpoint plus the groups it can move to
#[derive(Debug, Serialize)]
struct MacView {
    mac: String,
    current_group: String,
    groups: BTreeMap<String, String>,
}

fn mac_view<B: IdentityBackend + ?Sized>(backend: &B, mac: &str) -> Result<MacView, IseError> {
    let normalized = normalize(mac, MacFormat::Colon)?;
    let lookup = backend.group_id_for_mac(mac)?;
    let groups = group_catalog(&backend.list_groups()?);

    let current_group = match &lookup {
        GroupLookup::Found(id) => groups.get(id).cloned(),
        GroupLookup::NotFound => None,
    }
    .unwrap_or_else(|| "Unknown".to_string());

    Ok(MacView {
        mac: normalized.to_string(),
        current_group,
        groups,
    })
}

fn load_mac_view(config: &IseConfig, mac: &str) -> Result<MacView, IseError> {
    let client = IseClient::new(config)?;
    mac_view(&client, mac)
}

fn render_mac_view(tera: &Tera, view: &MacView) -> HttpResponse {
    let mut context = Context::new();
    context.insert("mac_check", &true);
    context.insert("mac", &view.mac);
    context.insert("endpoint_group", &view.current_group);
    context.insert("ise_groups", &view.groups);
    render(tera, "update-mac.html", &context)
}

fn ise_failure(tera: &Tera, error: &IseError) -> HttpResponse {
    warn!(error = %error, "identity backend call failed");
    let status = match error {
        IseError::MalformedMac(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    };
    render_error(tera, status, &error.to_string())
}

#[get("/")]
async fn index(tera: Data<Tera>) -> HttpResponse {
    render(&tera, "main.html", &Context::new())
}

#[derive(Deserialize)]
struct CheckForm {
    ip_address: String,
}

#[post("/check-result")]
async fn check_result(
    tera: Data<Tera>,
    state: Data<AppState>,
    form: Form<CheckForm>,
) -> HttpResponse {
    let Ok(switch) = form.ip_address.trim().parse::<IpAddr>() else {
        let message = format!("{:?} is not an IP address", form.ip_address);
        return render_error(&tera, StatusCode::BAD_REQUEST, &message);
    };

    let collector = state.collector.clone();
    let result = task::spawn_blocking(move || collector(switch)).await;

    match result {
        Ok(Ok(report)) => {
            let mut context = Context::new();
            context.insert("report", &report);
            render(&tera, "check-result.html", &context)
        }
        Ok(Err(e)) => {
            warn!(%switch, error = %e, "switch collection failed");
            render_error(&tera, StatusCode::BAD_GATEWAY, &e.to_string())
        }
        Err(e) => render_error(&tera, StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

#[get("/mac/{mac}")]
async fn mac_page(tera: Data<Tera>, state: Data<AppState>, mac: Path<String>) -> HttpResponse {
    let mac = mac.into_inner();
    let config = state.config.clone();

    match task::spawn_blocking(move || load_mac_view(&config.ise, &mac)).await {
        Ok(Ok(view)) => render_mac_view(&tera, &view),
        Ok(Err(e)) => ise_failure(&tera, &e),
        Err(e) => render_error(&tera, StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

#[derive(Deserialize)]
struct UpdateForm {
    ise_group_id: String,
}

#[post("/update/{mac}")]
async fn update_mac(
    tera: Data<Tera>,
    state: Data<AppState>,
    mac: Path<String>,
    form: Form<UpdateForm>,
) -> HttpResponse {
    let mac = mac.into_inner();
    let group_id = form.into_inner().ise_group_id;
    let config = state.config.clone();

    let task_mac = mac.clone();
    let result = task::spawn_blocking(move || {
        IseClient::new(&config.ise)?.update_group(&task_mac, &group_id)
    })
    .await;

    let mut context = Context::new();
    context.insert("mac", &mac);
    match result {
        Ok(Ok(outcome)) => {
            context.insert("result", &true);
            context.insert("status", &outcome.status);
            context.insert("created", &outcome.created);
            context.insert("body", &outcome.body);
        }
        Ok(Err(IseError::BackendRejected { status, body })) => {
            warn!(%mac, status, "group update rejected");
            context.insert("result", &false);
            context.insert("status", &status);
            context.insert("created", &false);
            context.insert("body", &body);
        }
        Ok(Err(e)) => return ise_failure(&tera, &e),
        Err(e) => {
            return render_error(&tera, StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
        }
    }
    render(&tera, "update-result.html", &context)
}

#[derive(Deserialize)]
struct EndpointForm {
    mac: String,
}

#[post("/endpoint")]
async fn search_endpoint(
    tera: Data<Tera>,
    state: Data<AppState>,
    form: Form<EndpointForm>,
) -> HttpResponse {
    let mac = form.into_inner().mac;
    if normalize(&mac, MacFormat::Dot).is_err() {
        let mut context = Context::new();
        context.insert("mac_check", &false);
        context.insert("mac", &mac);
        return render(&tera, "update-mac.html", &context);
    }

    let config = state.config.clone();
    match task::spawn_blocking(move || load_mac_view(&config.ise, &mac)).await {
        Ok(Ok(view)) => render_mac_view(&tera, &view),
        Ok(Err(e)) => ise_failure(&tera, &e),
        Err(e) => render_error(&tera, StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}
