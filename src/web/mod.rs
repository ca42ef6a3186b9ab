//! Browser front end. Thin actix-web handlers over the pipeline and the ISE
//! client; templates are compiled into the binary.

mod pages;

use std::io;
use std::net::IpAddr;
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::web::Data;
use actix_web::{App, HttpResponse, HttpServer};
use rust_embed::RustEmbed;
use tera::{Context, Tera};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::pipeline::{CollectionReport, collect_from_switch};
use crate::switch::ScraperError;
use crate::vendor::VendorResolver;

#[derive(RustEmbed)]
#[folder = "templates/"]
struct Templates;

/// One collection run against the switch at the given address
type SwitchCollector = dyn Fn(IpAddr) -> Result<CollectionReport, ScraperError> + Send + Sync;

/// Shared by every worker
#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    collector: Arc<SwitchCollector>,
}

impl AppState {
    /// Switches are reached over SSH with the configured credentials
    pub fn new(config: AppConfig, vendors: VendorResolver) -> Self {
        let config = Arc::new(config);
        let ssh_config = config.clone();
        Self {
            config,
            collector: Arc::new(move |switch: IpAddr| {
                collect_from_switch(&ssh_config, &vendors, switch)
            }),
        }
    }
}

pub fn load_templates() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    let sources: Vec<(String, String)> = Templates::iter()
        .filter_map(|name| {
            let file = Templates::get(&name)?;
            Some((
                name.to_string(),
                String::from_utf8_lossy(&file.data).into_owned(),
            ))
        })
        .collect();
    tera.add_raw_templates(sources)?;
    Ok(tera)
}

/// Run the web server on the current thread until it is stopped
pub fn start(state: AppState, bind: &str, port: u16) -> io::Result<()> {
    let tera = load_templates().map_err(|e| io::Error::other(e.to_string()))?;
    let address = (bind.to_string(), port);
    info!(bind, port, "starting web server");

    actix_rt::System::new().block_on(async move {
        HttpServer::new(move || {
            App::new()
                .app_data(Data::new(tera.clone()))
                .app_data(Data::new(state.clone()))
                .configure(pages::routes)
        })
        .bind(address)?
        .run()
        .await
    })
}

fn render(tera: &Tera, template: &str, context: &Context) -> HttpResponse {
    render_with_status(tera, StatusCode::OK, template, context)
}

fn render_with_status(
    tera: &Tera,
    status: StatusCode,
    template: &str,
    context: &Context,
) -> HttpResponse {
    match tera.render(template, context) {
        Ok(body) => HttpResponse::build(status)
            .content_type("text/html; charset=utf-8")
            .body(body),
        Err(e) => {
            error!(template, error = ?e, "template rendering failed");
            HttpResponse::InternalServerError().body("template rendering failed")
        }
    }
}

fn render_error(tera: &Tera, status: StatusCode, message: &str) -> HttpResponse {
    let mut context = Context::new();
    context.insert("message", message);
    context.insert("status", &status.as_u16());
    render_with_status(tera, status, "error.html", &context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_templates_load() {
        let tera = load_templates().unwrap();
        let names: Vec<&str> = tera.get_template_names().collect();
        for expected in [
            "base.html",
            "main.html",
            "check-result.html",
            "update-mac.html",
            "update-result.html",
            "error.html",
        ] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_error_page_carries_status() {
        let tera = load_templates().unwrap();
        let response = render_error(&tera, StatusCode::BAD_GATEWAY, "<script>");
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
