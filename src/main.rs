mod config;
mod ise;
mod logging;
mod mac;
mod pipeline;
mod switch;
mod vendor;
mod web;

#[cfg(test)]
mod test_utils;

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use config::AppConfig;
use ise::{GroupLookup, IdentityBackend, IseClient, current_group_name, resolve_group_id};
use mac::{MacFormat, normalize};
use pipeline::{CollectionReport, collect_from_switch};
use vendor::VendorResolver;

#[derive(Parser)]
#[command(name = "switch-session-manager")]
#[command(about = "Find failed 802.1X/MAB sessions on Cisco switches and fix their ISE endpoint groups")]
struct Cli {
    /// Verbose logging (overridden by RUST_LOG)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect non-authorized access sessions from a switch
    Check {
        switch: IpAddr,

        /// Also write the report as JSON to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List ISE endpoint groups
    Groups,
    /// Show the endpoint group of a MAC address
    Lookup { mac: String },
    /// Move a MAC address to another endpoint group
    Update {
        mac: String,
        /// Group id or group name
        group: String,
    },
    /// Print a MAC address in another notation
    Normalize {
        mac: String,

        #[arg(long, default_value = "colon")]
        format: MacFormat,
    },
    /// Start the web interface
    Serve {
        #[arg(long)]
        address: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.debug);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<(), String> {
    if let Commands::Normalize { mac, format } = &command {
        let normalized = normalize(mac, *format).map_err(|e| e.to_string())?;
        println!("{}", normalized);
        return Ok(());
    }

    let config = AppConfig::from_env().map_err(|e| e.to_string())?;

    match command {
        Commands::Check { switch, output } => check(&config, switch, output),
        Commands::Groups => groups(&config),
        Commands::Lookup { mac } => lookup(&config, &mac),
        Commands::Update { mac, group } => update(&config, &mac, &group),
        Commands::Serve { address, port } => serve(config, address, port),
        Commands::Normalize { .. } => Ok(()),
    }
}

fn ise_client(config: &AppConfig) -> Result<IseClient, String> {
    config.validate_ise().map_err(|e| e.to_string())?;
    IseClient::new(&config.ise).map_err(|e| e.to_string())
}

fn check(config: &AppConfig, switch: IpAddr, output: Option<PathBuf>) -> Result<(), String> {
    config.validate_switch().map_err(|e| e.to_string())?;
    let vendors = VendorResolver::from_config(&config.vendor);
    let report = collect_from_switch(config, &vendors, switch).map_err(|e| e.to_string())?;

    print_report(&report);

    if let Some(path) = output {
        write_report(&report, &path)?;
        println!("Report written to {}", path.display());
    }

    if let Some(e) = &report.error {
        return Err(format!("collection incomplete: {}", e));
    }
    if !report.is_complete() {
        println!("{} line(s) could not be parsed", report.issues.len());
    }
    Ok(())
}

fn write_report(report: &CollectionReport, path: &Path) -> Result<(), String> {
    let json = serde_json::to_string_pretty(report).map_err(|e| e.to_string())?;
    fs::write(path, json).map_err(|e| format!("{}: {}", path.display(), e))
}

fn print_report(report: &CollectionReport) {
    println!(
        "{} non-authorized session(s) on {}{}",
        report.sessions.len(),
        report.switch,
        if report.privileged { "" } else { " (no enable mode, summary only)" }
    );
    if !report.sessions.is_empty() {
        print_sessions(report);
    }
    for issue in &report.issues {
        println!("skipped {}", issue);
    }
}

fn print_sessions(report: &CollectionReport) {
    println!(
        "{:<16} {:<24} {:<16} {:<8} {:<14} {:<24} {}",
        "MAC", "Interface", "IP", "Method", "Status", "Vendor", "Failure"
    );
    for (mac, session) in &report.sessions {
        println!(
            "{:<16} {:<24} {:<16} {:<8} {:<14} {:<24} {}",
            mac,
            session.interface,
            session.ip_address.map(|ip| ip.to_string()).unwrap_or_default(),
            session.method.to_string(),
            session.status.to_string(),
            session.vendor.as_ref().map(|v| v.to_string()).unwrap_or_default(),
            session.failure_reason.as_deref().unwrap_or("")
        );
    }
}

fn groups(config: &AppConfig) -> Result<(), String> {
    let client = ise_client(config)?;
    let groups = client.list_groups().map_err(|e| e.to_string())?;
    for group in &groups {
        println!(
            "{}  {}  {}",
            group.id,
            group.name,
            group.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn lookup(config: &AppConfig, mac: &str) -> Result<(), String> {
    let client = ise_client(config)?;
    match client.group_id_for_mac(mac).map_err(|e| e.to_string())? {
        GroupLookup::Found(id) => {
            let name = current_group_name(&client, mac).map_err(|e| e.to_string())?;
            println!("{}  {}", id, name.as_deref().unwrap_or("Unknown"));
        }
        GroupLookup::NotFound => println!("{} not found", mac),
    }
    Ok(())
}

fn update(config: &AppConfig, mac: &str, group: &str) -> Result<(), String> {
    let client = ise_client(config)?;
    let groups = client.list_groups().map_err(|e| e.to_string())?;
    let group_id = resolve_group_id(&groups, group)
        .ok_or_else(|| format!("no endpoint group with id or name {:?}", group))?;

    let outcome = client
        .update_group(mac, group_id)
        .map_err(|e| e.to_string())?;
    println!(
        "HTTP {}: {} {}",
        outcome.status,
        mac,
        if outcome.created { "created" } else { "updated" }
    );
    Ok(())
}

fn serve(config: AppConfig, address: Option<String>, port: Option<u16>) -> Result<(), String> {
    config.validate().map_err(|e| e.to_string())?;
    let bind = address.unwrap_or_else(|| config.web.bind.clone());
    let port = port.unwrap_or(config.web.port);
    let vendors = VendorResolver::from_config(&config.vendor);
    let state = web::AppState::new(config, vendors);
    web::start(state, &bind, port).map_err(|e| e.to_string())
}
