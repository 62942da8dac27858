//! Fetch a claim listing, enrich user names, and print the result as JSON.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io::{self, Write};
use std::sync::Arc;

use clap::Parser;
use claims_client::config::ClientSettings;
use claims_client::domain::ports::{ClaimListQuery, ClaimScope};
use claims_client::domain::{
    Claim, ClaimStore, ClaimStorePorts, Role, SessionIdentity, Summary, UserId,
};
use claims_client::outbound::http::{HttpGateway, HttpIdentity};
use color_eyre::eyre::{Result, WrapErr, eyre};
use ortho_config::OrthoConfig;
use reqwest::Url;
use serde::Serialize;
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// `claims-sync` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "claims-sync",
    about = "Fetch expense claims for a caller and resolve user display names",
    version
)]
struct CliArgs {
    /// Caller's user id.
    #[arg(long = "user-id", value_name = "id")]
    user_id: String,
    /// Caller's role: employee, manager, finance or admin.
    #[arg(long, value_name = "role", default_value = "employee")]
    role: String,
    /// Caller's display name.
    #[arg(long, value_name = "name")]
    name: Option<String>,
    /// Caller's manager id.
    #[arg(long = "manager-id", value_name = "id")]
    manager_id: Option<String>,
    /// Listing to fetch: mine, team or finance.
    #[arg(long, value_name = "scope", default_value = "mine", value_parser = parse_scope)]
    scope: ClaimScope,
    /// Bearer token for the session.
    #[arg(long, env = "CLAIMS_CLIENT_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncOutput {
    claims: Vec<Claim>,
    summary: Summary,
    resolved_users: usize,
    unresolved_users: usize,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("create Tokio runtime")?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args = CliArgs::parse();
    let settings = ClientSettings::load_from_iter([OsString::from("claims-sync")])
        .map_err(|error| eyre!("load settings: {error}"))?;
    let session = session_identity(&args)?;

    let base_url = Url::parse(settings.base_url()).wrap_err("parse claims service URL")?;
    let identity = args
        .token
        .map_or_else(HttpIdentity::default, HttpIdentity::with_token);
    let gateway = Arc::new(
        HttpGateway::new(base_url, settings.request_timeout(), identity)
            .wrap_err("build HTTP client")?,
    );

    let store = ClaimStore::new(
        session,
        ClaimStorePorts::new(gateway.clone(), gateway),
        settings.store_settings(),
    );
    let ticket = store
        .fetch_claims(args.scope, &ClaimListQuery::default())
        .await
        .wrap_err("fetch claims")?;
    let report = ticket.wait().await;
    if let Err(error) = store.refresh_summary().await {
        warn!(%error, "summary refresh failed; keeping listing figures");
    }
    info!(
        claims = store.claims().len(),
        resolved = report.resolved,
        "claims synchronised"
    );

    let output = SyncOutput {
        claims: store.claims(),
        summary: store.summary(),
        resolved_users: report.resolved,
        unresolved_users: report.unresolved,
    };
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &output).wrap_err("write output")?;
    writeln!(stdout).wrap_err("write output")?;
    Ok(())
}

fn session_identity(args: &CliArgs) -> Result<SessionIdentity> {
    let id = UserId::new(args.user_id.as_str()).wrap_err("invalid --user-id")?;
    let mut session = SessionIdentity::new(id, Role::parse_lenient(&args.role));
    if let Some(name) = args.name.as_deref() {
        session = session.with_name(name);
    }
    if let Some(manager_id) = args.manager_id.as_deref() {
        let manager_id = UserId::new(manager_id).wrap_err("invalid --manager-id")?;
        session = session.with_manager(manager_id);
    }
    Ok(session)
}

fn parse_scope(raw: &str) -> Result<ClaimScope, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "mine" => Ok(ClaimScope::Mine),
        "team" => Ok(ClaimScope::Team),
        "finance" => Ok(ClaimScope::Finance),
        other => Err(format!("unknown scope `{other}`; expected mine, team or finance")),
    }
}
