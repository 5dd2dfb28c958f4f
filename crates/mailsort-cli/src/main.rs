//! mailsort - sort an Outlook inbox with a local language model
//!
//! Signs in through the browser, fetches a batch of inbox emails, asks an
//! Ollama model for a category per email and files it accordingly.

mod config;

use anyhow::Context;
use clap::Parser;
use config::{Cli, ConfigError};
use mailsort_auth::{microsoft, OAuth2Flow};
use mailsort_core::{
    BodyNormalizer, DecisionApplier, FolderResolver, OllamaClassifier, RunSummary, Sorter,
    TracingLogger,
};
use mailsort_graph::{GraphMailClient, MailboxApi};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_logging(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn print_setup_hints() {
    eprintln!();
    eprintln!("To configure an Azure app registration:");
    eprintln!("  1. Go to https://portal.azure.com");
    eprintln!("  2. App registrations > New registration");
    eprintln!("  3. Copy the Application (client) ID into MICROSOFT_CLIENT_ID");
    eprintln!("  4. Configure the Mail.Read and Mail.ReadWrite API permissions");
}

async fn run(cli: &Cli) -> anyhow::Result<RunSummary> {
    let client_id = cli.client_id()?;
    let oauth_config = microsoft::oauth2_config(
        client_id,
        &cli.tenant_id,
        cli.client_secret.clone(),
        &cli.redirect_uri,
    )?;

    info!("Authenticating with Microsoft...");
    let mut flow = OAuth2Flow::new(oauth_config)?;
    let tokens = flow
        .authenticate(cli.auth_timeout())
        .await
        .context("Authentication failed")?;
    info!("Authentication successful");

    let logger = TracingLogger::shared();
    let mailbox: Arc<dyn MailboxApi> = Arc::new(GraphMailClient::new(tokens.access_token));
    let resolver = Arc::new(FolderResolver::new(mailbox.clone(), logger.clone()));
    let applier = DecisionApplier::new(mailbox.clone(), resolver, logger.clone());
    let classifier = Arc::new(OllamaClassifier::new(
        &cli.ollama_host,
        &cli.model,
        logger.clone(),
    ));

    let sorter = Sorter::new(
        mailbox,
        classifier,
        applier,
        BodyNormalizer::new(logger.clone()),
        logger,
        cli.sort_options(),
    );
    Ok(sorter.run().await?)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli);

    info!(
        "Starting mailsort (model {}, limit {}{})",
        cli.model,
        cli.email_limit,
        if cli.dry_run { ", dry run" } else { "" }
    );

    tokio::select! {
        result = run(&cli) => match result {
            Ok(summary) => {
                info!(
                    "Done: {} fetched, {} applied, {} dry-run, {} failed",
                    summary.fetched, summary.applied, summary.skipped_dry_run, summary.failed
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{:#}", e);
                let missing_id = matches!(
                    e.downcast_ref::<ConfigError>(),
                    Some(ConfigError::MissingClientId)
                );
                if missing_id || format!("{:#}", e).contains("client_id") {
                    print_setup_hints();
                }
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, goodbye");
            ExitCode::SUCCESS
        }
    }
}
