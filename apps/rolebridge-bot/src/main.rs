mod config;
mod handler;
mod logging;
mod platform;

use rolebridge_keycloak::KeycloakAdminClient;
use rolebridge_sync::KeycloakDirectory;
use secrecy::ExposeSecret;
use serenity::prelude::GatewayIntents;
use serenity::Client;

use crate::config::BotConfig;
use crate::handler::Handler;

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Load configuration
    let config = BotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        std::process::exit(1);
    });

    logging::init_logging(&config.log_filter, config.log_format);

    tracing::info!(
        keycloak_url = %config.keycloak_url,
        realm = %config.keycloak_realm,
        idp_alias = %config.idp_alias,
        sync_on_startup = config.sync_on_startup,
        dry_run = config.dry_run,
        notify_drift = config.notify_drift,
        "starting rolebridge bot"
    );

    let keycloak = KeycloakAdminClient::new(config.keycloak()).unwrap_or_else(|e| {
        eprintln!("Keycloak client error: {e}");
        std::process::exit(1);
    });

    // Check admin credentials before connecting to the gateway
    if let Err(e) = keycloak.test_connection().await {
        eprintln!("Keycloak authentication error: {e}");
        std::process::exit(1);
    }

    let directory = KeycloakDirectory::new(keycloak).with_idp_alias(config.idp_alias.clone());
    let handler = Handler::new(
        directory,
        config.reconcile_options(),
        config.sync_on_startup,
    );

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MEMBERS;
    let mut client = Client::builder(config.discord_token.expose_secret(), intents)
        .event_handler(handler)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Discord client error: {e}");
            std::process::exit(1);
        });

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            shard_manager.shutdown_all().await;
        }
    });

    if let Err(e) = client.start().await {
        tracing::error!(error = %e, "Discord client stopped");
        std::process::exit(1);
    }

    tracing::info!("rolebridge bot stopped");
}
