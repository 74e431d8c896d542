//! yrwatch - follow a running game through the ra2yr server and log
//! per-player summaries.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yrwatch::{
    ApiClient, ClientConfig, ClientHandlers, ConnectionNotice, GameSummary, StateRefresher,
};

/// How often the summary is written to the log.
const SUMMARY_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yrwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env();
    tracing::info!(
        address = %config.address,
        max_pending = config.max_pending,
        ack_policy = %config.ack_policy,
        "Starting yrwatch"
    );

    let handlers = ClientHandlers::new()
        .on_open(|| tracing::info!("Connection open"))
        .on_state_update(|update| {
            tracing::debug!(field = %update.field(), len = update.len(), "State updated");
        })
        .on_close(|notice| match notice {
            ConnectionNotice::Closed => tracing::info!("Connection closed"),
            ConnectionNotice::TransportError(e) => tracing::error!("Connection lost: {}", e),
            ConnectionNotice::ProtocolError(e) => tracing::warn!("Server reported: {}", e),
        });

    let client = ApiClient::new(config, handlers);
    client.connect().await?;

    let mut refresher = tokio::spawn(StateRefresher::new(client.clone()).run());
    let mut summary_ticker = tokio::time::interval(SUMMARY_INTERVAL);
    summary_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, disconnecting");
                break;
            }
            finished = &mut refresher => {
                finished??;
                tracing::info!("Refresher stopped");
                break;
            }
            _ = summary_ticker.tick() => {
                let summary = GameSummary::from_model(&client.game_state().await);
                tracing::info!("{}", serde_json::to_string(&summary)?);
            }
        }
    }

    client.disconnect().await;
    Ok(())
}
