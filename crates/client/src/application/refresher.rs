//! Keeps the game state model fresh.
//!
//! Fetches the type catalog once, then asks for a full game state on a fixed
//! interval. Results reach the model through the session's merge; this loop
//! only issues the requests.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use yrwatch_proto::commands::GetGameState;
use yrwatch_proto::CommandType;

use crate::error::ClientError;
use crate::infrastructure::websocket::{ApiClient, PendingCallback};

pub struct StateRefresher {
    client: ApiClient,
    interval: Duration,
}

impl StateRefresher {
    pub fn new(client: ApiClient) -> Self {
        let interval = client.config().refresh_interval;
        Self { client, interval }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until the connection ends.
    pub async fn run(self) -> Result<(), ClientError> {
        match self.client.fetch_object_types().await {
            Ok(types) => tracing::info!(count = types.len(), "Type catalog fetched"),
            Err(ClientError::ConnectionClosed | ClientError::NotConnected) => return Ok(()),
            Err(e) => tracing::warn!("Type catalog unavailable: {}", e),
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if !self.client.observer().is_connected() {
                return Ok(());
            }

            let callback: PendingCallback = Box::new(|result| {
                if let Err(e) = result {
                    tracing::debug!("Game state request dropped: {}", e);
                }
            });
            match self
                .client
                .send(&GetGameState::default(), Some(callback), CommandType::ClientCommand)
                .await
            {
                Ok(()) => {}
                Err(e @ ClientError::Backpressure { .. }) => {
                    tracing::warn!("Skipping state refresh: {}", e);
                }
                Err(ClientError::NotConnected) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }
}
