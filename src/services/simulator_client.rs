//! Simulator service client
//!
//! The reconciler talks to the simulator only through [`SimulatorClient`].
//! [`HttpSimulatorClient`] is the production implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::simulator::{
    PlayerPage, RawGameResponse, RawPlayerPayload, RawStatPayload, RemoteGame, SubmitGameRequest,
    SubmittedGame,
};

#[derive(Debug, Error)]
pub enum SimulatorError {
    /// Connection, timeout or body decoding failure
    #[error("transport error: {0}")]
    Transport(String),
    /// Simulator answered with a non-success status code
    #[error("simulator returned {status}: {body}")]
    Remote { status: u16, body: String },
    /// Simulator answered with something outside its contract
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for SimulatorError {
    fn from(err: reqwest::Error) -> Self {
        SimulatorError::Transport(err.to_string())
    }
}

#[async_trait]
pub trait SimulatorClient: Send + Sync {
    /// Submit a game between two lineups; returns the simulator's handle
    async fn submit_game(&self, request: &SubmitGameRequest) -> Result<SubmittedGame, SimulatorError>;

    /// Poll a submitted game
    async fn fetch_game(&self, handle: &str) -> Result<RemoteGame, SimulatorError>;

    /// One page of the player listing; `None` cursor is the first page
    async fn fetch_players_page(&self, cursor: Option<&str>) -> Result<PlayerPage, SimulatorError>;

    /// Aggregate stats for the given players
    async fn fetch_player_stats(&self, ids: &[Uuid]) -> Result<Vec<RawStatPayload>, SimulatorError>;
}

/// Drain the paginated player listing into memory
pub async fn fetch_all_players(
    client: &dyn SimulatorClient,
) -> Result<Vec<RawPlayerPayload>, SimulatorError> {
    let mut players = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = client.fetch_players_page(cursor.as_deref()).await?;
        tracing::debug!("Fetched {} players (cursor: {:?})", page.results.len(), cursor);
        players.extend(page.results);

        match page.next {
            Some(next) if Some(&next) != cursor.as_ref() => cursor = Some(next),
            Some(next) => {
                return Err(SimulatorError::Protocol(format!(
                    "player listing returned the same cursor twice: {}",
                    next
                )));
            }
            None => break,
        }
    }

    Ok(players)
}

#[derive(Serialize)]
struct PlayerStatsRequest<'a> {
    ids: &'a [Uuid],
}

#[derive(Clone)]
pub struct HttpSimulatorClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl HttpSimulatorClient {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self, SimulatorError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("accept", "application/json");
        match &self.api_key {
            Some(key) => request.header("authorization", format!("Api-Key {}", key)),
            None => request,
        }
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response, SimulatorError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SimulatorError::Remote { status, body });
        }
        Ok(response)
    }
}

#[async_trait]
impl SimulatorClient for HttpSimulatorClient {
    async fn submit_game(&self, request: &SubmitGameRequest) -> Result<SubmittedGame, SimulatorError> {
        tracing::info!("Submitting game to simulator (published: {})", request.published);

        let response = self
            .authorized(self.client.post(self.url("games/")))
            .json(request)
            .send()
            .await?;

        let submitted: SubmittedGame = Self::checked(response).await?.json().await?;
        tracing::debug!("Simulator accepted game {}", submitted.id);
        Ok(submitted)
    }

    async fn fetch_game(&self, handle: &str) -> Result<RemoteGame, SimulatorError> {
        let response = self
            .authorized(self.client.get(self.url(&format!("games/{}/", handle))))
            .send()
            .await?;

        let raw: RawGameResponse = Self::checked(response).await?.json().await?;
        RemoteGame::try_from(raw).map_err(SimulatorError::Protocol)
    }

    async fn fetch_players_page(&self, cursor: Option<&str>) -> Result<PlayerPage, SimulatorError> {
        let mut request = self.authorized(self.client.get(self.url("players/")));
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        let response = request.send().await?;
        Ok(Self::checked(response).await?.json().await?)
    }

    async fn fetch_player_stats(&self, ids: &[Uuid]) -> Result<Vec<RawStatPayload>, SimulatorError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .authorized(self.client.post(self.url("players/stats/")))
            .json(&PlayerStatsRequest { ids })
            .send()
            .await?;

        Ok(Self::checked(response).await?.json().await?)
    }
}
