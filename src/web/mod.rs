//! JSON API over a running campaign.
//!
//! The campaign lives on one blocking writer task. Handlers talk to it through
//! [`CampaignHandle`]; every snapshot change is broadcast to `/api/events`
//! subscribers as a serialized [`SimulationView`].

use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::{
    net::TcpListener,
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::{
    campaign::Campaign,
    engine::Command,
    persistence::SnapshotStore,
    rng::DrawSource,
    runtime::SimulationView,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandReply {
    pub changed: bool,
    pub state: SimulationView,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingState {
    pub seen: bool,
}

enum Request {
    Command(Command, oneshot::Sender<CommandReply>),
    View(oneshot::Sender<SimulationView>),
    Onboarding(oneshot::Sender<bool>),
    MarkOnboarding(oneshot::Sender<bool>),
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
#[error("campaign writer is no longer running")]
pub struct WriterGone;

/// Client side of the writer task. Cheap to clone.
#[derive(Clone)]
pub struct CampaignHandle {
    requests: mpsc::Sender<Request>,
    events: Arc<broadcast::Receiver<String>>,
}

impl CampaignHandle {
    async fn ask<T>(
        &self,
        request: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Result<T, WriterGone> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(request(reply))
            .await
            .map_err(|_| WriterGone)?;
        response.await.map_err(|_| WriterGone)
    }

    pub async fn command(&self, command: Command) -> Result<CommandReply, WriterGone> {
        self.ask(|reply| Request::Command(command, reply)).await
    }

    pub async fn view(&self) -> Result<SimulationView, WriterGone> {
        self.ask(Request::View).await
    }

    pub async fn onboarding_seen(&self) -> Result<bool, WriterGone> {
        self.ask(Request::Onboarding).await
    }

    /// Returns whether the flag was stored.
    pub async fn mark_onboarding_seen(&self) -> Result<bool, WriterGone> {
        self.ask(Request::MarkOnboarding).await
    }

    /// Asks the writer to flush and stop. Event streams end once it has.
    pub async fn shutdown(&self) {
        let _ = self.requests.send(Request::Shutdown).await;
    }

    /// A fresh subscription to snapshot changes.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.events.resubscribe()
    }
}

/// Moves `campaign` onto its own blocking task.
pub fn spawn_writer<D, S>(
    campaign: Campaign<D, S>,
    event_buffer: usize,
) -> (CampaignHandle, JoinHandle<()>)
where
    D: DrawSource + Send + 'static,
    S: SnapshotStore + 'static,
{
    let (requests, inbox) = mpsc::channel(32);
    let (events, receiver) = broadcast::channel(event_buffer.max(1));
    let task = tokio::task::spawn_blocking(move || writer_loop(campaign, inbox, events));
    let handle = CampaignHandle {
        requests,
        events: Arc::new(receiver),
    };
    (handle, task)
}

fn writer_loop<D: DrawSource, S: SnapshotStore>(
    mut campaign: Campaign<D, S>,
    mut inbox: mpsc::Receiver<Request>,
    events: broadcast::Sender<String>,
) {
    while let Some(request) = inbox.blocking_recv() {
        match request {
            Request::Command(command, reply) => {
                let changed = campaign.apply(&command);
                let state = campaign.view();
                if changed {
                    match serde_json::to_string(&state) {
                        Ok(payload) => {
                            let _ = events.send(payload);
                        }
                        Err(err) => warn!(error = %err, "failed to encode state event"),
                    }
                }
                debug!(command = command.name(), changed, "command handled");
                let _ = reply.send(CommandReply { changed, state });
            }
            Request::View(reply) => {
                let _ = reply.send(campaign.view());
            }
            Request::Onboarding(reply) => {
                let _ = reply.send(campaign.onboarding_seen());
            }
            Request::MarkOnboarding(reply) => {
                let stored = match campaign.mark_onboarding_seen() {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(error = %err, "failed to store onboarding flag");
                        false
                    }
                };
                let _ = reply.send(stored);
            }
            Request::Shutdown => break,
        }
    }
    if let Err(err) = campaign.flush() {
        warn!(error = %err, "final flush failed");
    }
    info!("campaign writer stopped");
}

pub fn router(handle: CampaignHandle) -> Router {
    Router::new()
        .route("/api/state", get(latest_state))
        .route("/api/command", post(submit_command))
        .route("/api/events", get(stream_events))
        .route("/api/onboarding", get(onboarding).post(mark_onboarding))
        .with_state(handle)
}

pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub event_buffer: usize,
}

pub async fn run<D, S>(campaign: Campaign<D, S>, settings: ServerSettings) -> Result<()>
where
    D: DrawSource + Send + 'static,
    S: SnapshotStore + 'static,
{
    let (handle, writer) = spawn_writer(campaign, settings.event_buffer);
    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", settings.host, settings.port))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "EcoSphere API listening (Ctrl+C to stop)");

    let stopper = handle.clone();
    axum::serve(listener, router(handle))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
            stopper.shutdown().await;
        })
        .await?;

    writer.await.context("campaign writer panicked")?;
    Ok(())
}

async fn latest_state(
    State(handle): State<CampaignHandle>,
) -> Result<Json<SimulationView>, StatusCode> {
    handle
        .view()
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

async fn submit_command(
    State(handle): State<CampaignHandle>,
    Json(command): Json<Command>,
) -> Result<Json<CommandReply>, StatusCode> {
    handle
        .command(command)
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

async fn onboarding(
    State(handle): State<CampaignHandle>,
) -> Result<Json<OnboardingState>, StatusCode> {
    let seen = handle
        .onboarding_seen()
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    Ok(Json(OnboardingState { seen }))
}

async fn mark_onboarding(
    State(handle): State<CampaignHandle>,
) -> Result<Json<OnboardingState>, StatusCode> {
    match handle.mark_onboarding_seen().await {
        Ok(true) => Ok(Json(OnboardingState { seen: true })),
        Ok(false) => Err(StatusCode::INTERNAL_SERVER_ERROR),
        Err(WriterGone) => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

async fn stream_events(
    State(handle): State<CampaignHandle>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(handle.subscribe()).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().event("state").data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
