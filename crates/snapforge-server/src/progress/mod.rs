//! Server-Sent Events surface over the bus's progress subjects (§4.8).
//!
//! Per client connection: subscribe to the job's progress subject, forward
//! each message as `progress`/`complete`/`error` depending on the job's
//! terminal state, and keep the connection alive every 15s. A coordinator
//! already republishes the job's full persisted state on every step
//! transition, so there is one subject per job rather than the three the
//! wire grammar names separately — the event `type` field carries that
//! distinction instead, which a reconnecting client's heartbeat fetch (the
//! job store read below) needs regardless of which subject model is used.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::stream::{self, Stream};
use serde::Serialize;
use sqlx::PgPool;
use tokio_stream::StreamExt;
use uuid::Uuid;

use snapforge_common::types::{BulkOpJob, BulkOpStatus, RefreshJob, RefreshStatus};
use snapforge_common::SnapError;

use crate::bus::{recv_json, subjects, MessageBus};
use crate::db::job_store;
use crate::error::AppError;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct ProgressState {
    pub db: PgPool,
    pub bus: Arc<dyn MessageBus>,
}

pub fn router(state: ProgressState) -> Router<()> {
    Router::new()
        .route("/refresh-jobs/:job_id/stream", get(refresh_stream))
        .route("/bulk-ops/:job_id/stream", get(bulk_op_stream))
        .with_state(state)
}

fn event_for<T: Serialize>(event_type: &'static str, payload: &T) -> Event {
    Event::default()
        .event(event_type)
        .data(serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string()))
}

async fn refresh_stream(
    State(state): State<ProgressState>,
    Path(job_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    // Subscribe before reading current state so no bus frame published
    // between the fetch below and the first `unfold` poll is missed.
    let sub = state
        .bus
        .subscribe(&subjects::refresh_progress_subject(job_id))
        .await?;

    let job = job_store::get_refresh_job(&state.db, job_id)
        .await
        .map_err(SnapError::from)?;
    let already_terminal = matches!(job.status, RefreshStatus::Completed | RefreshStatus::Failed);
    let connected = event_for("connected", &job);

    let stream = stream::unfold(
        (sub, state.db, job_id, already_terminal),
        |(mut sub, pool, job_id, done)| async move {
            if done {
                return None;
            }

            tokio::select! {
                job = recv_json::<RefreshJob>(&mut sub) => {
                    match job {
                        Some(job) => {
                            let (event_type, terminal) = match job.status {
                                RefreshStatus::Completed => ("complete", true),
                                RefreshStatus::Failed => ("error", true),
                                _ => ("progress", false),
                            };
                            let event = event_for(event_type, &job);
                            Some((vec![event], (sub, pool, job_id, terminal)))
                        }
                        None => None,
                    }
                }
                _ = tokio::time::sleep(KEEP_ALIVE_INTERVAL) => {
                    // Heartbeat: refetch persisted state so a client that missed
                    // bus events while reconnecting still sees the latest
                    // checkpoint.
                    let heartbeat = match job_store::get_refresh_job(&pool, job_id).await {
                        Ok(job) => event_for("heartbeat", &job),
                        Err(_) => Event::default().event("heartbeat").data("{}"),
                    };
                    Some((vec![heartbeat], (sub, pool, job_id, done)))
                }
            }
        },
    )
    .flat_map(|events| stream::iter(events.into_iter().map(Ok)));

    let stream = stream::once(async move { Ok(connected) }).chain(stream);

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("keep-alive")))
}

async fn bulk_op_stream(
    State(state): State<ProgressState>,
    Path(job_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let sub = state
        .bus
        .subscribe(&subjects::bulk_op_progress_subject(job_id))
        .await?;

    let job = job_store::get_bulk_op_job(&state.db, job_id)
        .await
        .map_err(SnapError::from)?;
    let already_terminal = matches!(job.status, BulkOpStatus::Completed | BulkOpStatus::Failed);
    let connected = event_for("connected", &job);

    let stream = stream::unfold(
        (sub, state.db, job_id, already_terminal),
        |(mut sub, pool, job_id, done)| async move {
            if done {
                return None;
            }

            tokio::select! {
                job = recv_json::<BulkOpJob>(&mut sub) => {
                    match job {
                        Some(job) => {
                            let (event_type, terminal) = match job.status {
                                BulkOpStatus::Completed => ("complete", true),
                                BulkOpStatus::Failed => ("error", true),
                                _ => ("progress", false),
                            };
                            let event = event_for(event_type, &job);
                            Some((vec![event], (sub, pool, job_id, terminal)))
                        }
                        None => None,
                    }
                }
                _ = tokio::time::sleep(KEEP_ALIVE_INTERVAL) => {
                    let heartbeat = match job_store::get_bulk_op_job(&pool, job_id).await {
                        Ok(job) => event_for("heartbeat", &job),
                        Err(_) => Event::default().event("heartbeat").data("{}"),
                    };
                    Some((vec![heartbeat], (sub, pool, job_id, done)))
                }
            }
        },
    )
    .flat_map(|events| stream::iter(events.into_iter().map(Ok)));

    let stream = stream::once(async move { Ok(connected) }).chain(stream);

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("keep-alive")))
}
