use std::{convert::Infallible, time::Duration};

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::{stream, Stream, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    ctx::Ctx,
    notes::{can_read, Note, Scope, ScopeQuery},
    openapi::{
        aide::{
            axum::{routing::get_with, ApiRouter},
            NoApi,
        },
        Query,
    },
    state::AppState,
    users::{User, UserId},
    Result,
};

use super::{ChangeEvent, Changes};

/// What a subscriber receives: a projected change, or a request to refetch
/// because it fell behind and events were dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing<T> {
    Change(ChangeEvent<T>),
    Resync,
}

pub fn router(state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/api/v1/realtime/notes",
            get_with(note_events, |t| {
                t.description(
                    "Server-sent `created`, `modified` and `removed` note events for `scope`, \
                     plus `resync` when events were dropped.",
                )
            }),
        )
        .api_route(
            "/api/v1/realtime/users",
            get_with(user_events, |t| {
                t.description("Server-sent member events of the caller's organization. Admins only.")
            }),
        )
        .with_state(state)
}

/// Drains `receiver`, keeping what `project` lets through. Ends when the hub
/// goes away; dropping the stream unsubscribes.
pub fn subscription<T, F>(receiver: broadcast::Receiver<ChangeEvent<T>>, project: F) -> impl Stream<Item = Outgoing<T>>
where
    T: Clone + Send + 'static,
    F: Fn(&ChangeEvent<T>) -> Option<ChangeEvent<T>> + Send + 'static,
{
    stream::unfold((receiver, project), |(mut receiver, project)| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Some(event) = project(&event) {
                        return Some((Outgoing::Change(event), (receiver, project)));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber lagged, asking for resync");
                    return Some((Outgoing::Resync, (receiver, project)));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

/// Resolves once `user_id` is deleted. Membership events that were dropped
/// count as a deletion, the client reconnects and is authorized afresh.
async fn revoked(mut users: broadcast::Receiver<ChangeEvent<User>>, user_id: UserId) {
    loop {
        match users.recv().await {
            Ok(ChangeEvent::Removed { old }) if old.id == user_id => {
                tracing::info!(%user_id, "subscriber removed, closing subscription");
                return;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(_)) => return,
            Err(RecvError::Closed) => std::future::pending().await,
        }
    }
}

/// Ends `events` when the subscriber stops being a member. Anonymous
/// subscriptions never end this way.
pub fn while_member<T, S>(events: S, changes: &Changes, ctx: &Ctx) -> impl Stream<Item = Outgoing<T>>
where
    S: Stream<Item = Outgoing<T>>,
{
    let users = changes.users.subscribe();
    let user_id = ctx.get_user_id();

    events.take_until(async move {
        match user_id {
            Some(user_id) => revoked(users, user_id).await,
            None => std::future::pending().await,
        }
    })
}

/// The note events a caller is allowed to see for `scope`.
pub fn project_note_event(ctx: &Ctx, scope: Scope, event: &ChangeEvent<Note>) -> Option<ChangeEvent<Note>> {
    event.project(|note| scope.includes(ctx, note) && can_read(ctx, note))
}

fn to_sse<T: Serialize>(outgoing: Outgoing<T>) -> std::result::Result<Event, Infallible> {
    let event = match outgoing {
        Outgoing::Change(change) => {
            let kind = change.kind();
            Event::default()
                .event(kind.as_str())
                .json_data(&change)
                .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
        }
        Outgoing::Resync => Event::default().event("resync").data("{}"),
    };
    Ok(event)
}

fn sse<T, S>(events: S) -> Response
where
    T: Serialize + Send + 'static,
    S: Stream<Item = Outgoing<T>> + Send + 'static,
{
    Sse::new(events.map(to_sse))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
        .into_response()
}

async fn note_events(
    NoApi(ctx): NoApi<Ctx>,
    State(changes): State<Changes>,
    Query(ScopeQuery { scope }): Query<ScopeQuery>,
) -> Result<Response> {
    if scope != Scope::Public {
        ctx.require_user()?;
    }
    tracing::info!(?scope, "note subscription opened");

    let receiver = changes.notes.subscribe();
    let events = while_member(
        subscription(receiver, {
            let ctx = ctx.clone();
            move |event| project_note_event(&ctx, scope, event)
        }),
        &changes,
        &ctx,
    );

    Ok(sse(events))
}

async fn user_events(NoApi(ctx): NoApi<Ctx>, State(changes): State<Changes>) -> Result<Response> {
    let admin = ctx.require_admin()?.clone();
    tracing::info!("member subscription opened");

    let organization_slug = admin.organization_slug;
    let receiver = changes.users.subscribe();
    let events = while_member(
        subscription(receiver, move |event: &ChangeEvent<User>| {
            event.project(|user| user.organization_slug == organization_slug)
        }),
        &changes,
        &ctx,
    );

    Ok(sse(events))
}
