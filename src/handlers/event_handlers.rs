//! `GET /uploads/events`: server-sent change notifications.
//!
//! Admins receive every change on the uploads table, everyone else only
//! changes to their own rows. Events carry no guarantee beyond "something
//! changed"; clients re-fetch their list on each one.

use super::auth_handlers::CurrentUser;
use crate::{
    backend::{ChangeFilter, ChangeSignal},
    services::role_service,
    state::AppState,
};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};

pub async fn upload_events(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let user_id = session.user.id;
    let filter = if role_service::is_admin(state.backend.roles.as_ref(), user_id).await {
        ChangeFilter::uploads()
    } else {
        ChangeFilter::uploads().owned_by(user_id)
    };
    tracing::debug!(user_id = %user_id, ?filter, "change stream opened");

    let stream = state
        .backend
        .changes
        .subscribe(filter)
        .into_stream()
        .map(to_event);

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_event(signal: ChangeSignal) -> Result<Event, axum::Error> {
    match signal {
        ChangeSignal::Changed(change) => Event::default().event("change").json_data(change),
        ChangeSignal::Lagged(missed) => Ok(Event::default()
            .event("lagged")
            .data(missed.to_string())),
    }
}
