//! Keeps gated views behind a live session.
//!
//! Mounting resolves the session once. Without one the gate redirects to
//! the sign-in route and nothing else mounts. With one it keeps listening to
//! auth events for that session until it is dropped: a sign-out redirects,
//! a sign-in or refresh updates the published identity.

use super::navigation::{SIGN_IN_ROUTE, SafeNavigator};
use crate::{
    backend::AuthBackend,
    models::{AuthEvent, AuthEventKind, Identity, Session},
};
use std::sync::Arc;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    watch,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub enum GateOutcome {
    Redirected,
    Admitted(MountedGate),
}

#[derive(Clone)]
pub struct SessionGate {
    auth: Arc<dyn AuthBackend>,
    navigator: SafeNavigator,
}

impl SessionGate {
    pub fn new(auth: Arc<dyn AuthBackend>, navigator: SafeNavigator) -> Self {
        Self { auth, navigator }
    }

    pub async fn mount(&self, token: &str) -> GateOutcome {
        // Subscribe first so a sign-out racing the lookup is not missed.
        let events = self.auth.subscribe();

        let session = match self.auth.current_session(token).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                debug!("no session, redirecting to sign-in");
                self.navigator.redirect(SIGN_IN_ROUTE, true);
                return GateOutcome::Redirected;
            }
            Err(err) => {
                warn!(error = %err, "session lookup failed, redirecting to sign-in");
                self.navigator.redirect(SIGN_IN_ROUTE, true);
                return GateOutcome::Redirected;
            }
        };

        let (identity_tx, identity_rx) = watch::channel(Some(session.user.clone()));
        let cancel = CancellationToken::new();
        tokio::spawn(listen(
            events,
            token.to_string(),
            identity_tx,
            self.navigator.clone(),
            cancel.clone(),
        ));

        GateOutcome::Admitted(MountedGate {
            session,
            identity: identity_rx,
            cancel,
        })
    }
}

async fn listen(
    mut events: broadcast::Receiver<AuthEvent>,
    token: String,
    identity: watch::Sender<Option<Identity>>,
    navigator: SafeNavigator,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        let event = match event {
            Ok(event) if event.token == token => event,
            Ok(_) => continue,
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "auth listener lagged");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match (event.kind, event.session) {
            (AuthEventKind::SignedIn | AuthEventKind::TokenRefreshed, Some(session)) => {
                debug!(user_id = %session.user.id, "session updated");
                identity.send_replace(Some(session.user));
            }
            (kind, _) => {
                info!(user_id = %event.user_id, ?kind, "session ended, leaving gated view");
                identity.send_replace(None);
                navigator.redirect(SIGN_IN_ROUTE, true);
                break;
            }
        }
    }
    debug!("auth listener stopped");
}

/// A mounted gate. Dropping it stops the auth listener.
pub struct MountedGate {
    session: Session,
    identity: watch::Receiver<Option<Identity>>,
    cancel: CancellationToken,
}

impl MountedGate {
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The current identity, `None` once the session ended.
    pub fn identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    pub fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.clone()
    }
}

impl Drop for MountedGate {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
