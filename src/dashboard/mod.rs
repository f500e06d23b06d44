//! Headless dashboard: the state and behaviour behind the submitter and
//! admin screens, without any rendering.
//!
//! `Dashboard::mount` is the root provider. It resolves the session through
//! the gate, resolves the admin role once, and hands the resulting
//! `DashboardContext` down to whichever view it mounts.

pub mod admin;
pub mod navigation;
pub mod notifications;
pub mod session_gate;
pub mod upload_form;
pub mod upload_list;
pub mod user;

use crate::{backend::Backend, models::Identity, services::role_service};
use admin::AdminDashboard;
use navigation::{Navigator, SafeNavigator};
use notifications::{Notification, Notifier};
use serde::Serialize;
use session_gate::{GateOutcome, MountedGate, SessionGate};
use std::sync::Arc;
use tracing::info;
use user::UserDashboard;

/// Who is looking at the dashboard. Resolved once per mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardContext {
    pub identity: Identity,
    pub is_admin: bool,
}

pub enum DashboardView {
    User(UserDashboard),
    Admin(AdminDashboard),
}

pub enum DashboardMount {
    Redirected,
    Ready(Dashboard),
}

pub struct Dashboard {
    context: DashboardContext,
    view: DashboardView,
    backend: Backend,
    notifier: Arc<dyn Notifier>,
    gate: MountedGate,
}

impl Dashboard {
    pub async fn mount(
        backend: Backend,
        token: &str,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> DashboardMount {
        let gate = SessionGate::new(backend.auth.clone(), SafeNavigator::new(navigator));
        let gate = match gate.mount(token).await {
            GateOutcome::Redirected => return DashboardMount::Redirected,
            GateOutcome::Admitted(gate) => gate,
        };

        let identity = gate.session().user.clone();
        let is_admin = role_service::is_admin(backend.roles.as_ref(), identity.id).await;
        info!(user_id = %identity.id, is_admin, "dashboard mounted");

        let view = if is_admin {
            DashboardView::Admin(AdminDashboard::mount(&backend, notifier.clone()).await)
        } else {
            let user = UserDashboard::mount(&backend, identity.id, notifier.clone()).await;
            DashboardView::User(user)
        };

        DashboardMount::Ready(Dashboard {
            context: DashboardContext { identity, is_admin },
            view,
            backend,
            notifier,
            gate,
        })
    }

    pub fn context(&self) -> &DashboardContext {
        &self.context
    }

    pub fn view(&self) -> &DashboardView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut DashboardView {
        &mut self.view
    }

    /// End the session. Leaving the page is left to the gate, which sees
    /// the sign-out event.
    pub async fn sign_out(&self) -> bool {
        match self.backend.auth.sign_out(&self.gate.session().token).await {
            Ok(()) => {
                self.notifier.notify(
                    Notification::neutral("Logged out")
                        .description("You've been successfully logged out."),
                );
                true
            }
            Err(err) => {
                self.notifier.notify(
                    Notification::destructive("Logout failed").description(err.to_string()),
                );
                false
            }
        }
    }
}
