//! Route changes requested by the dashboard.
//!
//! Redirects go through `SafeNavigator`, which drops a redirect requested
//! within `SUPPRESS_WINDOW` of the last one performed and performs the rest
//! after `REDIRECT_DELAY`, so state changes already in flight can settle
//! first.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::{
    task::JoinHandle,
    time::{Duration, Instant, sleep},
};
use tracing::debug;

pub const SIGN_IN_ROUTE: &str = "/auth";

pub const SUPPRESS_WINDOW: Duration = Duration::from_millis(500);
pub const REDIRECT_DELAY: Duration = Duration::from_millis(100);

pub trait Navigator: Send + Sync {
    /// Go to `route`. With `replace`, the current history entry is replaced
    /// so going back cannot return to it.
    fn navigate(&self, route: &str, replace: bool);
}

#[derive(Default)]
struct RedirectState {
    last: Option<Instant>,
    pending: Option<JoinHandle<()>>,
}

fn lock(state: &Mutex<RedirectState>) -> MutexGuard<'_, RedirectState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone)]
pub struct SafeNavigator {
    inner: Arc<dyn Navigator>,
    state: Arc<Mutex<RedirectState>>,
}

impl SafeNavigator {
    pub fn new(inner: Arc<dyn Navigator>) -> Self {
        Self {
            inner,
            state: Arc::new(Mutex::new(RedirectState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, RedirectState> {
        lock(&self.state)
    }

    /// Schedule a redirect to `route`. Returns `false` when it was suppressed.
    /// A scheduled redirect replaces any one still pending.
    pub fn redirect(&self, route: &str, replace: bool) -> bool {
        let now = Instant::now();
        let mut state = self.state();

        if state
            .last
            .is_some_and(|last| now.duration_since(last) < SUPPRESS_WINDOW)
        {
            debug!(route, "redirect suppressed");
            return false;
        }

        if let Some(pending) = state.pending.take() {
            debug!("replacing pending redirect");
            pending.abort();
        }

        let inner = self.inner.clone();
        let shared = self.state.clone();
        let route = route.to_string();
        state.pending = Some(tokio::spawn(async move {
            sleep(REDIRECT_DELAY).await;
            lock(&shared).last = Some(Instant::now());
            debug!(route = %route, replace, "redirecting");
            inner.navigate(&route, replace);
        }));
        true
    }

    /// Forget the last redirect and cancel a pending one.
    pub fn reset(&self) {
        let mut state = self.state();
        state.last = None;
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Records every navigation it is asked to perform.
    #[derive(Default)]
    pub(crate) struct RecordingNavigator {
        visits: Mutex<Vec<(String, bool)>>,
    }

    impl RecordingNavigator {
        pub(crate) fn visits(&self) -> Vec<(String, bool)> {
            self.visits.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, route: &str, replace: bool) {
            self.visits.lock().unwrap().push((route.to_string(), replace));
        }
    }

    fn navigator() -> (Arc<RecordingNavigator>, SafeNavigator) {
        let recorder = Arc::new(RecordingNavigator::default());
        let safe = SafeNavigator::new(recorder.clone());
        (recorder, safe)
    }

    async fn advance(by: Duration) {
        tokio::time::sleep(by).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn redirect_waits_for_delay() {
        let (recorder, safe) = navigator();
        assert!(safe.redirect(SIGN_IN_ROUTE, true));

        advance(Duration::from_millis(50)).await;
        assert!(recorder.visits().is_empty());

        advance(Duration::from_millis(60)).await;
        assert_eq!(recorder.visits(), vec![(SIGN_IN_ROUTE.to_string(), true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn redirects_inside_window_are_suppressed() {
        let (recorder, safe) = navigator();
        assert!(safe.redirect(SIGN_IN_ROUTE, true));
        advance(Duration::from_millis(200)).await;
        assert!(!safe.redirect(SIGN_IN_ROUTE, true));

        advance(Duration::from_millis(400)).await;
        assert!(safe.redirect("/", false));
        advance(REDIRECT_DELAY).await;

        assert_eq!(
            recorder.visits(),
            vec![
                (SIGN_IN_ROUTE.to_string(), true),
                ("/".to_string(), false)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn later_redirect_replaces_pending_one() {
        let (recorder, safe) = navigator();
        assert!(safe.redirect("/first", false));
        advance(Duration::from_millis(50)).await;
        assert!(safe.redirect("/second", true));

        advance(Duration::from_millis(200)).await;
        assert_eq!(recorder.visits(), vec![("/second".to_string(), true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_pending_and_reopens_window() {
        let (recorder, safe) = navigator();
        assert!(safe.redirect("/first", false));
        safe.reset();
        assert!(safe.redirect("/second", false));

        advance(Duration::from_millis(150)).await;
        assert_eq!(recorder.visits(), vec![("/second".to_string(), false)]);
    }
}
