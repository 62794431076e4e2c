//! Navigation and post-login redirect

use crate::alerts::AlertSurface;
use crate::client::{ClientError, Session};
use crate::models::Role;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Named views the client can send the user to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Landing view for office staff
    OfficeHome,
    /// Landing view for administrators
    AdminHome,
}

impl Route {
    pub fn name(self) -> &'static str {
        match self {
            Route::OfficeHome => "OficinaUserHome",
            Route::AdminHome => "Home",
        }
    }
}

pub trait Navigator: Send + Sync {
    /// Pop one entry off the history
    fn back(&self);

    fn push(&self, route: Route);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn back(&self) {
        tracing::info!("Navigating back");
    }

    fn push(&self, route: Route) {
        tracing::info!("Navigating to {}", route.name());
    }
}

#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("No landing view for role {0:?}")]
    UnmappedRole(Role),

    #[error("Could not read the current role: {0}")]
    Session(#[from] ClientError),
}

/// Landing view for a role; `None` keeps the user where they are
pub fn route_for(role: &Role) -> Option<Route> {
    match role {
        Role::User => Some(Route::OfficeHome),
        Role::Admin => Some(Route::AdminHome),
        // TODO: pick a default landing view once product decides one for other roles
        Role::Other(_) => None,
    }
}

/// Sends the user to their landing view right after they sign in.
///
/// Acts on false→true transitions of the authentication flag only.
pub struct LoginRedirect {
    session: Arc<dyn Session>,
    navigator: Arc<dyn Navigator>,
    alerts: AlertSurface,
    authenticated: bool,
}

impl LoginRedirect {
    pub fn new(
        session: Arc<dyn Session>,
        navigator: Arc<dyn Navigator>,
        alerts: AlertSurface,
    ) -> Self {
        Self {
            session,
            navigator,
            alerts,
            authenticated: false,
        }
    }

    /// Feed one observed value of the authentication flag
    pub async fn on_authentication_change(
        &mut self,
        authenticated: bool,
    ) -> Result<Option<Route>, RedirectError> {
        let signed_in = authenticated && !self.authenticated;
        self.authenticated = authenticated;
        if !signed_in {
            return Ok(None);
        }

        let role = self.session.current_user_role().await.map_err(|e| {
            self.alerts.http_error(&e);
            RedirectError::Session(e)
        })?;
        tracing::debug!("Signed in with role {:?}", role);

        let route = route_for(&role).ok_or(RedirectError::UnmappedRole(role))?;
        self.navigator.push(route);
        Ok(Some(route))
    }

    /// Follow the authentication stream until its sender goes away.
    ///
    /// The value current at subscription time is the baseline and never
    /// navigates on its own.
    pub async fn run(mut self, mut authenticated: watch::Receiver<bool>) {
        self.authenticated = *authenticated.borrow_and_update();

        while authenticated.changed().await.is_ok() {
            let value = *authenticated.borrow_and_update();
            match self.on_authentication_change(value).await {
                Ok(Some(route)) => tracing::info!("Redirected to {}", route.name()),
                Ok(None) => {}
                Err(RedirectError::UnmappedRole(role)) => {
                    tracing::debug!("No redirect for role {:?}", role)
                }
                Err(e) => tracing::warn!("Login redirect skipped: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertKind;
    use crate::testing::{FakeSession, RecordingNavigator, RecordingNotifier};

    struct Fixture {
        session: Arc<FakeSession>,
        navigator: Arc<RecordingNavigator>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Fixture {
        fn new(session: FakeSession) -> Self {
            Self {
                session: Arc::new(session),
                navigator: Arc::new(RecordingNavigator::default()),
                notifier: Arc::new(RecordingNotifier::default()),
            }
        }

        fn redirect(&self) -> LoginRedirect {
            LoginRedirect::new(
                self.session.clone(),
                self.navigator.clone(),
                AlertSurface::new(self.notifier.clone()),
            )
        }
    }

    #[tokio::test]
    async fn test_user_lands_on_office_home_once() {
        let fixture = Fixture::new(FakeSession::with_role(Role::User));
        let mut redirect = fixture.redirect();

        assert_eq!(
            redirect.on_authentication_change(true).await.unwrap(),
            Some(Route::OfficeHome)
        );
        assert_eq!(redirect.on_authentication_change(true).await.unwrap(), None);

        assert_eq!(fixture.navigator.pushes(), vec![Route::OfficeHome]);
        assert_eq!(fixture.session.calls(), 1);
    }

    #[tokio::test]
    async fn test_admin_lands_on_admin_home() {
        let fixture = Fixture::new(FakeSession::with_role(Role::Admin));
        let mut redirect = fixture.redirect();

        redirect.on_authentication_change(true).await.unwrap();
        assert_eq!(fixture.navigator.pushes(), vec![Route::AdminHome]);
    }

    #[tokio::test]
    async fn test_unmapped_role_stays_put_silently() {
        let fixture = Fixture::new(FakeSession::with_role(Role::Other("ROLE_AUDITOR".into())));
        let mut redirect = fixture.redirect();

        assert!(matches!(
            redirect.on_authentication_change(true).await,
            Err(RedirectError::UnmappedRole(Role::Other(_)))
        ));
        assert!(fixture.navigator.pushes().is_empty());
        assert!(fixture.notifier.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_sign_out_and_back_in_redirects_again() {
        let fixture = Fixture::new(FakeSession::with_role(Role::User));
        let mut redirect = fixture.redirect();

        for value in [true, false, false, true] {
            redirect.on_authentication_change(value).await.unwrap();
        }
        assert_eq!(
            fixture.navigator.pushes(),
            vec![Route::OfficeHome, Route::OfficeHome]
        );
    }

    #[tokio::test]
    async fn test_role_lookup_failure_alerts() {
        let fixture = Fixture::new(FakeSession::failing(ClientError::Status {
            status: 401,
            body: "Unauthorized".to_string(),
        }));
        let mut redirect = fixture.redirect();

        assert!(matches!(
            redirect.on_authentication_change(true).await,
            Err(RedirectError::Session(_))
        ));
        assert!(fixture.navigator.pushes().is_empty());
        assert_eq!(fixture.notifier.count(AlertKind::Error), 1);
    }

    #[tokio::test]
    async fn test_stream_fires_only_on_rising_edge() {
        let fixture = Fixture::new(FakeSession::with_role(Role::User));
        let (tx, rx) = watch::channel(false);

        let driver = async move {
            tx.send(true).unwrap();
            tokio::task::yield_now().await;
            tx.send(true).unwrap();
            tokio::task::yield_now().await;
        };
        tokio::join!(fixture.redirect().run(rx), driver);

        assert_eq!(fixture.navigator.pushes(), vec![Route::OfficeHome]);
    }

    #[tokio::test]
    async fn test_already_signed_in_at_subscription_is_baseline() {
        let fixture = Fixture::new(FakeSession::with_role(Role::User));
        let (tx, rx) = watch::channel(true);
        drop(tx);

        fixture.redirect().run(rx).await;
        assert!(fixture.navigator.pushes().is_empty());
    }
}
