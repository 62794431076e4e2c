//! User-facing notifications
//!
//! Every failure the form or the redirect policy catches ends up here as an
//! [`Alert`]. Notifiers cannot fail: [`Notifier::notify`] returns nothing.

use crate::client::ClientError;
use std::sync::Arc;

/// Generic message when an error carries no transport detail
pub const UNEXPECTED_ERROR: &str = "Ocurrió un error inesperado.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Info,
    Success,
    Error,
}

/// Status and body of the failed response, when there was one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportDetail {
    pub status: Option<u16>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
    pub detail: Option<TransportDetail>,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, alert: Alert);
}

/// Shorthand constructors over a shared notifier
#[derive(Clone)]
pub struct AlertSurface {
    notifier: Arc<dyn Notifier>,
}

impl AlertSurface {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(AlertKind::Info, message.into(), None);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.emit(AlertKind::Success, message.into(), None);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(AlertKind::Error, message.into(), None);
    }

    /// Error alert for a failed backend call.
    ///
    /// Uses the server status/body when present and falls back to
    /// [`UNEXPECTED_ERROR`] otherwise.
    pub fn http_error(&self, error: &ClientError) {
        let detail = match error {
            ClientError::Transport(_) | ClientError::Decode(_) => None,
            _ => Some(TransportDetail {
                status: error.status(),
                body: error.body().map(str::to_string),
            }),
        };

        let message = match detail {
            Some(_) => error.to_string(),
            None => UNEXPECTED_ERROR.to_string(),
        };
        self.emit(AlertKind::Error, message, detail);
    }

    fn emit(&self, kind: AlertKind, message: String, detail: Option<TransportDetail>) {
        self.notifier.notify(Alert {
            kind,
            message,
            detail,
        });
    }
}

/// Renders alerts through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, alert: Alert) {
        match (alert.kind, alert.detail) {
            (AlertKind::Info, _) => tracing::info!("{}", alert.message),
            (AlertKind::Success, _) => tracing::info!(kind = "success", "{}", alert.message),
            (AlertKind::Error, Some(detail)) => tracing::error!(
                status = ?detail.status,
                body = detail.body.as_deref().unwrap_or(""),
                "{}",
                alert.message
            ),
            (AlertKind::Error, None) => tracing::error!("{}", alert.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingNotifier;

    #[test]
    fn test_http_error_keeps_status_and_body() {
        let notifier = Arc::new(RecordingNotifier::default());
        let alerts = AlertSurface::new(notifier.clone());

        alerts.http_error(&ClientError::Rejected {
            status: 400,
            body: "titulo requerido".to_string(),
        });

        let alert = notifier.last().unwrap();
        assert_eq!(alert.kind, AlertKind::Error);
        assert_eq!(
            alert.detail,
            Some(TransportDetail {
                status: Some(400),
                body: Some("titulo requerido".to_string()),
            })
        );
    }

    #[test]
    fn test_http_error_without_response_is_generic() {
        let notifier = Arc::new(RecordingNotifier::default());
        let alerts = AlertSurface::new(notifier.clone());

        alerts.http_error(&ClientError::Transport("connection reset".to_string()));

        let alert = notifier.last().unwrap();
        assert_eq!(alert.message, UNEXPECTED_ERROR);
        assert!(alert.detail.is_none());
    }

    #[test]
    fn test_not_found_carries_status() {
        let notifier = Arc::new(RecordingNotifier::default());
        AlertSurface::new(notifier.clone()).http_error(&ClientError::NotFound);

        let alert = notifier.last().unwrap();
        assert_eq!(alert.detail.and_then(|d| d.status), Some(404));
    }

    #[test]
    fn test_log_notifier_accepts_every_kind() {
        let alerts = AlertSurface::new(Arc::new(LogNotifier));
        alerts.info("info");
        alerts.success("ok");
        alerts.error("boom");
        alerts.http_error(&ClientError::NotFound);
    }
}
