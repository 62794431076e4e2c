//! Complaint form controller
//!
//! Owns one complaint while it is being created or edited: loads it,
//! takes edits and staged files, validates, uploads attachments, persists,
//! and navigates back once the save lands.
//!
//! ```text
//! Idle ─open(id)─▶ Loading ─▶ Ready ─save()─▶ Saving ─▶ Saved
//!   └──open(None)────────────▶   ▲             │  ▲
//!                                │             ▼  │
//!                                └── Failed ◀─ Uploading
//! ```

use crate::alerts::{AlertSurface, Notifier};
use crate::client::{
    ApiClient, AttachmentTransport, ClientError, ComplaintStore, OfficeDirectory,
};
use crate::models::{Attachment, Complaint, Office};
use crate::navigation::Navigator;
use crate::uploader::{AttachmentUploader, FlagGuard, StagedFile, UploadError};
use crate::validation::{validate_complaint, ValidationReport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Loading,
    Ready,
    Saving,
    Uploading,
    Saved,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Created(String),
    Updated(String),
    /// Another save on this form was still running; nothing was done
    AlreadySaving,
}

/// Failures of a form operation.
///
/// By the time one is returned it has already been shown to the user.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("Form has invalid fields: {}", .0.missing_fields().join(", "))]
    Invalid(ValidationReport),

    #[error(transparent)]
    UploadFailed(UploadError),

    #[error("Could not save complaint: {0}")]
    PersistenceFailed(ClientError),

    #[error("Complaint {0} not found")]
    NotFound(String),

    #[error("Could not load complaint: {0}")]
    LoadFailed(ClientError),

    #[error("Form is not ready (state: {0:?})")]
    NotReady(LifecycleState),
}

/// Everything a form talks to, passed in explicitly
#[derive(Clone)]
pub struct FormServices {
    pub store: Arc<dyn ComplaintStore>,
    pub uploads: Arc<dyn AttachmentTransport>,
    pub offices: Arc<dyn OfficeDirectory>,
    pub notifier: Arc<dyn Notifier>,
    pub navigator: Arc<dyn Navigator>,
}

impl FormServices {
    pub fn from_client(
        client: Arc<ApiClient>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            store: client.clone(),
            uploads: client.clone(),
            offices: client,
            notifier,
            navigator,
        }
    }
}

struct FormState {
    lifecycle: LifecycleState,
    history: Vec<LifecycleState>,
    record: Option<Complaint>,
    offices: Vec<Office>,
}

pub struct ComplaintForm {
    session_id: Uuid,
    store: Arc<dyn ComplaintStore>,
    office_directory: Arc<dyn OfficeDirectory>,
    navigator: Arc<dyn Navigator>,
    alerts: AlertSurface,
    uploader: AttachmentUploader,
    authenticated: watch::Receiver<bool>,
    state: Mutex<FormState>,
    saving: AtomicBool,
}

impl ComplaintForm {
    pub fn new(services: FormServices, authenticated: watch::Receiver<bool>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            store: services.store,
            office_directory: services.offices,
            navigator: services.navigator,
            alerts: AlertSurface::new(services.notifier),
            uploader: AttachmentUploader::new(services.uploads),
            authenticated,
            state: Mutex::new(FormState {
                lifecycle: LifecycleState::Idle,
                history: vec![LifecycleState::Idle],
                record: None,
                offices: Vec::new(),
            }),
            saving: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: LifecycleState) {
        let mut state = self.lock();
        tracing::debug!(form = %self.session_id, "{:?} -> {:?}", state.lifecycle, next);
        state.lifecycle = next;
        state.history.push(next);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> LifecycleState {
        self.lock().lifecycle
    }

    /// Every state the form has been in, oldest first
    pub fn history(&self) -> Vec<LifecycleState> {
        self.lock().history.clone()
    }

    pub fn record(&self) -> Option<Complaint> {
        self.lock().record.clone()
    }

    pub fn offices(&self) -> Vec<Office> {
        self.lock().offices.clone()
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    pub fn is_uploading(&self) -> bool {
        self.uploader.is_busy()
    }

    pub fn is_authenticated(&self) -> bool {
        *self.authenticated.borrow()
    }

    /// Validity of the current record under the current authentication
    /// state, computed fresh on every call
    pub fn validation(&self) -> Option<ValidationReport> {
        let authenticated = self.is_authenticated();
        self.lock()
            .record
            .as_ref()
            .map(|record| validate_complaint(record, authenticated))
    }

    // =========================================================================
    // Entry
    // =========================================================================

    /// Enter the form, loading `id` when editing an existing complaint.
    ///
    /// Office reference data loads alongside the record.
    pub async fn open(&self, id: Option<&str>) -> Result<(), FormError> {
        let lifecycle = self.state();
        if !matches!(lifecycle, LifecycleState::Idle | LifecycleState::Failed) {
            return Err(FormError::NotReady(lifecycle));
        }

        let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) else {
            self.lock().record = Some(Complaint::default());
            self.transition(LifecycleState::Ready);
            let offices = self.office_directory.retrieve_offices().await;
            self.apply_offices(offices);
            return Ok(());
        };

        self.transition(LifecycleState::Loading);
        tracing::info!(form = %self.session_id, "Loading complaint {}", id);

        let (record, offices) = tokio::join!(
            self.store.find_by_id(id),
            self.office_directory.retrieve_offices()
        );
        self.apply_offices(offices);

        match record {
            Ok(mut record) => {
                for attachment in &mut record.attachments {
                    if attachment.complaint_id.is_none() {
                        attachment.complaint_id = record.id.clone();
                    }
                }
                self.lock().record = Some(record);
                self.transition(LifecycleState::Ready);
                Ok(())
            }
            Err(e) => {
                tracing::error!(form = %self.session_id, "Failed to load complaint {}: {}", id, e);
                self.alerts.http_error(&e);
                self.transition(LifecycleState::Failed);
                Err(match e {
                    ClientError::NotFound => FormError::NotFound(id.to_string()),
                    other => FormError::LoadFailed(other),
                })
            }
        }
    }

    fn apply_offices(&self, offices: Result<Vec<Office>, ClientError>) {
        match offices {
            Ok(offices) => self.lock().offices = offices,
            Err(e) => {
                tracing::warn!(form = %self.session_id, "Failed to load offices: {}", e);
                self.alerts.http_error(&e);
            }
        }
    }

    // =========================================================================
    // Edits
    // =========================================================================

    /// Apply an edit to the record and return the fresh validation report.
    ///
    /// Only a `Ready` form takes edits. A persisted record keeps its id
    /// whatever the edit does to it.
    pub fn edit(&self, f: impl FnOnce(&mut Complaint)) -> Result<ValidationReport, FormError> {
        let authenticated = self.is_authenticated();
        let mut state = self.lock();
        let lifecycle = state.lifecycle;
        if lifecycle != LifecycleState::Ready {
            return Err(FormError::NotReady(lifecycle));
        }
        let record = state
            .record
            .as_mut()
            .ok_or(FormError::NotReady(lifecycle))?;

        let id = record.id.clone();
        f(record);
        if id.is_some() && record.id != id {
            tracing::warn!(form = %self.session_id, "Ignoring attempt to change a persisted id");
            record.id = id;
        }

        Ok(validate_complaint(record, authenticated))
    }

    pub fn stage_file(&self, file: StagedFile) {
        self.uploader.stage(file);
    }

    pub fn unstage_file(&self, index: usize) -> Option<StagedFile> {
        self.uploader.unstage(index)
    }

    pub fn pending_files(&self) -> Vec<StagedFile> {
        self.uploader.pending()
    }

    // =========================================================================
    // Save
    // =========================================================================

    /// Validate, upload staged files, persist, then navigate back.
    ///
    /// Only one save runs per form; a call made while another is in flight
    /// returns [`SaveOutcome::AlreadySaving`] untouched.
    pub async fn save(&self) -> Result<SaveOutcome, FormError> {
        let Some(_in_flight) = FlagGuard::acquire(&self.saving) else {
            tracing::debug!(form = %self.session_id, "Save already in flight");
            return Ok(SaveOutcome::AlreadySaving);
        };

        let lifecycle = self.state();
        if lifecycle != LifecycleState::Ready {
            tracing::warn!(form = %self.session_id, "Save requested while {:?}", lifecycle);
            return Err(FormError::NotReady(lifecycle));
        }

        self.transition(LifecycleState::Saving);
        match self.run_save().await {
            Ok(outcome) => {
                self.transition(LifecycleState::Saved);
                self.navigator.back();
                Ok(outcome)
            }
            Err(e) => {
                if matches!(e, FormError::PersistenceFailed(_)) {
                    self.transition(LifecycleState::Failed);
                }
                self.transition(LifecycleState::Ready);
                Err(e)
            }
        }
    }

    async fn run_save(&self) -> Result<SaveOutcome, FormError> {
        if let Some(report) = self.validation().filter(|r| !r.is_valid()) {
            let fields: Vec<&str> = report
                .iter()
                .filter(|v| !v.is_valid())
                .map(|v| v.field)
                .collect();
            self.alerts
                .error(format!("Hay campos inválidos: {}", fields.join(", ")));
            return Err(FormError::Invalid(report));
        }

        if self.uploader.has_pending() {
            self.transition(LifecycleState::Uploading);
            let batch = self.uploader.upload_all().await.map_err(|e| {
                match &e {
                    UploadError::Failed(cause) => self.alerts.http_error(cause),
                    UploadError::Busy => self.alerts.error("Error al subir archivos"),
                }
                FormError::UploadFailed(e)
            })?;
            tracing::info!(
                form = %self.session_id,
                "Uploaded {} attachment(s)",
                batch.attachments.len()
            );
            self.merge_attachments(batch.attachments);
            self.uploader.discard_sent(&batch.sent);
            self.transition(LifecycleState::Saving);
        }

        let record = self
            .record()
            .ok_or(FormError::NotReady(LifecycleState::Saving))?;

        let result = match record.id.as_deref() {
            Some(_) => self.store.update(&record).await,
            None => self.store.create(&record).await,
        };

        let saved = result
            .and_then(|saved| match record.id.clone().or_else(|| saved.id.clone()) {
                Some(id) => Ok((id, saved)),
                None => Err(ClientError::Decode("saved complaint has no id".to_string())),
            })
            .map_err(|e| {
                tracing::error!(form = %self.session_id, "Failed to save complaint: {}", e);
                self.alerts.http_error(&e);
                FormError::PersistenceFailed(e)
            })?;

        let (id, mut saved) = saved;
        saved.id = Some(id.clone());
        self.lock().record = Some(saved);

        if record.is_persisted() {
            self.alerts
                .info(format!("Se actualizó la PQRS con identificador {}", id));
            Ok(SaveOutcome::Updated(id))
        } else {
            self.alerts
                .success(format!("Se creó una nueva PQRS con identificador {}", id));
            Ok(SaveOutcome::Created(id))
        }
    }

    /// Append freshly uploaded attachments, skipping ids already present
    fn merge_attachments(&self, uploaded: Vec<Attachment>) {
        let mut state = self.lock();
        let Some(record) = state.record.as_mut() else {
            return;
        };

        for mut attachment in uploaded {
            let duplicate = attachment.id.is_some()
                && record.attachments.iter().any(|a| a.id == attachment.id);
            if duplicate {
                continue;
            }
            if attachment.complaint_id.is_none() {
                attachment.complaint_id = record.id.clone();
            }
            record.attachments.push(attachment);
        }
    }
}
