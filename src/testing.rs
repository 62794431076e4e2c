//! In-memory collaborators for unit tests

use crate::alerts::{Alert, AlertKind, Notifier};
use crate::client::{
    AttachmentTransport, ClientError, ComplaintQuery, ComplaintStore, OfficeDirectory, Session,
};
use crate::models::{Attachment, Complaint, Office, Role};
use crate::navigation::{Navigator, Route};
use crate::uploader::StagedFile;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

// =============================================================================
// Alerts and navigation
// =============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingNotifier {
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Alert> {
        self.alerts.lock().unwrap().last().cloned()
    }

    pub fn count(&self, kind: AlertKind) -> usize {
        self.alerts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.kind == kind)
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, alert: Alert) {
        self.alerts.lock().unwrap().push(alert);
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    backs: AtomicUsize,
    pushes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn backs(&self) -> usize {
        self.backs.load(Ordering::SeqCst)
    }

    pub fn pushes(&self) -> Vec<Route> {
        self.pushes.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn back(&self) {
        self.backs.fetch_add(1, Ordering::SeqCst);
    }

    fn push(&self, route: Route) {
        self.pushes.lock().unwrap().push(route);
    }
}

// =============================================================================
// Gate
// =============================================================================

/// Holds a fake call open until the test releases it
#[derive(Default)]
struct Gate {
    enabled: bool,
    notify: Notify,
}

impl Gate {
    async fn pass(&self) {
        if self.enabled {
            self.notify.notified().await;
        }
    }

    fn release(&self) {
        self.notify.notify_one();
    }
}

// =============================================================================
// Uploads
// =============================================================================

#[derive(Default)]
pub struct FakeUploads {
    calls: AtomicUsize,
    failure: Option<ClientError>,
    gate: Gate,
    received: Mutex<Vec<String>>,
}

impl FakeUploads {
    pub fn failing(error: ClientError) -> Self {
        Self {
            failure: Some(error),
            ..Default::default()
        }
    }

    pub fn gated(mut self) -> Self {
        self.gate.enabled = true;
        self
    }

    pub fn release(&self) {
        self.gate.release();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Names of every file received, across all batches
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttachmentTransport for FakeUploads {
    async fn upload_batch(&self, files: &[StagedFile]) -> Result<Vec<Attachment>, ClientError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.received
            .lock()
            .unwrap()
            .extend(files.iter().map(|f| f.name.clone()));
        self.gate.pass().await;

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        Ok(files
            .iter()
            .enumerate()
            .map(|(i, f)| Attachment {
                id: Some(format!("ADJ-{}-{}", call, i + 1)),
                name: f.name.clone(),
                complaint_id: None,
            })
            .collect())
    }
}

// =============================================================================
// Complaint store
// =============================================================================

#[derive(Default)]
pub struct FakeStore {
    records: Mutex<BTreeMap<String, Complaint>>,
    finds: AtomicUsize,
    creates: AtomicUsize,
    updates: AtomicUsize,
    next_id: AtomicUsize,
    persist_failure: Mutex<Option<ClientError>>,
    gate: Gate,
    find_gate: Gate,
    last_persisted: Mutex<Option<Complaint>>,
}

impl FakeStore {
    pub fn with(records: impl IntoIterator<Item = Complaint>) -> Self {
        let store = Self::default();
        {
            let mut map = store.records.lock().unwrap();
            for record in records {
                let id = record.id.clone().expect("seeded records need an id");
                map.insert(id, record);
            }
        }
        store
    }

    pub fn gated(mut self) -> Self {
        self.gate.enabled = true;
        self
    }

    pub fn release(&self) {
        self.gate.release();
    }

    /// Hold `find_by_id` open until [`FakeStore::release_find`]
    pub fn gated_finds(mut self) -> Self {
        self.find_gate.enabled = true;
        self
    }

    pub fn release_find(&self) {
        self.find_gate.release();
    }

    /// Make every following create/update fail with `error`
    pub fn fail_persistence(&self, error: Option<ClientError>) {
        *self.persist_failure.lock().unwrap() = error;
    }

    pub fn finds(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn last_persisted(&self) -> Option<Complaint> {
        self.last_persisted.lock().unwrap().clone()
    }

    fn persist(&self, mut complaint: Complaint) -> Result<Complaint, ClientError> {
        if let Some(error) = self.persist_failure.lock().unwrap().clone() {
            return Err(error);
        }

        let id = complaint.id.get_or_insert_with(|| {
            format!("PQRS-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
        });
        self.records
            .lock()
            .unwrap()
            .insert(id.clone(), complaint.clone());
        *self.last_persisted.lock().unwrap() = Some(complaint.clone());
        Ok(complaint)
    }
}

#[async_trait]
impl ComplaintStore for FakeStore {
    async fn find_by_id(&self, id: &str) -> Result<Complaint, ClientError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.find_gate.pass().await;
        self.records
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(ClientError::NotFound)
    }

    async fn retrieve_all(&self, _query: &ComplaintQuery) -> Result<Vec<Complaint>, ClientError> {
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }

    async fn create(&self, complaint: &Complaint) -> Result<Complaint, ClientError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.gate.pass().await;
        self.persist(complaint.clone())
    }

    async fn update(&self, complaint: &Complaint) -> Result<Complaint, ClientError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.gate.pass().await;
        self.persist(complaint.clone())
    }
}

// =============================================================================
// Offices and session
// =============================================================================

#[derive(Default)]
pub struct FakeOffices {
    offices: Vec<Office>,
    failure: Option<ClientError>,
    calls: AtomicUsize,
}

impl FakeOffices {
    pub fn with(offices: Vec<Office>) -> Self {
        Self {
            offices,
            ..Default::default()
        }
    }

    pub fn failing(error: ClientError) -> Self {
        Self {
            failure: Some(error),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OfficeDirectory for FakeOffices {
    async fn retrieve_offices(&self) -> Result<Vec<Office>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.offices.clone()),
        }
    }
}

pub struct FakeSession {
    role: Result<Role, ClientError>,
    calls: AtomicUsize,
}

impl FakeSession {
    pub fn with_role(role: Role) -> Self {
        Self {
            role: Ok(role),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: ClientError) -> Self {
        Self {
            role: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn current_user_role(&self) -> Result<Role, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.role.clone()
    }
}
