//! Read-only views over complaints: lookup by code and status report

use crate::client::{ComplaintQuery, ComplaintStore};
use crate::models::{Complaint, ComplaintStatus};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsultError {
    #[error("Por favor ingrese un código de PQRS.")]
    EmptyCode,

    #[error("No se encontró una PQRS con ese código.")]
    NotFound,
}

/// Look a complaint up by the code handed to the citizen
pub async fn consult(store: &dyn ComplaintStore, code: &str) -> Result<Complaint, ConsultError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ConsultError::EmptyCode);
    }

    store.find_by_id(code).await.map_err(|e| {
        tracing::debug!("Consult for {} failed: {}", code, e);
        ConsultError::NotFound
    })
}

// =============================================================================
// Status report
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Counts per status plus the matching complaints
    General,
    /// Matching complaints only
    Detailed,
    /// Total count only
    Summary,
}

/// Inclusive creation-date window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at <= self.to
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub received: usize,
    pub in_progress: usize,
    pub responded: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.received + self.in_progress + self.responded
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub kind: ReportKind,
    pub counts: StatusCounts,
    pub records: Vec<Complaint>,
}

impl StatusReport {
    /// Build a report from already retrieved complaints.
    ///
    /// Complaints without a creation date drop out whenever a range is set.
    pub fn build(records: Vec<Complaint>, range: Option<DateRange>, kind: ReportKind) -> Self {
        let records: Vec<Complaint> = match range {
            Some(range) => records
                .into_iter()
                .filter(|c| c.created_at.is_some_and(|at| range.contains(at)))
                .collect(),
            None => records,
        };

        let mut counts = StatusCounts::default();
        let records = match kind {
            ReportKind::General => {
                for record in &records {
                    match record.status {
                        Some(ComplaintStatus::Received) => counts.received += 1,
                        Some(ComplaintStatus::InProgress) => counts.in_progress += 1,
                        Some(ComplaintStatus::Responded) => counts.responded += 1,
                        None => {}
                    }
                }
                records
            }
            ReportKind::Detailed => records,
            ReportKind::Summary => {
                counts.received = records.len();
                Vec::new()
            }
        };

        Self {
            kind,
            counts,
            records,
        }
    }

    /// Share of `count` in the report total, two decimals
    pub fn percentage(&self, count: usize) -> String {
        match self.counts.total() {
            0 => "0.00".to_string(),
            total => format!("{:.2}", count as f64 / total as f64 * 100.0),
        }
    }
}

/// Fetch complaints and build a report over them
pub async fn generate(
    store: &dyn ComplaintStore,
    query: &ComplaintQuery,
    range: Option<DateRange>,
    kind: ReportKind,
) -> Result<StatusReport, crate::client::ClientError> {
    let records = store.retrieve_all(query).await?;
    tracing::info!("Building {:?} report over {} complaint(s)", kind, records.len());
    Ok(StatusReport::build(records, range, kind))
}
