//! PQRS Intake command-line front-end
//!
//! Drives the complaint form, the login redirect and the consult/report
//! views against a live backend. Alerts go to the log.

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pqrs_intake::alerts::{AlertSurface, LogNotifier};
use pqrs_intake::client::{ApiClient, ComplaintQuery};
use pqrs_intake::config::Config;
use pqrs_intake::form::{ComplaintForm, FormServices, SaveOutcome};
use pqrs_intake::models::{Complaint, ComplaintStatus};
use pqrs_intake::navigation::{LogNavigator, LoginRedirect};
use pqrs_intake::report::{self, DateRange, ReportKind};
use pqrs_intake::uploader::StagedFile;
use pqrs_intake::validation::validate_staged_file;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pqrs-intake", version, about = "Citizen complaint intake client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// File a new complaint
    Submit {
        #[command(flatten)]
        fields: FieldArgs,
        /// File to attach (repeatable)
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },
    /// Edit an existing complaint
    Edit {
        id: String,
        #[command(flatten)]
        fields: FieldArgs,
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },
    /// Look a complaint up by its code
    Consult { code: String },
    /// Tally complaints by status
    Report {
        #[arg(long, value_enum, default_value = "general")]
        kind: KindArg,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Sign in with the configured token and open the landing view
    Login,
}

#[derive(Args)]
struct FieldArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// Creation timestamp (RFC 3339); new complaints default to now
    #[arg(long)]
    created: Option<DateTime<Utc>>,
    #[arg(long)]
    deadline: Option<DateTime<Utc>>,
    /// Recibido, En Proceso or Respondido
    #[arg(long, value_parser = parse_status)]
    status: Option<ComplaintStatus>,
    /// Responding office, by id or name
    #[arg(long)]
    office: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    anonymous: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    /// Counts per status plus the matching complaints
    General,
    /// Matching complaints only
    Detailed,
    /// Total count only
    Summary,
}

impl From<KindArg> for ReportKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::General => ReportKind::General,
            KindArg::Detailed => ReportKind::Detailed,
            KindArg::Summary => ReportKind::Summary,
        }
    }
}

fn parse_status(value: &str) -> Result<ComplaintStatus, String> {
    ComplaintStatus::parse(value).ok_or_else(|| format!("unknown status '{}'", value))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pqrs_intake=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Backend: {} ({:?})", config.api_base_url, config.environment);

    let client = Arc::new(ApiClient::from_config(&config)?);

    match cli.command {
        Command::Submit { fields, files } => run_form(&config, client, None, fields, files).await,
        Command::Edit { id, fields, files } => {
            run_form(&config, client, Some(id), fields, files).await
        }
        Command::Consult { code } => {
            let complaint = report::consult(&*client, &code).await?;
            print_complaint(&complaint);
            Ok(())
        }
        Command::Report { kind, from, to } => {
            let range = match (from, to) {
                (Some(from), Some(to)) => Some(DateRange {
                    from: day_start(from),
                    to: day_start(to) + chrono::Duration::days(1) - chrono::Duration::seconds(1),
                }),
                _ => None,
            };
            let report =
                report::generate(&*client, &ComplaintQuery::default(), range, kind.into())
                    .await?;
            let counts = report.counts;
            for (label, count) in [
                ("Recibidos", counts.received),
                ("En proceso", counts.in_progress),
                ("Respondidos", counts.responded),
            ] {
                println!("{:<12} {:>5} ({}%)", label, count, report.percentage(count));
            }
            for complaint in &report.records {
                print_complaint(complaint);
            }
            Ok(())
        }
        Command::Login => {
            let (auth_tx, auth_rx) = watch::channel(false);
            let redirect = LoginRedirect::new(
                client.clone(),
                Arc::new(LogNavigator),
                AlertSurface::new(Arc::new(LogNotifier)),
            );
            let signed_in = config.is_authenticated();
            let driver = async move {
                // Let the redirect take its baseline before the flag flips
                tokio::task::yield_now().await;
                if auth_tx.send(signed_in).is_err() {
                    tracing::warn!("Login redirect stopped early");
                }
            };
            tokio::join!(redirect.run(auth_rx), driver);
            if !signed_in {
                tracing::warn!("No API_TOKEN configured; staying anonymous");
            }
            Ok(())
        }
    }
}

async fn run_form(
    config: &Config,
    client: Arc<ApiClient>,
    id: Option<String>,
    fields: FieldArgs,
    files: Vec<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_auth_tx, auth_rx) = watch::channel(config.is_authenticated());
    let form = ComplaintForm::new(
        FormServices::from_client(client, Arc::new(LogNotifier), Arc::new(LogNavigator)),
        auth_rx,
    );

    form.open(id.as_deref()).await?;

    let office = match &fields.office {
        Some(wanted) => Some(
            form.offices()
                .into_iter()
                .find(|o| o.id == *wanted || o.name.eq_ignore_ascii_case(wanted))
                .ok_or_else(|| format!("unknown office '{}'", wanted))?,
        ),
        None => None,
    };
    let is_new = id.is_none();

    let report = form.edit(|c| {
        if let Some(title) = fields.title {
            c.title = title;
        }
        if let Some(description) = fields.description {
            c.description = description;
        }
        if let Some(created) = fields.created {
            c.created_at = Some(created);
        } else if is_new && c.created_at.is_none() {
            c.created_at = Some(Utc::now());
        }
        if fields.deadline.is_some() {
            c.response_deadline = fields.deadline;
        }
        if fields.status.is_some() {
            c.status = fields.status;
        }
        if office.is_some() {
            c.responding_office = office;
        }
        if fields.name.is_some() {
            c.submitter_full_name = fields.name;
        }
        if fields.email.is_some() {
            c.submitter_email = fields.email;
        }
        if fields.phone.is_some() {
            c.submitter_phone = fields.phone;
        }
        if fields.anonymous {
            c.is_anonymous = Some(true);
        }
    })?;
    for verdict in report.iter().filter(|v| !v.is_valid()) {
        if let Some(error) = &verdict.error {
            tracing::warn!("{}: {}", verdict.field, error);
        }
    }

    for path in &files {
        form.stage_file(read_staged_file(path, config.max_upload_size).await?);
    }

    match form.save().await? {
        SaveOutcome::Created(id) | SaveOutcome::Updated(id) => println!("{}", id),
        SaveOutcome::AlreadySaving => tracing::warn!("A save was already running"),
    }
    Ok(())
}

async fn read_staged_file(
    path: &Path,
    max_upload_size: usize,
) -> Result<StagedFile, Box<dyn std::error::Error>> {
    let data = fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());

    // File type detection by magic bytes, extension only for plain text
    let content_type = match infer::get(&data) {
        Some(kind) => kind.mime_type().to_string(),
        None if name.to_lowercase().ends_with(".txt") => "text/plain".to_string(),
        None => "application/octet-stream".to_string(),
    };

    validate_staged_file(&name, &content_type, data.len(), max_upload_size)?;
    Ok(StagedFile::new(name, content_type, data))
}

fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn print_complaint(complaint: &Complaint) {
    println!(
        "{}  {}  [{}]  {}",
        complaint.id.as_deref().unwrap_or("-"),
        complaint
            .created_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "--".to_string()),
        complaint.status.map(ComplaintStatus::as_str).unwrap_or("-"),
        complaint.title
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_kind_flag() {
        let cli = Cli::try_parse_from(["pqrs-intake", "report", "--kind", "summary"]).unwrap();
        match cli.command {
            Command::Report { kind, from, to } => {
                assert_eq!(ReportKind::from(kind), ReportKind::Summary);
                assert!(from.is_none() && to.is_none());
            }
            _ => panic!("expected the report command"),
        }

        let cli = Cli::try_parse_from(["pqrs-intake", "report"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Report { kind: KindArg::General, .. }
        ));
    }
}
