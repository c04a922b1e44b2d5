use chrono::Utc;
use dotenvy::dotenv;
use renewal_hub::{
    config::{database, settings},
    core::{
        export::{DirectorySink, ExportFormat, ExportOutcome, HttpExportTransport, ReportExporter, TracingNotifier},
        report::ReportSummary,
        service::{ServiceFilter, load_records},
        status::{DashboardStats, due_reminders},
    },
    errors::{Error, Result},
};
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// What the binary was asked to do.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    /// Log dashboard, report and reminder summaries
    Summary,
    /// Download a report into the export directory
    Export {
        format: ExportFormat,
        category_id: Option<String>,
    },
}

fn parse_command(args: &[String]) -> Result<Command> {
    match args.first().map(String::as_str) {
        None => Ok(Command::Summary),
        Some("export") => {
            let format = args
                .get(1)
                .ok_or_else(|| Error::UnknownExportFormat {
                    token: String::new(),
                })?
                .parse()?;
            Ok(Command::Export {
                format,
                category_id: args.get(2).cloned(),
            })
        }
        Some(other) => Err(Error::UnknownCommand {
            command: other.to_string(),
        }),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Settings
    let settings = settings::load_default_settings()
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;

    let args: Vec<String> = env::args().skip(1).collect();
    let command = parse_command(&args).inspect_err(|e| error!("{}", e))?;
    match command {
        Command::Export {
            format,
            category_id,
        } => {
            let exporter = ReportExporter::new(
                HttpExportTransport::new(settings.api.base_url.clone(), settings::api_token()),
                DirectorySink::new(settings.export.output_dir.clone()),
                TracingNotifier,
            );
            if exporter.export(format, category_id.as_deref()).await == ExportOutcome::Failed {
                return Err(Error::ExportFailed {
                    message: format!("{format} export did not complete"),
                });
            }
        }
        Command::Summary => {
            // 4. Database
            let db = database::create_connection()
                .await
                .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
            database::create_tables(&db).await?;
            info!("Database initialized successfully.");

            // 5. Summaries as of now
            let now = Utc::now();
            let services = load_records(&db, &ServiceFilter::All).await?;
            let stats = DashboardStats::compute(&services, now, settings.dashboard.expiring_soon_days);
            info!(
                total = stats.total,
                expiring_soon = stats.expiring_soon,
                expired = stats.expired,
                safe = stats.safe,
                total_cost = stats.total_cost,
                "Dashboard"
            );

            let summary = ReportSummary::build(&services, now);
            for bucket in &summary.by_category {
                info!(category = %bucket.name, services = bucket.value, cost = bucket.cost, "Category");
            }
            for bucket in &summary.upcoming_expiry {
                info!(month = %bucket.label, services = bucket.value, "Upcoming expiry");
            }

            for reminder in due_reminders(&services, now, &settings.reminders.default_thresholds) {
                let recipients: Vec<&str> = reminder.recipients.iter().map(|o| o.email.as_str()).collect();
                info!(
                    service = %reminder.service_name,
                    threshold = %reminder.threshold_label,
                    days = reminder.days_until_expiry,
                    recipients = ?recipients,
                    "Reminder due"
                );
            }
        }
    }

    Ok(())
}
