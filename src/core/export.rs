//! Report export - fetches a rendered report from the API and saves it locally.
//!
//! The server produces the file bytes; this module only picks the format,
//! performs the authenticated request, and writes the result under the
//! conventional `services_report.<ext>` name. A failed export never leaves a
//! partial file behind and is reported once through the [`Notifier`].

use crate::{
    core::busy::BusyFlag,
    errors::{Error, Result},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};
use tokio::fs;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Base name of every exported file.
pub const EXPORT_FILE_STEM: &str = "services_report";

/// Formats the export endpoint can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// PDF table
    Pdf,
    /// Excel workbook
    Excel,
    /// Comma-separated values
    Csv,
}

impl ExportFormat {
    /// Every supported format.
    pub const ALL: [Self; 3] = [Self::Pdf, Self::Excel, Self::Csv];

    /// Token sent as the `format` query parameter.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Excel => "excel",
            Self::Csv => "csv",
        }
    }

    /// File extension of the downloaded file. Only Excel differs from its token.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Excel => "xlsx",
            other => other.token(),
        }
    }

    /// Name the downloaded file is saved under.
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{EXPORT_FILE_STEM}.{}", self.extension())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.token() == token)
            .ok_or(Error::UnknownExportFormat { token })
    }
}

/// Fetches rendered export bytes.
#[async_trait]
pub trait ExportTransport: Send + Sync {
    /// Downloads the report in `format`, optionally restricted to one category.
    async fn fetch(&self, format: ExportFormat, category_id: Option<&str>) -> Result<Vec<u8>>;
}

/// `GET {base_url}/reports/export` with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpExportTransport {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpExportTransport {
    /// Creates a transport against `base_url` (e.g. `https://hub.example.com/api`).
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token,
        }
    }

    /// Builds the export request without sending it.
    pub fn request(
        &self,
        format: ExportFormat,
        category_id: Option<&str>,
    ) -> Result<reqwest::Request> {
        let url = format!("{}/reports/export", self.base_url.trim_end_matches('/'));
        let mut query = vec![("format", format.token())];
        if let Some(category_id) = category_id {
            query.push(("category_id", category_id));
        }

        let mut builder = self.client.get(url).query(&query);
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            builder = builder.bearer_auth(token);
        }
        builder.build().map_err(Into::into)
    }
}

#[async_trait]
impl ExportTransport for HttpExportTransport {
    async fn fetch(&self, format: ExportFormat, category_id: Option<&str>) -> Result<Vec<u8>> {
        let request = self.request(format, category_id)?;
        let response = self.client.execute(request).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ExportFailed {
                message: format!("server answered {status}"),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Destination for downloaded files.
#[async_trait]
pub trait FileSink: Send + Sync {
    /// Stores `bytes` as `file_name` and returns where they ended up.
    async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Saves into a directory through a temporary file and an atomic rename.
///
/// Each save writes its own uniquely named `.part` file, so concurrent saves
/// of the same name never share a scratch file.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Saves into `dir`, creating it on first use.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl FileSink for DirectorySink {
    async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;
        let target = self.dir.join(file_name);
        let partial = self.dir.join(format!(".{file_name}.{}.part", Uuid::new_v4()));

        let written = match fs::write(&partial, bytes).await {
            Ok(()) => fs::rename(&partial, &target).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&partial).await;
            return Err(e.into());
        }

        Ok(target)
    }
}

/// Transient user-facing notifications.
pub trait Notifier: Send + Sync {
    /// Reports a completed action.
    fn success(&self, message: &str);
    /// Reports a failed action.
    fn failure(&self, message: &str);
}

/// Logs notifications instead of displaying them.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        info!("{message}");
    }

    fn failure(&self, message: &str) {
        error!("{message}");
    }
}

/// Result of one export trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// File written to this path
    Saved(PathBuf),
    /// Request or save failed; the user was notified
    Failed,
    /// Another export was still running; nothing was requested
    Ignored,
}

/// Drives exports, one at a time.
#[derive(Debug)]
pub struct ReportExporter<T, S, N> {
    transport: T,
    sink: S,
    notifier: N,
    busy: BusyFlag,
}

impl<T, S, N> ReportExporter<T, S, N>
where
    T: ExportTransport,
    S: FileSink,
    N: Notifier,
{
    /// Wires an exporter from its collaborators.
    pub const fn new(transport: T, sink: S, notifier: N) -> Self {
        Self {
            transport,
            sink,
            notifier,
            busy: BusyFlag::new(),
        }
    }

    /// Whether an export is in flight; the trigger is disabled meanwhile.
    #[must_use]
    pub fn is_exporting(&self) -> bool {
        self.busy.is_busy()
    }

    /// Transport in use.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Notifier in use.
    pub const fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Downloads the report in `format` and saves it.
    ///
    /// A call made while another export is running is ignored without any
    /// request. Failures of the request or of the save are logged, notified
    /// once, and leave the exporter ready for another attempt.
    ///
    /// # Arguments
    /// * `format` - Format the server should render
    /// * `category_id` - Restricts the report to one category when given
    ///
    /// # Returns
    /// Where the file was saved, or whether the attempt failed or was ignored
    pub async fn export(&self, format: ExportFormat, category_id: Option<&str>) -> ExportOutcome {
        let Some(_guard) = self.busy.try_acquire() else {
            warn!("Export already in progress, ignoring {format} request");
            return ExportOutcome::Ignored;
        };

        info!(%format, ?category_id, "Exporting services report");
        let saved = match self.transport.fetch(format, category_id).await {
            Ok(bytes) => self.sink.save(&format.file_name(), &bytes).await,
            Err(e) => Err(e),
        };

        match saved {
            Ok(path) => {
                self.notifier
                    .success(&format!("Report exported to {}", path.display()));
                ExportOutcome::Saved(path)
            }
            Err(e) => {
                error!("Export ({format}) failed: {e}");
                self.notifier.failure("Failed to export report");
                ExportOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{RecordingNotifier, init_test_tracing, scratch_dir};
    use std::fs as std_fs;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Answers with fixed bytes or a fixed failure, optionally after a gate opens.
    #[derive(Default)]
    struct FakeTransport {
        calls: AtomicUsize,
        fail: bool,
        gate: Option<Notify>,
        requested: Mutex<Vec<(ExportFormat, Option<String>)>>,
    }

    #[async_trait]
    impl ExportTransport for FakeTransport {
        async fn fetch(&self, format: ExportFormat, category_id: Option<&str>) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested
                .lock()
                .unwrap()
                .push((format, category_id.map(str::to_string)));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(Error::ExportFailed {
                    message: "server answered 500 Internal Server Error".to_string(),
                });
            }
            Ok(b"name,provider\nJira,Atlassian\n".to_vec())
        }
    }

    /// Refuses every save.
    struct ReadOnlySink;

    #[async_trait]
    impl FileSink for ReadOnlySink {
        async fn save(&self, _file_name: &str, _bytes: &[u8]) -> Result<PathBuf> {
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only file system",
            )))
        }
    }

    fn leftover_parts(dir: &Path) -> Vec<PathBuf> {
        std_fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "part"))
            .collect()
    }

    #[test]
    fn test_file_names() {
        assert_eq!(ExportFormat::Excel.file_name(), "services_report.xlsx");
        assert_eq!(ExportFormat::Csv.file_name(), "services_report.csv");
        assert_eq!(ExportFormat::Pdf.file_name(), "services_report.pdf");
    }

    #[test]
    fn test_parse_tokens() {
        assert_eq!("excel".parse::<ExportFormat>().unwrap(), ExportFormat::Excel);
        assert_eq!(" PDF ".parse::<ExportFormat>().unwrap(), ExportFormat::Pdf);
        assert!(matches!(
            "xlsx".parse::<ExportFormat>(),
            Err(Error::UnknownExportFormat { .. })
        ));
    }

    #[test]
    fn test_http_request_shape() {
        let transport =
            HttpExportTransport::new("https://hub.example.com/api/", Some("secret".to_string()));
        let request = transport
            .request(ExportFormat::Excel, Some("cat-1"))
            .unwrap();

        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(
            request.url().as_str(),
            "https://hub.example.com/api/reports/export?format=excel&category_id=cat-1"
        );
        assert_eq!(
            request.headers()[reqwest::header::AUTHORIZATION],
            "Bearer secret"
        );
    }

    #[tokio::test]
    async fn test_directory_sink_writes_whole_file() {
        let dir = scratch_dir();
        let sink = DirectorySink::new(&dir);
        let path = sink.save("services_report.csv", b"a,b\n").await.unwrap();

        assert_eq!(path, dir.join("services_report.csv"));
        assert_eq!(std_fs::read(&path).unwrap(), b"a,b\n");
        assert!(leftover_parts(&dir).is_empty());
        let _ = std_fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_save_failure_leaves_no_partial_file_and_recovers() {
        init_test_tracing();
        let dir = scratch_dir();
        let target = dir.join("services_report.csv");
        // A directory in the way makes the final rename fail after the write.
        std_fs::create_dir_all(&target).unwrap();
        let exporter = ReportExporter::new(
            FakeTransport::default(),
            DirectorySink::new(&dir),
            RecordingNotifier::default(),
        );

        assert_eq!(
            exporter.export(ExportFormat::Csv, None).await,
            ExportOutcome::Failed
        );
        assert_eq!(exporter.notifier().failures(), 1);
        assert_eq!(exporter.notifier().successes(), 0);
        assert!(target.is_dir());
        assert!(leftover_parts(&dir).is_empty());
        assert!(!exporter.is_exporting());

        std_fs::remove_dir(&target).unwrap();
        assert_eq!(
            exporter.export(ExportFormat::Csv, None).await,
            ExportOutcome::Saved(target.clone())
        );
        assert_eq!(std_fs::read(&target).unwrap(), b"name,provider\nJira,Atlassian\n");
        assert_eq!(exporter.transport().calls.load(Ordering::SeqCst), 2);
        let _ = std_fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_sink_error_is_reported_once() {
        init_test_tracing();
        let exporter = ReportExporter::new(
            FakeTransport::default(),
            ReadOnlySink,
            RecordingNotifier::default(),
        );

        assert_eq!(
            exporter.export(ExportFormat::Pdf, Some("cat-1")).await,
            ExportOutcome::Failed
        );
        assert_eq!(exporter.transport().calls.load(Ordering::SeqCst), 1);
        assert_eq!(exporter.notifier().failures(), 1);
        assert!(!exporter.is_exporting());
    }

    #[tokio::test]
    async fn test_export_saves_and_notifies() {
        init_test_tracing();
        let dir = scratch_dir();
        let exporter = ReportExporter::new(
            FakeTransport::default(),
            DirectorySink::new(&dir),
            RecordingNotifier::default(),
        );

        let outcome = exporter.export(ExportFormat::Excel, Some("cat-1")).await;

        assert_eq!(outcome, ExportOutcome::Saved(dir.join("services_report.xlsx")));
        assert_eq!(exporter.notifier().successes(), 1);
        assert_eq!(
            exporter.transport().requested.lock().unwrap()[0],
            (ExportFormat::Excel, Some("cat-1".to_string()))
        );
        assert!(!exporter.is_exporting());
        let _ = std_fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_export_failure_writes_nothing_and_recovers() {
        init_test_tracing();
        let dir = scratch_dir();
        let exporter = ReportExporter::new(
            FakeTransport {
                fail: true,
                ..FakeTransport::default()
            },
            DirectorySink::new(&dir),
            RecordingNotifier::default(),
        );

        assert_eq!(
            exporter.export(ExportFormat::Csv, None).await,
            ExportOutcome::Failed
        );
        assert!(!dir.join("services_report.csv").exists());
        assert_eq!(exporter.notifier().failures(), 1);
        assert!(!exporter.is_exporting());

        assert_eq!(
            exporter.export(ExportFormat::Csv, None).await,
            ExportOutcome::Failed
        );
        assert_eq!(exporter.transport().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_export_failure() {
        init_test_tracing();
        let dir = scratch_dir();
        let exporter = ReportExporter::new(
            HttpExportTransport::new("http://127.0.0.1:9", None),
            DirectorySink::new(&dir),
            RecordingNotifier::default(),
        );

        assert_eq!(
            exporter.export(ExportFormat::Pdf, None).await,
            ExportOutcome::Failed
        );
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_rapid_double_export_makes_one_request() {
        init_test_tracing();
        let dir = scratch_dir();
        let exporter = ReportExporter::new(
            FakeTransport {
                gate: Some(Notify::new()),
                ..FakeTransport::default()
            },
            DirectorySink::new(&dir),
            RecordingNotifier::default(),
        );

        let (first, second, ()) = tokio::join!(
            exporter.export(ExportFormat::Csv, None),
            exporter.export(ExportFormat::Csv, None),
            async {
                tokio::task::yield_now().await;
                if let Some(gate) = &exporter.transport().gate {
                    gate.notify_one();
                }
            }
        );

        assert_eq!(first, ExportOutcome::Saved(dir.join("services_report.csv")));
        assert_eq!(second, ExportOutcome::Ignored);
        assert_eq!(exporter.transport().calls.load(Ordering::SeqCst), 1);
        let _ = std_fs::remove_dir_all(dir);
    }
}
