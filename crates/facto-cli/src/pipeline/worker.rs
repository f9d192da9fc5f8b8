//! Per-file processing.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use facto_core::invoice::{ExtractionResult, InvoiceExtractor, TemplateInvoiceParser};
use facto_core::posting::{DeliveryMachine, DeliveryOutcome, EntityResolver, InvoicePoster, PostedInvoice};
use facto_core::{FactoConfig, PdfReader};
use facto_ledger::LedgerBackend;
use serde::Serialize;
use tracing::{error, info, warn};

use super::outcome::{move_to_folder, Destination, OutcomeFolders};
use super::readiness::{wait_for_file_ready, Readiness, ReadinessPolicy};

/// Step at which a file failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Readiness,
    Read,
    Extraction,
    Posting,
    Delivery,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Readiness => "readiness",
            Stage::Read => "read",
            Stage::Extraction => "extraction",
            Stage::Posting => "posting",
            Stage::Delivery => "delivery",
        };
        f.write_str(name)
    }
}

/// What happened to one detected file.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Posted and on the network.
    Delivered {
        posted: PostedInvoice,
        delivery: DeliveryOutcome,
        moved_to: Option<PathBuf>,
    },
    /// Posted; sending waits for the partner check.
    Pending {
        posted: PostedInvoice,
        moved_to: Option<PathBuf>,
    },
    Failed {
        stage: Stage,
        message: String,
        moved_to: Option<PathBuf>,
    },
    /// Removed from the inbox before it could be processed.
    Vanished,
}

impl FileOutcome {
    /// Folder the document was routed to, if any.
    pub fn destination(&self) -> Option<Destination> {
        match self {
            FileOutcome::Delivered { .. } => Some(Destination::Sent),
            FileOutcome::Pending { .. } => Some(Destination::Posted),
            FileOutcome::Failed { .. } => Some(Destination::Error),
            FileOutcome::Vanished => None,
        }
    }

    pub fn moved_to(&self) -> Option<&Path> {
        match self {
            FileOutcome::Delivered { moved_to, .. }
            | FileOutcome::Pending { moved_to, .. }
            | FileOutcome::Failed { moved_to, .. } => moved_to.as_deref(),
            FileOutcome::Vanished => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }
}

struct Failure {
    stage: Stage,
    message: String,
}

impl Failure {
    fn new(stage: Stage, error: impl fmt::Display) -> Self {
        Self {
            stage,
            message: error.to_string(),
        }
    }
}

/// Runs one document from readiness to its outcome folder.
///
/// Every error is caught here: the file is logged with its stage and moved
/// to the error folder under its original name.
#[derive(Clone)]
pub struct InvoiceWorker {
    parser: TemplateInvoiceParser,
    poster: InvoicePoster,
    delivery: DeliveryMachine,
    folders: OutcomeFolders,
    readiness: ReadinessPolicy,
}

impl InvoiceWorker {
    pub fn new(config: &FactoConfig, backend: Arc<dyn LedgerBackend>) -> Self {
        let resolver = EntityResolver::new(backend.clone(), config.posting.clone());
        Self {
            parser: TemplateInvoiceParser::from_config(&config.extraction),
            poster: InvoicePoster::new(backend.clone(), resolver),
            delivery: DeliveryMachine::new(backend, config.posting.sending_method.clone()),
            folders: OutcomeFolders::from_config(&config.watch),
            readiness: ReadinessPolicy::new(
                Duration::from_secs(config.watch.readiness_timeout_secs),
                Duration::from_millis(config.watch.readiness_retry_ms),
            ),
        }
    }

    pub fn folders(&self) -> &OutcomeFolders {
        &self.folders
    }

    /// Process the document at `path` and route it.
    pub async fn process(&self, path: &Path) -> FileOutcome {
        let filename = file_name(path);
        info!(file = %filename, "Detected: waiting for file ready");

        match wait_for_file_ready(path, self.readiness).await {
            Readiness::Ready => {}
            Readiness::Vanished => {
                warn!(file = %filename, "File disappeared before processing");
                return FileOutcome::Vanished;
            }
            Readiness::NotReady => {
                error!(file = %filename, "File locked or inaccessible");
                let failure = Failure::new(Stage::Readiness, "file locked or inaccessible");
                return self.fail(path, &filename, failure);
            }
        }

        info!(file = %filename, "Processing");
        let posted = match self.post(path).await {
            Ok(posted) => posted,
            Err(failure) => return self.fail(path, &filename, failure),
        };
        info!(file = %filename, move_id = posted.move_id, "{}", posted.message());

        match self.delivery.deliver(posted.move_id).await {
            Ok(DeliveryOutcome::Pending) => {
                warn!(file = %filename, move_id = posted.move_id, "{}", DeliveryOutcome::Pending);
                let moved_to = self.route(path, Destination::Posted, &posted.filename);
                FileOutcome::Pending { posted, moved_to }
            }
            Ok(delivery) => {
                info!(file = %filename, move_id = posted.move_id, "{}: {}", delivery, posted.filename);
                let moved_to = self.route(path, Destination::Sent, &posted.filename);
                FileOutcome::Delivered {
                    posted,
                    delivery,
                    moved_to,
                }
            }
            Err(e) => self.fail(path, &filename, Failure::new(Stage::Delivery, e)),
        }
    }

    /// Read, extract and post.
    async fn post(&self, path: &Path) -> Result<PostedInvoice, Failure> {
        let extraction = self.extract(path).await?;
        for warning in &extraction.warnings {
            warn!(invoice = %extraction.invoice.invoice_number, "{}", warning);
        }

        self.poster
            .post(path, &extraction.invoice)
            .await
            .map_err(|e| Failure::new(Stage::Posting, e))
    }

    /// PDF parsing is CPU-bound, so it runs off the async workers.
    async fn extract(&self, path: &Path) -> Result<ExtractionResult, Failure> {
        let parser = self.parser.clone();
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let document = PdfReader::new()
                .read_file(&owned)
                .map_err(|e| Failure::new(Stage::Read, e))?;
            parser
                .extract_document(&document)
                .map_err(|e| Failure::new(Stage::Extraction, e))
        })
        .await
        .map_err(|e| Failure::new(Stage::Extraction, e))?
    }

    fn fail(&self, path: &Path, filename: &str, failure: Failure) -> FileOutcome {
        error!(file = %filename, stage = %failure.stage, "Failed: {}", failure.message);
        let moved_to = self.route(path, Destination::Error, filename);
        FileOutcome::Failed {
            stage: failure.stage,
            message: failure.message,
            moved_to,
        }
    }

    fn route(&self, path: &Path, destination: Destination, filename: &str) -> Option<PathBuf> {
        let folder = self.folders.path(destination);
        match move_to_folder(path, folder, filename) {
            Ok(Some(target)) => {
                info!("Moved to {}", target.display());
                Some(target)
            }
            Ok(None) => None,
            Err(e) => {
                error!("Cannot move {} to {}: {}", path.display(), folder.display(), e);
                None
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
