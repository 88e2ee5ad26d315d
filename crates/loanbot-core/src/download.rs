//! Saving generated letters to disk.

use std::path::{Path, PathBuf};

use crate::action::LoanOffer;
use crate::agent::{AgentBackend, ApplicationDetails};
use crate::error::Result;

pub const SANCTION_LETTER_FILE: &str = "Sanction_Letter.pdf";
pub const APPLICATION_LETTER_FILE: &str = "Loan_Application_Letter.pdf";

/// Where a download offer currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    Ready,
    Generating,
    Downloaded(PathBuf),
    Failed(String),
}

/// A sanction letter the user can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOffer {
    pub offer: LoanOffer,
    pub status: DownloadStatus,
}

impl DownloadOffer {
    pub fn new(offer: LoanOffer) -> Self {
        Self {
            offer,
            status: DownloadStatus::Ready,
        }
    }

    pub fn label(&self) -> &str {
        match &self.status {
            DownloadStatus::Ready => "Download Sanction Letter",
            DownloadStatus::Generating => "Generating...",
            DownloadStatus::Downloaded(_) => "Downloaded!",
            DownloadStatus::Failed(_) => "Failed to generate",
        }
    }
}

/// Write `bytes` into `dir` without clobbering an existing file.
///
/// Taken names get ` (1)`, ` (2)`, ... before the extension.
pub fn save_download(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let candidate = dir.join(file_name);
    let path = if candidate.exists() {
        let (stem, ext) = match file_name.rsplit_once('.') {
            Some((stem, ext)) => (stem, format!(".{}", ext)),
            None => (file_name, String::new()),
        };
        (1..)
            .map(|n| dir.join(format!("{} ({}){}", stem, n, ext)))
            .find(|p| !p.exists())
            .unwrap_or(candidate)
    } else {
        candidate
    };

    std::fs::write(&path, bytes)?;
    tracing::info!(path = %path.display(), size = bytes.len(), "Saved download");
    Ok(path)
}

pub async fn download_sanction_letter(
    backend: &dyn AgentBackend,
    dir: &Path,
    offer: &LoanOffer,
) -> Result<PathBuf> {
    let bytes = backend.sanction_letter(offer).await?;
    save_download(dir, SANCTION_LETTER_FILE, &bytes)
}

pub async fn download_application_letter(
    backend: &dyn AgentBackend,
    dir: &Path,
    details: &ApplicationDetails,
) -> Result<PathBuf> {
    let bytes = backend.application_letter(details).await?;
    save_download(dir, APPLICATION_LETTER_FILE, &bytes)
}
