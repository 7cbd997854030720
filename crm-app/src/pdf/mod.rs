//! Document PDFs.
//!
//! Layouts (`invoice`, `estimate`, `preview`) draw onto a [`canvas::Canvas`]
//! display list; [`render::render`] turns that list into bytes. Keeping the
//! two apart lets pagination be checked without parsing PDF output.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::format::sanitize_filename;
use crate::model::DocumentKind;
use crate::Crm;

pub mod branded;
pub mod canvas;
pub mod estimate;
pub mod invoice;
pub mod logo;
pub mod metrics;
pub mod preview;
pub mod render;

#[derive(Debug, Clone)]
pub struct DocumentPdf {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// `invoice-INV-0001.pdf`, with anything unsafe in a file name replaced.
pub fn pdf_filename(kind: DocumentKind, number: &str) -> String {
    sanitize_filename(&format!("{}-{}.pdf", kind.as_str(), number.trim()))
}

fn document_title(kind: DocumentKind, number: &str) -> String {
    let word = match kind {
        DocumentKind::Estimate => "Estimate",
        DocumentKind::Invoice => "Invoice",
    };
    format!("{word} {number}")
}

impl Crm {
    /// The branded estimate, with the configured company, logo and tax rate.
    pub async fn estimate_pdf(&self, id: &str, config: &AppConfig) -> Result<DocumentPdf> {
        let doc = self.get_estimate(id).await?;
        let logo = logo::load_logo(config.logo_url.as_deref()).await;
        let canvas = estimate::layout_estimate(&doc, &config.company, logo.is_some(), config.estimate_tax_rate);
        let number = &doc.estimate.estimate_number;
        let bytes = render::render(&document_title(DocumentKind::Estimate, number), &canvas, logo.as_ref())
            .map_err(|e| {
                error!(op = "estimate_pdf", id, error = %e, "pdf render failed");
                e
            })?;
        Ok(DocumentPdf { filename: pdf_filename(DocumentKind::Estimate, number), bytes })
    }

    /// The branded invoice including its payment history.
    pub async fn invoice_pdf(&self, id: &str, config: &AppConfig) -> Result<DocumentPdf> {
        let doc = self.get_invoice(id).await?;
        let logo = logo::load_logo(config.logo_url.as_deref()).await;
        let canvas = invoice::layout_invoice(&doc, &config.company, logo.is_some());
        let number = &doc.invoice.invoice_number;
        let bytes = render::render(&document_title(DocumentKind::Invoice, number), &canvas, logo.as_ref())
            .map_err(|e| {
                error!(op = "invoice_pdf", id, error = %e, "pdf render failed");
                e
            })?;
        Ok(DocumentPdf { filename: pdf_filename(DocumentKind::Invoice, number), bytes })
    }

    /// The plain single-column document for either kind.
    pub async fn preview_pdf(&self, kind: DocumentKind, id: &str) -> Result<DocumentPdf> {
        let (canvas, number) = match kind {
            DocumentKind::Estimate => {
                let doc = self.get_estimate(id).await?;
                (preview::layout_estimate_preview(&doc), doc.estimate.estimate_number)
            }
            DocumentKind::Invoice => {
                let doc = self.get_invoice(id).await?;
                (preview::layout_invoice_preview(&doc), doc.invoice.invoice_number)
            }
        };
        let bytes = render::render(&document_title(kind, &number), &canvas, None).map_err(|e| {
            error!(op = "preview_pdf", id, error = %e, "pdf render failed");
            e
        })?;
        Ok(DocumentPdf { filename: pdf_filename(kind, &number), bytes })
    }
}

/// Writes the PDF into `dir` (created when missing) and returns its path.
pub async fn write_pdf(dir: &Path, pdf: &DocumentPdf) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(&pdf.filename);
    tokio::fs::write(&path, &pdf.bytes).await.map_err(|e| {
        error!(op = "write_pdf", path = %path.display(), error = %e, "pdf write failed");
        e
    })?;
    info!(path = %path.display(), bytes = pdf.bytes.len(), "pdf written");
    Ok(path)
}

/// Hands the file to the system print spooler.
#[cfg(unix)]
pub async fn print_pdf(path: &Path) -> Result<()> {
    let output = tokio::process::Command::new("lp").arg(path).output().await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        error!(op = "print_pdf", path = %path.display(), stderr = %stderr, "lp failed");
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("lp exited with {}: {stderr}", output.status),
        )));
    }
    info!(path = %path.display(), "sent to printer");
    Ok(())
}

#[cfg(not(unix))]
pub async fn print_pdf(path: &Path) -> Result<()> {
    Err(Error::Config(format!(
        "printing is only supported through lp; open {} to print it",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PaymentMethod;
    use crate::testing;

    #[test]
    fn filenames_name_kind_and_number() {
        assert_eq!(pdf_filename(DocumentKind::Invoice, "INV-0001"), "invoice-INV-0001.pdf");
        assert_eq!(pdf_filename(DocumentKind::Estimate, "EST/7"), "estimate-EST_7.pdf");
    }

    #[tokio::test]
    async fn invoice_pdf_is_written_to_disk() {
        let crm = testing::memory_crm().await;
        let customer = testing::customer(&crm, "Ada").await;
        let doc = testing::invoice(&crm, &customer.id, &[("Valve", "40", "20"), ("Labor only", "", "35")]).await;
        crm.record_payment(&testing::payment(&doc.invoice.id, 50.0, PaymentMethod::Card))
            .await
            .unwrap();

        let pdf = crm.invoice_pdf(&doc.invoice.id, &AppConfig::default()).await.unwrap();
        assert_eq!(pdf.filename, format!("invoice-{}.pdf", doc.invoice.invoice_number));
        assert!(pdf.bytes.starts_with(b"%PDF"));

        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(&dir.path().join("out"), &pdf).await.unwrap();
        let written = std::fs::read(&path).unwrap();
        assert_eq!(written, pdf.bytes);
    }

    #[tokio::test]
    async fn estimate_and_preview_pdfs_render() {
        let crm = testing::memory_crm().await;
        let customer = testing::customer(&crm, "Bob").await;
        let doc = testing::estimate(&crm, &customer.id, &[("Leak", "10", "5")]).await;

        let config = AppConfig { estimate_tax_rate: 0.08, ..AppConfig::default() };
        let pdf = crm.estimate_pdf(&doc.estimate.id, &config).await.unwrap();
        assert!(pdf.filename.starts_with("estimate-EST-"));
        assert!(pdf.bytes.starts_with(b"%PDF"));

        let preview = crm.preview_pdf(DocumentKind::Estimate, &doc.estimate.id).await.unwrap();
        assert_eq!(preview.filename, pdf.filename);
        assert!(preview.bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn unknown_document_is_not_found() {
        let crm = testing::memory_crm().await;
        let err = crm.invoice_pdf("missing", &AppConfig::default()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
