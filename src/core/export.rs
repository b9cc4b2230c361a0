use crate::core::agencies::AgencyBook;
use crate::core::pdf_form::PdfForm;
use crate::core::store::RecordStore;
use crate::core::template_mapper::{self, MappingReport};
use crate::domain::model::Voucher;
use crate::domain::ports::Storage;
use crate::utils::error::{Result, VoucherError};
use crate::utils::format::safe_file_component;
use chrono::{NaiveDate, Utc};

/// A generated voucher document.
#[derive(Debug, Clone)]
pub struct RenderedVoucher {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub report: MappingReport,
}

/// `voucher_<contractor>_<YYYY-MM-DD>.pdf`.
pub fn export_file_name(contractor_name: &str, on: NaiveDate) -> String {
    format!(
        "voucher_{}_{}.pdf",
        safe_file_component(contractor_name),
        on.format("%Y-%m-%d")
    )
}

/// Fills a voucher's template and flattens it into a static PDF.
pub struct VoucherExporter<'a, S: Storage> {
    store: &'a RecordStore<S>,
}

impl<'a, S: Storage> VoucherExporter<'a, S> {
    pub fn new(store: &'a RecordStore<S>) -> Self {
        Self { store }
    }

    pub async fn render(&self, voucher: &Voucher) -> Result<RenderedVoucher> {
        let (agency, template) = AgencyBook::new(self.store)
            .resolve_template(&voucher.agency_id, &voucher.template_id)
            .await
            .inspect_err(|e| tracing::error!("Cannot render voucher {}: {}", voucher.id, e))?;
        tracing::debug!(
            "Rendering voucher {} with template '{}' of '{}'",
            voucher.id,
            template.name,
            agency.name
        );

        let mut form = PdfForm::load(&template.data).map_err(|e| match e {
            VoucherError::PdfError(source) => VoucherError::InvalidTemplate {
                name: template.name.clone(),
                reason: source.to_string(),
            },
            other => other,
        })?;
        let report = template_mapper::fill(&mut form, voucher)?;
        form.flatten()?;
        let bytes = form.save()?;

        if !report.is_complete() {
            tracing::warn!(
                "Template '{}' lacks {} mapped fields",
                template.name,
                report.missing.len()
            );
        }

        Ok(RenderedVoucher {
            file_name: export_file_name(&voucher.contractor_name, Utc::now().date_naive()),
            bytes,
            report,
        })
    }

    /// Renders and writes the PDF into `output`, returning what was written.
    pub async fn export_to<O: Storage>(&self, voucher: &Voucher, output: &O) -> Result<RenderedVoucher> {
        let rendered = self.render(voucher).await?;
        output.write_file(&rendered.file_name, &rendered.bytes).await?;
        tracing::info!(
            "Voucher {} exported as {} ({} bytes)",
            voucher.id,
            rendered.file_name,
            rendered.bytes.len()
        );
        Ok(rendered)
    }
}
