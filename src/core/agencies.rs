use crate::core::store::{Collection, RecordStore};
use crate::domain::model::{new_id, Agency, Template};
use crate::domain::ports::Storage;
use crate::utils::error::{Result, VoucherError};
use crate::utils::validation::{validate_file_extension, validate_non_empty_string};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Rejects anything that is not a PDF by name and by header.
pub fn ensure_pdf(file_name: &str, data: &[u8]) -> Result<()> {
    validate_file_extension("template", file_name, &["pdf"]).map_err(|_| {
        VoucherError::InvalidTemplate {
            name: file_name.to_string(),
            reason: "Please select a valid PDF file.".to_string(),
        }
    })?;

    if !data.starts_with(PDF_MAGIC) {
        return Err(VoucherError::InvalidTemplate {
            name: file_name.to_string(),
            reason: "The file does not look like a PDF document.".to_string(),
        });
    }
    Ok(())
}

/// Agencies and their templates. Templates are append-only; the only way to
/// drop one is to remove its whole agency.
pub struct AgencyBook<'a, S: Storage> {
    store: &'a RecordStore<S>,
}

impl<'a, S: Storage> AgencyBook<'a, S> {
    pub fn new(store: &'a RecordStore<S>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Agency>> {
        let mut agencies: Vec<Agency> = self.store.get(Collection::Agencies).await?;

        // Templates stored before they carried ids get one now, once.
        let mut assigned = 0;
        for template in agencies.iter_mut().flat_map(|a| a.templates.iter_mut()) {
            if template.id.is_empty() {
                template.id = new_id();
                assigned += 1;
            }
        }
        if assigned > 0 {
            tracing::info!("Assigned ids to {} legacy templates", assigned);
            self.store.put(Collection::Agencies, &agencies).await?;
        }

        Ok(agencies)
    }

    pub async fn find(&self, agency_id: &str) -> Result<Agency> {
        self.list()
            .await?
            .into_iter()
            .find(|a| a.id == agency_id)
            .ok_or_else(|| VoucherError::NotFound {
                entity: "Agency",
                id: agency_id.to_string(),
            })
    }

    /// Stores `data` as a new template, appended to the agency named
    /// `agency_name` or to a freshly created one.
    pub async fn add_template(
        &self,
        agency_name: &str,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<(Agency, Template)> {
        validate_non_empty_string("agency.name", agency_name)?;
        ensure_pdf(file_name, &data)?;

        let mut agencies = self.list().await?;
        let template = Template::new(file_name.to_string(), data);

        let position = match agencies.iter().position(|a| a.name == agency_name) {
            Some(index) => {
                tracing::debug!("Appending template to existing agency '{}'", agency_name);
                index
            }
            None => {
                tracing::debug!("Creating agency '{}'", agency_name);
                agencies.push(Agency::new(agency_name.to_string()));
                agencies.len() - 1
            }
        };
        agencies[position].templates.push(template.clone());

        self.store.put(Collection::Agencies, &agencies).await?;
        tracing::info!(
            "Template '{}' saved for agency '{}'",
            file_name,
            agency_name
        );
        Ok((agencies[position].clone(), template))
    }

    /// Removes the agency. Vouchers that point at it are left untouched.
    pub async fn remove(&self, agency_id: &str) -> Result<Agency> {
        if agency_id.is_empty() {
            return Err(VoucherError::NotFound {
                entity: "Agency",
                id: String::new(),
            });
        }

        let mut agencies = self.list().await?;
        let index = agencies
            .iter()
            .position(|a| a.id == agency_id)
            .ok_or_else(|| VoucherError::NotFound {
                entity: "Agency",
                id: agency_id.to_string(),
            })?;

        let removed = agencies.remove(index);
        self.store.put(Collection::Agencies, &agencies).await?;
        tracing::info!("Agency '{}' removed", removed.name);
        Ok(removed)
    }

    pub async fn resolve_template(
        &self,
        agency_id: &str,
        template_id: &str,
    ) -> Result<(Agency, Template)> {
        let agency = self.find(agency_id).await?;
        let template = agency
            .template(template_id)
            .cloned()
            .ok_or_else(|| VoucherError::NotFound {
                entity: "Template",
                id: template_id.to_string(),
            })?;
        Ok((agency, template))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStorage;

    fn pdf_bytes() -> Vec<u8> {
        b"%PDF-1.4\n%fake body\n".to_vec()
    }

    #[tokio::test]
    async fn test_same_name_appends_template() {
        let store = RecordStore::new(MemoryStorage::new());
        let book = AgencyBook::new(&store);

        let (first, _) = book
            .add_template("Ceará Tours", "day-trip.pdf", pdf_bytes())
            .await
            .unwrap();
        let (second, template) = book
            .add_template("Ceará Tours", "transfer.pdf", pdf_bytes())
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.templates.len(), 2);
        assert_eq!(second.templates[1].id, template.id);
        assert_eq!(book.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_non_pdf_uploads() {
        let store = RecordStore::new(MemoryStorage::new());
        let book = AgencyBook::new(&store);

        let err = book
            .add_template("Agency", "voucher.docx", pdf_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, VoucherError::InvalidTemplate { .. }));

        let err = book
            .add_template("Agency", "voucher.pdf", b"PK\x03\x04".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, VoucherError::InvalidTemplate { .. }));

        assert!(book.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_unknown_agency() {
        let store = RecordStore::new(MemoryStorage::new());
        let book = AgencyBook::new(&store);

        let err = book.remove("missing").await.unwrap_err();
        assert!(matches!(err, VoucherError::NotFound { entity: "Agency", .. }));
    }

    #[tokio::test]
    async fn test_legacy_templates_receive_ids() {
        let storage = MemoryStorage::new();
        let legacy = serde_json::json!([{
            "id": "lx2k9abc",
            "name": "Old Agency",
            "templates": [{"name": "old.pdf", "data": [37, 80, 68, 70], "uploadedAt": "2024-05-01T10:00:00Z"}],
            "createdAt": "2024-05-01T10:00:00Z"
        }]);
        storage
            .write_file("agencies", legacy.to_string().as_bytes())
            .await
            .unwrap();
        let store = RecordStore::new(storage);
        let book = AgencyBook::new(&store);

        let first = book.list().await.unwrap();
        let template_id = first[0].templates[0].id.clone();
        assert!(!template_id.is_empty());

        let again = book.list().await.unwrap();
        assert_eq!(again[0].templates[0].id, template_id);
        assert_eq!(again[0].templates[0].data, b"%PDF".to_vec());
    }
}
