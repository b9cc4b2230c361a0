use crate::core::agencies::AgencyBook;
use crate::core::autocomplete::AutocompleteDictionary;
use crate::core::form::{remaining_amount, VoucherForm};
use crate::core::store::{Collection, RecordStore};
use crate::domain::model::{new_id, Agency, AgencyProfile, Voucher};
use crate::domain::ports::Storage;
use crate::utils::error::{Result, VoucherError};
use crate::utils::format::format_currency;
use chrono::{DateTime, Utc};

/// One line of the voucher list.
#[derive(Debug, Clone, PartialEq)]
pub struct VoucherSummary {
    pub id: String,
    pub contractor_name: String,
    pub created_on: String,
    pub agent: String,
    pub destinations: String,
    pub total_passengers: u32,
    pub total: String,
    pub remaining: String,
}

impl VoucherSummary {
    pub fn new(voucher: &Voucher, profile: &AgencyProfile) -> Self {
        let agent = voucher
            .responsible_agent
            .as_deref()
            .and_then(|id| profile.agent(id))
            .map(|a| a.name.clone())
            .unwrap_or_else(|| "Agent not informed".to_string());

        Self {
            id: voucher.id.clone(),
            contractor_name: voucher.contractor_name.clone(),
            created_on: voucher.created_at.format("%d-%m-%Y").to_string(),
            agent,
            destinations: voucher
                .destinations
                .iter()
                .map(|d| d.destination.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            total_passengers: total_passengers(voucher),
            total: format_currency(voucher.total_amount),
            remaining: format_currency(remaining_amount(
                voucher.total_amount,
                voucher.advance_payment,
            )),
        }
    }
}

pub fn total_passengers(voucher: &Voucher) -> u32 {
    voucher
        .adults
        .saturating_add(voucher.children)
        .saturating_add(voucher.infants)
}

/// Recomputes the derived totals from their inputs and fills a missing
/// creation time from the last update. Returns whether anything changed.
pub fn normalize(voucher: &mut Voucher) -> bool {
    let mut changed = false;

    let passengers = total_passengers(voucher);
    if voucher.total_passengers != passengers {
        voucher.total_passengers = passengers;
        changed = true;
    }

    let remaining = remaining_amount(voucher.total_amount, voucher.advance_payment);
    if voucher.remaining_amount != remaining {
        voucher.remaining_amount = remaining;
        changed = true;
    }

    if voucher.created_at == DateTime::<Utc>::default() {
        if let Some(updated_at) = voucher.updated_at {
            voucher.created_at = updated_at;
            changed = true;
        }
    }
    changed
}

/// Rewrites positional `agencyId-index` template references to template
/// ids. Returns how many vouchers changed.
pub fn migrate_template_refs(vouchers: &mut [Voucher], agencies: &[Agency]) -> usize {
    let mut migrated = 0;
    for voucher in vouchers.iter_mut() {
        let Some(agency) = agencies.iter().find(|a| a.id == voucher.agency_id) else {
            continue;
        };
        if agency.template(&voucher.template_id).is_some() {
            continue;
        }
        let position = voucher
            .template_id
            .strip_prefix(agency.id.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|index| index.parse::<usize>().ok());
        if let Some(template) = position.and_then(|i| agency.templates.get(i)) {
            voucher.template_id = template.id.clone();
            migrated += 1;
        }
    }
    migrated
}

pub struct VoucherBook<'a, S: Storage> {
    store: &'a RecordStore<S>,
}

impl<'a, S: Storage> VoucherBook<'a, S> {
    pub fn new(store: &'a RecordStore<S>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Voucher>> {
        let mut vouchers: Vec<Voucher> = self.store.get(Collection::Vouchers).await?;

        if !vouchers.is_empty() {
            let normalized = vouchers
                .iter_mut()
                .map(normalize)
                .filter(|changed| *changed)
                .count();
            let agencies = AgencyBook::new(self.store).list().await?;
            let migrated = migrate_template_refs(&mut vouchers, &agencies);
            if migrated > 0 {
                tracing::info!("Migrated {} positional template references", migrated);
            }
            if normalized > 0 {
                tracing::info!("Recomputed derived fields of {} vouchers", normalized);
            }
            if migrated > 0 || normalized > 0 {
                self.store.put(Collection::Vouchers, &vouchers).await?;
            }
        }

        Ok(vouchers)
    }

    pub async fn get(&self, id: &str) -> Result<Voucher> {
        self.list()
            .await?
            .into_iter()
            .find(|v| v.id == id)
            .ok_or_else(|| VoucherError::NotFound {
                entity: "Voucher",
                id: id.to_string(),
            })
    }

    /// Validates the form, learns its values for autocomplete and stores
    /// the voucher: a new one when `editing_id` is `None`, otherwise a
    /// replacement keeping the original creation time.
    pub async fn save(&self, form: &VoucherForm, editing_id: Option<&str>) -> Result<Voucher> {
        let data = form.to_data();
        data.validate().map_err(VoucherError::Validation)?;

        let mut vouchers = self.list().await?;

        let voucher = match editing_id {
            Some(id) => {
                let index = vouchers.iter().position(|v| v.id == id).ok_or_else(|| {
                    VoucherError::NotFound {
                        entity: "Voucher",
                        id: id.to_string(),
                    }
                })?;
                let created_at = vouchers[index].created_at;
                let updated = data.into_voucher(id.to_string(), created_at, Some(Utc::now()));
                vouchers[index] = updated.clone();
                updated
            }
            None => {
                let created = data.into_voucher(new_id(), Utc::now(), None);
                vouchers.push(created.clone());
                created
            }
        };

        let mut dictionary = self.autocomplete().await?;
        dictionary.record_voucher(&voucher);
        self.store.save(Collection::Autocomplete, &dictionary).await?;

        self.store.put(Collection::Vouchers, &vouchers).await?;
        tracing::info!("Voucher {} saved for {}", voucher.id, voucher.contractor_name);
        Ok(voucher)
    }

    /// Returns whether a voucher was removed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut vouchers = self.list().await?;
        let before = vouchers.len();
        vouchers.retain(|v| v.id != id);

        if vouchers.len() == before {
            return Ok(false);
        }
        self.store.put(Collection::Vouchers, &vouchers).await?;
        Ok(true)
    }

    pub async fn summaries(&self) -> Result<Vec<VoucherSummary>> {
        let profile: AgencyProfile = self
            .store
            .load(Collection::AgencyProfile)
            .await?
            .unwrap_or_default();
        Ok(self
            .list()
            .await?
            .iter()
            .map(|v| VoucherSummary::new(v, &profile))
            .collect())
    }

    pub async fn autocomplete(&self) -> Result<AutocompleteDictionary> {
        Ok(self
            .store
            .load(Collection::Autocomplete)
            .await?
            .unwrap_or_default())
    }
}
