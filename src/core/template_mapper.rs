//! Copies voucher values onto the named fields of a form template.

use crate::core::form::remaining_amount;
use crate::core::vouchers;
use crate::domain::model::Voucher;
use crate::domain::ports::FillableForm;
use crate::utils::error::VoucherError;
use crate::utils::format::format_amount;

pub const MAX_DESTINATIONS: usize = 7;
pub const MAX_PASSENGERS: usize = 10;

/// Outcome of a mapping run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingReport {
    pub filled: Vec<String>,
    /// Fields whose value was empty.
    pub skipped: Vec<String>,
    /// Fields the template does not have or cannot hold text.
    pub missing: Vec<String>,
}

impl MappingReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

fn numbered(prefix: &str, index: usize) -> String {
    format!("{prefix}_{:02}", index + 1)
}

/// Every field name the mapper may write, in writing order.
pub fn field_names() -> Vec<String> {
    let mut names: Vec<String> = vec![
        "local_embarque".into(),
        "contato_01".into(),
        "contato_02".into(),
        "observacao".into(),
    ];
    for i in 0..MAX_DESTINATIONS {
        names.push(numbered("destino", i));
        names.push(numbered("data", i));
        names.push(numbered("horario", i));
    }
    for i in 0..MAX_PASSENGERS {
        names.push(numbered("passageiro", i));
    }
    names.extend(
        [
            "qt_adulto",
            "qt_crianca",
            "qt_colo",
            "total_passageiros",
            "total_a_pagar",
            "pre_reserva",
            "falta_pagar",
            "data_contrato",
            "nome_contratante",
            "cpf_contratante",
            "email_contratante",
        ]
        .map(String::from),
    );
    names
}

/// `(field, value)` pairs for a voucher. Destinations past the seventh and
/// passengers past the tenth are not represented.
pub fn field_values(voucher: &Voucher) -> Vec<(String, String)> {
    let mut values: Vec<(String, String)> = vec![
        ("local_embarque".into(), voucher.boarding_location.clone()),
        ("contato_01".into(), voucher.contractor_phone1.clone()),
        ("contato_02".into(), voucher.contractor_phone2.clone()),
        ("observacao".into(), voucher.observations.clone()),
    ];

    for (i, destination) in voucher.destinations.iter().take(MAX_DESTINATIONS).enumerate() {
        values.push((numbered("destino", i), destination.destination.clone()));
        values.push((numbered("data", i), destination.date.clone()));
        values.push((numbered("horario", i), destination.time.clone()));
    }
    for (i, passenger) in voucher.passengers.iter().take(MAX_PASSENGERS).enumerate() {
        values.push((numbered("passageiro", i), passenger.clone()));
    }

    values.extend([
        ("qt_adulto".into(), voucher.adults.to_string()),
        ("qt_crianca".into(), voucher.children.to_string()),
        ("qt_colo".into(), voucher.infants.to_string()),
        (
            "total_passageiros".into(),
            vouchers::total_passengers(voucher).to_string(),
        ),
        ("total_a_pagar".into(), format_amount(voucher.total_amount)),
        ("pre_reserva".into(), format_amount(voucher.advance_payment)),
        (
            "falta_pagar".into(),
            format_amount(remaining_amount(voucher.total_amount, voucher.advance_payment)),
        ),
        ("data_contrato".into(), voucher.contract_date.clone()),
        ("nome_contratante".into(), voucher.contractor_name.clone()),
        ("cpf_contratante".into(), voucher.contractor_cpf.clone()),
        ("email_contratante".into(), voucher.contractor_email.clone()),
    ]);
    values
}

/// Writes every non-empty value into `form`. A field the template lacks is
/// logged and skipped; any other failure stops the run.
pub fn fill<F: FillableForm + ?Sized>(
    form: &mut F,
    voucher: &Voucher,
) -> crate::utils::error::Result<MappingReport> {
    let mut report = MappingReport::default();

    for (field, value) in field_values(voucher) {
        if value.trim().is_empty() {
            report.skipped.push(field);
            continue;
        }
        match form.set_text(&field, &value) {
            Ok(()) => report.filled.push(field),
            Err(VoucherError::FieldNotFound { .. }) => {
                tracing::warn!("Template has no field '{}'", field);
                report.missing.push(field);
            }
            Err(VoucherError::UnsupportedField { kind, .. }) => {
                tracing::warn!("Template field '{}' is a {} field, skipped", field, kind);
                report.missing.push(field);
            }
            Err(e) => return Err(e),
        }
    }

    tracing::debug!(
        "Mapped voucher {}: {} filled, {} empty, {} missing",
        voucher.id,
        report.filled.len(),
        report.skipped.len(),
        report.missing.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Destination;
    use crate::utils::error::Result;
    use chrono::Utc;
    use std::collections::BTreeMap;

    /// In-memory form knowing a fixed set of field names.
    struct FakeForm {
        known: Vec<String>,
        values: BTreeMap<String, String>,
    }

    impl FakeForm {
        fn with_fields(known: Vec<String>) -> Self {
            Self {
                known,
                values: BTreeMap::new(),
            }
        }
    }

    impl FillableForm for FakeForm {
        fn set_text(&mut self, field: &str, value: &str) -> Result<()> {
            if !self.known.iter().any(|k| k == field) {
                return Err(VoucherError::FieldNotFound {
                    name: field.to_string(),
                });
            }
            self.values.insert(field.to_string(), value.to_string());
            Ok(())
        }
    }

    fn voucher() -> Voucher {
        Voucher {
            id: "v1".to_string(),
            agency_id: "a1".to_string(),
            template_id: "t1".to_string(),
            responsible_agent: None,
            destinations: (1..=9)
                .map(|i| Destination {
                    destination: format!("Place {i}"),
                    date: "02-08-2025".to_string(),
                    time: String::new(),
                })
                .collect(),
            boarding_location: "Hotel Beira Mar".to_string(),
            passengers: (1..=12).map(|i| format!("Passenger {i}")).collect(),
            adults: 2,
            children: 1,
            infants: 0,
            total_passengers: 3,
            total_amount: 450.0,
            advance_payment: 100.5,
            remaining_amount: 349.5,
            observations: String::new(),
            contract_date: "01-08-2025".to_string(),
            contractor_name: "Ana Lima".to_string(),
            contractor_cpf: "123.456.789-01".to_string(),
            contractor_phone1: "(85) 99999-0000".to_string(),
            contractor_phone2: String::new(),
            contractor_email: "ana@example.com".to_string(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_field_table() {
        let names = field_names();
        assert_eq!(names.len(), 4 + 3 * MAX_DESTINATIONS + MAX_PASSENGERS + 11);
        assert!(names.contains(&"destino_07".to_string()));
        assert!(names.contains(&"passageiro_10".to_string()));
        assert!(!names.contains(&"destino_08".to_string()));
    }

    #[test]
    fn test_fill_writes_formatted_values() {
        let mut form = FakeForm::with_fields(field_names());
        let report = fill(&mut form, &voucher()).unwrap();

        assert!(report.is_complete());
        assert_eq!(form.values["total_a_pagar"], "450.00");
        assert_eq!(form.values["pre_reserva"], "100.50");
        assert_eq!(form.values["falta_pagar"], "349.50");
        assert_eq!(form.values["qt_colo"], "0");
        assert_eq!(form.values["destino_07"], "Place 7");
        assert_eq!(form.values["passageiro_10"], "Passenger 10");
        assert!(!form.values.contains_key("horario_01"));
        assert!(report.skipped.contains(&"contato_02".to_string()));
        assert!(report.skipped.contains(&"observacao".to_string()));
    }

    #[test]
    fn test_stale_totals_are_not_exported() {
        let mut stale = voucher();
        stale.remaining_amount = 999.0;
        stale.total_passengers = 40;

        let mut form = FakeForm::with_fields(field_names());
        fill(&mut form, &stale).unwrap();
        assert_eq!(form.values["falta_pagar"], "349.50");
        assert_eq!(form.values["total_passageiros"], "3");
    }

    #[test]
    fn test_missing_fields_do_not_abort() {
        let known = field_names()
            .into_iter()
            .filter(|n| n != "local_embarque" && n != "cpf_contratante")
            .collect();
        let mut form = FakeForm::with_fields(known);
        let report = fill(&mut form, &voucher()).unwrap();

        assert_eq!(report.missing, vec!["local_embarque", "cpf_contratante"]);
        assert_eq!(form.values["contato_01"], "(85) 99999-0000");
        assert_eq!(form.values["email_contratante"], "ana@example.com");
    }
}
