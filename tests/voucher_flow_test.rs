use anyhow::Result;
use tempfile::TempDir;
use voucher_desk::core::form::{DestinationRow, ValidationIssue};
use voucher_desk::core::store::Collection;
use voucher_desk::core::template_scaffold::voucher_template;
use voucher_desk::domain::ports::Storage;
use voucher_desk::{
    AgencyBook, LocalStorage, RecordStore, VoucherBook, VoucherError, VoucherExporter, VoucherForm,
};

fn form(agency_id: &str, template_id: &str) -> VoucherForm {
    VoucherForm {
        agency_id: agency_id.to_string(),
        template_id: template_id.to_string(),
        destinations: vec![
            DestinationRow {
                destination: "Jericoacoara".to_string(),
                date: "2025-07-14".to_string(),
                time: "05:30".to_string(),
            },
            DestinationRow::default(),
        ],
        boarding_location: "Hotel Praia Mar".to_string(),
        passengers: vec!["Ana Lima".to_string(), "Bruno Lima".to_string()],
        adults: "2".to_string(),
        children: "1".to_string(),
        total_amount: "1250.90".to_string(),
        advance_payment: "300".to_string(),
        observations: "Levar documento com foto".to_string(),
        contract_date: "2025-06-30".to_string(),
        contractor_name: "Ana Lima".to_string(),
        contractor_cpf: "123.456.789-01".to_string(),
        contractor_phone1: "(85) 99999-0000".to_string(),
        contractor_email: "ana@example.com".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_voucher_round_trips_through_disk() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = RecordStore::new(LocalStorage::new(temp_dir.path()));

    let (agency, template) = AgencyBook::new(&store)
        .add_template("Ceará Tours", "voucher.pdf", voucher_template("Ceará Tours")?)
        .await?;
    let saved = VoucherBook::new(&store)
        .save(&form(&agency.id, &template.id), None)
        .await?;

    assert_eq!(saved.total_passengers, 3);
    assert_eq!(saved.remaining_amount, 950.9);
    assert_eq!(saved.destinations.len(), 1);
    assert_eq!(saved.destinations[0].date, "14-07-2025");

    let reopened = RecordStore::new(LocalStorage::new(temp_dir.path()));
    let loaded = VoucherBook::new(&reopened).get(&saved.id).await?;
    assert_eq!(loaded, saved);

    let raw = reopened.storage().read_file("vouchers").await?.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&raw)?;
    assert_eq!(json[0]["contractorName"], "Ana Lima");
    assert_eq!(json[0]["advancePayment"], 300.0);
    Ok(())
}

#[tokio::test]
async fn test_deleting_agency_keeps_vouchers() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = RecordStore::new(LocalStorage::new(temp_dir.path()));
    let agencies = AgencyBook::new(&store);
    let vouchers = VoucherBook::new(&store);

    let (agency, template) = agencies
        .add_template("Sertão Trips", "voucher.pdf", voucher_template("Sertão Trips")?)
        .await?;
    let saved = vouchers.save(&form(&agency.id, &template.id), None).await?;

    agencies.remove(&agency.id).await?;
    assert!(agencies.list().await?.is_empty());

    let still_there = vouchers.get(&saved.id).await?;
    assert_eq!(still_there.agency_id, agency.id);
    assert_eq!(vouchers.summaries().await?.len(), 1);

    let err = VoucherExporter::new(&store)
        .render(&still_there)
        .await
        .unwrap_err();
    assert!(matches!(err, VoucherError::NotFound { entity: "Agency", .. }));
    Ok(())
}

#[tokio::test]
async fn test_validation_blocks_incomplete_vouchers() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = RecordStore::new(LocalStorage::new(temp_dir.path()));
    let vouchers = VoucherBook::new(&store);

    let mut no_phone = form("a", "t");
    no_phone.contractor_phone1 = "  ".to_string();
    no_phone.contractor_phone2 = "(85) 98888-0000".to_string();
    let err = vouchers.save(&no_phone, None).await.unwrap_err();
    assert!(matches!(
        err,
        VoucherError::Validation(ValidationIssue::MissingContractorPhone)
    ));

    let mut no_name = form("a", "t");
    no_name.contractor_name.clear();
    let err = vouchers.save(&no_name, None).await.unwrap_err();
    assert_eq!(err.user_friendly_message(), "Contractor name is required.");

    assert!(vouchers.list().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_legacy_records_are_read_and_migrated() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let storage = LocalStorage::new(temp_dir.path());

    let agencies = serde_json::json!([{
        "id": "lx2k9abc",
        "name": "Legacy Agency",
        "templates": [
            {"name": "a.pdf", "data": [37, 80, 68, 70, 45], "uploadedAt": "2024-05-01T10:00:00Z"},
            {"name": "b.pdf", "data": [37, 80, 68, 70, 45], "uploadedAt": "2024-05-02T10:00:00Z"}
        ],
        "createdAt": "2024-05-01T10:00:00Z"
    }]);
    let vouchers = serde_json::json!([{
        "id": "1714557600000",
        "selectedAgency": "lx2k9abc",
        "selectedTemplate": "lx2k9abc-1",
        "destinations": [{"destination": "Canoa Quebrada", "date": "10-05-2024", "time": "07:00"}],
        "passengers": ["Carla"],
        "adults": 1,
        "totalAmount": 200,
        "preBooking": 50,
        "remainingAmount": 150,
        "contractorName": "Carla",
        "contractorPhone1": "(85) 90000-0000",
        "createdAt": "2024-05-01T10:00:00Z"
    }, {
        "id": "1714644000000",
        "selectedAgency": "lx2k9abc",
        "selectedTemplate": "lx2k9abc-0",
        "destinations": [{"destination": "Morro Branco", "date": "11-05-2024", "time": "08:00"}],
        "adults": 2,
        "totalAmount": 400,
        "preBooking": 150,
        "remainingAmount": 999,
        "contractorName": "Davi",
        "contractorPhone1": "(85) 91111-1111",
        "updatedAt": "2024-05-03T15:00:00Z"
    }]);
    storage
        .write_file("agencies", agencies.to_string().as_bytes())
        .await?;
    storage
        .write_file("vouchers", vouchers.to_string().as_bytes())
        .await?;

    let store = RecordStore::new(storage);
    let agency = AgencyBook::new(&store).find("lx2k9abc").await?;
    let voucher = VoucherBook::new(&store).get("1714557600000").await?;

    assert_eq!(voucher.template_id, agency.templates[1].id);
    assert_eq!(voucher.advance_payment, 50.0);

    let edited = VoucherBook::new(&store).get("1714644000000").await?;
    assert_eq!(edited.template_id, agency.templates[0].id);
    assert_eq!(edited.created_at, edited.updated_at.unwrap());
    assert_eq!(edited.remaining_amount, 250.0);
    assert_eq!(edited.total_passengers, 2);

    let summaries = VoucherBook::new(&store).summaries().await?;
    assert_eq!(summaries[1].created_on, "03-05-2024");
    assert_eq!(summaries[1].remaining, "R$ 250.00");

    let persisted: Vec<serde_json::Value> = store.get(Collection::Vouchers).await?;
    assert_eq!(persisted[0]["templateId"], agency.templates[1].id.as_str());
    assert_eq!(persisted[1]["createdAt"], "2024-05-03T15:00:00Z");
    Ok(())
}

#[tokio::test]
async fn test_corrupt_collection_is_reported() -> Result<()> {
    let temp_dir = TempDir::new()?;
    std::fs::write(temp_dir.path().join("vouchers"), b"{not json")?;
    let store = RecordStore::new(LocalStorage::new(temp_dir.path()));

    let err = VoucherBook::new(&store).list().await.unwrap_err();
    match &err {
        VoucherError::StorageCorruption { key, .. } => assert_eq!(key, "vouchers"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        err.severity(),
        voucher_desk::utils::error::ErrorSeverity::Critical
    );
    Ok(())
}
