use crate::domain::ports::Storage;
use crate::utils::error::{Result, VoucherError};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Fixed keys of the persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Agencies,
    Vouchers,
    Autocomplete,
    AgencyProfile,
}

impl Collection {
    pub fn key(&self) -> &'static str {
        match self {
            Collection::Agencies => "agencies",
            Collection::Vouchers => "vouchers",
            Collection::Autocomplete => "autocompleteData",
            Collection::AgencyProfile => "agencyConfig",
        }
    }
}

/// JSON documents over a [`Storage`]. Every write replaces the whole
/// document; there is no partial update and no locking.
#[derive(Debug, Clone)]
pub struct RecordStore<S: Storage> {
    storage: S,
}

impl<S: Storage> RecordStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Loads a sequence; a missing key is an empty sequence.
    pub async fn get<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>> {
        Ok(self.load::<Vec<T>>(collection).await?.unwrap_or_default())
    }

    pub async fn put<T: Serialize>(&self, collection: Collection, records: &[T]) -> Result<()> {
        self.save(collection, records).await
    }

    pub async fn load<T: DeserializeOwned>(&self, collection: Collection) -> Result<Option<T>> {
        let key = collection.key();
        let Some(raw) = self.storage.read_file(key).await? else {
            return Ok(None);
        };

        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| VoucherError::StorageCorruption {
                key: key.to_string(),
                source,
            })
    }

    pub async fn save<T: Serialize + ?Sized>(&self, collection: Collection, value: &T) -> Result<()> {
        let data = serde_json::to_vec(value)?;
        tracing::debug!("Writing {} ({} bytes)", collection.key(), data.len());
        self.storage.write_file(collection.key(), &data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStorage;
    use crate::domain::model::Destination;

    #[tokio::test]
    async fn test_missing_collection_reads_empty() {
        let store = RecordStore::new(MemoryStorage::new());
        let records: Vec<Destination> = store.get(Collection::Vouchers).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_put_overwrites_whole_collection() {
        let store = RecordStore::new(MemoryStorage::new());
        let first = vec![Destination {
            destination: "Jericoacoara".to_string(),
            ..Default::default()
        }];
        let second = vec![Destination {
            destination: "Canoa Quebrada".to_string(),
            ..Default::default()
        }];

        store.put(Collection::Vouchers, &first).await.unwrap();
        store.put(Collection::Vouchers, &second).await.unwrap();

        let loaded: Vec<Destination> = store.get(Collection::Vouchers).await.unwrap();
        assert_eq!(loaded, second);
    }

    #[tokio::test]
    async fn test_corrupt_data_is_reported() {
        let storage = MemoryStorage::new();
        storage.write_file("agencies", b"[{\"id\":").await.unwrap();
        let store = RecordStore::new(storage);

        let err = store
            .get::<Destination>(Collection::Agencies)
            .await
            .unwrap_err();
        match err {
            VoucherError::StorageCorruption { key, .. } => assert_eq!(key, "agencies"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
