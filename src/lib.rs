pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod offline;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CacheCliConfig, CliConfig};

pub use adapters::{HttpFetcher, LocalStorage, MemoryStorage};
pub use config::AppConfig;
pub use core::{
    agencies::AgencyBook, agents::AgentRoster, export::VoucherExporter, form::VoucherForm,
    pdf_form::PdfForm, store::RecordStore, vouchers::VoucherBook,
};
pub use offline::{AssetRequest, OfflineWorker, WorkerSettings};
pub use utils::error::{Result, VoucherError};
