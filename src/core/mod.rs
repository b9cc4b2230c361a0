pub mod agencies;
pub mod agents;
pub mod autocomplete;
pub mod export;
pub mod form;
pub mod pdf_form;
pub mod store;
pub mod template_mapper;
pub mod template_scaffold;
pub mod vouchers;

pub use crate::domain::model::{Agency, Template, Voucher};
pub use crate::domain::ports::{FillableForm, Storage};
pub use crate::utils::error::Result;
