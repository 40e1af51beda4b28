//! Products domain module.
//!
//! This crate contains the business rules of the weight-review workflow (product
//! lifecycle, legacy quotes, history snapshots, import row extraction), implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod history;
pub mod import;
pub mod product;
pub mod quote;
pub mod status;

pub use history::{
    Archivable, ArchiveSubject, ArchivedEntity, HistoryRecord, HistorySource, NewHistoryRecord,
};
pub use import::{ImportRowError, extract_row};
pub use product::{CreateProduct, NewProduct, Product, ProductDetailsPatch};
pub use quote::{CreateQuote, NewQuote, Quote};
pub use status::{ProductStatus, QuoteStatus, ReviewDecision};
