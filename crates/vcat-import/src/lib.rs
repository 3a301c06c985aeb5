//! Bulk catalog import engine.
//!
//! Documents are imported in fixed-size windows. Each window is classified
//! into creates and updates, written set-based, expanded into variants and
//! re-priced, all inside one transaction of a [`vcat_db::CatalogStore`].

pub mod classify;
pub mod context;
pub mod error;
pub mod images;
pub mod inbox;
pub mod jobs;
pub mod mapper;
pub mod orchestrator;
pub mod pricelist;
pub mod reader;
pub mod reconcile;
pub mod variants;
pub mod writer;

pub use classify::{classify_rows, ClassifiedWindow, RowSlot};
pub use context::ImportContext;
pub use error::ImportError;
pub use images::{refresh_images, ImageReport};
pub use inbox::Inbox;
pub use jobs::{run_image_job, run_import_job, run_reconcile_job};
pub use mapper::{clean_value, FieldMapping, RawRow};
pub use orchestrator::{DocumentOutcome, DocumentReport, ImportBudget, Importer, RunReport};
pub use pricelist::{rebuild_price_lists, PriceListReport};
pub use reader::{checksum, CsvDocument, DocumentFormat, ImportDocument, RowSource, XlsxDocument};
pub use reconcile::{reconcile, ReconcileReport};
pub use variants::{resolve_descriptors, synthesize_variants, SynthesisReport, VariantDescriptor};
pub use writer::{optimized_create, optimized_update, UpdateOutcome};
