use thiserror::Error;

pub mod app_config;
pub mod catalog;
pub mod config;
pub mod settings;

pub use app_config::{AppConfig, Environment};
pub use catalog::{
    combination_signature, derived_variant_code, CatalogField, FieldKind, FieldSpec, FieldValue,
    RowValues, TemplateDefaults, VariantSlot, SLOT_COUNT,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use settings::{ImportSettings, StalePolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
