use thiserror::Error;
use vcat_db::DbError;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("cannot read {document}: {source}")]
    Csv {
        document: String,
        #[source]
        source: csv::Error,
    },

    #[error("cannot read workbook {document}: {source}")]
    Xlsx {
        document: String,
        #[source]
        source: calamine::XlsxError,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("document {document} has no catalog code column")]
    MissingCodeColumn { document: String },

    #[error("row {row} carries {actual} fields but the batch shape has {expected}")]
    NonUniformShape {
        row: usize,
        expected: usize,
        actual: usize,
    },
}
