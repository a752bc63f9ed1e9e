//! Ingestion: raw tables → normalized `Reading`s
//!
//! - `table`: CSV / JSON adapters producing a `RawTable`
//! - `schema`: column role detection
//! - `dates`: date normalization
//! - `records`: row conversion with per-row diagnostics

pub mod dates;
pub mod records;
pub mod schema;
pub mod table;

pub use dates::{normalize_date, DateOrder, DateParseError};
pub use records::{build_readings, Diagnostics, RowDiagnostic, RowError};
pub use schema::{detect_schema, ColumnRef, Role, SchemaError, SchemaMapping};
pub use table::{read_path, TableError};
