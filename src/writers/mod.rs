pub mod parquet_writer;
pub mod table_store;
pub mod upsert_writer;

pub use parquet_writer::{ParquetFileInfo, ParquetWriter};
pub use table_store::{ParquetTableStore, TableStore, WriteMode};
pub use upsert_writer::{PartitionUpsert, UpsertWriter};
