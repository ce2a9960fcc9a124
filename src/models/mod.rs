pub mod raw;
pub mod record;
pub mod schema;
pub mod value;

pub use raw::{RawArrayDocument, RawNestedDocument};
pub use record::{DailyRecord, JoinKey, MergedRecord, PartitionKey, RowKey, TableRow};
pub use schema::{ColumnSpec, KeyColumn, SourceSchema, TableColumn, TableSchema};
pub use value::{parse_date, ColumnType, Value};
