/// Key column names of the reconciled table
pub const COL_LOCATION: &str = "location";
pub const COL_DATE: &str = "date";
pub const COL_LATITUDE: &str = "latitude";
pub const COL_LONGITUDE: &str = "longitude";
pub const COL_ISLAND: &str = "island";
pub const COL_LOCATION_NAME: &str = "location_name";
pub const COL_YEAR: &str = "year";
pub const COL_MONTH: &str = "month";

/// Raw document field names
pub const ARRAY_DATE_FIELD: &str = "date";
pub const NESTED_DATE_FIELD: &str = "datetime";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Location identifiers are `<island>/<location_name>`
pub const LOCATION_SEPARATOR: char = '/';

/// Input layout produced by the fetcher
pub const ARRAY_SOURCE_DIR: &str = "array";
pub const NESTED_SOURCE_DIR: &str = "nested";
pub const DOCUMENT_EXTENSION: &str = "json";

/// Table layout
pub const PARTITION_FILE: &str = "data.parquet";
pub const SCHEMA_FILE: &str = "_schema.parquet";

/// Suffix appended to nested-source attributes that collide with array-source ones
pub const DEFAULT_COLLISION_SUFFIX: &str = "_nested";

/// Processing defaults
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;

/// Physical plausibility bounds used by the integrity checker
pub const MIN_VALID_TEMP: f64 = -60.0;
pub const MAX_VALID_TEMP: f64 = 60.0;
pub const MAX_VALID_UV_INDEX: f64 = 20.0;
pub const TEMP_TOLERANCE: f64 = 0.1;

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";
