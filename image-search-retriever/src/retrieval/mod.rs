pub mod indexer;
pub mod inline_image;
pub mod lookup;
pub mod progress;
pub mod query;

/// Metadata key holding the absolute path of a record's source file.
pub const ORIGINAL_PATH_KEY: &str = "original_path";
/// Metadata key holding the source file's name at indexing time.
pub const ORIGINAL_FILENAME_KEY: &str = "original_filename";
