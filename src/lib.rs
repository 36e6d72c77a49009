// esutils - search filter translation and index synchronization
//
// Maps domain objects to search documents, keeps the index in step with the
// datastore through queued jobs, and composes field/term filters into
// engine queries.

// Re-export the search core
pub use esutils_search::*;

// Re-export logging
pub use esutils_log;

// Re-export optional crates
#[cfg(feature = "config")]
pub use esutils_config;
