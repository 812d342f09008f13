/// Persistent local key-value store and its failure-isolating adapter.
pub mod local_store;
/// Play record and envelope definitions.
pub mod models;
/// Remote document stores holding the authoritative plays.
pub mod play_store;
/// Error types shared by remote stores.
pub mod storage;
