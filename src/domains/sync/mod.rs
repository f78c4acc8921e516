pub mod remote_store;
pub mod service;
pub mod status_journal;
pub mod types;
