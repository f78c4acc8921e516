pub mod catalog;
pub mod repository;
pub mod scoring;
pub mod service;
pub mod types;
