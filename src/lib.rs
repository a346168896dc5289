pub mod annotator;
pub mod api;
pub mod config;
pub mod dom;
pub mod errors;
pub mod models;
pub mod rates;
pub mod storage;
