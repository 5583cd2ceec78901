pub mod config;
pub mod logging;

// Engine modules
pub mod backoff;
pub mod bucket;
pub mod classify;
pub mod fault;
pub mod run;
pub mod strategy;
