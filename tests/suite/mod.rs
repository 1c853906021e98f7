//! Integration test modules.

mod concurrency;
mod idempotence;
mod providers;
mod scenarios;
mod tiering;
