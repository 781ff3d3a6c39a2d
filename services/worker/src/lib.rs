//! Polling workers for the dataset-parsing and report-generation queues.

pub mod ai_client;
pub mod claimer;
pub mod config;
pub mod dataset_worker;
pub mod health;
pub mod memory;
pub mod model;
pub mod pg_store;
pub mod provider;
pub mod provider_chat;
pub mod provider_openai;
pub mod registry;
pub mod report_worker;
pub mod retry;
pub mod sample;
pub mod storage;
pub mod store;
pub mod worker_loop;
