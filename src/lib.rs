pub mod aggregation;
pub mod application_state;
pub mod capture;
pub mod cli;
pub mod config;
pub mod consts;
pub mod features;
pub mod flows;
pub mod handler;
pub mod pipeline;
pub mod scoring;
pub mod settings;
pub mod storage;
