pub mod archive;
pub mod cleanup;
pub mod commands;
pub mod download;
pub mod error;
pub mod http;
pub mod ledger;
pub mod orchestrator;
pub mod platform;
pub mod profile;
pub mod profiles;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod syspath;
