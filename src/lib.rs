// Library surface for the binary, headless sessions and integration tests.
pub mod app_dirs;
pub mod callout;
pub mod catalog;
pub mod clock;
pub mod coach;
pub mod config;
pub mod custom;
pub mod entitlement;
pub mod ledger;
pub mod logging;
pub mod plan;
pub mod profile;
pub mod runner;
pub mod runtime;
pub mod session;
pub mod store;
pub mod util;
