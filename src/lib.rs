pub mod algorithms;
pub mod app;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod finder;
pub mod logging;
pub mod manager;
pub mod output;
pub mod run;
pub mod run_spec;
pub mod services;
pub mod store;
pub mod value;
