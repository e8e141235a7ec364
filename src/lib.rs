pub mod config;
pub mod credentials;
pub mod errors;
pub mod gateway;
pub mod github;
pub mod logging;
pub mod packaging;
pub mod prompt;
pub mod web;
