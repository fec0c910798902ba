
pub mod logging;
pub mod error;
pub mod config;
pub mod star;
pub mod mrc;
pub mod json;
pub mod schema;
pub mod convert;
pub mod output;
