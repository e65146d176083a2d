pub mod ai;
pub mod config;
pub mod db;
pub mod digest;
pub mod handlers;
pub mod i18n;
pub mod model;
pub mod questions;
pub mod scheduler;
pub mod shutdown;
pub mod time_util;
pub mod transport;
pub mod weather;
