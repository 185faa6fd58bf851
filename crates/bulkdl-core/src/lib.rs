pub mod config;
pub mod control;
pub mod fetch;
pub mod logging;
pub mod outcome;
pub mod retry;
pub mod scheduler;
pub mod select;
pub mod storage;
pub mod transport;
pub mod url_model;
