pub mod config;
pub mod evaluate;
pub mod evolution;
pub mod keys;
pub mod runner;
pub mod storage;
pub mod util;
