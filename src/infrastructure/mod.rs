pub mod auth;
pub mod db;
pub mod inference;
pub mod progress;
pub mod storage;
