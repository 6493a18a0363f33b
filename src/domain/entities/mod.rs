pub mod image;
pub mod token;
pub mod user;
