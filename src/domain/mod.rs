pub mod entities;
pub mod metadata;
pub mod use_cases;
