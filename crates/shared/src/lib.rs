pub mod domain;
pub mod error;
pub mod user_data;
