pub mod download;
pub mod health;
pub mod scanner;
pub mod upload;
