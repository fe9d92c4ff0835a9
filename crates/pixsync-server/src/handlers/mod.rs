pub mod broadcast;
pub mod collections;
pub mod health;
pub mod upload;
pub mod ws;
