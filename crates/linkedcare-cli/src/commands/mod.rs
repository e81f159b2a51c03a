pub mod chain;
pub mod order;
pub mod patient;
pub mod server;
