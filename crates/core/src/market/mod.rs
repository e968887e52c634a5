pub mod provider;
pub mod symbols;
pub mod types;
