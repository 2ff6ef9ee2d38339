pub mod abi;
pub mod chain;
pub mod config;
pub mod dump;
pub mod error;
pub mod models;
pub mod query;
pub mod repository;
pub mod resolver;
pub mod rpc;
pub mod scanner;
pub mod server;
pub mod sink;

#[cfg(test)]
mod test_support;
