


pub mod engine;
pub mod ramdb;
pub mod redis;
pub mod tx;
