pub mod config;
pub mod corpus;
pub mod module;
pub mod page;
pub mod result;
