pub mod cli;
pub mod config;
pub mod db;
pub mod decode;
pub mod error;
pub mod extract;
pub mod graph;
pub mod hackernews;
pub mod inputs;
pub mod merge;
pub mod model;
pub mod pipeline;
