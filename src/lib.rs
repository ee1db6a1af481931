pub mod aqi;
pub mod breakpoints;
pub mod config;
pub mod data_models;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod normalizer;
pub mod parallel;
pub mod parsers;
pub mod pipeline;
pub mod utils;
pub mod writers;
