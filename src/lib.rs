pub mod city_selector;
pub mod cli;
pub mod config;
pub mod error;
pub mod http_client;
pub mod image_file;
pub mod report;
pub mod session;
