//! Integration tests

mod config_file;
mod pipeline;
