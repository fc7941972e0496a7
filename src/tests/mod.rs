#[cfg(test)]
pub mod common;

mod config_files;
