#![forbid(unsafe_code)]

pub mod atlas_cli;
