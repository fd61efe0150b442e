use crate::cli::run;

pub mod cli;
mod config;
pub mod domain;
pub mod extract;
pub mod http;
pub mod metadata;
pub mod playlist;
pub mod storage;

fn main() {
    if let Err(e) = run() {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}
