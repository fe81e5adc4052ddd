//! Identity and access layer: signed bearer assertions, role escalation,
//! per-address admission control and single-use confirmation challenges.

pub mod access;
pub mod api;
pub mod challenge;
pub mod cli;
pub mod error;
pub mod limiter;
pub mod mail;
pub mod pipeline;
pub mod store;
pub mod token;

pub use error::Error;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
