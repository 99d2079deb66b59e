//! Core modules: the dispatch registry and the host layer around it.
//!
//! Registry engine: `selector`, `registry`, `slot`, `storage`, `abi`,
//! `facet`, `access`, `cut`, `init`, `diamond`.
//! Host layer: `config`, `deploy`, `store`, `db`, `schemas`, `broker`, `time`.

pub mod abi;
pub mod access;
pub mod broker;
pub mod config;
pub mod cut;
pub mod db;
pub mod deploy;
pub mod diamond;
pub mod error;
pub mod facet;
pub mod init;
pub mod registry;
pub mod schemas;
pub mod selector;
pub mod slot;
pub mod storage;
pub mod store;
pub mod time;
