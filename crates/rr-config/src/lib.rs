//! Ambient configuration: the TOML `Config` loader, XDG path resolution,
//! and the read-only environment contract, grounded on `csa-config`'s
//! `csa-config` crate's `paths`/`config` modules.

mod config;
pub mod env;
pub mod paths;

pub use config::load_config;
