//! `srcfetch`: the fetch-strategy and content-addressed mirror cache core.
//!
//! Given a package's declared version attributes, `fetch::select::for_package_version`
//! picks a backend, binds it to a `Stage`, and drives it through
//! fetch/check/expand/archive. The FS mirror cache (`cache`) and mirror
//! collection (`mirror`) sit alongside as the two other pieces of state a
//! caller typically wires through `Config`; `driver::fetch_version` is the
//! one entry point that ties all three together into the per-version
//! pipeline (local cache, then each mirror, then the package's own source).

#[macro_use]
extern crate failure;

pub mod cache;
pub mod cli;
pub mod config;
pub mod driver;
pub mod fetch;
pub mod mirror;
pub mod package;
pub mod package_trait;
pub mod spider;
pub mod stage;
pub mod util;
