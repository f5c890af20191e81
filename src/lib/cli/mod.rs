//! A `fetch` smoke-test subcommand, replacing the teacher's `new`
//! scaffolding command: not the excluded CLI front-end itself, just enough
//! surface for `src/bin/main.rs` to drive one real fetch end-to-end and
//! prove the library works.

pub mod fetch;
