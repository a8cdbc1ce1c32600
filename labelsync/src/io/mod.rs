//! I/O adapters: every collaborator the reconciliation talks to.

pub mod checkpoint;
pub mod config;
pub mod confirm;
pub mod journal;
pub mod mediawiki;
pub mod wiki;
pub mod wikibase;
