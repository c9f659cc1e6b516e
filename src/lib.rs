#![doc = include_str!("../README.md")]
//!
//! ## Crate layout
//!
//! The arithmetic lives at the bottom: [`field`] implements
//! \\(\mathbb F\_{2\^{255}-19}\\) and [`edwards`] the curve group on top
//! of it.  [`search`] is the batch candidate generator, [`prefix`]
//! compiles textual prefixes into bit predicates, [`worker`] races
//! search workers across threads, and [`tor`] holds the Tor-facing
//! encodings (onion addresses, key file envelopes, client authorization
//! keys, offset arithmetic).
#![warn(
    missing_docs,
    rust_2018_idioms,
    unused_lifetimes,
    unused_qualifications
)]

pub mod edwards;
pub mod field;
pub mod prefix;
pub mod search;
pub mod tor;
pub mod worker;

pub(crate) mod constants;

mod errors;

pub use crate::errors::Error;
pub use crate::prefix::{Charset, Matcher};
pub use crate::search::KeyKind;
pub use crate::worker::{search_parallel, Discovery, SearchOptions, DEFAULT_BATCH_SIZE};
