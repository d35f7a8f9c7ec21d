//! Last-known prices keyed by trading pair.

mod cache;

pub use cache::PriceCache;
