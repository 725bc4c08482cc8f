#![allow(dead_code)]

pub mod channel;
pub mod fetcher;

pub use channel::*;
pub use fetcher::*;
