//! Key and signature types.

pub mod keys;
