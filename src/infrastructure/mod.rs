//! Adapters for the domain ports: storage backends, provider clients,
//! signatures and watermarking.

pub mod http;
pub mod in_memory;
pub mod loopback;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod signature;
pub mod watermark;
