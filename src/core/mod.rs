//! Core functionality: the peripheral session machinery and the adapter
//! gateway it drives.

pub mod bluetooth;
pub mod session;

// Re-export commonly used types
pub use bluetooth::{AdapterGateway, BluestGateway};
pub use session::{AdapterEvent, PeripheralSession};
