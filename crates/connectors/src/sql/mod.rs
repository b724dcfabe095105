pub mod base;
pub mod mysql;

#[cfg(any(test, feature = "memory"))]
pub mod memory;
