//! Top-level facade crate for meterline.
//!
//! Re-exports the core primitives and the reporter so users can depend on a single crate.

pub mod core {
    pub use meterline_core::*;
}

pub mod reporter {
    pub use meterline_reporter::*;
}
