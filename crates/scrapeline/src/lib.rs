//! Top-level facade crate for scrapeline.
//!
//! Re-exports the core registry and the exporter library so users can depend on a single crate.

pub mod core {
    pub use scrapeline_core::*;
}

pub mod exporter {
    pub use scrapeline_exporter::*;
}
