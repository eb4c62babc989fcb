//! Benchmark-only crate; see `benches/nodes.rs`.
