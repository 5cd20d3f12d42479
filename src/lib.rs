//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-service` and the bridge it pulls in). Host
//! applications can depend on `mcp-console-workspace` and enable
//! `desktop-shims` or `wasm` without wiring each crate individually.
