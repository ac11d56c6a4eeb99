//! Shared helpers: external processes and HTML escaping.

pub mod exec;
pub mod html;
