//! Hosts the cross-crate tests under `tests/`; no library code.
