// src/utils/mod.rs
// Test helpers and gradient checking, shared by unit and integration tests.

pub mod grad_check;
pub mod testing;
