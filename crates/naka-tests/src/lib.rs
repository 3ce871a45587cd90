//! Integration test suite for naka.
//!
//! Exercises the engine, collectors, registry, scheduler, storage, and HTTP
//! surface together. Helpers shared by the test files live in [`helpers`].

pub mod helpers;
