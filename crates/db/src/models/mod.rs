//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` struct matching the database row,
//! the `Serialize` domain struct built from it, and the create DTO.

pub mod job;
