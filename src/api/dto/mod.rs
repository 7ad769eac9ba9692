//! Data Transfer Objects for REST request/response serialization.

pub mod push_dto;

pub use push_dto::*;
