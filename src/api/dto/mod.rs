//! Data Transfer Objects for REST request/response serialization.

pub mod common_dto;
pub mod worker_dto;

pub use common_dto::*;
pub use worker_dto::*;
