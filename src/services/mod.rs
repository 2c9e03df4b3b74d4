//! Application services that sit beside the database layer.

pub mod image_service;
