//! Data Transfer Objects for the deployment API
//!
//! Payloads sent by tasks to the build service. Field names follow the
//! service's camelCase JSON contract.

pub mod image_details;
