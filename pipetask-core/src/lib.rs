//! Pipetask Core
//!
//! Core types shared by the pipetask crates.
//!
//! This crate contains:
//! - Domain types: log entries and task results produced while a task runs
//! - DTOs: payloads sent to the deployment API

pub mod domain;
pub mod dto;
