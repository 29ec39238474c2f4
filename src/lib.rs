//! Posting Expert client orchestration core
//!
//! This library provides the remote-operation orchestration layer of the
//! Posting Expert marketing studio: submitting content-generation jobs to
//! the backend queue and polling them to completion, and linking social
//! accounts through a cross-window OAuth popup handshake. UI surfaces embed
//! the orchestrators and observe their state through watch subscriptions.

pub mod app_state;
pub mod config;
pub mod models;
pub mod orchestrator;
pub mod services;
