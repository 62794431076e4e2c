//! PQRS Intake Client
//!
//! Client-side workflow for citizen complaints (peticiones, quejas,
//! reclamos y sugerencias) against the Ventanilla Única backend.
//!
//! ## Features
//!
//! - **Complaint form**: load, edit, validate, attach files and save
//! - **Login redirect**: send staff and administrators to their home view
//! - **Consult & report**: look up a complaint by code, tally by status

pub mod alerts;
pub mod client;
pub mod config;
pub mod form;
pub mod models;
pub mod navigation;
pub mod report;
pub mod uploader;
pub mod validation;

#[cfg(test)]
mod testing;
