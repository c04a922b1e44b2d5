//! Core business logic - framework-agnostic reporting, export, editing and storage.

/// Re-entrancy guard for network actions
pub mod busy;
/// Category storage
pub mod category;
/// Service editor state machine and submission
pub mod editor;
/// Fixed-date and duration expiry policies
pub mod expiry;
/// Report download and save
pub mod export;
/// Identity generation
pub mod ids;
/// Chart datasets derived from service records
pub mod report;
/// Service storage
pub mod service;
/// Expiry status, dashboard statistics and due reminders
pub mod status;
