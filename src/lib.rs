/// Account records and their state transitions.
/// State is modified using events, which are created by handling validated commands
pub mod account;

/// Commands validated at the boundary: transfers, registrations, PIX key types and values.
pub mod command;

/// Application settings loaded from YAML, with defaults for every field.
pub mod config;

/// Salted Argon2 hashes for account passwords.
pub mod credential;

/// Tracing subscriber setup for the binary.
pub mod logging;

/// Ledger, key directory and registry operations over a [`store::DocumentStore`].
/// Coordinates command validation, locking and the atomic store commits.
pub mod processor;

/// Signed-in account holder, kept in sync with the bank.
pub mod session;

/// Document store contract, plus the in-memory implementation.
pub mod store;

/// Replays a CSV script of operations against an in-memory bank.
/// Lives in the library so the integration tests can drive it.
pub mod bin_utils;
