//! Background job runner.
//!
//! Jobs live in the `jobs` table and are executed by name: the API enqueues
//! a row with a task identifier and JSON payload, and a [`runner::JobRunner`]
//! polls the table, claims due jobs with `FOR UPDATE SKIP LOCKED`, and
//! invokes the matching handler from the [`registry::TaskRegistry`].
//! Handlers must be idempotent on retry: a job whose runner died
//! mid-execution will be attempted again.

pub mod registry;
pub mod runner;
pub mod tasks;
