// Life of a test run:
// 1. Bind entity field hooks (defaults, validators) into an EntityRuntime
// 2. Parse the connection descriptor and pick a backend
//     - embedded: open SQLite, create schema
//     - server: connect, run the migration tool
//     - container: start a disposable server first, then as above
// 3. Hand the shared store to every operation of the batch
//     - entity builders
//     - the JSON API, in process or over a socket
// 4. Tear down: close the store, then terminate the container
//
// System components:
//  - Identifier generator
//  - Entity runtime registry
//  - Backend selector / store provisioner
//  - Lifecycle controller
//  - Request executors
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod api;
pub mod config;
pub mod entity;
pub mod lifecycle;
pub mod provision;
pub mod store;
pub mod testing;
pub mod types;
