// Library root
// -----------
// The binary (`main.rs`) loads settings, builds a `GraphClient` and hands
// both to `app::run`.
//
// Module responsibilities:
// - `config`: layered `appsettings*.json` loading and required keys.
// - `files`: resolving the local file argument.
// - `naming`: the timestamped remote file name.
// - `auth`: client-credential token acquisition.
// - `graph`: Graph HTTP calls behind the `DocumentGraph` trait.
// - `app`: the linear upload flow and its console output.
// - `error`: error types shared by the above.
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod files;
pub mod graph;
pub mod naming;
