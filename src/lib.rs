// Library root
// -----------
// This crate exposes the library surface for the standup CLI. The binary
// (`main.rs`) uses these modules to implement the interactive menu.
//
// Module responsibilities:
// - `signing`: Canonical string, HMAC-SHA1 Authorization header, Date
//   header and digest date window.
// - `api`: Blocking HTTP calls to the service (teams, digests, updates).
// - `error`: How remote failures are classified and shown.
// - `settings`: Identity, token and cached teams on disk.
// - `commands`: One function per command, including per-team fan-out.
// - `ui`: Terminal prompts and printing; delegates to `commands`.
// - `logging`: tracing subscriber setup.
pub mod api;
pub mod commands;
pub mod error;
pub mod logging;
pub mod settings;
pub mod signing;
pub mod ui;
