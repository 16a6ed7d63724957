// Library root
// -----------
// This crate exposes the upload logic as a library; the binary
// (`main.rs`) wires it to the command line.
//
// Module responsibilities:
// - `api`: HTTP transport to the fir.im API (token handling, JSON
//   decoding, multipart upload, transport error classification).
// - `workflow`: the upload sequence itself and its data model.
// - `errors`: terminal failure kinds and their exit codes.
// - `config`, `cli`, `logging`: ambient setup for the binary.
// - `ui`: input resolution, prompts, spinner and console output.
//
// The workflow only sees the `api::HttpApi` trait, so it can be driven
// by a fake in tests.
pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod ui;
pub mod workflow;
