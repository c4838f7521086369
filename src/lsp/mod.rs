// LSP protocol layer
// - server.rs: stdio server entry point
// - backend.rs: LanguageServer trait implementation
// - router.rs: per-request document / engine / stylesheet resolution
// - dispatch.rs: cancellation and failure isolation around engine calls
// - diagnostics.rs: debounced validation and diagnostics publishing
// - documents.rs: open document store
// - client_state.rs: client capabilities and workspace folders
pub mod backend;
pub mod client_state;
pub mod diagnostics;
pub mod dispatch;
pub mod documents;
pub mod router;
pub mod server;
