//! Host-side pieces of the slicer: the UI facade, the loopback content server
//! and the directory watcher.
pub mod app;
pub mod server;
pub mod watch;
