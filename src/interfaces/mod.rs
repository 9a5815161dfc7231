/// Interfaces Layer - External Entry Points
///
/// ## Modules
/// - `cli`: Command-line interface (main.rs logic)
/// - `http`: Webhook receiver and health check

pub mod cli;
pub mod http;
