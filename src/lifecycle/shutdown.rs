//! Process-level fatal exit.

use std::io::Write;

use crate::lifecycle::hooks::ShutdownHooks;

/// Exit status used for every fatal shutdown.
pub const FATAL_EXIT_CODE: i32 = 1;

/// Log `err`, run the shutdown hooks and terminate the process.
///
/// The hooks are run even when a previous pass already happened; that call
/// is then a no-op.
pub fn fatal_exit(hooks: &ShutdownHooks, err: &dyn std::error::Error) -> ! {
    tracing::error!(error = %err, "Fatal error, shutting down");
    hooks.run_all();
    let _ = std::io::stderr().flush();
    std::process::exit(FATAL_EXIT_CODE)
}
