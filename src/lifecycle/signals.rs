//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGINT (Ctrl+C) and SIGTERM
//! - Translate them into an [`Interrupt`] the orchestrator treats as fatal
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - An interrupt always runs the shutdown hooks before the process exits

use std::fmt;

/// The OS signal that interrupted serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// SIGINT / Ctrl+C.
    CtrlC,
    /// SIGTERM.
    Terminate,
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupt::CtrlC => write!(f, "SIGINT"),
            Interrupt::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Wait until the process is asked to stop by the OS.
///
/// Fails only if the signal handlers cannot be installed.
pub async fn wait_for_interrupt() -> std::io::Result<Interrupt> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                Ok(Interrupt::CtrlC)
            }
            _ = terminate.recv() => Ok(Interrupt::Terminate),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok(Interrupt::CtrlC)
    }
}
