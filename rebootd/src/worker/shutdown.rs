//! OS shutdown and reboot.

use async_trait::async_trait;
use tokio::process::Command;

use crate::action::RebootAction;
use rebootd_shared::errors::{RebootError, RebootResult};

/// Carries out a reboot action on the host.
#[async_trait]
pub trait ShutdownExecutor: Send + Sync {
    /// `DoNothing` must return immediately without side effects.
    async fn execute(&self, action: RebootAction) -> RebootResult<()>;
}

/// Runs `shutdown(8)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdown;

impl SystemShutdown {
    fn args(action: RebootAction) -> Option<[&'static str; 2]> {
        match action {
            RebootAction::DoNothing => None,
            RebootAction::Reboot => Some(["-r", "now"]),
            RebootAction::Shutdown => Some(["-h", "now"]),
        }
    }
}

#[async_trait]
impl ShutdownExecutor for SystemShutdown {
    async fn execute(&self, action: RebootAction) -> RebootResult<()> {
        let Some(args) = Self::args(action) else {
            return Ok(());
        };

        tracing::info!(action = %action, "Running shutdown {}", args.join(" "));
        let output = Command::new("shutdown")
            .args(args)
            .output()
            .await
            .map_err(|e| RebootError::OsActionFailed(format!("Failed to run shutdown: {}", e)))?;

        if !output.status.success() {
            return Err(RebootError::OsActionFailed(format!(
                "shutdown exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Logs the action instead of performing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunShutdown;

#[async_trait]
impl ShutdownExecutor for DryRunShutdown {
    async fn execute(&self, action: RebootAction) -> RebootResult<()> {
        if action.is_actionable() {
            tracing::warn!(action = %action, "Dry run, not touching the host");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_arguments() {
        assert_eq!(SystemShutdown::args(RebootAction::Reboot), Some(["-r", "now"]));
        assert_eq!(SystemShutdown::args(RebootAction::Shutdown), Some(["-h", "now"]));
        assert_eq!(SystemShutdown::args(RebootAction::DoNothing), None);
    }

    #[tokio::test]
    async fn test_do_nothing_is_noop() {
        SystemShutdown.execute(RebootAction::DoNothing).await.unwrap();
        DryRunShutdown.execute(RebootAction::Reboot).await.unwrap();
    }
}
