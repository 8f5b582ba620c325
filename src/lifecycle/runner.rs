//! Async host loop for a driver.

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::driver::RelationEndpoint;
use crate::relation::Hook;

/// Feeds hooks from a channel to one driver, in arrival order.
pub struct HookRunner<D> {
    driver: D,
    hooks: mpsc::UnboundedReceiver<Hook>,
    handled: usize,
}

impl<D: RelationEndpoint> HookRunner<D> {
    pub fn new(driver: D, hooks: mpsc::UnboundedReceiver<Hook>) -> Self {
        Self {
            driver,
            hooks,
            handled: 0,
        }
    }

    /// Run until shutdown or until every hook sender is gone, then hand the
    /// driver back.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> D {
        info!(role = D::ROLE, "hook runner started");
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    debug!(role = D::ROLE, "shutdown received");
                    break;
                }
                hook = self.hooks.recv() => match hook {
                    Some(hook) => self.apply(&hook),
                    None => {
                        debug!(role = D::ROLE, "hook channel closed");
                        break;
                    }
                },
            }
        }
        info!(role = D::ROLE, handled = self.handled, "hook runner stopped");
        self.driver
    }

    fn apply(&mut self, hook: &Hook) {
        debug!(role = D::ROLE, hook = %hook, "handling hook");
        if let Err(err) = self.driver.handle(hook) {
            warn!(role = D::ROLE, hook = %hook, error = %err, "hook handler failed");
        }
        self.handled += 1;
    }
}
