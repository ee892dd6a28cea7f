//! Channel manager for messaging platforms

use super::base::Channel;
use crate::error::{ChannelError, Result, SmibError};
use std::sync::Arc;
use tokio::spawn;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Manages the registered messaging channels
#[derive(Clone, Default)]
pub struct ChannelManager {
    channels: Arc<RwLock<Vec<Arc<dyn Channel>>>>,
    running: Arc<RwLock<bool>>,
}

impl ChannelManager {
    /// Create a new channel manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel
    pub async fn register_channel(&self, channel: Arc<dyn Channel>) {
        self.channels.write().await.push(channel);
    }

    /// Get list of enabled channel names
    pub async fn enabled_channels(&self) -> Vec<String> {
        self.channels
            .read()
            .await
            .iter()
            .filter(|c| c.is_enabled())
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Start all enabled channels (runs until channels are stopped).
    ///
    /// A channel that fails to authenticate is not restarted, and its error
    /// is returned once every channel task has finished.
    pub async fn start_all(&self) -> Result<()> {
        *self.running.write().await = true;

        let channels = self.channels.read().await.clone();
        let mut handles = Vec::new();

        for channel in channels.into_iter().filter(|c| c.is_enabled()) {
            let running = self.running.clone();
            let name = channel.name().to_string();

            let handle = spawn(async move {
                info!("Starting channel: {}", name);

                let mut result = Ok(());
                while *running.read().await {
                    match channel.start().await {
                        Ok(()) => break,
                        Err(e @ SmibError::Channel(ChannelError::AuthenticationFailed(_))) => {
                            error!("Channel {} authentication failed, not retrying", name);
                            result = Err(e);
                            break;
                        }
                        Err(e) => {
                            error!("Channel {} error: {}", name, e);
                            tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                        }
                    }
                }

                info!("Channel {} stopped", name);
                result
            });

            handles.push(handle);
        }

        // Wait for all channel tasks to complete
        let mut failure = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if failure.is_none() {
                        failure = Some(e);
                    } else {
                        error!("Channel failed: {}", e);
                    }
                }
                Err(e) => error!("Channel task error: {}", e),
            }
        }

        failure.map_or(Ok(()), Err)
    }

    /// Stop all channels
    pub async fn stop_all(&self) -> Result<()> {
        *self.running.write().await = false;

        let channels = self.channels.read().await;
        for channel in channels.iter() {
            if let Err(e) = channel.stop().await {
                error!("Error stopping channel {}: {}", channel.name(), e);
            }
        }

        Ok(())
    }

    /// Check if any channels are enabled
    pub async fn has_enabled_channels(&self) -> bool {
        self.channels.read().await.iter().any(|c| c.is_enabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingChannel {
        name: &'static str,
        enabled: bool,
        reject_auth: bool,
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    impl CountingChannel {
        fn new(name: &'static str, enabled: bool) -> Self {
            Self {
                name,
                enabled,
                reject_auth: false,
                starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
            }
        }

        fn rejecting_auth(name: &'static str) -> Self {
            Self {
                reject_auth: true,
                ..Self::new(name, true)
            }
        }
    }

    #[async_trait]
    impl Channel for CountingChannel {
        fn name(&self) -> &str {
            self.name
        }

        async fn start(&self) -> Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.reject_auth {
                return Err(ChannelError::AuthenticationFailed(self.name.to_string()).into());
            }
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }
    }

    #[tokio::test]
    async fn test_enabled_channels_follow_registration() {
        let manager = ChannelManager::new();
        assert!(!manager.has_enabled_channels().await);
        assert!(manager.enabled_channels().await.is_empty());

        manager
            .register_channel(Arc::new(CountingChannel::new("quiet", false)))
            .await;
        assert!(!manager.has_enabled_channels().await);
        assert!(manager.enabled_channels().await.is_empty());

        manager
            .register_channel(Arc::new(CountingChannel::new("slack", true)))
            .await;
        assert!(manager.has_enabled_channels().await);
        assert_eq!(manager.enabled_channels().await, vec!["slack".to_string()]);
    }

    #[tokio::test]
    async fn test_start_and_stop_registered_channels() {
        let manager = ChannelManager::new();
        let enabled = Arc::new(CountingChannel::new("on", true));
        let disabled = Arc::new(CountingChannel::new("off", false));
        manager.register_channel(enabled.clone()).await;
        manager.register_channel(disabled.clone()).await;

        manager.start_all().await.unwrap();
        assert_eq!(enabled.starts.load(Ordering::SeqCst), 1);
        assert_eq!(disabled.starts.load(Ordering::SeqCst), 0);

        manager.stop_all().await.unwrap();
        assert_eq!(enabled.stops.load(Ordering::SeqCst), 1);
        assert_eq!(disabled.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_authentication_failure_is_not_retried() {
        let manager = ChannelManager::new();
        let rejected = Arc::new(CountingChannel::rejecting_auth("slack"));
        manager.register_channel(rejected.clone()).await;

        let err = tokio::time::timeout(std::time::Duration::from_secs(2), manager.start_all())
            .await
            .expect("start_all kept retrying")
            .unwrap_err();

        assert!(matches!(
            err,
            SmibError::Channel(ChannelError::AuthenticationFailed(_))
        ));
        assert_eq!(rejected.starts.load(Ordering::SeqCst), 1);
    }
}
