//! Store and change feed selection
//!
//! Commands talk to the hosted table through `RestStore` and hear about
//! changes through a realtime `Subscription`. With `--offline` both are
//! replaced by an in-process `MemoryStore` and its change broadcast.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info};

use todos_core::realtime::RealtimeConfig;
use todos_core::{
    ChangeEvent, Config, MemoryStore, RealtimeEvent, RestStore, Subscription,
    SubscriptionStatus, TodoStore,
};

/// Bodies the offline store starts with
const DEMO_TODOS: [&str; 3] = ["Try the offline mode", "Add a todo", "Mark one done"];

enum Source {
    Remote(RealtimeConfig),
    Local(Arc<MemoryStore>),
}

/// The store a command works against and where its changes come from
pub struct Backend {
    store: Arc<dyn TodoStore>,
    source: Source,
}

impl Backend {
    /// Open the hosted store, or the in-memory one when offline
    pub fn open(config: &Config, offline: bool) -> Result<Self> {
        if offline {
            info!("Using offline in-memory store");
            let memory = Arc::new(MemoryStore::with_bodies(DEMO_TODOS));
            return Ok(Self {
                store: memory.clone(),
                source: Source::Local(memory),
            });
        }

        config.credentials()?;
        let store = RestStore::from_config(config).context("Failed to create store client")?;
        let realtime =
            RealtimeConfig::from_config(config).context("Failed to configure realtime")?;
        info!("Using store at {}", store.endpoint());

        Ok(Self {
            store: Arc::new(store),
            source: Source::Remote(realtime),
        })
    }

    pub fn store(&self) -> Arc<dyn TodoStore> {
        Arc::clone(&self.store)
    }

    pub fn is_offline(&self) -> bool {
        matches!(self.source, Source::Local(_))
    }

    /// Start listening for changes
    pub fn subscribe(&self) -> ChangeFeed {
        match &self.source {
            Source::Remote(config) => ChangeFeed::Realtime(Subscription::spawn(config.clone())),
            Source::Local(memory) => ChangeFeed::Local(memory.subscribe_changes()),
        }
    }
}

/// Stream of change notifications for one view session
pub enum ChangeFeed {
    Realtime(Subscription),
    Local(broadcast::Receiver<ChangeEvent>),
}

impl ChangeFeed {
    /// Next event, or None once the feed has ended
    pub async fn next_event(&mut self) -> Option<RealtimeEvent> {
        match self {
            ChangeFeed::Realtime(sub) => sub.next_event().await,
            ChangeFeed::Local(rx) => loop {
                match rx.recv().await {
                    Ok(change) => return Some(RealtimeEvent::Change(change)),
                    // Any later change refetches everything
                    Err(RecvError::Lagged(missed)) => {
                        debug!("Change feed lagged, {} events skipped", missed);
                    }
                    Err(RecvError::Closed) => return None,
                }
            },
        }
    }

    pub fn status(&self) -> Option<SubscriptionStatus> {
        match self {
            ChangeFeed::Realtime(sub) => Some(sub.status()),
            ChangeFeed::Local(_) => None,
        }
    }

    /// Leave the channel and close the socket
    pub async fn close(self) {
        match self {
            ChangeFeed::Realtime(sub) => sub.shutdown().await,
            ChangeFeed::Local(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use todos_core::NewTodo;

    #[tokio::test]
    async fn test_offline_backend_feeds_local_changes() {
        let backend = Backend::open(&Config::default(), true).unwrap();
        assert!(backend.is_offline());

        let mut feed = backend.subscribe();
        assert!(feed.status().is_none());

        let store = backend.store();
        assert_eq!(store.list().await.unwrap().len(), DEMO_TODOS.len());

        store.insert(NewTodo::new("from test")).await.unwrap();
        match feed.next_event().await {
            Some(RealtimeEvent::Change(change)) => assert_eq!(change.table, "todos"),
            _ => panic!("Expected a change event"),
        }
        feed.close().await;
    }

    #[test]
    fn test_online_backend_requires_credentials() {
        let config = Config {
            url: None,
            anon_key: None,
            ..Config::default()
        };
        let err = Backend::open(&config, false).err().unwrap();
        assert!(err.to_string().contains("todos config set url"));
    }
}
