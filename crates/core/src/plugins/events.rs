use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Which lifecycle hook an event is delivered to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Change,
    ConfigChange,
    Shutdown,
}

/// What triggered a change event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeSource {
    /// A watched resource was modified or added
    Resource { path: PathBuf },
    /// A watched resource defined a type that was reloaded
    Type { name: String, path: PathBuf },
    /// Application configuration changed
    Config,
    /// Lifecycle events not tied to a resource
    Application,
}

/// Event handed to plugin listeners
#[derive(Debug, Clone, Serialize)]
pub struct PluginEvent {
    pub kind: EventKind,
    pub source: ChangeSource,
    /// Plugin whose resource produced the event
    pub plugin: String,
    pub plugin_version: String,
    pub application: String,
    pub manager: String,
    /// Shared application context set by the host
    pub context: serde_json::Value,
}

impl PluginEvent {
    pub fn resource_path(&self) -> Option<&PathBuf> {
        match &self.source {
            ChangeSource::Resource { path } | ChangeSource::Type { path, .. } => Some(path),
            _ => None,
        }
    }
}

pub type ListenerFn = Arc<dyn Fn(&PluginEvent) + Send + Sync>;

/// A lifecycle hook: an in-process callback or a channel to a consumer task
#[derive(Clone)]
pub enum Listener {
    Callback(ListenerFn),
    Channel(UnboundedSender<PluginEvent>),
}

impl Listener {
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&PluginEvent) + Send + Sync + 'static,
    {
        Listener::Callback(Arc::new(f))
    }

    pub fn channel(sender: UnboundedSender<PluginEvent>) -> Self {
        Listener::Channel(sender)
    }

    pub fn notify(&self, event: &PluginEvent) {
        match self {
            Listener::Callback(callback) => callback(event),
            Listener::Channel(sender) => {
                if sender.send(event.clone()).is_err() {
                    tracing::warn!(
                        "Listener channel for plugin '{}' is closed, dropping {:?} event",
                        event.plugin,
                        event.kind
                    );
                }
            }
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Listener::Callback(_) => write!(f, "Listener::Callback"),
            Listener::Channel(_) => write!(f, "Listener::Channel"),
        }
    }
}

/// The three optional lifecycle hooks of a plugin
#[derive(Debug, Clone, Default)]
pub struct PluginListeners {
    pub on_change: Option<Listener>,
    pub on_config_change: Option<Listener>,
    pub on_shutdown: Option<Listener>,
}

impl PluginListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_on_change(mut self, listener: Listener) -> Self {
        self.on_change = Some(listener);
        self
    }

    pub fn with_on_config_change(mut self, listener: Listener) -> Self {
        self.on_config_change = Some(listener);
        self
    }

    pub fn with_on_shutdown(mut self, listener: Listener) -> Self {
        self.on_shutdown = Some(listener);
        self
    }

    pub fn for_kind(&self, kind: EventKind) -> Option<&Listener> {
        match kind {
            EventKind::Change => self.on_change.as_ref(),
            EventKind::ConfigChange => self.on_config_change.as_ref(),
            EventKind::Shutdown => self.on_shutdown.as_ref(),
        }
    }

    /// Deliver to the matching hook; returns false when there is none
    pub fn dispatch(&self, event: &PluginEvent) -> bool {
        match self.for_kind(event.kind) {
            Some(listener) => {
                listener.notify(event);
                true
            }
            None => false,
        }
    }
}
