//! Name resolution for channels and users.
//!
//! Display names come from the platform directory, are resolved at most
//! once per distinct ID, and are cached for the process lifetime. A rename
//! after first lookup is intentionally not reflected: the file a channel
//! maps to must stay stable while the process runs.

use std::collections::HashMap;
use tracing::warn;

/// Directory lookups provided by the platform layer.
///
/// Both methods return `Ok(None)` when the platform has no display name for
/// the ID; transport and API failures surface as errors so the caller can
/// decide how to degrade.
#[allow(async_fn_in_trait)]
pub trait Directory {
    async fn channel_name(&self, id: &str) -> anyhow::Result<Option<String>>;
    async fn user_name(&self, id: &str) -> anyhow::Result<Option<String>>;
}

/// Channel ID to log file name, resolved once and pinned.
#[derive(Debug, Default)]
pub struct ChannelNames {
    cache: HashMap<String, String>,
}

impl ChannelNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the file-safe name for a channel, querying the directory on
    /// first sight of the ID.
    ///
    /// Lookup failures and unnamed channels fall back to the raw ID. The
    /// fallback is cached too, so each distinct ID costs at most one
    /// outbound lookup per process.
    pub async fn resolve<D: Directory>(&mut self, directory: &D, id: &str) -> String {
        if let Some(name) = self.cache.get(id) {
            return name.clone();
        }
        let name = match directory.channel_name(id).await {
            Ok(Some(display)) => sanitize(&display).unwrap_or_else(|| id.to_string()),
            Ok(None) => id.to_string(),
            Err(err) => {
                warn!("channel lookup for {id} failed: {err:#}; using raw id");
                id.to_string()
            }
        };
        self.cache.insert(id.to_string(), name.clone());
        name
    }
}

/// User ID to display name, for payload annotation.
///
/// Unlike channels there is no fallback: a user without a resolvable name
/// simply gets no annotation. Misses are cached like hits.
#[derive(Debug, Default)]
pub struct UserNames {
    cache: HashMap<String, Option<String>>,
}

impl UserNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the display name for a user, if the directory knows one.
    pub async fn resolve<D: Directory>(&mut self, directory: &D, id: &str) -> Option<String> {
        if let Some(cached) = self.cache.get(id) {
            return cached.clone();
        }
        let name = match directory.user_name(id).await {
            Ok(name) => name,
            Err(err) => {
                warn!("user lookup for {id} failed: {err:#}");
                None
            }
        };
        self.cache.insert(id.to_string(), name.clone());
        name
    }
}

/// Reduces a display name to a safe file name component.
///
/// Anything outside ASCII alphanumerics, `.`, `_`, and `-` becomes `_`;
/// a name left with nothing recognizable yields `None`.
pub fn sanitize(name: &str) -> Option<String> {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.chars().all(|c| matches!(c, '.' | '_')) {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct FakeDirectory {
        channels: RefCell<HashMap<String, String>>,
        users: HashMap<String, String>,
        lookups: Cell<usize>,
        fail: bool,
    }

    impl Directory for FakeDirectory {
        async fn channel_name(&self, id: &str) -> anyhow::Result<Option<String>> {
            self.lookups.set(self.lookups.get() + 1);
            if self.fail {
                anyhow::bail!("directory offline");
            }
            Ok(self.channels.borrow().get(id).cloned())
        }

        async fn user_name(&self, id: &str) -> anyhow::Result<Option<String>> {
            self.lookups.set(self.lookups.get() + 1);
            if self.fail {
                anyhow::bail!("directory offline");
            }
            Ok(self.users.get(id).cloned())
        }
    }

    #[tokio::test]
    async fn resolution_is_cached_for_the_process_lifetime() {
        let directory = FakeDirectory::default();
        directory
            .channels
            .borrow_mut()
            .insert("C1".into(), "general".into());
        let mut names = ChannelNames::new();

        assert_eq!(names.resolve(&directory, "C1").await, "general");
        // A rename after first lookup must not move the channel's file.
        directory
            .channels
            .borrow_mut()
            .insert("C1".into(), "renamed".into());
        assert_eq!(names.resolve(&directory, "C1").await, "general");
        assert_eq!(directory.lookups.get(), 1);
    }

    #[tokio::test]
    async fn unnamed_channels_fall_back_to_the_raw_id() {
        let directory = FakeDirectory::default();
        let mut names = ChannelNames::new();
        assert_eq!(names.resolve(&directory, "C404").await, "C404");
    }

    #[tokio::test]
    async fn lookup_failure_falls_back_and_is_cached() {
        let directory = FakeDirectory {
            fail: true,
            ..FakeDirectory::default()
        };
        let mut names = ChannelNames::new();
        assert_eq!(names.resolve(&directory, "C1").await, "C1");
        assert_eq!(names.resolve(&directory, "C1").await, "C1");
        assert_eq!(directory.lookups.get(), 1);
    }

    #[tokio::test]
    async fn resolved_names_are_sanitized() {
        let directory = FakeDirectory::default();
        directory
            .channels
            .borrow_mut()
            .insert("C1".into(), "ops/on call".into());
        let mut names = ChannelNames::new();
        assert_eq!(names.resolve(&directory, "C1").await, "ops_on_call");
    }

    #[tokio::test]
    async fn user_names_cache_misses_too() {
        let mut directory = FakeDirectory::default();
        directory.users.insert("U1".into(), "alice".into());
        let mut users = UserNames::new();

        assert_eq!(users.resolve(&directory, "U1").await, Some("alice".into()));
        assert_eq!(users.resolve(&directory, "U2").await, None);
        assert_eq!(users.resolve(&directory, "U2").await, None);
        assert_eq!(directory.lookups.get(), 2);
    }

    #[test]
    fn sanitize_keeps_safe_characters() {
        assert_eq!(sanitize("general"), Some("general".into()));
        assert_eq!(sanitize("release-1.2_x"), Some("release-1.2_x".into()));
        assert_eq!(sanitize("ops/on call"), Some("ops_on_call".into()));
    }

    #[test]
    fn sanitize_rejects_names_with_nothing_to_keep() {
        assert_eq!(sanitize(""), None);
        assert_eq!(sanitize("..."), None);
        assert_eq!(sanitize("каналы"), None);
    }
}
