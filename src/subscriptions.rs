use crate::lists::{ListClient, MAX_LISTS_PER_FETCH, MergeVars, SubscriptionStatus};
use crate::settings::{ListCache, Settings, SettingsError, SettingsStore};

use time::OffsetDateTime;
use tracing::{debug, error};
use validator::ValidateEmail;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Gateway for everything subscription-related. Holds the shared settings
/// snapshot and builds remote clients from the stored API key on demand;
/// with no key configured every operation degrades to its default result
/// without touching the network.
#[derive(Clone)]
pub struct Subscriptions {
    service_url: String,
    settings: Arc<Mutex<Settings>>,
    store: SettingsStore,
}

impl Subscriptions {
    pub fn new(service_url: String, settings: Settings, store: SettingsStore) -> Self {
        Self {
            service_url,
            settings: Arc::new(Mutex::new(settings)),
            store,
        }
    }

    /// Copy of the current settings. The lock is never held across an
    /// await; callers work from this snapshot.
    pub fn snapshot(&self) -> Settings {
        self.settings.lock().expect("settings lock").clone()
    }

    fn client(&self) -> Option<ListClient> {
        let api_key = {
            let settings = self.settings.lock().expect("settings lock");
            settings.api_key.trim().to_string()
        };
        if api_key.is_empty() {
            return None;
        }
        self.client_for(&api_key)
    }

    fn client_for(&self, api_key: &str) -> Option<ListClient> {
        match ListClient::new(api_key, self.service_url.clone()) {
            Ok(client) => Some(client),
            Err(err) => {
                error!("failed to build list client: {err}");
                None
            }
        }
    }

    /// Subscribes `email` to `list_id`. Returns the remote-reported
    /// result, or `false` without a remote call when no key is
    /// configured or the address is malformed.
    pub async fn subscribe(&self, email: &str, list_id: &str, merge: &MergeVars) -> bool {
        if !email.validate_email() {
            return false;
        }
        let Some(client) = self.client() else {
            return false;
        };
        match client.subscribe(list_id, email, merge).await {
            Ok(complete) => complete,
            Err(err) => {
                debug!(list_id, "subscribe failed: {err}");
                false
            }
        }
    }

    pub async fn unsubscribe(&self, email: &str, list_id: &str) -> bool {
        if !email.validate_email() {
            return false;
        }
        let Some(client) = self.client() else {
            return false;
        };
        match client.unsubscribe(list_id, email).await {
            Ok(complete) => complete,
            Err(err) => {
                debug!(list_id, "unsubscribe failed: {err}");
                false
            }
        }
    }

    /// Membership status for `email` on `list_id`, as the remote service
    /// reports it. Any degraded path (no key, bad address, remote error,
    /// no match) collapses to `NotSubscribed`.
    pub async fn status(&self, email: &str, list_id: &str) -> SubscriptionStatus {
        if !email.validate_email() {
            return SubscriptionStatus::NotSubscribed;
        }
        let Some(client) = self.client() else {
            return SubscriptionStatus::NotSubscribed;
        };
        match client.member_info(list_id, &[email]).await {
            Ok(info) if info.success == 1 => info
                .data
                .first()
                .map(|record| SubscriptionStatus::from_remote(&record.status))
                .unwrap_or(SubscriptionStatus::NotSubscribed),
            Ok(_) => SubscriptionStatus::NotSubscribed,
            Err(err) => {
                debug!(list_id, "member info failed: {err}");
                SubscriptionStatus::NotSubscribed
            }
        }
    }

    /// Whether the remote service reported exactly one match for
    /// `email`. Deliberately does not interpret the status string.
    pub async fn is_subscribed(&self, email: &str, list_id: &str) -> bool {
        if !email.validate_email() {
            return false;
        }
        let Some(client) = self.client() else {
            return false;
        };
        match client.member_info(list_id, &[email]).await {
            Ok(info) => info.success == 1,
            Err(err) => {
                debug!(list_id, "member info failed: {err}");
                false
            }
        }
    }

    /// The id -> name mapping of lists on the account. A non-empty cache
    /// is reused unless `force_reload` is set or `override_key` names a
    /// different account; a fresh fetch always replaces the persisted
    /// cache, whichever key produced it.
    pub async fn available_lists(
        &self,
        override_key: Option<&str>,
        force_reload: bool,
    ) -> Option<BTreeMap<String, String>> {
        let override_key = override_key.map(str::trim).filter(|key| !key.is_empty());

        if override_key.is_none() && !force_reload {
            let settings = self.settings.lock().expect("settings lock");
            if let Some(names) = settings.cached_names() {
                return Some(names.clone());
            }
        }

        let client = match override_key {
            Some(key) => self.client_for(key),
            None => self.client(),
        }?;

        let page = match client.lists(0, MAX_LISTS_PER_FETCH).await {
            Ok(page) => page,
            Err(err) => {
                error!("failed to fetch lists: {err}");
                return None;
            }
        };

        let names: BTreeMap<String, String> = page
            .data
            .into_iter()
            .map(|list| (list.id, list.name))
            .collect();

        let updated = {
            let mut settings = self.settings.lock().expect("settings lock");
            settings.cached_lists = Some(ListCache {
                fetched_at: OffsetDateTime::now_utc(),
                names: names.clone(),
            });
            settings.clone()
        };
        if let Err(err) = self.store.save(&updated) {
            error!("failed to persist list cache: {err}");
        }

        Some(names)
    }

    /// Overwrites the admin-editable settings verbatim and persists.
    pub fn save_options(
        &self,
        api_key: String,
        enabled_lists: Vec<String>,
        descriptions: BTreeMap<String, String>,
    ) -> Result<(), SettingsError> {
        let updated = {
            let mut settings = self.settings.lock().expect("settings lock");
            settings.api_key = api_key;
            settings.enabled_lists = enabled_lists;
            settings.descriptions = descriptions;
            settings.clone()
        };
        self.store.save(&updated)
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::settings::tests::temp_settings_path;
    use mockito::{Matcher, Mock, Server, ServerGuard};
    use serde_json::json;

    #[tokio::test]
    async fn subscribe__should_reject_malformed_email_without_remote_call() {
        // Given
        let mut server = Server::new_async().await;
        let guards = no_remote_calls(&mut server).await;
        let subscriptions = subscriptions_with(&server, settings_with_key("key-1"), "no-call-email");

        // When
        let subscribed = subscriptions
            .subscribe("not-an-email", "l1", &MergeVars::default())
            .await;

        // Then
        assert!(!subscribed);
        assert!(!subscriptions.unsubscribe("not-an-email", "l1").await);
        assert_eq!(
            subscriptions.status("not-an-email", "l1").await,
            SubscriptionStatus::NotSubscribed
        );
        assert!(!subscriptions.is_subscribed("not-an-email", "l1").await);
        for guard in guards {
            guard.assert_async().await;
        }
    }

    #[tokio::test]
    async fn facade__should_degrade_without_api_key_and_make_no_remote_calls() {
        // Given
        let mut server = Server::new_async().await;
        let guards = no_remote_calls(&mut server).await;
        let subscriptions = subscriptions_with(&server, Settings::default(), "no-call-key");

        // Then
        assert!(
            !subscriptions
                .subscribe("a@b.com", "l1", &MergeVars::default())
                .await
        );
        assert!(!subscriptions.unsubscribe("a@b.com", "l1").await);
        assert_eq!(
            subscriptions.status("a@b.com", "l1").await,
            SubscriptionStatus::NotSubscribed
        );
        assert!(!subscriptions.is_subscribed("a@b.com", "l1").await);
        assert_eq!(subscriptions.available_lists(None, false).await, None);
        for guard in guards {
            guard.assert_async().await;
        }
    }

    #[tokio::test]
    async fn status__should_pass_remote_status_through_verbatim() {
        // Given
        let mut server = Server::new_async().await;
        let _mock = member_info_mock(&mut server, "l1", 1, "cleaned").await;
        let subscriptions = subscriptions_with(&server, settings_with_key("key-1"), "status-verbatim");

        // When
        let status = subscriptions.status("a@b.com", "l1").await;

        // Then
        assert_eq!(status, SubscriptionStatus::Other("cleaned".to_string()));
    }

    #[tokio::test]
    async fn status__should_default_when_no_match_reported() {
        // Given
        let mut server = Server::new_async().await;
        let _mock = member_info_mock(&mut server, "l1", 0, "subscribed").await;
        let subscriptions = subscriptions_with(&server, settings_with_key("key-1"), "status-no-match");

        // Then
        assert_eq!(
            subscriptions.status("a@b.com", "l1").await,
            SubscriptionStatus::NotSubscribed
        );
        assert!(!subscriptions.is_subscribed("a@b.com", "l1").await);
    }

    #[tokio::test]
    async fn status__should_default_on_remote_error() {
        // Given
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/lists/l1/members/info")
            .with_status(500)
            .create_async()
            .await;
        let subscriptions = subscriptions_with(&server, settings_with_key("key-1"), "status-error");

        // Then
        assert_eq!(
            subscriptions.status("a@b.com", "l1").await,
            SubscriptionStatus::NotSubscribed
        );
        assert!(!subscriptions.is_subscribed("a@b.com", "l1").await);
    }

    #[tokio::test]
    async fn available_lists__should_reuse_non_empty_cache_without_remote_call() {
        // Given
        let mut server = Server::new_async().await;
        let guards = no_remote_calls(&mut server).await;
        let settings = settings_with_cache("key-1", &[("l1", "News")]);
        let cached = settings.cached_names().expect("cache").clone();
        let subscriptions = subscriptions_with(&server, settings, "cache-reuse");

        // When
        let lists = subscriptions.available_lists(None, false).await;

        // Then
        assert_eq!(lists, Some(cached));
        for guard in guards {
            guard.assert_async().await;
        }
    }

    #[tokio::test]
    async fn available_lists__should_fetch_when_cache_empty() {
        // Given
        let mut server = Server::new_async().await;
        let mock = lists_mock(&mut server, &[("l1", "News"), ("l2", "Deals")]).await;
        let subscriptions = subscriptions_with(&server, settings_with_key("key-1"), "cache-empty");

        // When
        let lists = subscriptions
            .available_lists(None, false)
            .await
            .expect("lists");

        // Then
        assert_eq!(lists.get("l1").map(String::as_str), Some("News"));
        assert_eq!(lists.get("l2").map(String::as_str), Some("Deals"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn available_lists__should_overwrite_cache_on_forced_reload() {
        // Given
        let mut server = Server::new_async().await;
        let mock = lists_mock(&mut server, &[("l3", "Fresh")]).await;
        let settings = settings_with_cache("key-1", &[("l1", "Stale")]);
        let subscriptions = subscriptions_with(&server, settings, "cache-force");

        // When
        let lists = subscriptions
            .available_lists(None, true)
            .await
            .expect("lists");

        // Then
        assert_eq!(lists.get("l3").map(String::as_str), Some("Fresh"));
        assert!(!lists.contains_key("l1"));
        mock.assert_async().await;

        let snapshot = subscriptions.snapshot();
        let cache = snapshot.cached_lists.expect("cache entry");
        assert_eq!(cache.names, lists);

        // Persisted too
        let reloaded = subscriptions.store.load().expect("reload settings");
        assert_eq!(reloaded.cached_lists.expect("persisted cache").names, lists);

        std::fs::remove_file(subscriptions.store.path()).expect("cleanup");
    }

    #[tokio::test]
    async fn available_lists__should_fetch_with_override_key() {
        // Given
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/lists")
            .match_header("x-api-key", "other-key")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"total": 1, "data": [{"id": "x1", "name": "Other"}]}).to_string())
            .create_async()
            .await;
        let settings = settings_with_cache("key-1", &[("l1", "News")]);
        let subscriptions = subscriptions_with(&server, settings, "override-key");

        // When
        let lists = subscriptions
            .available_lists(Some("other-key"), false)
            .await
            .expect("lists");

        // Then
        assert_eq!(lists.get("x1").map(String::as_str), Some("Other"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn save_options__should_persist_verbatim() {
        // Given
        let server = Server::new_async().await;
        let subscriptions = subscriptions_with(&server, Settings::default(), "save-options");
        let descriptions = BTreeMap::from([
            ("l1".to_string(), "Weekly".to_string()),
            ("l2".to_string(), String::new()),
        ]);

        // When
        subscriptions
            .save_options(
                "key-2".to_string(),
                vec!["l2".to_string(), "l1".to_string()],
                descriptions.clone(),
            )
            .expect("save options");

        // Then
        let reloaded = subscriptions.store.load().expect("reload settings");
        assert_eq!(reloaded.api_key, "key-2");
        assert_eq!(reloaded.enabled_lists, vec!["l2", "l1"]);
        assert_eq!(reloaded.descriptions, descriptions);

        std::fs::remove_file(subscriptions.store.path()).expect("cleanup");
    }

    fn subscriptions_with(server: &ServerGuard, settings: Settings, test_name: &str) -> Subscriptions {
        let store = SettingsStore::new(temp_settings_path(test_name));
        Subscriptions::new(server.url(), settings, store)
    }

    fn settings_with_key(api_key: &str) -> Settings {
        Settings {
            api_key: api_key.to_string(),
            ..Default::default()
        }
    }

    fn settings_with_cache(api_key: &str, names: &[(&str, &str)]) -> Settings {
        Settings {
            api_key: api_key.to_string(),
            cached_lists: Some(ListCache {
                fetched_at: OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("timestamp"),
                names: names
                    .iter()
                    .map(|(id, name)| (id.to_string(), name.to_string()))
                    .collect(),
            }),
            ..Default::default()
        }
    }

    async fn lists_mock(server: &mut ServerGuard, names: &[(&str, &str)]) -> Mock {
        let data: Vec<_> = names
            .iter()
            .map(|(id, name)| json!({"id": id, "name": name}))
            .collect();
        server
            .mock("GET", "/lists")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("offset".into(), "0".into()),
                Matcher::UrlEncoded("limit".into(), "100".into()),
            ]))
            .with_status(200)
            .with_body(json!({"total": data.len(), "data": data}).to_string())
            .create_async()
            .await
    }

    async fn member_info_mock(
        server: &mut ServerGuard,
        list_id: &str,
        success: u32,
        status: &str,
    ) -> Mock {
        let data = if success == 1 {
            json!([{"email": "a@b.com", "status": status}])
        } else {
            json!([])
        };
        server
            .mock("POST", format!("/lists/{list_id}/members/info").as_str())
            .with_status(200)
            .with_body(
                json!({"success": success, "errors": 0, "data": data}).to_string(),
            )
            .create_async()
            .await
    }

    /// Catch-all mocks asserting the remote service is never reached.
    async fn no_remote_calls(server: &mut ServerGuard) -> Vec<Mock> {
        let mut guards = Vec::new();
        for method in ["GET", "POST"] {
            guards.push(
                server
                    .mock(method, Matcher::Any)
                    .expect(0)
                    .create_async()
                    .await,
            );
        }
        guards
    }
}
