//! A configurable fake [`SourceConnector`] for pipeline and scheduler
//! tests, in the style of a handler-backed mock: canned responses plus
//! a call history, no real network traffic.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use meridian_core::ErrorKind;
use meridian_scheduler::{DiscoveryItem, FetchedMeta, SourceConnector};

#[derive(Clone)]
pub struct MockSourceConnector {
    source_kind: &'static str,
    discovery_items: Arc<Mutex<Vec<DiscoveryItem>>>,
    metadata: Arc<Mutex<FetchedMeta>>,
    discover_calls: Arc<Mutex<Vec<(String, Option<String>)>>>,
    metadata_calls: Arc<Mutex<Vec<String>>>,
    fail_discover: Arc<Mutex<bool>>,
    fail_metadata: Arc<Mutex<bool>>,
}

impl MockSourceConnector {
    pub fn new(source_kind: &'static str) -> Self {
        Self {
            source_kind,
            discovery_items: Arc::new(Mutex::new(Vec::new())),
            metadata: Arc::new(Mutex::new(FetchedMeta::default())),
            discover_calls: Arc::new(Mutex::new(Vec::new())),
            metadata_calls: Arc::new(Mutex::new(Vec::new())),
            fail_discover: Arc::new(Mutex::new(false)),
            fail_metadata: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_discovery_items(self, items: Vec<DiscoveryItem>) -> Self {
        *self.discovery_items.lock().unwrap() = items;
        self
    }

    pub fn with_metadata(self, metadata: FetchedMeta) -> Self {
        *self.metadata.lock().unwrap() = metadata;
        self
    }

    pub fn fail_discover_next(&self) {
        *self.fail_discover.lock().unwrap() = true;
    }

    pub fn fail_metadata_next(&self) {
        *self.fail_metadata.lock().unwrap() = true;
    }

    pub fn discover_calls(&self) -> Vec<(String, Option<String>)> {
        self.discover_calls.lock().unwrap().clone()
    }

    pub fn metadata_calls(&self) -> Vec<String> {
        self.metadata_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceConnector for MockSourceConnector {
    fn source_kind(&self) -> &'static str {
        self.source_kind
    }

    async fn discover(&self, handle: &str, last_seen_external_id: Option<&str>) -> Result<Vec<DiscoveryItem>, ErrorKind> {
        self.discover_calls
            .lock()
            .unwrap()
            .push((handle.to_string(), last_seen_external_id.map(str::to_string)));
        if std::mem::take(&mut *self.fail_discover.lock().unwrap()) {
            return Err(ErrorKind::BackendUnavailable);
        }
        Ok(self.discovery_items.lock().unwrap().clone())
    }

    async fn fetch_metadata(&self, external_id: &str) -> Result<FetchedMeta, ErrorKind> {
        self.metadata_calls.lock().unwrap().push(external_id.to_string());
        if std::mem::take(&mut *self.fail_metadata.lock().unwrap()) {
            return Err(ErrorKind::BackendUnavailable);
        }
        Ok(self.metadata.lock().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_discover_calls_and_returns_canned_items() {
        let connector = MockSourceConnector::new("youtube").with_discovery_items(vec![DiscoveryItem {
            external_id: "abc123".to_string(),
            url: "https://example.invalid/abc123".to_string(),
            published_at: None,
        }]);
        let items = connector.discover("@channel", Some("prev")).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(connector.discover_calls(), vec![("@channel".to_string(), Some("prev".to_string()))]);
    }

    #[tokio::test]
    async fn fail_discover_next_is_one_shot() {
        let connector = MockSourceConnector::new("youtube");
        connector.fail_discover_next();
        assert!(connector.discover("@channel", None).await.is_err());
        assert!(connector.discover("@channel", None).await.is_ok());
    }

    proptest::proptest! {
        #[test]
        fn discover_call_history_echoes_whatever_handle_it_was_given(handle in "[a-zA-Z0-9_@]{1,32}") {
            let connector = MockSourceConnector::new("youtube");
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(connector.discover(&handle, None)).unwrap();
            prop_assert_eq!(connector.discover_calls(), vec![(handle, None)]);
        }
    }
}
