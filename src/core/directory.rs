use crate::config::DirectoryConfig;
use crate::domain::model::{CustomerRecord, LedgerSystem};
use crate::utils::error::Result;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

const PAGE_SIZE: u32 = 100;

/// In-memory lookup of customers keyed by `"<PREFIX>-<external id>"`. A
/// customer with ids in both ledger systems gets two entries pointing at the
/// same shared record.
#[derive(Debug, Default)]
pub struct DirectoryIndex {
    customers: HashMap<String, Arc<CustomerRecord>>,
}

impl DirectoryIndex {
    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    pub fn resolve(&self, system: LedgerSystem, external_id: &str) -> Option<Arc<CustomerRecord>> {
        self.customers.get(&system.composite_key(external_id)).cloned()
    }

    /// All external ids known for one ledger system, with their customers.
    pub fn external_ids(&self, system: LedgerSystem) -> Vec<(String, Arc<CustomerRecord>)> {
        let marker = format!("{}-", system.prefix());
        self.customers
            .iter()
            .filter_map(|(key, customer)| {
                key.strip_prefix(&marker)
                    .map(|id| (id.to_string(), customer.clone()))
            })
            .collect()
    }

    fn insert(&mut self, system: LedgerSystem, external_id: &str, customer: Arc<CustomerRecord>) {
        self.customers
            .insert(system.composite_key(external_id), customer);
    }

    /// Folds one directory page into the index and yields the continuation
    /// cursor, if any. Absence of the cursor ends pagination.
    fn apply_page(&mut self, page: DirectoryPage) -> Option<String> {
        for record in page.records {
            let customer = Arc::new(CustomerRecord {
                record_id: record.id,
                name: record.fields.name.unwrap_or_default(),
                email: record.fields.email.filter(|e| !e.is_empty()),
            });
            if let Some(id) = record.fields.credilly_id.as_ref().and_then(id_value_to_string) {
                self.insert(LedgerSystem::Credilly, &id, customer.clone());
            }
            if let Some(id) = record.fields.turing_id.as_ref().and_then(id_value_to_string) {
                self.insert(LedgerSystem::Turing, &id, customer.clone());
            }
        }
        page.offset
    }
}

#[derive(Debug, Deserialize)]
struct DirectoryPage {
    #[serde(default)]
    records: Vec<DirectoryRecord>,
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectoryRecord {
    id: String,
    #[serde(default)]
    fields: DirectoryFields,
}

#[derive(Debug, Default, Deserialize)]
struct DirectoryFields {
    #[serde(rename = "Nome do cliente")]
    name: Option<String>,
    #[serde(rename = "Email")]
    email: Option<String>,
    #[serde(rename = "ID Credilly")]
    credilly_id: Option<serde_json::Value>,
    #[serde(rename = "ID Turing")]
    turing_id: Option<serde_json::Value>,
}

/// Ids arrive as strings or bare numbers depending on the directory column
/// type; normalize both to a string key.
fn id_value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub struct DirectoryClient<'a> {
    client: Client,
    config: &'a DirectoryConfig,
}

impl<'a> DirectoryClient<'a> {
    pub fn new(client: Client, config: &'a DirectoryConfig) -> Self {
        Self { client, config }
    }

    /// Pages through the full customer directory and builds the index.
    /// A non-success page response is logged and ends pagination with
    /// whatever was accumulated; retries are not attempted at this layer
    /// because an incomplete directory is fatal to the run anyway.
    pub async fn build_index(&self) -> Result<DirectoryIndex> {
        tracing::info!("📥 Fetching customers from directory service...");
        let mut index = DirectoryIndex::default();
        let mut offset: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&self.config.table_url)
                .bearer_auth(&self.config.api_key)
                .query(&[("pageSize", PAGE_SIZE.to_string())]);
            if let Some(cursor) = &offset {
                request = request.query(&[("offset", cursor.as_str())]);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::error!("❌ Directory page fetch failed: {} - {}", status, body);
                break;
            }

            let page: DirectoryPage = response.json().await?;
            match index.apply_page(page) {
                Some(cursor) => offset = Some(cursor),
                None => break,
            }
        }

        tracing::info!("✅ {} customer ids indexed", index.len());
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn directory_config(url: String) -> DirectoryConfig {
        DirectoryConfig {
            api_key: "test-key".to_string(),
            table_url: url,
        }
    }

    fn page_from_json(value: serde_json::Value) -> DirectoryPage {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_build_index_single_page() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/customers")
                .query_param("pageSize", "100")
                .header("authorization", "Bearer test-key");
            then.status(200).json_body(serde_json::json!({
                "records": [
                    {"id": "rec1", "fields": {
                        "Nome do cliente": "Ana Souza",
                        "Email": "ana@example.com",
                        "ID Credilly": "101",
                        "ID Turing": 202
                    }},
                    {"id": "rec2", "fields": {
                        "Nome do cliente": "Bruno Lima",
                        "ID Credilly": "102"
                    }}
                ]
            }));
        });

        let config = directory_config(server.url("/customers"));
        let client = DirectoryClient::new(Client::new(), &config);
        let index = client.build_index().await.unwrap();

        mock.assert();
        // Ana participates in both systems, Bruno only in one.
        assert_eq!(index.len(), 3);
        let ana = index.resolve(LedgerSystem::Credilly, "101").unwrap();
        assert_eq!(ana.email.as_deref(), Some("ana@example.com"));
        let ana_turing = index.resolve(LedgerSystem::Turing, "202").unwrap();
        assert_eq!(ana_turing.record_id, "rec1");
        let bruno = index.resolve(LedgerSystem::Credilly, "102").unwrap();
        assert!(bruno.email.is_none());
    }

    #[tokio::test]
    async fn test_build_index_failing_first_page_returns_partial() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/customers");
            then.status(403).body("forbidden");
        });

        let config = directory_config(server.url("/customers"));
        let client = DirectoryClient::new(Client::new(), &config);
        let index = client.build_index().await.unwrap();

        mock.assert();
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_build_index_empty_directory_is_not_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/customers");
            then.status(200).json_body(serde_json::json!({"records": []}));
        });

        let config = directory_config(server.url("/customers"));
        let client = DirectoryClient::new(Client::new(), &config);
        let index = client.build_index().await.unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_apply_page_returns_continuation_cursor() {
        let mut index = DirectoryIndex::default();
        let cursor = index.apply_page(page_from_json(serde_json::json!({
            "records": [
                {"id": "rec1", "fields": {"Nome do cliente": "Ana", "ID Credilly": "1"}}
            ],
            "offset": "cursor-2"
        })));
        assert_eq!(cursor.as_deref(), Some("cursor-2"));
        assert_eq!(index.len(), 1);

        let cursor = index.apply_page(page_from_json(serde_json::json!({
            "records": [
                {"id": "rec2", "fields": {"Nome do cliente": "Bia", "ID Turing": "2"}}
            ]
        })));
        assert!(cursor.is_none());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_apply_page_skips_records_without_ledger_ids() {
        let mut index = DirectoryIndex::default();
        index.apply_page(page_from_json(serde_json::json!({
            "records": [
                {"id": "rec1", "fields": {"Nome do cliente": "Sem Sistema"}},
                {"id": "rec2", "fields": {}}
            ]
        })));
        assert!(index.is_empty());
    }

    #[test]
    fn test_external_ids_filters_by_prefix() {
        let mut index = DirectoryIndex::default();
        let ana = Arc::new(CustomerRecord {
            record_id: "rec1".to_string(),
            name: "Ana".to_string(),
            email: None,
        });
        index.insert(LedgerSystem::Credilly, "1", ana.clone());
        index.insert(LedgerSystem::Turing, "2", ana);

        let credilly = index.external_ids(LedgerSystem::Credilly);
        assert_eq!(credilly.len(), 1);
        assert_eq!(credilly[0].0, "1");
    }
}
