//! Segment reload on schema updates
//!
//! When a PinotSchema is successfully updated, every table of the same
//! cluster that opted into `segmentReload` and is built on that schema gets
//! its segments reloaded.

use super::{should_reconcile, watch_api};
use crate::admin::{routes, AdminApi};
use crate::conditions::ConditionType;
use crate::config::OperatorConfig;
use crate::crd::{LogicalResourceStatus, PinotSchema, PinotTable};
use crate::error::Result;
use crate::events::{actions, EventPublisher};
use crate::external::{parse_document, ClusterDirectory, LogicalResource, ResourceStore};
use futures::StreamExt;
use kube::api::{Api, ListParams};
use kube::runtime::events::EventType;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Client, Resource, ResourceExt};
use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Time given to the controller to settle a schema change before reloading
const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Tables of `cluster` with `segmentReload` whose
/// `segmentsConfig.schemaName` is `schema_name`.
pub fn tables_to_reload<'a>(
    tables: &'a [PinotTable],
    cluster: &str,
    schema_name: &str,
) -> Vec<&'a PinotTable> {
    tables
        .iter()
        .filter(|t| t.spec.segment_reload)
        .filter(|t| t.spec.pinot_cluster == cluster)
        .filter(|t| t.meta().deletion_timestamp.is_none())
        .filter(|t| table_schema_name(t).as_deref() == Some(schema_name))
        .collect()
}

fn table_schema_name(table: &PinotTable) -> Option<String> {
    let doc: Value = serde_json::from_str(&table.spec.tables_json).ok()?;
    doc.pointer("/segmentsConfig/schemaName")?
        .as_str()
        .map(str::to_string)
}

/// De-duplicates schema watch events by `status.lastUpdateTime`
#[derive(Debug, Default)]
pub struct SchemaUpdateTracker {
    seen: HashMap<String, Option<String>>,
}

impl SchemaUpdateTracker {
    /// True when `schema` carries an `UpdateSuccess` not seen before. The
    /// first sighting of a schema only primes the tracker, so a restart
    /// does not reload every table.
    pub fn observe(&mut self, schema: &PinotSchema) -> bool {
        let key = Self::key(schema);
        let status = schema.status.as_ref();
        let stamp = status.and_then(|s| s.last_update_time.clone());
        let updated = status.and_then(|s| s.r#type.as_deref())
            == Some(ConditionType::UpdateSuccess.as_str());

        match self.seen.insert(key, stamp.clone()) {
            None => false,
            Some(previous) => updated && stamp.is_some() && previous != stamp,
        }
    }

    /// Drop a deleted schema so a recreated one starts primed again.
    pub fn forget(&mut self, schema: &PinotSchema) {
        self.seen.remove(&Self::key(schema));
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn key(schema: &PinotSchema) -> String {
        format!(
            "{}/{}",
            schema.namespace().unwrap_or_default(),
            schema.name_any()
        )
    }
}

/// Issues segment reloads and records them on the table
pub struct TableReloader {
    admin: Arc<dyn AdminApi>,
    directory: Arc<dyn ClusterDirectory>,
    store: Arc<dyn ResourceStore<PinotTable>>,
    events: Arc<dyn EventPublisher>,
}

impl TableReloader {
    pub fn new(
        admin: Arc<dyn AdminApi>,
        directory: Arc<dyn ClusterDirectory>,
        store: Arc<dyn ResourceStore<PinotTable>>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            admin,
            directory,
            store,
            events,
        }
    }

    /// Reload all segments of `table`. The response body is appended to
    /// `status.reloadStatus` whatever the outcome; returns whether the
    /// controller accepted the reload.
    pub async fn reload(&self, table: &PinotTable) -> Result<bool> {
        let namespace = table.namespace().unwrap_or_default();
        let target = self
            .directory
            .resolve(&namespace, table.cluster_name())
            .await?;
        let (name, _) = parse_document(table.document(), PinotTable::IDENTITY_FIELD)?;

        let response = self
            .admin
            .send(target.request(Method::POST, &routes::table_reload(&name), None))
            .await?;

        let (condition, type_) = if response.is_ok() {
            info!(table = %name, "Reloaded segments");
            (ConditionType::ReloadSuccess, EventType::Normal)
        } else {
            warn!(table = %name, status = response.status, "Segment reload failed");
            (ConditionType::ReloadFail, EventType::Warning)
        };

        let body = response.body.clone();
        self.store
            .update_status(table, &move |s: &mut LogicalResourceStatus| {
                s.reload_status.push(body.clone());
            })
            .await?;
        self.events
            .publish(
                &table.object_ref(&()),
                type_,
                condition.as_str(),
                actions::RELOAD,
                Some(format!("Resp [{}]", response.body)),
            )
            .await;

        Ok(response.is_ok())
    }
}

/// Watches schemas and fans successful updates out to dependent tables
pub struct SchemaReloadWatcher {
    client: Client,
    config: OperatorConfig,
    reloader: TableReloader,
}

impl SchemaReloadWatcher {
    pub fn new(client: Client, config: OperatorConfig, reloader: TableReloader) -> Self {
        Self {
            client,
            config,
            reloader,
        }
    }

    pub async fn run(self: Arc<Self>) -> Result<()> {
        let schemas = watch_api::<PinotSchema>(&self.client, &self.config);
        let mut tracker = SchemaUpdateTracker::default();

        info!("Starting schema reload watcher");

        let mut stream = watcher(schemas, watcher::Config::default())
            .default_backoff()
            .boxed();

        while let Some(event) = stream.next().await {
            let schema = match event {
                Ok(watcher::Event::Apply(schema)) | Ok(watcher::Event::InitApply(schema)) => schema,
                Ok(watcher::Event::Delete(schema)) => {
                    tracker.forget(&schema);
                    continue;
                }
                Ok(watcher::Event::Init) | Ok(watcher::Event::InitDone) => continue,
                Err(e) => {
                    warn!(error = %e, "Schema watch error");
                    continue;
                }
            };
            if !should_reconcile(&schema, &PinotSchema::reconcile_annotation(), &self.config) {
                continue;
            }
            if !tracker.observe(&schema) {
                continue;
            }

            let this = Arc::clone(&self);
            tokio::spawn(async move {
                let name = schema.name_any();
                match this.on_schema_update(schema).await {
                    Ok(count) => debug!(schema = %name, count, "Schema update handled"),
                    Err(e) => warn!(schema = %name, error = %e, "Failed to reload tables"),
                }
            });
        }

        Ok(())
    }

    /// Returns the number of tables reloaded.
    async fn on_schema_update(&self, schema: PinotSchema) -> Result<usize> {
        tokio::time::sleep(SETTLE_DELAY).await;

        let namespace = schema.namespace().unwrap_or_default();
        let schemas: Api<PinotSchema> = Api::namespaced(self.client.clone(), &namespace);
        let Some(latest) = schemas.get_opt(&schema.name_any()).await? else {
            return Ok(0);
        };
        let updated = latest.status.as_ref().and_then(|s| s.r#type.as_deref())
            == Some(ConditionType::UpdateSuccess.as_str());
        if !updated {
            return Ok(0);
        }

        let (schema_name, _) = parse_document(latest.document(), PinotSchema::IDENTITY_FIELD)?;
        let tables: Api<PinotTable> = Api::namespaced(self.client.clone(), &namespace);
        let list = tables.list(&ListParams::default()).await?;

        let mut reloaded = 0;
        for table in tables_to_reload(&list.items, latest.cluster_name(), &schema_name) {
            match self.reloader.reload(table).await {
                Ok(true) => reloaded += 1,
                Ok(false) => {}
                Err(e) => warn!(table = %table.name_any(), error = %e, "Segment reload failed"),
            }
        }
        Ok(reloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::{AdminResponse, MockAdminApi};
    use crate::crd::{PinotSchemaSpec, PinotTableSpec, TableType};
    use crate::external::testing::{FakeDirectory, FakeStore, RecordingEvents};

    fn table(name: &str, cluster: &str, schema: &str, segment_reload: bool) -> PinotTable {
        let mut obj = PinotTable::new(
            name,
            PinotTableSpec {
                pinot_cluster: cluster.to_string(),
                pinot_table_type: TableType::Offline,
                segment_reload,
                tables_json: format!(
                    r#"{{"tableName":"{}","segmentsConfig":{{"schemaName":"{}"}}}}"#,
                    name, schema
                ),
            },
        );
        obj.metadata.namespace = Some("ns".to_string());
        obj
    }

    fn schema(r#type: &str, stamp: &str) -> PinotSchema {
        let mut obj = PinotSchema::new(
            "s1",
            PinotSchemaSpec {
                pinot_cluster: "c1".to_string(),
                schema_json: r#"{"schemaName":"s1"}"#.to_string(),
            },
        );
        obj.metadata.namespace = Some("ns".to_string());
        obj.status = Some(LogicalResourceStatus {
            r#type: Some(r#type.to_string()),
            last_update_time: Some(stamp.to_string()),
            ..Default::default()
        });
        obj
    }

    #[test]
    fn test_tables_to_reload() {
        let tables = vec![
            table("t1", "c1", "s1", true),
            table("t2", "c1", "s1", false),
            table("t3", "c1", "other", true),
            table("t4", "c2", "s1", true),
        ];
        let selected: Vec<String> = tables_to_reload(&tables, "c1", "s1")
            .into_iter()
            .map(|t| t.name_any())
            .collect();
        assert_eq!(selected, vec!["t1"]);
    }

    #[test]
    fn test_table_without_segments_config_is_skipped() {
        let mut t = table("t1", "c1", "s1", true);
        t.spec.tables_json = r#"{"tableName":"t1"}"#.to_string();
        assert!(tables_to_reload(&[t], "c1", "s1").is_empty());
    }

    #[test]
    fn test_tracker_dedups_by_update_time() {
        let mut tracker = SchemaUpdateTracker::default();
        assert!(!tracker.observe(&schema("UpdateSuccess", "t0")));
        assert!(!tracker.observe(&schema("UpdateSuccess", "t0")));
        assert!(tracker.observe(&schema("UpdateSuccess", "t1")));
        assert!(!tracker.observe(&schema("UpdateSuccess", "t1")));
        assert!(!tracker.observe(&schema("UpdateFail", "t2")));
    }

    #[test]
    fn test_tracker_forgets_deleted_schema() {
        let mut tracker = SchemaUpdateTracker::default();
        let first = schema("UpdateSuccess", "t0");
        assert!(!tracker.observe(&first));
        assert_eq!(tracker.len(), 1);

        tracker.forget(&first);
        assert!(tracker.is_empty());

        // A schema recreated under the same name is primed, not reloaded.
        assert!(!tracker.observe(&schema("UpdateSuccess", "t1")));
        assert_eq!(tracker.len(), 1);
    }

    fn reloader(admin: MockAdminApi, store: Arc<FakeStore>, events: Arc<RecordingEvents>) -> TableReloader {
        TableReloader::new(
            Arc::new(admin),
            Arc::new(FakeDirectory::ready()),
            store,
            events,
        )
    }

    #[tokio::test]
    async fn test_reload_appends_response() {
        let mut admin = MockAdminApi::new();
        admin
            .expect_send()
            .withf(|r| {
                r.method == Method::POST && r.url == "http://ctrl:9000/tables/t1/segments/reload"
            })
            .times(1)
            .returning(|_| {
                Ok(AdminResponse {
                    status: 200,
                    body: r#"{"status":"reload submitted"}"#.to_string(),
                })
            });

        let store = Arc::new(FakeStore::default());
        let events = Arc::new(RecordingEvents::default());
        let reloaded = reloader(admin, store.clone(), events.clone())
            .reload(&table("t1", "c1", "s1", true))
            .await
            .unwrap();

        assert!(reloaded);
        assert_eq!(
            store.status().reload_status,
            vec![r#"{"status":"reload submitted"}"#.to_string()]
        );
        assert_eq!(events.reasons(), vec!["ReloadSuccess"]);
    }

    #[tokio::test]
    async fn test_failed_reload_is_recorded() {
        let mut admin = MockAdminApi::new();
        admin.expect_send().times(1).returning(|_| {
            Ok(AdminResponse {
                status: 500,
                body: "boom".to_string(),
            })
        });

        let store = Arc::new(FakeStore::default());
        let events = Arc::new(RecordingEvents::default());
        let reloaded = reloader(admin, store.clone(), events.clone())
            .reload(&table("t1", "c1", "s1", true))
            .await
            .unwrap();

        assert!(!reloaded);
        assert_eq!(store.status().reload_status, vec!["boom".to_string()]);
        assert_eq!(events.reasons(), vec!["ReloadFail"]);
    }
}
