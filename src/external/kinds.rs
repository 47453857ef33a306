use super::LogicalResource;
use crate::admin::{routes, ProbeOutcome};
use crate::conditions::{SCHEMA_FINALIZER, TABLE_FINALIZER, TENANT_FINALIZER};
use crate::crd::{LogicalResourceStatus, PinotSchema, PinotTable, PinotTenant};
use reqwest::Method;
use serde_json::Value;

impl LogicalResource for PinotSchema {
    const KIND: &'static str = "pinotschema";
    const IDENTITY_FIELD: &'static str = "schemaName";
    const FINALIZER: &'static str = SCHEMA_FINALIZER;

    fn cluster_name(&self) -> &str {
        &self.spec.pinot_cluster
    }

    fn document(&self) -> &str {
        &self.spec.schema_json
    }

    fn admin_status(&self) -> Option<&LogicalResourceStatus> {
        self.status.as_ref()
    }

    fn admin_status_mut(&mut self) -> &mut Option<LogicalResourceStatus> {
        &mut self.status
    }

    fn probe_path(&self, identity: &str) -> String {
        routes::schema(identity)
    }

    fn create_route(&self) -> (Method, String) {
        (Method::POST, routes::SCHEMAS.to_string())
    }

    fn update_route(&self, identity: &str) -> (Method, String) {
        (Method::PUT, routes::schema(identity))
    }

    fn delete_path(&self, identity: &str) -> String {
        routes::schema(identity)
    }
}

impl LogicalResource for PinotTable {
    const KIND: &'static str = "pinottable";
    const IDENTITY_FIELD: &'static str = "tableName";
    const FINALIZER: &'static str = TABLE_FINALIZER;

    fn cluster_name(&self) -> &str {
        &self.spec.pinot_cluster
    }

    fn document(&self) -> &str {
        &self.spec.tables_json
    }

    fn admin_status(&self) -> Option<&LogicalResourceStatus> {
        self.status.as_ref()
    }

    fn admin_status_mut(&mut self) -> &mut Option<LogicalResourceStatus> {
        &mut self.status
    }

    fn probe_path(&self, identity: &str) -> String {
        routes::typed_table(identity, self.spec.pinot_table_type)
    }

    fn create_route(&self) -> (Method, String) {
        (Method::POST, routes::TABLES.to_string())
    }

    fn update_route(&self, identity: &str) -> (Method, String) {
        (Method::PUT, routes::table(identity))
    }

    fn delete_path(&self, identity: &str) -> String {
        routes::typed_table(identity, self.spec.pinot_table_type)
    }

    /// The controller answers with `{"OFFLINE": {...}}` or `{"REALTIME": {...}}`.
    fn interpret_probe(&self, _identity: &str, outcome: ProbeOutcome) -> ProbeOutcome {
        match outcome {
            ProbeOutcome::Present(Some(body)) => {
                match body.get(self.spec.pinot_table_type.response_key()) {
                    Some(section) => ProbeOutcome::Present(Some(section.clone())),
                    None => ProbeOutcome::Absent,
                }
            }
            other => other,
        }
    }
}

impl LogicalResource for PinotTenant {
    const KIND: &'static str = "pinottenant";
    const IDENTITY_FIELD: &'static str = "tenantName";
    const FINALIZER: &'static str = TENANT_FINALIZER;

    fn cluster_name(&self) -> &str {
        &self.spec.pinot_cluster
    }

    fn document(&self) -> &str {
        &self.spec.tenants_json
    }

    fn admin_status(&self) -> Option<&LogicalResourceStatus> {
        self.status.as_ref()
    }

    fn admin_status_mut(&mut self) -> &mut Option<LogicalResourceStatus> {
        &mut self.status
    }

    fn probe_path(&self, _identity: &str) -> String {
        routes::TENANTS.to_string()
    }

    fn create_route(&self) -> (Method, String) {
        (Method::POST, routes::TENANTS.to_string())
    }

    fn update_route(&self, _identity: &str) -> (Method, String) {
        (Method::PUT, routes::TENANTS.to_string())
    }

    fn delete_path(&self, identity: &str) -> String {
        routes::tenant_delete(identity, self.spec.pinot_tenant_type)
    }

    /// The tenant listing only tells membership; there is no document to adopt.
    fn interpret_probe(&self, identity: &str, outcome: ProbeOutcome) -> ProbeOutcome {
        match outcome {
            ProbeOutcome::Present(body) => {
                let listed = body
                    .as_ref()
                    .and_then(|b| b.get(self.spec.pinot_tenant_type.listing_key()))
                    .and_then(Value::as_array)
                    .is_some_and(|names| names.iter().any(|n| n.as_str() == Some(identity)));
                if listed {
                    ProbeOutcome::Present(None)
                } else {
                    ProbeOutcome::Absent
                }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{PinotTableSpec, PinotTenantSpec, TableType, TenantType};
    use serde_json::json;

    fn table(table_type: TableType) -> PinotTable {
        PinotTable::new(
            "t1",
            PinotTableSpec {
                pinot_cluster: "c1".to_string(),
                pinot_table_type: table_type,
                segment_reload: false,
                tables_json: r#"{"tableName":"t1"}"#.to_string(),
            },
        )
    }

    fn tenant(tenant_type: TenantType) -> PinotTenant {
        PinotTenant::new(
            "sales",
            PinotTenantSpec {
                pinot_cluster: "c1".to_string(),
                pinot_tenant_type: tenant_type,
                tenants_json: r#"{"tenantName":"sales"}"#.to_string(),
            },
        )
    }

    #[test]
    fn test_table_probe_adopts_matching_section() {
        let offline = table(TableType::Offline);
        let body = json!({"OFFLINE": {"tableName": "t1_OFFLINE"}});
        assert_eq!(
            offline.interpret_probe("t1", ProbeOutcome::Present(Some(body.clone()))),
            ProbeOutcome::Present(Some(json!({"tableName": "t1_OFFLINE"})))
        );

        let realtime = table(TableType::Realtime);
        assert_eq!(
            realtime.interpret_probe("t1", ProbeOutcome::Present(Some(body))),
            ProbeOutcome::Absent
        );
    }

    #[test]
    fn test_table_routes_carry_type() {
        let t = table(TableType::Realtime);
        assert_eq!(t.probe_path("t1"), "/tables/t1?type=realtime");
        assert_eq!(t.delete_path("t1"), "/tables/t1?type=realtime");
        assert_eq!(t.update_route("t1"), (Method::PUT, "/tables/t1".to_string()));
    }

    #[test]
    fn test_tenant_probe_checks_membership() {
        let server = tenant(TenantType::Server);
        let body = json!({"SERVER_TENANTS": ["DefaultTenant", "sales"], "BROKER_TENANTS": []});
        assert_eq!(
            server.interpret_probe("sales", ProbeOutcome::Present(Some(body.clone()))),
            ProbeOutcome::Present(None)
        );

        let broker = tenant(TenantType::Broker);
        assert_eq!(
            broker.interpret_probe("sales", ProbeOutcome::Present(Some(body))),
            ProbeOutcome::Absent
        );
        assert_eq!(
            broker.delete_path("sales"),
            "/tenants/sales?type=BROKER"
        );
    }
}
