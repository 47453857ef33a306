//! Pinot controller REST paths.

use crate::crd::{TableType, TenantType};

pub const SCHEMAS: &str = "/schemas";
pub const TABLES: &str = "/tables";
pub const TENANTS: &str = "/tenants";

/// `GET`, `PUT` and `DELETE` target for one schema
pub fn schema(name: &str) -> String {
    format!("{}/{}", SCHEMAS, name)
}

/// Probe and delete target for one table; the type selects the physical table
pub fn typed_table(name: &str, table_type: TableType) -> String {
    format!("{}/{}?type={}", TABLES, name, table_type.query_value())
}

/// `PUT` target for one table config
pub fn table(name: &str) -> String {
    format!("{}/{}", TABLES, name)
}

pub fn table_reload(name: &str) -> String {
    format!("{}/{}/segments/reload", TABLES, name)
}

pub fn tenant_delete(name: &str, tenant_type: TenantType) -> String {
    format!("{}/{}?type={}", TENANTS, name, tenant_type.query_value())
}
