//! Pinot Kubernetes Operator
//!
//! A Kubernetes operator for deploying Apache Pinot clusters and managing
//! the schemas, tables and tenants held by their controllers.
//!
//! ## Custom Resources
//!
//! - `Pinot`: Synthesizes ConfigMaps, StatefulSets/Deployments, Services and
//!   claims for every declared node
//! - `PinotSchema`: Mirrors a schema into the Pinot controller
//! - `PinotTable`: Mirrors a table config, with optional segment reload on
//!   schema updates
//! - `PinotTenant`: Mirrors a broker or server tenant
//!
//! ## Example
//!
//! ```yaml
//! apiVersion: datainfra.io/v1beta1
//! kind: PinotSchema
//! metadata:
//!   name: airline-stats
//! spec:
//!   pinotCluster: pinot
//!   schema.json: |
//!     {"schemaName": "airlineStats", "dimensionFieldSpecs": []}
//! ```

pub mod admin;
pub mod conditions;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod events;
pub mod external;
pub mod labels;
pub mod leader_election;
pub mod topology;

pub use admin::{AdminApi, HttpAdminClient};
pub use config::OperatorConfig;
pub use controllers::{PinotController, ResourceController, SchemaReloadWatcher, TableReloader};
pub use crd::{
    LogicalResourceStatus, NodeType, Pinot, PinotSchema, PinotSpec, PinotStatus, PinotTable,
    PinotTenant, TableType, TenantType,
};
pub use error::{OperatorError, Result};
