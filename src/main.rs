//! Pinot Kubernetes Operator
//!
//! Manages Pinot clusters and their schemas, tables and tenants.
//!
//! ## Usage
//!
//! ```bash
//! # Run the operator (requires kubeconfig)
//! pinot-operator
//!
//! # Requeue every 30s and ignore kube-system
//! RECONCILE_WAIT=30s DENY_LIST=kube-system pinot-operator
//!
//! # Print the CRDs for installation
//! pinot-operator --print-crds | kubectl apply -f -
//! ```

use clap::Parser;
use kube::Client;
use pinot_operator::admin::AdminApi;
use pinot_operator::crd::all_crds;
use pinot_operator::events::KubeEventPublisher;
use pinot_operator::external::{KubeClusterDirectory, KubeResourceStore};
use pinot_operator::leader_election::{self, LeaderElector};
use pinot_operator::{
    HttpAdminClient, OperatorConfig, PinotController, PinotSchema, PinotTable, PinotTenant,
    ResourceController, SchemaReloadWatcher, TableReloader,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Pinot Kubernetes Operator
#[derive(Parser, Debug)]
#[command(name = "pinot-operator")]
#[command(version, about = "Kubernetes Operator for Apache Pinot")]
struct Args {
    /// Enable leader election for HA deployments
    #[arg(long, default_value = "false")]
    leader_election: bool,

    /// Namespace for the leader election Lease (auto-detected if empty)
    #[arg(long, default_value = "")]
    leader_election_namespace: String,

    /// Namespace to watch (empty for all namespaces)
    #[arg(long, env = "WATCH_NAMESPACE", default_value = "")]
    namespace: String,

    /// Requeue interval after every reconcile, e.g. `10s`
    #[arg(long, env = "RECONCILE_WAIT")]
    reconcile_wait: Option<String>,

    /// Comma separated namespaces that are never reconciled
    #[arg(long, env = "DENY_LIST")]
    deny_list: Option<String>,

    /// Timeout for calls to Pinot controllers
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
    admin_timeout: Duration,

    /// Print the CRDs as YAML and exit
    #[arg(long)]
    print_crds: bool,
}

fn spawn<F>(name: &'static str, fut: F) -> JoinHandle<()>
where
    F: std::future::Future<Output = pinot_operator::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            error!("{} error: {}", name, e);
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_crds {
        for crd in all_crds() {
            print!("---\n{}", serde_yaml::to_string(&crd)?);
        }
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let watch_namespace = (!args.namespace.is_empty()).then(|| args.namespace.clone());
    let config = OperatorConfig::from_raw(
        args.reconcile_wait.as_deref(),
        args.deny_list.as_deref(),
        watch_namespace,
    )?;

    info!("Starting Pinot Kubernetes Operator");
    info!(
        reconcile_wait = ?config.reconcile_wait,
        deny_list = ?config.deny_list,
        namespace = config.watch_namespace.as_deref().unwrap_or("all"),
        leader_election = args.leader_election,
        "Operator configuration"
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    let elector = if args.leader_election {
        let ns = leader_election::detect_namespace(&args.leader_election_namespace);
        info!("Leader election namespace: {}", ns);
        let elector = LeaderElector::new(client.clone(), &ns);
        elector.acquire().await?;
        Some(Arc::new(elector))
    } else {
        None
    };

    let admin: Arc<dyn AdminApi> = Arc::new(HttpAdminClient::new(args.admin_timeout)?);

    let pinot_controller = Arc::new(PinotController::new(client.clone(), config.clone()));
    let schema_controller = Arc::new(ResourceController::<PinotSchema>::new(
        client.clone(),
        config.clone(),
        Arc::clone(&admin),
    ));
    let table_controller = Arc::new(ResourceController::<PinotTable>::new(
        client.clone(),
        config.clone(),
        Arc::clone(&admin),
    ));
    let tenant_controller = Arc::new(ResourceController::<PinotTenant>::new(
        client.clone(),
        config.clone(),
        Arc::clone(&admin),
    ));
    let reload_watcher = Arc::new(SchemaReloadWatcher::new(
        client.clone(),
        config.clone(),
        TableReloader::new(
            Arc::clone(&admin),
            Arc::new(KubeClusterDirectory::new(client.clone())),
            Arc::new(KubeResourceStore::<PinotTable>::new(client.clone())),
            Arc::new(KubeEventPublisher::new(client.clone(), "pinottable-controller")),
        ),
    ));

    let pinot_handle = spawn("Pinot controller", pinot_controller.run());
    let schema_handle = spawn("PinotSchema controller", schema_controller.run());
    let table_handle = spawn("PinotTable controller", table_controller.run());
    let tenant_handle = spawn("PinotTenant controller", tenant_controller.run());
    let reload_handle = spawn("Schema reload watcher", reload_watcher.run());

    // No-op future when leader election is disabled
    let elector_for_renew = elector.clone();
    let renew_handle = tokio::spawn(async move {
        match elector_for_renew {
            Some(e) => loop {
                tokio::time::sleep(e.renew_interval()).await;
                match e.renew().await {
                    Ok(true) => {}
                    Ok(false) => {
                        error!("Lost leader lease");
                        break;
                    }
                    Err(err) => {
                        error!("Failed to renew leader lease: {}", err);
                        break;
                    }
                }
            },
            None => std::future::pending::<()>().await,
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = pinot_handle => {
            if let Err(e) = result {
                error!("Pinot controller task failed: {}", e);
            }
        }
        result = schema_handle => {
            if let Err(e) = result {
                error!("PinotSchema controller task failed: {}", e);
            }
        }
        result = table_handle => {
            if let Err(e) = result {
                error!("PinotTable controller task failed: {}", e);
            }
        }
        result = tenant_handle => {
            if let Err(e) = result {
                error!("PinotTenant controller task failed: {}", e);
            }
        }
        result = reload_handle => {
            if let Err(e) = result {
                error!("Schema reload watcher task failed: {}", e);
            }
        }
        _ = renew_handle => {
            error!("Leader lease lost, initiating shutdown");
        }
    }

    if let Some(e) = &elector {
        e.release().await;
    }

    info!("Pinot Operator shutting down");
    Ok(())
}
