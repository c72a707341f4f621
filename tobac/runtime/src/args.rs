use crate::{
    admission::Admission,
    core::{Policy, ServiceUserTemplate},
    directory::{
        graph::{self, GraphDirectory},
        SyncMetrics, TeamCache, TeamSync,
    },
    AdmissionMetrics, ClusterResolver,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::{fmt, num::NonZeroU64, str::FromStr, sync::Arc};
use tokio::time::Duration;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "tobac", about = "Team ownership based access control for Kubernetes")]
pub struct Args {
    #[clap(long, default_value = "tobac=info,warn", env = "TOBAC_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Groups whose members may modify any resource.
    #[clap(long, default_value = "cluster-admin", env = "TOBAC_CLUSTER_ADMINS")]
    cluster_admins: List<String>,

    /// Usernames that act on behalf of a team, with `%s` in place of the team ID.
    #[clap(long, env = "TOBAC_SERVICE_USER_TEMPLATES")]
    service_user_templates: Option<List<ServiceUserTemplate>>,

    #[clap(long, default_value = "600")]
    directory_sync_interval_secs: NonZeroU64,

    #[clap(long, default_value = "5000")]
    directory_sync_timeout_ms: NonZeroU64,

    #[clap(long, env = "AZURE_TENANT")]
    azure_tenant: String,

    #[clap(long, env = "AZURE_APP_ID")]
    azure_app_id: String,

    #[clap(long, env = "AZURE_PASSWORD", hide_env_values = true)]
    azure_password: Secret,

    /// The SharePoint list holding the team catalog, relative to the Graph API's groups resource.
    #[clap(long, default_value = graph::DEFAULT_TEAM_LIST)]
    azure_team_list: String,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            cluster_admins: List(cluster_admins),
            service_user_templates,
            directory_sync_interval_secs,
            directory_sync_timeout_ms,
            azure_tenant,
            azure_app_id,
            azure_password: Secret(azure_password),
            azure_team_list,
        } = self;

        let templates = service_user_templates
            .map(|List(templates)| templates)
            .unwrap_or_default();
        let policy = Arc::new(Policy::new(cluster_admins, templates));

        let directory = GraphDirectory::new(
            graph::Credentials {
                tenant_id: azure_tenant,
                client_id: azure_app_id,
                client_secret: azure_password,
            },
            &azure_team_list,
        )
        .context("invalid directory configuration")?;

        let mut prom = <Registry>::with_prefix("tobac");
        let admission_metrics =
            AdmissionMetrics::register(prom.sub_registry_with_prefix("admission"));
        let sync_metrics = SyncMetrics::register(prom.sub_registry_with_prefix("directory"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_server(server)
            .build()
            .await?;

        info!(
            cluster_admins = ?policy.cluster_admins,
            service_users = policy.service_user_templates.len(),
            "Starting admission controller"
        );

        // Keep the team cache fresh until the runtime shuts down. Requests are served from
        // whatever snapshot is current, so the server starts without waiting for the first sync.
        let teams = TeamCache::shared();
        let sync = TeamSync::new(directory, teams.clone(), sync_metrics);
        tokio::spawn(
            sync.run(
                Duration::from_secs(directory_sync_interval_secs.get()),
                Duration::from_millis(directory_sync_timeout_ms.get()),
                runtime.shutdown_handle().signaled(),
            )
            .instrument(info_span!("directory")),
        );

        let resolver = Arc::new(ClusterResolver::new(runtime.client()));
        let runtime =
            runtime.spawn_server(Admission::new(policy, teams, resolver, admission_metrics));

        // Serve until shutdown is signaled, then wait for background tasks to finish.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

/// A comma-separated list of values.
#[derive(Clone, Debug)]
struct List<T>(Vec<T>);

impl<T> FromStr for List<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        s.split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| v.parse().map_err(Into::into))
            .collect::<Result<Vec<T>>>()
            .map(Self)
    }
}

/// A credential that is never printed.
#[derive(Clone)]
struct Secret(String);

impl FromStr for Secret {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_lists() {
        let List(groups) = "cluster-admin, platform-admins,".parse::<List<String>>().unwrap();
        assert_eq!(groups, vec!["cluster-admin", "platform-admins"]);

        let List(templates) = "serviceuser-%s,system:serviceaccount:%s:deployer"
            .parse::<List<ServiceUserTemplate>>()
            .unwrap();
        assert_eq!(
            templates.iter().map(|t| t.render("aura")).collect::<Vec<_>>(),
            vec!["serviceuser-aura", "system:serviceaccount:aura:deployer"]
        );

        assert!("serviceuser".parse::<List<ServiceUserTemplate>>().is_err());
    }

    const REQUIRED: [&str; 4] = [
        "tobac",
        "--azure-tenant=tenant",
        "--azure-app-id=app",
        "--azure-password=hunter2",
    ];

    fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(REQUIRED.iter().chain(extra))
    }

    #[test]
    fn parses_args() {
        let args = parse(&[
            "--cluster-admins=cluster-admin,ops",
            "--service-user-templates=serviceuser-%s",
        ])
        .expect("arguments must parse");
        assert_eq!(args.cluster_admins.0, vec!["cluster-admin", "ops"]);
        assert_eq!(args.directory_sync_interval_secs.get(), 600);
        assert_eq!(args.directory_sync_timeout_ms.get(), 5000);
        assert_eq!(args.azure_team_list, graph::DEFAULT_TEAM_LIST);
        assert_eq!(args.azure_password.0, "hunter2");
    }

    #[test]
    fn rejects_zero_sync_durations() {
        assert!(parse(&["--directory-sync-interval-secs=0"]).is_err());
        assert!(parse(&["--directory-sync-timeout-ms=0"]).is_err());

        let args = parse(&[
            "--directory-sync-interval-secs=1",
            "--directory-sync-timeout-ms=1",
        ])
        .expect("arguments must parse");
        assert_eq!(args.directory_sync_interval_secs.get(), 1);
    }

    #[test]
    fn debug_hides_password() {
        let args = parse(&[]).expect("arguments must parse");
        let debug = format!("{args:?}");
        assert!(!debug.contains("hunter2"), "{}", debug);
        assert!(debug.contains("Secret(..)"), "{}", debug);
    }
}
