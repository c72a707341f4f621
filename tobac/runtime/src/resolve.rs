use anyhow::{Context, Result};
use kube::{api::ApiResource, core::DynamicObject, Api, Client, ResourceExt};
use tobac_core::{ResourceRef, ResourceView};
use tracing::debug;

/// Reads the stored state of a resource when a review does not carry it.
///
/// The API server omits `oldObject` from some DELETE reviews; ownership is then determined from
/// the live object. A resource that no longer exists resolves to `None`.
#[async_trait::async_trait]
pub trait ResolveExisting {
    async fn resolve(&self, api: &ApiResource, resource: &ResourceRef)
        -> Result<Option<ResourceView>>;
}

/// Resolves resources through the Kubernetes API.
#[derive(Clone)]
pub struct ClusterResolver {
    client: Client,
}

impl ClusterResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ResolveExisting for ClusterResolver {
    async fn resolve(
        &self,
        api: &ApiResource,
        resource: &ResourceRef,
    ) -> Result<Option<ResourceView>> {
        let objects = match resource.namespace.as_deref() {
            Some(ns) => Api::<DynamicObject>::namespaced_with(self.client.clone(), ns, api),
            None => Api::<DynamicObject>::all_with(self.client.clone(), api),
        };

        let obj = objects
            .get_opt(&resource.name)
            .await
            .with_context(|| format!("failed to get {resource}"))?;
        debug!(%resource, found = obj.is_some(), "Resolved existing resource");

        Ok(obj.map(|obj| ResourceView::from_labels(resource.clone(), obj.labels())))
    }
}
