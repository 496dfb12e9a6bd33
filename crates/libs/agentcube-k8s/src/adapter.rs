use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{ConfigMap, Pod, Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};

use crate::agent_runtime_cr::{AgentRuntime, AgentRuntimeSpec};
use crate::error::K8sAdapterError;

const FIELD_MANAGER: &str = "agentcube-control-plane";

/// The public contract of the K8s Adapter (§4.1 C1): thin, typed CRUD over
/// the handful of object kinds a sandbox session needs. Callers pass
/// already-normalized names (see [`crate::naming`]); this layer does not
/// renormalize.
#[derive(Clone)]
pub struct K8sAdapter {
    client: Client,
}

impl K8sAdapter {
    /// Build a client using the standard discovery order: in-cluster
    /// service-account config first, falling back to the local kubeconfig
    /// (§4.1 "Configuration discovery"). This happens once, at construction.
    pub async fn new() -> Result<Self, K8sAdapterError> {
        let client = Client::try_default().await?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn config_maps(&self, namespace: &str) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn agent_runtimes(&self, namespace: &str) -> Api<AgentRuntime> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Typed `Api<Pod>` handle for readiness polling (§4.1), exposed so
    /// callers can drive [`crate::readiness::wait_for_pod_ready`] directly.
    #[must_use]
    pub fn pods_api(&self, namespace: &str) -> Api<Pod> {
        self.pods(namespace)
    }

    /// Typed `Api<AgentRuntime>` handle for endpoint polling (§4.1).
    #[must_use]
    pub fn agent_runtimes_api(&self, namespace: &str) -> Api<AgentRuntime> {
        self.agent_runtimes(namespace)
    }

    /// Fetch a Pod by name, mapping a 404 to `Ok(None)` rather than an
    /// error — most callers treat "doesn't exist" as a routine case.
    pub async fn read_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, K8sAdapterError> {
        match self.pods(namespace).get(name).await {
            Ok(pod) => Ok(Some(pod)),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Create a Pod. A 409 from the API server is surfaced as
    /// [`K8sAdapterError::AlreadyExists`] so callers can implement
    /// idempotent re-attach (§4.5 step 1).
    pub async fn create_pod(&self, namespace: &str, pod: Pod) -> Result<Pod, K8sAdapterError> {
        let name = pod.metadata.name.clone().unwrap_or_default();
        match self.pods(namespace).create(&PostParams::default(), &pod).await {
            Ok(created) => Ok(created),
            Err(kube::Error::Api(e)) if e.code == 409 => Err(K8sAdapterError::AlreadyExists(name)),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a Pod. Idempotent: a 404 is treated as success.
    pub async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), K8sAdapterError> {
        match self.pods(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Create (or replace, via server-side apply) a single-key ConfigMap.
    /// Invariant (§3): callers must materialize referenced ConfigMaps before
    /// creating a Pod that mounts them.
    pub async fn create_configmap(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
        value: &str,
        labels: Option<BTreeMap<String, String>>,
    ) -> Result<(), K8sAdapterError> {
        let configmap = ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some(namespace.to_owned()),
                labels,
                ..Default::default()
            },
            data: Some(BTreeMap::from([(key.to_owned(), value.to_owned())])),
            ..Default::default()
        };
        self.config_maps(namespace)
            .patch(
                name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&configmap),
            )
            .await?;
        Ok(())
    }

    /// Upsert (server-side apply) the `ClusterIP` Service that fronts a
    /// sandbox Pod (§3, §4.1).
    pub async fn upsert_service(
        &self,
        namespace: &str,
        name: &str,
        selector: BTreeMap<String, String>,
        port: i32,
        target_port: i32,
    ) -> Result<Service, K8sAdapterError> {
        let service = Service {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some(namespace.to_owned()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(selector),
                ports: Some(vec![ServicePort {
                    port,
                    target_port: Some(
                        k8s_openapi::apimachinery::pkg::util::intstr::IntOrString::Int(target_port),
                    ),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let applied = self
            .services(namespace)
            .patch(
                name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&service),
            )
            .await?;
        Ok(applied)
    }

    /// Upsert the `AgentRuntime` CR for an Agent Runtime session (§4.5).
    pub async fn upsert_agent_runtime_cr(
        &self,
        namespace: &str,
        name: &str,
        spec: AgentRuntimeSpec,
    ) -> Result<AgentRuntime, K8sAdapterError> {
        let resource = AgentRuntime::new(name, spec);
        let applied = self
            .agent_runtimes(namespace)
            .patch(
                name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&resource),
            )
            .await?;
        Ok(applied)
    }

    /// Fetch the current `AgentRuntime` CR, mapping 404 to `Ok(None)`.
    pub async fn get_agent_runtime_cr(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<AgentRuntime>, K8sAdapterError> {
        match self.agent_runtimes(namespace).get(name).await {
            Ok(resource) => Ok(Some(resource)),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an `AgentRuntime` CR. Idempotent: a 404 is treated as success.
    pub async fn delete_agent_runtime_cr(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), K8sAdapterError> {
        match self
            .agent_runtimes(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
