use std::collections::BTreeMap;

use agentcube_k8s::{ConfigMapMount, PodTemplateSpec};

use crate::error::ApiError;
use crate::session::types::PodTemplateRequest;

/// Labels applied to every resource a session owns, so a cluster operator
/// can `kubectl get pods -l agentcube.dev/session-id=...` for diagnostics.
pub fn session_labels(session_id: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("agentcube.dev/session-id".to_owned(), session_id.to_owned()),
        ("agentcube.dev/managed-by".to_owned(), "agentcube-control-plane".to_owned()),
    ])
}

/// Translate the HTTP-facing [`PodTemplateRequest`] into the K8s Adapter's
/// [`PodTemplateSpec`], resolving each configmap item's inline `value` (the
/// `file_path` alternative is a control-plane-local convenience for
/// operator-supplied templates and is read eagerly here).
pub fn build_pod_template_spec(
    request: &PodTemplateRequest,
    authorized_keys_secret_name: Option<String>,
) -> Result<PodTemplateSpec, ApiError> {
    let mut spec = PodTemplateSpec {
        image: request.image.clone(),
        container_port: request.container_port,
        env: request.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        entrypoint: request.entrypoint.clone(),
        authorized_keys_secret_name,
        ..PodTemplateSpec::default()
    };
    if let Some(v) = &request.cpu_request {
        spec.cpu_request = v.clone();
    }
    if let Some(v) = &request.memory_request {
        spec.memory_request = v.clone();
    }
    if let Some(v) = &request.cpu_limit {
        spec.cpu_limit = v.clone();
    }
    if let Some(v) = &request.memory_limit {
        spec.memory_limit = v.clone();
    }
    if let Some(v) = &request.image_pull_policy {
        spec.image_pull_policy = v.clone();
    }

    for item in &request.configmap_items {
        let mut mount = ConfigMapMount::new(item.name.clone(), item.key.clone(), item.mount_path.clone());
        mount.sub_path = item.sub_path.clone();
        mount.key_path = item.key_path.clone();
        mount.read_only = item.read_only;
        spec.configmap_mounts.push(mount);
    }

    Ok(spec)
}

/// Resolve a configmap item's content: either the inline `value`, or read
/// from `file_path` on the control-plane's local filesystem (operator
/// templates checked in alongside the deployment), never both.
pub fn resolve_configmap_value(
    item: &crate::session::types::ConfigMapItem,
) -> Result<String, ApiError> {
    match (&item.value, &item.file_path) {
        (Some(value), _) => Ok(value.clone()),
        (None, Some(path)) => std::fs::read_to_string(path)
            .map_err(|e| ApiError::Configuration(format!("cannot read {path}: {e}"))),
        (None, None) => Err(ApiError::Configuration(format!(
            "configmap item {} has neither value nor filePath",
            item.name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::ConfigMapItem;

    fn base_request() -> PodTemplateRequest {
        PodTemplateRequest {
            image: "agentcube/daemon:latest".into(),
            cpu_request: None,
            memory_request: None,
            cpu_limit: None,
            memory_limit: None,
            container_port: 9527,
            image_pull_policy: None,
            env: BTreeMap::new(),
            entrypoint: None,
            configmap_items: Vec::new(),
        }
    }

    #[test]
    fn builds_spec_with_defaults() {
        let spec = build_pod_template_spec(&base_request(), None).unwrap();
        assert_eq!(spec.image, "agentcube/daemon:latest");
        assert_eq!(spec.container_port, 9527);
    }

    #[test]
    fn configmap_items_become_mounts() {
        let mut req = base_request();
        req.configmap_items.push(ConfigMapItem {
            name: "cfg".into(),
            key: "init.sh".into(),
            value: Some("echo hi".into()),
            file_path: None,
            mount_path: "/etc/init.sh".into(),
            sub_path: None,
            key_path: None,
            read_only: true,
        });
        let spec = build_pod_template_spec(&req, None).unwrap();
        assert_eq!(spec.configmap_mounts.len(), 1);
        assert_eq!(spec.configmap_mounts[0].mount_path, "/etc/init.sh");
    }

    #[test]
    fn resolve_inline_value() {
        let item = ConfigMapItem {
            name: "cfg".into(),
            key: "k".into(),
            value: Some("hello".into()),
            file_path: None,
            mount_path: "/x".into(),
            sub_path: None,
            key_path: None,
            read_only: true,
        };
        assert_eq!(resolve_configmap_value(&item).unwrap(), "hello");
    }

    #[test]
    fn resolve_missing_both_errors() {
        let item = ConfigMapItem {
            name: "cfg".into(),
            key: "k".into(),
            value: None,
            file_path: None,
            mount_path: "/x".into(),
            sub_path: None,
            key_path: None,
            read_only: true,
        };
        assert!(resolve_configmap_value(&item).is_err());
    }
}
