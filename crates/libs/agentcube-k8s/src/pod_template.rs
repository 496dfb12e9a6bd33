use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Container, ConfigMapVolumeSource, ContainerPort, EnvVar, KeyToPath, Pod, PodSpec,
    PodTemplateSpec as K8sPodTemplateSpec, ResourceRequirements, SecretVolumeSource, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Conventional in-pod path for the session's authorized-material volume
/// (§3 `PodTemplateSpec`: "a standard authorized-keys volume mount ... at a
/// conventional path").
pub const AUTHORIZED_KEYS_MOUNT_PATH: &str = "/etc/agentcube/session/authorized_keys";

const AUTHORIZED_KEYS_VOLUME_NAME: &str = "agentcube-authorized-keys";

/// One configmap-backed mount (§3 `PodTemplateSpec` configmap_items).
#[derive(Debug, Clone)]
pub struct ConfigMapMount {
    pub name: String,
    pub key: String,
    pub mount_path: String,
    pub sub_path: Option<String>,
    /// Path within the volume the key is projected to; defaults to `key`.
    pub key_path: Option<String>,
    pub read_only: bool,
}

impl ConfigMapMount {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        key: impl Into<String>,
        mount_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            mount_path: mount_path.into(),
            sub_path: None,
            key_path: None,
            read_only: true,
        }
    }
}

/// Fully determines the K8s Pod to generate for a sandbox session (§3
/// `PodTemplateSpec`).
#[derive(Debug, Clone)]
pub struct PodTemplateSpec {
    pub image: String,
    pub cpu_request: String,
    pub memory_request: String,
    pub cpu_limit: String,
    pub memory_limit: String,
    pub container_port: u16,
    pub image_pull_policy: String,
    pub env: Vec<(String, String)>,
    /// A single entrypoint string, split on whitespace: first token becomes
    /// `command`, the remainder becomes `args` (§3).
    pub entrypoint: Option<String>,
    pub configmap_mounts: Vec<ConfigMapMount>,
    /// Content for the authorized-keys volume (the session's public
    /// material), mounted read-only at [`AUTHORIZED_KEYS_MOUNT_PATH`] from a
    /// Secret named `{pod_name}-authorized-keys` that the caller is
    /// responsible for creating alongside the Pod.
    pub authorized_keys_secret_name: Option<String>,
}

impl Default for PodTemplateSpec {
    fn default() -> Self {
        Self {
            image: String::new(),
            cpu_request: "100m".into(),
            memory_request: "128Mi".into(),
            cpu_limit: "500m".into(),
            memory_limit: "512Mi".into(),
            // The Daemon's conventional port, matching PicoD's own client
            // default (`picod_client.py`'s `port: int = 9527`).
            container_port: 9527,
            image_pull_policy: "IfNotPresent".into(),
            env: Vec::new(),
            entrypoint: None,
            configmap_mounts: Vec::new(),
            authorized_keys_secret_name: None,
        }
    }
}

/// Split a single entrypoint string into `(command, args)` by whitespace
/// (§3): first token is the command, the remainder are args.
#[must_use]
pub fn parse_entrypoint(entrypoint: &str) -> (Option<String>, Vec<String>) {
    let mut tokens = entrypoint.split_whitespace();
    let command = tokens.next().map(str::to_owned);
    let args = tokens.map(str::to_owned).collect();
    (command, args)
}

/// Build the K8s Pod object for a sandbox session (§3, §4.1). `name` and
/// `namespace` must already be DNS-1123 normalized — this function performs
/// no normalization itself.
///
/// Invariant (§3): every ConfigMap referenced by `spec.configmap_mounts`
/// MUST already exist in `namespace` — the caller (Control-Plane Manager,
/// §4.5 step 3) is responsible for materializing them first.
#[must_use]
pub fn build_pod(
    name: &str,
    namespace: &str,
    labels: BTreeMap<String, String>,
    spec: &PodTemplateSpec,
) -> Pod {
    let (command, args) = spec
        .entrypoint
        .as_deref()
        .map(parse_entrypoint)
        .unwrap_or((None, Vec::new()));

    let mut volumes = Vec::new();
    let mut volume_mounts = Vec::new();

    for mount in &spec.configmap_mounts {
        let volume_name = format!("cm-{}", mount.name);
        if !volumes.iter().any(|v: &Volume| v.name == volume_name) {
            volumes.push(Volume {
                name: volume_name.clone(),
                config_map: Some(ConfigMapVolumeSource {
                    name: mount.name.clone(),
                    items: Some(vec![KeyToPath {
                        key: mount.key.clone(),
                        path: mount.key_path.clone().unwrap_or_else(|| mount.key.clone()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
                ..Default::default()
            });
        }
        volume_mounts.push(VolumeMount {
            name: volume_name,
            mount_path: mount.mount_path.clone(),
            sub_path: mount.sub_path.clone(),
            read_only: Some(mount.read_only),
            ..Default::default()
        });
    }

    if let Some(secret_name) = &spec.authorized_keys_secret_name {
        volumes.push(Volume {
            name: AUTHORIZED_KEYS_VOLUME_NAME.into(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(secret_name.clone()),
                ..Default::default()
            }),
            ..Default::default()
        });
        volume_mounts.push(VolumeMount {
            name: AUTHORIZED_KEYS_VOLUME_NAME.into(),
            mount_path: AUTHORIZED_KEYS_MOUNT_PATH.into(),
            read_only: Some(true),
            ..Default::default()
        });
    }

    let env: Vec<EnvVar> = spec
        .env
        .iter()
        .map(|(k, v)| EnvVar {
            name: k.clone(),
            value: Some(v.clone()),
            ..Default::default()
        })
        .collect();

    let container = Container {
        name: "sandbox".into(),
        image: Some(spec.image.clone()),
        image_pull_policy: Some(spec.image_pull_policy.clone()),
        command: command.map(|c| vec![c]),
        args: if args.is_empty() { None } else { Some(args) },
        env: if env.is_empty() { None } else { Some(env) },
        ports: Some(vec![k8s_openapi::api::core::v1::ContainerPort {
            container_port: i32::from(spec.container_port),
            ..Default::default()
        }]),
        volume_mounts: if volume_mounts.is_empty() {
            None
        } else {
            Some(volume_mounts)
        },
        resources: Some(ResourceRequirements {
            requests: Some(BTreeMap::from([
                ("cpu".into(), Quantity(spec.cpu_request.clone())),
                ("memory".into(), Quantity(spec.memory_request.clone())),
            ])),
            limits: Some(BTreeMap::from([
                ("cpu".into(), Quantity(spec.cpu_limit.clone())),
                ("memory".into(), Quantity(spec.memory_limit.clone())),
            ])),
            ..Default::default()
        }),
        ..Default::default()
    };

    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            namespace: Some(namespace.to_owned()),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(PodSpec {
            restart_policy: Some("Never".into()),
            containers: vec![container],
            volumes: if volumes.is_empty() { None } else { Some(volumes) },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the `spec.template` an `AgentRuntime` CR carries (§6
/// `spec.template.spec.containers[]`): a single `runtime` container, OCI-ish
/// and simpler than [`build_pod`]'s sandbox Pod — no configmap/authorized-
/// keys volumes, since the Agent Runtime flavor never bootstraps (§4.5) and
/// the reconciling operator owns the rest of the Deployment shape. Grounded
/// on the out-of-scope CLI's own AgentRuntime manifest construction
/// (`restartPolicy: Always`, container named `runtime`).
#[must_use]
pub fn build_agent_runtime_template(labels: BTreeMap<String, String>, spec: &PodTemplateSpec) -> K8sPodTemplateSpec {
    let (command, args) = spec
        .entrypoint
        .as_deref()
        .map(parse_entrypoint)
        .unwrap_or((None, Vec::new()));

    let env: Vec<EnvVar> = spec
        .env
        .iter()
        .map(|(k, v)| EnvVar {
            name: k.clone(),
            value: Some(v.clone()),
            ..Default::default()
        })
        .collect();

    let container = Container {
        name: "runtime".into(),
        image: Some(spec.image.clone()),
        image_pull_policy: Some(spec.image_pull_policy.clone()),
        command: command.map(|c| vec![c]),
        args: if args.is_empty() { None } else { Some(args) },
        env: if env.is_empty() { None } else { Some(env) },
        ports: Some(vec![ContainerPort {
            name: Some("http".into()),
            container_port: i32::from(spec.container_port),
            protocol: Some("TCP".into()),
            ..Default::default()
        }]),
        ..Default::default()
    };

    K8sPodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            restart_policy: Some("Always".into()),
            containers: vec![container],
            ..Default::default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entrypoint_splits_on_whitespace() {
        let (cmd, args) = parse_entrypoint("python3 -u /app/main.py --flag value");
        assert_eq!(cmd.as_deref(), Some("python3"));
        assert_eq!(args, vec!["-u", "/app/main.py", "--flag", "value"]);
    }

    #[test]
    fn entrypoint_single_token_has_no_args() {
        let (cmd, args) = parse_entrypoint("bash");
        assert_eq!(cmd.as_deref(), Some("bash"));
        assert!(args.is_empty());
    }

    #[test]
    fn empty_entrypoint_has_no_command() {
        let (cmd, args) = parse_entrypoint("");
        assert!(cmd.is_none());
        assert!(args.is_empty());
    }

    fn base_spec() -> PodTemplateSpec {
        PodTemplateSpec {
            image: "agentcube/daemon:latest".into(),
            ..Default::default()
        }
    }

    #[test]
    fn pod_name_and_namespace_are_set_verbatim() {
        let pod = build_pod("sess-abc123", "agentcube-sandboxes", BTreeMap::new(), &base_spec());
        assert_eq!(pod.metadata.name.as_deref(), Some("sess-abc123"));
        assert_eq!(
            pod.metadata.namespace.as_deref(),
            Some("agentcube-sandboxes")
        );
    }

    #[test]
    fn restart_policy_never() {
        let pod = build_pod("sess", "ns", BTreeMap::new(), &base_spec());
        assert_eq!(pod.spec.unwrap().restart_policy.as_deref(), Some("Never"));
    }

    #[test]
    fn container_port_is_set() {
        let mut spec = base_spec();
        spec.container_port = 9090;
        let pod = build_pod("sess", "ns", BTreeMap::new(), &spec);
        let ports = pod.spec.unwrap().containers[0].ports.clone().unwrap();
        assert_eq!(ports[0].container_port, 9090);
    }

    #[test]
    fn configmap_mount_creates_volume_and_mount() {
        let mut spec = base_spec();
        spec.configmap_mounts.push(ConfigMapMount::new(
            "session-config",
            "init.sh",
            "/etc/agentcube/init.sh",
        ));
        let pod = build_pod("sess", "ns", BTreeMap::new(), &spec);
        let pod_spec = pod.spec.unwrap();
        let volumes = pod_spec.volumes.unwrap();
        assert_eq!(volumes.len(), 1);
        assert_eq!(
            volumes[0].config_map.as_ref().unwrap().name,
            "session-config"
        );
        let mounts = pod_spec.containers[0].volume_mounts.clone().unwrap();
        assert_eq!(mounts[0].mount_path, "/etc/agentcube/init.sh");
        assert_eq!(mounts[0].read_only, Some(true));
    }

    #[test]
    fn authorized_keys_mounted_at_conventional_path() {
        let mut spec = base_spec();
        spec.authorized_keys_secret_name = Some("sess-authorized-keys".into());
        let pod = build_pod("sess", "ns", BTreeMap::new(), &spec);
        let pod_spec = pod.spec.unwrap();
        let mounts = pod_spec.containers[0].volume_mounts.clone().unwrap();
        let auth_mount = mounts
            .iter()
            .find(|m| m.mount_path == AUTHORIZED_KEYS_MOUNT_PATH)
            .unwrap();
        assert_eq!(auth_mount.read_only, Some(true));
    }

    #[test]
    fn resource_limits_set_from_spec() {
        let mut spec = base_spec();
        spec.cpu_limit = "1".into();
        spec.memory_limit = "1Gi".into();
        let pod = build_pod("sess", "ns", BTreeMap::new(), &spec);
        let resources = pod.spec.unwrap().containers[0].resources.clone().unwrap();
        let limits = resources.limits.unwrap();
        assert_eq!(limits["cpu"], Quantity("1".into()));
        assert_eq!(limits["memory"], Quantity("1Gi".into()));
    }

    #[test]
    fn entrypoint_override_sets_command_and_args() {
        let mut spec = base_spec();
        spec.entrypoint = Some("python3 -c print(1)".into());
        let pod = build_pod("sess", "ns", BTreeMap::new(), &spec);
        let container = &pod.spec.unwrap().containers[0];
        assert_eq!(container.command.as_deref(), Some(&["python3".to_owned()][..]));
        assert_eq!(
            container.args.as_deref(),
            Some(&["-c".to_owned(), "print(1)".to_owned()][..])
        );
    }

    #[test]
    fn agent_runtime_template_uses_restart_always_and_runtime_container_name() {
        let template = build_agent_runtime_template(BTreeMap::new(), &base_spec());
        let pod_spec = template.spec.unwrap();
        assert_eq!(pod_spec.restart_policy.as_deref(), Some("Always"));
        assert_eq!(pod_spec.containers[0].name, "runtime");
    }

    #[test]
    fn agent_runtime_template_exposes_named_http_port() {
        let mut spec = base_spec();
        spec.container_port = 8080;
        let template = build_agent_runtime_template(BTreeMap::new(), &spec);
        let ports = template.spec.unwrap().containers[0].ports.clone().unwrap();
        assert_eq!(ports[0].name.as_deref(), Some("http"));
        assert_eq!(ports[0].container_port, 8080);
    }
}
