use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;
use kube::Api;

use crate::agent_runtime_cr::AgentRuntime;
use crate::error::K8sAdapterError;

/// Pod readiness poll (§4.1): interval and timeout for a Code Interpreter
/// sandbox pod to reach `Running`.
pub const POD_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const POD_READY_TIMEOUT: Duration = Duration::from_secs(120);

/// `AgentRuntime` endpoint poll (§4.1): the reconciled CR takes longer to
/// settle since it drives its own deployment out of process.
pub const AGENT_RUNTIME_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const AGENT_RUNTIME_READY_TIMEOUT: Duration = Duration::from_secs(300);

/// Poll a Pod until its phase is `Running`, surfacing a `Failed` phase
/// immediately with whatever exit code/reason/message the container status
/// carries (§4.1, §7 Provider errors).
pub async fn wait_for_pod_ready(api: &Api<Pod>, name: &str) -> Result<(), K8sAdapterError> {
    let deadline = tokio::time::Instant::now() + POD_READY_TIMEOUT;
    let mut last_phase = "Unknown".to_string();

    loop {
        let pod = api.get(name).await?;
        let status = pod.status.as_ref();
        let phase = status
            .and_then(|s| s.phase.as_deref())
            .unwrap_or("Unknown")
            .to_owned();
        last_phase = phase.clone();

        match phase.as_str() {
            "Running" => return Ok(()),
            "Failed" => {
                let (exit_code, message) = extract_container_failure(status);
                return Err(K8sAdapterError::Provider {
                    reason: "PodFailed".into(),
                    exit_code,
                    message,
                });
            }
            _ => {}
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(K8sAdapterError::Timeout {
                timeout_secs: POD_READY_TIMEOUT.as_secs(),
                last_phase,
            });
        }
        tokio::time::sleep(POD_POLL_INTERVAL).await;
    }
}

fn extract_container_failure(
    status: Option<&k8s_openapi::api::core::v1::PodStatus>,
) -> (Option<i32>, Option<String>) {
    let Some(container_statuses) = status.and_then(|s| s.container_statuses.as_ref()) else {
        return (None, None);
    };
    for cs in container_statuses {
        if let Some(terminated) = cs.state.as_ref().and_then(|s| s.terminated.as_ref()) {
            if terminated.exit_code != 0 {
                return (Some(terminated.exit_code), terminated.message.clone());
            }
        }
    }
    (None, None)
}

/// Poll an `AgentRuntime` CR until its status reports `Ready` with an
/// endpoint, or `Failed` (§4.1, §4.5 Agent Runtime creation algorithm).
pub async fn wait_for_agent_runtime_endpoint(
    api: &Api<AgentRuntime>,
    name: &str,
) -> Result<String, K8sAdapterError> {
    let deadline = tokio::time::Instant::now() + AGENT_RUNTIME_READY_TIMEOUT;
    let mut last_phase = "Unknown".to_string();

    loop {
        let resource = api.get(name).await?;
        let status = resource.status.unwrap_or_default();
        last_phase = if status.status.is_empty() {
            "Unknown".into()
        } else {
            status.status.clone()
        };

        if status.is_ready() {
            return Ok(status.agent_endpoint.expect("is_ready checked agent_endpoint is Some"));
        }
        if status.is_failed() {
            return Err(K8sAdapterError::Provider {
                reason: status.reason.unwrap_or_else(|| "AgentRuntimeFailed".into()),
                exit_code: None,
                message: status.message,
            });
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(K8sAdapterError::Timeout {
                timeout_secs: AGENT_RUNTIME_READY_TIMEOUT.as_secs(),
                last_phase,
            });
        }
        tokio::time::sleep(AGENT_RUNTIME_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_runtime_cr::AgentRuntimeStatus;

    #[test]
    fn ready_status_yields_endpoint() {
        let status = AgentRuntimeStatus {
            status: "Ready".into(),
            agent_endpoint: Some("http://10.0.0.5:9000".into()),
            ..Default::default()
        };
        assert!(status.is_ready());
        assert_eq!(status.agent_endpoint.as_deref(), Some("http://10.0.0.5:9000"));
    }

    #[test]
    fn extract_container_failure_finds_nonzero_exit() {
        use k8s_openapi::api::core::v1::{
            ContainerState, ContainerStateTerminated, ContainerStatus, PodStatus,
        };
        let status = PodStatus {
            container_statuses: Some(vec![ContainerStatus {
                name: "sandbox".into(),
                state: Some(ContainerState {
                    terminated: Some(ContainerStateTerminated {
                        exit_code: 137,
                        message: Some("OOMKilled".into()),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ready: false,
                restart_count: 0,
                image: String::new(),
                image_id: String::new(),
                ..Default::default()
            }]),
            ..Default::default()
        };
        let (exit_code, message) = extract_container_failure(Some(&status));
        assert_eq!(exit_code, Some(137));
        assert_eq!(message.as_deref(), Some("OOMKilled"));
    }

    #[test]
    fn extract_container_failure_none_when_no_statuses() {
        let (exit_code, message) = extract_container_failure(None);
        assert_eq!(exit_code, None);
        assert_eq!(message, None);
    }
}
