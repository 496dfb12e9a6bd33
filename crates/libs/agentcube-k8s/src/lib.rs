pub mod adapter;
pub mod agent_runtime_cr;
pub mod error;
pub mod naming;
pub mod pod_template;
pub mod readiness;

pub use adapter::K8sAdapter;
pub use agent_runtime_cr::{AgentRuntime, AgentRuntimePort, AgentRuntimeSpec, AgentRuntimeStatus};
pub use error::K8sAdapterError;
pub use pod_template::{
    ConfigMapMount, PodTemplateSpec, build_agent_runtime_template, build_pod, parse_entrypoint,
};
pub use readiness::{wait_for_agent_runtime_endpoint, wait_for_pod_ready};
