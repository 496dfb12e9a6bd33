use std::str::FromStr;
use std::sync::Arc;

use agentcube_k8s::{AgentRuntimePort, AgentRuntimeSpec, K8sAdapter, naming};
use agentcube_types::{SandboxKind, SandboxResource, Session, SessionId, SessionKind, SessionState};
use chrono::{DateTime, Duration, Utc};
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::bootstrap::Bootstrapper;
use crate::config::{Config, DaemonAuthMode};
use crate::error::ApiError;
use crate::k8s::{build_pod_template_spec, resolve_configmap_value, session_labels};
use crate::session::types::CreateSessionRequest;
use crate::tracker::ResourceTracker;

/// Default `spec.sessionTimeout`/`spec.maxSessionDuration` for an
/// `AgentRuntime` CR (§6), matching the out-of-scope CLI's own deployment
/// manifest defaults rather than an arbitrary pick.
const DEFAULT_AGENT_RUNTIME_SESSION_TIMEOUT: &str = "15m";
const DEFAULT_AGENT_RUNTIME_MAX_SESSION_DURATION: &str = "1h";

/// Row shape of the `sessions` table. Kept distinct from
/// [`agentcube_types::Session`] since it carries the managed private key
/// (never serialized back to an HTTP client) and the normalized name used
/// for idempotent lookups.
#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    kind: String,
    namespace: String,
    normalized_name: String,
    state: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    session_public_key: Option<String>,
    session_private_key: Option<String>,
    endpoint: Option<String>,
    metadata: Json<serde_json::Value>,
}

impl SessionRow {
    fn into_session(self) -> Session {
        Session {
            id: self.id,
            kind: self.kind.parse().unwrap_or(SessionKind::CodeInterpreter),
            namespace: self.namespace,
            state: self.state.parse().unwrap_or(SessionState::Failed),
            created_at: self.created_at,
            expires_at: self.expires_at,
            last_activity_at: self.last_activity_at,
            session_public_key: self.session_public_key,
            endpoint: self.endpoint,
            metadata: self.metadata.0,
        }
    }
}

/// Orchestrates C1 + C2 + C4 on behalf of session lifecycle requests (C5,
/// §4.5): the single entry point both HTTP route handlers call into.
pub struct SessionManager {
    k8s: K8sAdapter,
    tracker: Arc<ResourceTracker>,
    db: PgPool,
    bootstrapper: Option<Bootstrapper>,
    auth_mode: DaemonAuthMode,
    default_ttl_secs: i64,
}

impl SessionManager {
    pub fn new(
        k8s: K8sAdapter,
        tracker: Arc<ResourceTracker>,
        db: PgPool,
        config: &Config,
    ) -> Result<Self, ApiError> {
        let bootstrapper = if config.bootstrap_private_key_pem.is_empty() {
            None
        } else {
            Some(Bootstrapper::new(
                "agentcube-control-plane",
                &config.bootstrap_private_key_pem,
            )?)
        };
        Ok(Self {
            k8s,
            tracker,
            db,
            bootstrapper,
            auth_mode: config.daemon_auth_mode,
            default_ttl_secs: config.default_ttl_secs,
        })
    }

    /// `createSession` for the Code Interpreter flavor (§4.5 algorithm,
    /// steps 1–8, with rollback on any failure after the Pod is created).
    pub async fn create_code_interpreter(
        &self,
        request: CreateSessionRequest,
    ) -> Result<Session, ApiError> {
        crate::validation::check_name(&request.name)?;
        let ttl_secs = request.ttl_secs.unwrap_or(self.default_ttl_secs);
        crate::validation::check_ttl_secs(ttl_secs)?;

        let normalized_name = naming::normalize(&request.name);
        let namespace = request.namespace.clone();

        // Step 2: idempotent re-attach. A concurrent duplicate create lands
        // here too (S5) — the unique index on (namespace, normalized_name)
        // for active states makes the second insert race harmlessly lose.
        if let Some(existing) = self.find_active_by_name(&namespace, &normalized_name).await? {
            return Ok(existing);
        }

        let template = self.resolve_template(&request)?;

        let session_id = Uuid::new_v4();
        let labels = session_labels(&normalized_name);

        // Step 3: materialize configmaps first (invariant: they must exist
        // before the Pod that mounts them).
        for item in &template.configmap_items {
            let value = resolve_configmap_value(item)?;
            self.k8s
                .create_configmap(&namespace, &item.name, &item.key, &value, Some(labels.clone()))
                .await?;
        }

        let pod_spec = build_pod_template_spec(&template, None)?;

        // Step 4: create the Pod (AlreadyExists is treated as idempotent
        // re-attach to whatever is already there).
        let pod = agentcube_k8s::build_pod(&normalized_name, &namespace, labels, &pod_spec);
        let create_result = self.k8s.create_pod(&namespace, pod).await;
        match create_result {
            Ok(_) => {}
            Err(e) if e.is_already_exists() => {}
            Err(e) => return Err(e.into()),
        }

        let mut tracked = vec![SandboxResource::new(SandboxKind::Pod, normalized_name.clone(), namespace.clone())];
        for item in &template.configmap_items {
            tracked.push(SandboxResource::new(
                SandboxKind::ConfigMap,
                item.name.clone(),
                namespace.clone(),
            ));
        }
        for resource in &tracked {
            self.tracker.track(session_id, resource.clone());
        }

        // Step 5: readiness.
        let pods_api = self.k8s.pods_api(&namespace);
        if let Err(e) = agentcube_k8s::wait_for_pod_ready(&pods_api, &normalized_name).await {
            self.rollback(session_id, &namespace).await;
            return Err(e.into());
        }

        let pod = match self.k8s.read_pod(&namespace, &normalized_name).await {
            Ok(Some(pod)) => pod,
            Ok(None) => {
                self.rollback(session_id, &namespace).await;
                return Err(ApiError::Provider("pod disappeared after readiness".into()));
            }
            Err(e) => {
                self.rollback(session_id, &namespace).await;
                return Err(e.into());
            }
        };
        let pod_ip = pod
            .status
            .as_ref()
            .and_then(|s| s.pod_ip.clone())
            .unwrap_or_default();
        let endpoint = format!("http://{pod_ip}:{}", pod_spec.container_port);

        // Step 6: bootstrap, unless the caller supplied its own public key.
        let (session_public_key, session_private_key) = if let Some(public_key) = request.public_key
        {
            (Some(public_key), None)
        } else if self.auth_mode == DaemonAuthMode::Bootstrap {
            match self.mint_and_bootstrap(&endpoint).await {
                Ok(pair) => pair,
                Err(e) => {
                    self.rollback(session_id, &namespace).await;
                    return Err(e);
                }
            }
        } else {
            (None, None)
        };

        // Step 7/8: persist.
        let now = Utc::now();
        let session = Session {
            id: session_id,
            kind: SessionKind::CodeInterpreter,
            namespace: namespace.clone(),
            state: SessionState::Running,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_secs),
            last_activity_at: now,
            session_public_key,
            endpoint: Some(endpoint),
            metadata: request.metadata,
        };
        if let Err(e) = self
            .insert_session(&session, &normalized_name, session_private_key.as_deref())
            .await
        {
            self.rollback(session_id, &namespace).await;
            return Err(e);
        }

        Ok(session)
    }

    /// `createSession` for the Agent Runtime flavor (§4.5: upsert the CR,
    /// poll for the endpoint, write status back — no bootstrap handshake).
    pub async fn create_agent_runtime(&self, request: CreateSessionRequest) -> Result<Session, ApiError> {
        crate::validation::check_name(&request.name)?;
        let ttl_secs = request.ttl_secs.unwrap_or(self.default_ttl_secs);
        crate::validation::check_ttl_secs(ttl_secs)?;

        let normalized_name = naming::normalize(&request.name);
        let namespace = request.namespace.clone();

        if let Some(existing) = self.find_active_by_name(&namespace, &normalized_name).await? {
            return Ok(existing);
        }

        let template = self.resolve_template(&request)?;
        let pod_spec = build_pod_template_spec(&template, None)?;

        let session_id = Uuid::new_v4();
        let labels = session_labels(&session_id.to_string());
        let cr_spec = AgentRuntimeSpec {
            ports: vec![AgentRuntimePort {
                name: "http".into(),
                port: template.container_port,
                protocol: "HTTP".into(),
                path_prefix: Some("/".into()),
            }],
            template: agentcube_k8s::build_agent_runtime_template(labels, &pod_spec),
            session_timeout: DEFAULT_AGENT_RUNTIME_SESSION_TIMEOUT.into(),
            max_session_duration: DEFAULT_AGENT_RUNTIME_MAX_SESSION_DURATION.into(),
            session_public_key: request.public_key.clone(),
        };

        self.k8s
            .upsert_agent_runtime_cr(&namespace, &normalized_name, cr_spec)
            .await?;
        self.tracker.track(
            session_id,
            SandboxResource::new(SandboxKind::AgentRuntimeCr, normalized_name.clone(), namespace.clone()),
        );

        let api = self.k8s.agent_runtimes_api(&namespace);
        let now = Utc::now();
        let (endpoint, metadata) = match agentcube_k8s::wait_for_agent_runtime_endpoint(&api, &normalized_name).await
        {
            Ok(endpoint) => (Some(endpoint), request.metadata.clone()),
            Err(agentcube_k8s::K8sAdapterError::Timeout { .. }) => {
                let mut metadata = request.metadata.clone();
                if let serde_json::Value::Object(map) = &mut metadata {
                    map.insert("status".into(), serde_json::json!("endpoint_timeout"));
                }
                (None, metadata)
            }
            Err(e) => {
                self.rollback(session_id, &namespace).await;
                return Err(e.into());
            }
        };

        let session = Session {
            id: session_id,
            kind: SessionKind::AgentRuntime,
            namespace: namespace.clone(),
            state: SessionState::Running,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_secs),
            last_activity_at: now,
            session_public_key: request.public_key,
            endpoint,
            metadata,
        };
        if let Err(e) = self.insert_session(&session, &normalized_name, None).await {
            self.rollback(session_id, &namespace).await;
            return Err(e);
        }
        Ok(session)
    }

    pub async fn get_session(&self, id: SessionId) -> Result<Session, ApiError> {
        let row: Option<SessionRow> =
            sqlx::query_as("SELECT * FROM sessions WHERE id = $1 AND state != 'deleted'")
                .bind(id)
                .fetch_optional(&self.db)
                .await?;
        row.map(SessionRow::into_session)
            .ok_or_else(|| ApiError::NotFound(format!("session {id} not found")))
    }

    pub async fn list_sessions(&self, limit: i64, offset: i64) -> Result<Vec<Session>, ApiError> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            "SELECT * FROM sessions WHERE state != 'deleted' ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit.clamp(1, 500))
        .bind(offset.max(0))
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(SessionRow::into_session).collect())
    }

    /// `deleteSession` (§4.5): synchronously deletes every tracked resource.
    /// Returns `false` if the session was already gone — callers map that to
    /// 404 (§6), which well-behaved clients treat as success.
    pub async fn delete_session(&self, id: SessionId) -> Result<bool, ApiError> {
        let row: Option<SessionRow> = sqlx::query_as("SELECT * FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        let Some(row) = row else { return Ok(false) };
        if row.state == "deleted" {
            return Ok(false);
        }

        self.rollback(id, &row.namespace).await;

        sqlx::query("UPDATE sessions SET state = 'deleted' WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(true)
    }

    /// Extend a session's sliding TTL on a successful authenticated
    /// data-plane request (§4.5 TTL policy, resolved sliding in
    /// SPEC_FULL.md §4). `lastActivityAt` only ever moves forward (§8
    /// invariant 6).
    pub async fn extend_ttl(&self, id: SessionId, ttl_secs: i64) -> Result<(), ApiError> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE sessions SET last_activity_at = $2, expires_at = $3
             WHERE id = $1 AND last_activity_at < $2",
        )
        .bind(id)
        .bind(now)
        .bind(now + Duration::seconds(ttl_secs))
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Resolve the `PodTemplateRequest` to provision from, preferring an
    /// explicit `template` and falling back to `workspace_metadata` (§6) when
    /// the caller only has the CLI's persisted metadata file to hand.
    fn resolve_template(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<crate::session::types::PodTemplateRequest, ApiError> {
        if let Some(template) = &request.template {
            return Ok(template.clone());
        }
        let meta = request
            .workspace_metadata
            .as_ref()
            .ok_or_else(|| ApiError::Configuration("template or workspace_metadata is required".into()))?;
        meta.validate().map_err(ApiError::Configuration)?;
        Ok(crate::session::types::PodTemplateRequest::from_workspace_metadata(meta))
    }

    async fn find_active_by_name(
        &self,
        namespace: &str,
        normalized_name: &str,
    ) -> Result<Option<Session>, ApiError> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT * FROM sessions WHERE namespace = $1 AND normalized_name = $2
             AND state IN ('pending', 'running') LIMIT 1",
        )
        .bind(namespace)
        .bind(normalized_name)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(SessionRow::into_session))
    }

    async fn insert_session(
        &self,
        session: &Session,
        normalized_name: &str,
        session_private_key: Option<&str>,
    ) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT INTO sessions
             (id, kind, namespace, normalized_name, state, created_at, expires_at,
              last_activity_at, session_public_key, session_private_key, endpoint, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(session.id)
        .bind(session.kind.as_str())
        .bind(&session.namespace)
        .bind(normalized_name)
        .bind(session.state.as_str())
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.last_activity_at)
        .bind(&session.session_public_key)
        .bind(session_private_key)
        .bind(&session.endpoint)
        .bind(Json(&session.metadata))
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Best-effort rollback (§4.5, §8 invariant 2): delete every resource
    /// the tracker holds for `session_id`. Failures are logged, never
    /// masking the original error that triggered the rollback.
    async fn rollback(&self, session_id: SessionId, namespace: &str) {
        for resource in self.tracker.release(session_id) {
            let result = match resource.kind {
                SandboxKind::Pod => self.k8s.delete_pod(namespace, &resource.name).await,
                SandboxKind::AgentRuntimeCr => {
                    self.k8s.delete_agent_runtime_cr(namespace, &resource.name).await
                }
                // ConfigMaps and Services outlive a single failed session in
                // practice (they may be shared by template name); the
                // Pod/CR deletion above is what §8 invariant 2 requires.
                SandboxKind::ConfigMap | SandboxKind::Service => Ok(()),
            };
            if let Err(e) = result {
                tracing::warn!(
                    session_id = %session_id,
                    resource = resource.name,
                    error = %e,
                    "rollback: failed to delete resource"
                );
            }
        }
    }

    async fn mint_and_bootstrap(
        &self,
        daemon_endpoint: &str,
    ) -> Result<(Option<String>, Option<String>), ApiError> {
        let bootstrapper = self
            .bootstrapper
            .as_ref()
            .ok_or_else(|| ApiError::Configuration("bootstrap key not configured".into()))?;

        let mut rng = rand::rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("key generation failed: {e}")))?;
        let public_key = private_key.to_public_key();
        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!(e)))?
            .to_string();
        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!(e)))?;

        bootstrapper.run(daemon_endpoint, &public_pem).await?;
        Ok((Some(public_pem), Some(private_pem)))
    }
}
