//! Coordination hub: the shared, concurrently accessed entry point agents
//! call into.
//!
//! All hub state lives in one [`HubState`] behind a `tokio::sync::RwLock`.
//! Mutations take the write guard and flush a snapshot before releasing it,
//! so flushes land in mutation order. Embedding and nearest-neighbour search
//! never run with the guard held.

use crate::knowledge::{KnowledgeEntry, KnowledgeQuery, KnowledgeStore};
use crate::matcher::CapabilityMatcher;
use crate::performance::PerformanceTracker;
use crate::registry::AgentRegistry;
use crate::router::{Router, RoutingDecision, RoutingTask};
use crate::scorer::{Neighbor, Scorer, TaskSignals};
use concord_core::{
    Agent, AgentError, AgentId, AgentStatus, ConcordError, ConcordResult, EntityId, Extensions,
    Finding, Fix, HubConfig, Issue, IssueId, IssueStatus, NewFinding, NewFix, NewIssue,
    Notification, RecordKind, Recommendation,
};
use concord_llm::{Embedded, EmbeddingIndex, EmbeddingProvider, IndexMode, OllamaEmbeddingProvider};
use concord_storage::{HubSnapshot, JsonFileStore, SnapshotStore};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Default)]
struct HubState {
    registry: AgentRegistry,
    knowledge: KnowledgeStore,
    outbox: VecDeque<Notification>,
}

impl HubState {
    fn snapshot(&self, session_id: &str) -> HubSnapshot {
        HubSnapshot {
            session_id: session_id.to_string(),
            agents: self.registry.all().to_vec(),
            findings: self.knowledge.findings().to_vec(),
            issues: self.knowledge.issues().to_vec(),
            fixes: self.knowledge.fixes().to_vec(),
            recommendations: self.knowledge.recommendations().to_vec(),
            ..HubSnapshot::empty(session_id)
        }
    }

    fn from_snapshot(snapshot: HubSnapshot) -> Self {
        Self {
            registry: AgentRegistry::from_agents(snapshot.agents),
            knowledge: KnowledgeStore::from_parts(
                snapshot.findings,
                snapshot.issues,
                snapshot.fixes,
                snapshot.recommendations,
            ),
            outbox: VecDeque::new(),
        }
    }

    fn push_notification(&mut self, notification: Notification, capacity: usize) {
        self.outbox.push_back(notification);
        while self.outbox.len() > capacity {
            self.outbox.pop_front();
        }
    }
}

// ============================================================================
// RESULT TYPES
// ============================================================================

/// A newly reported issue together with the advisory recommendation produced for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IssueReport {
    pub issue: Issue,
    pub recommendation: Recommendation,
}

/// Point-in-time counters for the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HubSummary {
    pub session_id: String,
    pub active_agents: usize,
    pub completed_agents: usize,
    pub findings: usize,
    pub open_issues: usize,
    pub resolved_issues: usize,
    pub fixes: usize,
    pub recommendations: usize,
    pub index_live: bool,
    pub indexed_records: usize,
    pub durable: bool,
}

// ============================================================================
// BUILDER
// ============================================================================

/// Builder for [`CoordinationHub`].
pub struct HubBuilder {
    session_id: String,
    config: HubConfig,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn SnapshotStore>>,
}

impl HubBuilder {
    pub fn config(mut self, config: HubConfig) -> Self {
        self.config = config;
        self
    }

    /// Embedding backend. Without one the index starts degraded.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Snapshot store. Without one the hub is never durable.
    pub fn snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validate the configuration and build the hub.
    pub fn build(self) -> ConcordResult<CoordinationHub> {
        self.config.validate()?;

        let index = match self.provider {
            Some(provider) => EmbeddingIndex::new(provider, &self.config),
            None => EmbeddingIndex::offline(&self.config),
        };

        Ok(CoordinationHub {
            durable: AtomicBool::new(self.store.is_some()),
            session_id: self.session_id,
            config: self.config,
            state: RwLock::new(HubState::default()),
            index,
            store: self.store,
        })
    }
}

// ============================================================================
// HUB
// ============================================================================

pub struct CoordinationHub {
    session_id: String,
    config: HubConfig,
    state: RwLock<HubState>,
    index: EmbeddingIndex,
    store: Option<Arc<dyn SnapshotStore>>,
    durable: AtomicBool,
}

impl CoordinationHub {
    pub fn builder(session_id: impl Into<String>) -> HubBuilder {
        HubBuilder {
            session_id: session_id.into(),
            config: HubConfig::default(),
            provider: None,
            store: None,
        }
    }

    /// Build a hub from the environment.
    ///
    /// Reads [`HubConfig::from_env`], an Ollama backend when
    /// `CONCORD_OLLAMA_URL` is set, and a JSON file store under
    /// `CONCORD_STATE_DIR` when that is set.
    pub fn from_env(session_id: impl Into<String>) -> ConcordResult<Self> {
        let mut builder = Self::builder(session_id).config(HubConfig::from_env()?);
        if let Some(provider) = OllamaEmbeddingProvider::from_env() {
            builder = builder.embedding_provider(Arc::new(provider));
        }
        if let Ok(dir) = std::env::var("CONCORD_STATE_DIR") {
            builder = builder.snapshot_store(Arc::new(JsonFileStore::new(dir)?));
        }
        builder.build()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    /// Whether the last snapshot flush succeeded. Always false without a store.
    pub fn is_durable(&self) -> bool {
        self.store.is_some() && self.durable.load(Ordering::SeqCst)
    }

    /// Persist the current state. Awaited with the write guard held.
    async fn flush(&self, state: &HubState) {
        let Some(store) = &self.store else {
            return;
        };
        match store.save(&state.snapshot(&self.session_id)).await {
            Ok(()) => {
                if !self.durable.swap(true, Ordering::SeqCst) {
                    info!(session_id = %self.session_id, "Snapshot flush succeeded; hub durable again");
                }
            }
            Err(e) => {
                self.durable.store(false, Ordering::SeqCst);
                warn!(
                    session_id = %self.session_id,
                    error = %e,
                    "Snapshot flush failed; continuing in memory only"
                );
            }
        }
    }

    // === Agent Registry ===

    /// Register (or re-register) an agent as active.
    pub async fn register(
        &self,
        agent_id: impl Into<AgentId>,
        capabilities: Vec<String>,
        name: &str,
        agent_type: &str,
    ) -> Agent {
        let agent = Agent::new(agent_id, name, agent_type, capabilities);
        let mut state = self.state.write().await;
        let is_new = state.registry.register(agent.clone());
        info!(
            agent_id = %agent.agent_id,
            capabilities = ?agent.capabilities,
            reregistered = !is_new,
            "Agent registered"
        );
        self.flush(&state).await;
        agent
    }

    /// Mark an agent completed. Returns false if it is unknown or already completed.
    pub async fn unregister(&self, agent_id: &AgentId) -> bool {
        let mut state = self.state.write().await;
        let changed = state.registry.unregister(agent_id);
        if changed {
            info!(agent_id = %agent_id, "Agent unregistered");
            self.flush(&state).await;
        }
        changed
    }

    pub async fn active_agents(&self) -> Vec<Agent> {
        self.state.read().await.registry.active().cloned().collect()
    }

    pub async fn agents(&self) -> Vec<Agent> {
        self.state.read().await.registry.all().to_vec()
    }

    pub async fn agent(&self, agent_id: &AgentId) -> ConcordResult<Agent> {
        self.state
            .read()
            .await
            .registry
            .get(agent_id)
            .cloned()
            .ok_or_else(|| {
                ConcordError::Agent(AgentError::NotRegistered {
                    agent_id: agent_id.clone(),
                })
            })
    }

    // === Knowledge Store ===

    /// Record a finding, notify interested agents and index its text.
    pub async fn share_finding(&self, agent_id: impl Into<AgentId>, new: NewFinding) -> Finding {
        let agent_id = agent_id.into();
        let finding = Finding::from_new(agent_id.clone(), new);

        {
            let mut state = self.state.write().await;
            state.knowledge.add_finding(finding.clone());

            let labels: Vec<&str> = finding.topic_labels().collect();
            let notifications: Vec<Notification> = state
                .registry
                .active()
                .filter(|a| a.agent_id != agent_id)
                .filter_map(|a| {
                    let matched = CapabilityMatcher::intersect(a, labels.iter().copied());
                    (!matched.is_empty()).then(|| {
                        Notification::new(
                            a.agent_id.clone(),
                            agent_id.clone(),
                            finding.finding_id,
                            matched,
                        )
                    })
                })
                .collect();
            if !notifications.is_empty() {
                debug!(
                    finding_id = %finding.finding_id,
                    recipients = notifications.len(),
                    "Finding notifications queued"
                );
            }
            for notification in notifications {
                state.push_notification(notification, self.config.notification_capacity);
            }

            self.flush(&state).await;
        }

        let text = finding.embedding_text();
        let vector = self.index.embed(&text).await;
        self.index.store(
            finding.finding_id,
            RecordKind::Finding,
            vector,
            &text,
            record_metadata(
                &finding.agent_id,
                finding.category.as_deref(),
                finding.file_path.as_deref(),
            ),
        );

        finding
    }

    /// Record an open issue, index it and store an advisory recommendation.
    /// Nothing is assigned automatically.
    pub async fn report_issue(&self, agent_id: impl Into<AgentId>, new: NewIssue) -> IssueReport {
        let issue = Issue::from_new(agent_id.into(), new);

        {
            let mut state = self.state.write().await;
            state.knowledge.add_issue(issue.clone());
            self.flush(&state).await;
        }

        let text = issue.embedding_text();
        let embedded = self.index.embed_with_mode(&text).await;
        self.index.store(
            issue.issue_id,
            RecordKind::Issue,
            embedded.vector.clone(),
            &text,
            record_metadata(
                &issue.agent_id,
                issue.category.as_deref(),
                issue.file_path.as_deref(),
            ),
        );

        let decision = self
            .route(
                &RoutingTask::from_issue(&issue),
                Some(embedded),
                self.config.dispatch_min_confidence,
                self.config.max_candidates,
            )
            .await;

        let recommendation = Recommendation::new(
            issue.issue_id,
            decision.agent_id,
            decision.confidence,
            decision.reason,
            decision.justification,
            decision.alternatives,
        );

        {
            let mut state = self.state.write().await;
            state.knowledge.add_recommendation(recommendation.clone());
            self.flush(&state).await;
        }

        IssueReport {
            issue,
            recommendation,
        }
    }

    /// Record a fix. A fix referencing an open issue resolves it; any other
    /// reference is ignored.
    pub async fn report_fix(&self, agent_id: impl Into<AgentId>, new: NewFix) -> Fix {
        let fix = Fix::from_new(agent_id.into(), new);
        let mut state = self.state.write().await;
        if let Some(issue_id) = state.knowledge.add_fix(fix.clone()) {
            info!(
                issue_id = %issue_id,
                fix_id = %fix.fix_id,
                agent_id = %fix.agent_id,
                "Issue resolved"
            );
        }
        self.flush(&state).await;
        fix
    }

    /// Record that the orchestrator handed an open issue to an agent.
    pub async fn assign_issue(&self, issue_id: IssueId, agent_id: impl Into<AgentId>) -> bool {
        let agent_id = agent_id.into();
        let mut state = self.state.write().await;
        let assigned = state.knowledge.assign(issue_id, agent_id.clone());
        if assigned {
            debug!(issue_id = %issue_id, agent_id = %agent_id, "Issue assigned");
            self.flush(&state).await;
        }
        assigned
    }

    pub async fn issue(&self, issue_id: IssueId) -> ConcordResult<Issue> {
        self.state
            .read()
            .await
            .knowledge
            .issue(issue_id)
            .cloned()
            .ok_or(ConcordError::Agent(AgentError::RecordNotFound {
                kind: RecordKind::Issue,
                id: issue_id,
            }))
    }

    pub async fn query(&self, query: &KnowledgeQuery) -> Vec<KnowledgeEntry> {
        self.state.read().await.knowledge.query(query)
    }

    pub async fn recommendations(&self) -> Vec<Recommendation> {
        self.state.read().await.knowledge.recommendations().to_vec()
    }

    pub async fn recommendations_for(&self, issue_id: IssueId) -> Vec<Recommendation> {
        self.state.read().await.knowledge.recommendations_for(issue_id)
    }

    /// Notifications addressed to `agent_id`, oldest first.
    pub async fn notifications(&self, agent_id: &AgentId) -> Vec<Notification> {
        self.state
            .read()
            .await
            .outbox
            .iter()
            .filter(|n| &n.recipient == agent_id)
            .cloned()
            .collect()
    }

    // === Routing ===

    /// Route `task` over the active agents without recording anything.
    pub async fn recommend(
        &self,
        task: &RoutingTask,
        min_confidence: f32,
        max_candidates: usize,
    ) -> RoutingDecision {
        self.route(task, None, min_confidence, max_candidates).await
    }

    /// Exploratory "which agent for this task" query at the lower threshold.
    pub async fn suggest_agent(&self, task: &RoutingTask) -> RoutingDecision {
        self.route(
            task,
            None,
            self.config.explore_min_confidence,
            self.config.max_candidates,
        )
        .await
    }

    async fn route(
        &self,
        task: &RoutingTask,
        embedded: Option<Embedded>,
        min_confidence: f32,
        max_candidates: usize,
    ) -> RoutingDecision {
        let (agents, performance, resolvers) = {
            let state = self.state.read().await;
            let issues = state.knowledge.issues();
            let resolvers: HashMap<IssueId, AgentId> = issues
                .iter()
                .filter_map(|i| i.resolved_by.clone().map(|a| (i.issue_id, a)))
                .collect();
            (
                state.registry.active().cloned().collect::<Vec<_>>(),
                PerformanceTracker::from_issues(issues),
                resolvers,
            )
        };

        let mut signals = TaskSignals {
            required_capability: task.required_capability.clone(),
            semantic_available: false,
            neighbors: Vec::new(),
            performance,
        };

        if self.index.is_live() {
            let embedded = match embedded {
                Some(embedded) => embedded,
                None => self.index.embed_with_mode(&task.text()).await,
            };
            if embedded.is_live() {
                signals.semantic_available = true;
                signals.neighbors = self
                    .index
                    .search_where(&embedded.vector, self.config.semantic_neighbors, |r| {
                        r.kind == RecordKind::Issue && Some(r.record_id) != task.issue_id
                    })
                    .into_iter()
                    .map(|hit| Neighbor {
                        resolved_by: resolvers.get(&hit.record_id).cloned(),
                        issue_id: hit.record_id,
                        similarity: hit.score,
                    })
                    .collect();
            }
        }

        let router = Router::new(Scorer::new(
            self.config.weights,
            &self.config.capability_graph,
        ));
        router.recommend(&agents, &signals, min_confidence, max_candidates)
    }

    // === Persistence ===

    /// Current state as a snapshot.
    pub async fn snapshot(&self) -> HubSnapshot {
        self.state.read().await.snapshot(&self.session_id)
    }

    /// Replace in-memory state with the stored snapshot for this session and
    /// rebuild the embedding index from it. Returns false when there is no
    /// store or nothing was saved.
    pub async fn restore(&self) -> ConcordResult<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        let Some(snapshot) = store.load(&self.session_id).await? else {
            return Ok(false);
        };

        let records = snapshot.record_count();
        *self.state.write().await = HubState::from_snapshot(snapshot);
        info!(session_id = %self.session_id, records, "Hub state restored");

        self.rebuild_index().await;
        Ok(true)
    }

    /// Re-embed every finding and issue into a cleared index. Best effort:
    /// returns how many records were stored.
    pub async fn rebuild_index(&self) -> usize {
        let records: Vec<(EntityId, RecordKind, String, Extensions)> = {
            let state = self.state.read().await;
            let findings = state.knowledge.findings().iter().map(|f| {
                (
                    f.finding_id,
                    RecordKind::Finding,
                    f.embedding_text(),
                    record_metadata(&f.agent_id, f.category.as_deref(), f.file_path.as_deref()),
                )
            });
            let issues = state.knowledge.issues().iter().map(|i| {
                (
                    i.issue_id,
                    RecordKind::Issue,
                    i.embedding_text(),
                    record_metadata(&i.agent_id, i.category.as_deref(), i.file_path.as_deref()),
                )
            });
            findings.chain(issues).collect()
        };

        self.index.clear();
        let mut stored = 0;
        for (id, kind, text, metadata) in records {
            let vector = self.index.embed(&text).await;
            if self.index.store(id, kind, vector, &text, metadata) {
                stored += 1;
            }
        }
        info!(stored, mode = ?self.index.mode(), "Embedding index rebuilt");
        stored
    }

    pub async fn summary(&self) -> HubSummary {
        let state = self.state.read().await;
        HubSummary {
            session_id: self.session_id.clone(),
            active_agents: state.registry.count_by_status(AgentStatus::Active),
            completed_agents: state.registry.count_by_status(AgentStatus::Completed),
            findings: state.knowledge.findings().len(),
            open_issues: state.knowledge.count_issues(IssueStatus::Open),
            resolved_issues: state.knowledge.count_issues(IssueStatus::Resolved),
            fixes: state.knowledge.fixes().len(),
            recommendations: state.knowledge.recommendations().len(),
            index_live: self.index.mode() == IndexMode::Live,
            indexed_records: self.index.len(),
            durable: self.is_durable(),
        }
    }
}

impl std::fmt::Debug for CoordinationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinationHub")
            .field("session_id", &self.session_id)
            .field("index", &self.index)
            .field("has_store", &self.store.is_some())
            .field("durable", &self.is_durable())
            .finish()
    }
}

fn record_metadata(
    agent_id: &AgentId,
    category: Option<&str>,
    file_path: Option<&str>,
) -> Extensions {
    let mut metadata = Extensions::new();
    metadata.insert("agent_id".to_string(), agent_id.as_str().into());
    if let Some(category) = category {
        metadata.insert("category".to_string(), category.into());
    }
    if let Some(file_path) = file_path {
        metadata.insert("file_path".to_string(), file_path.into());
    }
    metadata
}

// ============================================================================
// TESTS
// ============================================================================
