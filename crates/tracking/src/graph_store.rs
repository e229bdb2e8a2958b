//! Graph-backed tracking store
//!
//! `GraphTrackingStore` translates every tracking operation into calls on a
//! [`GraphClient`]. It keeps no ambient "current run": each call resolves the
//! run it touches to a [`RunHandle`] and threads that through. Each logging
//! call creates its own execution under the run node.
//!
//! ## Consistency
//!
//! - Experiment creation is serialized per name; run writes are serialized
//!   per run id, so read-check-write sequences (param conflicts, dedup keys,
//!   status transitions) cannot interleave within a process.
//! - The identity map is a cache. Every state check re-reads the node.

use mlmd_core::{
    new_experiment_id, new_run_id, now_millis, BatchLimits, Experiment, ExperimentTag,
    LifecycleStage, LoggedModel, Metric, Param, Result, Run, RunData, RunInfo, RunStatus, RunTag,
    TrackingError, ViewType, DEFAULT_EXPERIMENT_ID, DEFAULT_EXPERIMENT_NAME, LOGGED_MODELS_TAG,
    RUN_NAME_TAG,
};
use mlmd_graph::{
    ArtifactSpec, Direction, ExecutionRef, GraphClient, Node, NodeId, NodeKind, NodePredicate,
    NodeUpdate, RunNodeRef, WorkspaceRef,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::history;
use crate::identity::{IdentityMap, RunHandle};
use crate::lifecycle::{self, WriteKind};
use crate::remote::{Remote, Retry};
use crate::search::{RunsPage, SearchPlan, SearchRequest};
use crate::store::{CreateRun, TrackingStore};
use crate::translator::{self, RunLog, PROP_CREATION_TOKEN, PROP_EXPERIMENT_ID};

fn run_not_found(run_id: &str) -> TrackingError {
    TrackingError::not_found(format!("Run with id={} not found", run_id))
}

/// One artifact to attach to a logging execution
struct PendingArtifact {
    direction: Direction,
    spec: ArtifactSpec,
    retry: Retry,
}

/// Artifacts of one logging execution, numbered per type
#[derive(Default)]
struct ExecutionBatch {
    artifacts: Vec<PendingArtifact>,
    params: usize,
    tags: usize,
    metrics: usize,
    models: usize,
}

impl ExecutionBatch {
    fn param(&mut self, param: &Param) {
        self.artifacts.push(PendingArtifact {
            direction: Direction::Input,
            spec: translator::param_artifact(param, self.params),
            retry: Retry::Idempotent,
        });
        self.params += 1;
    }

    fn tag(&mut self, tag: &RunTag) {
        self.artifacts.push(PendingArtifact {
            direction: Direction::Output,
            spec: translator::tag_artifact(tag, self.tags),
            retry: Retry::Idempotent,
        });
        self.tags += 1;
    }

    fn tag_deleted(&mut self, key: &str) {
        self.artifacts.push(PendingArtifact {
            direction: Direction::Output,
            spec: translator::tag_tombstone(key, self.tags),
            retry: Retry::Idempotent,
        });
        self.tags += 1;
    }

    fn metric(&mut self, metric: &Metric) {
        self.artifacts.push(PendingArtifact {
            direction: Direction::Output,
            spec: translator::metric_artifact(metric, self.metrics),
            retry: Retry::Never,
        });
        self.metrics += 1;
    }

    fn model(&mut self, model: &LoggedModel, artifact_uri: &str) -> Result<()> {
        self.artifacts.push(PendingArtifact {
            direction: Direction::Output,
            spec: translator::model_artifact(model, artifact_uri, self.models)?,
            retry: Retry::Idempotent,
        });
        self.models += 1;
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Tracking store over a metadata graph
pub struct GraphTrackingStore<G> {
    remote: Remote<G>,
    identity: IdentityMap,
    config: StoreConfig,
    limits: BatchLimits,
}

impl<G: GraphClient> GraphTrackingStore<G> {
    /// Store with default configuration
    pub fn new(graph: G) -> Self {
        let config = StoreConfig::default();
        GraphTrackingStore {
            remote: Remote::new(graph, &config),
            identity: IdentityMap::with_run_capacity(config.run_cache_capacity),
            config,
            limits: BatchLimits::default(),
        }
    }

    /// Store with explicit configuration
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the configuration is out of range.
    pub fn with_config(graph: G, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        info!(
            target: "mlmd::store",
            service = %config.service.address(),
            timeout_ms = config.timeout_ms,
            "tracking store configured"
        );
        Ok(GraphTrackingStore {
            remote: Remote::new(graph, &config),
            identity: IdentityMap::with_run_capacity(config.run_cache_capacity),
            config,
            limits: BatchLimits::default(),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The underlying graph client
    pub fn graph(&self) -> &G {
        self.remote.graph()
    }

    // ========== Experiment resolution ==========

    fn find_workspace(&self, experiment_id: &str) -> Result<Option<WorkspaceRef>> {
        let nodes = self.remote.query(
            &NodePredicate::kind(NodeKind::Workspace).with_property(PROP_EXPERIMENT_ID, experiment_id),
        )?;
        Ok(nodes.into_iter().next().map(|n| WorkspaceRef {
            id: n.id,
            name: n.name,
        }))
    }

    fn find_workspace_by_name(&self, name: &str) -> Result<Option<Node>> {
        let nodes = self
            .remote
            .query(&NodePredicate::kind(NodeKind::Workspace).with_name(name))?;
        Ok(nodes.into_iter().next())
    }

    /// Workspace of an experiment; the default experiment is created on first use
    fn resolve_workspace(&self, experiment_id: &str) -> Result<WorkspaceRef> {
        let resolved = self
            .identity
            .resolve_experiment(experiment_id, || self.find_workspace(experiment_id));
        match resolved {
            Err(TrackingError::ResourceDoesNotExist { .. })
                if experiment_id == DEFAULT_EXPERIMENT_ID =>
            {
                self.create_experiment_node(
                    DEFAULT_EXPERIMENT_ID,
                    DEFAULT_EXPERIMENT_NAME,
                    None,
                    &[],
                )
                .map_err(|e| match e {
                    TrackingError::AlreadyExists { .. } => TrackingError::invalid_state(format!(
                        "Experiment name '{}' is held by an experiment other than id={}",
                        DEFAULT_EXPERIMENT_NAME, DEFAULT_EXPERIMENT_ID
                    )),
                    other => other,
                })
            }
            other => other,
        }
    }

    /// Materialize the default experiment before `name` is claimed or looked up
    ///
    /// The default experiment holds its name even before first use.
    fn reserve_default_name(&self, name: &str) -> Result<()> {
        if name == DEFAULT_EXPERIMENT_NAME {
            self.resolve_workspace(DEFAULT_EXPERIMENT_ID)?;
        }
        Ok(())
    }

    /// Fresh workspace node of an experiment
    fn experiment_node(&self, experiment_id: &str) -> Result<Node> {
        let ws = self.resolve_workspace(experiment_id)?;
        let nodes = self
            .remote
            .query(&NodePredicate::kind(NodeKind::Workspace).with_id(ws.id))?;
        match nodes.into_iter().next() {
            Some(node) => Ok(node),
            None => {
                self.identity.unregister_experiment(experiment_id);
                Err(TrackingError::not_found(format!(
                    "No Experiment with id={} exists",
                    experiment_id
                )))
            }
        }
    }

    /// Create the workspace for a new experiment under the name lock
    fn create_experiment_node(
        &self,
        experiment_id: &str,
        name: &str,
        artifact_location: Option<&str>,
        tags: &[ExperimentTag],
    ) -> Result<WorkspaceRef> {
        let _guard = self.identity.experiment_lock(name);

        if experiment_id == DEFAULT_EXPERIMENT_ID {
            if let Some(ws) = self.find_workspace(experiment_id)? {
                self.identity.register_experiment(experiment_id, ws.clone());
                return Ok(ws);
            }
        }
        if self.find_workspace_by_name(name)?.is_some() {
            return Err(TrackingError::already_exists(format!(
                "Experiment '{}' already exists",
                name
            )));
        }

        let now = now_millis();
        let experiment = Experiment {
            experiment_id: experiment_id.to_string(),
            name: name.to_string(),
            artifact_location: match artifact_location {
                Some(loc) if !loc.is_empty() => loc.to_string(),
                _ => format!(
                    "{}/{}",
                    self.config.artifact_root.trim_end_matches('/'),
                    experiment_id
                ),
            },
            lifecycle_stage: LifecycleStage::Active,
            tags: tags
                .iter()
                .map(|t| (t.key.clone(), t.value.clone()))
                .collect(),
            creation_time: Some(now),
            last_update_time: Some(now),
        };
        let token = uuid::Uuid::new_v4().simple().to_string();
        let spec = translator::to_workspace(&experiment, &token);
        let created = self.remote.call("create_workspace", Retry::Idempotent, |g, o| {
            g.create_workspace(&spec, o)
        });
        let ws = match created {
            Ok(ws) => ws,
            Err(failure) if failure.is_own_conflict() => {
                match self.find_workspace_by_name(name)? {
                    Some(node) if node.str_property(PROP_CREATION_TOKEN) == Some(token.as_str()) => {
                        debug!(target: "mlmd::store", name, "adopted workspace from retried create");
                        WorkspaceRef {
                            id: node.id,
                            name: node.name,
                        }
                    }
                    _ => return Err(failure.into()),
                }
            }
            Err(failure) => return Err(failure.into()),
        };
        self.identity.register_experiment(experiment_id, ws.clone());
        info!(target: "mlmd::store", experiment_id, name, workspace = %ws.id, "created experiment");
        Ok(ws)
    }

    fn update_node(&self, id: NodeId, update: &NodeUpdate) -> Result<Node> {
        Ok(self.remote.call("update_node", Retry::Idempotent, |g, o| {
            g.update_node(id, update, o)
        })?)
    }

    fn set_experiment_stage(&self, experiment_id: &str, target: LifecycleStage) -> Result<()> {
        if experiment_id == DEFAULT_EXPERIMENT_ID && target == LifecycleStage::Deleted {
            return Err(TrackingError::invalid_parameter(
                "Cannot delete the default experiment",
            ));
        }
        let node = self.experiment_node(experiment_id)?;
        let current = translator::from_workspace(&node)?.lifecycle_stage;
        if let Some(stage) = lifecycle::plan_stage_change(current, target) {
            self.update_node(node.id, &translator::experiment_stage_update(stage, now_millis()))?;
            info!(target: "mlmd::store", experiment_id, stage = %stage, "experiment stage changed");
        }
        Ok(())
    }

    // ========== Run resolution ==========

    fn find_run(&self, run_id: &str) -> Result<Option<RunHandle>> {
        let nodes = self
            .remote
            .query(&NodePredicate::kind(NodeKind::Run).with_name(run_id))?;
        let Some(node) = nodes.into_iter().next() else {
            return Ok(None);
        };
        let info = translator::run_info_from_node(&node)?;
        let parent = node.parent.ok_or_else(|| {
            TrackingError::internal(format!("run node {} has no workspace", node.id))
        })?;
        let ws = self
            .remote
            .query(&NodePredicate::kind(NodeKind::Workspace).with_id(parent))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                TrackingError::internal(format!("workspace {} of run {} is missing", parent, run_id))
            })?;
        Ok(Some(RunHandle {
            run_id: run_id.to_string(),
            experiment_id: info.experiment_id,
            workspace: WorkspaceRef {
                id: ws.id,
                name: ws.name,
            },
            run_node: RunNodeRef {
                id: node.id,
                name: node.name,
                workspace: parent,
            },
        }))
    }

    /// Handle plus fresh info of a run
    fn run_state(&self, run_id: &str) -> Result<(RunHandle, RunInfo)> {
        let handle = self
            .identity
            .resolve_run(run_id, || self.find_run(run_id))?;
        let nodes = self
            .remote
            .query(&NodePredicate::kind(NodeKind::Run).with_id(handle.run_node.id))?;
        match nodes.into_iter().next() {
            Some(node) => Ok((handle, translator::run_info_from_node(&node)?)),
            None => {
                self.identity.unregister_run(run_id);
                Err(run_not_found(run_id))
            }
        }
    }

    fn run_log(&self, handle: &RunHandle) -> Result<RunLog> {
        let nodes = self
            .remote
            .query(&NodePredicate::new().descendant_of(handle.run_node.id))?;
        RunLog::replay(&nodes)
    }

    fn assemble(info: RunInfo, log: RunLog) -> Run {
        Run {
            info,
            data: RunData {
                metrics: history::latest_by_key(&log.metrics),
                params: log.params,
                tags: log.tags,
            },
        }
    }

    /// Replay every run in `run_nodes` with one descendant query of the workspace
    fn replay_runs(&self, workspace: NodeId, run_nodes: Vec<Node>) -> Result<Vec<Run>> {
        if run_nodes.is_empty() {
            return Ok(Vec::new());
        }
        let nodes = self
            .remote
            .query(&NodePredicate::new().descendant_of(workspace))?;
        let owners: HashMap<NodeId, NodeId> = nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Execution)
            .filter_map(|n| n.parent.map(|run| (n.id, run)))
            .collect();
        let mut per_run: HashMap<NodeId, Vec<Node>> = HashMap::new();
        for node in nodes.into_iter().filter(|n| n.kind == NodeKind::Artifact) {
            if let Some(run) = node.parent.and_then(|exec| owners.get(&exec)) {
                per_run.entry(*run).or_default().push(node);
            }
        }
        run_nodes
            .into_iter()
            .map(|node| {
                let info = translator::run_info_from_node(&node)?;
                let log = RunLog::replay(per_run.get(&node.id).map_or(&[][..], Vec::as_slice))?;
                Ok(Self::assemble(info, log))
            })
            .collect()
    }

    // ========== Writes ==========

    /// Create one execution under the run and attach `batch` to it
    fn write_execution(&self, handle: &RunHandle, label: &str, batch: ExecutionBatch) -> Result<()> {
        let spec = translator::execution_spec(&handle.run_id, label);
        let created = self.remote.call("create_execution", Retry::Idempotent, |g, o| {
            g.create_execution(&handle.workspace, &handle.run_node, &spec, o)
        });
        let execution = match created {
            Ok(execution) => execution,
            Err(failure) if failure.is_own_conflict() => {
                let node = self
                    .remote
                    .query(
                        &NodePredicate::kind(NodeKind::Execution)
                            .with_parent(handle.run_node.id)
                            .with_name(spec.name.as_str()),
                    )?
                    .into_iter()
                    .next()
                    .ok_or_else(|| TrackingError::from(failure))?;
                ExecutionRef {
                    id: node.id,
                    name: node.name,
                    run: handle.run_node.id,
                }
            }
            Err(failure) => return Err(failure.into()),
        };

        let count = batch.artifacts.len();
        for artifact in batch.artifacts {
            let operation = match artifact.direction {
                Direction::Input => "log_input",
                Direction::Output => "log_output",
            };
            let logged = self.remote.call(operation, artifact.retry, |g, o| {
                match artifact.direction {
                    Direction::Input => g.log_input(&execution, &artifact.spec, o),
                    Direction::Output => g.log_output(&execution, &artifact.spec, o),
                }
            });
            match logged {
                Ok(_) => {}
                Err(failure) if failure.is_own_conflict() => {}
                Err(failure) => return Err(failure.into()),
            }
        }
        debug!(
            target: "mlmd::store",
            run_id = %handle.run_id,
            execution = %execution.id,
            label,
            artifacts = count,
            "logged execution"
        );
        Ok(())
    }

    /// Keep the run-node name in step with the `mlflow.runName` tag
    fn sync_run_name(&self, handle: &RunHandle, tags: &[RunTag]) -> Result<()> {
        if let Some(tag) = tags.iter().rev().find(|t| t.key == RUN_NAME_TAG) {
            self.update_node(handle.run_node.id, &translator::run_name_update(&tag.value))?;
        }
        Ok(())
    }

    fn set_run_stage(&self, run_id: &str, target: LifecycleStage) -> Result<()> {
        let _guard = self.identity.run_lock(run_id);
        let (handle, info) = self.run_state(run_id)?;
        if let Some(stage) = lifecycle::plan_stage_change(info.lifecycle_stage, target) {
            self.update_node(handle.run_node.id, &translator::run_stage_update(stage))?;
            info!(target: "mlmd::store", run_id, stage = %stage, "run stage changed");
        }
        Ok(())
    }

    fn run_infos(&self, workspace: &WorkspaceRef, view_type: ViewType) -> Result<Vec<Node>> {
        let mut predicate = NodePredicate::kind(NodeKind::Run).with_parent(workspace.id);
        if let Some(stage) = view_type.stage() {
            predicate = predicate.with_property(translator::PROP_LIFECYCLE_STAGE, stage.as_str());
        }
        self.remote.query(&predicate)
    }
}

impl<G: GraphClient> TrackingStore for GraphTrackingStore<G> {
    fn create_experiment(
        &self,
        name: &str,
        artifact_location: Option<&str>,
        tags: &[ExperimentTag],
    ) -> Result<String> {
        if name.trim().is_empty() {
            return Err(TrackingError::invalid_parameter(
                "Experiment name must be a non-empty string",
            ));
        }
        self.reserve_default_name(name)?;
        let experiment_id = new_experiment_id();
        self.create_experiment_node(&experiment_id, name, artifact_location, tags)?;
        Ok(experiment_id)
    }

    fn get_experiment(&self, experiment_id: &str) -> Result<Experiment> {
        translator::from_workspace(&self.experiment_node(experiment_id)?)
    }

    fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>> {
        self.reserve_default_name(name)?;
        let Some(node) = self.find_workspace_by_name(name)? else {
            return Ok(None);
        };
        if node.str_property(PROP_EXPERIMENT_ID).is_none() {
            return Ok(None);
        }
        let experiment = translator::from_workspace(&node)?;
        self.identity.register_experiment(
            &experiment.experiment_id,
            WorkspaceRef {
                id: node.id,
                name: node.name,
            },
        );
        Ok(Some(experiment))
    }

    fn list_experiments(&self, view_type: ViewType) -> Result<Vec<Experiment>> {
        self.resolve_workspace(DEFAULT_EXPERIMENT_ID)?;
        let nodes = self
            .remote
            .query(&NodePredicate::kind(NodeKind::Workspace))?;
        let mut experiments = Vec::new();
        for node in nodes {
            if node.str_property(PROP_EXPERIMENT_ID).is_none() {
                continue;
            }
            let experiment = translator::from_workspace(&node)?;
            if !view_type.includes(experiment.lifecycle_stage) {
                continue;
            }
            self.identity.register_experiment(
                &experiment.experiment_id,
                WorkspaceRef {
                    id: node.id,
                    name: node.name,
                },
            );
            experiments.push(experiment);
        }
        Ok(experiments)
    }

    fn delete_experiment(&self, experiment_id: &str) -> Result<()> {
        self.set_experiment_stage(experiment_id, LifecycleStage::Deleted)
    }

    fn restore_experiment(&self, experiment_id: &str) -> Result<()> {
        self.set_experiment_stage(experiment_id, LifecycleStage::Active)
    }

    fn rename_experiment(&self, experiment_id: &str, new_name: &str) -> Result<()> {
        if new_name.trim().is_empty() {
            return Err(TrackingError::invalid_parameter(
                "Experiment name must be a non-empty string",
            ));
        }
        self.resolve_workspace(experiment_id)?;
        self.reserve_default_name(new_name)?;
        let _guard = self.identity.experiment_lock(new_name);
        let node = self.experiment_node(experiment_id)?;
        let experiment = translator::from_workspace(&node)?;
        if experiment.lifecycle_stage == LifecycleStage::Deleted {
            return Err(TrackingError::invalid_state(format!(
                "Cannot rename deleted experiment '{}'",
                experiment_id
            )));
        }
        if experiment.name == new_name {
            return Ok(());
        }
        if self.find_workspace_by_name(new_name)?.is_some() {
            return Err(TrackingError::already_exists(format!(
                "Experiment '{}' already exists",
                new_name
            )));
        }
        let update = NodeUpdate::new()
            .rename(new_name)
            .set(translator::PROP_LAST_UPDATE_TIME, now_millis());
        let node = self.update_node(node.id, &update)?;
        self.identity.register_experiment(
            experiment_id,
            WorkspaceRef {
                id: node.id,
                name: node.name,
            },
        );
        info!(target: "mlmd::store", experiment_id, old = %experiment.name, new = new_name, "renamed experiment");
        Ok(())
    }

    fn purge_experiment(&self, experiment_id: &str) -> Result<()> {
        if experiment_id == DEFAULT_EXPERIMENT_ID {
            return Err(TrackingError::invalid_parameter(
                "Cannot purge the default experiment",
            ));
        }
        let node = self.experiment_node(experiment_id)?;
        let experiment = translator::from_workspace(&node)?;
        lifecycle::ensure_purgeable("Experiment", experiment_id, experiment.lifecycle_stage)?;
        let removed = self.remote.call("delete_subtree", Retry::Idempotent, |g, o| {
            g.delete_subtree(node.id, o)
        })?;
        self.identity.unregister_experiment(experiment_id);
        info!(target: "mlmd::store", experiment_id, removed, "purged experiment");
        Ok(())
    }

    fn set_experiment_tag(&self, experiment_id: &str, tag: &ExperimentTag) -> Result<()> {
        let node = self.experiment_node(experiment_id)?;
        let experiment = translator::from_workspace(&node)?;
        if experiment.lifecycle_stage == LifecycleStage::Deleted {
            return Err(TrackingError::invalid_state(format!(
                "The experiment {} must be in the 'active' state",
                experiment_id
            )));
        }
        let update = NodeUpdate::new()
            .label(tag.key.as_str(), tag.value.as_str())
            .set(translator::PROP_LAST_UPDATE_TIME, now_millis());
        self.update_node(node.id, &update)?;
        Ok(())
    }

    fn create_run(&self, request: CreateRun) -> Result<Run> {
        let experiment_id = request
            .experiment_id
            .clone()
            .unwrap_or_else(|| DEFAULT_EXPERIMENT_ID.to_string());
        let experiment = translator::from_workspace(&self.experiment_node(&experiment_id)?)?;
        lifecycle::ensure_experiment_accepts_runs(&experiment)?;
        let workspace = self.resolve_workspace(&experiment_id)?;

        let run_id = new_run_id();
        let run_name = request
            .run_name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| {
                request
                    .tags
                    .iter()
                    .rev()
                    .find(|t| t.key == RUN_NAME_TAG)
                    .map(|t| t.value.clone())
            })
            .unwrap_or_else(|| format!("run-{}", &run_id[..8]));
        let info = RunInfo {
            run_id: run_id.clone(),
            experiment_id: experiment_id.clone(),
            run_name: run_name.clone(),
            user_id: request.user_id.clone(),
            status: RunStatus::Running,
            start_time: request.start_time.unwrap_or_else(now_millis),
            end_time: None,
            lifecycle_stage: LifecycleStage::Active,
            artifact_uri: format!(
                "{}/{}/artifacts",
                experiment.artifact_location.trim_end_matches('/'),
                run_id
            ),
        };

        let spec = translator::to_run_node(&info);
        let created = self.remote.call("create_run_node", Retry::Idempotent, |g, o| {
            g.create_run_node(&workspace, &spec, o)
        });
        let run_node = match created {
            Ok(run_node) => run_node,
            Err(failure) if failure.is_own_conflict() => {
                let node = self
                    .remote
                    .query(
                        &NodePredicate::kind(NodeKind::Run)
                            .with_parent(workspace.id)
                            .with_name(run_id.as_str()),
                    )?
                    .into_iter()
                    .next()
                    .ok_or_else(|| TrackingError::from(failure))?;
                RunNodeRef {
                    id: node.id,
                    name: node.name,
                    workspace: workspace.id,
                }
            }
            Err(failure) => return Err(failure.into()),
        };
        let handle = RunHandle {
            run_id: run_id.clone(),
            experiment_id: experiment_id.clone(),
            workspace,
            run_node,
        };
        self.identity.register_run(handle.clone());
        info!(target: "mlmd::store", run_id = %run_id, experiment_id = %experiment_id, "created run");

        let mut tags: BTreeMap<String, String> = request
            .tags
            .iter()
            .map(|t| (t.key.clone(), t.value.clone()))
            .collect();
        tags.insert(RUN_NAME_TAG.to_string(), run_name);
        let mut batch = ExecutionBatch::default();
        for (key, value) in &tags {
            batch.tag(&RunTag::new(key.as_str(), value.as_str()));
        }
        {
            let _guard = self.identity.run_lock(&run_id);
            self.write_execution(&handle, "create_run", batch)?;
        }

        Ok(Run {
            info,
            data: RunData {
                tags,
                ..RunData::default()
            },
        })
    }

    fn get_run(&self, run_id: &str) -> Result<Run> {
        let (handle, info) = self.run_state(run_id)?;
        let log = self.run_log(&handle)?;
        Ok(Self::assemble(info, log))
    }

    fn update_run_info(
        &self,
        run_id: &str,
        status: RunStatus,
        end_time: Option<i64>,
        run_name: Option<&str>,
    ) -> Result<RunInfo> {
        let _guard = self.identity.run_lock(run_id);
        let (handle, mut info) = self.run_state(run_id)?;
        let change = lifecycle::plan_status_change(&info, status, end_time)?;
        let mut update = translator::run_status_update(change.status, change.end_time);
        let rename = run_name.filter(|n| !n.is_empty() && *n != info.run_name);
        if let Some(name) = rename {
            update = update.set(translator::PROP_RUN_NAME, name);
        }
        self.update_node(handle.run_node.id, &update)?;
        if let Some(name) = rename {
            let mut batch = ExecutionBatch::default();
            batch.tag(&RunTag::new(RUN_NAME_TAG, name));
            self.write_execution(&handle, "update_run_info", batch)?;
            info.run_name = name.to_string();
        }
        info.status = change.status;
        if change.end_time.is_some() {
            info.end_time = change.end_time;
        }
        info!(target: "mlmd::store", run_id, status = %info.status, "updated run");
        Ok(info)
    }

    fn delete_run(&self, run_id: &str) -> Result<()> {
        self.set_run_stage(run_id, LifecycleStage::Deleted)
    }

    fn restore_run(&self, run_id: &str) -> Result<()> {
        self.set_run_stage(run_id, LifecycleStage::Active)
    }

    fn purge_run(&self, run_id: &str) -> Result<()> {
        let _guard = self.identity.run_lock(run_id);
        let (handle, info) = self.run_state(run_id)?;
        lifecycle::ensure_purgeable("Run", run_id, info.lifecycle_stage)?;
        let removed = self.remote.call("delete_subtree", Retry::Idempotent, |g, o| {
            g.delete_subtree(handle.run_node.id, o)
        })?;
        self.identity.unregister_run(run_id);
        info!(target: "mlmd::store", run_id, removed, "purged run");
        Ok(())
    }

    fn log_batch(
        &self,
        run_id: &str,
        metrics: &[Metric],
        params: &[Param],
        tags: &[RunTag],
    ) -> Result<()> {
        self.limits.validate(metrics, params, tags)?;
        BatchLimits::validate_unique_params(params)?;

        let _guard = self.identity.run_lock(run_id);
        let (handle, info) = self.run_state(run_id)?;
        lifecycle::ensure_writable(&info, WriteKind::Tag)?;
        if !metrics.is_empty() {
            lifecycle::ensure_writable(&info, WriteKind::Metric)?;
        }
        if !params.is_empty() {
            lifecycle::ensure_writable(&info, WriteKind::Param)?;
        }

        let needs_log = !params.is_empty() || metrics.iter().any(|m| m.dedup_key.is_some());
        let log = if needs_log {
            self.run_log(&handle)?
        } else {
            RunLog::default()
        };

        let mut batch = ExecutionBatch::default();
        let mut seen_params = HashSet::new();
        for param in params {
            match log.params.get(&param.key) {
                Some(existing) if *existing == param.value => {}
                Some(existing) => {
                    return Err(TrackingError::invalid_parameter(format!(
                        "Changing param values is not allowed. Param with key='{}' was already \
                         logged with value='{}' for run ID='{}'. Attempted logging new value '{}'.",
                        param.key, existing, run_id, param.value
                    )));
                }
                None => {
                    if seen_params.insert(param.key.as_str()) {
                        batch.param(param);
                    }
                }
            }
        }
        for tag in tags {
            batch.tag(tag);
        }
        let mut seen_dedup = HashSet::new();
        for metric in metrics {
            if let Some(dedup) = metric.dedup_key.as_deref() {
                if log.has_dedup_key(dedup) || !seen_dedup.insert(dedup) {
                    debug!(target: "mlmd::store", run_id, dedup_key = dedup, "skipping duplicate metric");
                    continue;
                }
            }
            batch.metric(metric);
        }

        if batch.is_empty() {
            return Ok(());
        }
        self.write_execution(&handle, "log_batch", batch)?;
        self.sync_run_name(&handle, tags)
    }

    fn delete_tag(&self, run_id: &str, key: &str) -> Result<()> {
        let _guard = self.identity.run_lock(run_id);
        let (handle, info) = self.run_state(run_id)?;
        lifecycle::ensure_writable(&info, WriteKind::Tag)?;
        let log = self.run_log(&handle)?;
        if !log.tags.contains_key(key) {
            return Err(TrackingError::not_found(format!(
                "No tag with name: {} in run with id {}",
                key, run_id
            )));
        }
        let mut batch = ExecutionBatch::default();
        batch.tag_deleted(key);
        self.write_execution(&handle, "delete_tag", batch)
    }

    fn get_metric_history(&self, run_id: &str, key: &str) -> Result<Vec<Metric>> {
        let (handle, _info) = self.run_state(run_id)?;
        let log = self.run_log(&handle)?;
        Ok(history::history(&log.metrics, key))
    }

    fn record_logged_model(&self, run_id: &str, model: &LoggedModel) -> Result<()> {
        if model.run_id != run_id {
            return Err(TrackingError::invalid_parameter(format!(
                "Model belongs to run '{}', not '{}'",
                model.run_id, run_id
            )));
        }
        let _guard = self.identity.run_lock(run_id);
        let (handle, info) = self.run_state(run_id)?;
        lifecycle::ensure_writable(&info, WriteKind::Tag)?;
        let mut models = self.run_log(&handle)?.models;
        models.push(model.clone());

        let mut batch = ExecutionBatch::default();
        batch.model(model, &info.artifact_uri)?;
        batch.tag(&RunTag::new(LOGGED_MODELS_TAG, serde_json::to_string(&models)?));
        self.write_execution(&handle, "record_logged_model", batch)
    }

    fn search_runs(&self, request: &SearchRequest) -> Result<RunsPage> {
        let plan = SearchPlan::prepare(
            request,
            self.config.search_max_results_threshold,
            self.config.default_max_results,
        )?;
        let pushdown = plan.pushdown();

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for experiment_id in &request.experiment_ids {
            if !seen.insert(experiment_id.as_str()) {
                continue;
            }
            let workspace = self.resolve_workspace(experiment_id)?;
            let mut predicate = NodePredicate::kind(NodeKind::Run).with_parent(workspace.id);
            for (property, value) in &pushdown {
                predicate = predicate.with_property(*property, value.as_str());
            }
            let run_nodes = self.remote.query(&predicate)?;
            candidates.extend(self.replay_runs(workspace.id, run_nodes)?);
        }
        debug!(
            target: "mlmd::search",
            experiments = seen.len(),
            candidates = candidates.len(),
            pushdown = pushdown.len(),
            "search candidates"
        );
        plan.execute(candidates)
    }

    fn list_run_infos(&self, experiment_id: &str, view_type: ViewType) -> Result<Vec<RunInfo>> {
        let workspace = self.resolve_workspace(experiment_id)?;
        let mut infos = self
            .run_infos(&workspace, view_type)?
            .iter()
            .map(translator::run_info_from_node)
            .filter(|info| info.as_ref().map_or(true, |i| view_type.includes(i.lifecycle_stage)))
            .collect::<Result<Vec<_>>>()?;
        infos.sort_by(|a, b| {
            b.start_time
                .cmp(&a.start_time)
                .then_with(|| a.run_id.cmp(&b.run_id))
        });
        Ok(infos)
    }
}
