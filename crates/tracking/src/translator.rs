//! Entity translator
//!
//! Pure, bidirectional mapping between tracking entities and graph nodes.
//!
//! ## Layout
//!
//! | Tracking | Graph |
//! |----------|-------|
//! | Experiment | Workspace named after the experiment; id in property `experiment_id`; tags as labels |
//! | Run | Run node named by run id, status and times as properties |
//! | Param | `param` input artifact of a log execution |
//! | Metric | `metrics` output artifact of a log execution |
//! | Tag | `tag` output artifact; deletion is a tombstone with `deleted = 1` |
//! | Logged model | `model` output artifact whose uri is the model's artifact path |
//!
//! Artifacts are replayed in node-id order, which is log order.

use mlmd_core::{
    Experiment, LifecycleStage, LoggedModel, Metric, Param, Result, RunInfo, RunStatus,
    RunTag, TrackingError,
};
use mlmd_graph::{
    ArtifactSpec, ArtifactType, Direction, ExecutionSpec, Node, NodeKind, NodeUpdate, Properties,
    PropertyValue, RunNodeSpec, WorkspaceSpec,
};
use std::collections::BTreeMap;

// ========== Property Names ==========

pub const PROP_EXPERIMENT_ID: &str = "experiment_id";
pub const PROP_ARTIFACT_LOCATION: &str = "artifact_location";
pub const PROP_LIFECYCLE_STAGE: &str = "lifecycle_stage";
pub const PROP_CREATION_TIME: &str = "creation_time";
pub const PROP_LAST_UPDATE_TIME: &str = "last_update_time";
/// Random token written at workspace creation to recognise our own create on retry
pub const PROP_CREATION_TOKEN: &str = "creation_token";

pub const PROP_USER_ID: &str = "user_id";
pub const PROP_RUN_NAME: &str = "run_name";
pub const PROP_STATUS: &str = "status";
pub const PROP_START_TIME: &str = "start_time";
pub const PROP_END_TIME: &str = "end_time";
pub const PROP_ARTIFACT_URI: &str = "artifact_uri";

pub const PROP_LOGGED_AT: &str = "logged_at";

pub const PROP_KEY: &str = "key";
pub const PROP_VALUE: &str = "value";
pub const PROP_TIMESTAMP: &str = "timestamp";
pub const PROP_STEP: &str = "step";
pub const PROP_DEDUP_KEY: &str = "dedup_key";
pub const PROP_DELETED: &str = "deleted";
pub const PROP_MODEL_JSON: &str = "model_json";

fn missing(node: &Node, property: &str) -> TrackingError {
    TrackingError::internal(format!(
        "{} node {} ('{}') has no usable '{}' property",
        node.kind.as_str(),
        node.id,
        node.name,
        property
    ))
}

fn required_str<'a>(node: &'a Node, property: &str) -> Result<&'a str> {
    node.str_property(property)
        .ok_or_else(|| missing(node, property))
}

fn required_int(node: &Node, property: &str) -> Result<i64> {
    node.int_property(property)
        .ok_or_else(|| missing(node, property))
}

fn stage_of(node: &Node) -> Result<LifecycleStage> {
    LifecycleStage::parse(required_str(node, PROP_LIFECYCLE_STAGE)?)
        .ok_or_else(|| missing(node, PROP_LIFECYCLE_STAGE))
}

// ========== Experiments ==========

/// Workspace creation request for a new experiment
pub fn to_workspace(experiment: &Experiment, creation_token: &str) -> WorkspaceSpec {
    let mut properties = Properties::new();
    properties.insert(
        PROP_EXPERIMENT_ID.to_string(),
        PropertyValue::from(experiment.experiment_id.as_str()),
    );
    properties.insert(
        PROP_ARTIFACT_LOCATION.to_string(),
        PropertyValue::from(experiment.artifact_location.as_str()),
    );
    properties.insert(
        PROP_LIFECYCLE_STAGE.to_string(),
        PropertyValue::from(experiment.lifecycle_stage.as_str()),
    );
    if let Some(t) = experiment.creation_time {
        properties.insert(PROP_CREATION_TIME.to_string(), PropertyValue::Int(t));
    }
    if let Some(t) = experiment.last_update_time {
        properties.insert(PROP_LAST_UPDATE_TIME.to_string(), PropertyValue::Int(t));
    }
    properties.insert(
        PROP_CREATION_TOKEN.to_string(),
        PropertyValue::from(creation_token),
    );
    WorkspaceSpec {
        name: experiment.name.clone(),
        description: format!("Workspace for experiment {}", experiment.name),
        labels: experiment.tags.clone(),
        properties,
    }
}

/// Rebuild an experiment from its workspace node
pub fn from_workspace(node: &Node) -> Result<Experiment> {
    if node.kind != NodeKind::Workspace {
        return Err(TrackingError::internal(format!(
            "node {} is a {}, not a workspace",
            node.id,
            node.kind.as_str()
        )));
    }
    Ok(Experiment {
        experiment_id: required_str(node, PROP_EXPERIMENT_ID)?.to_string(),
        name: node.name.clone(),
        artifact_location: required_str(node, PROP_ARTIFACT_LOCATION)?.to_string(),
        lifecycle_stage: stage_of(node)?,
        tags: node.labels.clone(),
        creation_time: node.int_property(PROP_CREATION_TIME),
        last_update_time: node.int_property(PROP_LAST_UPDATE_TIME),
    })
}

/// Update moving an experiment to `stage`
pub fn experiment_stage_update(stage: LifecycleStage, now: i64) -> NodeUpdate {
    NodeUpdate::new()
        .set(PROP_LIFECYCLE_STAGE, stage.as_str())
        .set(PROP_LAST_UPDATE_TIME, now)
}

// ========== Runs ==========

/// Run node creation request
pub fn to_run_node(info: &RunInfo) -> RunNodeSpec {
    let mut properties = Properties::new();
    properties.insert(
        PROP_EXPERIMENT_ID.to_string(),
        PropertyValue::from(info.experiment_id.as_str()),
    );
    properties.insert(
        PROP_USER_ID.to_string(),
        PropertyValue::from(info.user_id.as_str()),
    );
    properties.insert(
        PROP_RUN_NAME.to_string(),
        PropertyValue::from(info.run_name.as_str()),
    );
    properties.insert(
        PROP_STATUS.to_string(),
        PropertyValue::from(info.status.as_str()),
    );
    properties.insert(
        PROP_START_TIME.to_string(),
        PropertyValue::Int(info.start_time),
    );
    if let Some(end) = info.end_time {
        properties.insert(PROP_END_TIME.to_string(), PropertyValue::Int(end));
    }
    properties.insert(
        PROP_LIFECYCLE_STAGE.to_string(),
        PropertyValue::from(info.lifecycle_stage.as_str()),
    );
    properties.insert(
        PROP_ARTIFACT_URI.to_string(),
        PropertyValue::from(info.artifact_uri.as_str()),
    );
    RunNodeSpec {
        name: info.run_id.clone(),
        description: format!("Metadata run for workflow {}", info.run_id),
        properties,
    }
}

/// Rebuild run info from its run node
pub fn run_info_from_node(node: &Node) -> Result<RunInfo> {
    if node.kind != NodeKind::Run {
        return Err(TrackingError::internal(format!(
            "node {} is a {}, not a run",
            node.id,
            node.kind.as_str()
        )));
    }
    let status = RunStatus::parse(required_str(node, PROP_STATUS)?)
        .ok_or_else(|| missing(node, PROP_STATUS))?;
    Ok(RunInfo {
        run_id: node.name.clone(),
        experiment_id: required_str(node, PROP_EXPERIMENT_ID)?.to_string(),
        run_name: node.str_property(PROP_RUN_NAME).unwrap_or_default().to_string(),
        user_id: node.str_property(PROP_USER_ID).unwrap_or_default().to_string(),
        status,
        start_time: required_int(node, PROP_START_TIME)?,
        end_time: node.int_property(PROP_END_TIME),
        lifecycle_stage: stage_of(node)?,
        artifact_uri: required_str(node, PROP_ARTIFACT_URI)?.to_string(),
    })
}

/// Update applying a status change (and its end time, if any)
pub fn run_status_update(status: RunStatus, end_time: Option<i64>) -> NodeUpdate {
    let update = NodeUpdate::new().set(PROP_STATUS, status.as_str());
    match end_time {
        Some(end) => update.set(PROP_END_TIME, end),
        None => update,
    }
}

/// Update renaming a run
pub fn run_name_update(run_name: &str) -> NodeUpdate {
    NodeUpdate::new().set(PROP_RUN_NAME, run_name)
}

/// Update moving a run to `stage`
pub fn run_stage_update(stage: LifecycleStage) -> NodeUpdate {
    NodeUpdate::new().set(PROP_LIFECYCLE_STAGE, stage.as_str())
}

// ========== Executions & Artifacts ==========

/// Execution for one logging call
///
/// The name pairs a UTC timestamp with a random suffix; it is generated once
/// and reused across retries of the same call.
pub fn execution_spec(run_id: &str, label: &str) -> ExecutionSpec {
    let now = chrono::Utc::now();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let mut properties = Properties::new();
    properties.insert(
        PROP_LOGGED_AT.to_string(),
        PropertyValue::Int(now.timestamp_millis()),
    );
    ExecutionSpec {
        name: format!("{}-{}", now.to_rfc3339(), &suffix[..8]),
        description: format!("{} for run {}", label, run_id),
        properties,
    }
}

/// Artifact name, unique within its execution
fn artifact_name(artifact_type: ArtifactType, index: usize) -> String {
    format!("{}:{}", artifact_type.type_name(), index)
}

pub fn metric_artifact(metric: &Metric, index: usize) -> ArtifactSpec {
    let mut properties = Properties::new();
    properties.insert(PROP_KEY.to_string(), PropertyValue::from(metric.key.as_str()));
    properties.insert(PROP_VALUE.to_string(), PropertyValue::Double(metric.value));
    properties.insert(
        PROP_TIMESTAMP.to_string(),
        PropertyValue::Int(metric.timestamp),
    );
    properties.insert(PROP_STEP.to_string(), PropertyValue::Int(metric.step));
    if let Some(dedup) = &metric.dedup_key {
        properties.insert(
            PROP_DEDUP_KEY.to_string(),
            PropertyValue::from(dedup.as_str()),
        );
    }
    ArtifactSpec {
        artifact_type: ArtifactType::Metrics,
        name: artifact_name(ArtifactType::Metrics, index),
        uri: None,
        properties,
    }
}

pub fn param_artifact(param: &Param, index: usize) -> ArtifactSpec {
    let mut properties = Properties::new();
    properties.insert(PROP_KEY.to_string(), PropertyValue::from(param.key.as_str()));
    properties.insert(
        PROP_VALUE.to_string(),
        PropertyValue::from(param.value.as_str()),
    );
    ArtifactSpec {
        artifact_type: ArtifactType::Param,
        name: artifact_name(ArtifactType::Param, index),
        uri: None,
        properties,
    }
}

pub fn tag_artifact(tag: &RunTag, index: usize) -> ArtifactSpec {
    let mut properties = Properties::new();
    properties.insert(PROP_KEY.to_string(), PropertyValue::from(tag.key.as_str()));
    properties.insert(
        PROP_VALUE.to_string(),
        PropertyValue::from(tag.value.as_str()),
    );
    ArtifactSpec {
        artifact_type: ArtifactType::Tag,
        name: artifact_name(ArtifactType::Tag, index),
        uri: None,
        properties,
    }
}

pub fn tag_tombstone(key: &str, index: usize) -> ArtifactSpec {
    let mut properties = Properties::new();
    properties.insert(PROP_KEY.to_string(), PropertyValue::from(key));
    properties.insert(PROP_DELETED.to_string(), PropertyValue::Int(1));
    ArtifactSpec {
        artifact_type: ArtifactType::Tag,
        name: artifact_name(ArtifactType::Tag, index),
        uri: None,
        properties,
    }
}

pub fn model_artifact(model: &LoggedModel, artifact_uri: &str, index: usize) -> Result<ArtifactSpec> {
    let mut properties = Properties::new();
    properties.insert(
        PROP_KEY.to_string(),
        PropertyValue::from(model.artifact_path.as_str()),
    );
    properties.insert(
        PROP_MODEL_JSON.to_string(),
        PropertyValue::String(serde_json::to_string(model)?),
    );
    Ok(ArtifactSpec {
        artifact_type: ArtifactType::Model,
        name: artifact_name(ArtifactType::Model, index),
        uri: Some(format!(
            "{}/{}",
            artifact_uri.trim_end_matches('/'),
            model.artifact_path
        )),
        properties,
    })
}

/// A tracked value recovered from an artifact node
#[derive(Debug, Clone, PartialEq)]
pub enum LoggedValue {
    Metric(Metric),
    Param(Param),
    Tag(RunTag),
    TagDeleted(String),
    Model(LoggedModel),
}

/// Decode an artifact node; `None` for artifacts the tracking layer ignores
pub fn logged_value_from_artifact(node: &Node) -> Result<Option<LoggedValue>> {
    let Some(artifact_type) = node.artifact_type() else {
        return Ok(None);
    };
    let value = match (artifact_type, node.direction) {
        (ArtifactType::Metrics, Some(Direction::Output)) => {
            let value = node
                .double_property(PROP_VALUE)
                .ok_or_else(|| missing(node, PROP_VALUE))?;
            let mut metric = Metric::new(
                required_str(node, PROP_KEY)?,
                value,
                required_int(node, PROP_TIMESTAMP)?,
                node.int_property(PROP_STEP).unwrap_or(0),
            );
            metric.dedup_key = node.str_property(PROP_DEDUP_KEY).map(str::to_string);
            LoggedValue::Metric(metric)
        }
        (ArtifactType::Param, Some(Direction::Input)) => LoggedValue::Param(Param::new(
            required_str(node, PROP_KEY)?,
            required_str(node, PROP_VALUE)?,
        )),
        (ArtifactType::Tag, Some(Direction::Output)) => {
            let key = required_str(node, PROP_KEY)?;
            if node.int_property(PROP_DELETED).unwrap_or(0) != 0 {
                LoggedValue::TagDeleted(key.to_string())
            } else {
                LoggedValue::Tag(RunTag::new(key, required_str(node, PROP_VALUE)?))
            }
        }
        (ArtifactType::Model, Some(Direction::Output)) => {
            LoggedValue::Model(serde_json::from_str(required_str(node, PROP_MODEL_JSON)?)?)
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// Everything logged against one run, folded in log order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunLog {
    /// Every metric point, in log order
    pub metrics: Vec<Metric>,
    pub params: BTreeMap<String, String>,
    /// Live tags (tombstoned keys removed)
    pub tags: BTreeMap<String, String>,
    pub models: Vec<LoggedModel>,
}

impl RunLog {
    /// Fold the descendants of a run node (any order) into a log
    pub fn replay(nodes: &[Node]) -> Result<Self> {
        let mut artifacts: Vec<&Node> = nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Artifact)
            .collect();
        artifacts.sort_by_key(|n| (n.parent, n.id));
        let mut log = RunLog::default();
        for node in artifacts {
            match logged_value_from_artifact(node)? {
                Some(LoggedValue::Metric(m)) => log.metrics.push(m),
                Some(LoggedValue::Param(p)) => {
                    log.params.entry(p.key).or_insert(p.value);
                }
                Some(LoggedValue::Tag(t)) => {
                    log.tags.insert(t.key, t.value);
                }
                Some(LoggedValue::TagDeleted(key)) => {
                    log.tags.remove(&key);
                }
                Some(LoggedValue::Model(m)) => log.models.push(m),
                None => {}
            }
        }
        Ok(log)
    }

    /// Whether a metric with this dedup key was already written
    pub fn has_dedup_key(&self, dedup_key: &str) -> bool {
        self.metrics
            .iter()
            .any(|m| m.dedup_key.as_deref() == Some(dedup_key))
    }
}
