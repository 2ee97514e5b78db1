//! Run-request intake: validate a submission, persist it as `CREATED`,
//! and dispatch it exactly once.
//!
//! Submissions arrive as loosely-typed JSON. [`RawSubmission`] keeps each
//! field as a raw value so every problem can be reported against its
//! field in one response, the way API clients expect:
//!
//! ```json
//! {"env": ["Invalid pk \"500\" - object does not exist."],
//!  "path": ["This list may not be empty."]}
//! ```
//!
//! The artifact reference accepts either a single id or a list; the
//! scalar form is normalized to a one-element list before validation.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::artifact::ArtifactRegistry;
use crate::dispatch::DispatchGateway;
use crate::environment::EnvironmentCatalog;
use crate::error::{CoreError, FieldErrors};
use crate::run_request::{NewRunRequest, RunRequest};
use crate::store::Store;
use crate::types::DbId;

pub const FIELD_REQUESTED_BY: &str = "requested_by";
pub const FIELD_ENV: &str = "env";
pub const FIELD_PATH: &str = "path";

/// Maximum length of `requested_by`.
pub const MAX_REQUESTED_BY_LEN: usize = 255;

pub const MSG_REQUIRED: &str = "This field is required.";
pub const MSG_BLANK: &str = "This field may not be blank.";
pub const MSG_EMPTY_LIST: &str = "This list may not be empty.";

/// `Invalid pk "{id}" - object does not exist.`
pub fn invalid_pk_message(id: DbId) -> String {
    format!("Invalid pk \"{id}\" - object does not exist.")
}

/// Submission body as received from the transport layer.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawSubmission {
    #[serde(default)]
    pub requested_by: Option<Value>,
    #[serde(default, alias = "environment_id")]
    pub env: Option<Value>,
    #[serde(default, alias = "artifact_ids")]
    pub path: Option<Value>,
}

/// Artifact reference(s) as submitted: a bare id or a list of ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactRefs {
    One(DbId),
    Many(Vec<DbId>),
}

impl ArtifactRefs {
    /// Parse a raw JSON reference, reporting the first malformed entry.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(parse_pk)
                .collect::<Result<Vec<_>, _>>()
                .map(ArtifactRefs::Many),
            scalar => parse_pk(scalar).map(ArtifactRefs::One),
        }
    }

    /// Canonical ordered id sequence. Repeats collapse onto their first
    /// occurrence because a run request holds a set of artifacts.
    pub fn into_ids(self) -> Vec<DbId> {
        match self {
            ArtifactRefs::One(id) => vec![id],
            ArtifactRefs::Many(ids) => {
                let mut seen = HashSet::with_capacity(ids.len());
                ids.into_iter().filter(|id| seen.insert(*id)).collect()
            }
        }
    }
}

/// Parse a primary-key value. Integer-valued strings are accepted since
/// form-encoded clients send every value as text.
fn parse_pk(value: &Value) -> Result<DbId, String> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<DbId>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        format!(
            "Incorrect type. Expected pk value, received {}.",
            json_type_name(value)
        )
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(_) => "float",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Per-field parse results, kept separate so existence checks can run on
/// whichever fields did parse.
struct ParsedFields {
    requested_by: Option<String>,
    env_id: Option<DbId>,
    artifact_ids: Option<Vec<DbId>>,
}

fn parse_fields(raw: &RawSubmission, errors: &mut FieldErrors) -> ParsedFields {
    let requested_by = match raw.requested_by.as_ref() {
        None | Some(Value::Null) => {
            errors.add(FIELD_REQUESTED_BY, MSG_REQUIRED);
            None
        }
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                errors.add(FIELD_REQUESTED_BY, MSG_BLANK);
                None
            } else if trimmed.chars().count() > MAX_REQUESTED_BY_LEN {
                errors.add(
                    FIELD_REQUESTED_BY,
                    format!(
                        "Ensure this field has no more than {MAX_REQUESTED_BY_LEN} characters."
                    ),
                );
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(_) => {
            errors.add(FIELD_REQUESTED_BY, "Not a valid string.");
            None
        }
    };

    let env_id = match raw.env.as_ref() {
        None | Some(Value::Null) => {
            errors.add(FIELD_ENV, MSG_REQUIRED);
            None
        }
        Some(value) => parse_pk(value)
            .map_err(|msg| errors.add(FIELD_ENV, msg))
            .ok(),
    };

    let artifact_ids = match raw.path.as_ref() {
        None | Some(Value::Null) => {
            errors.add(FIELD_PATH, MSG_EMPTY_LIST);
            None
        }
        Some(value) => match ArtifactRefs::from_value(value) {
            Ok(refs) => {
                let ids = refs.into_ids();
                if ids.is_empty() {
                    errors.add(FIELD_PATH, MSG_EMPTY_LIST);
                    None
                } else {
                    Some(ids)
                }
            }
            Err(msg) => {
                errors.add(FIELD_PATH, msg);
                None
            }
        },
    };

    ParsedFields {
        requested_by,
        env_id,
        artifact_ids,
    }
}

/// Outcome of a successful submission.
#[derive(Debug, Clone)]
pub struct Admission {
    pub run_request: RunRequest,
    /// `false` when the gateway refused the command. The row is still
    /// committed in `CREATED`; the failure has already been logged.
    pub dispatched: bool,
}

#[derive(Clone)]
pub struct IntakeService {
    store: Arc<dyn Store>,
    registry: ArtifactRegistry,
    catalog: EnvironmentCatalog,
    gateway: Arc<dyn DispatchGateway>,
}

impl IntakeService {
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn DispatchGateway>) -> Self {
        Self {
            registry: ArtifactRegistry::new(Arc::clone(&store)),
            catalog: EnvironmentCatalog::new(Arc::clone(&store)),
            store,
            gateway,
        }
    }

    /// Validate, persist and dispatch a run request.
    ///
    /// Validation failures return `CoreError::InvalidFields` and leave no
    /// trace: no row, no dispatch. On success the gateway is called exactly
    /// once with the new id and is never retried from here.
    pub async fn submit(&self, raw: RawSubmission) -> Result<Admission, CoreError> {
        let mut errors = FieldErrors::new();
        let fields = parse_fields(&raw, &mut errors);

        if let Some(env_id) = fields.env_id {
            match self.catalog.lookup(env_id).await {
                Ok(_) => {}
                Err(CoreError::NotFound { .. }) => errors.add(FIELD_ENV, invalid_pk_message(env_id)),
                Err(e) => return Err(e),
            }
        }

        if let Some(ids) = fields.artifact_ids.as_deref() {
            let known: HashSet<DbId> = self
                .registry
                .find_many(ids)
                .await?
                .into_iter()
                .map(|a| a.id)
                .collect();
            if let Some(missing) = ids.iter().find(|id| !known.contains(id)) {
                errors.add(FIELD_PATH, invalid_pk_message(*missing));
            }
        }

        errors.into_result()?;

        let (Some(requested_by), Some(env_id), Some(artifact_ids)) =
            (fields.requested_by, fields.env_id, fields.artifact_ids)
        else {
            return Err(CoreError::Internal(
                "submission passed validation with missing fields".into(),
            ));
        };

        let input = NewRunRequest {
            requested_by,
            env_id,
            artifact_ids,
        };
        let run_request = self.store.insert_run_request(&input).await?;

        tracing::info!(
            run_request_id = run_request.id,
            env_id = run_request.env,
            artifact_count = run_request.path.len(),
            requested_by = %run_request.requested_by,
            "Run request created",
        );

        let dispatched = match self.gateway.enqueue(run_request.id).await {
            Ok(()) => {
                tracing::info!(run_request_id = run_request.id, "Run request dispatched");
                true
            }
            Err(e) => {
                tracing::error!(
                    run_request_id = run_request.id,
                    error = %e,
                    "Failed to dispatch run request; it will stay CREATED until re-dispatched",
                );
                false
            }
        };

        Ok(Admission {
            run_request,
            dispatched,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::memory::{InMemoryStore, RecordingDispatch};
    use crate::status::RunStatus;

    struct Fixture {
        store: Arc<InMemoryStore>,
        dispatch: Arc<RecordingDispatch>,
        intake: IntakeService,
        env_id: DbId,
        path1: DbId,
        path2: DbId,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let dispatch = Arc::new(RecordingDispatch::new());
        let env_id = store.seed_environment("my_env").id;
        let path1 = store.seed_artifact("path1").id;
        let path2 = store.seed_artifact("path2").id;
        let intake = IntakeService::new(store.clone(), dispatch.clone());
        Fixture {
            store,
            dispatch,
            intake,
            env_id,
            path1,
            path2,
        }
    }

    fn raw(body: Value) -> RawSubmission {
        serde_json::from_value(body).unwrap()
    }

    fn field_errors(result: Result<Admission, CoreError>) -> FieldErrors {
        match result {
            Err(CoreError::InvalidFields(errors)) => errors,
            other => panic!("expected field errors, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn valid_multi_artifact_submission_is_created_and_dispatched_once() {
        let f = fixture();

        let admission = f
            .intake
            .submit(raw(json!({
                "requested_by": "iron man",
                "env": f.env_id,
                "path": [f.path2, f.path1],
            })))
            .await
            .unwrap();

        let run = admission.run_request;
        assert!(admission.dispatched);
        assert_eq!(run.status, RunStatus::Created);
        assert_eq!(run.requested_by, "iron man");
        assert_eq!(run.env, f.env_id);
        assert_eq!(run.env_name, "my_env");
        assert_eq!(run.path, vec![f.path2, f.path1], "submission order must be preserved");
        assert_eq!(run.logs, "");
        assert_eq!(f.dispatch.enqueued(), vec![run.id]);
    }

    #[tokio::test]
    async fn scalar_artifact_is_equivalent_to_one_element_list() {
        let f = fixture();

        let scalar = f
            .intake
            .submit(raw(json!({"requested_by": "x", "env": f.env_id, "path": f.path1})))
            .await
            .unwrap()
            .run_request;
        let list = f
            .intake
            .submit(raw(json!({"requested_by": "x", "env": f.env_id, "path": [f.path1]})))
            .await
            .unwrap()
            .run_request;

        assert_eq!(scalar.path, vec![f.path1]);
        assert_eq!(scalar.path, list.path);
        assert_eq!(f.dispatch.enqueued(), vec![scalar.id, list.id]);
    }

    #[tokio::test]
    async fn accepts_spec_field_aliases() {
        let f = fixture();

        let run = f
            .intake
            .submit(raw(json!({
                "requested_by": "x",
                "environment_id": f.env_id,
                "artifact_ids": [f.path1, f.path2],
            })))
            .await
            .unwrap()
            .run_request;

        assert_eq!(run.path, vec![f.path1, f.path2]);
    }

    #[tokio::test]
    async fn empty_submission_reports_every_field() {
        let f = fixture();

        let errors = field_errors(f.intake.submit(RawSubmission::default()).await);

        assert_eq!(errors.get(FIELD_ENV), [MSG_REQUIRED]);
        assert_eq!(errors.get(FIELD_PATH), [MSG_EMPTY_LIST]);
        assert_eq!(errors.get(FIELD_REQUESTED_BY), [MSG_REQUIRED]);
        assert_eq!(f.store.run_request_count(), 0);
        assert!(f.dispatch.enqueued().is_empty());
    }

    #[tokio::test]
    async fn empty_artifact_list_is_rejected() {
        let f = fixture();

        let errors = field_errors(
            f.intake
                .submit(raw(json!({"requested_by": "x", "env": f.env_id, "path": []})))
                .await,
        );

        assert_eq!(errors.get(FIELD_PATH), [MSG_EMPTY_LIST]);
        assert!(!errors.has(FIELD_ENV));
        assert_eq!(f.store.run_request_count(), 0);
        assert!(f.dispatch.enqueued().is_empty());
    }

    #[tokio::test]
    async fn wrong_types_are_reported_per_field() {
        let f = fixture();

        let errors = field_errors(
            f.intake
                .submit(raw(json!({"env": "rambo", "path": "waw", "requested_by": "iron man"})))
                .await,
        );

        assert_eq!(errors.get(FIELD_ENV), ["Incorrect type. Expected pk value, received str."]);
        assert_eq!(errors.get(FIELD_PATH), ["Incorrect type. Expected pk value, received str."]);
        assert!(!errors.has(FIELD_REQUESTED_BY));
    }

    #[tokio::test]
    async fn unknown_environment_and_artifact_are_rejected_without_side_effects() {
        let f = fixture();

        let errors = field_errors(
            f.intake
                .submit(raw(json!({"env": 500, "path": 500, "requested_by": "iron man"})))
                .await,
        );

        assert_eq!(errors.get(FIELD_ENV), ["Invalid pk \"500\" - object does not exist."]);
        assert_eq!(errors.get(FIELD_PATH), ["Invalid pk \"500\" - object does not exist."]);
        assert_eq!(f.store.run_request_count(), 0);
        assert!(f.dispatch.enqueued().is_empty());
    }

    #[tokio::test]
    async fn one_unknown_artifact_in_list_rejects_whole_submission() {
        let f = fixture();

        let errors = field_errors(
            f.intake
                .submit(raw(json!({"requested_by": "x", "env": f.env_id, "path": [f.path1, 777]})))
                .await,
        );

        assert_eq!(errors.get(FIELD_PATH), [invalid_pk_message(777)]);
        assert_eq!(f.store.run_request_count(), 0);
    }

    #[tokio::test]
    async fn blank_requested_by_is_rejected() {
        let f = fixture();

        let errors = field_errors(
            f.intake
                .submit(raw(json!({"requested_by": "   ", "env": f.env_id, "path": [f.path1]})))
                .await,
        );

        assert_eq!(errors.get(FIELD_REQUESTED_BY), [MSG_BLANK]);
    }

    #[tokio::test]
    async fn dispatch_failure_keeps_created_row_and_is_not_retried() {
        let f = fixture();
        f.dispatch.fail_next();

        let admission = f
            .intake
            .submit(raw(json!({"requested_by": "x", "env": f.env_id, "path": [f.path1]})))
            .await
            .unwrap();

        assert!(!admission.dispatched);
        assert_eq!(f.dispatch.attempts(), 1);
        assert!(f.dispatch.enqueued().is_empty());
        assert_eq!(f.store.run_request_count(), 1);
        assert_eq!(admission.run_request.status, RunStatus::Created);
    }

    #[test]
    fn artifact_refs_normalize_scalar_and_collapse_repeats() {
        assert_eq!(ArtifactRefs::from_value(&json!(3)).unwrap().into_ids(), vec![3]);
        assert_eq!(ArtifactRefs::from_value(&json!("3")).unwrap().into_ids(), vec![3]);
        assert_eq!(
            ArtifactRefs::from_value(&json!([5, 3, 5])).unwrap().into_ids(),
            vec![5, 3]
        );
        assert_matches!(ArtifactRefs::from_value(&json!([1, true])), Err(msg) if msg.ends_with("received bool."));
        assert_matches!(ArtifactRefs::from_value(&json!(1.5)), Err(msg) if msg.ends_with("received float."));
    }

    #[test]
    fn requested_by_is_trimmed_before_length_check() {
        let padded = format!("  {}  ", "a".repeat(MAX_REQUESTED_BY_LEN));
        let mut errors = FieldErrors::new();
        let fields = parse_fields(
            &raw(json!({"requested_by": padded, "env": "7", "path": 3})),
            &mut errors,
        );
        assert!(errors.is_empty());
        assert_eq!(fields.requested_by.map(|s| s.len()), Some(MAX_REQUESTED_BY_LEN));
        assert_eq!(fields.env_id, Some(7));
        assert_eq!(fields.artifact_ids, Some(vec![3]));

        let too_long = "a".repeat(MAX_REQUESTED_BY_LEN + 1);
        let mut errors = FieldErrors::new();
        let fields = parse_fields(
            &raw(json!({"requested_by": too_long, "env": 7, "path": 3})),
            &mut errors,
        );
        assert_eq!(fields.requested_by, None);
        assert_eq!(
            errors.get(FIELD_REQUESTED_BY),
            ["Ensure this field has no more than 255 characters."]
        );
    }
}
