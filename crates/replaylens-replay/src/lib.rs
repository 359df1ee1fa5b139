pub mod records;

use replaylens_core::session_contracts::RESPONSE_FIELD;
use replaylens_core::{Entity, PatchKind, PatchRecord, PathSegment, ReplayProfile};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use records::{MalformedReason, MalformedRecord, PatchLog, RecordStream};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("log is empty")]
    EmptyLog,
    #[error("log line {line_no} is not a valid snapshot: {reason}")]
    MissingSnapshot { line_no: u64, reason: String },
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub total_lines: usize,
    pub applied_records: usize,
    pub malformed_lines: usize,
    pub unapplied_records: usize,
    pub session_records: usize,
    pub auto_stubbed_entities: usize,
    pub replaced_stubs: usize,
    pub invalid_entities: usize,
}

/// Final reconstructed state. Entities are dense: position == index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayedSession {
    pub entities: Vec<Entity>,
    pub session_fields: Map<String, Value>,
    pub report: ReplayReport,
}

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub entities_field: String,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self::from(&ReplayProfile::default())
    }
}

impl From<&ReplayProfile> for ReplayOptions {
    fn from(profile: &ReplayProfile) -> Self {
        Self {
            entities_field: profile.entities_field.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unapplied {
    EmptyPath,
    NotAnIndex,
    NotAnArray,
    NotAnObject,
    PathConflict,
}

pub struct ReplayEngine {
    options: ReplayOptions,
}

impl ReplayEngine {
    pub fn new(options: ReplayOptions) -> Self {
        Self { options }
    }

    pub fn replay_file(&self, path: impl AsRef<Path>) -> Result<ReplayedSession, ReplayError> {
        let log = PatchLog::read(path)?;
        self.replay_log(&log)
    }

    pub fn replay_bytes(&self, bytes: &[u8]) -> Result<ReplayedSession, ReplayError> {
        self.replay_log(&PatchLog::from_bytes(bytes))
    }

    pub fn replay_log(&self, log: &PatchLog) -> Result<ReplayedSession, ReplayError> {
        let mut stream = log.records()?;
        let mut store = EntityStore::seed(stream.snapshot(), &self.options.entities_field)?;

        for outcome in stream.by_ref() {
            match outcome {
                Ok(record) => store.apply(&record),
                Err(malformed) => {
                    debug!(
                        line_no = malformed.line_no,
                        reason = %malformed.reason,
                        "skipping malformed record"
                    );
                    store.report.malformed_lines += 1;
                }
            }
        }

        store.report.total_lines = stream.total_lines();
        let session = store.finish();
        info!(
            entities = session.entities.len(),
            applied = session.report.applied_records,
            malformed = session.report.malformed_lines,
            unapplied = session.report.unapplied_records,
            "replay complete"
        );
        Ok(session)
    }
}

struct EntityStore<'a> {
    entities_field: &'a str,
    entities: BTreeMap<usize, Entity>,
    stubs: BTreeSet<usize>,
    next_index: usize,
    session_fields: Map<String, Value>,
    report: ReplayReport,
}

impl<'a> EntityStore<'a> {
    fn seed(snapshot: &PatchRecord, entities_field: &'a str) -> Result<Self, ReplayError> {
        let Value::Object(mut session_fields) = snapshot.value.clone() else {
            return Err(ReplayError::MissingSnapshot {
                line_no: snapshot.sequence_no,
                reason: "snapshot value is not an object".to_string(),
            });
        };
        let Some(Value::Array(initial)) = session_fields.remove(entities_field) else {
            return Err(ReplayError::MissingSnapshot {
                line_no: snapshot.sequence_no,
                reason: format!("snapshot has no {entities_field} array"),
            });
        };

        let mut store = Self {
            entities_field,
            entities: BTreeMap::new(),
            stubs: BTreeSet::new(),
            next_index: initial.len(),
            session_fields,
            report: ReplayReport {
                applied_records: 1,
                ..ReplayReport::default()
            },
        };
        for (index, raw) in initial.into_iter().enumerate() {
            if raw.is_null() {
                store.entities.insert(index, Entity::empty(index));
                continue;
            }
            store.insert_entity(index, raw);
        }
        Ok(store)
    }

    fn apply(&mut self, record: &PatchRecord) {
        let outcome = match record.path.first() {
            None => Err(Unapplied::EmptyPath),
            Some(PathSegment::Field(field)) if field == self.entities_field => {
                self.apply_to_entities(record)
            }
            Some(_) => {
                self.report.session_records += 1;
                set_in_map(&mut self.session_fields, &record.path, record.value.clone())
            }
        };

        match outcome {
            Ok(()) => self.report.applied_records += 1,
            Err(reason) => {
                debug!(
                    line_no = record.sequence_no,
                    ?reason,
                    path = %render_path(&record.path),
                    "record could not be applied"
                );
                self.report.unapplied_records += 1;
            }
        }
    }

    fn apply_to_entities(&mut self, record: &PatchRecord) -> Result<(), Unapplied> {
        let rest = &record.path[1..];
        let Some(first) = rest.first() else {
            return match (record.kind, &record.value) {
                (PatchKind::Append, Value::Array(appended)) => {
                    self.bulk_append(appended.clone());
                    Ok(())
                }
                (PatchKind::Append, _) => Err(Unapplied::NotAnArray),
                _ => Err(Unapplied::PathConflict),
            };
        };
        let index = first.as_index().ok_or(Unapplied::NotAnIndex)?;
        if let Some(entity) = self.entities.get_mut(&index) {
            return patch_entity(entity, &rest[1..], record);
        }

        // Unknown index: the stub only survives if the patch lands on it.
        let mut stub = Entity::empty(index);
        patch_entity(&mut stub, &rest[1..], record)?;
        warn!(
            index,
            line_no = record.sequence_no,
            "patch references an unknown entity; creating stub"
        );
        self.report.auto_stubbed_entities += 1;
        self.stubs.insert(index);
        self.entities.insert(index, stub);
        Ok(())
    }

    fn bulk_append(&mut self, appended: Vec<Value>) {
        for raw in appended {
            let index = self.next_index;
            self.next_index += 1;
            if self.stubs.remove(&index) {
                warn!(index, "bulk append replaces an auto-stubbed entity");
                self.report.replaced_stubs += 1;
            }
            self.insert_entity(index, raw);
        }
    }

    fn insert_entity(&mut self, index: usize, raw: Value) {
        let (entity, valid) = Entity::from_value(index, raw);
        if !valid {
            self.report.invalid_entities += 1;
        }
        self.entities.insert(index, entity);
    }

    fn finish(self) -> ReplayedSession {
        let Self {
            mut entities,
            session_fields,
            report,
            ..
        } = self;
        let len = entities.keys().next_back().map_or(0, |last| last + 1);
        let entities = (0..len)
            .map(|index| {
                entities
                    .remove(&index)
                    .unwrap_or_else(|| Entity::empty(index))
            })
            .collect();
        ReplayedSession {
            entities,
            session_fields,
            report,
        }
    }
}

/// Applies a record below `requests.<index>` to one entity.
fn patch_entity(
    entity: &mut Entity,
    path: &[PathSegment],
    record: &PatchRecord,
) -> Result<(), Unapplied> {
    match path {
        [] => {
            let Value::Object(_) = &record.value else {
                return Err(Unapplied::NotAnObject);
            };
            let (replacement, _) = Entity::from_value(entity.index, record.value.clone());
            *entity = replacement;
            Ok(())
        }
        [PathSegment::Field(field)] if field == RESPONSE_FIELD => {
            let Value::Array(parts) = &record.value else {
                return Err(Unapplied::NotAnArray);
            };
            if record.kind == PatchKind::Append {
                entity.response.extend(parts.iter().cloned());
            } else {
                entity.response = parts.clone();
            }
            Ok(())
        }
        [PathSegment::Field(field), nested @ ..] if field == RESPONSE_FIELD => {
            let (position, tail) = nested.split_first().ok_or(Unapplied::PathConflict)?;
            let position = position.as_index().ok_or(Unapplied::NotAnIndex)?;
            if tail.is_empty() {
                return assign_index(&mut entity.response, position, record.value.clone());
            }
            let part = entity
                .response
                .get_mut(position)
                .ok_or(Unapplied::PathConflict)?;
            set_in_value(part, tail, record.value.clone())
        }
        field_path => set_in_map(&mut entity.fields, field_path, record.value.clone()),
    }
}

/// Sets `value` at `path` below a mapping, creating intermediate mappings
/// for missing keys. The first segment must be a key.
fn set_in_map(
    map: &mut Map<String, Value>,
    path: &[PathSegment],
    value: Value,
) -> Result<(), Unapplied> {
    let (first, tail) = path.split_first().ok_or(Unapplied::EmptyPath)?;
    let key = first.as_field().ok_or(Unapplied::PathConflict)?;
    if tail.is_empty() {
        map.insert(key.to_string(), value);
        return Ok(());
    }

    let created = !map.contains_key(key);
    let slot = map.entry(key.to_string()).or_insert(Value::Null);
    let outcome = set_in_value(slot, tail, value);
    if outcome.is_err() && created {
        map.remove(key);
    }
    outcome
}

fn set_in_value(root: &mut Value, path: &[PathSegment], value: Value) -> Result<(), Unapplied> {
    let (last, parents) = path.split_last().ok_or(Unapplied::EmptyPath)?;
    check_path(root, path)?;
    let mut current = root;
    for segment in parents {
        current = descend(current, segment)?;
    }
    match last {
        PathSegment::Field(key) => {
            if current.is_null() {
                *current = Value::Object(Map::new());
            }
            let object = current.as_object_mut().ok_or(Unapplied::PathConflict)?;
            object.insert(key.clone(), value);
            Ok(())
        }
        PathSegment::Index(position) => {
            let array = current.as_array_mut().ok_or(Unapplied::NotAnArray)?;
            assign_index(array, *position, value)
        }
    }
}

/// Walks `path` without writing and returns the error the write would hit.
/// `None` stands for a key that does not exist yet; it and `null` accept a
/// field segment and nothing else.
fn check_path(root: &Value, path: &[PathSegment]) -> Result<(), Unapplied> {
    let mut node = Some(root);
    for (depth, segment) in path.iter().enumerate() {
        let current = node.filter(|value| !value.is_null());
        node = match segment {
            PathSegment::Field(key) => match current {
                None => None,
                Some(Value::Object(object)) => object.get(key),
                Some(_) => return Err(Unapplied::PathConflict),
            },
            PathSegment::Index(position) => {
                let array = current
                    .and_then(Value::as_array)
                    .ok_or(Unapplied::NotAnArray)?;
                match array.get(*position) {
                    Some(item) => Some(item),
                    None if depth + 1 == path.len() && *position == array.len() => None,
                    None => return Err(Unapplied::PathConflict),
                }
            }
        };
    }
    Ok(())
}

fn descend<'v>(current: &'v mut Value, segment: &PathSegment) -> Result<&'v mut Value, Unapplied> {
    match segment {
        PathSegment::Field(key) => {
            if current.is_null() {
                *current = Value::Object(Map::new());
            }
            let object = current.as_object_mut().ok_or(Unapplied::PathConflict)?;
            Ok(object.entry(key.clone()).or_insert(Value::Null))
        }
        PathSegment::Index(position) => current
            .as_array_mut()
            .ok_or(Unapplied::NotAnArray)?
            .get_mut(*position)
            .ok_or(Unapplied::PathConflict),
    }
}

/// Replaces an existing slot, or appends when `position` is exactly one
/// past the end.
fn assign_index(array: &mut Vec<Value>, position: usize, value: Value) -> Result<(), Unapplied> {
    if let Some(slot) = array.get_mut(position) {
        *slot = value;
        Ok(())
    } else if position == array.len() {
        array.push(value);
        Ok(())
    } else {
        Err(Unapplied::PathConflict)
    }
}

fn render_path(path: &[PathSegment]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}
