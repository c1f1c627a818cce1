//! Test case and module models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{case, module};
use crate::error::FieldError;

/// Case priorities (1 = high).
pub const CASE_PRIORITIES: [(i16, &str); 3] = [(1, "high"), (2, "medium"), (3, "low")];

pub const DEFAULT_CASE_PRIORITY: i16 = 2;

pub fn is_valid_priority(code: i16) -> bool {
    CASE_PRIORITIES.iter().any(|(c, _)| *c == code)
}

/// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Check a required text field against a maximum length.
pub(crate) fn check_required(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: Option<&str>,
    max: usize,
) {
    match value.map(str::trim) {
        None | Some("") => errors.push(FieldError::new(field, "is required")),
        Some(v) if v.chars().count() > max => {
            errors.push(FieldError::new(field, format!("must be at most {} characters", max)))
        }
        Some(_) => {}
    }
}

/// Check an optional text field against a maximum length.
pub(crate) fn check_optional(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: Option<&str>,
    max: usize,
) {
    if let Some(v) = value
        && v.chars().count() > max
    {
        errors.push(FieldError::new(field, format!("must be at most {} characters", max)));
    }
}

// ============================================================================
// Modules
// ============================================================================

/// Request to create a module.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateModuleRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

impl CreateModuleRequest {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_required(&mut errors, "name", Some(&self.name), 20);
        errors
    }
}

/// Rename or move a module. `parent_id: null` moves it to the top level.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateModuleRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub parent_id: Option<Option<Uuid>>,
}

/// Module representation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ModuleResponse {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub creator_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<module::Model> for ModuleResponse {
    fn from(m: module::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            parent_id: m.parent_id,
            creator_id: m.creator_id,
            created_at: m.created_at,
        }
    }
}

/// Node of the module tree.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ModuleNode {
    pub id: Uuid,
    pub name: String,
    #[schema(no_recursion)]
    pub children: Vec<ModuleNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cases: Vec<CaseSummary>,
}

/// Query parameters of the module tree endpoint.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ModuleTreeQuery {
    /// Attach active cases to their module nodes.
    #[serde(default)]
    pub with_cases: bool,
}

/// Build the active module forest. Modules whose parent is missing become roots.
pub fn build_module_tree(modules: Vec<module::Model>, cases: Vec<case::Model>) -> Vec<ModuleNode> {
    use std::collections::{HashMap, HashSet};

    let known: HashSet<Uuid> = modules.iter().map(|m| m.id).collect();

    let mut children: HashMap<Option<Uuid>, Vec<module::Model>> = HashMap::new();
    for m in modules {
        let parent = m.parent_id.filter(|p| known.contains(p));
        children.entry(parent).or_default().push(m);
    }
    for list in children.values_mut() {
        list.sort_by(|a, b| a.name.cmp(&b.name));
    }

    let mut cases_by_module: HashMap<Uuid, Vec<CaseSummary>> = HashMap::new();
    for c in cases {
        cases_by_module
            .entry(c.module_id)
            .or_default()
            .push(CaseSummary::from(c));
    }

    fn build(
        parent: Option<Uuid>,
        children: &mut HashMap<Option<Uuid>, Vec<module::Model>>,
        cases: &mut HashMap<Uuid, Vec<CaseSummary>>,
    ) -> Vec<ModuleNode> {
        let Some(level) = children.remove(&parent) else {
            return Vec::new();
        };
        level
            .into_iter()
            .map(|m| ModuleNode {
                id: m.id,
                children: build(Some(m.id), children, cases),
                cases: cases.remove(&m.id).unwrap_or_default(),
                name: m.name,
            })
            .collect()
    }

    build(None, &mut children, &mut cases_by_module)
}

// ============================================================================
// Cases
// ============================================================================

/// Request to create a test case.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateCaseRequest {
    #[serde(default)]
    pub no: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub priority: Option<i16>,
    #[serde(default)]
    pub is_auto: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub code_time: Option<String>,
    #[serde(default)]
    pub case_type: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub module_id: Option<Uuid>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub expectation: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

impl CreateCaseRequest {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_required(&mut errors, "no", self.no.as_deref(), 120);
        check_required(&mut errors, "name", self.name.as_deref(), 60);
        check_required(&mut errors, "author", self.author.as_deref(), 20);
        if self.module_id.is_none() {
            errors.push(FieldError::new("module_id", "is required"));
        }
        if let Some(p) = self.priority
            && !is_valid_priority(p)
        {
            errors.push(FieldError::new("priority", "must be 1, 2 or 3"));
        }
        check_detail_fields(
            &mut errors,
            self.version.as_deref(),
            self.code_time.as_deref(),
            self.case_type.as_deref(),
            self.description.as_deref(),
            self.step.as_deref(),
            self.expectation.as_deref(),
            self.path.as_deref(),
        );
        errors
    }
}

#[allow(clippy::too_many_arguments)]
fn check_detail_fields(
    errors: &mut Vec<FieldError>,
    version: Option<&str>,
    code_time: Option<&str>,
    case_type: Option<&str>,
    description: Option<&str>,
    step: Option<&str>,
    expectation: Option<&str>,
    path: Option<&str>,
) {
    check_optional(errors, "version", version, 10);
    check_optional(errors, "code_time", code_time, 24);
    check_optional(errors, "case_type", case_type, 20);
    check_optional(errors, "description", description, 100);
    check_optional(errors, "step", step, 250);
    check_optional(errors, "expectation", expectation, 100);
    check_optional(errors, "path", path, 200);
}

/// Partial update of a test case.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateCaseRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub priority: Option<i16>,
    #[serde(default)]
    pub is_auto: Option<bool>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub code_time: Option<String>,
    #[serde(default)]
    pub case_type: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub module_id: Option<Uuid>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub expectation: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

impl UpdateCaseRequest {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.name.is_some() {
            check_required(&mut errors, "name", self.name.as_deref(), 60);
        }
        if self.author.is_some() {
            check_required(&mut errors, "author", self.author.as_deref(), 20);
        }
        if let Some(p) = self.priority
            && !is_valid_priority(p)
        {
            errors.push(FieldError::new("priority", "must be 1, 2 or 3"));
        }
        check_detail_fields(
            &mut errors,
            self.version.as_deref(),
            self.code_time.as_deref(),
            self.case_type.as_deref(),
            self.description.as_deref(),
            self.step.as_deref(),
            self.expectation.as_deref(),
            self.path.as_deref(),
        );
        errors
    }
}

/// Query parameters for listing cases.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ListCasesQuery {
    #[serde(default)]
    pub module_id: Option<Uuid>,
    #[serde(default)]
    pub priority: Option<i16>,
    #[serde(default)]
    pub is_auto: Option<bool>,
    #[serde(default)]
    pub author: Option<String>,
    /// Case-insensitive substring of the case name.
    #[serde(default)]
    pub name: Option<String>,
    /// Case-insensitive substring of the case number.
    #[serde(default)]
    pub no: Option<String>,
}

/// Compact case entry used inside the module tree.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CaseSummary {
    pub id: Uuid,
    pub no: String,
    pub name: String,
    pub priority: i16,
}

impl From<case::Model> for CaseSummary {
    fn from(c: case::Model) -> Self {
        Self {
            id: c.id,
            no: c.no,
            name: c.name,
            priority: c.priority,
        }
    }
}

/// Full case representation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CaseResponse {
    pub id: Uuid,
    pub no: String,
    pub name: String,
    pub priority: i16,
    pub is_auto: bool,
    pub version: Option<String>,
    pub code_time: Option<String>,
    pub case_type: Option<String>,
    pub author: String,
    pub module_id: Uuid,
    pub creator_id: Option<Uuid>,
    pub reviser_id: Option<Uuid>,
    pub description: Option<String>,
    pub step: Option<String>,
    pub expectation: Option<String>,
    pub path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<case::Model> for CaseResponse {
    fn from(c: case::Model) -> Self {
        Self {
            id: c.id,
            no: c.no,
            name: c.name,
            priority: c.priority,
            is_auto: c.is_auto,
            version: c.version,
            code_time: c.code_time,
            case_type: c.case_type,
            author: c.author,
            module_id: c.module_id,
            creator_id: c.creator_id,
            reviser_id: c.reviser_id,
            description: c.description,
            step: c.step,
            expectation: c.expectation,
            path: c.path,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}
