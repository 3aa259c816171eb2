//! Per-item shape checks. Each function returns every problem found; an empty list means the
//! entity may be added.
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;

use super::model::{Fields, ImportContainer, ImportNode, ImportProjectType, ItemClass, SpaceClass};

pub const MAX_IDENTIFIER_LENGTH: usize = 5;
pub const ISSUE_PRIORITIES: [&str; 5] = ["NoPriority", "Urgent", "High", "Medium", "Low"];
pub const DRAFT_STATE: &str = "draft";

static PROJECT_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("project identifier pattern is valid")
});

/// Status and category names loaded from the type lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnownNames {
    pub statuses: BTreeSet<String>,
    pub categories: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    String,
    Number,
    Boolean,
}

impl Shape {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Shape::String => value.is_string(),
            Shape::Number => value.is_number(),
            Shape::Boolean => value.is_boolean(),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Shape::String => "a string",
            Shape::Number => "a number",
            Shape::Boolean => "a boolean",
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

struct Checker<'a> {
    fields: &'a Fields,
    errors: Vec<String>,
}

impl<'a> Checker<'a> {
    fn new(fields: &'a Fields) -> Self {
        Checker {
            fields,
            errors: Vec::new(),
        }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    fn fail(&mut self, message: String) {
        self.errors.push(message);
    }

    fn shape(&mut self, name: &str, shape: Shape, required: bool) -> Option<&'a Value> {
        match self.get(name) {
            None if required => {
                self.fail(format!("{name} is required"));
                None
            }
            None => None,
            Some(value) if !shape.matches(value) => {
                self.fail(format!(
                    "{name} must be {}, got {}",
                    shape.describe(),
                    kind_of(value)
                ));
                None
            }
            Some(value) => Some(value),
        }
    }

    fn required_string(&mut self, name: &str) -> Option<&'a str> {
        let value = self.shape(name, Shape::String, true)?.as_str()?;
        if value.trim().is_empty() {
            self.fail(format!("{name} must not be empty"));
        }
        Some(value)
    }

    fn string(&mut self, name: &str) -> Option<&'a str> {
        self.shape(name, Shape::String, false).and_then(Value::as_str)
    }

    fn strings(&mut self, names: &[&str]) {
        for name in names {
            self.string(name);
        }
    }

    fn booleans(&mut self, names: &[&str]) {
        for name in names {
            self.shape(name, Shape::Boolean, false);
        }
    }

    fn non_negative(&mut self, names: &[&str]) {
        for name in names {
            if let Some(number) = self.shape(name, Shape::Number, false).and_then(Value::as_f64) {
                if number < 0.0 {
                    self.fail(format!("{name} must be non-negative, got {number}"));
                }
            }
        }
    }

    fn string_arrays(&mut self, names: &[&str]) {
        for name in names {
            match self.get(name) {
                None => {}
                Some(Value::Array(items)) if items.iter().all(Value::is_string) => {}
                Some(other) => self.fail(format!(
                    "{name} must be an array of strings, got {}",
                    kind_of(other)
                )),
            }
        }
    }

    fn known(&mut self, name: &str, value: Option<&str>, known: &BTreeSet<String>, what: &str) {
        if let Some(value) = value {
            if !known.contains(value) {
                self.fail(format!("{name} refers to unknown {what} '{value}'"));
            }
        }
    }

    /// `emoji` and `color` must decode to a single valid code point.
    fn code_points(&mut self) {
        for name in ["emoji", "color"] {
            match self.get(name) {
                None => {}
                Some(Value::String(s)) if s.chars().next().is_some() => {}
                Some(Value::Number(n))
                    if n
                        .as_u64()
                        .and_then(|n| u32::try_from(n).ok())
                        .and_then(char::from_u32)
                        .is_some() => {}
                Some(other) => self.fail(format!(
                    "{name} must be a valid code point, got {}",
                    kind_of(other)
                )),
            }
        }
    }

    fn finish(self) -> Vec<String> {
        self.errors
    }
}

pub fn validate_identifier(identifier: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if identifier.chars().count() > MAX_IDENTIFIER_LENGTH {
        errors.push(format!(
            "identifier must be no longer than {MAX_IDENTIFIER_LENGTH} characters"
        ));
    }
    if !PROJECT_IDENTIFIER.is_match(identifier) {
        errors.push(
            "identifier must contain only Latin letters, numbers, and underscores, and must not start with a number"
                .to_string(),
        );
    }
    errors
}

pub fn validate_space(container: &ImportContainer, known: &KnownNames) -> Vec<String> {
    let mut check = Checker::new(&container.fields);
    check.required_string("title");
    check.string("description");
    check.string_arrays(&["owners", "members"]);
    check.code_points();
    match container.class {
        SpaceClass::Project => {
            if let Some(identifier) = check.required_string("identifier") {
                for err in validate_identifier(identifier) {
                    check.fail(err);
                }
            }
            check.booleans(&["private", "autoJoin", "archived"]);
            check.string("projectType");
            let status = check.string("defaultIssueStatus");
            check.known("defaultIssueStatus", status, &known.statuses, "status");
        }
        SpaceClass::Teamspace => {
            check.booleans(&["private", "autoJoin", "archived"]);
        }
        SpaceClass::OrgSpace => {}
    }
    check.finish()
}

pub fn validate_item(
    space: Option<SpaceClass>,
    node: &ImportNode,
    known: &KnownNames,
) -> Vec<String> {
    let mut check = Checker::new(&node.fields);
    if let Some(space) = space {
        if !space.accepts(node.class) {
            check.fail(format!(
                "{} items cannot be added to a {}",
                node.class.as_str(),
                space.as_str()
            ));
        }
    }
    check.required_string("title");
    match node.class {
        ItemClass::Issue => validate_issue(&mut check, known),
        ItemClass::Document => {}
        ItemClass::ControlledDocument => {
            check.required_string("template");
            validate_controlled(&mut check, known);
        }
        ItemClass::DocumentTemplate => {
            check.required_string("docPrefix");
            validate_controlled(&mut check, known);
        }
    }
    check.finish()
}

fn validate_issue(check: &mut Checker<'_>, known: &KnownNames) {
    check.non_negative(&["number", "estimation", "remainingTime"]);
    check.string("assignee");
    if let Some(priority) = check.string("priority") {
        if !ISSUE_PRIORITIES.contains(&priority) {
            check.fail(format!(
                "priority must be one of [{}], got '{priority}'",
                ISSUE_PRIORITIES.join(", ")
            ));
        }
    }
    let status = check.required_string("status");
    check.known("status", status, &known.statuses, "status");
    match check.get("comments") {
        None => {}
        Some(Value::Array(comments)) => {
            for (idx, comment) in comments.iter().enumerate() {
                let author = comment.get("author").filter(|v| !v.is_null());
                if author.is_none() {
                    check.fail(format!("comments[{idx}].author is required"));
                }
                let text = comment.get("text").and_then(Value::as_str).unwrap_or_default();
                if text.trim().is_empty() {
                    check.fail(format!("comments[{idx}].text must not be empty"));
                }
            }
        }
        Some(other) => check.fail(format!("comments must be an array, got {}", kind_of(other))),
    }
}

fn validate_controlled(check: &mut Checker<'_>, known: &KnownNames) {
    if let Some(state) = check.string("state") {
        if state != DRAFT_STATE {
            check.fail(format!("state must be '{DRAFT_STATE}', got '{state}'"));
        }
    }
    check.string("code");
    check.non_negative(&["major", "minor", "seqNumber"]);
    check.string_arrays(&["reviewers", "approvers", "coAuthors"]);
    check.strings(&[
        "author",
        "owner",
        "abstract",
        "ccDescription",
        "ccImpact",
        "ccReason",
    ]);
    let category = check.string("category");
    check.known("category", category, &known.categories, "category");
}

pub fn validate_project_type(project_type: &ImportProjectType) -> Vec<String> {
    let mut errors = Vec::new();
    if project_type.name.trim().is_empty() {
        errors.push("name is required".to_string());
    }
    for (idx, task_type) in project_type.task_types.iter().enumerate() {
        if task_type.name.trim().is_empty() {
            errors.push(format!("taskTypes[{idx}].name is required"));
        }
        for (sidx, status) in task_type.statuses.iter().enumerate() {
            if status.name.trim().is_empty() {
                errors.push(format!("taskTypes[{idx}].statuses[{sidx}].name is required"));
            }
        }
    }
    errors
}
