use crate::constraints::validator::{CustomValidator, FieldError};
use crate::constraints::ConstraintSpec;
use crate::error::{ModelError, ModelResult};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use trellis_core::naming::property_name;

pub const DEFAULT_NULL_MESSAGE: &str = "Property [{0}] of class [{1}] cannot be null";
pub const DEFAULT_BLANK_MESSAGE: &str = "Property [{0}] of class [{1}] cannot be blank";
pub const DEFAULT_MIN_SIZE_MESSAGE: &str =
    "Property [{0}] of class [{1}] with value [{2}] is less than the minimum size of [{3}]";
pub const DEFAULT_MAX_SIZE_MESSAGE: &str =
    "Property [{0}] of class [{1}] with value [{2}] exceeds the maximum size of [{3}]";
pub const DEFAULT_MATCHES_MESSAGE: &str =
    "Property [{0}] of class [{1}] with value [{2}] does not match the required pattern [{3}]";
pub const DEFAULT_IN_LIST_MESSAGE: &str =
    "Property [{0}] of class [{1}] with value [{2}] is not contained within the list [{3}]";
pub const DEFAULT_INVALID_VALIDATOR_MESSAGE: &str =
    "Property [{0}] of class [{1}] with value [{2}] does not pass custom validation";

/// A single rule applied to a property
#[derive(Debug, Clone)]
pub enum Constraint {
    Nullable(bool),
    Blank(bool),
    MinSize(usize),
    MaxSize(usize),
    Matches(Regex),
    InList(Vec<Value>),
    Validator(CustomValidator),
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constraint::Nullable(a), Constraint::Nullable(b)) => a == b,
            (Constraint::Blank(a), Constraint::Blank(b)) => a == b,
            (Constraint::MinSize(a), Constraint::MinSize(b)) => a == b,
            (Constraint::MaxSize(a), Constraint::MaxSize(b)) => a == b,
            (Constraint::Matches(a), Constraint::Matches(b)) => a.as_str() == b.as_str(),
            (Constraint::InList(a), Constraint::InList(b)) => a == b,
            (Constraint::Validator(a), Constraint::Validator(b)) => a == b,
            _ => false,
        }
    }
}

impl Constraint {
    pub fn name(&self) -> &'static str {
        match self {
            Constraint::Nullable(_) => "nullable",
            Constraint::Blank(_) => "blank",
            Constraint::MinSize(_) => "minSize",
            Constraint::MaxSize(_) => "maxSize",
            Constraint::Matches(_) => "matches",
            Constraint::InList(_) => "inList",
            Constraint::Validator(_) => "validator",
        }
    }
}

/// Why a value was rejected, before codes are qualified with the class and property
struct Rejection {
    codes: Vec<String>,
    default_message: &'static str,
    extra_args: Vec<Value>,
}

impl Rejection {
    fn new(constraint: &str, code: &str, default_message: &'static str, extra_args: Vec<Value>) -> Self {
        Self {
            codes: vec![format!("{}.error", constraint), code.to_string()],
            default_message,
            extra_args,
        }
    }
}

fn size_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        _ => None,
    }
}

/// The constraints in force for one persistent property
#[derive(Debug, Clone, PartialEq)]
pub struct ConstrainedProperty {
    owner: String,
    property: String,
    property_type: String,
    constraints: IndexMap<&'static str, Constraint>,
}

impl ConstrainedProperty {
    pub fn new(
        owner: impl Into<String>,
        property: impl Into<String>,
        property_type: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            property: property.into(),
            property_type: property_type.into(),
            constraints: IndexMap::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn property_type(&self) -> &str {
        &self.property_type
    }

    /// Add or replace a constraint
    pub fn apply(&mut self, constraint: Constraint) {
        self.constraints.insert(constraint.name(), constraint);
    }

    /// Apply every constraint set in `spec`, replacing earlier ones of the same kind
    pub fn apply_spec(&mut self, spec: &ConstraintSpec) -> ModelResult<()> {
        if let Some(nullable) = spec.nullable {
            self.apply(Constraint::Nullable(nullable));
        }
        if let Some(blank) = spec.blank {
            self.apply(Constraint::Blank(blank));
        }
        if let Some(min) = spec.min_size {
            self.apply(Constraint::MinSize(min));
        }
        if let Some(max) = spec.max_size {
            self.apply(Constraint::MaxSize(max));
        }
        if let Some(pattern) = &spec.matches {
            let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
                ModelError::invalid_constraint(&self.owner, &self.property, e.to_string())
            })?;
            self.apply(Constraint::Matches(regex));
        }
        if let Some(values) = &spec.in_list {
            self.apply(Constraint::InList(values.clone()));
        }
        Ok(())
    }

    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.get(name)
    }

    pub fn applied_constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.values()
    }

    pub fn is_nullable(&self) -> bool {
        !matches!(self.constraint("nullable"), Some(Constraint::Nullable(false)))
    }

    pub fn is_blank(&self) -> bool {
        !matches!(self.constraint("blank"), Some(Constraint::Blank(false)))
    }

    pub fn has_validator(&self) -> bool {
        self.constraints.contains_key("validator")
    }

    /// Check this property's value on `instance`
    pub fn validate(&self, instance: &Value) -> ModelResult<Vec<FieldError>> {
        let value = instance.get(&self.property).cloned().unwrap_or(Value::Null);
        let mut errors = Vec::new();

        if value.is_null() {
            if !self.is_nullable() {
                errors.push(self.field_error(
                    &value,
                    Rejection::new("nullable", "nullable", DEFAULT_NULL_MESSAGE, Vec::new()),
                ));
            }
            return Ok(errors);
        }

        for constraint in self.constraints.values() {
            if let Some(rejection) = self.check(constraint, &value, instance)? {
                errors.push(self.field_error(&value, rejection));
            }
        }

        Ok(errors)
    }

    fn check(
        &self,
        constraint: &Constraint,
        value: &Value,
        instance: &Value,
    ) -> ModelResult<Option<Rejection>> {
        let rejection = match constraint {
            Constraint::Nullable(_) => None,
            Constraint::Blank(false) => value
                .as_str()
                .filter(|s| s.trim().is_empty())
                .map(|_| Rejection::new("blank", "blank", DEFAULT_BLANK_MESSAGE, Vec::new())),
            Constraint::Blank(true) => None,
            Constraint::MinSize(min) => size_of(value).filter(|size| size < min).map(|_| {
                Rejection::new("minSize", "minSize.notmet", DEFAULT_MIN_SIZE_MESSAGE, vec![Value::from(*min)])
            }),
            Constraint::MaxSize(max) => size_of(value).filter(|size| size > max).map(|_| {
                Rejection::new("maxSize", "maxSize.exceeded", DEFAULT_MAX_SIZE_MESSAGE, vec![Value::from(*max)])
            }),
            Constraint::Matches(regex) => value.as_str().filter(|s| !regex.is_match(s)).map(|_| {
                Rejection::new(
                    "matches",
                    "matches.invalid",
                    DEFAULT_MATCHES_MESSAGE,
                    vec![Value::from(regex.as_str())],
                )
            }),
            Constraint::InList(values) => (!values.contains(value)).then(|| {
                Rejection::new("inList", "not.inList", DEFAULT_IN_LIST_MESSAGE, vec![Value::from(values.clone())])
            }),
            Constraint::Validator(validator) => self.custom_result(validator.call(value, instance))?,
        };
        Ok(rejection)
    }

    fn custom_result(&self, result: Value) -> ModelResult<Option<Rejection>> {
        match result {
            Value::Null | Value::Bool(true) => Ok(None),
            Value::Bool(false) => Ok(Some(Rejection::new(
                "validator",
                "validator.invalid",
                DEFAULT_INVALID_VALIDATOR_MESSAGE,
                Vec::new(),
            ))),
            Value::String(code) => Ok(Some(Rejection {
                codes: vec![code],
                default_message: DEFAULT_INVALID_VALIDATOR_MESSAGE,
                extra_args: Vec::new(),
            })),
            Value::Array(items) => {
                let mut items = items.into_iter();
                match items.next() {
                    Some(Value::String(code)) => Ok(Some(Rejection {
                        codes: vec![code],
                        default_message: DEFAULT_INVALID_VALIDATOR_MESSAGE,
                        extra_args: items.collect(),
                    })),
                    _ => Err(ModelError::invalid_constraint(
                        &self.owner,
                        &self.property,
                        "custom validator returned a list whose first element is not a message code",
                    )),
                }
            }
            other => Err(ModelError::invalid_constraint(
                &self.owner,
                &self.property,
                format!("custom validator returned unsupported value {}", other),
            )),
        }
    }

    fn field_error(&self, value: &Value, rejection: Rejection) -> FieldError {
        let prefix = format!("{}.{}", property_name(&self.owner), self.property);
        let mut arguments = vec![
            Value::from(self.property.as_str()),
            Value::from(self.owner.as_str()),
            value.clone(),
        ];
        arguments.extend(rejection.extra_args);

        FieldError {
            object_name: self.owner.clone(),
            field: self.property.clone(),
            rejected_value: value.clone(),
            codes: rejection
                .codes
                .iter()
                .map(|code| format!("{}.{}", prefix, code))
                .collect(),
            arguments,
            default_message: rejection.default_message.to_string(),
        }
    }
}
