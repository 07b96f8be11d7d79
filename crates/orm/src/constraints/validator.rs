use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub type ValidatorFn = dyn Fn(&Value, &Value) -> Value + Send + Sync;

/// Custom validation callback, called with `(value, instance)`.
///
/// The returned value decides the outcome:
/// - `true` or `null`: valid
/// - `false`: rejected with the `validator.invalid` code
/// - a string: rejected with that message code
/// - an array starting with a string: rejected with that code, remaining
///   elements appended to the message arguments
#[derive(Clone)]
pub struct CustomValidator(Arc<ValidatorFn>);

impl CustomValidator {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &Value) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, value: &Value, instance: &Value) -> Value {
        (self.0)(value, instance)
    }
}

impl PartialEq for CustomValidator {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for CustomValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomValidator")
    }
}

/// A rejected property value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub object_name: String,
    pub field: String,
    pub rejected_value: Value,
    /// Message codes, most specific first
    pub codes: Vec<String>,
    /// `[property, type, value, ...]`
    pub arguments: Vec<Value>,
    pub default_message: String,
}

impl FieldError {
    pub fn code(&self) -> &str {
        self.codes.first().map(String::as_str).unwrap_or_default()
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c == code)
    }

    /// Default message with `{n}` placeholders filled from the arguments
    pub fn message(&self) -> String {
        self.arguments
            .iter()
            .enumerate()
            .fold(self.default_message.clone(), |message, (index, argument)| {
                let text = match argument {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                message.replace(&format!("{{{}}}", index), &text)
            })
    }
}
