//! Validator registry
//!
//! Column validators are predicates over a value. They cannot be stored in
//! the JSON file, so schemas reference them by name and the registry resolves
//! the name when a table is created or loaded.

use crate::error::{Error, Result};
use crate::storage::Value;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Name of the built-in email validator
pub const EMAIL: &str = "email";

const EMAIL_PATTERN: &str = r"^[^@]+@[^@]+\.[^@]+";

/// A value predicate
pub type ValidatorFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Maps validator names to predicates
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: HashMap<String, ValidatorFn>,
}

impl ValidatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in validators (`email`)
    pub fn with_builtins() -> Self {
        let email = Regex::new(EMAIL_PATTERN).expect("email pattern is a valid regex");
        Self::new().with(EMAIL, move |value: &Value| {
            value.as_str().is_some_and(|s| email.is_match(s))
        })
    }

    /// Register a validator, builder style
    pub fn with<F>(mut self, name: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.register(name, validator);
        self
    }

    /// Register or replace a validator
    pub fn register<F>(&mut self, name: impl Into<String>, validator: F)
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validators.insert(name.into(), Arc::new(validator));
    }

    pub fn get(&self, name: &str) -> Option<&ValidatorFn> {
        self.validators.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    /// Resolve a name, failing if it is not registered
    pub fn resolve(&self, name: &str) -> Result<&ValidatorFn> {
        self.get(name)
            .ok_or_else(|| Error::UnknownValidator(name.to_string()))
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.validators.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ValidatorRegistry")
            .field("validators", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_email() {
        let registry = ValidatorRegistry::with_builtins();
        let email = registry.resolve(EMAIL).unwrap();

        assert!(email(&Value::from("user1@gmail.com")));
        assert!(!email(&Value::from("user1.gmail.com")));
        assert!(!email(&Value::from("user1@gmail")));
        assert!(!email(&Value::from(42)));
    }

    #[test]
    fn test_custom_validator() {
        let registry = ValidatorRegistry::new()
            .with("positive", |v: &Value| v.as_i64().is_some_and(|i| i > 0));

        assert!(registry.contains("positive"));
        assert!(!registry.contains(EMAIL));
        assert!(registry.resolve("positive").unwrap()(&Value::from(3)));
        assert!(matches!(
            registry.resolve("missing"),
            Err(Error::UnknownValidator(name)) if name == "missing"
        ));
    }
}
