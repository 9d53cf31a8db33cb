use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::UndefinedVariable;
use crate::value::Value;

/// Shared handle to a scope. Blocks and calls hold one for their duration,
/// closures hold one for as long as the function value lives.
pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    // the global scope
    pub fn new() -> Environment {
        Environment::default()
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Environment {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    pub fn into_ref(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    pub fn enclosing(&self) -> Option<&EnvRef> {
        self.enclosing.as_ref()
    }

    /// Bind `name` in this scope only, replacing any previous binding here and
    /// shadowing bindings of the same name further out.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Result<Value, UndefinedVariable> {
        if let Some(value) = self.values.get(name) {
            return Ok(value.clone());
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().get(name),
            None => Err(UndefinedVariable(name.to_string())),
        }
    }

    /// Rebind `name` in the nearest scope that already defines it.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), UndefinedVariable> {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            return Ok(());
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign(name, value),
            None => Err(UndefinedVariable(name.to_string())),
        }
    }

    pub fn is_defined_locally(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}
