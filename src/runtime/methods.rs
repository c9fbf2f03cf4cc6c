use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    ir::IrScope,
    runtime::{RuntimeError, Value},
};

/// A method implemented by the host: `(receiver, args) -> value`.
pub type Builtin = fn(&Value, &[Value]) -> Result<Value, RuntimeError>;

#[derive(Clone)]
pub enum Method {
    Compiled(Arc<IrScope>),
    Builtin(Builtin),
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Compiled(scope) => write!(f, "Compiled({:?})", scope.name),
            Method::Builtin(_) => write!(f, "Builtin"),
        }
    }
}

/// Methods by class name, then by method name.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    classes: HashMap<String, HashMap<String, Method>>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines (or redefines) a compiled method.
    pub fn define(&mut self, class: &str, name: &str, body: IrScope) -> Arc<IrScope> {
        let body = Arc::new(body);
        self.insert(class, name, Method::Compiled(body.clone()));
        body
    }

    pub fn define_builtin(&mut self, class: &str, name: &str, builtin: Builtin) {
        self.insert(class, name, Method::Builtin(builtin));
    }

    fn insert(&mut self, class: &str, name: &str, method: Method) {
        self.classes
            .entry(class.to_string())
            .or_default()
            .insert(name.to_string(), method);
    }

    pub fn lookup(&self, class: &str, name: &str) -> Option<&Method> {
        self.classes.get(class)?.get(name)
    }

    /// The body of a compiled method, `None` for builtins.
    pub fn compiled(&self, class: &str, name: &str) -> Option<Arc<IrScope>> {
        match self.lookup(class, name)? {
            Method::Compiled(body) => Some(body.clone()),
            Method::Builtin(_) => None,
        }
    }

    /// Every compiled method as `(class, name, body)`.
    pub fn compiled_methods(&self) -> Vec<(String, String, Arc<IrScope>)> {
        self.classes
            .iter()
            .flat_map(|(class, methods)| {
                methods.iter().filter_map(move |(name, method)| match method {
                    Method::Compiled(body) => Some((class.clone(), name.clone(), body.clone())),
                    Method::Builtin(_) => None,
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.classes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ScopeKind;

    fn identity(receiver: &Value, _args: &[Value]) -> Result<Value, RuntimeError> {
        Ok(receiver.clone())
    }

    #[test]
    fn lookup_by_class() {
        let mut table = MethodTable::new();
        table.define_builtin("Integer", "itself", identity);
        table.define("Point", "x", IrScope::new("x", ScopeKind::Method));
        assert!(table.lookup("Integer", "itself").is_some());
        assert!(table.lookup("Point", "itself").is_none());
        assert!(table.compiled("Integer", "itself").is_none());
        assert!(table.compiled("Point", "x").is_some());
        assert_eq!(table.len(), 2);
        assert_eq!(table.compiled_methods().len(), 1);
    }
}
