use std::{cell::RefCell, collections::HashMap, fmt, rc::Rc};

use crate::{common::Span, value::Value};

pub type ScopeRef = Rc<RefCell<Scope>>;

/// A variable environment. Lookups walk up the parent chain, writes always
/// land in the local bindings.
#[derive(Default)]
pub struct Scope {
    bindings: HashMap<String, Value>,
    parent: Option<ScopeRef>,
}

impl Scope {
    pub fn new_root() -> ScopeRef {
        Rc::new(RefCell::new(Scope::default()))
    }

    pub fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            bindings: HashMap::new(),
            parent: Some(Rc::clone(parent)),
        }))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        match self.bindings.get(name) {
            Some(value) => Some(value.clone()),
            None => self
                .parent
                .as_ref()
                .and_then(|parent| parent.borrow().get(name)),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Overwrites an existing binding in the nearest scope that holds `name`.
    /// Returns `false` when no scope in the chain binds it.
    pub fn replace(&mut self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.bindings.get_mut(name) {
            *slot = value;
            return true;
        }

        match &self.parent {
            Some(parent) => parent.borrow_mut().replace(name, value),
            None => false,
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.bindings.keys().collect::<Vec<_>>();
        names.sort();

        f.debug_struct("Scope")
            .field("bindings", &names)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

/// One call frame. `parent` and `call_site` only feed tracebacks; variable
/// resolution goes through `scope`.
pub struct Context {
    pub display_name: String,
    pub parent: Option<Rc<Context>>,
    pub call_site: Option<Span>,
    pub scope: ScopeRef,
}

impl Context {
    pub fn root(display_name: impl Into<String>, scope: ScopeRef) -> Rc<Self> {
        Rc::new(Context {
            display_name: display_name.into(),
            parent: None,
            call_site: None,
            scope,
        })
    }

    pub fn call_frame(
        display_name: impl Into<String>,
        parent: &Rc<Context>,
        call_site: Span,
        scope: ScopeRef,
    ) -> Rc<Self> {
        Rc::new(Context {
            display_name: display_name.into(),
            parent: Some(Rc::clone(parent)),
            call_site: Some(call_site),
            scope,
        })
    }

    /// Walks the frame chain from `self` outwards, pairing each frame with
    /// the location execution had reached inside it. Innermost frame first.
    pub fn frames(&self, failure_site: &Span) -> Vec<(Span, String)> {
        let mut frames = vec![(failure_site.clone(), self.display_name.clone())];
        let mut position = self.call_site.clone();
        let mut parent = self.parent.as_deref();

        while let (Some(site), Some(frame)) = (position, parent) {
            frames.push((site, frame.display_name.clone()));
            position = frame.call_site.clone();
            parent = frame.parent.as_deref();
        }

        frames
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("display_name", &self.display_name)
            .field("call_site", &self.call_site)
            .field("parent", &self.parent.as_ref().map(|p| &p.display_name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Number, Value};

    fn int(value: i64) -> Value {
        Value::number(Number::Int(value))
    }

    #[test]
    fn lookup_walks_parent_chain() {
        let root = Scope::new_root();
        root.borrow_mut().set("x", int(1));
        let child = Scope::child(&root);

        assert_eq!(child.borrow().get("x"), Some(int(1)));
        assert_eq!(child.borrow().get("y"), None);
    }

    #[test]
    fn set_writes_local_only() {
        let root = Scope::new_root();
        root.borrow_mut().set("x", int(1));
        let child = Scope::child(&root);
        child.borrow_mut().set("x", int(2));

        assert_eq!(root.borrow().get("x"), Some(int(1)));
        assert_eq!(child.borrow().get("x"), Some(int(2)));
    }

    #[test]
    fn replace_updates_nearest_binding() {
        let root = Scope::new_root();
        root.borrow_mut().set("x", int(1));
        let child = Scope::child(&root);

        assert!(child.borrow_mut().replace("x", int(5)));
        assert!(child.borrow().bindings.is_empty());
        assert_eq!(root.borrow().get("x"), Some(int(5)));
        assert!(!child.borrow_mut().replace("missing", int(0)));
    }
}
