use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use jt_core::{CompilationContext, TemplateError, Variable};
use jt_runtime::{CompiledNode, ExecutionContext, Lookup, Overlay, Scope, Validator};
use serde_json::Value;

use super::MethodCompiler;

pub(super) fn compile(
    compiler: &dyn MethodCompiler,
    argv: &Rc<CompilationContext>,
    args: &Rc<CompilationContext>,
) -> Result<CompiledNode, TemplateError> {
    let Value::Object(definitions) = argv.template() else {
        compiler.report(TemplateError::template(
            "TEMPLATE_INVALID_ARGUMENT",
            "method argument must be an object",
            argv,
        ))?;
        return Ok(CompiledNode::undefined());
    };

    let body = compiler
        .compile_arg(args, "in", true, None)?
        .unwrap_or_else(CompiledNode::undefined);

    let mut bindings = BTreeMap::new();
    for name in definitions.keys() {
        if let Some(child) = argv.key(name) {
            let compiled = compiler.compile(&child, Some(Validator::IS_DEFINED))?;
            bindings.insert(name.clone(), compiled);
        }
    }
    let bindings = Rc::new(bindings);

    Ok(CompiledNode::dynamic(move |scope, exec| {
        let frame = DefineFrame::new(Rc::clone(&bindings), exec.clone());
        body.eval(&scope.overlay(frame), exec)
    }))
}

enum Slot {
    Initializing,
    Ready(Option<Variable>),
}

/// The bindings of one `define` block during one evaluation. Each binding
/// is evaluated on first lookup and memoized.
struct DefineFrame {
    bindings: Rc<BTreeMap<String, CompiledNode>>,
    slots: RefCell<BTreeMap<String, Slot>>,
    exec: ExecutionContext,
    this: Weak<DefineFrame>,
}

impl DefineFrame {
    fn new(bindings: Rc<BTreeMap<String, CompiledNode>>, exec: ExecutionContext) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            bindings,
            slots: RefCell::new(BTreeMap::new()),
            exec,
            this: this.clone(),
        })
    }

    fn ready(&self, name: &str) -> Option<Option<Variable>> {
        match self.slots.borrow().get(name) {
            Some(Slot::Ready(value)) => Some(value.clone()),
            _ => None,
        }
    }
}

impl Overlay for DefineFrame {
    fn lookup(&self, name: &str, parent: &Scope) -> Result<Lookup, TemplateError> {
        let Some(compiled) = self.bindings.get(name) else {
            return Ok(Lookup::Defer);
        };
        match self.slots.borrow().get(name) {
            Some(Slot::Ready(value)) => return Ok(Lookup::Found(value.clone())),
            Some(Slot::Initializing) => return Ok(Lookup::Defer),
            None => {}
        }

        self.slots
            .borrow_mut()
            .insert(name.to_string(), Slot::Initializing);

        // Siblings are not visible: the binding sees the parent scope plus itself.
        let own_scope = parent.overlay(Rc::new(SelfBinding {
            frame: self.this.clone(),
            name: name.to_string(),
        }));
        let value = compiled.eval(&own_scope, &self.exec)?;

        self.slots
            .borrow_mut()
            .insert(name.to_string(), Slot::Ready(value.clone()));
        Ok(Lookup::Found(value))
    }
}

/// Resolves a binding's own name once it is initialized, enabling recursion.
struct SelfBinding {
    frame: Weak<DefineFrame>,
    name: String,
}

impl Overlay for SelfBinding {
    fn lookup(&self, name: &str, _parent: &Scope) -> Result<Lookup, TemplateError> {
        if name != self.name {
            return Ok(Lookup::Defer);
        }
        let ready = self.frame.upgrade().and_then(|frame| frame.ready(name));
        Ok(match ready {
            Some(value) => Lookup::Found(value),
            None => Lookup::Defer,
        })
    }
}
