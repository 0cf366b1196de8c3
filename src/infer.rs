//! Assigns a concrete kind to every binding, parameter and return value.
//!
//! Globals are inferred first, in source order. Functions then go through a
//! worklist: a function whose parameter kinds are still unknown, or which
//! uses the value of a call whose return kind is still unknown, is retried
//! once other functions have made progress.

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::builtins::{CallTable, Returns, Rewrite};
use crate::error::{Error, Result};
use crate::kind::Kind;
use crate::parser::ast::{
    AssignTarget, BinaryOperator, Binding, Expression, FunctionDef, Program, RangeBounds,
    Signature, Statement, StatementKind, UnaryOperator,
};

use self::scope::{Globals, Lookup, Scope};

mod scope;

#[derive(Debug, Clone)]
struct SignatureState {
    line: usize,
    params: Vec<(String, Option<Kind>)>,
    returns: Option<Kind>,
}

type Signatures = FxHashMap<String, SignatureState>;

enum Stall {
    Error(Error),
    /// Blocked on a kind another function has not produced yet. The error is
    /// reported if the worklist stops making progress.
    Pending(Error),
}

impl From<Error> for Stall {
    fn from(error: Error) -> Self {
        Self::Error(error)
    }
}

impl Stall {
    fn into_error(self) -> Error {
        match self {
            Self::Error(error) | Self::Pending(error) => error,
        }
    }
}

type Inferred<T> = std::result::Result<T, Stall>;

pub fn infer(program: &mut Program, calls: &CallTable) -> Result<()> {
    let mut signatures = collect_signatures(program, calls)?;
    let globals = infer_globals(program, calls, &mut signatures)?;
    infer_functions(program, calls, &globals, &mut signatures)?;

    for entry_point in ["setup", "loop"] {
        if !signatures.contains_key(entry_point) {
            warn!("program has no {entry_point}() function; the sketch will not link");
        }
    }
    debug!(
        globals = globals.len(),
        functions = signatures.len(),
        "inferred program"
    );
    Ok(())
}

fn collect_signatures(program: &Program, calls: &CallTable) -> Result<Signatures> {
    let mut signatures = Signatures::default();
    for statement in &program.statements {
        let StatementKind::FunctionDef(function) = &statement.kind else {
            continue;
        };
        if signatures.contains_key(&function.name) {
            return Err(Error::unsupported(
                statement.line,
                format!("redefining function `{}`", function.name),
            ));
        }
        if calls.call(&function.name).is_some() || calls.constant(&function.name).is_some() {
            return Err(Error::unsupported(
                statement.line,
                format!("defining `{}`, which is a runtime name", function.name),
            ));
        }
        let returns = if function.is_entry_point {
            Some(Kind::Void)
        } else {
            function.returns.clone()
        };
        signatures.insert(
            function.name.clone(),
            SignatureState {
                line: statement.line,
                params: function
                    .params
                    .iter()
                    .map(|param| (param.name.clone(), param.annotation.clone()))
                    .collect(),
                returns,
            },
        );
    }
    Ok(signatures)
}

fn infer_globals(
    program: &mut Program,
    calls: &CallTable,
    signatures: &mut Signatures,
) -> Result<Globals> {
    let mut inferencer = BodyInferencer::new(calls, signatures, Scope::module(), None);
    for statement in &mut program.statements {
        if matches!(statement.kind, StatementKind::Assignment { .. }) {
            inferencer
                .infer_statement(statement)
                .map_err(Stall::into_error)?;
        }
    }
    Ok(inferencer.scope.into_symbols())
}

/// Number of parameter and return kinds known so far; the worklist stops
/// when a round leaves it unchanged.
fn resolved_count(signatures: &Signatures) -> usize {
    signatures
        .values()
        .map(|signature| {
            signature
                .params
                .iter()
                .filter(|(_, kind)| kind.is_some())
                .count()
                + usize::from(signature.returns.is_some())
        })
        .sum()
}

fn infer_functions(
    program: &mut Program,
    calls: &CallTable,
    globals: &Globals,
    signatures: &mut Signatures,
) -> Result<()> {
    let mut pending: Vec<usize> = program
        .statements
        .iter()
        .enumerate()
        .filter(|(_, statement)| matches!(statement.kind, StatementKind::FunctionDef(_)))
        .map(|(index, _)| index)
        .collect();

    while !pending.is_empty() {
        let known_before = resolved_count(signatures);
        let count_before = pending.len();
        let mut blocker = None;
        let mut remaining = Vec::new();

        for index in pending {
            let statement = &mut program.statements[index];
            let line = statement.line;
            let StatementKind::FunctionDef(function) = &mut statement.kind else {
                continue;
            };
            match infer_function(function, line, calls, globals, signatures) {
                Ok(()) => {}
                Err(Stall::Error(error)) => return Err(error),
                Err(Stall::Pending(error)) => {
                    blocker.get_or_insert(error);
                    remaining.push(index);
                }
            }
        }

        if let Some(error) = blocker
            && remaining.len() == count_before
            && resolved_count(signatures) == known_before
        {
            return Err(error);
        }
        pending = remaining;
    }
    Ok(())
}

fn infer_function(
    function: &mut FunctionDef,
    line: usize,
    calls: &CallTable,
    globals: &Globals,
    signatures: &mut Signatures,
) -> Inferred<()> {
    let state = signatures
        .get(&function.name)
        .cloned()
        .ok_or_else(|| Error::internal(line, format!("no signature for `{}`", function.name)))?;

    let mut params = Vec::with_capacity(state.params.len());
    for (name, kind) in &state.params {
        let Some(kind) = kind else {
            return Err(Stall::Pending(Error::unsupported(
                state.line,
                format!(
                    "cannot infer the type of parameter `{name}` of `{}()`; annotate it (`{name}: int`)",
                    function.name
                ),
            )));
        };
        params.push(kind.clone());
    }

    let mut scope = Scope::function(globals, line);
    for (param, kind) in function.params.iter().zip(&params) {
        scope.declare(&param.name, kind.clone(), line);
    }
    let context = FunctionContext {
        name: function.name.clone(),
        is_entry_point: function.is_entry_point,
        annotated: state.returns.clone(),
        returned: None,
    };
    let mut inferencer = BodyInferencer::new(calls, signatures, scope, Some(context));
    inferencer.infer_block(&mut function.body)?;
    let (hoisted, returned) = inferencer.finish();

    let returns = state.returns.or(returned).unwrap_or(Kind::Void);
    if let Some(signature) = signatures.get_mut(&function.name) {
        signature.returns = Some(returns.clone());
    }
    debug!(
        function = %function.name,
        params = ?params,
        returns = %returns,
        hoisted = hoisted.len(),
        "inferred signature"
    );
    function.signature = Some(Signature { params, returns });
    function.hoisted = hoisted;
    Ok(())
}

#[derive(Debug)]
struct FunctionContext {
    name: String,
    is_entry_point: bool,
    annotated: Option<Kind>,
    returned: Option<Kind>,
}

struct BodyInferencer<'a, 'g> {
    calls: &'a CallTable,
    signatures: &'a mut Signatures,
    scope: Scope<'g>,
    /// `None` while inferring module-level assignments.
    function: Option<FunctionContext>,
    hoisted: Vec<(String, Kind)>,
    depth: usize,
    /// Variables of the counted loops enclosing the current statement.
    loop_vars: Vec<String>,
}

impl<'a, 'g> BodyInferencer<'a, 'g> {
    fn new(
        calls: &'a CallTable,
        signatures: &'a mut Signatures,
        scope: Scope<'g>,
        function: Option<FunctionContext>,
    ) -> Self {
        Self {
            calls,
            signatures,
            scope,
            function,
            hoisted: Vec::new(),
            depth: 0,
            loop_vars: Vec::new(),
        }
    }

    fn finish(self) -> (Vec<(String, Kind)>, Option<Kind>) {
        (
            self.hoisted,
            self.function.and_then(|function| function.returned),
        )
    }

    fn infer_block(&mut self, body: &mut [Statement]) -> Inferred<()> {
        for statement in body {
            self.infer_statement(statement)?;
        }
        Ok(())
    }

    fn infer_statement(&mut self, statement: &mut Statement) -> Inferred<()> {
        let line = statement.line;
        match &mut statement.kind {
            StatementKind::Assignment {
                target,
                value,
                annotation,
                binding,
            } => {
                *binding = match target {
                    AssignTarget::Name(name) => {
                        self.assign_name(name, value, annotation.as_ref(), line)?
                    }
                    AssignTarget::Index { name, index } => {
                        self.assign_element(name, index, value, line)?
                    }
                };
            }
            StatementKind::Conditional {
                condition,
                then_body,
                else_body,
            } => {
                let kind = self.expr_kind(condition, line)?;
                if !kind.is_scalar() || kind == Kind::Str {
                    return Err(Error::inconsistent(line, "condition", Kind::Bool, kind).into());
                }
                self.depth += 1;
                self.infer_block(then_body)?;
                self.infer_block(else_body)?;
                self.depth -= 1;
            }
            StatementKind::CountedLoop {
                var,
                range,
                body,
                binding,
            } => {
                *binding = self.infer_loop(var, range, body, line)?;
            }
            StatementKind::Expr(Expression::Call { callee, args }) => {
                self.call_kind(callee, args, line, true)?;
            }
            StatementKind::Expr(expression) => {
                self.expr_kind(expression, line)?;
            }
            StatementKind::Return(value) => self.infer_return(value.as_ref(), line)?,
            StatementKind::Global(names) => {
                for name in names.iter() {
                    self.declare_global(name, line)?;
                }
            }
            StatementKind::FunctionDef(function) => {
                return Err(Error::internal(
                    line,
                    format!("nested function `{}` reached the inferencer", function.name),
                )
                .into());
            }
            StatementKind::Comment { .. }
            | StatementKind::Blank
            | StatementKind::Pass
            | StatementKind::Break
            | StatementKind::Continue => {}
        }
        Ok(())
    }

    fn assign_name(
        &mut self,
        name: &str,
        value: &Expression,
        annotation: Option<&Kind>,
        line: usize,
    ) -> Inferred<Binding> {
        if self.scope.is_module() && self.signatures.contains_key(name) {
            return Err(Error::unsupported(
                line,
                format!("global `{name}` shares its name with a function"),
            )
            .into());
        }
        if self.calls.constant(name).is_some() || self.calls.call(name).is_some() {
            return Err(
                Error::unsupported(line, format!("assigning to runtime name `{name}`")).into(),
            );
        }
        self.check_not_loop_var(name, line)?;

        let kind = match value {
            Expression::List(elements) => {
                if self.depth > 0 {
                    return Err(Error::unsupported(
                        line,
                        "list literals inside blocks (declare lists at the top of a function or module)",
                    )
                    .into());
                }
                self.list_kind(elements, line)?
            }
            other => self.expr_kind(other, line)?,
        };

        match self.scope.lookup(name) {
            Lookup::Local(_) if self.scope.is_module() => Err(Error::unsupported(
                line,
                format!("re-assigning global `{name}` at module level"),
            )
            .into()),
            Lookup::Local(existing) => self.reassign(name, &existing, &kind, annotation, line),
            Lookup::Global(existing) if self.scope.is_declared_global(name) => {
                self.reassign(name, &existing, &kind, annotation, line)
            }
            Lookup::Global(_) | Lookup::Later(_) if self.scope.was_global_read(name) => {
                Err(Error::unbound(
                    line,
                    name,
                    "assigned after being read from the global scope in the same function; \
                     declare it `global` or use another name",
                )
                .into())
            }
            _ => self.declare(name, kind, annotation, line),
        }
    }

    fn reassign(
        &self,
        name: &str,
        existing: &Kind,
        kind: &Kind,
        annotation: Option<&Kind>,
        line: usize,
    ) -> Inferred<Binding> {
        if matches!(existing, Kind::Array { .. }) || matches!(kind, Kind::Array { .. }) {
            return Err(Error::unsupported(
                line,
                format!("re-assigning list `{name}` (assign its elements instead)"),
            )
            .into());
        }
        let subject = format!("'{name}'");
        if let Some(annotation) = annotation
            && annotation != existing
        {
            return Err(Error::inconsistent(line, subject, existing, annotation).into());
        }
        if kind != existing {
            return Err(Error::inconsistent(line, subject, existing, kind).into());
        }
        Ok(Binding::Reassign)
    }

    fn declare(
        &mut self,
        name: &str,
        kind: Kind,
        annotation: Option<&Kind>,
        line: usize,
    ) -> Inferred<Binding> {
        let declared = match annotation {
            Some(annotation)
                if matches!(kind, Kind::Array { .. }) || !annotation.accepts(&kind) =>
            {
                return Err(Error::inconsistent(line, format!("'{name}'"), annotation, kind).into());
            }
            Some(annotation) => annotation.clone(),
            None => kind,
        };
        self.scope.declare(name, declared.clone(), line);
        if self.depth == 0 {
            Ok(Binding::Declare(declared))
        } else {
            self.hoisted.push((name.to_string(), declared));
            Ok(Binding::Reassign)
        }
    }

    fn list_kind(&mut self, elements: &[Expression], line: usize) -> Inferred<Kind> {
        let mut element: Option<Kind> = None;
        for item in elements {
            if matches!(item, Expression::List(_)) {
                return Err(Error::unsupported(line, "nested lists").into());
            }
            let kind = self.expr_kind(item, line)?;
            match &element {
                None => element = Some(kind),
                Some(existing) if *existing != kind => {
                    return Err(Error::unsupported(
                        line,
                        format!("mixed-kind list literal ({existing} and {kind})"),
                    )
                    .into());
                }
                Some(_) => {}
            }
        }
        let Some(element) = element else {
            return Err(Error::unsupported(
                line,
                "empty list literals (the element type cannot be inferred)",
            )
            .into());
        };
        Ok(Kind::array(element, elements.len()))
    }

    fn assign_element(
        &mut self,
        name: &str,
        index: &Expression,
        value: &Expression,
        line: usize,
    ) -> Inferred<Binding> {
        if self.scope.is_module() {
            return Err(
                Error::unsupported(line, "assigning list elements at module level").into(),
            );
        }
        let element = self.array_element(name, line)?;
        self.check_index(name, index, line)?;
        let kind = self.expr_kind(value, line)?;
        if !element.accepts(&kind) {
            return Err(
                Error::inconsistent(line, format!("elements of '{name}'"), element, kind).into(),
            );
        }
        Ok(Binding::Reassign)
    }

    /// The C `for` header owns its counter, so the body must not rebind it.
    fn check_not_loop_var(&self, name: &str, line: usize) -> Inferred<()> {
        if self.loop_vars.iter().any(|var| var == name) {
            return Err(Error::unsupported(
                line,
                format!("assigning to loop variable `{name}` inside its loop"),
            )
            .into());
        }
        Ok(())
    }

    fn infer_loop(
        &mut self,
        var: &str,
        range: &RangeBounds,
        body: &mut [Statement],
        line: usize,
    ) -> Inferred<Binding> {
        for bound in range.start.iter().chain(std::iter::once(&range.stop)) {
            let kind = self.expr_kind(bound, line)?;
            if !kind.is_integer() {
                return Err(
                    Error::inconsistent(line, "bounds of `range()`", Kind::Int, kind).into(),
                );
            }
        }

        self.check_not_loop_var(var, line)?;
        let existing = match self.scope.lookup(var) {
            Lookup::Local(kind) => Some(kind),
            Lookup::Global(kind) if self.scope.is_declared_global(var) => Some(kind),
            Lookup::Global(_) | Lookup::Later(_) if self.scope.was_global_read(var) => {
                return Err(Error::unbound(
                    line,
                    var,
                    "used as a loop variable after being read from the global scope",
                )
                .into());
            }
            _ => None,
        };
        let binding = match existing {
            Some(kind) if kind != Kind::Int => {
                return Err(
                    Error::inconsistent(line, format!("'{var}'"), kind, Kind::Int).into(),
                );
            }
            Some(_) => Binding::Reassign,
            None => {
                self.scope.declare(var, Kind::Int, line);
                Binding::Declare(Kind::Int)
            }
        };

        self.depth += 1;
        self.loop_vars.push(var.to_string());
        self.infer_block(body)?;
        self.loop_vars.pop();
        self.depth -= 1;

        if matches!(binding, Binding::Declare(_)) {
            self.scope.remove(var);
        }
        Ok(binding)
    }

    fn infer_return(&mut self, value: Option<&Expression>, line: usize) -> Inferred<()> {
        let kind = match value {
            Some(value) => self.expr_kind(value, line)?,
            None => Kind::Void,
        };
        let Some(function) = self.function.as_mut() else {
            return Err(Error::internal(line, "`return` outside a function").into());
        };
        if function.is_entry_point && kind != Kind::Void {
            return Err(Error::unsupported(
                line,
                format!("returning a value from entry point `{}`", function.name),
            )
            .into());
        }

        let subject = format!("return value of `{}()`", function.name);
        if let Some(expected) = &function.annotated {
            let matches = if *expected == Kind::Void {
                kind == Kind::Void
            } else {
                expected.accepts(&kind)
            };
            if !matches {
                return Err(Error::inconsistent(line, subject, expected, kind).into());
            }
            return Ok(());
        }
        if let Some(previous) = &function.returned {
            if *previous != kind {
                return Err(Error::inconsistent(line, subject, previous, kind).into());
            }
        } else {
            function.returned = Some(kind);
        }
        Ok(())
    }

    fn declare_global(&mut self, name: &str, line: usize) -> Inferred<()> {
        if self.scope.is_local(name) {
            return Err(Error::unsupported(
                line,
                format!("`global {name}` after `{name}` was already bound locally"),
            )
            .into());
        }
        match self.scope.lookup(name) {
            Lookup::Global(_) => {
                self.scope.declare_global(name);
                Ok(())
            }
            Lookup::Later(defined) => Err(Error::unbound(
                line,
                name,
                format!("the global is defined at line {defined}, after this function"),
            )
            .into()),
            Lookup::Local(_) | Lookup::Missing => {
                Err(Error::unbound(line, name, "no global of that name is defined").into())
            }
        }
    }

    fn resolve(&mut self, name: &str, line: usize) -> Inferred<Kind> {
        match self.scope.lookup(name) {
            Lookup::Local(kind) => Ok(kind),
            Lookup::Global(kind) => {
                self.scope.mark_global_read(name);
                Ok(kind)
            }
            Lookup::Later(defined) => Err(Error::unbound(
                line,
                name,
                format!("defined at line {defined}, after this function; move the definition above it"),
            )
            .into()),
            Lookup::Missing => {
                if let Some(kind) = self.calls.constant(name) {
                    return Ok(kind.clone());
                }
                if self.signatures.contains_key(name) {
                    return Err(Error::unsupported(
                        line,
                        format!("using function `{name}` as a value"),
                    )
                    .into());
                }
                Err(Error::unbound(line, name, "not defined before this line").into())
            }
        }
    }

    fn array_element(&mut self, name: &str, line: usize) -> Inferred<Kind> {
        match self.resolve(name, line)? {
            Kind::Array { element, .. } => Ok(*element),
            other => {
                Err(Error::inconsistent(line, format!("'{name}'"), "a list", other).into())
            }
        }
    }

    fn check_index(&mut self, name: &str, index: &Expression, line: usize) -> Inferred<()> {
        let kind = self.expr_kind(index, line)?;
        if !kind.is_integer() {
            return Err(
                Error::inconsistent(line, format!("index of '{name}'"), Kind::Int, kind).into(),
            );
        }
        Ok(())
    }

    fn expr_kind(&mut self, expression: &Expression, line: usize) -> Inferred<Kind> {
        match expression {
            Expression::Literal(literal) => Ok(literal.kind()),
            Expression::Identifier(name) => {
                let kind = self.resolve(name, line)?;
                if matches!(kind, Kind::Array { .. }) {
                    return Err(Error::unsupported(
                        line,
                        format!("using list `{name}` as a value (index it or pass it to len())"),
                    )
                    .into());
                }
                Ok(kind)
            }
            Expression::Unary { op, operand } => {
                let kind = self.expr_kind(operand, line)?;
                if !kind.is_numeric() {
                    let symbol = match op {
                        UnaryOperator::Neg => "-",
                        UnaryOperator::Pos => "+",
                    };
                    return Err(Error::inconsistent(
                        line,
                        format!("operand of unary `{symbol}`"),
                        "a number",
                        kind,
                    )
                    .into());
                }
                Ok(kind)
            }
            Expression::BinaryOp { left, op, right } => {
                let left = self.expr_kind(left, line)?;
                let right = self.expr_kind(right, line)?;
                binary_kind(*op, &left, &right, line).map_err(Stall::from)
            }
            Expression::Call { callee, args } => self.call_kind(callee, args, line, false),
            Expression::Index { name, index } => {
                let element = self.array_element(name, line)?;
                self.check_index(name, index, line)?;
                Ok(element)
            }
            Expression::List(_) => Err(Error::unsupported(
                line,
                "list literals outside a declaring assignment",
            )
            .into()),
        }
    }

    fn call_kind(
        &mut self,
        callee: &str,
        args: &[Expression],
        line: usize,
        as_statement: bool,
    ) -> Inferred<Kind> {
        if self.signatures.contains_key(callee) {
            if self.scope.is_module() {
                return Err(Error::unsupported(
                    line,
                    format!("calling `{callee}()` in a global initializer"),
                )
                .into());
            }
            return self.user_call_kind(callee, args, line, as_statement);
        }
        let calls = self.calls;
        let Some(rule) = calls.call(callee) else {
            return self.unknown_call_kind(callee, args, line, as_statement);
        };

        if let Some(arity) = rule.arity
            && arity != args.len()
        {
            return Err(Error::inconsistent(
                line,
                format!("argument count of `{callee}()`"),
                arity,
                args.len(),
            )
            .into());
        }

        let kinds = match &rule.rewrite {
            Rewrite::LoopRange => {
                return Err(
                    Error::unsupported(line, "`range()` outside a `for` loop header").into(),
                );
            }
            Rewrite::ArrayLen => {
                match args.first() {
                    Some(Expression::Identifier(name)) => {
                        self.array_element(name, line)?;
                    }
                    Some(other) => {
                        let kind = self.expr_kind(other, line)?;
                        return Err(Error::inconsistent(
                            line,
                            "argument of `len()`",
                            "a list",
                            kind,
                        )
                        .into());
                    }
                    None => {}
                }
                Vec::new()
            }
            _ => args
                .iter()
                .map(|arg| self.expr_kind(arg, line))
                .collect::<Inferred<Vec<_>>>()?,
        };

        if rule.rewrite == Rewrite::Cast
            && kinds.first() == Some(&Kind::Str)
            && matches!(rule.returns, Returns::Fixed(Kind::Int | Kind::Float))
        {
            return Err(Error::unsupported(
                line,
                format!("converting a string with `{callee}()`"),
            )
            .into());
        }

        match &rule.returns {
            Returns::Void if as_statement => Ok(Kind::Void),
            Returns::Void => Err(Error::unsupported(
                line,
                format!("using the value of `{callee}()`, which returns nothing"),
            )
            .into()),
            Returns::Fixed(kind) => Ok(kind.clone()),
            Returns::Promoted => {
                let mut result: Option<Kind> = None;
                for kind in &kinds {
                    if !kind.is_numeric() {
                        return Err(Error::inconsistent(
                            line,
                            format!("arguments of `{callee}()`"),
                            "a number",
                            kind,
                        )
                        .into());
                    }
                    result = Some(match result {
                        Some(previous) => previous.promote(kind).unwrap_or(previous),
                        None => kind.clone(),
                    });
                }
                result.ok_or_else(|| {
                    Error::internal(line, format!("`{callee}()` has no arguments")).into()
                })
            }
        }
    }

    fn user_call_kind(
        &mut self,
        callee: &str,
        args: &[Expression],
        line: usize,
        as_statement: bool,
    ) -> Inferred<Kind> {
        let kinds = args
            .iter()
            .map(|arg| self.expr_kind(arg, line))
            .collect::<Inferred<Vec<_>>>()?;
        let Some(signature) = self.signatures.get_mut(callee) else {
            return Err(Error::internal(line, format!("no signature for `{callee}`")).into());
        };
        if signature.params.len() != kinds.len() {
            return Err(Error::inconsistent(
                line,
                format!("argument count of `{callee}()`"),
                signature.params.len(),
                kinds.len(),
            )
            .into());
        }

        for (position, ((param, slot), found)) in
            signature.params.iter_mut().zip(&kinds).enumerate()
        {
            if let Some(expected) = slot.as_ref() {
                if !expected.accepts(found) {
                    return Err(Error::inconsistent(
                        line,
                        format!("argument {} (`{param}`) of `{callee}()`", position + 1),
                        expected,
                        found,
                    )
                    .into());
                }
            } else {
                debug!(function = callee, param = %param, kind = %found, line, "parameter kind from call site");
                *slot = Some(found.clone());
            }
        }

        match signature.returns.clone() {
            Some(Kind::Void) | None if as_statement => Ok(Kind::Void),
            Some(Kind::Void) => Err(Error::unsupported(
                line,
                format!("using the value of `{callee}()`, which returns nothing"),
            )
            .into()),
            Some(kind) => Ok(kind),
            None => Err(Stall::Pending(Error::unsupported(
                line,
                format!(
                    "cannot infer the return type of `{callee}()` where its value is used; \
                     annotate it (`def {callee}(...) -> int:`)"
                ),
            ))),
        }
    }

    fn unknown_call_kind(
        &mut self,
        callee: &str,
        args: &[Expression],
        line: usize,
        as_statement: bool,
    ) -> Inferred<Kind> {
        for arg in args {
            self.expr_kind(arg, line)?;
        }
        if !matches!(self.scope.lookup(callee), Lookup::Missing) {
            return Err(Error::unsupported(
                line,
                format!("calling `{callee}`, which is not a function"),
            )
            .into());
        }
        if as_statement {
            debug!(callee, line, "passing unknown call through");
            return Ok(Kind::Void);
        }
        Err(Error::unsupported(
            line,
            format!(
                "using the value of unknown call `{callee}()` (declare it under `calls` in the configuration)"
            ),
        )
        .into())
    }
}

fn binary_kind(op: BinaryOperator, left: &Kind, right: &Kind, line: usize) -> Result<Kind> {
    let subject = format!("operands of `{}`", op.symbol());
    if op.is_comparison() {
        let comparable =
            (left == right && left.is_scalar()) || (left.is_numeric() && right.is_numeric());
        if !comparable {
            return Err(Error::inconsistent(line, subject, left, right));
        }
        return Ok(Kind::Bool);
    }

    if op == BinaryOperator::Add && (*left == Kind::Str || *right == Kind::Str) {
        if left == right {
            return Ok(Kind::Str);
        }
        return Err(Error::inconsistent(line, subject, left, right));
    }
    for kind in [left, right] {
        if !kind.is_numeric() {
            return Err(Error::inconsistent(line, subject, "a number", kind));
        }
    }

    let both_integer = left.is_integer() && right.is_integer();
    match op {
        BinaryOperator::Div if both_integer => Err(Error::unsupported(
            line,
            "`/` between integers (use `//` for integer division or float() for a fractional result)",
        )),
        BinaryOperator::FloorDiv | BinaryOperator::Mod if !both_integer => Err(
            Error::unsupported(line, format!("`{}` with float operands", op.symbol())),
        ),
        BinaryOperator::Pow => Ok(Kind::Float),
        _ => left
            .promote(right)
            .ok_or_else(|| Error::internal(line, "numeric promotion failed")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::parser::parse;
    use indoc::indoc;

    fn infer_source(source: &str) -> Result<Program> {
        let mut program = parse(source)?;
        infer(&mut program, &CallTable::builtin())?;
        Ok(program)
    }

    fn error_kind(source: &str) -> ErrorKind {
        infer_source(source).expect_err("expected failure").kind()
    }

    fn function<'p>(program: &'p Program, name: &str) -> &'p FunctionDef {
        program
            .functions()
            .find(|function| function.name == name)
            .expect("function")
    }

    #[test]
    fn binds_globals_and_locals() {
        let program = infer_source(indoc! {"
            led = 13

            def loop():
                level = analogRead(A0) * 2.5
                level = level + 1
        "})
        .expect("infer");

        assert!(matches!(
            &program.statements[0].kind,
            StatementKind::Assignment { binding: Binding::Declare(Kind::Int), .. }
        ));
        let body = &function(&program, "loop").body;
        assert!(matches!(
            &body[0].kind,
            StatementKind::Assignment { binding: Binding::Declare(Kind::Float), .. }
        ));
        assert!(matches!(
            &body[1].kind,
            StatementKind::Assignment { binding: Binding::Reassign, .. }
        ));
    }

    #[test]
    fn hoists_first_assignments_in_blocks() {
        let program = infer_source(indoc! {"
            def loop():
                for i in range(3):
                    total = i
                print(total)
        "})
        .expect("infer");

        let function = function(&program, "loop");
        assert_eq!(function.hoisted, vec![("total".to_string(), Kind::Int)]);
        let StatementKind::CountedLoop { binding, body, .. } = &function.body[0].kind else {
            panic!("expected loop");
        };
        assert_eq!(*binding, Binding::Declare(Kind::Int));
        assert!(matches!(
            &body[0].kind,
            StatementKind::Assignment { binding: Binding::Reassign, .. }
        ));
    }

    #[test]
    fn loop_variables_do_not_outlive_the_loop() {
        let source = indoc! {"
            def loop():
                for i in range(3):
                    pass
                print(i)
        "};
        assert_eq!(error_kind(source), ErrorKind::UnboundName);
    }

    #[test]
    fn loop_body_cannot_rebind_its_counter() {
        let source = indoc! {"
            def loop():
                for i in range(10):
                    i = i + 5
                    delay(i)
        "};
        let error = infer_source(source).expect_err("rebinding the counter");
        assert_eq!(error.kind(), ErrorKind::UnsupportedConstruct);
        assert_eq!(error.line(), 3);

        let nested = indoc! {"
            def loop():
                for i in range(3):
                    for i in range(2):
                        delay(i)
        "};
        assert_eq!(error_kind(nested), ErrorKind::UnsupportedConstruct);

        let after = indoc! {"
            def loop():
                i = 0
                for i in range(3):
                    delay(i)
                i = 7
        "};
        assert!(infer_source(after).is_ok());
    }

    #[test]
    fn infers_parameters_and_returns_from_call_sites() {
        let program = infer_source(indoc! {"
            def scale(x):
                return x * 2

            def loop():
                y = scale(2.5)
        "})
        .expect("infer");

        assert_eq!(
            function(&program, "scale").signature,
            Some(Signature {
                params: vec![Kind::Float],
                returns: Kind::Float,
            })
        );
        assert!(matches!(
            &function(&program, "loop").body[0].kind,
            StatementKind::Assignment { binding: Binding::Declare(Kind::Float), .. }
        ));
    }

    #[test]
    fn functions_without_returns_are_void() {
        let program = infer_source(indoc! {"
            def blink(pin: int):
                digitalWrite(pin, HIGH)

            def loop():
                blink(LED_BUILTIN)
        "})
        .expect("infer");
        assert_eq!(
            function(&program, "blink").signature,
            Some(Signature {
                params: vec![Kind::Int],
                returns: Kind::Void,
            })
        );
    }

    #[test]
    fn global_declarations_allow_reassignment() {
        let program = infer_source(indoc! {"
            count = 0

            def loop():
                global count
                count = count + 1
        "})
        .expect("infer");
        assert!(matches!(
            &function(&program, "loop").body[1].kind,
            StatementKind::Assignment { binding: Binding::Reassign, .. }
        ));
    }

    #[test]
    fn rejects_inconsistent_reassignment() {
        let source = indoc! {"
            def loop():
                x = 1
                x = 1.5
        "};
        let error = infer_source(source).expect_err("expected failure");
        assert_eq!(error.kind(), ErrorKind::TypeInconsistency);
        assert_eq!(error.line(), 3);
        assert!(error.to_string().contains("'x' is int but got float"));
    }

    #[test]
    fn annotations_widen_numeric_values() {
        let program = infer_source("def loop():\n    x: float = 0\n").expect("infer");
        assert!(matches!(
            &function(&program, "loop").body[0].kind,
            StatementKind::Assignment { binding: Binding::Declare(Kind::Float), .. }
        ));
        assert_eq!(
            error_kind("def loop():\n    x: int = 0.5\n"),
            ErrorKind::TypeInconsistency
        );
    }

    #[test]
    fn rejects_globals_defined_after_the_reader() {
        let source = indoc! {"
            def loop():
                print(level)

            level = 3
        "};
        assert_eq!(error_kind(source), ErrorKind::UnboundName);
    }

    #[test]
    fn rejects_local_assignment_after_global_read() {
        let source = indoc! {"
            level = 3

            def loop():
                print(level)
                level = 4
        "};
        assert_eq!(error_kind(source), ErrorKind::UnboundName);
    }

    #[test]
    fn rejects_mixed_and_empty_lists() {
        assert_eq!(error_kind("xs = [1, 2.5]\n"), ErrorKind::UnsupportedConstruct);
        assert_eq!(error_kind("xs = []\n"), ErrorKind::UnsupportedConstruct);
        assert_eq!(
            error_kind("def loop():\n    if True:\n        xs = [1]\n"),
            ErrorKind::UnsupportedConstruct
        );
    }

    #[test]
    fn list_elements_are_checked() {
        let program = infer_source(indoc! {"
            pins = [2, 3, 4]

            def loop():
                pins[0] = len(pins)
        "})
        .expect("infer");
        assert!(matches!(
            &program.statements[0].kind,
            StatementKind::Assignment { binding: Binding::Declare(Kind::Array { len: 3, .. }), .. }
        ));
        assert_eq!(
            error_kind("pins = [2, 3]\n\ndef loop():\n    pins[0] = 1.5\n"),
            ErrorKind::TypeInconsistency
        );
    }

    #[test]
    fn operator_rules() {
        assert_eq!(
            error_kind("def loop():\n    x = 7 / 2\n"),
            ErrorKind::UnsupportedConstruct
        );
        assert_eq!(
            error_kind("def loop():\n    x = 7.0 // 2\n"),
            ErrorKind::UnsupportedConstruct
        );
        assert_eq!(
            error_kind("def loop():\n    x = \"a\" + 1\n"),
            ErrorKind::TypeInconsistency
        );
        let program = infer_source("def loop():\n    x = 2 ** 3\n    s = \"a\" + \"b\"\n")
            .expect("infer");
        let body = &function(&program, "loop").body;
        assert!(matches!(
            &body[0].kind,
            StatementKind::Assignment { binding: Binding::Declare(Kind::Float), .. }
        ));
        assert!(matches!(
            &body[1].kind,
            StatementKind::Assignment { binding: Binding::Declare(Kind::Str), .. }
        ));
    }

    #[test]
    fn call_rules() {
        assert_eq!(
            error_kind("def loop():\n    x = mystery()\n"),
            ErrorKind::UnsupportedConstruct
        );
        assert!(infer_source("def loop():\n    lcd.clear()\n").is_ok());
        assert_eq!(
            error_kind("def loop():\n    x = delay(5)\n"),
            ErrorKind::UnsupportedConstruct
        );
        assert_eq!(
            error_kind("def loop():\n    delay(5, 6)\n"),
            ErrorKind::TypeInconsistency
        );
        assert_eq!(
            error_kind("def f(a: int):\n    pass\n\ndef loop():\n    f(\"x\")\n"),
            ErrorKind::TypeInconsistency
        );
    }

    #[test]
    fn unresolvable_recursion_asks_for_an_annotation() {
        let source = indoc! {"
            def fact(n: int):
                return n * fact(n - 1)

            def loop():
                print(fact(5))
        "};
        let error = infer_source(source).expect_err("expected failure");
        assert_eq!(error.kind(), ErrorKind::UnsupportedConstruct);
        assert!(error.to_string().contains("annotate"), "{error}");
    }

    #[test]
    fn entry_points_cannot_return_values() {
        assert_eq!(
            error_kind("def loop():\n    return 1\n"),
            ErrorKind::UnsupportedConstruct
        );
    }
}
