//! The mutually-recursive `{exec, eval, evalRef}` trio (§4.3).
//!
//! `Evaluator` is closed over the global scope, the active `Limits`, a call-depth
//! guard, and the single-cell return slot that models the `Running`/`Returning`
//! state machine described in §4.3's "State machine (return propagation)".

use crate::{
    ast::{Exp, ExpKind, Stat, StatKind},
    error::{ErrorKind, ScriptError},
    resource::{DepthGuard, Limits},
    value::{FunctionVal, RangeVal, Slot, Value},
};

pub(crate) struct Evaluator {
    globals: Value,
    limits: Limits,
    depth: DepthGuard,
    return_slot: Option<Value>,
}

impl Evaluator {
    pub fn new(globals: Value, limits: Limits) -> Self {
        Self {
            globals,
            limits,
            depth: DepthGuard::default(),
            return_slot: None,
        }
    }

    /// Executes `body` in `scope` and harvests the return slot, matching the
    /// outermost `run`'s contract: "leaves it clear at exit".
    pub fn run_block(&mut self, scope: &Value, body: &Stat) -> Result<Value, ScriptError> {
        self.exec(scope, body)?;
        Ok(self.return_slot.take().unwrap_or(Value::None))
    }

    fn at(info: crate::ast::SourceInfo, kind: ErrorKind) -> ScriptError {
        ScriptError::at(kind, info)
    }

    // ---------------------------------------------------------------- exec --

    fn exec(&mut self, scope: &Value, stat: &Stat) -> Result<(), ScriptError> {
        match &stat.kind {
            StatKind::Assign { lhs, rhs } => {
                let r = self.eval(scope, rhs)?;
                let slot = self.eval_ref(scope, lhs)?;
                if let Value::Extern(cell) = slot.get() {
                    cell.write(r).map_err(|k| Self::at(stat.info, k))?;
                } else {
                    slot.set(r);
                }
                Ok(())
            }
            StatKind::CompoundAssign { lhs, rhs, op } => {
                // §4.3: Extern interception is deliberately not applied here.
                let r = self.eval(scope, rhs)?;
                let slot = self.eval_ref(scope, lhs)?;
                let current = slot.get().deref_extern();
                let result = current.binop(*op, &r).map_err(|k| Self::at(stat.info, k))?;
                slot.set(result);
                Ok(())
            }
            StatKind::If { cond, then, else_ } => {
                if self.eval_truth(scope, cond)? {
                    self.exec(scope, then)
                } else if let Some(else_) = else_ {
                    self.exec(scope, else_)
                } else {
                    Ok(())
                }
            }
            StatKind::Block(stats) => {
                for s in stats {
                    self.exec(scope, s)?;
                    if self.return_slot.is_some() {
                        break;
                    }
                }
                Ok(())
            }
            StatKind::While { cond, body } => {
                while self.eval_truth(scope, cond)? {
                    self.exec(scope, body)?;
                    if self.return_slot.is_some() {
                        break;
                    }
                }
                Ok(())
            }
            StatKind::For { id, list, body } => {
                let seq = self.eval(scope, list)?;
                let len = seq.length().map_err(|k| Self::at(list.info, k))?;
                for i in 0..len {
                    let item = seq.at(i).map_err(|k| Self::at(list.info, k))?;
                    scope
                        .get_ref(id)
                        .map_err(|k| Self::at(stat.info, k))?
                        .set(item);
                    self.exec(scope, body)?;
                    if self.return_slot.is_some() {
                        break;
                    }
                }
                Ok(())
            }
            StatKind::FuncCallStat { ctx, name, args } => {
                self.eval_call(scope, ctx.as_ref(), name, args, stat.info)?;
                Ok(())
            }
            StatKind::Return(value) => {
                let v = match value {
                    Some(e) => self.eval(scope, e)?,
                    None => Value::None,
                };
                self.return_slot = Some(v);
                Ok(())
            }
        }
    }

    fn eval_truth(&mut self, scope: &Value, cond: &Exp) -> Result<bool, ScriptError> {
        let v = self.eval(scope, cond)?;
        v.is_true().map_err(|k| Self::at(cond.info, k))
    }

    // ---------------------------------------------------------------- eval --

    /// Evaluates `exp`, then applies the §4.3 "external-reference read" rule:
    /// an `Extern` result is replaced by a freshly materialised scalar.
    fn eval(&mut self, scope: &Value, exp: &Exp) -> Result<Value, ScriptError> {
        let v = self.eval_kind(scope, exp)?;
        Ok(v.deref_extern())
    }

    fn eval_kind(&mut self, scope: &Value, exp: &Exp) -> Result<Value, ScriptError> {
        match &exp.kind {
            ExpKind::Int(i) => Ok(Value::Int(*i)),
            ExpKind::Float(f) => Ok(Value::Float(*f)),
            ExpKind::Str(s) => Ok(Value::Str(std::rc::Rc::new(s.clone()))),
            ExpKind::Id(name) => scope.get(name).map_err(|k| Self::at(exp.info, k)),
            ExpKind::BinOp { op, l, r } => {
                let lv = self.eval(scope, l)?;
                let rv = self.eval(scope, r)?;
                lv.binop(*op, &rv).map_err(|k| Self::at(exp.info, k))
            }
            ExpKind::UnOp { op, operand } => {
                let v = self.eval(scope, operand)?;
                v.unop(*op).map_err(|k| Self::at(exp.info, k))
            }
            ExpKind::MapDef(fields) => {
                let map = Value::new_map();
                for (name, field_exp) in fields {
                    let v = self.eval(scope, field_exp)?;
                    map.get_ref(name).map_err(|k| Self::at(exp.info, k))?.set(v);
                }
                Ok(map)
            }
            ExpKind::ListDef(elems) => {
                let mut items = Vec::with_capacity(elems.len());
                for e in elems {
                    items.push(self.eval(scope, e)?);
                }
                Ok(Value::new_list(items))
            }
            ExpKind::RangeDef { begin, end, step } => {
                let begin = self.eval_int(scope, begin)?;
                let end = self.eval_int(scope, end)?;
                let step = self.eval_int(scope, step)?;
                if step == 0 {
                    return Err(Self::at(
                        exp.info,
                        ErrorKind::TypeMismatch {
                            expected: "nonzero step",
                            found: "0",
                        },
                    ));
                }
                Ok(Value::Range(std::rc::Rc::new(RangeVal { begin, end, step })))
            }
            ExpKind::FuncDef { params, body } => Ok(Value::Function(std::rc::Rc::new(FunctionVal {
                params: params.clone(),
                body: (**body).clone(),
            }))),
            ExpKind::FuncCallExp { ctx, name, args } => {
                self.eval_call(scope, ctx.as_deref(), name, args, exp.info)
            }
            ExpKind::Index { container, key } => {
                let container_val = self.eval(scope, container)?;
                let idx = self.eval_int(scope, key)?;
                container_val.at(idx).map_err(|k| Self::at(exp.info, k))
            }
            ExpKind::Member { container, name } => {
                let container_val = self.eval(scope, container)?;
                container_val.get(name).map_err(|k| Self::at(exp.info, k))
            }
            ExpKind::Ternary { cond, then, else_ } => {
                if self.eval_truth(scope, cond)? {
                    self.eval(scope, then)
                } else {
                    self.eval(scope, else_)
                }
            }
        }
    }

    fn eval_int(&mut self, scope: &Value, exp: &Exp) -> Result<i32, ScriptError> {
        match self.eval(scope, exp)? {
            Value::Int(i) => Ok(i),
            Value::Float(f) => Ok(f as i32),
            other => Err(Self::at(
                exp.info,
                ErrorKind::TypeMismatch {
                    expected: "Int",
                    found: other.kind(),
                },
            )),
        }
    }

    // ------------------------------------------------------------ evalRef --

    /// Resolves an L-value to an assignable [`Slot`] (§4.3's "L-value resolution").
    fn eval_ref(&mut self, scope: &Value, exp: &Exp) -> Result<Slot, ScriptError> {
        match &exp.kind {
            ExpKind::Id(name) => scope.get_ref(name).map_err(|k| Self::at(exp.info, k)),
            ExpKind::Index { container, key } => {
                let container_slot = self.eval_ref(scope, container)?;
                let container_val = container_slot.get().deref_extern();
                let idx = self.eval_int(scope, key)?;
                container_val.at_ref(idx).map_err(|k| Self::at(exp.info, k))
            }
            ExpKind::Member { container, name } => {
                let container_slot = self.eval_ref(scope, container)?;
                let mut container_val = container_slot.get();
                // Auto-vivification happens here, at the point of write, not during
                // a plain read: a `None` intermediate slot becomes a fresh `Map`.
                if matches!(container_val, Value::None) {
                    container_val = Value::new_map();
                    container_slot.set(container_val.clone());
                }
                container_val.get_ref(name).map_err(|k| Self::at(exp.info, k))
            }
            _ => Err(Self::at(exp.info, ErrorKind::NonAssignable)),
        }
    }

    // --------------------------------------------------------- function call --

    /// Shared dispatch for `FuncCallExp` and the reified `FuncCallStat` (§4.3);
    /// rather than literally rebuilding a throwaway `FuncCallExp` node, both call
    /// sites hand their `(ctx, name, args)` fields straight to this helper, which
    /// implements the identical dispatch rule.
    fn eval_call(
        &mut self,
        scope: &Value,
        ctx: Option<&Exp>,
        name: &str,
        args: &[Exp],
        info: crate::ast::SourceInfo,
    ) -> Result<Value, ScriptError> {
        let mut arg_vals = Vec::with_capacity(args.len());
        for a in args {
            arg_vals.push(self.eval(scope, a)?);
        }

        match ctx {
            None => {
                let local = scope.get(name).map_err(|k| Self::at(info, k))?.deref_extern();
                if matches!(local, Value::Function(_)) {
                    return self.invoke_resolved(local, scope.clone(), name, &arg_vals, info);
                }
                let global = self.globals.clone();
                let candidate = global.get(name).map_err(|k| Self::at(info, k))?.deref_extern();
                self.invoke_resolved(candidate, scope.clone(), name, &arg_vals, info)
            }
            Some(ctx_exp) => {
                let vctx = self.eval(scope, ctx_exp)?;
                if matches!(vctx, Value::Map(_)) {
                    let member = vctx.get(name).map_err(|k| Self::at(info, k))?.deref_extern();
                    self.invoke_resolved(member, vctx, name, &arg_vals, info)
                } else {
                    vctx.call_method(name, &arg_vals).map_err(|k| Self::at(info, k))
                }
            }
        }
    }

    fn invoke_resolved(
        &mut self,
        resolved: Value,
        this_ctx: Value,
        name: &str,
        args: &[Value],
        info: crate::ast::SourceInfo,
    ) -> Result<Value, ScriptError> {
        match resolved {
            Value::Function(func) => self.invoke(&func, this_ctx, args, info),
            Value::NativeFunc(f) => f(args).map_err(|k| Self::at(info, k)),
            _ => Err(Self::at(
                info,
                ErrorKind::UnknownVariable {
                    name: name.to_owned(),
                },
            )),
        }
    }

    /// Invokes a script-defined `Function` (§4.3 "Invocation").
    fn invoke(
        &mut self,
        func: &FunctionVal,
        this_ctx: Value,
        args: &[Value],
        info: crate::ast::SourceInfo,
    ) -> Result<Value, ScriptError> {
        if func.params.len() != args.len() {
            return Err(Self::at(
                info,
                ErrorKind::ArityMismatch {
                    expected: func.params.len(),
                    found: args.len(),
                },
            ));
        }
        if func.params.iter().any(|p| p == "this") {
            return Err(Self::at(info, ErrorKind::ReservedParam));
        }
        self.depth.enter(self.limits).map_err(|k| Self::at(info, k))?;

        let call_scope = Value::new_map();
        for (param, value) in func.params.iter().zip(args.iter()) {
            call_scope
                .get_ref(param)
                .expect("fresh map never fails getRef")
                .set(value.clone());
        }
        call_scope
            .get_ref("this")
            .expect("fresh map never fails getRef")
            .set(this_ctx);

        let saved_return = self.return_slot.take();
        let result = self.exec(&call_scope, &func.body);
        let returned = self.return_slot.take().unwrap_or(Value::None);
        self.return_slot = saved_return;
        self.depth.exit();

        result?;
        Ok(returned)
    }
}
