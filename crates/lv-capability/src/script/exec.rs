//! Statement interpreter.  Runs against a `&mut dyn Receiver`; never touches
//! anything else.

use lv_core::Value;

use crate::{InvocationError, InvocationResult, Receiver};

use super::parse::{Expr, Rhs, Stmt};

/// Names used when a statement fails.
pub(crate) struct MethodCtx {
    pub capability: String,
    pub method:     String,
}

impl MethodCtx {
    fn fail(&self, line: usize, message: impl Into<String>) -> InvocationError {
        InvocationError::Failed {
            capability: self.capability.clone(),
            method:     self.method.clone(),
            message:    format!("line {line}: {}", message.into()),
        }
    }
}

pub(crate) fn run_body(
    body: &[(usize, Stmt)],
    rx:   &mut dyn Receiver,
    args: &[Value],
    ctx:  &MethodCtx,
) -> InvocationResult<Value> {
    for (line, stmt) in body {
        let line = *line;
        match stmt {
            Stmt::Set { member, rhs } => {
                let value = eval_rhs(rhs, rx, args)?;
                rx.set(member, value)?;
            }

            Stmt::Add { member, expr } => {
                let delta = eval(expr, rx, args)?;
                let current = rx.get(member)?;
                let sum = match (&current, &delta) {
                    (Value::Null, Value::Int(d)) => *d,
                    (Value::Int(c), Value::Int(d)) => c.wrapping_add(*d),
                    _ => {
                        return Err(ctx.fail(
                            line,
                            format!(
                                "`add {member}` needs integers, found {} and {}",
                                current.type_name(),
                                delta.type_name()
                            ),
                        ));
                    }
                };
                rx.set(member, Value::Int(sum))?;
            }

            Stmt::Push { member, expr } => {
                let item = eval(expr, rx, args)?;
                let mut items = match rx.get(member)? {
                    Value::Null => Vec::new(),
                    Value::List(items) => items,
                    other => {
                        return Err(ctx.fail(
                            line,
                            format!("`push {member}` needs a list, found {}", other.type_name()),
                        ));
                    }
                };
                items.push(item);
                rx.set(member, Value::List(items))?;
            }

            Stmt::Invoke { method, args: exprs } => {
                let values = eval_all(exprs, rx, args)?;
                rx.invoke(method, &values)?;
            }

            Stmt::Call { target, method, args: exprs } => {
                let values = eval_all(exprs, rx, args)?;
                rx.call(target, method, &values)?;
            }

            Stmt::Future { delay, method, args: exprs } => {
                let values = eval_all(exprs, rx, args)?;
                rx.future(*delay, method, &values)?;
            }

            Stmt::Listen { event, handler } => rx.listen(event, handler)?,

            Stmt::Subscribe { scope, event, handler } => {
                let scope = eval_scope(scope, rx, args, ctx, line)?;
                rx.subscribe(&scope, event, handler)?;
            }

            Stmt::Publish { scope, event, data } => {
                let scope = eval_scope(scope, rx, args, ctx, line)?;
                let data = match data {
                    Some(expr) => eval(expr, rx, args)?,
                    None => Value::Null,
                };
                rx.publish(&scope, event, data);
            }

            Stmt::Log(exprs) => {
                let parts = eval_all(exprs, rx, args)?;
                let message = parts
                    .iter()
                    .map(Value::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                rx.log(&message);
            }

            Stmt::Return(rhs) => return eval_rhs(rhs, rx, args),
        }
    }
    Ok(Value::Null)
}

fn eval(expr: &Expr, rx: &mut dyn Receiver, args: &[Value]) -> InvocationResult<Value> {
    Ok(match expr {
        Expr::Lit(value) => value.clone(),
        Expr::SelfId => Value::Instance(rx.id()),
        Expr::Arg(idx) => args.get(*idx).cloned().unwrap_or_default(),
        Expr::Member(name) => rx.get(name)?,
    })
}

fn eval_all(exprs: &[Expr], rx: &mut dyn Receiver, args: &[Value]) -> InvocationResult<Vec<Value>> {
    exprs.iter().map(|e| eval(e, rx, args)).collect()
}

fn eval_rhs(rhs: &Rhs, rx: &mut dyn Receiver, args: &[Value]) -> InvocationResult<Value> {
    match rhs {
        Rhs::Expr(expr) => eval(expr, rx, args),
        Rhs::Invoke { method, args: exprs } => {
            let values = eval_all(exprs, rx, args)?;
            rx.invoke(method, &values)
        }
        Rhs::Call { target, method, args: exprs } => {
            let values = eval_all(exprs, rx, args)?;
            rx.call(target, method, &values)
        }
        Rhs::Has { spec, method } => Ok(Value::Bool(rx.has(spec, method.as_deref()))),
    }
}

/// Instances publish on their own scope; text is used verbatim.
fn eval_scope(
    expr: &Expr,
    rx:   &mut dyn Receiver,
    args: &[Value],
    ctx:  &MethodCtx,
    line: usize,
) -> InvocationResult<String> {
    match eval(expr, rx, args)? {
        Value::Instance(id) => Ok(id.scope()),
        Value::Text(scope) => Ok(scope),
        other => Err(ctx.fail(line, format!("scope must be an instance or text, found {}", other.type_name()))),
    }
}
