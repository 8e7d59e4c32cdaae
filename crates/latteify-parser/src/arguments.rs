//! Binding of call-site arguments to declared call signatures.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use latteify_lexer::{Source, SyntaxError, SyntaxErrorKind};

use crate::ast::{Argument, Expr, ExprKind, Value};
use crate::environment::Signature;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Filter,
    Function,
    Test,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CallKind::Filter => "filter",
            CallKind::Function => "function",
            CallKind::Test => "test",
        })
    }
}

/// Resolve `arguments` against `signature` into a positional list.
///
/// Calls without named arguments to non-variadic callables are returned
/// untouched. Otherwise each declared parameter takes the positional
/// argument in its slot, else the named argument with its name, else its
/// default; defaults are only materialized when a later argument follows.
/// Variadic callables collect leftovers into a trailing array.
pub fn bind_arguments(
    kind: CallKind,
    name: &str,
    signature: Option<&Signature>,
    arguments: Vec<Argument>,
    line: usize,
    source: &Arc<Source>,
) -> Result<Vec<Argument>, SyntaxError> {
    let error = |message: String| SyntaxError::new(SyntaxErrorKind::InvalidArguments, message, line, source);

    let mut has_named = false;
    for argument in &arguments {
        if argument.name.is_some() {
            has_named = true;
        } else if has_named {
            return Err(error(format!(
                "Positional arguments cannot be used after named arguments for {kind} \"{name}\""
            )));
        }
    }

    let variadic = signature.is_some_and(|s| s.variadic);
    if !has_named && !variadic {
        return Ok(arguments);
    }
    let Some(signature) = signature else {
        return Err(error(format!("Named arguments are not supported for {kind} \"{name}\"")));
    };

    let mut positional = Vec::new();
    let mut named: IndexMap<String, Expr> = IndexMap::new();
    for argument in arguments {
        match argument.name {
            Some(arg_name) => {
                named.insert(arg_name, argument.value);
            }
            None => positional.push(argument.value),
        }
    }
    let mut positional = positional.into_iter().peekable();

    let mut bound = Vec::new();
    let mut pending_defaults = Vec::new();
    for param in &signature.params {
        if let Some(value) = named.shift_remove(&param.name) {
            if positional.peek().is_some() {
                return Err(error(format!(
                    "Argument \"{}\" is defined twice for {kind} \"{name}\"",
                    param.name
                )));
            }
            bound.append(&mut pending_defaults);
            bound.push(value);
        } else if let Some(value) = positional.next() {
            bound.append(&mut pending_defaults);
            bound.push(value);
        } else if let Some(default) = &param.default {
            pending_defaults.push(Expr::constant(default.clone(), line));
        } else {
            return Err(error(format!(
                "Value for argument \"{}\" is required for {kind} \"{name}\"",
                param.name
            )));
        }
    }

    if signature.variadic {
        let mut extra = Vec::new();
        for (index, value) in positional.by_ref().enumerate() {
            let key = i64::try_from(index).unwrap_or(i64::MAX);
            extra.push((Expr::constant(Value::Int(key), line), value));
        }
        for (key, value) in named.drain(..) {
            extra.push((Expr::string(key, line), value));
        }
        if !extra.is_empty() {
            bound.append(&mut pending_defaults);
            bound.push(Expr::new(ExprKind::Array(extra), line));
        }
    }

    let leftover_positional = positional.count();
    if leftover_positional > 0 || !named.is_empty() {
        let mut unknown: Vec<String> = named.keys().cloned().collect();
        let offset = bound.len();
        unknown.extend((0..leftover_positional).map(|i| (offset + i).to_string()));
        let declared: Vec<&str> = signature.params.iter().map(|p| p.name.as_str()).collect();
        return Err(error(format!(
            "Unknown argument{} \"{}\" for {kind} \"{name}({})\"",
            if unknown.len() > 1 { "s" } else { "" },
            unknown.join("\", \""),
            declared.join(", ")
        )));
    }

    Ok(bound.into_iter().map(Argument::positional).collect())
}
