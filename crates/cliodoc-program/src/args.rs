//! Argument vector compilation.

use crate::error::{ProgramError, ProgramResult};
use crate::program::{Parameter, Program};
use crate::value::render_value;
use serde_yaml::Value;
use std::collections::BTreeMap;
use tracing::trace;

/// Runtime parameter bindings, keyed by parameter name.
pub type RuntimeValues = BTreeMap<String, Value>;

/// Compute the argument vector for `program`.
///
/// Order: verbs, raw flags, flags (token then value, or the bare token for
/// presence-only switches), positional args.
///
/// A parameter's value is taken from `values` when bound there, otherwise
/// from its `raw` override. If that text is empty the static `value` is
/// rendered instead, so a runtime value that legitimately renders to `""` is
/// replaced by the default.
pub fn compute_args(program: &Program, values: &RuntimeValues) -> ProgramResult<Vec<String>> {
    let mut args = Vec::with_capacity(
        program.verbs.len() + program.raw_flags.len() + program.flags.len() * 2 + program.args.len(),
    );

    args.extend(program.verbs.iter().cloned());
    args.extend(program.raw_flags.iter().cloned());

    for flag in &program.flags {
        let token = flag.flag_token();
        if flag.no_value {
            args.push(token);
            continue;
        }
        let value = resolve(flag, values, "flag")?;
        args.push(token);
        args.push(value);
    }

    for arg in &program.args {
        args.push(resolve(arg, values, "arg")?);
    }

    trace!(program = %program.name, ?args, "computed arguments");
    Ok(args)
}

fn resolve(
    parameter: &Parameter,
    values: &RuntimeValues,
    kind: &'static str,
) -> ProgramResult<String> {
    let render = |value: &Value| {
        render_value(parameter.kind, value).map_err(|message| ProgramError::RenderValue {
            kind,
            parameter: parameter.name.clone(),
            message,
        })
    };

    let resolved = match values.get(&parameter.name) {
        Some(value) => render(value)?,
        None => parameter.raw.clone(),
    };

    if resolved.is_empty() {
        return render(&parameter.value);
    }
    Ok(resolved)
}
