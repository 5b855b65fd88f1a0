//! Dynamic-content resolution for strings containing variable and function
//! expressions.
//!
//! Resolution runs in two left-to-right passes: variable tokens first, then
//! function-call tokens over the variable-substituted string. Tokens may nest;
//! a function argument can itself contain variable or function expressions.
//! Unrecognized tokens are left verbatim so that templates survive partial
//! resolution; only direct lookups are strict.

use crate::context::TestContext;
use crate::error::{EngineError, Result};
use crate::functions::is_function_name;
use crate::variables::VariableStore;

/// Replace every resolvable variable token in the input.
///
/// With `enable_quoting` set, substituted values are wrapped in single
/// quotes. Escaped tokens emit the literal prefix/suffix text unquoted.
pub(crate) fn replace_variables(
    input: &str,
    store: &VariableStore,
    enable_quoting: bool,
) -> String {
    let syntax = store.syntax();
    let prefix = syntax.variable_prefix.as_str();
    let suffix = syntax.variable_suffix.as_str();

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find(prefix) {
        result.push_str(&rest[..start]);
        let after = &rest[start + prefix.len()..];

        let Some(end) = find_token_end(after, prefix, suffix) else {
            // Unterminated token, keep the remainder verbatim.
            result.push_str(&rest[start..]);
            return result;
        };

        let raw = &after[..end];
        // Nested tokens inside the name resolve before the outer lookup.
        let inner = if raw.contains(prefix) {
            replace_variables(raw, store, false)
        } else {
            raw.to_string()
        };

        if syntax.is_escaped(&inner) {
            result.push_str(&syntax.decorate(syntax.strip_escaping(&inner)));
        } else {
            match store.get(&inner) {
                Ok(value) => push_quoted(&mut result, &value.render(), enable_quoting),
                Err(_) => {
                    // Lenient bulk replacement: unknown tokens stay verbatim.
                    result.push_str(prefix);
                    result.push_str(raw);
                    result.push_str(suffix);
                }
            }
        }

        rest = &after[end + suffix.len()..];
    }

    result.push_str(rest);
    result
}

/// Find the byte offset of the suffix closing the current token, skipping
/// over nested prefix/suffix pairs. `s` starts just after the opening prefix.
fn find_token_end(s: &str, prefix: &str, suffix: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut pos = 0usize;

    while pos < s.len() {
        let rest = &s[pos..];
        let next_suffix = rest.find(suffix)?;
        let next_prefix = rest.find(prefix);

        match next_prefix {
            Some(p) if p < next_suffix => {
                depth += 1;
                pos += p + prefix.len();
            }
            _ => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos + next_suffix);
                }
                pos += next_suffix + suffix.len();
            }
        }
    }

    None
}

fn push_quoted(result: &mut String, value: &str, enable_quoting: bool) {
    if enable_quoting {
        result.push('\'');
        result.push_str(value);
        result.push('\'');
    } else {
        result.push_str(value);
    }
}

/// Replace every call of a registered function in the input.
///
/// Arguments are resolved before invocation: quoted arguments become
/// literals, everything else runs through full dynamic-content resolution.
pub(crate) fn replace_functions(
    input: &str,
    context: &TestContext,
    enable_quoting: bool,
) -> Result<String> {
    let registry = context.function_registry();
    let chars: Vec<(usize, char)> = input.char_indices().collect();

    let mut result = String::with_capacity(input.len());
    let mut i = 0usize;

    while i < chars.len() {
        let (pos, ch) = chars[i];

        let at_ident_start = (ch.is_alphabetic() || ch == '_')
            && (i == 0 || {
                let prev = chars[i - 1].1;
                !(prev.is_alphanumeric() || prev == '_')
            });

        if !at_ident_start {
            result.push(ch);
            i += 1;
            continue;
        }

        let mut j = i;
        while j < chars.len() && (chars[j].1.is_alphanumeric() || chars[j].1 == '_') {
            j += 1;
        }
        let name_end = if j < chars.len() { chars[j].0 } else { input.len() };
        let name = &input[pos..name_end];

        let is_call = j < chars.len() && chars[j].1 == '(' && registry.contains(name);
        if !is_call {
            result.push_str(name);
            i = j;
            continue;
        }

        let args_start = chars[j].0 + 1;
        let Some(close_offset) = find_closing_paren(&input[args_start..]) else {
            // No matching close paren, keep the identifier verbatim.
            result.push_str(name);
            i = j;
            continue;
        };
        let close = args_start + close_offset;

        let mut parameters = Vec::new();
        for raw in split_arguments(&input[args_start..close]) {
            parameters.push(resolve_argument(&raw, context)?);
        }

        let function = registry.get(name)?;
        let value = function.execute(&parameters, context)?;
        push_quoted(&mut result, &value, enable_quoting);

        // Continue after the closing paren.
        while i < chars.len() && chars[i].0 <= close {
            i += 1;
        }
    }

    Ok(result)
}

/// Resolve a bare function expression such as `concat('a', 'b')`
pub(crate) fn resolve_function(expression: &str, context: &TestContext) -> Result<String> {
    let trimmed = expression.trim();

    let (name, arguments) = trimmed
        .find('(')
        .filter(|_| trimmed.ends_with(')'))
        .map(|open| (&trimmed[..open], &trimmed[open + 1..trimmed.len() - 1]))
        .ok_or_else(|| EngineError::FunctionNotFound {
            name: trimmed.to_string(),
        })?;

    if !is_function_name(name) {
        return Err(EngineError::FunctionNotFound {
            name: name.to_string(),
        });
    }

    let mut parameters = Vec::new();
    for raw in split_arguments(arguments) {
        parameters.push(resolve_argument(&raw, context)?);
    }

    let function = context.function_registry().get(name)?;
    function.execute(&parameters, context)
}

fn resolve_argument(argument: &str, context: &TestContext) -> Result<String> {
    if argument.len() >= 2 && argument.starts_with('\'') && argument.ends_with('\'') {
        return Ok(argument[1..argument.len() - 1].to_string());
    }

    if argument.is_empty() {
        return Ok(String::new());
    }

    context.resolve_dynamic_content(argument)
}

/// Find the byte offset of the closing paren; `s` starts just after the
/// opening paren. Parens inside single quotes do not count.
fn find_closing_paren(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut in_quote = false;

    for (offset, ch) in s.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth -= 1;
                if depth == 0 {
                    return Some(offset);
                }
            }
            _ => {}
        }
    }

    None
}

/// Split a function argument list on top-level commas, honoring single
/// quotes and nested parentheses
fn split_arguments(s: &str) -> Vec<String> {
    if s.trim().is_empty() {
        return Vec::new();
    }

    let mut arguments = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quote = false;

    for ch in s.chars() {
        match ch {
            '\'' => {
                in_quote = !in_quote;
                current.push(ch);
            }
            '(' if !in_quote => {
                depth += 1;
                current.push(ch);
            }
            ')' if !in_quote => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if !in_quote && depth == 0 => {
                arguments.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    arguments.push(current.trim().to_string());
    arguments
}
