use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::StrataError;
use crate::resolver;
use crate::tree::ConfigTree;
use crate::value::Value;

/// The interpolation grammar: `${path.to.node}` or `${resolver:arg1,arg2}`.
/// Arguments may escape commas and spaces as `\,` and `\ `.
static INTERP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{(\w+:)?([\w\.%_ \\,-]*?)\}").expect("interpolation regex"));

/// Classification of a scalar's stored string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// An ordinary value with no interpolation.
    Plain,
    /// The `???` mandatory-missing sentinel.
    Missing,
    /// The whole string is a single `${...}` expression.
    Interpolation,
    /// Literal text mixed with one or more `${...}` expressions.
    StrInterpolation,
}

/// Determine the kind of a stored string.
///
/// Examples: `???` is Missing, `10` is Plain, `${foo.bar}` is Interpolation,
/// `ftp://${host}/path` is StrInterpolation.
pub fn value_kind(s: &str) -> ValueKind {
    if s == "???" {
        return ValueKind::Missing;
    }
    let mut matches = INTERP_RE.find_iter(s);
    match matches.next() {
        None => ValueKind::Plain,
        Some(m) => {
            if m.start() == 0 && m.end() == s.len() && matches.next().is_none() {
                ValueKind::Interpolation
            } else {
                ValueKind::StrInterpolation
            }
        }
    }
}

/// Resolve the stored string of the scalar at `path`.
///
/// A string that is a single expression yields the substitution's native
/// value; mixed content always stringifies every part. `active` is the set
/// of node paths currently being resolved on this call stack and drives
/// cycle detection.
pub(crate) fn resolve_expr(
    tree: &ConfigTree,
    src: &str,
    path: &str,
    active: &mut Vec<String>,
) -> Result<Value, StrataError> {
    let spans: Vec<_> = INTERP_RE.captures_iter(src).collect();
    if spans.is_empty() {
        // Classification should have kept this as a plain string.
        return Ok(Value::String(src.to_string()));
    }

    // Whole-string single expression: preserve the substituted value's type.
    if spans.len() == 1 {
        let m = spans[0].get(0).expect("whole match");
        if m.start() == 0 && m.end() == src.len() {
            return eval_segment(tree, &spans[0], path, active);
        }
    }

    // Mixed content: stringify each part and concatenate.
    let mut out = String::new();
    let mut cursor = 0;
    for caps in &spans {
        let m = caps.get(0).expect("whole match");
        out.push_str(&src[cursor..m.start()]);
        let value = eval_segment(tree, caps, path, active)?;
        match value {
            Value::Array(_) | Value::Object(_) => {
                return Err(StrataError::type_mismatch(path, "scalar", value.type_name()));
            }
            other => out.push_str(&other.to_string()),
        }
        cursor = m.end();
    }
    out.push_str(&src[cursor..]);
    Ok(Value::String(out))
}

/// Evaluate one `${...}` capture: either a resolver call or a node reference.
fn eval_segment(
    tree: &ConfigTree,
    caps: &regex::Captures<'_>,
    path: &str,
    active: &mut Vec<String>,
) -> Result<Value, StrataError> {
    let expr = caps.get(0).expect("whole match").as_str();
    let body = caps.get(2).map_or("", |m| m.as_str());

    if let Some(name) = caps.get(1) {
        let name = name.as_str().trim_end_matches(':');
        let args = split_args(body);
        let func = resolver::lookup_resolver(name).ok_or_else(|| StrataError::UnknownResolver {
            name: name.to_string(),
            expr: expr.to_string(),
            hint: Some("Register it with register_resolver before use".into()),
            code: Some(202),
        })?;
        return func(&args).map_err(|message| StrataError::ResolverError {
            resolver: name.to_string(),
            path: path.to_string(),
            message,
            hint: None,
            code: Some(205),
        });
    }

    if body.is_empty() {
        return Err(StrataError::InterpolationSyntax {
            expr: expr.to_string(),
            message: "empty node reference".into(),
            hint: Some("Use ${some.path} or ${resolver:args}".into()),
            code: Some(201),
        });
    }

    // Node reference, resolved relative to the tree root. Anything already
    // on the active stack means we looped back onto ourselves.
    if active.iter().any(|p| p == body) {
        let mut chain = active.clone();
        chain.push(body.to_string());
        return Err(StrataError::InterpolationCycle {
            path: path.to_string(),
            chain,
            hint: None,
            code: Some(204),
        });
    }

    let target = tree
        .strict_node_at(body)
        .ok_or_else(|| StrataError::ReferenceNotFound {
            target: body.to_string(),
            path: path.to_string(),
            hint: Some("Check that the referenced path exists".into()),
            code: Some(203),
        })?;

    active.push(body.to_string());
    let result = tree.resolve_node(target, active);
    active.pop();
    result
}

/// Split a resolver argument list on unescaped commas, trim unescaped
/// leading/trailing whitespace, then un-escape `\,` and `\ `.
fn split_args(body: &str) -> Vec<String> {
    if body.is_empty() {
        return Vec::new();
    }

    let mut raw: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut escaped = false;
    for c in body.chars() {
        if escaped {
            cur.push(c);
            escaped = false;
        } else if c == '\\' {
            cur.push(c);
            escaped = true;
        } else if c == ',' {
            raw.push(std::mem::take(&mut cur));
        } else {
            cur.push(c);
        }
    }
    raw.push(cur);

    raw.iter().map(|a| unescape(trim_unescaped(a))).collect()
}

/// Trim plain whitespace from both ends, leaving `\ `-escaped spaces alone.
fn trim_unescaped(arg: &str) -> &str {
    let start = arg.trim_start();
    let mut end = start.len();
    let bytes = start.as_bytes();
    while end > 0 && bytes[end - 1] == b' ' {
        if end >= 2 && bytes[end - 2] == b'\\' {
            break;
        }
        end -= 1;
    }
    &start[..end]
}

fn unescape(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len());
    let mut chars = arg.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some(',') | Some(' ') | Some('\\') => {
                    out.push(chars.next().expect("peeked"));
                }
                _ => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
