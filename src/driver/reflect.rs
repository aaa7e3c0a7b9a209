//! GLSL Preprocessing & Reflection
//!
//! A small subset of a real shader front end, enough for the headless
//! [`RecordingDriver`](super::RecordingDriver) to report the active uniforms and
//! attributes of a program the way a driver would.
//!
//! Supported directives: `#define`, `#undef`, `#ifdef`, `#ifndef`, `#if`,
//! `#elif`, `#else`, `#endif`, `#error`. `#if` expressions may combine
//! `defined(X)`, integer comparisons and macro values with `!`, `&&` and `||`
//! (no mixed precedence inside one expression). Every other directive is
//! dropped.
//!
//! A declared uniform or attribute counts as active only when its identifier
//! appears again somewhere in the active source, mirroring the dead-symbol
//! elimination real compilers perform.

use rustc_hash::{FxHashMap, FxHashSet};

use super::type_code;

// ─── Preprocessor ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct Preprocessed {
    /// Active source lines with directives removed.
    pub text: String,
    pub defines: FxHashMap<String, String>,
}

struct Frame {
    parent_active: bool,
    taken: bool,
    active: bool,
}

pub(crate) fn preprocess(source: &str) -> Result<Preprocessed, String> {
    let mut out = Preprocessed::default();
    let mut stack: Vec<Frame> = Vec::new();

    for (index, raw) in source.lines().enumerate() {
        let line_no = index + 1;
        let active = stack.last().is_none_or(|f| f.active);
        let line = raw.trim_start();

        let Some(directive) = line.strip_prefix('#') else {
            if active {
                out.text.push_str(raw);
                out.text.push('\n');
            }
            continue;
        };

        let directive = directive.trim_start();
        let (name, rest) = directive
            .split_once(char::is_whitespace)
            .map_or((directive, ""), |(n, r)| (n, r.trim()));

        match name {
            "if" | "ifdef" | "ifndef" => {
                let cond = active
                    && match name {
                        "ifdef" => out.defines.contains_key(rest),
                        "ifndef" => !out.defines.contains_key(rest),
                        _ => eval(rest, &out.defines),
                    };
                stack.push(Frame {
                    parent_active: active,
                    taken: cond,
                    active: cond,
                });
            }
            "elif" => {
                let frame = stack
                    .last_mut()
                    .ok_or_else(|| format!("ERROR: 0:{line_no}: '#elif' : unexpected"))?;
                if frame.taken {
                    frame.active = false;
                } else {
                    let cond = frame.parent_active && eval(rest, &out.defines);
                    frame.active = cond;
                    frame.taken = cond;
                }
            }
            "else" => {
                let frame = stack
                    .last_mut()
                    .ok_or_else(|| format!("ERROR: 0:{line_no}: '#else' : unexpected"))?;
                frame.active = frame.parent_active && !frame.taken;
                frame.taken = true;
            }
            "endif" => {
                stack
                    .pop()
                    .ok_or_else(|| format!("ERROR: 0:{line_no}: '#endif' : unexpected"))?;
            }
            _ if !active => {}
            "define" => {
                let (key, value) = rest
                    .split_once(char::is_whitespace)
                    .map_or((rest, ""), |(k, v)| (k, v.trim()));
                let key = key.split('(').next().unwrap_or(key);
                out.defines.insert(key.to_owned(), value.to_owned());
            }
            "undef" => {
                out.defines.remove(rest);
            }
            "error" => {
                return Err(format!("ERROR: 0:{line_no}: '#error' : {rest}"));
            }
            _ => {}
        }
    }

    if stack.is_empty() {
        Ok(out)
    } else {
        Err("ERROR: 0:0: '#if' : unterminated conditional".to_owned())
    }
}

fn eval(expr: &str, defines: &FxHashMap<String, String>) -> bool {
    let expr = strip_parens(expr.trim());
    if expr.contains("||") {
        return expr.split("||").any(|t| eval(t, defines));
    }
    if expr.contains("&&") {
        return expr.split("&&").all(|t| eval(t, defines));
    }
    if let Some(inner) = expr.strip_prefix('!') {
        return !eval(inner, defines);
    }
    if let Some(rest) = expr.strip_prefix("defined") {
        let name = strip_parens(rest.trim());
        return defines.contains_key(name.trim());
    }
    for op in [">=", "<=", "==", "!=", ">", "<"] {
        if let Some((lhs, rhs)) = expr.split_once(op) {
            let (a, b) = (value(lhs, defines, 0), value(rhs, defines, 0));
            return match op {
                ">=" => a >= b,
                "<=" => a <= b,
                "==" => a == b,
                "!=" => a != b,
                ">" => a > b,
                _ => a < b,
            };
        }
    }
    value(expr, defines, 0) != 0
}

fn strip_parens(expr: &str) -> &str {
    let mut s = expr.trim();
    while s.starts_with('(') && s.ends_with(')') {
        s = s[1..s.len() - 1].trim();
    }
    s
}

fn value(atom: &str, defines: &FxHashMap<String, String>, depth: u32) -> i64 {
    let atom = strip_parens(atom.trim());
    if let Ok(v) = atom.parse::<i64>() {
        return v;
    }
    match defines.get(atom) {
        Some(v) if depth < 8 => value(v, defines, depth + 1),
        _ => 0,
    }
}

// ─── Tokenizer ────────────────────────────────────────────────────────────────

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.find('\n').map_or("", |i| &after[i..]);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |i| &after[i + 2..]);
            out.push(' ');
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
    }
    out
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            current.push(c);
            continue;
        }
        if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        if !c.is_whitespace() {
            tokens.push(c.to_string());
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

// ─── Declarations ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Field {
    ty: String,
    name: String,
    array: Option<u32>,
}

/// Uniform and attribute declarations found in one stage.
#[derive(Debug, Default)]
pub(crate) struct Declarations {
    structs: FxHashMap<String, Vec<Field>>,
    uniforms: Vec<Field>,
    attributes: Vec<Field>,
    used: FxHashSet<String>,
}

/// One reflected uniform: full path, type code, array size.
pub(crate) type ReflectedUniform = (String, u32, u32);

const QUALIFIERS: [&str; 4] = ["lowp", "mediump", "highp", "const"];

impl Declarations {
    pub fn parse(pre: &Preprocessed) -> Result<Self, String> {
        let tokens = tokenize(&strip_comments(&pre.text));
        let mut decls = Self::default();
        let mut i = 0;

        while i < tokens.len() {
            match tokens[i].as_str() {
                "struct" if tokens.get(i + 2).is_some_and(|t| t == "{") => {
                    let name = tokens[i + 1].clone();
                    i += 3;
                    let mut fields = Vec::new();
                    while i < tokens.len() && tokens[i] != "}" {
                        let (field, next) = parse_declarator(&tokens, i, &pre.defines)?;
                        fields.push(field);
                        i = next;
                    }
                    decls.structs.insert(name, fields);
                    i += 1;
                }
                "uniform" => {
                    let (field, next) = parse_declarator(&tokens, i + 1, &pre.defines)?;
                    decls.uniforms.push(field);
                    i = next;
                }
                "attribute" => {
                    let (field, next) = parse_declarator(&tokens, i + 1, &pre.defines)?;
                    decls.attributes.push(field);
                    i = next;
                }
                token => {
                    if token.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
                        decls.used.insert(token.to_owned());
                    }
                    i += 1;
                }
            }
        }
        Ok(decls)
    }

    /// Active uniforms, expanded into leaf paths.
    pub fn active_uniforms(&self, others: &[&Declarations]) -> Result<Vec<ReflectedUniform>, String> {
        let mut out = Vec::new();
        for u in &self.uniforms {
            let used = self.used.contains(&u.name) || others.iter().any(|o| o.used.contains(&u.name));
            if used {
                self.expand(&u.ty, &u.name, u.array, &mut out)?;
            }
        }
        Ok(out)
    }

    /// Active attributes as `(name, type code)`.
    pub fn active_attributes(&self) -> Result<Vec<(String, u32)>, String> {
        self.attributes
            .iter()
            .filter(|a| self.used.contains(&a.name))
            .map(|a| {
                type_code::from_glsl(&a.ty)
                    .map(|code| (a.name.clone(), code))
                    .ok_or_else(|| format!("'{}' : invalid attribute type", a.ty))
            })
            .collect()
    }

    fn expand(&self, ty: &str, name: &str, array: Option<u32>, out: &mut Vec<ReflectedUniform>) -> Result<(), String> {
        if let Some(fields) = self.structs.get(ty) {
            let prefixes: Vec<String> = match array {
                Some(n) => (0..n).map(|i| format!("{name}[{i}]")).collect(),
                None => vec![name.to_owned()],
            };
            for prefix in prefixes {
                for f in fields {
                    self.expand(&f.ty, &format!("{prefix}.{}", f.name), f.array, out)?;
                }
            }
            return Ok(());
        }

        let code = type_code::from_glsl(ty).ok_or_else(|| format!("'{ty}' : unknown type"))?;
        match array {
            Some(n) => out.push((format!("{name}[0]"), code, n)),
            None => out.push((name.to_owned(), code, 1)),
        }
        Ok(())
    }
}

/// Parses `[qualifiers] type name [ '[' size ']' ] ;` starting at `start`.
fn parse_declarator(
    tokens: &[String],
    start: usize,
    defines: &FxHashMap<String, String>,
) -> Result<(Field, usize), String> {
    let mut i = start;
    while tokens.get(i).is_some_and(|t| QUALIFIERS.contains(&t.as_str())) {
        i += 1;
    }
    let (Some(ty), Some(name)) = (tokens.get(i), tokens.get(i + 1)) else {
        return Err("unexpected end of declaration".to_owned());
    };
    i += 2;

    let mut array = None;
    if tokens.get(i).is_some_and(|t| t == "[") {
        let size_token = tokens.get(i + 1).map(String::as_str).unwrap_or_default();
        let size = size_token
            .parse::<u32>()
            .ok()
            .or_else(|| defines.get(size_token).and_then(|v| v.trim().parse().ok()))
            .ok_or_else(|| format!("'{name}' : array size must be a constant integral expression"))?;
        if size == 0 {
            return Err(format!("'{name}' : array size must be greater than zero"));
        }
        array = Some(size);
        i += 3;
    }

    if tokens.get(i).is_some_and(|t| t == ";") {
        i += 1;
    }

    Ok((
        Field {
            ty: ty.clone(),
            name: name.clone(),
            array,
        },
        i,
    ))
}
