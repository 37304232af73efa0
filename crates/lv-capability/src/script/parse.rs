//! Line-oriented parser for capability scripts.

use std::collections::BTreeSet;

use lv_core::Value;

use crate::CompileError;

// ── Syntax tree ───────────────────────────────────────────────────────────────

pub(crate) struct Script {
    pub name:      String,
    pub methods:   Vec<MethodDef>,
    pub accessors: Vec<(String, AccessorDef)>,
}

pub(crate) struct MethodDef {
    pub name: String,
    /// `(line, statement)` pairs.
    pub body: Vec<(usize, Stmt)>,
}

pub(crate) enum AccessorDef {
    /// Getter and setter backed by a base field.
    Field(String),
    /// Read-only literal.
    Constant(Value),
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Lit(Value),
    SelfId,
    Arg(usize),
    Member(String),
}

#[derive(Debug, Clone)]
pub(crate) enum Rhs {
    Expr(Expr),
    Invoke { method: String, args: Vec<Expr> },
    Call   { target: String, method: String, args: Vec<Expr> },
    Has    { spec: String, method: Option<String> },
}

#[derive(Debug, Clone)]
pub(crate) enum Stmt {
    Set       { member: String, rhs: Rhs },
    Add       { member: String, expr: Expr },
    Push      { member: String, expr: Expr },
    Invoke    { method: String, args: Vec<Expr> },
    Call      { target: String, method: String, args: Vec<Expr> },
    Future    { delay: u64, method: String, args: Vec<Expr> },
    Listen    { event: String, handler: String },
    Subscribe { scope: Expr, event: String, handler: String },
    Publish   { scope: Expr, event: String, data: Option<Expr> },
    Log(Vec<Expr>),
    Return(Rhs),
}

// ── Tokens ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Str(String),
}

impl Token {
    fn word(&self) -> Option<&str> {
        match self {
            Token::Word(w) => Some(w),
            Token::Str(_) => None,
        }
    }
}

/// Split one line into tokens, dropping any `#` comment.
fn tokenize(line: &str, err: &dyn Fn(String) -> CompileError) -> Result<Vec<Token>, CompileError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '#' {
            break;
        } else if c == '"' {
            chars.next();
            let mut text = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some('"') => text.push('"'),
                        Some('\\') => text.push('\\'),
                        Some('n') => text.push('\n'),
                        Some(other) => return Err(err(format!("unknown escape \\{other}"))),
                        None => break,
                    },
                    other => text.push(other),
                }
            }
            if !closed {
                return Err(err("unterminated string literal".to_string()));
            }
            tokens.push(Token::Str(text));
        } else {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '"' || c == '#' {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(Token::Word(word));
        }
    }
    Ok(tokens)
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Parse a whole script.
pub(crate) fn parse(source: &str, location: &str) -> Result<Script, CompileError> {
    let mut lines = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let no = idx + 1;
        let err = |m: String| CompileError::new(location, no, m);
        let tokens = tokenize(raw, &err)?;
        if !tokens.is_empty() {
            lines.push((no, tokens));
        }
    }

    let mut iter = lines.into_iter();

    let name = match iter.next() {
        None => return Err(CompileError::new(location, 0, "empty source")),
        Some((no, tokens)) => match tokens.as_slice() {
            [Token::Word(kw), Token::Word(name)] if kw == "capability" => {
                check_ident(name, location, no)?;
                name.clone()
            }
            _ => {
                return Err(CompileError::new(
                    location,
                    no,
                    "expected `capability <Name>` header",
                ));
            }
        },
    };

    let mut script = Script { name, methods: Vec::new(), accessors: Vec::new() };
    let mut seen = BTreeSet::new();
    let mut closed = false;

    while let Some((no, tokens)) = iter.next() {
        let err = |m: String| CompileError::new(location, no, m);
        if closed {
            return Err(err("content after closing `end`".to_string()));
        }
        match tokens[0].word() {
            Some("end") if tokens.len() == 1 => closed = true,

            Some("accessor") => {
                let (name, def) = parse_accessor(&tokens[1..], &err)?;
                check_ident(&name, location, no)?;
                if !seen.insert(name.clone()) {
                    return Err(err(format!("duplicate member `{name}`")));
                }
                script.accessors.push((name, def));
            }

            Some("method") => {
                let (name, params) = parse_method_header(&tokens[1..], &err)?;
                check_ident(&name, location, no)?;
                if !seen.insert(name.clone()) {
                    return Err(err(format!("duplicate member `{name}`")));
                }
                let mut body = Vec::new();
                let mut ended = false;
                for (no, tokens) in iter.by_ref() {
                    let err = |m: String| CompileError::new(location, no, m);
                    if tokens.len() == 1 && tokens[0].word() == Some("end") {
                        ended = true;
                        break;
                    }
                    body.push((no, parse_stmt(&tokens, &params, &err)?));
                }
                if !ended {
                    return Err(err(format!("method `{name}` is missing `end`")));
                }
                script.methods.push(MethodDef { name, body });
            }

            _ => return Err(err(format!("unexpected `{}`", render(&tokens)))),
        }
    }

    if !closed {
        return Err(CompileError::new(
            location,
            0,
            format!("capability `{}` is missing `end`", script.name),
        ));
    }
    Ok(script)
}

fn check_ident(name: &str, location: &str, line: usize) -> Result<(), CompileError> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CompileError::new(location, line, format!("invalid identifier `{name}`")))
    }
}

fn render(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| match t {
            Token::Word(w) => w.clone(),
            Token::Str(s) => format!("{s:?}"),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_accessor(
    rest: &[Token],
    err: &dyn Fn(String) -> CompileError,
) -> Result<(String, AccessorDef), CompileError> {
    match rest {
        [Token::Word(name), Token::Word(arrow), Token::Word(field)] if arrow == "->" => {
            Ok((name.clone(), AccessorDef::Field(field.clone())))
        }
        [Token::Word(name), Token::Word(eq), literal] if eq == "=" => {
            match parse_expr(literal, &[], err)? {
                Expr::Lit(value) => Ok((name.clone(), AccessorDef::Constant(value))),
                _ => Err(err("accessor constant must be a literal".to_string())),
            }
        }
        _ => Err(err(
            "expected `accessor <name> -> <field>` or `accessor <name> = <literal>`".to_string(),
        )),
    }
}

/// `name` or `name(a, b)`; parameter lists may contain spaces.
fn parse_method_header(
    rest: &[Token],
    err: &dyn Fn(String) -> CompileError,
) -> Result<(String, Vec<String>), CompileError> {
    let mut joined = String::new();
    for token in rest {
        match token {
            Token::Word(w) => joined.push_str(w),
            Token::Str(_) => return Err(err("unexpected string in method header".to_string())),
        }
    }
    if joined.is_empty() {
        return Err(err("method needs a name".to_string()));
    }

    let Some(open) = joined.find('(') else {
        return Ok((joined, Vec::new()));
    };
    if !joined.ends_with(')') {
        return Err(err(format!("malformed parameter list in `{joined}`")));
    }
    let name = joined[..open].to_string();
    let inner = &joined[open + 1..joined.len() - 1];
    let params: Vec<String> = if inner.is_empty() {
        Vec::new()
    } else {
        inner.split(',').map(|p| p.trim().to_string()).collect()
    };
    if params.iter().any(String::is_empty) {
        return Err(err(format!("empty parameter in `{joined}`")));
    }
    Ok((name, params))
}

fn word<'a>(
    tokens: &'a [Token],
    idx: usize,
    what: &str,
    err: &dyn Fn(String) -> CompileError,
) -> Result<&'a str, CompileError> {
    match tokens.get(idx) {
        Some(Token::Word(w)) => Ok(w),
        Some(Token::Str(s)) => Err(err(format!("expected {what}, found string {s:?}"))),
        None => Err(err(format!("expected {what}"))),
    }
}

fn parse_exprs(
    tokens: &[Token],
    params: &[String],
    err: &dyn Fn(String) -> CompileError,
) -> Result<Vec<Expr>, CompileError> {
    tokens.iter().map(|t| parse_expr(t, params, err)).collect()
}

fn parse_expr(
    token: &Token,
    params: &[String],
    err: &dyn Fn(String) -> CompileError,
) -> Result<Expr, CompileError> {
    let w = match token {
        Token::Str(s) => return Ok(Expr::Lit(Value::Text(s.clone()))),
        Token::Word(w) => w.as_str(),
    };
    match w {
        "true" => return Ok(Expr::Lit(Value::Bool(true))),
        "false" => return Ok(Expr::Lit(Value::Bool(false))),
        "null" => return Ok(Expr::Lit(Value::Null)),
        "self" => return Ok(Expr::SelfId),
        _ => {}
    }
    if let Some(arg) = w.strip_prefix('$') {
        if let Ok(idx) = arg.parse::<usize>() {
            return Ok(Expr::Arg(idx));
        }
        return params
            .iter()
            .position(|p| p == arg)
            .map(Expr::Arg)
            .ok_or_else(|| err(format!("unknown argument `${arg}`")));
    }
    if let Some(member) = w.strip_prefix('@') {
        if member.is_empty() {
            return Err(err("empty member reference `@`".to_string()));
        }
        return Ok(Expr::Member(member.to_string()));
    }
    w.parse::<i64>()
        .map(|n| Expr::Lit(Value::Int(n)))
        .map_err(|_| err(format!("bad expression `{w}`")))
}

fn parse_rhs(
    tokens: &[Token],
    params: &[String],
    err: &dyn Fn(String) -> CompileError,
) -> Result<Rhs, CompileError> {
    match tokens.first().and_then(Token::word) {
        Some("invoke") => Ok(Rhs::Invoke {
            method: word(tokens, 1, "method name", err)?.to_string(),
            args:   parse_exprs(&tokens[2..], params, err)?,
        }),
        Some("call") => {
            let target = word(tokens, 1, "target behavior", err)?.to_string();
            let method = word(tokens, 2, "method name", err)?.to_string();
            Ok(Rhs::Call { target, method, args: parse_exprs(&tokens[3..], params, err)? })
        }
        Some("has") => {
            let spec = word(tokens, 1, "module spec", err)?.to_string();
            let method = match tokens.len() {
                2 => None,
                3 => Some(word(tokens, 2, "method name", err)?.to_string()),
                _ => return Err(err("`has` takes a spec and an optional method".to_string())),
            };
            Ok(Rhs::Has { spec, method })
        }
        _ => match tokens {
            [single] => Ok(Rhs::Expr(parse_expr(single, params, err)?)),
            [] => Err(err("missing value".to_string())),
            _ => Err(err(format!("expected a single value, found `{}`", render(tokens)))),
        },
    }
}

fn parse_stmt(
    tokens: &[Token],
    params: &[String],
    err: &dyn Fn(String) -> CompileError,
) -> Result<Stmt, CompileError> {
    let Some(head) = tokens[0].word() else {
        return Err(err(format!("statement cannot start with a string: `{}`", render(tokens))));
    };
    let arity = |n: usize| -> Result<(), CompileError> {
        if tokens.len() == n {
            Ok(())
        } else {
            Err(err(format!("`{head}` takes {} operand(s)", n - 1)))
        }
    };

    let stmt = match head {
        "set" => Stmt::Set {
            member: word(tokens, 1, "member name", err)?.to_string(),
            rhs:    parse_rhs(&tokens[2.min(tokens.len())..], params, err)?,
        },
        "add" => {
            arity(3)?;
            Stmt::Add {
                member: word(tokens, 1, "member name", err)?.to_string(),
                expr:   parse_expr(&tokens[2], params, err)?,
            }
        }
        "push" => {
            arity(3)?;
            Stmt::Push {
                member: word(tokens, 1, "member name", err)?.to_string(),
                expr:   parse_expr(&tokens[2], params, err)?,
            }
        }
        "invoke" => Stmt::Invoke {
            method: word(tokens, 1, "method name", err)?.to_string(),
            args:   parse_exprs(&tokens[2..], params, err)?,
        },
        "call" => {
            let target = word(tokens, 1, "target behavior", err)?.to_string();
            let method = word(tokens, 2, "method name", err)?.to_string();
            Stmt::Call { target, method, args: parse_exprs(&tokens[3..], params, err)? }
        }
        "future" => {
            let raw = word(tokens, 1, "delay", err)?;
            let delay = raw
                .parse::<u64>()
                .map_err(|_| err(format!("bad delay `{raw}`")))?;
            let method = word(tokens, 2, "method name", err)?.to_string();
            Stmt::Future { delay, method, args: parse_exprs(&tokens[3..], params, err)? }
        }
        "listen" => {
            arity(3)?;
            Stmt::Listen {
                event:   word(tokens, 1, "event name", err)?.to_string(),
                handler: word(tokens, 2, "handler name", err)?.to_string(),
            }
        }
        "subscribe" => {
            arity(4)?;
            Stmt::Subscribe {
                scope:   parse_expr(&tokens[1], params, err)?,
                event:   word(tokens, 2, "event name", err)?.to_string(),
                handler: word(tokens, 3, "handler name", err)?.to_string(),
            }
        }
        "publish" => {
            if !(3..=4).contains(&tokens.len()) {
                return Err(err("`publish` takes a scope, an event and an optional value".to_string()));
            }
            Stmt::Publish {
                scope: parse_expr(&tokens[1], params, err)?,
                event: word(tokens, 2, "event name", err)?.to_string(),
                data:  tokens.get(3).map(|t| parse_expr(t, params, err)).transpose()?,
            }
        }
        "log" => {
            if tokens.len() < 2 {
                return Err(err("`log` needs at least one value".to_string()));
            }
            Stmt::Log(parse_exprs(&tokens[1..], params, err)?)
        }
        "return" => Stmt::Return(parse_rhs(&tokens[1..], params, err)?),
        other => return Err(err(format!("unknown statement `{other}`"))),
    };
    Ok(stmt)
}
