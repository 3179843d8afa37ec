/// Language Harness - Driver Generation Around User Code
///
/// **Core Responsibility:**
/// Turn `(stub, user code)` into one complete, runnable source file plus
/// the container command that compiles and runs it.
///
/// The generated driver reads exactly one test-case line from stdin,
/// parses it into argument values, invokes the solution method, and
/// prints the return value in canonical form as a single stdout line.
/// All input parsing happens inside the container in the target
/// language; the host never inspects user code structure. The only
/// things read on the host side come from the stub contract: the method
/// name (identifier immediately preceding `(` in `user_snippet`) and,
/// for the statically typed languages, the declared parameter types of
/// that same signature.
///
/// Source is injected via a base64-decoded heredoc so user code never
/// needs shell escaping.
pub mod cpp;
pub mod java;
pub mod python;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use verdict_common::types::{CodeStub, Language};

/// A fully assembled submission: source file plus the container
/// invocation that runs it.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub image: &'static str,
    pub source: String,
    pub command: Vec<String>,
    /// Compile and run share one invocation (affects the deadline).
    pub combined_compile: bool,
}

pub fn assemble(language: Language, stub: &CodeStub, user_code: &str) -> Result<Assembled> {
    match language {
        Language::Python => python::assemble(stub, user_code),
        Language::Java => java::assemble(stub, user_code),
        Language::Cpp => cpp::assemble(stub, user_code),
    }
}

/// The solution method name: the identifier immediately preceding the
/// first `(` of the stub signature.
pub fn method_name(user_snippet: &str) -> Result<&str> {
    let open = user_snippet
        .find('(')
        .context("stub signature has no parameter list")?;
    let head = user_snippet[..open].trim_end();
    let start = head
        .rfind(|c: char| !(c.is_alphanumeric() || c == '_'))
        .map(|i| i + 1)
        .unwrap_or(0);
    let name = &head[start..];
    if name.is_empty() {
        bail!("could not extract method name from stub signature");
    }
    Ok(name)
}

/// Declared signature of the stub's solution method.
#[derive(Debug, Clone)]
pub(crate) struct Signature {
    pub name: String,
    pub return_type: String,
    pub params: Vec<String>,
}

pub(crate) fn parse_signature(user_snippet: &str) -> Result<Signature> {
    let name = method_name(user_snippet)?.to_string();
    let open = user_snippet.find('(').unwrap();

    let head = user_snippet[..open].trim_end();
    let head = &head[..head.len() - name.len()];
    let return_type = head
        .split_whitespace()
        .last()
        .context("stub signature has no return type")?
        .to_string();

    let close = matching_paren(user_snippet, open)?;
    let params = split_top_level(&user_snippet[open + 1..close])
        .into_iter()
        .map(|p| param_type(&p))
        .filter(|t| !t.is_empty())
        .collect();

    Ok(Signature {
        name,
        return_type,
        params,
    })
}

fn matching_paren(src: &str, open: usize) -> Result<usize> {
    let mut depth = 0i32;
    for (i, ch) in src[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(open + i);
                }
            }
            _ => {}
        }
    }
    bail!("unbalanced parentheses in stub signature")
}

/// Split on commas that sit outside `<>`, `[]`, and `()` nesting.
pub(crate) fn split_top_level(src: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut cur = String::new();
    for ch in src.chars() {
        match ch {
            '<' | '[' | '(' => {
                depth += 1;
                cur.push(ch);
            }
            '>' | ']' | ')' => {
                depth -= 1;
                cur.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(cur.trim().to_string());
                cur.clear();
            }
            _ => cur.push(ch),
        }
    }
    let last = cur.trim();
    if !last.is_empty() {
        parts.push(last.to_string());
    }
    parts
}

/// Everything before the trailing parameter name.
fn param_type(param: &str) -> String {
    let param = param.trim();
    match param.rfind(char::is_whitespace) {
        Some(i) => param[..i].trim().to_string(),
        None => param.to_string(),
    }
}

/// `sh -c` line that materializes the source inside the container and
/// runs it. Base64 keeps arbitrary user code out of shell syntax.
pub(crate) fn heredoc_command(filename: &str, source: &str, run: &str) -> Vec<String> {
    let encoded = general_purpose::STANDARD.encode(source);
    vec![
        "/bin/sh".to_string(),
        "-c".to_string(),
        format!(
            "cd /tmp && echo '{}' | base64 -d > {} && {}",
            encoded, filename, run
        ),
    ]
}
