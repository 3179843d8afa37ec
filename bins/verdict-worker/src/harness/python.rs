//! Python driver generation.
//!
//! Python stays fully dynamic: the generated driver infers each
//! argument's type from the form of the input token at runtime, so one
//! driver serves every stub.

use super::{heredoc_command, method_name, Assembled};
use anyhow::Result;
use verdict_common::types::CodeStub;

pub const IMAGE: &str = "python:3.9-slim";

pub fn assemble(stub: &CodeStub, user_code: &str) -> Result<Assembled> {
    let method = method_name(&stub.user_snippet)?;

    let source = format!(
        "{}\n{}\n{}\n\n{}",
        stub.start_snippet,
        user_code,
        stub.end_snippet,
        driver(method)
    );

    let command = heredoc_command("main.py", &source, "python main.py");

    Ok(Assembled {
        image: IMAGE,
        source,
        command,
        combined_compile: false,
    })
}

/// Driver appended after the solution class.
///
/// Token forms, in precedence order: quoted string, bracketed list
/// (element type inferred: quoted → str, true/false → bool, any `.` →
/// float, else int), boolean literal, bare number, raw string fallback.
/// Top-level commas split multi-argument lines such as `[arr],scalar`.
fn driver(method: &str) -> String {
    format!(
        r#"import sys


def _split_args(line):
    parts = []
    depth = 0
    quoted = False
    cur = []
    for ch in line:
        if ch == '"':
            quoted = not quoted
            cur.append(ch)
        elif ch == '[' and not quoted:
            depth += 1
            cur.append(ch)
        elif ch == ']' and not quoted:
            depth -= 1
            cur.append(ch)
        elif ch == ',' and depth == 0 and not quoted:
            parts.append(''.join(cur))
            cur = []
        else:
            cur.append(ch)
    parts.append(''.join(cur))
    return parts


def _strip_quotes(tok):
    if len(tok) >= 2 and tok.startswith('"') and tok.endswith('"'):
        return tok[1:-1]
    return tok


def _parse_scalar(tok):
    tok = tok.strip()
    if tok.startswith('"'):
        return _strip_quotes(tok)
    if tok == 'true':
        return True
    if tok == 'false':
        return False
    try:
        return float(tok) if '.' in tok else int(tok)
    except ValueError:
        return tok


def _parse_list(tok):
    body = tok.strip()[1:-1].strip()
    if not body:
        return []
    items = [p.strip() for p in _split_args(body)]
    if items[0].startswith('"'):
        return [_strip_quotes(p) for p in items]
    if all(p in ('true', 'false') for p in items):
        return [p == 'true' for p in items]
    if any('.' in p for p in items):
        return [float(p) for p in items]
    return [int(p) for p in items]


def _parse_token(tok):
    tok = tok.strip()
    if tok.startswith('['):
        return _parse_list(tok)
    return _parse_scalar(tok)


def _format(value):
    if value is True:
        return 'true'
    if value is False:
        return 'false'
    if isinstance(value, (list, tuple)):
        return '[' + ','.join(_format(v) for v in value) + ']'
    return str(value)


def _main():
    line = sys.stdin.readline().rstrip('\n').strip()
    args = [_parse_token(t) for t in _split_args(line)] if line else []
    result = Solution().{method}(*args)
    sys.stdout.write(_format(result) + '\n')


if __name__ == '__main__':
    _main()
"#,
        method = method
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_common::types::Language;

    fn stub() -> CodeStub {
        CodeStub {
            language: Language::Python,
            start_snippet: "class Solution:".to_string(),
            user_snippet: "    def validParentheses(self, s):".to_string(),
            end_snippet: String::new(),
        }
    }

    #[test]
    fn test_assemble_layout() {
        let user_code = "    def validParentheses(self, s):\n        return True";
        let assembled = assemble(&stub(), user_code).unwrap();

        assert_eq!(assembled.image, "python:3.9-slim");
        assert!(!assembled.combined_compile);
        assert!(assembled.source.starts_with("class Solution:"));
        assert!(assembled.source.contains(user_code));
        // Driver dispatches to the method named in the stub signature.
        assert!(assembled
            .source
            .contains("result = Solution().validParentheses(*args)"));
    }

    #[test]
    fn test_driver_handles_empty_list_form() {
        let assembled = assemble(&stub(), "    pass").unwrap();
        // Zero-length list inputs short-circuit before element inference.
        assert!(assembled.source.contains("if not body:\n        return []"));
    }

    #[test]
    fn test_command_runs_python() {
        let assembled = assemble(&stub(), "    pass").unwrap();
        assert_eq!(assembled.command[0], "/bin/sh");
        assert!(assembled.command[2].ends_with("python main.py"));
    }
}
