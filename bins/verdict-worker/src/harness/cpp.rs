//! C++ driver generation.
//!
//! Like Java, argument decoders are generated against the declared
//! parameter types of the stub signature. Output printing dispatches
//! through `emit` overloads, so the return type needs no mapping here.

use super::{heredoc_command, parse_signature, Assembled};
use anyhow::{bail, Result};
use verdict_common::types::CodeStub;

pub const IMAGE: &str = "gcc:latest";

pub fn assemble(stub: &CodeStub, user_code: &str) -> Result<Assembled> {
    let sig = parse_signature(&stub.user_snippet)?;

    let decls = sig
        .params
        .iter()
        .enumerate()
        .map(|(i, ty)| decl_for(ty, i))
        .collect::<Result<Vec<_>>>()?
        .join("\n");

    let call_args = (0..sig.params.len())
        .map(|i| format!("a{}", i))
        .collect::<Vec<_>>()
        .join(", ");

    let invoke = if normalize(&sig.return_type) == "void" {
        format!("    sol.{}({});", sig.name, call_args)
    } else {
        format!(
            "    auto result = sol.{}({});\n    harness::emit(result);",
            sig.name, call_args
        )
    };

    let source = format!(
        "{}\n{}\n{}\n{}\n\n{}\n\n{}",
        INCLUDES,
        stub.start_snippet,
        user_code,
        stub.end_snippet,
        HELPERS,
        main_fn(&decls, &invoke)
    );

    let command = heredoc_command(
        "main.cpp",
        &source,
        "g++ -std=c++17 -O2 main.cpp -o main && ./main",
    );

    Ok(Assembled {
        image: IMAGE,
        source,
        command,
        combined_compile: true,
    })
}

/// Strip `const`, references, and the `std::` prefix so type matching
/// works on the canonical spelling.
fn normalize(ty: &str) -> String {
    ty.replace("const ", "")
        .replace('&', "")
        .replace("std::", "")
        .trim()
        .to_string()
}

fn decl_for(ty: &str, idx: usize) -> Result<String> {
    let tok = format!("tokens.at({})", idx);
    let normalized = normalize(ty);
    let (decl_ty, parsed) = match normalized.as_str() {
        "int" => ("int", format!("harness::parse_int({})", tok)),
        "long" | "long long" => ("long long", format!("harness::parse_long({})", tok)),
        "double" => ("double", format!("harness::parse_double({})", tok)),
        "bool" => ("bool", format!("harness::parse_bool({})", tok)),
        "string" => ("std::string", format!("harness::unquote({})", tok)),
        "vector<int>" => (
            "std::vector<int>",
            format!("harness::parse_int_list({})", tok),
        ),
        "vector<double>" => (
            "std::vector<double>",
            format!("harness::parse_double_list({})", tok),
        ),
        "vector<string>" | "vector<std::string>" => (
            "std::vector<std::string>",
            format!("harness::parse_string_list({})", tok),
        ),
        _ => bail!("unsupported cpp parameter type: {}", ty),
    };
    Ok(format!("    {} a{} = {};", decl_ty, idx, parsed))
}

fn main_fn(decls: &str, invoke: &str) -> String {
    format!(
        r#"int main() {{
    std::string line;
    std::getline(std::cin, line);
    line = harness::trim(line);
    std::vector<std::string> tokens;
    if (!line.empty()) tokens = harness::split_args(line);
    Solution sol;
{decls}
{invoke}
    std::cout << '\n';
    return 0;
}}"#,
        decls = decls,
        invoke = invoke
    )
}

const INCLUDES: &str = "#include <iostream>\n#include <string>\n#include <vector>\n";

const HELPERS: &str = r#"namespace harness {

std::string trim(const std::string& s) {
    size_t b = s.find_first_not_of(" \t\r\n");
    if (b == std::string::npos) return "";
    size_t e = s.find_last_not_of(" \t\r\n");
    return s.substr(b, e - b + 1);
}

std::vector<std::string> split_args(const std::string& line) {
    std::vector<std::string> parts;
    int depth = 0;
    bool quoted = false;
    std::string cur;
    for (char ch : line) {
        if (ch == '"') { quoted = !quoted; cur.push_back(ch); }
        else if (ch == '[' && !quoted) { depth++; cur.push_back(ch); }
        else if (ch == ']' && !quoted) { depth--; cur.push_back(ch); }
        else if (ch == ',' && depth == 0 && !quoted) { parts.push_back(cur); cur.clear(); }
        else { cur.push_back(ch); }
    }
    parts.push_back(cur);
    return parts;
}

std::string unquote(const std::string& tok) {
    std::string t = trim(tok);
    if (t.size() >= 2 && t.front() == '"' && t.back() == '"') {
        return t.substr(1, t.size() - 2);
    }
    return t;
}

int parse_int(const std::string& tok) { return std::stoi(trim(tok)); }
long long parse_long(const std::string& tok) { return std::stoll(trim(tok)); }
double parse_double(const std::string& tok) { return std::stod(trim(tok)); }
bool parse_bool(const std::string& tok) { return trim(tok) == "true"; }

std::vector<std::string> items(const std::string& tok) {
    std::string t = trim(tok);
    std::string body = trim(t.substr(1, t.size() - 2));
    std::vector<std::string> out;
    if (body.empty()) return out;
    return split_args(body);
}

std::vector<int> parse_int_list(const std::string& tok) {
    std::vector<int> out;
    for (const auto& item : items(tok)) out.push_back(parse_int(item));
    return out;
}

std::vector<double> parse_double_list(const std::string& tok) {
    std::vector<double> out;
    for (const auto& item : items(tok)) out.push_back(parse_double(item));
    return out;
}

std::vector<std::string> parse_string_list(const std::string& tok) {
    std::vector<std::string> out;
    for (const auto& item : items(tok)) out.push_back(unquote(item));
    return out;
}

void emit(bool v) { std::cout << (v ? "true" : "false"); }
void emit(int v) { std::cout << v; }
void emit(long long v) { std::cout << v; }
void emit(double v) { std::cout << v; }
void emit(const std::string& v) { std::cout << v; }

template <typename T>
void emit(const std::vector<T>& v) {
    std::cout << '[';
    for (size_t i = 0; i < v.size(); i++) {
        if (i > 0) std::cout << ',';
        emit(v[i]);
    }
    std::cout << ']';
}

}  // namespace harness"#;
