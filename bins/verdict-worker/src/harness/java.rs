//! Java driver generation.
//!
//! Java parsing is typed: argument decoders are generated against the
//! parameter types declared by the stub signature, so the emitted main
//! compiles without reflection.

use super::{heredoc_command, parse_signature, Assembled};
use anyhow::{bail, Result};
use verdict_common::types::CodeStub;

pub const IMAGE: &str = "eclipse-temurin:17";

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

    let invoke = if sig.return_type == "void" {
        format!(
            "        sol.{}({});\n        System.out.println();",
            sig.name, call_args
        )
    } else {
        format!(
            "        {} result = sol.{}({});\n        System.out.println(Harness.format(result));",
            sig.return_type, sig.name, call_args
        )
    };

    let source = format!(
        "{}\n{}\n{}\n\n{}\n\n{}",
        stub.start_snippet,
        user_code,
        stub.end_snippet,
        main_class(&decls, &invoke),
        HARNESS_CLASS
    );

    let command = heredoc_command("Main.java", &source, "javac Main.java && java Main");

    Ok(Assembled {
        image: IMAGE,
        source,
        command,
        combined_compile: true,
    })
}

fn decl_for(ty: &str, idx: usize) -> Result<String> {
    let tok = format!("tokens.get({})", idx);
    let parsed = match ty {
        "int" => format!("Integer.parseInt({}.trim())", tok),
        "long" => format!("Long.parseLong({}.trim())", tok),
        "double" => format!("Double.parseDouble({}.trim())", tok),
        "boolean" => format!("Boolean.parseBoolean({}.trim())", tok),
        "String" => format!("Harness.unquote({})", tok),
        "int[]" => format!("Harness.intArray({})", tok),
        "long[]" => format!("Harness.longArray({})", tok),
        "double[]" => format!("Harness.doubleArray({})", tok),
        "String[]" => format!("Harness.stringArray({})", tok),
        "List<Integer>" => format!("Harness.intList({})", tok),
        "List<String>" => format!("Harness.stringList({})", tok),
        _ => bail!("unsupported java parameter type: {}", ty),
    };
    Ok(format!("        {} a{} = {};", ty, idx, parsed))
}

fn main_class(decls: &str, invoke: &str) -> String {
    format!(
        r#"public class Main {{
    public static void main(String[] args) throws Exception {{
        java.io.BufferedReader br = new java.io.BufferedReader(new java.io.InputStreamReader(System.in));
        String line = br.readLine();
        if (line == null) line = "";
        line = line.trim();
        java.util.List<String> tokens = line.isEmpty()
            ? new java.util.ArrayList<String>()
            : Harness.splitArgs(line);
        Solution sol = new Solution();
{decls}
{invoke}
    }}
}}"#,
        decls = decls,
        invoke = invoke
    )
}

const HARNESS_CLASS: &str = r#"class Harness {
    static java.util.List<String> splitArgs(String line) {
        java.util.List<String> parts = new java.util.ArrayList<>();
        int depth = 0;
        boolean quoted = false;
        StringBuilder cur = new StringBuilder();
        for (int i = 0; i < line.length(); i++) {
            char ch = line.charAt(i);
            if (ch == '"') { quoted = !quoted; cur.append(ch); }
            else if (ch == '[' && !quoted) { depth++; cur.append(ch); }
            else if (ch == ']' && !quoted) { depth--; cur.append(ch); }
            else if (ch == ',' && depth == 0 && !quoted) { parts.add(cur.toString()); cur.setLength(0); }
            else { cur.append(ch); }
        }
        parts.add(cur.toString());
        return parts;
    }

    static String unquote(String tok) {
        tok = tok.trim();
        if (tok.length() >= 2 && tok.startsWith("\"") && tok.endsWith("\"")) {
            return tok.substring(1, tok.length() - 1);
        }
        return tok;
    }

    static String[] items(String tok) {
        tok = tok.trim();
        String body = tok.substring(1, tok.length() - 1).trim();
        if (body.isEmpty()) return new String[0];
        java.util.List<String> parts = splitArgs(body);
        String[] out = new String[parts.size()];
        for (int i = 0; i < parts.size(); i++) out[i] = parts.get(i).trim();
        return out;
    }

    static int[] intArray(String tok) {
        String[] raw = items(tok);
        int[] out = new int[raw.length];
        for (int i = 0; i < raw.length; i++) out[i] = Integer.parseInt(raw[i]);
        return out;
    }

    static long[] longArray(String tok) {
        String[] raw = items(tok);
        long[] out = new long[raw.length];
        for (int i = 0; i < raw.length; i++) out[i] = Long.parseLong(raw[i]);
        return out;
    }

    static double[] doubleArray(String tok) {
        String[] raw = items(tok);
        double[] out = new double[raw.length];
        for (int i = 0; i < raw.length; i++) out[i] = Double.parseDouble(raw[i]);
        return out;
    }

    static String[] stringArray(String tok) {
        String[] raw = items(tok);
        for (int i = 0; i < raw.length; i++) raw[i] = unquote(raw[i]);
        return raw;
    }

    static java.util.List<Integer> intList(String tok) {
        java.util.List<Integer> out = new java.util.ArrayList<>();
        for (String s : items(tok)) out.add(Integer.parseInt(s));
        return out;
    }

    static java.util.List<String> stringList(String tok) {
        java.util.List<String> out = new java.util.ArrayList<>();
        for (String s : items(tok)) out.add(unquote(s));
        return out;
    }

    static String format(Object v) {
        if (v == null) return "null";
        if (v instanceof int[]) {
            StringBuilder sb = new StringBuilder("[");
            int[] a = (int[]) v;
            for (int i = 0; i < a.length; i++) { if (i > 0) sb.append(','); sb.append(a[i]); }
            return sb.append(']').toString();
        }
        if (v instanceof long[]) {
            StringBuilder sb = new StringBuilder("[");
            long[] a = (long[]) v;
            for (int i = 0; i < a.length; i++) { if (i > 0) sb.append(','); sb.append(a[i]); }
            return sb.append(']').toString();
        }
        if (v instanceof double[]) {
            StringBuilder sb = new StringBuilder("[");
            double[] a = (double[]) v;
            for (int i = 0; i < a.length; i++) { if (i > 0) sb.append(','); sb.append(a[i]); }
            return sb.append(']').toString();
        }
        if (v instanceof Object[]) {
            StringBuilder sb = new StringBuilder("[");
            Object[] a = (Object[]) v;
            for (int i = 0; i < a.length; i++) { if (i > 0) sb.append(','); sb.append(format(a[i])); }
            return sb.append(']').toString();
        }
        if (v instanceof java.util.List) {
            StringBuilder sb = new StringBuilder("[");
            java.util.List<?> a = (java.util.List<?>) v;
            for (int i = 0; i < a.size(); i++) { if (i > 0) sb.append(','); sb.append(format(a.get(i))); }
            return sb.append(']').toString();
        }
        return String.valueOf(v);
    }
}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_common::types::Language;

    fn stub(user_snippet: &str) -> CodeStub {
        CodeStub {
            language: Language::Java,
            start_snippet: "import java.util.*;\nclass Solution {".to_string(),
            user_snippet: user_snippet.to_string(),
            end_snippet: "}".to_string(),
        }
    }

    #[test]
    fn test_assemble_two_sum() {
        let stub = stub("    public int[] twoSum(int[] nums, int target) {");
        let user_code =
            "    public int[] twoSum(int[] nums, int target) {\n        return new int[]{0, 1};\n    }";

        let assembled = assemble(&stub, user_code).unwrap();

        assert_eq!(assembled.image, "eclipse-temurin:17");
        assert!(assembled.combined_compile);
        assert!(assembled
            .source
            .contains("int[] a0 = Harness.intArray(tokens.get(0));"));
        assert!(assembled
            .source
            .contains("int a1 = Integer.parseInt(tokens.get(1).trim());"));
        assert!(assembled
            .source
            .contains("int[] result = sol.twoSum(a0, a1);"));
        assert!(assembled.command[2].contains("javac Main.java && java Main"));
    }

    #[test]
    fn test_assemble_string_param() {
        let stub = stub("    public boolean validParentheses(String s) {");
        let assembled = assemble(&stub, "    ...").unwrap();

        assert!(assembled
            .source
            .contains("String a0 = Harness.unquote(tokens.get(0));"));
        assert!(assembled
            .source
            .contains("boolean result = sol.validParentheses(a0);"));
    }

    #[test]
    fn test_void_return_prints_blank_line() {
        let stub = stub("    public void rotate(int[] nums) {");
        let assembled = assemble(&stub, "    ...").unwrap();

        assert!(assembled.source.contains("sol.rotate(a0);"));
        assert!(assembled.source.contains("System.out.println();"));
        assert!(!assembled.source.contains("void result"));
    }

    #[test]
    fn test_unsupported_parameter_type() {
        let stub = stub("    public int walk(TreeNode root) {");
        let err = assemble(&stub, "    ...").unwrap_err();
        assert!(err.to_string().contains("unsupported java parameter type"));
    }
}
