//! Registry of the standard modules the importer knows about.
//!
//! Each module has a stable index (core is 0), the names of the builtins the
//! VM implements for it, and a Blue source text compiled at import time. The
//! registry is immutable; parsed sources are cached by the compiler that
//! imports them.

use std::collections::HashMap;

use once_cell::sync::Lazy;

#[derive(Debug)]
pub struct StdModule {
    pub name: &'static str,
    pub index: u8,
    /// Builtin names; a builtin's index is its position here.
    pub builtins: &'static [&'static str],
    pub source: &'static str,
}

impl StdModule {
    pub fn builtin_index(&self, name: &str) -> Option<usize> {
        self.builtins.iter().position(|b| *b == name)
    }
}

pub const CORE: &str = "core";

const CORE_BUILTINS: &[&str] = &[
    "len", "print", "println", "_get_", "type", "str", "int", "float", "append", "keys",
    "values", "input", "exit", "error", "range", "sort", "split", "join", "abs", "min", "max",
    "format", "sleep",
];

const HTTP_BUILTINS: &[&str] = &["get", "post", "put", "delete", "serve", "handle"];
const TIME_BUILTINS: &[&str] = &["now", "sleep", "format", "parse", "since"];
const SEARCH_BUILTINS: &[&str] = &["find", "grep", "glob"];
const DB_BUILTINS: &[&str] = &["open", "exec", "query", "close"];
const MATH_BUILTINS: &[&str] = &[
    "sqrt", "pow", "floor", "ceil", "round", "sin", "cos", "tan", "log", "exp", "rand",
];
const CONFIG_BUILTINS: &[&str] = &["load_json", "load_toml", "load_yaml", "dump_json"];
const CRYPTO_BUILTINS: &[&str] = &["sha256", "md5", "random_bytes", "encrypt", "decrypt"];
const NET_BUILTINS: &[&str] = &["connect", "listen", "lookup", "dial_udp"];
const COLOR_BUILTINS: &[&str] = &["rgb", "style"];
const CSV_BUILTINS: &[&str] = &["parse", "write"];
const PSUTIL_BUILTINS: &[&str] = &["cpu_percent", "memory", "disk", "processes"];
const WASM_BUILTINS: &[&str] = &["load", "call"];

#[cfg(not(feature = "static-ui"))]
const UI_BUILTINS: &[&str] = &["window", "button", "label", "entry", "run"];
#[cfg(feature = "static-ui")]
const UI_BUILTINS: &[&str] = &["label", "render"];

#[cfg(not(feature = "static-ui"))]
const GG_BUILTINS: &[&str] = &[
    "new_context", "draw_line", "draw_rect", "draw_circle", "save_png", "show",
];
#[cfg(feature = "static-ui")]
const GG_BUILTINS: &[&str] = &["new_context", "draw_line", "draw_rect", "save_png"];

const MATH_SOURCE: &str = r#"
val PI = 3.141592653589793
val E = 2.718281828459045

fun _check(x) {
    if type(x) != "INTEGER" and type(x) != "FLOAT" {
        error("math: expected a number")
    }
}

fun clamp(x, lo, hi) {
    _check(x)
    if x < lo { return lo }
    if x > hi { return hi }
    x
}

fun hypot(a, b) {
    sqrt(a * a + b * b)
}
"#;

const CONFIG_SOURCE: &str = r#"
fun load(path) {
    if len(path) > 5 and path[len(path) - 5] == "." {
        return load_json(path)
    }
    load_toml(path)
}
"#;

const COLOR_SOURCE: &str = r#"
fun reset(s) { style(s, "reset") }
fun red(s) { style(s, "red") }
fun green(s) { style(s, "green") }
fun blue(s) { style(s, "blue") }
fun bold(s) { style(s, "bold") }
"#;

const TIME_SOURCE: &str = "";

/// Modules in index order after core.
const MODULES: &[(&str, &[&str], &str)] = &[
    ("http", HTTP_BUILTINS, ""),
    ("time", TIME_BUILTINS, TIME_SOURCE),
    ("search", SEARCH_BUILTINS, ""),
    ("db", DB_BUILTINS, ""),
    ("math", MATH_BUILTINS, MATH_SOURCE),
    ("config", CONFIG_BUILTINS, CONFIG_SOURCE),
    ("crypto", CRYPTO_BUILTINS, ""),
    ("net", NET_BUILTINS, ""),
    ("color", COLOR_BUILTINS, COLOR_SOURCE),
    ("csv", CSV_BUILTINS, ""),
    ("psutil", PSUTIL_BUILTINS, ""),
    ("wasm", WASM_BUILTINS, ""),
    ("ui", UI_BUILTINS, ""),
    ("gg", GG_BUILTINS, ""),
];

static REGISTRY: Lazy<HashMap<&'static str, StdModule>> = Lazy::new(|| {
    let mut registry = HashMap::new();
    registry.insert(
        CORE,
        StdModule {
            name: CORE,
            index: 0,
            builtins: CORE_BUILTINS,
            source: crate::bytecode::prelude::PRELUDE_SOURCE,
        },
    );
    for (i, &(name, builtins, source)) in MODULES.iter().enumerate() {
        registry.insert(
            name,
            StdModule {
                name,
                index: (i + 1) as u8,
                builtins,
                source,
            },
        );
    }
    registry
});

/// Looks up an importable module. `core` is not importable.
pub fn lookup(name: &str) -> Option<&'static StdModule> {
    if name == CORE {
        return None;
    }
    REGISTRY.get(name)
}

pub fn core() -> &'static StdModule {
    &REGISTRY[CORE]
}

/// Importable module names in index order.
pub fn module_names() -> impl Iterator<Item = &'static str> {
    MODULES.iter().map(|(name, _, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_stable() {
        assert_eq!(core().index, 0);
        assert_eq!(lookup("http").unwrap().index, 1);
        assert_eq!(lookup("math").unwrap().index, 5);
        assert_eq!(lookup("gg").unwrap().index, 14);
    }

    #[test]
    fn test_core_is_not_importable() {
        assert!(lookup("core").is_none());
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn test_builtin_index() {
        let math = lookup("math").unwrap();
        assert_eq!(math.builtin_index("sqrt"), Some(0));
        assert_eq!(math.builtin_index("PI"), None);
        assert_eq!(core().builtin_index("_get_"), Some(3));
    }

    #[test]
    fn test_module_names_in_order() {
        let names: Vec<&str> = module_names().collect();
        assert_eq!(names.first(), Some(&"http"));
        assert_eq!(names.len(), 14);
        assert!(names.iter().all(|n| lookup(n).is_some()));
    }

    #[test]
    fn test_module_sources_parse() {
        for name in module_names() {
            let module = lookup(name).unwrap();
            if let Err(e) = crate::frontend::parser::parse_source(module.source) {
                panic!("module {} failed to parse:\n{}", name, e);
            }
        }
    }
}
