//! Sandboxed execution of deobfuscator scripts
//!
//! Player scripts hide their stream token behind JavaScript obfuscation,
//! so recovering it means running a deobfuscator program. Each run gets a
//! fresh `boa_engine` context whose only host-provided globals are the
//! obfuscated `source` string and a no-op `console`. The engine has no file,
//! network or process access, and loops are capped so a hostile script
//! cannot spin forever.

use std::sync::Arc;

use boa_engine::object::ObjectInitializer;
use boa_engine::property::Attribute;
use boa_engine::{Context, JsError, JsResult, JsString, JsValue, NativeFunction, Source, js_string};

use crate::error::{AnistreamError, Result};

/// Deobfuscator shipped with the crate
///
/// Handles hex and unicode escapes, string-array indexing and concatenated
/// string literals. Rotated string arrays and decoder-function indirection
/// are left as they are, so a player script using them yields no token.
/// Supply a full deobfuscator program through `ANISTREAM_DEOBFUSCATOR`,
/// [`crate::config::load_deobfuscator`] or [`ScriptSandbox::new`]. Such a
/// program defines `deobfuscate()`, which reads the global `source` and
/// assigns the cleaned script to `result`.
pub const DEFAULT_PROGRAM: &str = include_str!("../assets/deobfuscate.js");

/// Function the program must define
pub const DEFAULT_ENTRY_POINT: &str = "deobfuscate";

/// Global the program must assign its output to
pub const RESULT_VARIABLE: &str = "result";

const DEFAULT_LOOP_LIMIT: u64 = 5_000_000;

/// Isolated script runner with a fixed program and entry point
#[derive(Clone)]
pub struct ScriptSandbox {
    program: Arc<str>,
    entry_point: Arc<str>,
    loop_limit: u64,
}

impl Default for ScriptSandbox {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl ScriptSandbox {
    /// Sandbox running `program`, entered through `deobfuscate()`
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: Arc::from(program.into()),
            entry_point: Arc::from(DEFAULT_ENTRY_POINT),
            loop_limit: DEFAULT_LOOP_LIMIT,
        }
    }

    /// Use a different entry-point function name
    pub fn with_entry_point(mut self, entry_point: &str) -> Self {
        self.entry_point = Arc::from(entry_point);
        self
    }

    /// Cap on loop iterations per run
    pub fn with_loop_limit(mut self, loop_limit: u64) -> Self {
        self.loop_limit = loop_limit;
        self
    }

    /// Runs the program against `source` and returns its `result` string
    ///
    /// Executes on a blocking thread; the engine is synchronous.
    ///
    /// # Errors
    /// Returns `Deobfuscation` if the program fails to load or run, or
    /// leaves `result` unset or empty
    pub async fn run(&self, source: String) -> Result<String> {
        let program = Arc::clone(&self.program);
        let entry_point = Arc::clone(&self.entry_point);
        let loop_limit = self.loop_limit;

        tokio::task::spawn_blocking(move || evaluate(&program, &entry_point, &source, loop_limit))
            .await
            .map_err(|e| AnistreamError::Deobfuscation(format!("sandbox task failed: {}", e)))?
    }
}

fn noop(_this: &JsValue, _args: &[JsValue], _context: &mut Context) -> JsResult<JsValue> {
    Ok(JsValue::undefined())
}

fn evaluate(program: &str, entry_point: &str, source: &str, loop_limit: u64) -> Result<String> {
    let fail = |stage: &str, e: JsError| AnistreamError::Deobfuscation(format!("{}: {}", stage, e));

    let mut context = Context::default();
    context.runtime_limits_mut().set_loop_iteration_limit(loop_limit);

    let console = ObjectInitializer::new(&mut context)
        .function(NativeFunction::from_fn_ptr(noop), js_string!("log"), 0)
        .function(NativeFunction::from_fn_ptr(noop), js_string!("warn"), 0)
        .function(NativeFunction::from_fn_ptr(noop), js_string!("error"), 0)
        .build();
    context
        .register_global_property(js_string!("console"), console, Attribute::READONLY)
        .map_err(|e| fail("install console", e))?;
    context
        .register_global_property(js_string!("source"), JsString::from(source), Attribute::READONLY)
        .map_err(|e| fail("install source", e))?;

    context
        .eval(Source::from_bytes(program))
        .map_err(|e| fail("load program", e))?;

    let global = context.global_object();
    let entry = global
        .get(JsString::from(entry_point), &mut context)
        .map_err(|e| fail("look up entry point", e))?;
    let entry = entry.as_callable().ok_or_else(|| {
        AnistreamError::Deobfuscation(format!("entry point '{}' is not a function", entry_point))
    })?;
    entry
        .call(&JsValue::undefined(), &[], &mut context)
        .map_err(|e| fail("run entry point", e))?;

    let result = global
        .get(JsString::from(RESULT_VARIABLE), &mut context)
        .map_err(|e| fail("read result", e))?;
    if result.is_undefined() || result.is_null() {
        return Err(AnistreamError::Deobfuscation(format!(
            "program left '{}' unset",
            RESULT_VARIABLE
        )));
    }

    let output = result
        .to_string(&mut context)
        .map_err(|e| fail("stringify result", e))?
        .to_std_string_escaped();
    if output.trim().is_empty() {
        return Err(AnistreamError::Deobfuscation("program produced empty output".to_string()));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_program_recovers_split_token() {
        let obfuscated = r#"
            var _0x3f2a = ['eyJhbGciOiJIUzI1', 'eyJzdWIiOjF9', 'c2lnbmF0dXJl'];
            var token = _0x3f2a[0] + '.' + _0x3f2a[1] + "\x2e" + _0x3f2a[2];
            player.load(base + token);
        "#;

        let output = ScriptSandbox::default().run(obfuscated.to_string()).await.unwrap();
        assert!(output.contains("'eyJhbGciOiJIUzI1.eyJzdWIiOjF9.c2lnbmF0dXJl'"));
    }

    #[tokio::test]
    async fn test_default_program_leaves_decoder_calls() {
        let obfuscated = r#"
            var _0x1b = ['c2lnbmF0dXJl', 'eyJhbGciOiJIUzI1'];
            function _0x4c(i) { return _0x1b[i - 0x10]; }
            var token = _0x4c(0x11) + '.' + _0x4c(0x10);
        "#;

        let output = ScriptSandbox::default().run(obfuscated.to_string()).await.unwrap();
        assert!(output.contains("_0x4c(0x11)"));
        assert!(!output.contains("eyJhbGciOiJIUzI1.c2lnbmF0dXJl"));
    }

    #[tokio::test]
    async fn test_custom_program_and_entry_point() {
        let sandbox = ScriptSandbox::new("function run() { result = source.toUpperCase(); }")
            .with_entry_point("run");

        assert_eq!(sandbox.run("abc".to_string()).await.unwrap(), "ABC");
    }

    #[tokio::test]
    async fn test_unset_result_is_an_error() {
        let sandbox = ScriptSandbox::new("function deobfuscate() { console.log(source); }");
        assert!(matches!(
            sandbox.run("x".to_string()).await,
            Err(AnistreamError::Deobfuscation(msg)) if msg.contains("unset")
        ));
    }

    #[tokio::test]
    async fn test_empty_result_is_an_error() {
        let sandbox = ScriptSandbox::new("function deobfuscate() { result = ''; }");
        assert!(matches!(
            sandbox.run("x".to_string()).await,
            Err(AnistreamError::Deobfuscation(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_entry_point_is_an_error() {
        let sandbox = ScriptSandbox::new("var nothing = 1;");
        assert!(matches!(
            sandbox.run("x".to_string()).await,
            Err(AnistreamError::Deobfuscation(msg)) if msg.contains("not a function")
        ));
    }

    #[tokio::test]
    async fn test_thrown_exception_is_an_error() {
        let sandbox = ScriptSandbox::new("function deobfuscate() { throw new Error('boom'); }");
        assert!(matches!(
            sandbox.run("x".to_string()).await,
            Err(AnistreamError::Deobfuscation(_))
        ));
    }

    #[tokio::test]
    async fn test_runaway_loop_is_stopped() {
        let sandbox = ScriptSandbox::new("function deobfuscate() { while (true) {} }")
            .with_loop_limit(10_000);
        assert!(matches!(
            sandbox.run("x".to_string()).await,
            Err(AnistreamError::Deobfuscation(_))
        ));
    }

    #[tokio::test]
    async fn test_host_globals_are_not_exposed() {
        let sandbox = ScriptSandbox::new(
            "function deobfuscate() { result = [typeof require, typeof process, typeof fetch].join(','); }",
        );
        assert_eq!(
            sandbox.run("x".to_string()).await.unwrap(),
            "undefined,undefined,undefined"
        );
    }
}
