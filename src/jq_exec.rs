//! jq pre-processing of input documents, backed by jaq.
use std::fmt;

use anyhow::{anyhow, Context, Result};
use jaq_core::{load, Compiler, Ctx, RcIter};
use jaq_json::Val;
use serde_json::Value;

/// Runs `filter_src` over `input` and returns every output as JSON.
pub fn run_filter(filter_src: &str, input: &Value) -> Result<Vec<Value>> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File { code: filter_src, path: () };

    let modules = loader
        .load(&arena, program)
        .map_err(|errs| jaq_error("jq parse error", errs))?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(|errs| jaq_error("jq undefined symbol", errs))?;

    let inputs = RcIter::new(core::iter::empty());
    let outputs = filter.run((Ctx::new([], &inputs), Val::from(input.clone())));

    let mut out = Vec::new();
    for item in outputs {
        let val = item.map_err(|e| anyhow!("jq runtime error: {e:?}"))?;
        // Val only exposes its JSON form through Display.
        let text = val.to_string();
        let json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("jq produced non-JSON output: {text}"))?;
        out.push(json);
    }
    Ok(out)
}

/// One line per failing file, tagged with the stage that rejected it.
fn jaq_error<E: fmt::Debug>(stage: &str, errs: Vec<(load::File<&str, ()>, E)>) -> anyhow::Error {
    let lines: Vec<String> = errs
        .into_iter()
        .map(|(file, err)| format!("{stage}: {err:?} in `{}`", file.code))
        .collect();
    anyhow!(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_yields_each_output() {
        let out = run_filter(".users[]", &json!({"users": [{"id": 1}, {"id": 2}]})).unwrap();
        assert_eq!(out, vec![json!({"id": 1}), json!({"id": 2})]);
    }

    #[test]
    fn errors_name_the_failing_stage() {
        let err = run_filter(".[", &json!(null)).unwrap_err().to_string();
        assert!(err.starts_with("jq parse error: "), "{err}");
        assert!(err.contains("in `.[`"), "{err}");

        let err = run_filter("no_such_fn(1)", &json!(null)).unwrap_err().to_string();
        assert!(err.starts_with("jq undefined symbol: "), "{err}");
    }
}
