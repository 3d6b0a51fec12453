//! Command line front end: describe a class, check documents against it, or
//! export documents through it.
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::class::ClassId;
use crate::codec;
use crate::describe;
use crate::error::LazyError;
use crate::manifest::Manifest;
use crate::object::{ClassAnalysis, LazyObject};
use crate::schema::Schema;
use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// bind JSON documents to classes declared in a schema manifest
#[derive(Parser, Debug)]
#[command(name = "json-lazybind", version)]
pub struct CommandLineInterface {
    /// raise log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// print the compiled field table of a class
    Describe(DescribeOut),
    /// analyze documents against a class and report problems
    Check(CheckRun),
    /// convert documents through a class and print the exported JSON
    Export(ExportOut),
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// schema manifest (.json)
    #[arg(long)]
    schema: PathBuf,

    /// class to bind documents to, e.g. App.User
    #[arg(long)]
    class: String,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
enum DescribeFormat {
    #[default]
    Json,
    Text,
}

#[derive(clap::Parser, Debug)]
struct DescribeOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    #[arg(long, value_enum, default_value_t)]
    format: DescribeFormat,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct CheckRun {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    /// also fail on fields the class does not declare
    #[arg(long)]
    strict: bool,
}

#[derive(clap::Parser, Debug)]
struct ExportOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    /// validate each whole document before exporting it
    #[arg(long)]
    strict: bool,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

/// One decoded input document and where it came from.
#[derive(Debug)]
struct Document {
    source: String,
    value: serde_json::Value,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaSettings {
    fn load(&self, strict: bool) -> Result<(Arc<Schema>, ClassId)> {
        let registry = Manifest::load(&self.schema)?.into_registry()?;
        let class = ClassId::new(&self.class);
        let schema = Schema::builder(registry)
            .require_full_validation(strict)
            .build();
        schema
            .compile(&class)
            .with_context(|| format!("failed to compile class {class}"))?;
        debug!(%class, schema = %self.schema.display(), "schema loaded");
        Ok((schema, class))
    }
}

impl InputSettings {
    /// Reads and decodes every input in parallel, keeping input order.
    fn load_documents(&self) -> Result<Vec<Document>> {
        let source_paths = resolve_file_path_patterns(&self.input)
            .context("failed to resolve input file paths")?;
        let batches = source_paths
            .par_iter()
            .map(|path| self.load_file(path))
            .collect::<Result<Vec<_>>>()?;
        Ok(batches.into_iter().flatten().collect())
    }

    fn load_file(&self, path: &Path) -> Result<Vec<Document>> {
        let path_str = path.to_string_lossy().to_string();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read source file {path_str}"))?;

        let mut raw = Vec::new();
        if self.ndjson {
            for (line_no, line) in source.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let origin = format!("{path_str}:{}", line_no + 1);
                let value = codec::from_str_with_path::<serde_json::Value>(line)
                    .with_context(|| format!("failed to parse JSON ({origin})"))?;
                raw.push((origin, value));
            }
        } else {
            let value = codec::from_str_with_path::<serde_json::Value>(&source)
                .with_context(|| format!("failed to parse JSON source file ({path_str})"))?;
            raw.push((path_str, value));
        }

        let mut out = Vec::new();
        for (source, value) in raw {
            let value = match self.json_pointer.as_deref() {
                None => value,
                Some(pointer) => value
                    .pointer(pointer)
                    .cloned()
                    .ok_or_else(|| anyhow!("JSON pointer {pointer} matched nothing in {source}"))?,
            };
            match self.jq_expr.as_deref() {
                None => out.push(Document { source, value }),
                Some(jq_expr) => {
                    let results = crate::jq_exec::run_filter(jq_expr, &value).with_context(|| {
                        format!("failed to apply jq expression to {source}")
                    })?;
                    let many = results.len() > 1;
                    for (i, value) in results.into_iter().enumerate() {
                        let source = if many { format!("{source}#{i}") } else { source.clone() };
                        out.push(Document { source, value });
                    }
                }
            }
        }
        Ok(out)
    }
}

fn bind(schema: &Arc<Schema>, class: &ClassId, value: serde_json::Value) -> Result<LazyObject, LazyError> {
    match Value::from(value) {
        Value::Map(data) => schema.instantiate(class, data),
        other => Err(LazyError::Decode {
            path: ".".to_string(),
            message: format!("expected a JSON object, found {}", other.kind_name()),
        }),
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> u8 {
        self.verbose
    }

    pub fn run(&self) -> Result<ExitCode> {
        match &self.cmd {
            Command::Describe(target) => {
                let (schema, class) = target.schema_settings.load(false)?;
                let text = match target.format {
                    DescribeFormat::Json => {
                        serde_json::to_string_pretty(&describe::json_schema(&schema, &class)?)?
                    }
                    DescribeFormat::Text => describe::text_table(&schema, &class)?,
                };
                write_output(target.out.as_deref(), &text)?;
                Ok(ExitCode::SUCCESS)
            }
            Command::Check(target) => {
                let (schema, class) = target.schema_settings.load(false)?;
                let documents = target.input_settings.load_documents()?;
                info!(count = documents.len(), "checking documents");

                let results: Vec<(String, Result<ClassAnalysis, LazyError>)> = documents
                    .into_par_iter()
                    .map(|doc| {
                        let report = bind(&schema, &class, doc.value).map(|mut o| o.analyze(true));
                        (doc.source, report)
                    })
                    .collect();

                let mut failed = 0usize;
                for (source, result) in &results {
                    match result {
                        Ok(report) => {
                            let fails = report.has_bad_definitions()
                                || (target.strict && report.has_problems());
                            if fails {
                                failed += 1;
                                println!("{} {source}", "✗".red().bold());
                            } else {
                                println!("{} {source}", "✓".green().bold());
                            }
                            if report.has_problems() {
                                println!("{}", indent(&report.summary()).yellow());
                            }
                        }
                        Err(error) => {
                            failed += 1;
                            println!("{} {source}", "✗".red().bold());
                            println!("{}", indent(&error.to_string()).red());
                        }
                    }
                }
                let tally = format!("{} of {} document(s) failed", failed, results.len());
                if failed > 0 {
                    eprintln!("{}", tally.red());
                    Ok(ExitCode::FAILURE)
                } else {
                    eprintln!("{}", tally.green());
                    Ok(ExitCode::SUCCESS)
                }
            }
            Command::Export(target) => {
                let (schema, class) = target.schema_settings.load(target.strict)?;
                let documents = target.input_settings.load_documents()?;

                let mut exported = documents
                    .into_par_iter()
                    .map(|doc| {
                        let object = bind(&schema, &class, doc.value)
                            .with_context(|| format!("failed to bind {}", doc.source))?;
                        codec::to_json(&object.export()?)
                            .with_context(|| format!("failed to export {}", doc.source))
                    })
                    .collect::<Result<Vec<_>>>()?;

                let json = match exported.len() {
                    0 => bail!("no input documents"),
                    1 => exported.remove(0),
                    _ => serde_json::Value::Array(exported),
                };
                write_output(target.out.as_deref(), &serde_json::to_string_pretty(&json)?)?;
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn indent(text: &str) -> String {
    text.lines().map(|line| format!("    {line}")).collect::<Vec<_>>().join("\n")
}

fn write_output(out: Option<&Path>, text: &str) -> Result<()> {
    let Some(out) = out else {
        println!("{text}");
        return Ok(());
    };
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(out, text).with_context(|| format!("failed to write {}", out.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_check() {
        let cli = CommandLineInterface::try_parse_from([
            "json-lazybind",
            "-vv",
            "check",
            "--schema",
            "schema.json",
            "--class",
            "App.User",
            "-i",
            "a.json",
            "b.json",
            "--strict",
        ])
        .unwrap();
        assert_eq!(cli.verbosity(), 2);
        match cli.cmd {
            Command::Check(run) => {
                assert!(run.strict);
                assert_eq!(run.input_settings.input, vec!["a.json", "b.json"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn literal_paths_pass_through() {
        let paths = resolve_file_path_patterns(["x.json"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("x.json")]);
        assert!(resolve_file_path_patterns(["/nonexistent-dir-*/none.json"]).is_err());
    }
}
