//! paramsync command line tool.
//!
//! Provides the `paramsync` binary for working with operations defined on a
//! search path:
//! - `classes` lists the classes and versions found on the search path
//! - `describe` prints the definition of one class
//! - `run` instantiates a class in an op holder, applies `--set` plug
//!   assignments, computes ops and prints the result and parameter values
//!
//! Output is JSON on stdout. Logs go to stderr.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, Level};

use paramsync_core::Value;
use paramsync_holder::{
    ClassLoader, DescribedOperation, HandlerRegistry, HolderError, HolderState, LoadError,
    OpHolder, SearchPathClassLoader, LATEST_VERSION, OP_PATHS_ENV_VAR,
};

/// Inspect and run parameterised operations.
#[derive(Parser)]
#[command(name = "paramsync", about = "Inspect and run parameterised operations")]
struct Cli {
    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where operation definitions are looked up.
#[derive(Args)]
struct SearchPathArgs {
    /// Environment variable listing the operation directories.
    #[arg(long, default_value = OP_PATHS_ENV_VAR)]
    env_var: String,

    /// Operation directory, used instead of the environment variable.
    /// Repeatable; searched in order.
    #[arg(short, long = "path")]
    paths: Vec<PathBuf>,
}

impl SearchPathArgs {
    fn loader(&self) -> SearchPathClassLoader {
        let loader = SearchPathClassLoader::new();
        if self.paths.is_empty() {
            loader
        } else {
            loader.with_search_path(&self.env_var, self.paths.iter().cloned())
        }
    }
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// List classes and their versions.
    Classes {
        #[command(flatten)]
        search: SearchPathArgs,
    },

    /// Print the definition of a class.
    Describe {
        /// Class name.
        class: String,

        /// Class version (-1 for the latest).
        #[arg(long = "version", default_value_t = LATEST_VERSION, allow_negative_numbers = true)]
        class_version: i64,

        #[command(flatten)]
        search: SearchPathArgs,
    },

    /// Instantiate a class, apply plug values and compute it.
    Run {
        /// Class name. Optional when restoring from --state.
        #[arg(required_unless_present = "state")]
        class: Option<String>,

        /// Class version (-1 for the latest).
        #[arg(long = "version", default_value_t = LATEST_VERSION, allow_negative_numbers = true)]
        class_version: i64,

        /// Node name.
        #[arg(long, default_value = "op1")]
        name: String,

        /// Plug assignment `path=value`, relative to the root parameter.
        /// Repeatable.
        #[arg(short = 's', long = "set")]
        assignments: Vec<String>,

        /// Restore the holder from a saved state file first.
        #[arg(long)]
        state: Option<PathBuf>,

        /// Save the holder state to this file afterwards.
        #[arg(long)]
        save: Option<PathBuf>,

        #[command(flatten)]
        search: SearchPathArgs,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error("failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Holder(#[from] HolderError),
}

impl CliError {
    /// Exit code: 1 = load or sync error, 2 = invalid arguments, 3 = I/O
    /// error.
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => 2,
            CliError::Io { .. } => 3,
            CliError::Holder(HolderError::LoadFailure(LoadError::Io { .. })) => 3,
            CliError::Holder(_) => 1,
        }
    }
}

impl From<LoadError> for CliError {
    fn from(e: LoadError) -> Self {
        CliError::Holder(HolderError::LoadFailure(e))
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match execute(cli.command) {
        Ok(output) => {
            let json = serde_json::to_string_pretty(&output).unwrap_or_else(|e| {
                format!("{{\"error\": \"failed to serialize output: {}\"}}", e)
            });
            println!("{}", json);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn execute(command: Commands) -> Result<serde_json::Value, CliError> {
    match command {
        Commands::Classes { search } => run_classes(&search),
        Commands::Describe {
            class,
            class_version,
            search,
        } => run_describe(&class, class_version, &search),
        Commands::Run {
            class,
            class_version,
            name,
            assignments,
            state,
            save,
            search,
        } => run_op(RunOptions {
            class,
            class_version,
            name,
            assignments,
            state,
            save,
            search,
        }),
    }
}

fn run_classes(search: &SearchPathArgs) -> Result<serde_json::Value, CliError> {
    let loader = search.loader();
    let mut classes = Vec::new();
    for class in loader.classes(&search.env_var)? {
        let versions = loader.versions(&class, &search.env_var)?;
        classes.push(json!({ "class": class, "versions": versions }));
    }
    Ok(json!(classes))
}

fn run_describe(
    class: &str,
    class_version: i64,
    search: &SearchPathArgs,
) -> Result<serde_json::Value, CliError> {
    let (version, definition) = search
        .loader()
        .definition(class, class_version, &search.env_var)?;
    DescribedOperation::from_definition(class, version, &definition)?;
    Ok(json!({
        "class": class,
        "version": version,
        "definition": definition,
    }))
}

struct RunOptions {
    class: Option<String>,
    class_version: i64,
    name: String,
    assignments: Vec<String>,
    state: Option<PathBuf>,
    save: Option<PathBuf>,
    search: SearchPathArgs,
}

fn run_op(options: RunOptions) -> Result<serde_json::Value, CliError> {
    let assignments = options
        .assignments
        .iter()
        .map(|a| parse_assignment(a))
        .collect::<Result<Vec<_>, _>>()?;

    let loader: Arc<dyn ClassLoader> = Arc::new(options.search.loader());
    let mut holder = match &options.state {
        Some(path) => {
            let state = HolderState::from_json(&read_file(path)?)?;
            OpHolder::from_state(
                state,
                Some(loader),
                Arc::new(HandlerRegistry::with_builtins()),
            )?
        }
        None => OpHolder::new(&options.name)?.with_loader(loader),
    };
    if let Some(class) = &options.class {
        let keep_existing_values = options.state.is_some();
        holder.set_parameterised_by_name(
            class,
            options.class_version,
            &options.search.env_var,
            keep_existing_values,
        )?;
    }

    for (path, text) in &assignments {
        let value = parse_plug_value(&holder, path, text)?;
        debug!(path = %path, value = %value, "setting plug");
        holder.set_parameter_plug(path, value)?;
    }

    let result = if holder.get_op().is_some() {
        Some(holder.compute()?)
    } else {
        holder.set_parameterised_values()?;
        None
    };

    if let Some(path) = &options.save {
        let json = holder.state().to_json()?;
        fs::write(path, json).map_err(|source| CliError::Io {
            path: path.clone(),
            source,
        })?;
    }

    let mut parameters = serde_json::Map::new();
    if let Some(root) = holder.parameter_plug("") {
        for (path, value) in holder.plugs().leaf_values(root) {
            parameters.insert(path, serde_json::to_value(value).map_err(HolderError::from)?);
        }
    }

    Ok(json!({
        "node": holder.name(),
        "class": holder.class_identity()?,
        "result": result,
        "parameters": parameters,
    }))
}

/// Splits a `path=value` assignment. The value may be empty and may itself
/// contain `=`.
fn parse_assignment(assignment: &str) -> Result<(String, String), CliError> {
    match assignment.split_once('=') {
        Some((path, value)) if !path.trim().is_empty() => {
            Ok((path.trim().to_string(), value.to_string()))
        }
        _ => Err(CliError::Usage(format!(
            "invalid assignment '{}', expected path=value",
            assignment
        ))),
    }
}

/// Parses `text` as a value of the type of the parameter plug at `path`.
fn parse_plug_value(holder: &OpHolder, path: &str, text: &str) -> Result<Value, CliError> {
    let id = holder
        .parameter_plug(path)
        .ok_or_else(|| CliError::Usage(format!("unknown parameter '{}'", path)))?;
    let value_type = holder
        .plugs()
        .plug(id)
        .map_err(HolderError::from)?
        .value_type()
        .ok_or_else(|| CliError::Usage(format!("parameter '{}' is a compound", path)))?;
    Value::parse(value_type, text).ok_or_else(|| {
        CliError::Usage(format!(
            "cannot parse '{}' as {} for parameter '{}'",
            text, value_type, path
        ))
    })
}

fn read_file(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_class(dir: &Path, class_name: &str, version: i64, json: &str) {
        let class_dir = dir.join(class_name);
        fs::create_dir_all(&class_dir).unwrap();
        fs::write(class_dir.join(format!("{}-{}.json", class_name, version)), json).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write_class(
            dir.path(),
            "offset",
            1,
            r#"{
                "result": "amount",
                "parameters": [
                    { "name": "amount", "type": "int", "default": 2, "range": { "min": 0, "max": 100 } },
                    { "name": "tags", "type": "string-vector", "default": [] }
                ]
            }"#,
        );
        dir
    }

    fn parse(args: &[&str]) -> Commands {
        Cli::try_parse_from(args).unwrap().command
    }

    #[test]
    fn assignments_split_on_first_equals() {
        let (path, value) = parse_assignment("group.label=a=b").unwrap();
        assert_eq!(path, "group.label");
        assert_eq!(value, "a=b");

        let (_, empty) = parse_assignment("name=").unwrap();
        assert_eq!(empty, "");
    }

    #[test]
    fn malformed_assignments_are_usage_errors() {
        for bad in ["novalue", "=5", " =5"] {
            let err = parse_assignment(bad).unwrap_err();
            assert_eq!(err.exit_code(), 2);
        }
    }

    #[test]
    fn run_arguments_parse() {
        match parse(&[
            "paramsync", "run", "offset", "--version", "-1", "--set", "amount=5", "-s", "tags=a,b",
            "--path", "/ops",
        ]) {
            Commands::Run {
                class,
                class_version,
                assignments,
                search,
                ..
            } => {
                assert_eq!(class.as_deref(), Some("offset"));
                assert_eq!(class_version, LATEST_VERSION);
                assert_eq!(assignments, vec!["amount=5", "tags=a,b"]);
                assert_eq!(search.paths, vec![PathBuf::from("/ops")]);
                assert_eq!(search.env_var, OP_PATHS_ENV_VAR);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn run_requires_class_or_state() {
        assert!(Cli::try_parse_from(["paramsync", "run"]).is_err());
        assert!(Cli::try_parse_from(["paramsync", "run", "--state", "s.json"]).is_ok());
    }

    #[test]
    fn run_computes_with_assignments() {
        let dir = fixture();
        let path = dir.path().to_str().unwrap();
        let output = execute(parse(&[
            "paramsync", "run", "offset", "--path", path, "--set", "amount=500", "--set",
            "tags=x,y",
        ]))
        .unwrap();

        assert_eq!(output["result"], json!(100));
        assert_eq!(output["parameters"]["tags"], json!(["x", "y"]));
        assert_eq!(output["class"]["class_name"], json!("offset"));
    }

    #[test]
    fn saved_state_can_be_rerun() {
        let dir = fixture();
        let path = dir.path().to_str().unwrap();
        let state = dir.path().join("state.json");
        let state = state.to_str().unwrap();

        execute(parse(&[
            "paramsync", "run", "offset", "--path", path, "--set", "amount=7", "--save", state,
        ]))
        .unwrap();
        let output = execute(parse(&["paramsync", "run", "--path", path, "--state", state])).unwrap();
        assert_eq!(output["result"], json!(7));
    }

    #[test]
    fn errors_map_to_exit_codes() {
        let dir = fixture();
        let path = dir.path().to_str().unwrap();

        let unknown = execute(parse(&["paramsync", "run", "nope", "--path", path])).unwrap_err();
        assert_eq!(unknown.exit_code(), 1);

        let bad_value = execute(parse(&[
            "paramsync", "run", "offset", "--path", path, "--set", "amount=lots",
        ]))
        .unwrap_err();
        assert_eq!(bad_value.exit_code(), 2);

        let missing_state = execute(parse(&[
            "paramsync", "run", "--path", path, "--state", "/nonexistent/state.json",
        ]))
        .unwrap_err();
        assert_eq!(missing_state.exit_code(), 3);
    }

    #[test]
    fn classes_and_describe() {
        let dir = fixture();
        let path = dir.path().to_str().unwrap();

        let classes = execute(parse(&["paramsync", "classes", "--path", path])).unwrap();
        assert_eq!(classes, json!([{ "class": "offset", "versions": [1] }]));

        let described = execute(parse(&["paramsync", "describe", "offset", "--path", path])).unwrap();
        assert_eq!(described["version"], json!(1));
        assert_eq!(described["definition"]["result"], json!("amount"));
    }
}
