use clap::{Args, Parser, Subcommand};
use liquid_analyzer::{
    CustomDefinitions, Schema, StaticDefinitionProvider, ValidationResult, Validator,
};
use liquid_lexer::Scanner;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "liquid")]
#[command(about = "Liquid template parser, printer and validator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a template and print its AST as JSON
    Parse {
        /// Input .liquid file
        path: String,

        /// Print the scanner segments instead of the AST
        #[arg(long)]
        segments: bool,
    },

    /// Parse a template and print it back as normalized Liquid
    Print {
        /// Input .liquid file
        path: String,
    },

    /// Run the syntax, semantic and security passes
    Validate {
        /// Input .liquid file
        path: String,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        options: ValidateArgs,
    },

    /// Exit non-zero when a template has parse or validation errors
    Check {
        /// Input .liquid files
        #[arg(required = true)]
        paths: Vec<String>,

        #[command(flatten)]
        options: ValidateArgs,
    },
}

#[derive(Args)]
struct ValidateArgs {
    /// Object schema JSON replacing the built-in Shopify schema
    #[arg(long, value_name = "FILE")]
    schema: Option<String>,

    /// Project definitions JSON: { "<project>": { "tags": [], "filters": [], "objects": [] } }
    #[arg(long, value_name = "FILE", requires = "project")]
    definitions: Option<String>,

    /// Project whose custom definitions apply
    #[arg(long, value_name = "ID")]
    project: Option<String>,

    /// Extra tag name to accept (repeatable)
    #[arg(long = "custom-tag", value_name = "NAME")]
    custom_tags: Vec<String>,

    /// Extra filter name to accept (repeatable)
    #[arg(long = "custom-filter", value_name = "NAME")]
    custom_filters: Vec<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Parse { path, segments } => cmd_parse(&path, segments),
        Command::Print { path } => cmd_print(&path),
        Command::Validate {
            path,
            json,
            options,
        } => cmd_validate(&path, json, &options).await,
        Command::Check { paths, options } => cmd_check(&paths, &options).await,
    }
}

fn read_source(path: &str) -> String {
    let p = Path::new(path);
    if !p.exists() {
        eprintln!("Error: file not found: {path}");
        std::process::exit(1);
    }
    match std::fs::read_to_string(p) {
        Ok(source) => {
            tracing::debug!(path, bytes = source.len(), "read file");
            source
        }
        Err(e) => {
            eprintln!("Error reading {path}: {e}");
            std::process::exit(1);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing output: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_parse(path: &str, segments: bool) {
    let source = read_source(path);

    if segments {
        print_json(&Scanner::scan(&source));
        return;
    }

    let result = liquid_parser::parse(&source);
    tracing::info!(path, nodes = result.ast.len(), errors = result.errors.len(), "parsed");
    print_json(&result);
    if !result.errors.is_empty() {
        std::process::exit(1);
    }
}

fn cmd_print(path: &str) {
    let source = read_source(path);
    let result = liquid_parser::parse(&source);

    for error in &result.errors {
        eprintln!("{path}: {error}");
    }
    print!("{}", liquid_parser::ast_to_string(&result.ast));
}

fn build_validator(options: &ValidateArgs) -> Validator {
    let mut validator = Validator::new().with_custom(CustomDefinitions {
        tags: options.custom_tags.clone(),
        filters: options.custom_filters.clone(),
        ..CustomDefinitions::default()
    });

    if let Some(schema_path) = &options.schema {
        match Schema::from_json(&read_source(schema_path)) {
            Ok(schema) => {
                tracing::debug!(path = %schema_path, "loaded schema");
                validator = validator.with_schema(schema);
            }
            Err(e) => {
                eprintln!("Error loading schema {schema_path}: {e}");
                std::process::exit(1);
            }
        }
    }

    if let Some(definitions_path) = &options.definitions {
        match StaticDefinitionProvider::from_json(&read_source(definitions_path)) {
            Ok(provider) => {
                tracing::debug!(path = %definitions_path, "loaded project definitions");
                validator = validator.with_provider(Arc::new(provider));
            }
            Err(e) => {
                eprintln!("Error loading definitions {definitions_path}: {e}");
                std::process::exit(1);
            }
        }
    }

    validator
}

fn report(path: &str, result: &ValidationResult) {
    for diagnostic in result.errors.iter().chain(&result.warnings) {
        println!("{path}: {diagnostic}");
        if let Some(suggestion) = &diagnostic.suggestion {
            println!("    {suggestion}");
        }
    }
}

async fn cmd_validate(path: &str, json: bool, options: &ValidateArgs) {
    let source = read_source(path);
    let validator = build_validator(options);
    let result = validator.validate(&source, options.project.as_deref()).await;
    tracing::info!(
        path,
        valid = result.valid,
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        "validated"
    );

    if json {
        print_json(&result);
    } else {
        report(path, &result);
    }

    if !result.valid {
        std::process::exit(1);
    }
}

async fn cmd_check(paths: &[String], options: &ValidateArgs) {
    let validator = build_validator(options);
    let mut failed = 0;

    for path in paths {
        let source = read_source(path);
        let parsed = liquid_parser::parse(&source);
        let result = validator.validate(&source, options.project.as_deref()).await;

        for error in &parsed.errors {
            eprintln!("{path}: {error}");
        }
        for error in &result.errors {
            eprintln!("{path}: {error}");
        }

        if parsed.errors.is_empty() && result.valid {
            eprintln!("OK: {path}");
        } else {
            failed += 1;
        }
    }

    tracing::info!(checked = paths.len(), failed, "check finished");
    if failed > 0 {
        eprintln!("{failed} of {} templates failed", paths.len());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    /// Log sink shared between the subscriber and the test.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0
                .lock()
                .map_err(|_| std::io::Error::other("log buffer poisoned"))?
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn capture_logs(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    fn temp_template(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(format!("liquid-cli-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn no_options() -> ValidateArgs {
        ValidateArgs {
            schema: None,
            definitions: None,
            project: None,
            custom_tags: Vec::new(),
            custom_filters: Vec::new(),
        }
    }

    #[test]
    fn test_read_source_logs_file() {
        let path = temp_template("read.liquid", "{{ x }}");
        let logs = capture_logs(|| assert_eq!(read_source(&path), "{{ x }}"));
        assert!(logs.contains("read file"), "{logs}");
        assert!(logs.contains("bytes=7"), "{logs}");
    }

    #[test]
    fn test_build_validator_logs_schema() {
        let schema = temp_template("schema.json", r#"{"widget": {"size": "number"}}"#);
        let options = ValidateArgs {
            schema: Some(schema),
            ..no_options()
        };
        let logs = capture_logs(|| {
            let result = build_validator(&options)
                .validate_with("{{ widget.size }}", &CustomDefinitions::default());
            assert!(result.warnings.is_empty(), "{result:?}");
        });
        assert!(logs.contains("loaded schema"), "{logs}");
    }

    #[test]
    fn test_build_validator_custom_names() {
        let options = ValidateArgs {
            custom_tags: vec!["my_tag".into()],
            custom_filters: vec!["my_filter".into()],
            ..no_options()
        };
        let result = build_validator(&options)
            .validate_with("{% my_tag %}{{ 'x' | my_filter }}", &CustomDefinitions::default());
        assert!(result.warnings.is_empty(), "{result:?}");
    }
}
