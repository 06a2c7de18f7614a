use clap::{Parser, Subcommand};
use roster_core::{
    seed, user_by_api_key, Access, CoreConfig, ListRequest, ListResponse, Store,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Patient roster CLI")]
struct Cli {
    /// SQLite database path (defaults to $ROSTER_DATABASE, then roster.db)
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,
    /// Populate a demo organisation and a permitted coordinator
    SeedDemo {
        /// API key assigned to the demo coordinator
        #[arg(long, default_value = "demo-key")]
        api_key: String,
    },
    /// Print a page of the main patient list as JSON
    List {
        #[arg(long)]
        api_key: String,
        /// Query parameter as key=value (repeatable), e.g. `name=smith`, `sort=-last_name`
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,
    },
    /// Print a page of the compact patient list as JSON
    Compact {
        #[arg(long)]
        api_key: String,
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,
    },
    /// Print organisation patient counts as JSON
    Stats {
        #[arg(long)]
        api_key: String,
    },
    /// Export the filtered main list to a file
    Export {
        #[arg(long)]
        api_key: String,
        /// csv, xlsx or json
        #[arg(long, default_value = "csv")]
        format: String,
        /// Output directory; the file is named after the export
        #[arg(long, default_value = ".")]
        out: PathBuf,
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let database = cli
        .database
        .or_else(|| std::env::var("ROSTER_DATABASE").ok());
    let cfg = CoreConfig::from_env_values(database, None)?;

    match cli.command {
        Some(Commands::Init) => {
            Store::create(cfg.database_path())?;
            println!("Initialised roster database at {}", cfg.database_path().display());
        }
        Some(Commands::SeedDemo { api_key }) => {
            let store = Store::create(cfg.database_path())?;
            let demo = store
                .with_conn(|conn| seed::seed_demo(conn, &api_key))
                .map_err(|e| format!("Error seeding demo data: {e}"))?;
            println!(
                "Seeded organisation {} with {} patients (api key: {})",
                demo.organization_id,
                demo.patient_ids.len(),
                demo.api_key
            );
        }
        Some(Commands::List { api_key, params }) => {
            let store = Store::open(cfg.database_path())?;
            let request = parse_request(&params, None)?;
            let outcome = store.with_conn(|conn| {
                let user = user_by_api_key(conn, &api_key)?;
                roster_core::patient_list(conn, user.as_ref(), &request)
            })?;
            match granted(outcome)? {
                ListResponse::Page(page) => println!("{}", serde_json::to_string_pretty(&page)?),
                ListResponse::Export(file) => {
                    return Err(format!("Use 'roster export' to write {}", file.filename).into());
                }
            }
        }
        Some(Commands::Compact { api_key, params }) => {
            let store = Store::open(cfg.database_path())?;
            let request = parse_request(&params, None)?;
            let outcome = store.with_conn(|conn| {
                let user = user_by_api_key(conn, &api_key)?;
                roster_core::compact_patient_list(conn, user.as_ref(), &request)
            })?;
            let page = granted(outcome)?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Some(Commands::Stats { api_key }) => {
            let store = Store::open(cfg.database_path())?;
            let outcome = store.with_conn(|conn| {
                let user = user_by_api_key(conn, &api_key)?;
                roster_core::patient_stats(conn, user.as_ref())
            })?;
            let res = granted(outcome)?;
            println!("{}", serde_json::to_string_pretty(&res)?);
        }
        Some(Commands::Export {
            api_key,
            format,
            out,
            params,
        }) => {
            let store = Store::open(cfg.database_path())?;
            let request = parse_request(&params, Some(&format))?;
            let outcome = store.with_conn(|conn| {
                let user = user_by_api_key(conn, &api_key)?;
                roster_core::patient_list(conn, user.as_ref(), &request)
            })?;
            let ListResponse::Export(file) = granted(outcome)? else {
                return Err(
                    format!("Unknown export format: {format} (expected csv, xlsx or json)").into(),
                );
            };
            let path = out.join(&file.filename);
            std::fs::write(&path, &file.bytes)?;
            println!("Wrote {} ({} bytes)", path.display(), file.bytes.len());
        }
        None => {
            println!("Use 'roster --help' for commands");
        }
    }

    Ok(())
}

/// Unwraps a granted outcome; a denial becomes an error so the process exits non-zero.
fn granted<T>(outcome: Access<T>) -> Result<T, Box<dyn std::error::Error>> {
    match outcome {
        Access::Granted(value) => Ok(value),
        Access::Denied => Err("Permission denied".into()),
    }
}

/// Builds a list request from `key=value` pairs, as if they were a query string.
fn parse_request(
    params: &[String],
    export: Option<&str>,
) -> Result<ListRequest, Box<dyn std::error::Error>> {
    let mut map = serde_json::Map::new();
    for param in params {
        let Some((key, value)) = param.split_once('=') else {
            return Err(format!("expected key=value, got '{param}'").into());
        };
        map.insert(key.trim().to_string(), serde_json::Value::String(value.to_string()));
    }
    if let Some(format) = export {
        map.insert("_export".into(), serde_json::Value::String(format.to_string()));
    }
    Ok(serde_json::from_value(serde_json::Value::Object(map))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_become_list_request() {
        let request = parse_request(
            &["name=smith".into(), "sort=-last_name".into(), "per_page=50".into()],
            Some("json"),
        )
        .unwrap();
        assert_eq!(request.filter.name.as_deref(), Some("smith"));
        assert_eq!(request.sort.as_deref(), Some("-last_name"));
        assert_eq!(request.per_page.as_deref(), Some("50"));
        assert_eq!(request.export.as_deref(), Some("json"));
    }

    #[test]
    fn denial_is_an_error() {
        let err = granted::<()>(Access::Denied).unwrap_err();
        assert_eq!(err.to_string(), "Permission denied");
        assert_eq!(granted(Access::Granted(7)).unwrap(), 7);
    }

    #[test]
    fn malformed_param_is_rejected() {
        assert!(parse_request(&["name".into()], None).is_err());
    }

    #[test]
    fn cli_parses_export_command() {
        let cli = Cli::try_parse_from([
            "roster", "--database", "x.db", "export", "--api-key", "k", "--format", "xlsx", "-p",
            "city=albany",
        ])
        .unwrap();
        assert_eq!(cli.database.as_deref(), Some("x.db"));
        assert!(matches!(
            cli.command,
            Some(Commands::Export { ref format, .. }) if format == "xlsx"
        ));
    }
}
