//! Command-line interface for the harvester.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{validate_organization, DEFAULT_CQL, DEFAULT_CSW_URL};
use crate::csw::CswClient;
use crate::error::Result;
use crate::harvester::{harvest, import_record};

/// Geocat Harvester - Import Swiss geodata metadata from the geocat.ch CSW.
#[derive(Parser)]
#[command(name = "geocat-harvester")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the record identifiers matching a CQL constraint.
    Search {
        /// CQL constraint (default: the opendata.swiss discovery filter)
        #[arg(short, long)]
        cql: Option<String>,

        /// CSW endpoint URL
        #[arg(short, long, default_value = DEFAULT_CSW_URL)]
        endpoint: String,
    },

    /// Fetch one record as raw XML.
    Fetch {
        /// Record identifier (gmd:fileIdentifier)
        id: String,

        /// CSW endpoint URL
        #[arg(short, long, default_value = DEFAULT_CSW_URL)]
        endpoint: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import one record from a local XML file and print it as JSON.
    Import {
        /// Path to a full `che` metadata record
        file: PathBuf,

        /// Organization slug the dataset belongs to
        #[arg(short = 'g', long)]
        organization: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Harvest every matching record into a JSON dataset list.
    Harvest {
        /// Organization slug the datasets belong to
        #[arg(short = 'g', long)]
        organization: String,

        /// CQL constraint (default: the opendata.swiss discovery filter)
        #[arg(short, long)]
        cql: Option<String>,

        /// CSW endpoint URL
        #[arg(short, long, default_value = DEFAULT_CSW_URL)]
        endpoint: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Search { cql, endpoint } => search_command(cql.as_deref(), &endpoint),
        Commands::Fetch {
            id,
            endpoint,
            output,
        } => fetch_command(&id, &endpoint, output.as_deref()),
        Commands::Import {
            file,
            organization,
            output,
        } => import_command(&file, &organization, output.as_deref()),
        Commands::Harvest {
            organization,
            cql,
            endpoint,
            output,
        } => harvest_command(&organization, cql.as_deref(), &endpoint, output.as_deref()),
    }
}

fn search_command(cql: Option<&str>, endpoint: &str) -> Result<()> {
    let cql = cql.unwrap_or(DEFAULT_CQL);
    let client = CswClient::new(endpoint)?;

    let mut count = 0u32;
    for id in client.search(cql) {
        println!("{}", id?);
        count += 1;
    }
    eprintln!(
        "{} {} records for {}",
        style("Found").bold(),
        style(count).green(),
        style(cql).cyan()
    );
    Ok(())
}

fn fetch_command(id: &str, endpoint: &str, output: Option<&Path>) -> Result<()> {
    let client = CswClient::new(endpoint)?;
    let xml = client.get_record_by_id(id)?;
    write_output(&xml, output)
}

fn import_command(file: &Path, organization: &str, output: Option<&Path>) -> Result<()> {
    let xml = fs::read_to_string(file)?;
    let dataset = import_record(&xml, organization)?;
    let json = serde_json::to_string_pretty(&dataset)?;
    write_output(&json, output)
}

fn harvest_command(
    organization: &str,
    cql: Option<&str>,
    endpoint: &str,
    output: Option<&Path>,
) -> Result<()> {
    // Validate before making any HTTP request
    validate_organization(organization)?;
    let cql = cql.unwrap_or(DEFAULT_CQL);
    let client = CswClient::new(endpoint)?;

    eprintln!(
        "{} {} from {}",
        style("Harvesting").bold(),
        style(cql).cyan(),
        style(endpoint).green()
    );

    // Total record count is only known once paging completes, so a spinner
    // with a running count stands in for a bar.
    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {pos} records  {msg}")
            .expect("valid template"),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let report = match harvest(&client, cql, organization, |id| {
        pb.set_message(id.to_string());
        pb.inc(1);
    }) {
        Ok(report) => report,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };
    pb.finish_and_clear();

    eprintln!(
        "{} {} datasets, {} skipped",
        style("Imported").green().bold(),
        report.datasets.len(),
        if report.skipped.is_empty() {
            style(report.skipped.len()).dim()
        } else {
            style(report.skipped.len()).yellow().bold()
        }
    );
    for (id, reason) in &report.skipped {
        eprintln!("  {} {id}: {reason}", style("skipped").yellow());
    }

    let json = serde_json::to_string_pretty(&report.datasets)?;
    write_output(&json, output)
}

fn write_output(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, content)?;
            eprintln!(
                "{} {}",
                style("Saved to:").green().bold(),
                path.display()
            );
        }
        None => println!("{content}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_search_defaults() {
        let cli = Cli::parse_from(["geocat-harvester", "search"]);

        let Commands::Search { cql, endpoint } = cli.command else {
            panic!("expected search command");
        };
        assert!(cql.is_none());
        assert_eq!(endpoint, DEFAULT_CSW_URL);
    }

    #[test]
    fn test_cli_parse_import() {
        let cli = Cli::parse_from([
            "geocat-harvester",
            "import",
            "record.xml",
            "--organization",
            "swisstopo",
        ]);

        let Commands::Import {
            file,
            organization,
            output,
        } = cli.command
        else {
            panic!("expected import command");
        };
        assert_eq!(file, PathBuf::from("record.xml"));
        assert_eq!(organization, "swisstopo");
        assert!(output.is_none());
    }

    #[test]
    fn test_cli_parse_harvest_with_cql() {
        let cli = Cli::parse_from([
            "geocat-harvester",
            "harvest",
            "-g",
            "bafu",
            "--cql",
            "keyword = 'test'",
        ]);

        let Commands::Harvest {
            organization, cql, ..
        } = cli.command
        else {
            panic!("expected harvest command");
        };
        assert_eq!(organization, "bafu");
        assert_eq!(cql, Some("keyword = 'test'".to_string()));
    }
}
