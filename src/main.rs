use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use anchormark::{MarkdownProcessor, Options};

#[derive(Parser)]
#[command(name = "anchormark")]
#[command(about = "Convert Markdown to HTML with GitHub-style heading anchors")]
struct Cli {
    /// Input Markdown file (reads stdin when omitted)
    input: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the heading tree as JSON instead of HTML
    #[arg(long)]
    headings: bool,

    /// Emit an HTML fragment without the document shell
    #[arg(long)]
    fragment: bool,

    /// TOML file with converter options
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    no_tables: bool,

    #[arg(long)]
    no_strikethrough: bool,

    #[arg(long)]
    no_autolinks: bool,
}

impl Cli {
    /// Options from the config file, with command-line flags applied on top.
    fn options(&self) -> Result<Options> {
        let mut options = match &self.config {
            Some(path) => Options::load(path)?,
            None => Options::default(),
        };
        if self.fragment {
            options.document_shell = false;
        }
        if self.no_tables {
            options.tables = false;
        }
        if self.no_strikethrough {
            options.strikethrough = false;
        }
        if self.no_autolinks {
            options.autolinks = false;
        }
        Ok(options)
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let options = cli.options()?;
    log::debug!("using {options:?}");

    let input = read_input(cli.input.as_deref())?;
    let processor = MarkdownProcessor::with_options(options);

    let output = if cli.headings {
        let tree = processor.header_tree_from_bytes(&input)?;
        let mut json =
            serde_json::to_string_pretty(&tree).context("failed to serialize heading tree")?;
        json.push('\n');
        json
    } else {
        processor.convert_bytes(&input)?
    };

    match &cli.output {
        Some(path) => fs::write(path, output)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => io::stdout()
            .write_all(output.as_bytes())
            .context("failed to write to stdout")?,
    }
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => fs::read(path).with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .context("failed to read stdin")?;
            Ok(buffer)
        }
    }
}
