use anyhow::{Context, Result};
use clap::Parser;
use signalflow::document::{self, DiagramDoc};
use signalflow::sim;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and check signal-flow diagram files", long_about = None)]
struct Cli {
    /// Diagram file (.json, or the binary container for any other extension)
    #[arg(value_name = "DIAGRAM_FILE")]
    diagram_file: std::path::PathBuf,

    /// Compile-check the diagram for simulation and print the engine request
    #[arg(long)]
    check: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let doc = if cli.diagram_file.extension().is_some_and(|e| e == "json") {
        DiagramDoc::load_json(&cli.diagram_file)?
    } else {
        DiagramDoc::load_binary(&cli.diagram_file)?
    };

    // Stage the document so structural errors surface even without --check.
    document::stage(&doc)
        .with_context(|| format!("invalid diagram {}", cli.diagram_file.display()))?;

    if cli.check {
        let request = sim::compile(&doc)
            .with_context(|| format!("cannot compile {}", cli.diagram_file.display()))?;
        println!("{}", serde_json::to_string_pretty(&request)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&doc)?);
    }
    Ok(())
}
