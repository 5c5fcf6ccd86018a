use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use image2taxonomy::models::taxonomy::TaxonomyDocument;
use image2taxonomy::services::grammar;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "gen-grammar",
    about = "Compile a catalog taxonomy document into the GBNF grammar used for constrained generation"
)]
struct GenGrammarCli {
    /// Taxonomy JSON document (verticals → flat category lists).
    #[arg(long, env = "TAXONOMY_JSON", default_value = "docs/taxonomy.json")]
    taxonomy: PathBuf,

    /// Vertical whose categories make up the grammar.
    #[arg(long, env = "TAXONOMY_VERTICAL", default_value = "Apparel & Accessories")]
    vertical: String,

    /// Where to write the grammar artifact.
    #[arg(long, env = "GRAMMAR_PATH", default_value = "docs/taxonomy.gbnf")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = GenGrammarCli::parse();

    let json = fs::read_to_string(&cli.taxonomy)
        .with_context(|| format!("reading {}", cli.taxonomy.display()))?;
    let document = TaxonomyDocument::from_json(&json)
        .with_context(|| format!("parsing {}", cli.taxonomy.display()))?;
    let tree = document
        .build_tree(&cli.vertical)
        .with_context(|| format!("building tree for vertical '{}'", cli.vertical))?;

    let grammar = grammar::compile(&tree).context("compiling taxonomy grammar")?;

    if let Some(parent) = cli.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(&cli.output, grammar.to_gbnf())
        .with_context(|| format!("writing {}", cli.output.display()))?;

    tracing::info!(
        vertical = %cli.vertical,
        categories = tree.node_count(),
        rules = grammar.rules.len(),
        output = %cli.output.display(),
        "Taxonomy grammar written"
    );
    Ok(())
}
