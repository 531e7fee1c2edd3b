use clap::Parser;
use kbsearch::{
    DataDir,
    IndexEngine,
    LocalFs,
    NameIndex,
    TreeIndexer,
    error,
    search,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("KBSEARCH_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    init_tracing(cli.verbose, cli.quiet);

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let index = NameIndex::open_in_tree(&data_dir.store()?)?;

    match cli.command {
        Command::Index(args) => cmd_index(&index, &args)?,
        Command::Search(args) => cmd_search(&index, &args)?,
        Command::Status(args) => cmd_status(&index, &data_dir, args.json)?,
        Command::Completions(_) => {}
    }

    Ok(())
}

fn cmd_index(index: &NameIndex, args: &cli::IndexArgs) -> error::Result<()> {
    let tree = match &args.root {
        Some(root) => LocalFs::with_root(&args.path, root.as_str())?,
        None => LocalFs::open(&args.path)?,
    };

    let stats = TreeIndexer::new(index).index_tree(tree)?;
    eprintln!(
        "Indexed {} entries ({} directories, {} skipped)",
        stats.documents, stats.directories, stats.skipped
    );
    Ok(())
}

fn cmd_search(index: &NameIndex, args: &cli::SearchArgs) -> error::Result<()> {
    let results = search::search_with_limit(index, &args.query, args.limit)?;

    if args.json {
        search::format_json(&results, &args.query)?;
    } else if args.files {
        search::format_files(&results);
    } else {
        search::format_human(&results);
    }
    Ok(())
}

#[derive(Serialize)]
struct Status<'a> {
    data_dir: &'a std::path::Path,
    index_dir: std::path::PathBuf,
    documents: u64,
}

fn cmd_status(
    index: &NameIndex,
    data_dir: &DataDir,
    json: bool,
) -> error::Result<()> {
    let status = Status {
        data_dir: data_dir.root(),
        index_dir: data_dir.index_dir(),
        documents: index.doc_count()?,
    };

    if json {
        println!("{}", serde_json::to_string(&status)?);
    } else {
        println!("Data directory: {}", status.data_dir.display());
        println!("Index: {}", status.index_dir.display());
        println!("Documents: {}", status.documents);
    }
    Ok(())
}
