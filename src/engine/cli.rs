//! CLI command handler: build the tree, hash it, write the report.

use anyhow::{Context, Result};
use crossbeam_channel::bounded;
use log::{debug, info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;

use crate::Opts;
use crate::engine::arg_parser::Cli;
use crate::engine::progress::ProgressReporter;
use crate::events::EventListener;
use crate::index::{build_tree, run_checksums};
use crate::utils::{apply_file_to_opts, load_treesum_toml, setup_logging};

/// Defaults, then `.treesum.toml` from the target directory, then CLI flags.
/// Logging is installed once the final `verbose` is known; config problems found before that
/// are logged right after.
fn setup_opts(cli: &Cli) -> Opts {
    let mut opts = Opts::default();
    let config_dir = if cli.dir.is_dir() {
        cli.dir.as_path()
    } else {
        cli.dir.parent().unwrap_or(cli.dir.as_path())
    };
    let mut problems = Vec::new();
    let loaded = match load_treesum_toml(config_dir) {
        Ok(file) => file,
        Err(e) => {
            problems.push(format!("ignoring config file: {:#}", e));
            None
        }
    };
    if let Some(ref file) = loaded {
        problems.extend(apply_file_to_opts(file, &mut opts));
    }
    if let Some(a) = cli.algorithm {
        opts.algorithm = a;
    }
    if let Some(ref out) = cli.output {
        opts.output = Some(out.clone());
    }
    if let Some(p) = cli.progress {
        opts.progress = p;
    }
    if let Some(v) = cli.verbose {
        opts.verbose = v;
    }
    if let Some(n) = cli.chunk_size.filter(|n| *n > 0) {
        opts.chunk_size = n;
    }
    setup_logging(opts.verbose);
    for problem in &problems {
        warn!("{}", problem);
    }
    if loaded.is_some() {
        debug!("loaded settings from {}", config_dir.display());
    }
    opts
}

fn open_sink(opts: &Opts) -> Result<Box<dyn Write + Send>> {
    match opts.output {
        Some(ref path) => {
            let file = File::create(path)
                .with_context(|| format!("create report file {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(std::io::stdout())),
    }
}

/// Hash `cli.dir`. Ctrl+C stops after the file in flight and reports how far the run got.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = setup_opts(cli);
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );

    let tree = build_tree(&cli.dir)?;
    let sink = open_sink(&opts)?;

    let (cancel_tx, cancel_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = cancel_tx.try_send(());
    })
    .context("set Ctrl+C handler")?;

    let listener: Option<Arc<dyn EventListener>> = opts
        .progress
        .then(|| Arc::new(ProgressReporter::new(tree.size())) as Arc<dyn EventListener>);

    let summary = run_checksums(&tree, &opts, sink, Some(&cancel_rx), listener)?;
    if summary.failed > 0 {
        warn!(
            "{} of {} file(s) could not be hashed",
            summary.failed, summary.dispatched
        );
    }
    info!(
        "{} file(s), {} bytes hashed with {}",
        summary.completed.saturating_sub(summary.failed),
        summary.total_bytes,
        opts.algorithm
    );
    if summary.cancelled {
        return Err(anyhow::anyhow!(
            "Hashing cancelled by user; report holds {} of {} file(s)",
            summary.completed.saturating_sub(summary.failed),
            summary.dispatched
        ));
    }
    Ok(())
}
