//! imgdupe - Near-Duplicate Image Finder
//!
//! Entry point: wires the pipeline together in its fixed order. Enumeration
//! and the optional reference pipeline finish before clustering starts, and
//! both finish before the report is written.

use anyhow::Result;
use bytesize::ByteSize;
use clap::Parser;
use indicatif::ProgressBar;
use std::sync::Mutex;

use imgdupe::{
    cache::Cache,
    cli::Cli,
    cluster,
    config::Options,
    logging, output, scanner,
    suggest::Suggester,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet);

    let options = Options::from_cli(&cli)?;

    let cache = Mutex::new(match &options.cache_name {
        Some(path) => Cache::load(path.clone()),
        None => Cache::disabled(),
    });

    // reference pipeline; independent of the candidate walk but both must
    // be done before reporting
    let suggester = options.cluster_path.as_ref().map(|path| {
        log::info!("Building reference clusters from \"{}\"", path.display());
        Suggester::build(
            path,
            options.cluster_exclude.as_deref(),
            options.follow_symlinks,
            &cache,
        )
    });

    // candidate enumeration, one root at a time in command-line order
    let enumerator = scanner::Enumerator::new(
        options.follow_symlinks,
        options.minimum_file_size,
        options.maximum_file_size,
    );
    let mut records = Vec::new();
    for (index, root) in options.roots.iter().enumerate() {
        let first = records.len();
        let found = enumerator.scan_root(root, index, &mut records);
        log::info!("Now scanning \"{}\", found {found} files.", root.display());
        if options.deterministic {
            scanner::sort_tail_by_depth_and_path(&mut records, first);
        }
    }
    log::info!("Now have {} files in total.", records.len());
    scanner::mark_items(&mut records);

    if options.remove_identical_inodes {
        let removed = cluster::remove_identical_inodes(&mut records);
        log::info!("Excluded {removed} files due to nonunique device and inode.");
    }

    let total = cluster::total_size(&records);
    log::info!(
        "Total size is {total} bytes or {}.",
        ByteSize::b(total).to_string_as(true)
    );

    let removed = cluster::remove_non_images(&mut records);
    log::info!(
        "Excluded {removed} non-image files from list. {} files left.",
        records.len()
    );

    let progress = if cli.quiet {
        None
    } else {
        Some(ProgressBar::new(records.len() as u64))
    };
    scanner::compute_fingerprints(&mut records, &cache, progress.as_ref());
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    // hashing is done everywhere; the cache can be persisted now
    let cache = cache.into_inner().expect("cache lock poisoned");
    if let Err(e) = cache.save() {
        log::warn!("Could not save cache: {e}");
    }

    let removed = cluster::remove_invalid_images(&mut records);
    log::info!("Excluded {removed} invalid images.");

    let mut clusters = cluster::build_clusters(records);
    log::info!(
        "Built {} clusters holding {} files.",
        clusters.len(),
        cluster::cluster_file_count(&clusters)
    );

    cluster::sort_clusters(&mut clusters);

    log::info!(
        "Totally, {} can be reduced.",
        ByteSize::b(cluster::reclaimable_space(&clusters)).to_string_as(true)
    );

    let suggestions = suggester.as_ref().and_then(|s| s.suggest(&clusters));

    log::info!(
        "Now making results file \"{}\".",
        options.output_name.display()
    );
    if let Err(e) = output::write_report(&options.output_name, &clusters, suggestions.as_ref()) {
        log::error!("{e}");
    }

    Ok(())
}
