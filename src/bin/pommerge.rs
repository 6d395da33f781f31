use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use pommerge::{
    Args, Config, GitCli, MergeDriver, RevisionFiles,
    logging::{init_logging, parse_early_log_config},
};

fn main() -> Result<ExitCode> {
    // Logging comes up before clap so argument errors are logged as well
    let raw_args: Vec<String> = std::env::args().collect();
    let _log_guard = init_logging(parse_early_log_config(&raw_args));

    let args = Args::parse();

    // Handle --create-config flag
    if args.create_config {
        let path = Config::create_sample_config().context("Failed to create sample config")?;
        println!("Sample config available at: {}", path.display());
        if args.revision_files().is_none() {
            return Ok(ExitCode::SUCCESS);
        }
    }

    // Resolve configuration from CLI args, environment variables, and config file
    let settings = Config::load(&args)
        .and_then(Config::resolve)
        .context("Failed to resolve configuration")?;
    debug!(?settings, "Resolved settings");

    let files = args
        .revision_files()
        .context("BASE, MINE and THEIRS are required")?;

    let git = match &args.work_dir {
        Some(dir) => GitCli::in_dir(dir),
        None => GitCli::new(),
    };
    // git runs elsewhere, so relative paths must not depend on it
    let files = match &args.work_dir {
        Some(_) => absolute_files(&files)?,
        None => files,
    };

    let driver = MergeDriver::new(git.clone(), git, settings);
    let report = driver
        .run(&files, &args.version_tags)
        .with_context(|| format!("Failed to merge {}", files.mine.display()))?;

    let exit_code = report.exit_code();
    if report.has_conflicts() {
        info!(exit_code, "Merge finished with conflicts");
    }
    Ok(ExitCode::from(exit_code.clamp(0, 255) as u8))
}

fn absolute_files(files: &RevisionFiles) -> Result<RevisionFiles> {
    let absolute = |path: &Path| -> Result<PathBuf> {
        std::path::absolute(path)
            .with_context(|| format!("Failed to resolve path: {}", path.display()))
    };
    Ok(RevisionFiles::new(
        absolute(&files.base)?,
        absolute(&files.mine)?,
        absolute(&files.theirs)?,
    ))
}
