use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use nightfall_core::io::source::{FileSource, ImageSource};

#[derive(Args)]
pub struct ScanArgs {
    /// Folder holding the night's FITS files
    pub dir: PathBuf,

    /// List every file under its type
    #[arg(short, long)]
    pub list: bool,
}

pub fn run(args: &ScanArgs) -> Result<()> {
    let source = FileSource::scan(&args.dir)
        .with_context(|| format!("Failed to scan {}", args.dir.display()))?;

    println!("Folder:      {}", args.dir.display());
    println!("Images:      {}", source.len());
    for (kind, count) in source.summary() {
        println!("  {:<11}{}", kind, count);
        if args.list {
            for path in source.get(&kind) {
                println!("    {}", path.display());
            }
        }
    }
    match source.stack_image() {
        Some(path) => println!("Stack:       {}", path.display()),
        None => println!("Stack:       none"),
    }

    Ok(())
}
