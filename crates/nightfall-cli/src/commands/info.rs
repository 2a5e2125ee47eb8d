use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use nightfall_core::io::fits::FitsFile;
use nightfall_core::io::loader::header_metadata;

#[derive(Args)]
pub struct InfoArgs {
    /// Input FITS file
    pub file: PathBuf,

    /// Print the header cards that were read
    #[arg(long)]
    pub header: bool,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let fits = FitsFile::open(&args.file)?;

    println!("File:        {}", args.file.display());
    match fits.dimensions() {
        Some((height, width)) => println!("Dimensions:  {}x{}", width, height),
        None => println!("Dimensions:  no image data"),
    }
    println!("Bitpix:      {}", fits.bitpix()?);
    println!("Cards:       {}", fits.header.len());

    for (key, value) in header_metadata(&fits.header) {
        println!("{:<13}{}", format!("{key}:"), value);
    }
    if let Some(wcs) = fits.header.wcs() {
        println!(
            "WCS:         crval=({:.6}, {:.6}) crpix=({:.1}, {:.1})",
            wcs.crval[0], wcs.crval[1], wcs.crpix[0], wcs.crpix[1]
        );
    }

    if args.header {
        println!();
        for (keyword, value) in fits.header.cards() {
            println!("{:<8}= {}", keyword, value);
        }
    }

    Ok(())
}
