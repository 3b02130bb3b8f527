use anyhow::{Context, Result};
use humansize::{DECIMAL, format_size};
use std::path::{Path, PathBuf};

use slicepeek_core::extract::resolve_extension;
use slicepeek_core::{
    Bounds, ExtractConfig, Extractor, RasterImage, SlicerFileType, ThumbnailError,
};

use crate::Args;

/// Reads the whole input file, reporting a missing file as
/// [`ThumbnailError::FileNotFound`].
pub fn load_input(path: &Path) -> Result<Vec<u8>> {
    match std::fs::read(path) {
        Ok(data) => Ok(data),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ThumbnailError::FileNotFound)
            .with_context(|| format!("Cannot read {}", path.display())),
        Err(e) => Err(e).with_context(|| format!("Cannot read {}", path.display())),
    }
}

pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "preview".to_string());
    input.with_file_name(format!("{}.thumbnail.png", stem))
}

enum InputKind {
    Slicer(SlicerFileType),
    RawQoi,
}

fn input_kind(path: &Path, override_type: Option<&str>) -> Result<InputKind> {
    let extension = match override_type {
        Some(ext) => ext.trim_start_matches('.').to_string(),
        None => path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };

    if extension.eq_ignore_ascii_case("qoi") {
        return Ok(InputKind::RawQoi);
    }

    let file_type = resolve_extension(&extension)
        .with_context(|| format!("Cannot tell the slicer format of {}", path.display()))?;
    Ok(InputKind::Slicer(file_type))
}

fn extractor_for(args: &Args) -> Extractor {
    let config = ExtractConfig::new()
        .with_max_size(args.max_size.map(Bounds::square))
        .with_checksum_verification(args.verify_checksums);
    Extractor::with_config(config)
}

pub fn extract_file(path: &Path, args: &Args) -> Result<RasterImage> {
    let kind = input_kind(path, args.file_type.as_deref())?;
    let data = load_input(path)?;

    match kind {
        InputKind::Slicer(file_type) => extractor_for(args)
            .extract(&data, file_type)
            .with_context(|| format!("No preview extracted from {}", path.display())),
        InputKind::RawQoi => slicepeek_core::qoi::decode(&data, args.max_size.map(Bounds::square))
            .context("Not a decodable QOI image"),
    }
}

pub fn run_extract(args: &Args) -> Result<()> {
    let image = extract_file(&args.input, args)?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));

    image
        .into_rgba()
        .save_with_format(&output, image::ImageFormat::Png)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    tracing::info!("Wrote {}", output.display());
    println!("{}", output.display());
    Ok(())
}

pub fn run_list(args: &Args) -> Result<()> {
    let InputKind::Slicer(file_type) = input_kind(&args.input, args.file_type.as_deref())? else {
        anyhow::bail!("--list needs a slicer file, not a bare QOI image");
    };
    let data = load_input(&args.input)?;
    let infos = extractor_for(args)
        .list(&data, file_type)
        .with_context(|| format!("Failed to scan {}", args.input.display()))?;

    if infos.is_empty() {
        println!("No embedded previews in {}", args.input.display());
        return Ok(());
    }

    println!("{:<28} {:>11} {:>6} {:>10}", "LOCATION", "SIZE", "FORMAT", "PAYLOAD");
    println!("{}", "-".repeat(58));
    for info in &infos {
        let format = info.format.map(|f| f.name()).unwrap_or("?");
        println!(
            "{:<28} {:>11} {:>6} {:>10}",
            info.location,
            format!("{}x{}", info.declared_width, info.declared_height),
            format,
            format_size(info.payload_len, DECIMAL)
        );
    }

    Ok(())
}
