//! ziptree CLI - Command-line tool for ZIP archives and GZIP files.
//!
//! This is the main entry point for the ziptree command-line application.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};

use ziptree::prelude::*;
use ziptree::zip::DosDateTime;

/// ziptree - ZIP archive and GZIP file tool
#[derive(Parser)]
#[command(name = "ziptree")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// DEFLATE compression level (0-9)
    #[arg(short, long, global = true, env = "ZIPTREE_LEVEL", default_value_t = 6)]
    level: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List contents of a ZIP archive
    List {
        /// Path to the ZIP file
        #[arg(short, long, env = "INPUT_ZIP")]
        archive: PathBuf,

        /// Filter pattern (glob-style)
        #[arg(short, long)]
        filter: Option<String>,

        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,
    },

    /// Extract files from a ZIP archive
    Extract {
        /// Path to the ZIP file
        #[arg(short, long, env = "INPUT_ZIP")]
        archive: PathBuf,

        /// Output directory
        #[arg(short, long, env = "OUTPUT_FOLDER")]
        output: PathBuf,

        /// Filter pattern (glob-style)
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Create a ZIP archive from files and directories
    Create {
        /// Output ZIP file
        #[arg(short, long)]
        output: PathBuf,

        /// Input files and directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Print one archived file to stdout
    Cat {
        /// Path to the ZIP file
        #[arg(short, long, env = "INPUT_ZIP")]
        archive: PathBuf,

        /// Path of the file inside the archive
        path: String,
    },

    /// Compress a file into a GZIP file
    Gzip {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (defaults to the input with a .gz suffix)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decompress a GZIP file into a directory
    Gunzip {
        /// Input GZIP file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, env = "OUTPUT_FOLDER")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let codec: SharedCodec = Arc::new(FlateCodec::new(cli.level));

    match cli.command {
        Commands::List {
            archive,
            filter,
            detailed,
        } => {
            cmd_list(&archive, filter.as_deref(), detailed)?;
        }
        Commands::Extract {
            archive,
            output,
            filter,
        } => {
            cmd_extract(&archive, &output, filter.as_deref(), codec)?;
        }
        Commands::Create { output, inputs } => {
            cmd_create(&output, &inputs, codec)?;
        }
        Commands::Cat { archive, path } => {
            cmd_cat(&archive, &path, codec)?;
        }
        Commands::Gzip { input, output } => {
            cmd_gzip(&input, output, codec.as_ref())?;
        }
        Commands::Gunzip { input, output } => {
            cmd_gunzip(&input, &output, codec.as_ref())?;
        }
    }

    Ok(())
}

fn cmd_list(path: &Path, filter: Option<&str>, detailed: bool) -> Result<()> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let index = ArchiveIndex::open(data).context("Failed to open ZIP archive")?;

    let mut count = 0;
    for entry in index.entries() {
        if let Some(pattern) = filter {
            if !glob_match(pattern, entry.name()) {
                continue;
            }
        }

        if detailed {
            let method = match entry.compression_method() {
                ziptree::zip::CompressionMethod::Stored => "stored".to_string(),
                ziptree::zip::CompressionMethod::Deflated => "deflated".to_string(),
                ziptree::zip::CompressionMethod::Unsupported(code) => format!("method {code}"),
            };
            println!(
                "{:>12} {:>12} {:<10} {:08x} {}",
                entry.compressed_size(),
                entry.uncompressed_size(),
                method,
                entry.crc32(),
                entry.name()
            );
        } else {
            println!("{}", entry.name());
        }
        count += 1;
    }

    println!("\nTotal: {} entries", count);

    Ok(())
}

fn cmd_extract(path: &Path, output: &Path, filter: Option<&str>, codec: SharedCodec) -> Result<()> {
    println!("Opening ZIP archive: {}", path.display());

    let start = Instant::now();
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let tree = ArchiveTree::open_with_codec(data, codec).context("Failed to open ZIP archive")?;

    let files: Vec<_> = tree
        .files()
        .into_iter()
        .filter(|(name, _)| filter.map_or(true, |pattern| glob_match(pattern, name)))
        .collect();
    let total: u64 = files.iter().map(|(_, file)| file.size()).sum();

    println!("Extracting {} files in {:?}...", files.len(), start.elapsed());

    let pb = byte_progress_bar(total)?;
    fs::create_dir_all(output)?;

    let start = Instant::now();
    let mut done = 0u64;
    for (name, file) in &files {
        let Some(relative) = safe_relative_path(name) else {
            warn!("Skipping unsafe path {name:?}");
            continue;
        };
        let output_path = output.join(relative);

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let size = file.size();
        let mut report = |fraction: f32, _: &mut bool| {
            pb.set_position(done + (fraction as f64 * size as f64) as u64);
        };
        let content = file
            .content_with_progress(Some(&mut report))
            .with_context(|| format!("Failed to inflate {name}"))?;
        fs::write(&output_path, &*content)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;

        done += size;
        pb.set_position(done);
        debug!("Extracted {name} ({size} bytes)");
    }

    pb.finish_with_message("Done");
    println!("Extraction completed in {:?}", start.elapsed());

    Ok(())
}

fn cmd_create(output: &Path, inputs: &[PathBuf], codec: SharedCodec) -> Result<()> {
    let files = zip_paths(inputs)?;
    if files.is_empty() {
        bail!("No files found in the provided input paths");
    }

    println!("Creating {} with {} files...", output.display(), files.len());

    let file = fs::File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let options = WriterOptions {
        modified: DosDateTime::from_system_time(SystemTime::now()).unwrap_or_default(),
        ..WriterOptions::default()
    };
    let mut writer = ArchiveWriter::with_codec(std::io::BufWriter::new(file), codec).with_options(options);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    for (path, name) in &files {
        let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        writer
            .add_file(name, &data)
            .with_context(|| format!("Failed to add {name}"))?;
        pb.inc(1);
    }

    let mut out = writer.finish().context("Failed to finish archive")?;
    out.flush()?;

    pb.finish_with_message("Done");
    println!("Archive written in {:?}", start.elapsed());

    Ok(())
}

fn cmd_cat(path: &Path, name: &str, codec: SharedCodec) -> Result<()> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let tree = ArchiveTree::open_with_codec(data, codec).context("Failed to open ZIP archive")?;

    let content = tree.file(name)?.content()?;
    std::io::stdout().lock().write_all(&content)?;

    Ok(())
}

fn cmd_gzip(input: &Path, output: Option<PathBuf>, codec: &dyn Codec) -> Result<()> {
    let output = output.unwrap_or_else(|| {
        let mut name = input.as_os_str().to_owned();
        name.push(".gz");
        PathBuf::from(name)
    });
    println!("Compressing: {} -> {}", input.display(), output.display());

    let data = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let name = input.file_name().and_then(|name| name.to_str());
    let file = GzipFile::new(name, data).context("Failed to build GZIP header")?;

    let pb = byte_progress_bar(file.contents().len() as u64)?;
    let total = file.contents().len() as f64;
    let mut report = |fraction: f32, _: &mut bool| pb.set_position((fraction as f64 * total) as u64);
    let bytes = file
        .encode_with(codec, Some(&mut report))
        .context("Failed to compress")?;
    pb.finish_with_message("Done");

    fs::write(&output, &bytes).with_context(|| format!("Failed to write {}", output.display()))?;
    info!("{} -> {} bytes", file.contents().len(), bytes.len());
    println!("Compression complete");

    Ok(())
}

fn cmd_gunzip(input: &Path, output: &Path, codec: &dyn Codec) -> Result<()> {
    println!("Decompressing: {}", input.display());

    let data = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;

    let pb = byte_progress_bar(data.len() as u64)?;
    let total = data.len() as f64;
    let mut report = |fraction: f32, _: &mut bool| pb.set_position((fraction as f64 * total) as u64);
    let file = GzipFile::decode_with(&data, codec, Some(&mut report)).context("Failed to decompress")?;
    pb.finish_with_message("Done");

    // Stored name first, then the input name without its .gz suffix
    let name = file
        .name()
        .as_deref()
        .and_then(|name| Path::new(name).file_name().map(PathBuf::from))
        .or_else(|| input.file_stem().map(PathBuf::from))
        .context("Cannot derive an output file name")?;

    fs::create_dir_all(output)?;
    let output_path = output.join(name);
    fs::write(&output_path, file.contents())
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    println!("Output written to {}", output_path.display());

    Ok(())
}

/// Collect the files under `inputs` with archive names relative to their
/// longest common parent directory.
fn zip_paths(inputs: &[PathBuf]) -> Result<Vec<(PathBuf, String)>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in walkdir::WalkDir::new(input).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            warn!("Skipping {}: not a file or directory", input.display());
        }
    }

    let parents: Vec<&Path> = files.iter().filter_map(|path| path.parent()).collect();
    let base = common_parent(&parents);
    debug!("Archive names are relative to {}", base.display());

    files
        .into_iter()
        .map(|path| {
            let relative = path.strip_prefix(&base).unwrap_or(&path);
            let name = relative
                .components()
                .filter_map(|part| match part {
                    Component::Normal(part) => part.to_str(),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/");
            if name.is_empty() {
                bail!("Cannot name {} inside the archive", path.display());
            }
            Ok((path, name))
        })
        .collect()
}

/// Longest directory that is an ancestor of (or equal to) every path.
fn common_parent(paths: &[&Path]) -> PathBuf {
    let Some((first, rest)) = paths.split_first() else {
        return PathBuf::new();
    };

    let mut common: Vec<Component<'_>> = first.components().collect();
    for path in rest {
        let shared = common
            .iter()
            .zip(path.components())
            .take_while(|(a, b)| **a == *b)
            .count();
        common.truncate(shared);
    }
    common.iter().collect()
}

/// Map an archive name to a relative path that cannot leave the output directory.
fn safe_relative_path(name: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();
    for part in name.split('/') {
        match part {
            "" | "." => continue,
            ".." => return None,
            part if part.contains(['\\', ':']) => return None,
            part => path.push(part),
        }
    }
    (!path.as_os_str().is_empty()).then_some(path)
}

fn byte_progress_bar(total: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Simple glob matching for filtering.
fn glob_match(pattern: &str, name: &str) -> bool {
    let pattern_lower = pattern.to_lowercase();
    let name_lower = name.to_lowercase();

    if pattern_lower.contains('*') {
        let parts: Vec<&str> = pattern_lower.split('*').collect();
        let mut pos = 0;

        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() {
                continue;
            }

            if let Some(found) = name_lower[pos..].find(part) {
                if i == 0 && found != 0 {
                    // First part must match at start if no leading *
                    return false;
                }
                pos += found + part.len();
            } else {
                return false;
            }
        }

        parts.last().map_or(true, |p| p.is_empty()) || pos == name_lower.len()
    } else {
        name_lower.contains(&pattern_lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_parent() {
        let a = Path::new("/data/photos/2024/a.jpg");
        let b = Path::new("/data/photos/2023/b.jpg");
        let c = Path::new("/data/photos/c.jpg");

        assert_eq!(
            common_parent(&[a.parent().unwrap(), b.parent().unwrap(), c.parent().unwrap()]),
            PathBuf::from("/data/photos")
        );
        assert_eq!(common_parent(&[a.parent().unwrap()]), PathBuf::from("/data/photos/2024"));
        assert_eq!(common_parent(&[]), PathBuf::new());
    }

    #[test]
    fn test_safe_relative_path() {
        assert_eq!(safe_relative_path("a/b.txt"), Some(PathBuf::from("a").join("b.txt")));
        assert_eq!(safe_relative_path("./a//b"), Some(PathBuf::from("a").join("b")));
        assert_eq!(safe_relative_path("../evil"), None);
        assert_eq!(safe_relative_path("a/../../evil"), None);
        assert_eq!(safe_relative_path("C:\\evil"), None);
        assert_eq!(safe_relative_path("/"), None);
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*.txt", "docs/readme.TXT"));
        assert!(glob_match("docs/*", "docs/readme.txt"));
        assert!(!glob_match("*.bin", "docs/readme.txt"));
        assert!(glob_match("read", "docs/readme.txt"));
    }
}
