use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tcf::archive::{self, PackOptions};
use tcf::format::{DEFAULT_BUFFER_SIZE, DEFAULT_INSPECT_BYTES};

#[derive(Parser)]
#[command(name = "tcf", version, about = "Tbag Content File packer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a directory tree into a .tcf container
    Pack {
        source: PathBuf,
        /// Output file; ".tcf" is appended if missing
        output: PathBuf,
        /// Read buffer size in KiB (does not change the output)
        #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE / 1024)]
        buffer_kib: usize,
    },
    /// Extract every entry into a directory
    Unpack {
        input:      PathBuf,
        output_dir: PathBuf,
    },
    /// Hex dump one entry, raw and detransformed
    #[command(alias = "view")]
    Inspect {
        input: PathBuf,
        #[arg(default_value_t = 0)]
        index: usize,
        #[arg(default_value_t = DEFAULT_INSPECT_BYTES)]
        bytes: usize,
        /// Read the index even if the header checksum does not match
        #[arg(long)]
        skip_checksum: bool,
    },
    /// List container entries in packing order
    List {
        input: PathBuf,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Validate a container without extracting it
    Verify {
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    match Cli::parse().command {

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { source, output, buffer_kib } => {
            let opts = PackOptions { buffer_size: buffer_size_from_kib(buffer_kib) };
            let s = archive::pack_with_options(&source, &output, &opts)?;
            println!("Created {}", s.output.display());
            println!("Files: {}", s.file_count);
            println!("Original size: {}", s.original_size);
            println!("TCF size: {}", s.container_size);
        }

        // ── Unpack ───────────────────────────────────────────────────────────
        Commands::Unpack { input, output_dir } => {
            let n = archive::unpack(&input, &output_dir)?;
            println!("Extracted {n} files");
        }

        // ── Inspect ──────────────────────────────────────────────────────────
        Commands::Inspect { input, index, bytes, skip_checksum } => {
            let info = if skip_checksum {
                archive::inspect_unchecked(&input, index, bytes)?
            } else {
                archive::inspect(&input, index, bytes)?
            };
            println!("{}", info.path);
            println!("{}", info.raw_hex);
            println!("{}", info.detransformed_hex);
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input, json } => {
            let entries = archive::list(&input)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                println!("{:<40} {:>12} {:>12}", "Path", "Offset", "Size");
                for e in &entries {
                    println!("{:<40} {:>12} {:>12}", e.path, e.offset, e.size);
                }
            }
        }

        // ── Verify ───────────────────────────────────────────────────────────
        Commands::Verify { input } => {
            let r = archive::verify(&input)?;
            println!("ok: version {}, {} entries, {} B payload, {} B total",
                r.version, r.entry_count, r.payload_len, r.container_size);
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn buffer_size_from_kib(kib: usize) -> usize {
    kib.max(1).saturating_mul(1024)
}
