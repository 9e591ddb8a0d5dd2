//! ROM Workbench CLI Application
//!
//! Command-line front end for the rom-workbench library. It adds:
//! - JSON definition document loading (defs)
//! - Table rendering to the terminal (render)
//! - A simulated ECU transport for bench downloads (sim)
//! - TOML transfer configuration (config)

use anyhow::{bail, Context, Result};
use clap::Parser;
use rom_workbench::{
    build_definition, Downloader, RomImage, TableCodec, TransferConfig, TransferOutcome,
};
use std::path::PathBuf;

mod config;
mod defs;
mod render;
mod sim;

/// ROM Workbench - inspect ECU definitions, decode tables, download ROMs
#[derive(Parser, Debug)]
#[command(name = "rom-workbench-cli")]
#[command(about = "Inspect ECU ROM definitions and download ROM images", long_about = None)]
#[command(version)]
struct Args {
    /// Path to a JSON definition document
    #[arg(short, long, value_name = "FILE")]
    definition: Option<PathBuf>,

    /// Path to a ROM image (tables decode from it; --download serves it
    /// through the simulated ECU)
    #[arg(short, long, value_name = "FILE")]
    rom: Option<PathBuf>,

    /// Decode and print the named table (can be repeated)
    #[arg(short, long, value_name = "NAME")]
    table: Vec<String>,

    /// List identity, scalings and tables from the definition
    #[arg(short, long)]
    list: bool,

    /// Download the image out of the simulated ECU backed by --rom
    #[arg(long)]
    download: bool,

    /// Path to transfer configuration (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output file for the downloaded image (default: timestamped name)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    log::info!("ROM Workbench CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using workbench library v{}", rom_workbench::VERSION);

    let set = match &args.definition {
        Some(path) => {
            let records = defs::load_definition(path)?;
            let set = build_definition(&records);
            let stats = set.stats();
            println!("📋 Definition loaded:");
            if let Some(xml_id) = &set.identity.xml_id {
                println!("  Id:       {}", xml_id);
            }
            println!("  Scalings: {}", stats.num_scalings);
            println!(
                "  Tables:   {} ({} axes, {} unresolved)",
                stats.num_tables, stats.num_axes, stats.num_unresolved
            );
            Some(set)
        }
        None => None,
    };

    let rom = match &args.rom {
        Some(path) => {
            let rom = RomImage::from_file(path)?;
            println!("✓ ROM image: {:?} ({} bytes)", path, rom.len());
            Some(rom)
        }
        None => None,
    };

    let mut did_something = false;

    if args.list {
        let set = set
            .as_ref()
            .context("--list needs a definition (--definition)")?;
        list_tables(set);
        did_something = true;
    }

    if !args.table.is_empty() {
        let set = set
            .as_ref()
            .context("--table needs a definition (--definition)")?;
        let rom = rom.as_ref().context("--table needs a ROM image (--rom)")?;
        decode_tables(set, rom, &args.table);
        did_something = true;
    }

    if args.download {
        let rom = rom
            .as_ref()
            .context("--download needs a backing image for the simulated ECU (--rom)")?;
        download(&args, rom)?;
        did_something = true;
    }

    if !did_something && set.is_none() {
        println!("ROM Workbench - No input specified");
        println!("\nQuick Start:");
        println!("  rom-workbench-cli --definition ecu.json --list");
        println!("  rom-workbench-cli --definition ecu.json --rom stock.bin --table \"Boost Map\"");
        println!("  rom-workbench-cli --rom stock.bin --download --config transfer.toml");
        println!("\nUse --help for more options");
    }

    Ok(())
}

/// Print the definition tree: identity, scalings, tables
fn list_tables(set: &rom_workbench::DefinitionSet) {
    let identity = &set.identity;
    println!("\nIdentity:");
    for (label, value) in [
        ("ECU Id", &identity.ecu_id),
        ("Internal Id", &identity.internal_id_string),
        ("Make", &identity.make),
        ("Model", &identity.model),
        ("Year", &identity.year),
        ("Market", &identity.market),
        ("Flash Method", &identity.flash_method),
    ] {
        if let Some(value) = value {
            println!("  {:<13} {}", label, value);
        }
    }
    if identity.internal_id_address != 0 {
        println!("  {:<13} 0x{:08X}", "Id Address", identity.internal_id_address);
    }

    println!("\nScalings:");
    for scaling in &set.scalings {
        println!("  {} [{}]", scaling.name, scaling.units);
    }

    println!("\nTables:");
    for table in &set.tables {
        let state = if table.scaling.is_some() { "" } else { "  (disabled)" };
        println!(
            "  {:<32} {} @ 0x{:X} [{}]{}",
            table.name, table.kind, table.address, table.category, state
        );
    }
}

/// Decode and print each requested table; a failing table is reported and
/// skipped, the rest still print.
fn decode_tables(set: &rom_workbench::DefinitionSet, rom: &RomImage, names: &[String]) {
    for name in names {
        let Some(table) = set.find_table(name) else {
            eprintln!("✗ No table named '{}'", name);
            continue;
        };
        match TableCodec::decode(set, table, rom) {
            Ok(grid) => {
                println!("\n── {} ({}) ──", table.name, table.kind);
                print!("{}", render::render_grid(&grid));
            }
            Err(e) => {
                log::error!("Cannot decode '{}': {}", name, e);
                eprintln!("✗ {} is not decodable: {}", name, e);
            }
        }
    }
}

/// Run a simulated download and save the image
fn download(args: &Args, rom: &RomImage) -> Result<()> {
    use std::io::Write;

    let app_config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => config::AppConfig {
            transfer: TransferConfig {
                start_address: 0,
                total_size: rom
                    .len()
                    .try_into()
                    .context("ROM image too large for a transfer")?,
                chunk_size: 0x100,
            },
            output: None,
        },
    };

    let output = args
        .output
        .clone()
        .or(app_config.output)
        .unwrap_or_else(default_output_name);

    let ecu = sim::SimulatedEcu::new(rom.as_bytes().to_vec());
    let mut downloader = Downloader::new();
    downloader.start(ecu, app_config.transfer)?;

    println!(
        "\n⬇  Downloading 0x{:X} bytes in 0x{:X}-byte chunks",
        app_config.transfer.total_size, app_config.transfer.chunk_size
    );

    let outcome = loop {
        if let Some(outcome) = downloader.try_finish() {
            break outcome;
        }
        let snap = downloader.snapshot();
        print!(
            "\r  {} {:>5.1}% ({}/{} bytes)",
            snap.phase,
            snap.progress * 100.0,
            snap.bytes_done,
            snap.total_size
        );
        std::io::stdout().flush()?;
        std::thread::sleep(std::time::Duration::from_millis(50));
    };
    println!();

    match outcome {
        TransferOutcome::Completed(image) => {
            std::fs::write(&output, image.as_bytes())
                .with_context(|| format!("Failed to write {:?}", output))?;
            println!("✓ Saved {} bytes to {:?}", image.len(), output);
            Ok(())
        }
        TransferOutcome::Cancelled { bytes_done, .. } => {
            println!("✗ Download cancelled after {} bytes", bytes_done);
            Ok(())
        }
        TransferOutcome::Failed(e) => bail!("download failed: {}", e),
    }
}

fn default_output_name() -> PathBuf {
    PathBuf::from(format!(
        "rom-{}.bin",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ))
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
