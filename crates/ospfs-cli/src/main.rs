#![forbid(unsafe_code)]
//! `ospfs` — read-only inspector for osp filesystem images.
//!
//! Thin glue around `ospfs-core`: argument handling, output
//! formatting, and the exit-code mapping live here and nowhere else.

use anyhow::{bail, Context, Result};
use ospfs_core::OpenFs;
use ospfs_ondisk::{Inode, SuperBlock};
use serde::Serialize;
use std::env;
use std::io::Write;
use std::path::Path;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "info" => {
            let Some(image) = args.next() else {
                bail!("info requires an image path");
            };
            let json = args.any(|arg| arg == "--json");
            info(Path::new(&image), json)
        }
        "ls" => {
            let Some(image) = args.next() else {
                bail!("ls requires an image path");
            };
            let path = args.next().unwrap_or_else(|| "/".to_owned());
            ls(Path::new(&image), &path)
        }
        "cat" => {
            let Some(image) = args.next() else {
                bail!("cat requires an image path and a file path");
            };
            let Some(path) = args.next() else {
                bail!("cat requires a file path");
            };
            let raw = args.any(|arg| arg == "--raw");
            cat(Path::new(&image), &path, raw)
        }
        "bitmap" => {
            let Some(image) = args.next() else {
                bail!("bitmap requires an image path");
            };
            let json = args.any(|arg| arg == "--json");
            bitmap(Path::new(&image), json)
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => bail!("unknown command: {other}"),
    }
}

fn print_usage() {
    println!("ospfs — read-only inspector for osp filesystem images");
    println!();
    println!("Usage:");
    println!("  ospfs info <image> [--json]    print superblock and root inode summary");
    println!("  ospfs ls <image> [path]        list directory entries (default /)");
    println!("  ospfs cat <image> <path> [--raw]  print file content (raw bytes with --raw)");
    println!("  ospfs bitmap <image> [--json]  print data-block usage from the free bitmap");
}

fn open(image: &Path) -> Result<OpenFs> {
    OpenFs::open(image).with_context(|| format!("failed to open osp image: {}", image.display()))
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    superblock: SuperBlock,
    root_inode: Inode,
}

fn info(image: &Path, json: bool) -> Result<()> {
    let fs = open(image)?;
    let sb = *fs.superblock();
    let root = fs
        .read_inode(sb.root_inode())
        .context("failed to read root inode")?;

    if json {
        let output = InfoOutput {
            superblock: sb,
            root_inode: root,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("serialize output")?
        );
        return Ok(());
    }

    println!("magic {:#010x}", sb.magic);
    println!("blockSize {}", sb.block_size);
    println!("totalBlocks {}", sb.total_blocks);
    println!("inodeTableStart {}", sb.inode_table_start);
    println!("inodeTableBlocks {}", sb.inode_table_blocks);
    println!("inodeCount {}", sb.inode_count);
    println!("freeBitmapStart {}", sb.free_bitmap_start);
    println!("freeBitmapBlocks {}", sb.free_bitmap_blocks);
    println!("dataBlockStart {}", sb.data_block_start);
    println!("dataBlockCount {}", sb.data_block_count);
    println!("rootInodeId {}", sb.root_inode_id);
    println!(
        "root inode {} isDirectory {} size {} direct0 {}",
        root.id,
        u8::from(root.is_directory),
        root.size,
        root.direct[0]
    );
    Ok(())
}

fn ls(image: &Path, path: &str) -> Result<()> {
    let fs = open(image)?;
    let entries = fs
        .list_dir(path)
        .with_context(|| format!("failed to list {path}"))?;
    for entry in entries {
        if entry.is_directory {
            println!("{}/", entry.name);
        } else {
            println!("{}", entry.name);
        }
    }
    Ok(())
}

fn cat(image: &Path, path: &str, raw: bool) -> Result<()> {
    let fs = open(image)?;
    let content = fs
        .read_file_content(path)
        .with_context(|| format!("failed to read {path}"))?;

    if raw {
        std::io::stdout()
            .write_all(&content)
            .context("write raw bytes to stdout")?;
    } else {
        print!("{}", String::from_utf8_lossy(&content));
    }
    Ok(())
}

fn bitmap(image: &Path, json: bool) -> Result<()> {
    let fs = open(image)?;
    let stats = fs.bitmap_stats().context("failed to scan free bitmap")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("serialize output")?
        );
    } else {
        println!("dataBlocks {}", stats.total);
        println!("used {}", stats.used);
        println!("free {}", stats.free);
    }
    Ok(())
}
