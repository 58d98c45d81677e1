use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use dmmdiff_codec::{
    decode_text, detect_layout, parse, read_map, write_map, Compression, WriteOptions,
};
use dmmdiff_diff::create_diff;
use serde_json::json;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Diff(args) => cmd_diff(args, cli.format),
        Command::Convert(args) => cmd_convert(args, cli.format),
        Command::Inspect(args) => cmd_inspect(args, cli.format),
    }
}

fn load(path: &Path) -> anyhow::Result<dmmdiff_map::Map> {
    read_map(path).with_context(|| format!("cannot load {}", path.display()))
}

fn cmd_diff(args: DiffArgs, format: OutputFormat) -> anyhow::Result<()> {
    let before = load(&args.before)?;
    let after = load(&args.after)?;
    let diff = create_diff(&before, &after)?;
    let stats = diff.stats();

    let written = match &diff.diff_map {
        Some(map) if diff.tiles_changed > 0 => {
            let options = WriteOptions::gzip(args.layout.into(), args.gzip);
            write_map(map, &args.out, options)
                .with_context(|| format!("cannot write {}", args.out.display()))?;
            true
        }
        _ => false,
    };

    match format {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(&stats)?;
            value["output"] = if written {
                json!(args.out.display().to_string())
            } else {
                serde_json::Value::Null
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            if let Some(note) = &stats.note {
                println!("{}", note.yellow());
            }
            if diff.diff_map.is_some() {
                println!("{} tiles changed", stats.tiles_changed.to_string().bold());
                println!(
                    "{} movables added, {} movables deleted",
                    stats.movables_added.to_string().green(),
                    stats.movables_deleted.to_string().red()
                );
                println!("{} turfs changed", stats.turfs_changed.to_string().cyan());
                println!("{} areas changed", stats.areas_changed.to_string().cyan());
                if stats.unclassified_atoms > 0 {
                    println!("{} unclassified atoms", stats.unclassified_atoms);
                }
            }
            if written {
                println!("{} Wrote {}", "✓".green().bold(), args.out.display());
            }
        }
    }
    Ok(())
}

fn cmd_convert(args: ConvertArgs, format: OutputFormat) -> anyhow::Result<()> {
    let map = load(&args.input)?;
    let options = WriteOptions::gzip(args.layout.into(), args.gzip);
    write_map(&map, &args.output, options)
        .with_context(|| format!("cannot write {}", args.output.display()))?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "output": args.output.display().to_string(),
                "layout": options.layout.as_str(),
                "compression": options.compression,
            })
        ),
        OutputFormat::Text => println!(
            "{} Wrote {} ({})",
            "✓".green().bold(),
            args.output.display(),
            options.layout.as_str()
        ),
    }
    Ok(())
}

fn cmd_inspect(args: InspectArgs, format: OutputFormat) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.map)
        .with_context(|| format!("cannot read {}", args.map.display()))?;
    let compression = Compression::detect(&bytes);
    let text = decode_text(&bytes)?;
    let layout = detect_layout(&text);
    let map = parse(&text).with_context(|| format!("cannot parse {}", args.map.display()))?;
    let dims = map.dimensions();

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "dimensions": dims,
                "key_length": map.key_length(),
                "dictionary": map.dictionary_len(),
                "layout": layout.as_str(),
                "compression": compression,
            })
        ),
        OutputFormat::Text => {
            println!("{}", args.map.display().to_string().bold());
            println!("  Size: {}", dims.to_string().cyan());
            println!("  Key length: {}", map.key_length());
            println!("  Dictionary: {} entries", map.dictionary_len());
            println!("  Layout: {} ({:?})", layout.as_str().yellow(), compression);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLOORS: &str = "\"a\" = (/turf/floor,/area/a)\n(1,1,1) = {\"\naa\n\"}\n";
    const WALLS: &str = "\"a\" = (/turf/wall,/area/a)\n(1,1,1) = {\"\naa\n\"}\n";

    fn diff_args(dir: &tempfile::TempDir, after: &str) -> DiffArgs {
        let before_path = dir.path().join("before.dmm");
        let after_path = dir.path().join("after.dmm");
        std::fs::write(&before_path, FLOORS).unwrap();
        std::fs::write(&after_path, after).unwrap();
        DiffArgs {
            before: before_path,
            after: after_path,
            out: dir.path().join("diff.dmm"),
            layout: LayoutArg::Tgm,
            gzip: false,
        }
    }

    #[test]
    fn diff_writes_output_when_tiles_change() {
        let dir = tempfile::tempdir().unwrap();
        let args = diff_args(&dir, WALLS);
        let out = args.out.clone();
        cmd_diff(args, OutputFormat::Json).unwrap();
        let text = std::fs::read_to_string(out).unwrap();
        assert!(text.contains("/turf/wall"));
    }

    #[test]
    fn identical_maps_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let args = diff_args(&dir, FLOORS);
        let out = args.out.clone();
        cmd_diff(args, OutputFormat::Text).unwrap();
        assert!(!out.exists());
    }

    #[test]
    fn convert_then_inspect() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.dmm");
        let output = dir.path().join("out.dmm");
        std::fs::write(&input, FLOORS).unwrap();
        cmd_convert(
            ConvertArgs {
                input: input.clone(),
                output: output.clone(),
                layout: LayoutArg::Tgm,
                gzip: true,
            },
            OutputFormat::Text,
        )
        .unwrap();
        assert_eq!(load(&output).unwrap(), load(&input).unwrap());
        cmd_inspect(InspectArgs { map: output }, OutputFormat::Json).unwrap();
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = cmd_inspect(
            InspectArgs {
                map: dir.path().join("absent.dmm"),
            },
            OutputFormat::Text,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
