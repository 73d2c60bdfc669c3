use std::error::Error;
use std::process;

use clap::{Parser, Subcommand};
use lens_core::prelude::*;
use lens_utils::{debug, info, init_logging};

/// Readable summaries of a native runtime's containers, rendered from raw memory.
#[derive(Parser, Debug)]
#[command(name = "lens")]
#[command(version)]
#[command(about = "Readable summaries of a native runtime's containers, rendered from raw memory", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Build a sample runtime image and print what a debugger would show
    Demo
    {
        /// Map child naming: indexed or keyed
        #[arg(long, default_value = "indexed")]
        style: MapDisplayStyle,
        /// Nesting levels the summarizer expands
        #[arg(long)]
        max_depth: Option<usize>,
        /// Maximum number of characters per summary
        #[arg(long)]
        max_length: Option<usize>,
        /// Extra options as key=value (see `lens options`)
        #[arg(short = 'o', long = "option")]
        options: Vec<String>,
        /// Also list the children of every container
        #[arg(long, default_value_t = false)]
        children: bool,
    },
    /// List every option with its default value
    Options,
}

fn main()
{
    // Reads RUST_LOG, LENS_LOG_FORMAT and LENS_LOG_FILE; logs go to stderr
    let _guard = match init_logging() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            process::exit(1);
        }
    };

    let cli = Cli::parse();
    if let Err(e) = run_command(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_command(cli: Cli) -> std::result::Result<(), Box<dyn Error>>
{
    match cli.command {
        Commands::Demo { style, max_depth, max_length, options, children } => {
            let mut config = Options::from_env()?;
            config.map_display_style = style;
            if let Some(depth) = max_depth {
                config.max_recursion_depth = depth;
            }
            if let Some(length) = max_length {
                config.max_summary_length = length;
            }
            for pair in &options {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("Expected key=value, got '{}'", pair))?;
                config.set(key.trim(), value)?;
            }
            run_demo(config, children)
        }
        Commands::Options => {
            let defaults = Options::default();
            for (key, help) in Options::describe() {
                let current = defaults.get(key).unwrap_or_default();
                println!("{:<24} {:<10} {}", key, current, help);
            }
            Ok(())
        }
    }
}

fn run_demo(options: Options, children: bool) -> std::result::Result<(), Box<dyn Error>>
{
    let mut image = MemoryImage::new();
    let values = build_sample(&mut image)?;
    info!("Built sample image with {} values", values.len());

    let session = Session::new(options);
    let cx = session.inspector(&image);
    for value in &values {
        println!("{} = {}", value.name(), cx.summary(value));
        if !children {
            continue;
        }
        let Some(handle) = cx.open(value) else {
            continue;
        };
        debug!("Opened {} for {}", handle.id(), value.name());
        for child in handle.children(&cx) {
            println!("    {} = {}", child.name(), cx.summary(&child));
        }
    }
    Ok(())
}

/// One value of every common kind, laid out the way the runtime does
fn build_sample(image: &mut MemoryImage) -> lens_core::Result<Vec<RemoteValue>>
{
    let mut rt = RuntimeBuilder::new(image);
    let int = rt.int();
    let real = rt.real();
    let string = rt.string();
    rt.define_named_colors(&[("RED", [1.0, 0.0, 0.0, 1.0]), ("WHITE", [1.0, 1.0, 1.0, 1.0])])?;

    Ok(vec![
        rt.new_string("title", "Hello, lens")?,
        rt.new_string_name("node_name", "Player")?,
        rt.new_node_path("path", "/root/Level/Player:position:x")?,
        rt.new_math("velocity", "Vector2", &[3.5, -1.0])?,
        rt.new_math("tint", "Color", &[1.0, 0.0, 0.0, 1.0])?,
        rt.new_vector("scores", int, [10, 20, 30])?,
        rt.new_list("queue", int, 1..=8)?,
        rt.new_hash_map("inventory", string, int, [("sword", 1), ("potion", 5), ("key", 2)])?,
        rt.new_rb_map("levels", int, string, [(1, "intro"), (2, "forest"), (3, "castle")])?,
        rt.new_variant("health", 87)?,
        rt.new_array("mixed", [Item::Int(1), Item::from("two"), Item::Float(3.5), Item::Nil])?,
        rt.new_dictionary("config", [("volume", Item::Float(0.8)), ("fullscreen", Item::Bool(true))])?,
        rt.new_ring_buffer("history", real, [0.5, 1.0, 1.5, 2.0], 1, 3)?,
    ])
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_demo_runs_with_children()
    {
        let cli = Cli::try_parse_from(["lens", "demo", "--children", "-o", "mapDisplayStyle=keyed"]).unwrap();
        assert!(run_command(cli).is_ok());
    }

    #[test]
    fn test_bad_option_pair_is_an_error()
    {
        let cli = Cli::try_parse_from(["lens", "demo", "-o", "maxRecursionDepth"]).unwrap();
        assert!(run_command(cli).is_err());
    }

    #[test]
    fn test_sample_covers_every_value()
    {
        let mut image = MemoryImage::new();
        let values = build_sample(&mut image).unwrap();
        assert_eq!(values.len(), 13);
        assert_eq!(values[0].name(), "title");
    }
}
