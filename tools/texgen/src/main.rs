//! Renders cloud noise textures to PNG.
//!
//! Runs the built-in recipes (or those from `--recipe`) and writes one PNG per
//! recipe. Volumes are written as their z-slices stacked vertically, so a
//! `128³` texture becomes a `128 × 16384` image.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::Parser;
use image::ColorType;
use log::info;
use nimbus_core::{MultiChannelBuffer, TextureRecipe};

#[derive(Parser, Debug)]
#[command(name = "texgen", about = "Generate tileable cloud noise textures")]
struct Args {
    /// JSON file holding one recipe or an array of recipes.
    #[arg(short, long)]
    recipe: Option<PathBuf>,

    /// Directory the PNG files are written to.
    #[arg(short, long, default_value = "assets/textures")]
    output: PathBuf,

    /// Generation seed; defaults to the current time.
    #[arg(short, long)]
    seed: Option<u64>,

    /// Only generate the recipe with this name.
    #[arg(short, long)]
    name: Option<String>,

    /// Print the built-in recipes as JSON and exit.
    #[arg(long)]
    dump_recipes: bool,
}

fn clock_seed() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}

fn color_type(channels: usize) -> Result<ColorType> {
    Ok(match channels {
        1 => ColorType::L8,
        2 => ColorType::La8,
        3 => ColorType::Rgb8,
        4 => ColorType::Rgba8,
        n => bail!("cannot encode {n} channels as PNG"),
    })
}

fn write_png(buf: &MultiChannelBuffer, path: &Path) -> Result<()> {
    let dims = buf.dims();
    let (w, h) = (dims.width as u32, (dims.height * dims.depth) as u32);
    image::save_buffer(path, buf.as_bytes(), w, h, color_type(buf.channels())?)
        .with_context(|| format!("writing {}", path.display()))
}

fn load_recipes(args: &Args) -> Result<Vec<TextureRecipe>> {
    let recipes = match &args.recipe {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            TextureRecipe::from_json(&json).with_context(|| format!("loading {}", path.display()))?
        }
        None => TextureRecipe::builtin(),
    };
    match &args.name {
        Some(name) => {
            let picked: Vec<_> = recipes.into_iter().filter(|r| &r.name == name).collect();
            if picked.is_empty() {
                bail!("no recipe named `{name}`");
            }
            Ok(picked)
        }
        None => Ok(recipes),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.dump_recipes {
        println!("{}", serde_json::to_string_pretty(&TextureRecipe::builtin())?);
        return Ok(());
    }

    let recipes = load_recipes(&args)?;
    let seed = args.seed.unwrap_or_else(clock_seed);
    info!("seed {seed}");

    fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    for recipe in &recipes {
        println!("Creating {}…", recipe.name);
        let buf = recipe.generate(seed).with_context(|| format!("generating `{}`", recipe.name))?;
        let path = args.output.join(format!("{}.png", recipe.name));
        write_png(&buf, &path)?;
        println!("Wrote {}", path.display());
    }

    Ok(())
}
