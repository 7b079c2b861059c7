use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand};
use image::{DynamicImage, RgbaImage};
use rand::Rng;
use serde_json::{json, Value};
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use addi_viewer::config::ViewerConfig;
use addi_viewer::nav::Location;
use addi_viewer::overlay::Composite;
use addi_viewer::page::render_page;
use addi_viewer::raster::rasterize;
use addi_viewer::store::{open_store, DirStore, RecordStore};
use addi_viewer::strip::GalleryKind;
use addi_viewer::view::{ViewControls, ViewState, Viewer};
use addi_viewer::{logging, render, select, Category, DetectionRecord};

const BROWSE_HELP: &str = r##"Browse commands (one per line on stdin):
  open <id>          navigate to a record (resets category/opacity/confidence)
  category <key>     none | face | inst | lvic | kpnt (unknown keys show none)
  opacity <0-100>    image visibility under the annotations
  confidence <0-100> hide detections at or below this confidence
  similar <n>        follow the n-th "Similar Photographs" thumbnail (0-based)
  other <n>          follow the n-th "Other Recommendations" thumbnail (0-based)
  render <path>      write the current overlay (.png/.jpg raster or .svg)
  page <path>        write the current view as an HTML page
  state              print the current state
  quit               leave the session
"##;

#[derive(Parser, Debug)]
#[command(
    name = "addi-view",
    version,
    about = "Render threshold-filtered computer-vision annotations over archival photographs"
)]
struct Cli {
    /// JSON config file
    #[arg(long, global = true, env = "ADDI_VIEW_CONFIG")]
    config: Option<PathBuf>,
    /// Record store base: a directory or an http(s) URL holding <id>.json
    #[arg(long, global = true)]
    store: Option<String>,
    /// Location URL whose `id` query parameter names the record
    #[arg(long, global = true)]
    location: Option<String>,
    /// Log lookups and navigation at info level
    #[arg(long, short, global = true, action = ArgAction::SetTrue)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print supported commands in JSON
    Commands,
    /// Print the annotation primitives selected for a record
    Select(SelectArgs),
    /// Render the overlay for a record to PNG/JPEG or SVG and emit a metadata sidecar
    Render(RenderArgs),
    /// Write a standalone HTML page for a record
    Page(PageArgs),
    /// Interactive session driven by line commands on stdin
    Browse(BrowseArgs),
}

#[derive(Args, Debug)]
struct RecordArgs {
    /// Record id (default: the location's `id`, then the configured default)
    #[arg(long)]
    id: Option<String>,
    /// Read the record from a local JSON file instead of the store
    #[arg(long, conflicts_with = "id")]
    record: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ControlArgs {
    /// Annotation category: none, face, inst, lvic, kpnt
    #[arg(long, default_value = "none")]
    category: String,
    /// Image visibility under the annotations (0-100)
    #[arg(long, default_value_t = 80, value_parser = clap::value_parser!(u8).range(0..=100))]
    opacity: u8,
    /// Confidence threshold (0-100); detections must be strictly above it
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u8).range(0..=100))]
    confidence: u8,
}

impl ControlArgs {
    fn controls(&self) -> ViewControls {
        ViewControls::default()
            .with_category(Category::parse(&self.category))
            .with_opacity(self.opacity)
            .with_confidence(self.confidence)
    }
}

#[derive(Args, Debug)]
struct SelectArgs {
    #[command(flatten)]
    record: RecordArgs,
    #[command(flatten)]
    controls: ControlArgs,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    record: RecordArgs,
    #[command(flatten)]
    controls: ControlArgs,
    /// Output path; `.svg` writes vector output, anything else a raster image
    #[arg(long)]
    out: Option<PathBuf>,
    /// Path to write render metadata sidecar (default: <out>.json)
    #[arg(long)]
    meta_out: Option<PathBuf>,
    /// Disable metadata sidecar output
    #[arg(long, action = ArgAction::SetTrue)]
    no_meta: bool,
}

#[derive(Args, Debug)]
struct PageArgs {
    #[command(flatten)]
    record: RecordArgs,
    #[command(flatten)]
    controls: ControlArgs,
    /// Output HTML path
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct BrowseArgs {
    /// Print browse command help and exit
    #[arg(long, action = ArgAction::SetTrue)]
    commands_help: bool,
}

/// Settings shared by every subcommand once config, env, and flags are merged.
struct Runtime {
    config: ViewerConfig,
    store: Arc<dyn RecordStore>,
    location: Location,
}

struct Loaded {
    id: String,
    record: DetectionRecord,
    /// Resolves the record's relative asset references.
    assets: Arc<dyn RecordStore>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Commands::Commands = cli.command {
        return print_commands();
    }

    let mut config = ViewerConfig::load_from(cli.config.as_deref())?;
    if let Some(store) = cli.store.clone() {
        config.record_store = store;
    }
    if let Some(location) = cli.location.clone() {
        config.base_location = location;
    }
    config.validate()?;
    let store = open_store(&config.record_store)
        .with_context(|| format!("cannot open record store: {}", config.record_store))?;
    let location = config.location()?;
    log::info!("record store: {}", store.describe());
    let ctx = Runtime {
        config,
        store,
        location,
    };

    match cli.command {
        Commands::Commands => print_commands(),
        Commands::Select(args) => command_select(&ctx, args),
        Commands::Render(args) => command_render(&ctx, args),
        Commands::Page(args) => command_page(&ctx, args),
        Commands::Browse(args) => command_browse(ctx, args),
    }
}

fn print_commands() -> Result<()> {
    let rows = vec![
        json!({
            "name": "select",
            "description": "Print the threshold-filtered primitives for one category of a record."
        }),
        json!({
            "name": "render",
            "description": "Render base image, scrim, and annotations to PNG/JPEG or SVG with a JSON sidecar."
        }),
        json!({
            "name": "page",
            "description": "Write an HTML page with overlay, archival data, segmentation bars, and recommendations."
        }),
        json!({
            "name": "browse",
            "description": "Line-driven viewer session with navigation between recommended records."
        }),
    ];

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "commands": rows }))?
    );
    Ok(())
}

fn load_record(ctx: &Runtime, args: &RecordArgs) -> Result<Loaded> {
    if let Some(path) = &args.record {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("record not found: {}", path.display()))?;
        let record = DetectionRecord::from_json(&raw)
            .with_context(|| format!("invalid record JSON: {}", path.display()))?;
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("record")
            .to_string();
        return Ok(Loaded {
            id,
            record,
            assets: Arc::new(DirStore::new(parent)),
        });
    }

    let id = args
        .id
        .clone()
        .or_else(|| ctx.location.current_id())
        .unwrap_or_else(|| ctx.config.default_id.clone());
    let record = ctx
        .store
        .resolve(&id)
        .with_context(|| format!("failed to resolve record '{id}' from {}", ctx.store.describe()))?;
    Ok(Loaded {
        id,
        record,
        assets: Arc::clone(&ctx.store),
    })
}

fn command_select(ctx: &Runtime, args: SelectArgs) -> Result<()> {
    let loaded = load_record(ctx, &args.record)?;
    let controls = args.controls.controls();
    let primitives = select(&loaded.record, controls.category, controls.confidence_pct);
    let payload = json!({
        "record_id": loaded.id,
        "category": controls.category,
        "confidence_pct": controls.confidence_pct,
        "count": primitives.len(),
        "primitives": primitives,
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn command_render(ctx: &Runtime, args: RenderArgs) -> Result<()> {
    let loaded = load_record(ctx, &args.record)?;
    let controls = args.controls.controls();
    let composite = composite_for(&loaded.record, controls);

    let out = args
        .out
        .clone()
        .unwrap_or_else(|| generated_path(&ctx.config.out_dir, "render", &loaded.id, "png"));
    write_composite(loaded.assets.as_ref(), &composite, &out)?;

    if !args.no_meta {
        let meta_path = args
            .meta_out
            .clone()
            .unwrap_or_else(|| default_sidecar_for(&out));
        let (canvas_w, canvas_h) = composite.canvas_size();
        let payload = json!({
            "render_meta_version": 1,
            "record_id": loaded.id,
            "image_url": composite.image_url,
            "output_path": abs_path(&out).display().to_string(),
            "meta_path": abs_path(&meta_path).display().to_string(),
            "generated_at": timestamp_iso(),
            "size": {"width": canvas_w, "height": canvas_h, "units": "record"},
            "controls": controls,
            "scrim_opacity_pct": composite.scrim_opacity_pct,
            "primitives": composite.primitives,
        });
        write_json_pretty(&meta_path, &payload)?;
    }

    println!("{}", abs_path(&out).display());
    Ok(())
}

fn command_page(ctx: &Runtime, args: PageArgs) -> Result<()> {
    let loaded = load_record(ctx, &args.record)?;
    let controls = args.controls.controls();
    let location = ctx.location.navigate_to(&loaded.id);
    let out = args
        .out
        .clone()
        .unwrap_or_else(|| generated_path(&ctx.config.out_dir, "page", &loaded.id, "html"));
    write_text_file(&out, &render_page(&loaded.record, controls, &location))?;
    println!("{}", abs_path(&out).display());
    Ok(())
}

fn command_browse(ctx: Runtime, args: BrowseArgs) -> Result<()> {
    if args.commands_help {
        println!("{}", BROWSE_HELP.trim());
        return Ok(());
    }

    let mut viewer = Viewer::new(
        Arc::clone(&ctx.store),
        ctx.location.clone(),
        &ctx.config.default_id,
    );
    viewer.wait();
    emit(&browse_status(&viewer))?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read stdin")?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (cmd, arg) = match trimmed.split_once(char::is_whitespace) {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (trimmed, ""),
        };
        if matches!(cmd, "quit" | "exit") {
            break;
        }
        let payload = match browse_step(&mut viewer, cmd, arg) {
            Ok(payload) => payload,
            Err(err) => json!({ "error": format!("{err:#}"), "command": cmd }),
        };
        emit(&payload)?;
    }
    Ok(())
}

fn browse_step(viewer: &mut Viewer, cmd: &str, arg: &str) -> Result<Value> {
    match cmd {
        "open" => {
            if arg.is_empty() {
                bail!("open needs a record id");
            }
            viewer.navigate_to(arg);
            viewer.wait();
        }
        "category" => {
            require_ready(viewer.set_category(Category::parse(arg)))?;
        }
        "opacity" => {
            require_ready(viewer.set_opacity(parse_pct(arg)?))?;
        }
        "confidence" => {
            require_ready(viewer.set_confidence(parse_pct(arg)?))?;
        }
        "similar" | "other" => {
            let kind = if cmd == "similar" {
                GalleryKind::Similar
            } else {
                GalleryKind::Other
            };
            let index: usize = arg
                .parse()
                .map_err(|_| anyhow!("{cmd} needs a thumbnail index"))?;
            if !viewer.follow_recommendation(kind, index) {
                bail!("no {cmd} thumbnail at index {index}");
            }
            viewer.wait();
        }
        "render" => {
            let composite = viewer
                .frame()
                .ok_or_else(|| anyhow!("nothing to render in state '{}'", viewer.state().status()))?;
            let out = PathBuf::from(required_path(arg)?);
            write_composite(viewer.store().as_ref(), &composite, &out)?;
            return Ok(json!({
                "written": abs_path(&out).display().to_string(),
                "primitives": composite.primitives.len(),
            }));
        }
        "page" => {
            let ViewState::Ready {
                record, controls, ..
            } = viewer.state()
            else {
                bail!("nothing to render in state '{}'", viewer.state().status());
            };
            let out = PathBuf::from(required_path(arg)?);
            write_text_file(&out, &render_page(record, *controls, viewer.location()))?;
            return Ok(json!({ "written": abs_path(&out).display().to_string() }));
        }
        "state" => {}
        "help" => return Ok(json!({ "help": BROWSE_HELP.trim() })),
        other => bail!("unknown command '{other}' (try 'help')"),
    }
    Ok(browse_status(viewer))
}

fn browse_status(viewer: &Viewer) -> Value {
    let state = viewer.state();
    let mut payload = json!({
        "id": state.id(),
        "status": state.status(),
        "location": viewer.location().as_str(),
    });
    if let (Some(controls), Some(frame), Some(strip)) =
        (state.controls(), viewer.frame(), viewer.strip())
    {
        payload["controls"] = json!(controls);
        payload["primitives"] = json!(frame.primitives.len());
        payload["similar"] = json!(strip.similar.thumbnails.len());
        payload["other"] = json!(strip.other.thumbnails.len());
    }
    payload
}

fn require_ready(applied: bool) -> Result<()> {
    if applied {
        Ok(())
    } else {
        bail!("no record is loaded")
    }
}

fn parse_pct(raw: &str) -> Result<u8> {
    let value: u8 = raw
        .parse()
        .map_err(|_| anyhow!("expected an integer 0-100, got '{raw}'"))?;
    if value > 100 {
        bail!("expected an integer 0-100, got {value}");
    }
    Ok(value)
}

fn required_path(arg: &str) -> Result<&str> {
    if arg.is_empty() {
        bail!("an output path is required");
    }
    Ok(arg)
}

fn emit(payload: &Value) -> Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", serde_json::to_string(payload)?)?;
    stdout.flush()?;
    Ok(())
}

fn composite_for(record: &DetectionRecord, controls: ViewControls) -> Composite {
    let primitives = select(record, controls.category, controls.confidence_pct);
    render(
        &record.image_url,
        record.width,
        record.height,
        controls.opacity_pct,
        primitives,
    )
}

fn write_composite(assets: &dyn RecordStore, composite: &Composite, out: &Path) -> Result<()> {
    let is_svg = out
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("svg"))
        .unwrap_or(false);
    if is_svg {
        return write_text_file(out, &composite.to_svg());
    }

    let rendered = rasterize_composite(assets, composite)?;
    ensure_parent_dir(out)?;
    DynamicImage::ImageRgba8(rendered)
        .to_rgb8()
        .save(out)
        .with_context(|| format!("failed to save output image: {}", out.display()))?;
    Ok(())
}

fn rasterize_composite(assets: &dyn RecordStore, composite: &Composite) -> Result<RgbaImage> {
    let bytes = assets
        .fetch_asset(&composite.image_url)
        .with_context(|| format!("failed to load base image: {}", composite.image_url))?;
    let base = image::load_from_memory(&bytes)
        .with_context(|| format!("failed to decode base image: {}", composite.image_url))?;
    rasterize(composite, &base)
        .with_context(|| format!("cannot render overlay for {}", composite.image_url))
}

fn write_text_file(path: &Path, content: &str) -> Result<()> {
    ensure_parent_dir(path)?;
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn write_json_pretty(path: &Path, value: &Value) -> Result<()> {
    ensure_parent_dir(path)?;
    let raw = serde_json::to_string_pretty(value)?;
    fs::write(path, raw).with_context(|| format!("failed to write JSON: {}", path.display()))?;
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create parent directory: {}", parent.display())
            })?;
        }
    }
    Ok(())
}

fn default_sidecar_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("{stem}.json"))
}

fn generated_path(out_dir: &Path, kind: &str, id: &str, ext: &str) -> PathBuf {
    let slug = slugify(id);
    let ts = timestamp_compact();
    let rand = rand::thread_rng().gen_range(1000..9999);
    out_dir.join(format!(
        "{kind}-{slug}-{ts}-{}-{rand}.{ext}",
        std::process::id()
    ))
}

fn abs_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}

fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() || matches!(lower, '.' | '_' | '-') {
            out.push(lower);
        } else if lower.is_ascii_whitespace() {
            out.push('-');
        }
    }
    if out.is_empty() {
        "record".to_string()
    } else {
        out
    }
}

fn timestamp_compact() -> String {
    Utc::now().format("%Y%m%d-%H%M%S").to_string()
}

fn timestamp_iso() -> String {
    Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sidecar_sits_next_to_output() {
        assert_eq!(
            default_sidecar_for(Path::new("out/a.png")),
            PathBuf::from("out/a.json")
        );
    }

    #[test]
    fn slugify_keeps_safe_characters() {
        assert_eq!(slugify("2017 877/547"), "2017-877547");
        assert_eq!(slugify("///"), "record");
    }

    #[test]
    fn parse_pct_rejects_out_of_range() {
        assert_eq!(parse_pct("100").unwrap(), 100);
        assert!(parse_pct("101").is_err());
        assert!(parse_pct("-1").is_err());
    }

    #[test]
    fn writes_json_pretty() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("a").join("b.json");
        write_json_pretty(&target, &json!({"ok": true})).unwrap();
        assert!(target.exists());
    }

    #[test]
    fn svg_output_skips_image_loading() {
        let dir = tempdir().unwrap();
        let store = DirStore::new(dir.path());
        let composite = render("missing.jpg", 10.0, 10.0, 80, Vec::new());
        let out = dir.path().join("o.svg");
        write_composite(&store, &composite, &out).unwrap();
        assert!(fs::read_to_string(out).unwrap().starts_with("<svg"));
    }
}
