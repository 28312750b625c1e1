//! Scene material analyzer and texture-bake CLI

use bake_core::{
    bake_all, bake_material, classify, record_batch_bake, record_bake as log_bake,
    record_classification, record_name_repair, scene_report, BakeOutcome, BakeSettings,
    ColorDepth, FileImageSaver, ImageFormat, Material, MaterialReport, MeshData, MeshEntity, Node,
    PreviewBakeHost, RenderDevice, Scene, ShadingGraph, UvLayer,
};
use bake_core::graph::sockets;
use bake_core::session_log::{export_session_log_text, load_session_log};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// CI/CD output format for automated pipelines
#[derive(Debug, Serialize)]
struct CiOutput {
    success: bool,
    total_materials: usize,
    clean: usize,
    flagged: usize,
    results: Vec<CiMaterialResult>,
}

#[derive(Debug, Serialize)]
struct CiMaterialResult {
    name: String,
    suffix: String,
    recommended_name: String,
    clean: bool,
    naming_issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uv_conflict: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uv_chain: Option<String>,
}

#[derive(Parser)]
#[command(name = "bake-cli")]
#[command(about = "Offline 3D-scene material analyzer and texture-bake orchestrator.")]
#[command(version = concat!("v", env!("CARGO_PKG_VERSION")))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (TOML). Can set output_dir, size, samples, log_path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct CliConfig {
    output_dir: Option<String>,
    size: Option<u32>,
    samples: Option<u32>,
    log_path: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run naming and UV hazard checks on every material in a scene
    Check {
        /// Path to the scene JSON file
        scene: PathBuf,
        /// Output structured JSON for CI/CD pipelines
        #[arg(long)]
        ci: bool,
    },
    /// Classify materials against the naming taxonomy
    Classify {
        /// Path to the scene JSON file
        scene: PathBuf,
        /// Only classify this material
        #[arg(long)]
        material: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Repair material names to the canonical convention
    FixNames {
        /// Path to the scene JSON file
        scene: PathBuf,
        /// Write the renamed scene back to the file (default: dry run)
        #[arg(long)]
        apply: bool,
        /// Write the renamed scene to a different file instead
        #[arg(short, long, conflicts_with = "apply")]
        output: Option<PathBuf>,
    },
    /// Bake one material's required textures
    Bake {
        /// Path to the scene JSON file
        scene: PathBuf,
        /// Material to bake
        material: String,
        /// Output image size (pixels, square). Default 1024
        #[arg(long)]
        size: Option<u32>,
        /// Render samples. Default 32
        #[arg(long)]
        samples: Option<u32>,
        /// Output format: png or exr
        #[arg(long, default_value = "png")]
        format: String,
        /// Use a float buffer for the output image
        #[arg(long)]
        float: bool,
        /// Output directory for baked textures
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Delete and recreate same-named existing images
        #[arg(long)]
        clear_existing: bool,
    },
    /// Bake every material in the scene
    BatchBake {
        /// Path to the scene JSON file
        scene: PathBuf,
        /// Output image size (pixels, square). Default 1024
        #[arg(long)]
        size: Option<u32>,
        /// Render samples. Default 32
        #[arg(long)]
        samples: Option<u32>,
        /// Output format: png or exr
        #[arg(long, default_value = "png")]
        format: String,
        /// Output directory for baked textures
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output structured JSON for CI/CD pipelines
        #[arg(long)]
        ci: bool,
    },
    /// Generate a full analysis report (text or JSON)
    Report {
        /// Path to the scene JSON file
        scene: PathBuf,
        /// Only report on this material
        #[arg(long)]
        material: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Write report to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show session log (classification, rename, bake actions)
    SessionLog {
        /// Maximum number of entries to show. Default 50
        #[arg(long, default_value = "50")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Write to file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write a demo scene JSON file for trying out the other commands
    DemoScene {
        /// Output path for the scene file
        #[arg(default_value = "demo_scene.json")]
        output: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Check { scene, ci } => cmd_check(&scene, ci),
        Commands::Classify {
            scene,
            material,
            json,
        } => cmd_classify(&scene, material.as_deref(), json, &config),
        Commands::FixNames {
            scene,
            apply,
            output,
        } => cmd_fix_names(&scene, apply, output.as_deref(), &config),
        Commands::Bake {
            scene,
            material,
            size,
            samples,
            format,
            float,
            output,
            clear_existing,
        } => {
            let settings = build_settings(
                &config,
                size,
                samples,
                &format,
                float,
                output,
                clear_existing,
            )?;
            cmd_bake(&scene, &material, &settings, &config)
        }
        Commands::BatchBake {
            scene,
            size,
            samples,
            format,
            output,
            ci,
        } => {
            let settings = build_settings(&config, size, samples, &format, false, output, false)?;
            cmd_batch_bake(&scene, &settings, ci, &config)
        }
        Commands::Report {
            scene,
            material,
            json,
            output,
        } => cmd_report(&scene, material.as_deref(), json, output.as_deref()),
        Commands::SessionLog {
            limit,
            json,
            output,
        } => cmd_session_log(limit, json, output.as_deref(), &config),
        Commands::DemoScene { output } => cmd_demo_scene(&output),
    }
}

fn load_config(path: Option<&Path>) -> Result<CliConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(CliConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read config {}: {}", path.display(), e))?;
    let config: CliConfig =
        toml::from_str(&content).map_err(|e| format!("invalid config: {}", e))?;
    Ok(config)
}

fn parse_format(format: &str) -> Result<ImageFormat, String> {
    match format.to_lowercase().as_str() {
        "png" => Ok(ImageFormat::Png),
        "exr" => Ok(ImageFormat::Exr),
        other => Err(format!("Unknown format: {}. Use png or exr.", other)),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_settings(
    config: &CliConfig,
    size: Option<u32>,
    samples: Option<u32>,
    format: &str,
    float: bool,
    output: Option<PathBuf>,
    clear_existing: bool,
) -> Result<BakeSettings, Box<dyn std::error::Error>> {
    let mut settings = BakeSettings::default();
    if let Some(size) = size.or(config.size) {
        settings.width = size;
        settings.height = size;
    }
    if let Some(samples) = samples.or(config.samples) {
        settings.samples = samples;
    }
    settings.format = parse_format(format)?;
    settings.color_depth = if float {
        ColorDepth::Float
    } else {
        ColorDepth::Standard
    };
    if let Some(dir) = output.or_else(|| config.output_dir.as_ref().map(PathBuf::from)) {
        settings.output_dir = dir;
    }
    settings.clear_existing = clear_existing;
    settings.device = RenderDevice::Cpu;
    Ok(settings)
}

fn log_path(config: &CliConfig) -> Option<PathBuf> {
    config.log_path.as_ref().map(PathBuf::from)
}

fn cmd_check(scene_path: &Path, ci: bool) -> Result<(), Box<dyn std::error::Error>> {
    let scene = Scene::load(scene_path)?;
    let report = scene_report(&scene);

    let results: Vec<CiMaterialResult> = report
        .materials
        .iter()
        .map(|m| CiMaterialResult {
            name: m.name.clone(),
            suffix: m.suffix.clone(),
            recommended_name: m.recommended_name.clone(),
            clean: m.clean,
            naming_issues: m.naming_issues.clone(),
            uv_conflict: m
                .uv_conflict
                .as_ref()
                .filter(|c| c.has_conflict)
                .map(|c| c.detail.clone()),
            uv_chain: m
                .uv_chain
                .as_ref()
                .filter(|c| c.has_problematic_chain)
                .map(|c| c.detail.clone()),
        })
        .collect();

    if ci {
        let output = CiOutput {
            success: report.passed(),
            total_materials: report.material_count,
            clean: report.clean_count,
            flagged: report.material_count - report.clean_count,
            results,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        for result in &results {
            let status = if result.clean { "✓" } else { "✗" };
            println!("{} {} [{}]", status, result.name, result.suffix);
            for issue in &result.naming_issues {
                println!("    ⚠ naming: {}", issue);
            }
            if result.recommended_name != result.name {
                println!("    → rename to: {}", result.recommended_name);
            }
            if let Some(detail) = &result.uv_conflict {
                println!("    ⚠ UV sharing: {}", detail);
            }
            if let Some(detail) = &result.uv_chain {
                println!("    ⚠ UV transforms: {}", detail);
            }
        }
        println!(
            "\n{} material(s), {} clean, {} flagged",
            report.material_count,
            report.clean_count,
            report.material_count - report.clean_count
        );
    }

    if !report.passed() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_classify(
    scene_path: &Path,
    material: Option<&str>,
    json: bool,
    config: &CliConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let scene = Scene::load(scene_path)?;
    let targets: Vec<&Material> = match material {
        Some(name) => vec![scene
            .material(name)
            .ok_or_else(|| format!("Material not found: {}", name))?],
        None => scene.materials.iter().collect(),
    };

    let mut classifications = Vec::new();
    for mat in &targets {
        let c = classify::classify(&mat.name, mat.graph.as_ref(), mat.blend_mode);
        let _ = record_classification(
            &mat.name,
            c.recommended_suffix.label(),
            c.issues.len(),
            Some(scene_path),
            log_path(config).as_deref(),
        );
        classifications.push((mat.name.clone(), c));
    }

    if json {
        let entries: Vec<serde_json::Value> = classifications
            .iter()
            .map(|(name, c)| {
                serde_json::json!({
                    "name": name,
                    "suffix": c.recommended_suffix.label(),
                    "recommended_name": c.recommended_name,
                    "issues": c.issues.iter().map(ToString::to_string).collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for (name, c) in &classifications {
            println!("{} -> {} [{}]", name, c.recommended_name, c.recommended_suffix.label());
            if c.has_naming_issues() {
                println!("    issues: {}", c.issues_text());
            }
        }
    }
    Ok(())
}

/// (current, repaired) pairs for every material whose name would change
fn compute_renames(scene: &Scene) -> Vec<(String, String)> {
    scene
        .materials
        .iter()
        .filter_map(|m| {
            let c = classify::classify(&m.name, m.graph.as_ref(), m.blend_mode);
            if c.recommended_name != m.name {
                Some((m.name.clone(), c.recommended_name))
            } else {
                None
            }
        })
        .collect()
}

/// Rename materials and rewrite every entity slot referencing them
fn apply_renames(scene: &mut Scene, renames: &[(String, String)]) {
    for (old, new) in renames {
        if let Some(material) = scene.material_mut(old) {
            material.name = new.clone();
        }
        for entity in &mut scene.entities {
            for slot in &mut entity.material_slots {
                if slot == old {
                    *slot = new.clone();
                }
            }
        }
    }
}

fn cmd_fix_names(
    scene_path: &Path,
    apply: bool,
    output: Option<&Path>,
    config: &CliConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut scene = Scene::load(scene_path)?;
    let renames = compute_renames(&scene);

    if renames.is_empty() {
        println!("All material names already follow the convention.");
        return Ok(());
    }

    for (old, new) in &renames {
        println!("{} -> {}", old, new);
    }

    let destination = if apply { Some(scene_path) } else { output };
    match destination {
        Some(path) => {
            apply_renames(&mut scene, &renames);
            scene.save(path)?;
            for (old, new) in &renames {
                let _ = record_name_repair(old, new, Some(scene_path), log_path(config).as_deref());
            }
            println!(
                "Renamed {} material(s), scene written to {}.",
                renames.len(),
                path.display()
            );
        }
        None => println!("\nDry run. Pass --apply (in place) or --output FILE to write."),
    }
    Ok(())
}

fn cmd_bake(
    scene_path: &Path,
    material: &str,
    settings: &BakeSettings,
    config: &CliConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut scene = Scene::load(scene_path)?;
    let mut host = PreviewBakeHost;
    let report = bake_material(&mut scene, &mut host, &FileImageSaver, material, settings)?;

    match &report.outcome {
        BakeOutcome::Completed => {
            println!(
                "Baked {} texture(s) for {}",
                report.textures_baked.len(),
                material
            );
            for path in &report.saved_files {
                println!("  {}", path.display());
            }
            let _ = log_bake(
                material,
                report.textures_baked.len(),
                Some(scene_path),
                log_path(config).as_deref(),
            );
        }
        BakeOutcome::NoTexturesRequired => {
            println!("{}: vertex-color material, no textures required", material);
        }
        BakeOutcome::Skipped { reason } => {
            println!("{}: skipped ({})", material, reason);
        }
    }
    for warning in &report.warnings {
        eprintln!("⚠ {}", warning);
    }
    Ok(())
}

fn cmd_batch_bake(
    scene_path: &Path,
    settings: &BakeSettings,
    ci: bool,
    config: &CliConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut scene = Scene::load(scene_path)?;
    let mut host = PreviewBakeHost;
    let summary = bake_all(&mut scene, &mut host, &FileImageSaver, settings);

    let _ = record_batch_bake(
        summary.succeeded,
        summary.failed,
        summary.skipped,
        Some(scene_path),
        log_path(config).as_deref(),
    );

    if ci {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        for report in &summary.reports {
            match &report.outcome {
                BakeOutcome::Completed => {
                    println!("✓ {} ({} textures)", report.material, report.textures_baked.len())
                }
                BakeOutcome::NoTexturesRequired => {
                    println!("- {} (vertex color, nothing to bake)", report.material)
                }
                BakeOutcome::Skipped { reason } => {
                    println!("- {} (skipped: {})", report.material, reason)
                }
            }
        }
        for failure in &summary.failures {
            println!("✗ {}: {}", failure.material, failure.error);
        }
        println!(
            "\n{} material(s): {} baked, {} skipped, {} failed",
            summary.total, summary.succeeded, summary.skipped, summary.failed
        );
    }

    if summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_report(
    scene_path: &Path,
    material: Option<&str>,
    json: bool,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let scene = Scene::load(scene_path)?;

    let content = match material {
        Some(name) => {
            let report = MaterialReport::from_scene(&scene, name)
                .ok_or_else(|| format!("Material not found: {}", name))?;
            if json {
                report.to_json()?
            } else {
                report.to_text()
            }
        }
        None => {
            let report = scene_report(&scene);
            if json {
                report.to_json()?
            } else {
                report.to_text()
            }
        }
    };

    match output {
        Some(path) => {
            std::fs::write(path, &content)?;
            println!("Report written to {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn cmd_session_log(
    limit: usize,
    json: bool,
    output: Option<&Path>,
    config: &CliConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let log = load_session_log(log_path(config).as_deref())?;

    let content = if json {
        let slice = &log.entries[..log.entries.len().min(limit)];
        serde_json::to_string_pretty(slice)?
    } else {
        export_session_log_text(&log, Some(limit))
    };

    match output {
        Some(path) => {
            std::fs::write(path, &content)?;
            println!("Session log written to {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn cmd_demo_scene(output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let scene = demo_scene();
    scene.save(output)?;
    println!(
        "Demo scene with {} materials written to {}",
        scene.materials.len(),
        output.display()
    );
    Ok(())
}

/// A small scene exercising each analysis: a metal material with a bad
/// name, an unlit sign, a vertex-color material, and a textured floor with
/// a no-op mapping chain shared by two objects.
fn demo_scene() -> Scene {
    let mut scene = Scene::new();

    let mut metal = ShadingGraph::new();
    let pbr = metal.add_node(Node::pbr());
    if let Some(socket) = metal
        .node_mut(pbr)
        .and_then(|n| n.input_mut(sockets::METALLIC))
    {
        socket.default = bake_core::SocketValue::Scalar(0.8);
    }
    scene.add_material(Material::new("Rusty-Metal Plate.01", metal));

    let mut sign = ShadingGraph::new();
    sign.add_node(Node::emission([1.0, 0.25, 0.0, 1.0], 3.0));
    scene.add_material(Material::new("glow sign", sign));

    let mut paint = ShadingGraph::new();
    paint.add_node(Node::attribute("Col", true));
    scene.add_material(Material::new("paint_VXC", paint));

    let mut floor = ShadingGraph::new();
    let coord = floor.add_node(Node::tex_coord());
    let mapping = floor.add_node(Node::identity_mapping());
    let texture = floor.add_node(Node::image_texture(Some("woodPlanks")));
    let shader = floor.add_node(Node::pbr());
    // links on freshly built nodes with known sockets cannot fail
    let _ = floor.add_link(coord, sockets::UV, mapping, sockets::VECTOR);
    let _ = floor.add_link(mapping, sockets::VECTOR, texture, sockets::VECTOR);
    let _ = floor.add_link(texture, sockets::COLOR, shader, sockets::BASE_COLOR);
    scene.add_material(Material::new("woodFloor", floor));

    let quad = MeshData {
        vertex_count: 4,
        face_count: 1,
        uv_layers: vec![UvLayer {
            name: "UVMap".to_string(),
            coords: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
        }],
        active_uv: Some(0),
    };

    scene.entities.push(MeshEntity::new(
        "crate",
        quad.clone(),
        vec!["Rusty-Metal Plate.01".to_string(), "paint_VXC".to_string()],
    ));
    scene.entities.push(MeshEntity::new(
        "sign",
        quad.clone(),
        vec!["glow sign".to_string()],
    ));
    scene
        .entities
        .push(MeshEntity::new("floorA", quad.clone(), vec!["woodFloor".to_string()]));
    scene
        .entities
        .push(MeshEntity::new("floorB", quad, vec!["woodFloor".to_string()]));

    scene
}
