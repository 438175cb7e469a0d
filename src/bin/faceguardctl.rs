//! faceguardctl - roster, alert reports, enrollment and snapshots

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;

use faceguard::recognize::FaceEngine;
use faceguard::{
    roster, AlertFilter, AlertLog, CameraConfig, CameraSource, FaceguardConfig, HistogramEngine,
    RoleCategory, Roster, TempStore,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered people per role category.
    Roster,
    /// Summarize today's alert log.
    Alerts,
    /// Capture reference photos for a new person.
    Enroll {
        /// Role category (empleados|vip|visitantes).
        #[arg(long)]
        category: String,
        /// Person's name (normalized into the folder name).
        #[arg(long)]
        name: String,
        /// Number of reference photos to capture.
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
    /// Capture a single frame to a screenshot file.
    Snapshot,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let cfg = FaceguardConfig::load()?;

    match cli.command {
        Commands::Roster => show_roster(&cfg),
        Commands::Alerts => show_alerts(&cfg),
        Commands::Enroll {
            category,
            name,
            count,
        } => enroll(&cfg, &category, &name, count),
        Commands::Snapshot => snapshot(&cfg),
    }
}

fn show_roster(cfg: &FaceguardConfig) -> Result<()> {
    let roster = Roster::load(&cfg.database_dir)?;
    if roster.is_empty() {
        println!("No registered people in {}", cfg.database_dir.display());
        return Ok(());
    }

    for category in RoleCategory::ALL {
        let entries: Vec<_> = roster.in_category(category).collect();
        if entries.is_empty() {
            continue;
        }
        println!(
            "{} (nivel {}):",
            category.label(),
            category.access_level()
        );
        for entry in entries {
            println!("  - {} ({} photo(s))", entry.name, entry.image_count);
        }
    }
    println!("Total: {} person(s)", roster.len());
    Ok(())
}

fn show_alerts(cfg: &FaceguardConfig) -> Result<()> {
    let alert_log = AlertLog::new(&cfg.logs_dir, AlertFilter::All)?;
    let stats = alert_log.stats_for_today()?;

    println!("Alertas de hoy: {}", stats.total);
    if stats.total == 0 {
        return Ok(());
    }

    println!("\nPor tipo:");
    for (severity, count) in &stats.by_severity {
        println!("  {}: {}", severity, count);
    }
    println!("\nPor persona:");
    for (person, count) in &stats.by_person {
        println!("  {}: {}", person, count);
    }
    println!("\nUltimas alertas:");
    for record in &stats.recent {
        println!(
            "  {} | {} | {} ({}%)",
            record.hora,
            record.nombre,
            record.tipo_alerta.as_str(),
            record.confianza
        );
    }
    Ok(())
}

fn enroll(cfg: &FaceguardConfig, category: &str, name: &str, count: usize) -> Result<()> {
    let category = RoleCategory::from_dir_name(category).ok_or_else(|| {
        anyhow!(
            "unknown category '{}' (expected empleados|vip|visitantes)",
            category
        )
    })?;
    let slug = roster::normalize_name(name);
    if slug.is_empty() {
        bail!("name '{}' normalizes to nothing usable", name);
    }
    if count == 0 {
        bail!("count must be greater than zero");
    }
    cfg.ensure_dirs()?;

    let mut camera = CameraSource::new(CameraConfig::from(&cfg.camera))?;
    camera.connect().context("failed to open camera")?;
    let temp = TempStore::new(&cfg.temp_dir)?;
    let mut engine = HistogramEngine::new();

    log::info!(
        "enrolling '{}' as {} ({} photo(s))",
        slug,
        category.label(),
        count
    );

    let max_attempts = count.saturating_mul(10).max(30);
    let mut captured = 0;

    for attempt in 0..max_attempts {
        if captured >= count {
            break;
        }
        let frame = camera.next_frame().context("camera capture failed")?;

        let staged = temp.save_jpeg("captura", &frame.to_image()?)?;
        let regions = match engine.extract_faces(&staged) {
            Ok(regions) => regions,
            Err(err) => {
                log::warn!("attempt {}: face detection failed: {}", attempt + 1, err);
                continue;
            }
        };
        let Some(region) = regions
            .iter()
            .find(|r| r.confidence > 0.0 && r.bbox.area() > 0)
        else {
            log::debug!("attempt {}: no face visible", attempt + 1);
            continue;
        };

        let crop = frame.crop(&region.bbox)?;
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%6f");
        let dest = roster::enrollment_path(
            &cfg.database_dir,
            category,
            &slug,
            &format!("{}_{}.jpg", slug, stamp),
        );
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        crop.to_image()?
            .save(&dest)
            .with_context(|| format!("writing {}", dest.display()))?;

        captured += 1;
        log::info!("captured {}/{}: {}", captured, count, dest.display());
        std::thread::sleep(Duration::from_millis(100));
    }

    if captured == 0 {
        bail!("no usable face captured; check lighting and camera placement");
    }
    println!(
        "Enrolled {} photo(s) for '{}' under {}",
        captured,
        slug,
        category.dir_name()
    );
    Ok(())
}

fn snapshot(cfg: &FaceguardConfig) -> Result<()> {
    let mut camera = CameraSource::new(CameraConfig::from(&cfg.camera))?;
    camera.connect().context("failed to open camera")?;
    let frame = camera.next_frame().context("camera capture failed")?;

    let temp = TempStore::new(&cfg.temp_dir)?;
    let path = temp.save_jpeg("screenshot", &frame.to_image()?)?;
    println!("Screenshot guardado: {}", path.display());
    Ok(())
}
