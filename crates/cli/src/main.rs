use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use clap::Parser;

use vlur_core::blurring::domain::image_processor::ImageProcessor;
use vlur_core::blurring::infrastructure::cpu_image_processor::CpuImageProcessor;
use vlur_core::blurring::infrastructure::processor_factory::create_image_processor;
use vlur_core::shared::bitmap::Bitmap;
use vlur_core::shared::config::EngineConfig;
use vlur_core::shared::constants::{IMAGE_EXTENSIONS, MAX_BLUR_RADIUS, MIN_BLUR_RADIUS};
use vlur_core::shared::error::VlurError;

const SLOT: i32 = 0;

/// Gaussian blur of an image on the GPU.
#[derive(Parser)]
#[command(name = "vlur")]
struct Cli {
    /// Input image file.
    input: PathBuf,

    /// Output image file.
    output: PathBuf,

    /// Blur radius in pixels (1.0-25.0).
    #[arg(long, default_value = "10.0")]
    radius: f32,

    /// Use the CPU implementation even if a GPU is available.
    #[arg(long)]
    cpu: bool,

    /// Enable GPU validation layers.
    #[arg(long)]
    debug: bool,

    /// Engine config file (JSON). Defaults to the user config directory.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = effective_config(cli.config.as_deref(), cli.debug)?;
    let processor = create_image_processor(&config, cli.cpu);

    let input = image::open(&cli.input)?.to_rgba8();
    let bitmap = Bitmap::from_rgba_image(input);
    log::info!(
        "Blurring {} ({}x{}) with radius {}",
        cli.input.display(),
        bitmap.width(),
        bitmap.height(),
        cli.radius
    );

    let start = Instant::now();
    let output = match blur_bitmap(processor.as_ref(), &bitmap, cli.radius) {
        Err(e) if e.is_device_lost() => {
            log::warn!("{e}, retrying on the CPU");
            blur_bitmap(&CpuImageProcessor::new(), &bitmap, cli.radius)?
        }
        result => result?,
    };
    log::info!("Blur finished in {:.1?}", start.elapsed());

    output.into_rgba_image()?.save(&cli.output)?;
    eprintln!("Wrote {}", cli.output.display());
    Ok(())
}

/// Configure, blur and read back one slot, then release the processor.
fn blur_bitmap(
    processor: &dyn ImageProcessor,
    bitmap: &Bitmap,
    radius: f32,
) -> Result<Bitmap, VlurError> {
    let result = processor
        .configure_input_and_output(bitmap, SLOT)
        .and_then(|()| processor.blur(radius, SLOT))
        .and_then(|()| processor.read_output(SLOT));
    processor.cleanup();
    result
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if !(MIN_BLUR_RADIUS..=MAX_BLUR_RADIUS).contains(&cli.radius) {
        return Err(format!(
            "Radius must be between {MIN_BLUR_RADIUS} and {MAX_BLUR_RADIUS}, got {}",
            cli.radius
        )
        .into());
    }
    if !is_image(&cli.output) {
        return Err(format!(
            "Output must have an image extension ({}), got {}",
            IMAGE_EXTENSIONS.join(", "),
            cli.output.display()
        )
        .into());
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vlur").join("config.json"))
}

/// An explicit `--config` must exist and parse; the default location is
/// optional.
fn load_config(path: Option<&Path>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {e}", path.display()))?;
            Ok(serde_json::from_str(&json)?)
        }
        None => Ok(default_config_path()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()),
    }
}

/// Flags only switch settings on; an absent flag keeps the file's value.
fn effective_config(
    path: Option<&Path>,
    debug: bool,
) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = load_config(path)?;
    if debug {
        config = config.with_debug(true);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(input: PathBuf, output: &str, radius: f32) -> Cli {
        Cli {
            input,
            output: PathBuf::from(output),
            radius,
            cpu: true,
            debug: false,
            config: None,
        }
    }

    #[test]
    fn test_validate_accepts_radius_bounds() {
        let input = tempfile::NamedTempFile::new().unwrap();
        assert!(validate(&cli(input.path().to_path_buf(), "out.png", 1.0)).is_ok());
        assert!(validate(&cli(input.path().to_path_buf(), "out.png", 25.0)).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_arguments() {
        let input = tempfile::NamedTempFile::new().unwrap();
        assert!(validate(&cli(PathBuf::from("/no/such/file.png"), "out.png", 5.0)).is_err());
        assert!(validate(&cli(input.path().to_path_buf(), "out.png", 30.0)).is_err());
        assert!(validate(&cli(input.path().to_path_buf(), "out.txt", 5.0)).is_err());
    }

    #[test]
    fn test_is_image_ignores_case() {
        assert!(is_image(Path::new("photo.PNG")));
        assert!(!is_image(Path::new("notes")));
    }

    #[test]
    fn test_explicit_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"debug": true, "power_preference": "low"}"#).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert!(config.debug);
    }

    #[test]
    fn test_config_debug_survives_absent_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"debug": true}"#).unwrap();

        assert!(effective_config(Some(&path), false).unwrap().debug);
        assert!(effective_config(Some(&path), true).unwrap().debug);
    }

    #[test]
    fn test_debug_flag_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"debug": false}"#).unwrap();

        assert!(effective_config(Some(&path), true).unwrap().debug);
        assert!(!effective_config(Some(&path), false).unwrap().debug);
    }

    #[test]
    fn test_blur_bitmap_releases_processor() {
        let processor = CpuImageProcessor::new();
        let bitmap = Bitmap::solid(6, 3, [20, 40, 60, 255]);

        let output = blur_bitmap(&processor, &bitmap, 4.0).unwrap();
        assert_eq!((output.width(), output.height()), (6, 3));
        assert_eq!(output.pixel(2, 1), [20, 40, 60, 255]);
        assert!(processor.read_output(SLOT).is_err());
    }

    #[test]
    fn test_blur_bitmap_reports_bad_radius() {
        let processor = CpuImageProcessor::new();
        let error = blur_bitmap(&processor, &Bitmap::solid(2, 2, [0; 4]), 40.0).unwrap_err();
        assert!(!error.is_device_lost());
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.json"))).is_err());
    }
}
