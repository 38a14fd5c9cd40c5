//! Application state and stage dispatch with builder pattern.

use crate::layout::ProjectLayout;
use splatseed_init::stages::{run_camera_stage, run_params_stage, run_quality_stage, run_scale_stage};
use splatseed_init::{InitConfig, InitError};
use std::path::{Path, PathBuf};
use tracing::info;

/// Logging configuration.
pub struct LoggingConfig {
    pub level: String,
    pub enable_tracy: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_tracy: false,
        }
    }
}

/// Builder for [`App`].
pub struct AppBuilder {
    root: PathBuf,
    config_path: Option<PathBuf>,
    logging: LoggingConfig,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("."),
            config_path: None,
            logging: LoggingConfig::default(),
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.logging.level = level.into();
        self
    }

    pub fn with_tracy(mut self, enable: bool) -> Self {
        self.logging.enable_tracy = enable;
        self
    }

    /// Initialize logging and load the configuration.
    pub fn build(self) -> Result<App, InitError> {
        self.init_logging();

        let config = match &self.config_path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                InitConfig::from_json_file(path)?
            }
            None => InitConfig::default(),
        };
        Ok(App {
            layout: ProjectLayout::new(self.root),
            config,
        })
    }

    fn init_logging(&self) {
        #[cfg(feature = "tracy")]
        {
            if self.logging.enable_tracy {
                use tracing_subscriber::Layer;
                use tracing_subscriber::layer::SubscriberExt;
                use tracing_subscriber::util::SubscriberInitExt;
                tracing_subscriber::registry()
                    .with(tracing_tracy::TracyLayer::default())
                    .with(
                        tracing_subscriber::fmt::layer().with_filter(
                            tracing_subscriber::EnvFilter::try_from_default_env()
                                .unwrap_or_else(|_| self.logging.level.clone().into()),
                        ),
                    )
                    .init();
                return;
            }
        }

        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&self.logging.level)),
            )
            .with_target(false)
            .init();
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolved layout and configuration for one invocation.
pub struct App {
    layout: ProjectLayout,
    config: InitConfig,
}

impl App {
    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Configuration, for command-line overrides.
    pub fn config_mut(&mut self) -> &mut InitConfig {
        &mut self.config
    }

    pub fn scales(&self, points: &Path, output: &Path) -> Result<(), InitError> {
        self.config.validate()?;
        run_scale_stage(points, output, &self.config.scale)?;
        Ok(())
    }

    pub fn init(
        &self,
        points: &Path,
        scales: &Path,
        output: &Path,
        summary: &Path,
    ) -> Result<(), InitError> {
        self.config.validate()?;
        run_params_stage(points, scales, output, summary, &self.config.params)?;
        Ok(())
    }

    pub fn cameras(&self, model: &Path, output: &Path) -> Result<(), InitError> {
        self.config.validate()?;
        run_camera_stage(model, output, &self.config.cameras)?;
        Ok(())
    }

    pub fn analyze(&self, points: &Path, report: Option<&Path>) -> Result<(), InitError> {
        self.config.validate()?;
        run_quality_stage(points, report, &self.config.quality)?;
        Ok(())
    }

    /// Stages 1 to 3 in order, communicating through the default artifacts.
    pub fn run_all(&self, points: &Path, model: &Path) -> Result<(), InitError> {
        let layout = &self.layout;
        info!("[1/3] Scale estimation");
        self.scales(points, &layout.scales())?;
        info!("[2/3] Parameter assembly");
        self.init(points, &layout.scales(), &layout.params(), &layout.summary())?;
        info!("[3/3] Camera extraction");
        self.cameras(model, &layout.cameras())?;
        info!("Initialization complete, artifacts in {}", layout.outputs().display());
        Ok(())
    }
}
