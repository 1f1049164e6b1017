//! CLI command implementations

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Subcommand};
use tracing::{debug, info, warn};
use vidserve_core::config::{CategoryConfig, MediaConfig};
use vidserve_core::{MediaLibrary, VidserveConfig, VidserveError};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the media server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        /// Bytes read from disk per streamed chunk
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Abort a stream when a single read stalls this long
        #[arg(long)]
        idle_timeout_secs: Option<u64>,
        /// Directory for the user entry and measurement CSV files
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[command(flatten)]
        media: MediaArgs,
    },
    /// Show where each category is served from
    Paths {
        #[command(flatten)]
        media: MediaArgs,
    },
    /// List the media files of a category
    List {
        /// Category name
        category: String,
        #[command(flatten)]
        media: MediaArgs,
    },
}

/// Category layout flags shared by every command.
#[derive(Args, Debug, Default)]
pub struct MediaArgs {
    /// Base directory holding the default categories
    #[arg(long)]
    assets_dir: Option<PathBuf>,
    /// Category mapping as name=dir, repeatable; replaces the defaults
    #[arg(long = "category", value_name = "NAME=DIR")]
    categories: Vec<String>,
    /// Serve files even when they resolve outside their category directory
    #[arg(long)]
    allow_outside_root: bool,
}

impl MediaArgs {
    /// Applies the flags on top of environment-derived configuration.
    fn apply(self, config: &mut VidserveConfig) -> anyhow::Result<()> {
        if let Some(dir) = self.assets_dir {
            config.media = MediaConfig {
                enforce_containment: config.media.enforce_containment,
                ..MediaConfig::with_assets_dir(dir)
            };
        }

        if !self.categories.is_empty() {
            config.media.categories = self
                .categories
                .iter()
                .map(|spec| CategoryConfig::parse_spec(spec))
                .collect::<Result<Vec<_>, _>>()?;
        }

        if self.allow_outside_root {
            config.media.enforce_containment = false;
        }

        config.validate()?;
        Ok(())
    }
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            host,
            port,
            chunk_size,
            idle_timeout_secs,
            data_dir,
            media,
        } => {
            let mut config = VidserveConfig::from_env();
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(chunk_size) = chunk_size {
                config.streaming.chunk_size = chunk_size;
            }
            if let Some(secs) = idle_timeout_secs {
                config.streaming.idle_read_timeout = Some(Duration::from_secs(secs));
            }
            if let Some(dir) = data_dir {
                config.records.data_dir = dir;
            }
            media.apply(&mut config)?;
            debug!("Resolved configuration: {:?}", config);
            start_server(config).await
        }
        Commands::Paths { media } => {
            let mut config = VidserveConfig::from_env();
            media.apply(&mut config)?;
            show_paths(&config).await
        }
        Commands::List { category, media } => {
            let mut config = VidserveConfig::from_env();
            media.apply(&mut config)?;
            list_category(&config, &category).await
        }
    }
}

/// Start the web server
///
/// # Errors
/// - `VidserveError::Configuration` - Invalid bind address
/// - `VidserveError::Io` - Address in use or server failure
pub async fn start_server(config: VidserveConfig) -> anyhow::Result<()> {
    println!("Starting Vidserve on {}:{}", config.server.host, config.server.port);
    for category in &config.media.categories {
        println!("  {} -> {}", category.name, category.root.display());
    }
    println!("  records -> {}", config.records.data_dir.display());
    info!(
        "Streaming with {} byte chunks, idle read timeout {:?}",
        config.streaming.chunk_size, config.streaming.idle_read_timeout
    );

    vidserve_web::run_server(config)
        .await
        .context("server terminated with an error")
}

/// Print each configured category directory and whether it exists
///
/// # Errors
/// Never fails; returns `Result` for symmetry with the other commands
pub async fn show_paths(config: &VidserveConfig) -> anyhow::Result<()> {
    let library = MediaLibrary::new(&config.media);

    println!("Assets directory: {}", config.media.assets_dir.display());
    for category in library.categories() {
        let exists = tokio::fs::try_exists(&category.root).await.unwrap_or(false);
        let marker = if exists { "ok" } else { "missing" };
        println!(
            "  {:<12} {} [{}] ({})",
            category.name,
            category.root.display(),
            marker,
            category.content_type
        );
    }
    println!("Records directory: {}", config.records.data_dir.display());

    Ok(())
}

/// Print the media files of one category
///
/// # Errors
/// - `VidserveError::Resolve` - Unknown category or unreadable directory
pub async fn list_category(config: &VidserveConfig, category: &str) -> anyhow::Result<()> {
    let library = MediaLibrary::new(&config.media);

    match library.list(category).await {
        Ok(files) if files.is_empty() => {
            println!("No media files in {category}");
            Ok(())
        }
        Ok(files) => {
            for file in files {
                println!("{file}");
            }
            Ok(())
        }
        Err(e) => {
            warn!("Listing {} failed: {}", category, e);
            let error = VidserveError::from(e);
            anyhow::bail!(error.user_message())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_flags_replace_defaults() {
        let mut config = VidserveConfig::default();
        let args = MediaArgs {
            assets_dir: None,
            categories: vec!["engine=/data/engine".to_string()],
            allow_outside_root: true,
        };

        args.apply(&mut config).unwrap();
        assert_eq!(config.media.categories.len(), 1);
        assert_eq!(config.media.categories[0].name, "engine");
        assert!(!config.media.enforce_containment);
    }

    #[test]
    fn test_assets_dir_rebases_defaults() {
        let mut config = VidserveConfig::default();
        let args = MediaArgs {
            assets_dir: Some(PathBuf::from("/srv/media")),
            ..Default::default()
        };

        args.apply(&mut config).unwrap();
        assert_eq!(
            config.media.category("housing").unwrap().root,
            PathBuf::from("/srv/media/housing")
        );
        assert!(config.media.enforce_containment);
    }

    #[test]
    fn test_invalid_category_flag() {
        let mut config = VidserveConfig::default();
        let args = MediaArgs {
            categories: vec!["engine".to_string()],
            ..Default::default()
        };

        assert!(args.apply(&mut config).is_err());
    }

    #[tokio::test]
    async fn test_list_unknown_category_fails_with_user_message() {
        let config = VidserveConfig::default();
        let err = list_category(&config, "engine").await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown category: engine");
    }
}
