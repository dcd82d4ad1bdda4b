use folio::build::feed::{FeedConfig, OutputFormat};
use folio::config::{Config, DEFAULT_CONFIG_FILE, SiteConfig};
use tracing::info;

use crate::InitArgs;

const WELCOME: &str = r#"---
title: Welcome
date: 2024-01-01
tags: [meta]
---

This site was created by `folio init`. Edit `content/index.md` to get started.
"#;

pub async fn run(args: &InitArgs) -> Result<(), anyhow::Error> {
    let path = if args.path.is_relative() {
        std::env::current_dir()?.join(&args.path)
    } else {
        args.path.clone()
    };

    if !path.exists() {
        if args.create {
            tokio::fs::create_dir_all(&path).await?;
            info!("Created directory {path}", path = path.display());
        } else {
            return Err(anyhow::anyhow!(
                "Directory does not exist: {path}",
                path = path.display()
            ));
        }
    }

    let config_file = path.join(DEFAULT_CONFIG_FILE);
    if config_file.exists() {
        return Err(anyhow::anyhow!(
            "Config file already exists: {}",
            config_file.display()
        ));
    }

    let mut posts = FeedConfig::new("posts");
    posts.title = Some("Posts".into());
    posts.reverse = true;
    posts.formats = vec![OutputFormat::Html, OutputFormat::Rss, OutputFormat::Json];
    posts.page_size = Some(10);

    let default_config = Config {
        site: SiteConfig {
            name: "My Folio Site".into(),
            url: Some("https://my-folio-site.com".into()),
            ..SiteConfig::default()
        },
        feeds: vec![posts],
        ..Config::default()
    };

    info!("Initializing project in {}", path.display());

    let config_text = serde_yaml::to_string(&default_config)?;
    tokio::fs::write(&config_file, config_text).await?;
    info!("Created config file {}", config_file.display());

    let content_dir = path.join(&default_config.site.content);
    tokio::fs::create_dir_all(&content_dir).await?;
    let index = content_dir.join("index.md");
    if !index.exists() {
        tokio::fs::write(&index, WELCOME).await?;
        info!("Created {}", index.display());
    }

    Ok(())
}
