use super::files::{load_uploads, read_working, write_working};
use anyhow::{Context, Result, anyhow, bail};
use catalog_reconcile::session::load_categories;
use catalog_reconcile::store::config::{ENV_BASE_URL, ENV_TIMEOUT_SECS, ENV_TOKEN};
use catalog_reconcile::{
    CatalogClient, CatalogStore, EditSession, HttpStore, ImageBaseline, ReconcileConfig, RemoteId, SessionSnapshot,
    StoreConfig, WorkingCopy,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "catalog-reconcile")]
#[command(about = "Edit catalog products offline and push only what changed")]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args)]
pub struct StoreArgs {
    /// Catalog API base url
    #[arg(long, global = true, env = ENV_BASE_URL)]
    pub base_url: Option<String>,

    /// Bearer token
    #[arg(long, global = true, env = ENV_TOKEN, hide_env_values = true)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, env = ENV_TIMEOUT_SECS)]
    pub timeout: Option<u64>,
}

#[derive(Args)]
pub struct SaveArgs {
    /// Where the color images are diffed against
    #[arg(long, value_enum, default_value_t = BaselineArg::Remote)]
    pub image_baseline: BaselineArg,

    /// Maximum requests in flight
    #[arg(long, default_value_t = 8)]
    pub max_concurrent: usize,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum BaselineArg {
    Remote,
    Session,
}

impl From<BaselineArg> for ImageBaseline {
    fn from(arg: BaselineArg) -> Self {
        match arg {
            BaselineArg::Remote => ImageBaseline::Remote,
            BaselineArg::Session => ImageBaseline::Session,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Print a product session as JSON, optionally exporting its working copy
    Show {
        product_id: i64,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List the operations a save would issue
    Plan {
        product_id: i64,
        #[arg(long)]
        working: PathBuf,
    },
    /// Validate a working copy without contacting the store for writes
    Validate {
        product_id: i64,
        #[arg(long)]
        working: PathBuf,
    },
    /// Push a working copy and write back the confirmed identities
    Save {
        product_id: i64,
        #[arg(long)]
        working: PathBuf,
        #[command(flatten)]
        options: SaveArgs,
    },
    /// Create a new product from a working copy
    Create {
        #[arg(long)]
        working: PathBuf,
        #[command(flatten)]
        options: SaveArgs,
    },
    /// List categories
    Categories,
}

#[derive(Serialize)]
struct SessionView<'a> {
    product_id: Option<RemoteId>,
    snapshot: &'a SessionSnapshot,
    working: &'a WorkingCopy,
    /// Stored images resolved to urls the store serves
    media: Vec<String>,
}

fn media_urls(config: &StoreConfig, working: &WorkingCopy) -> Vec<String> {
    let product = working.product.image_url.iter().map(String::as_str);
    let colors = working
        .colors
        .iter()
        .flat_map(|color| color.item().images.iter())
        .filter_map(|image| image.item().url());
    product
        .chain(colors)
        .map(|path| config.media_url(path))
        .collect()
}

impl StoreArgs {
    pub fn to_config(&self) -> Result<StoreConfig> {
        // clap has already folded the environment into the flags
        let config = StoreConfig::from_lookup(|key| match key {
            ENV_BASE_URL => self.base_url.clone(),
            ENV_TOKEN => self.token.clone(),
            ENV_TIMEOUT_SECS => self.timeout.map(|secs| secs.to_string()),
            _ => None,
        })
        .map_err(|e| anyhow!("--base-url or {}: {}", ENV_BASE_URL, e))?;
        config.validate().map_err(|e| anyhow!("Invalid store configuration: {}", e))?;
        Ok(config)
    }
}

impl SaveArgs {
    pub fn to_config(&self) -> Result<ReconcileConfig> {
        let config = ReconcileConfig::new()
            .max_concurrent_requests(self.max_concurrent)
            .image_baseline(self.image_baseline.into());
        config.validate().map_err(|e| anyhow!("Invalid save options: {}", e))?;
        Ok(config)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = cli.store.to_config()?;
    tracing::debug!(store = %config.to_display_string(), "connecting");
    let store: Arc<dyn CatalogStore> = Arc::new(HttpStore::new(config.clone())?);

    match cli.command {
        Command::Show { product_id, out } => show(store, &config, RemoteId(product_id), out.as_deref()).await,
        Command::Plan { product_id, working } => plan(store, RemoteId(product_id), &working).await,
        Command::Validate { product_id, working } => validate(store, RemoteId(product_id), &working).await,
        Command::Save {
            product_id,
            working,
            options,
        } => save(store, Some(RemoteId(product_id)), &working, &options).await,
        Command::Create { working, options } => save(store, None, &working, &options).await,
        Command::Categories => {
            let categories = load_categories(store.as_ref()).await?;
            print_json(&categories)
        }
    }
}

async fn show(store: Arc<dyn CatalogStore>, config: &StoreConfig, product_id: RemoteId, out: Option<&Path>) -> Result<()> {
    let session = CatalogClient::new(store).open(product_id).await?;
    if let Some(out) = out {
        write_working(out, session.working())?;
        eprintln!("Exported working copy: {}", out.display());
    }
    print_json(&SessionView {
        product_id: session.product_id(),
        snapshot: session.snapshot(),
        working: session.working(),
        media: media_urls(config, session.working()),
    })
}

/// Loads the stored product and swaps in the working copy from `path`.
async fn session_with_file(client: &CatalogClient, product_id: Option<RemoteId>, path: &Path) -> Result<EditSession> {
    let mut working = read_working(path)?;
    load_uploads(&mut working).await?;

    let mut session = match product_id {
        Some(id) => client
            .open(id)
            .await
            .with_context(|| format!("Failed to load product {}", id))?,
        None => client.new_product(working.product.clone()).await?,
    };
    session.replace_working(working);
    Ok(session)
}

async fn plan(store: Arc<dyn CatalogStore>, product_id: RemoteId, path: &Path) -> Result<()> {
    let client = CatalogClient::new(store);
    let session = session_with_file(&client, Some(product_id), path).await?;
    let plan = client.plan(&session)?;
    if plan.is_empty() {
        eprintln!("Nothing to save");
    }
    print_json(&plan.operations())
}

async fn validate(store: Arc<dyn CatalogStore>, product_id: RemoteId, path: &Path) -> Result<()> {
    let client = CatalogClient::new(store);
    let session = session_with_file(&client, Some(product_id), path).await?;
    let report = session.validate();
    print_json(&report)?;
    if !report.is_valid() {
        bail!("{} validation error(s)", report.len());
    }
    Ok(())
}

async fn save(store: Arc<dyn CatalogStore>, product_id: Option<RemoteId>, path: &Path, options: &SaveArgs) -> Result<()> {
    let client = CatalogClient::new(store).with_config(options.to_config()?);
    let mut session = session_with_file(&client, product_id, path).await?;

    let results = client.save(&mut session).await?;
    write_working(path, session.working())?;
    if let (None, Some(created)) = (product_id, session.product_id()) {
        eprintln!("Created product {}; pass it to `save` for later edits", created);
    }

    let report = results.report();
    print_json(&report)?;
    if !report.success {
        bail!(
            "{} operation(s) failed; run save again to retry them",
            report.failures.len() + report.skipped.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_save_options() {
        let cli = Cli::try_parse_from([
            "catalog-reconcile",
            "--base-url",
            "http://localhost:8000/api",
            "save",
            "42",
            "--working",
            "tote.json",
            "--image-baseline",
            "session",
            "--max-concurrent",
            "2",
        ])
        .unwrap();

        assert!(cli.store.to_config().is_ok());
        match cli.command {
            Command::Save {
                product_id, options, ..
            } => {
                assert_eq!(product_id, 42);
                let config = options.to_config().unwrap();
                assert_eq!(config.image_baseline, ImageBaseline::Session);
                assert_eq!(config.max_concurrent_requests, 2);
            }
            _ => panic!("expected save"),
        }
    }

    #[test]
    fn test_store_args_build_config() {
        let args = StoreArgs {
            base_url: Some("https://shop.example/api/".to_string()),
            token: Some(" secret ".to_string()),
            timeout: Some(5),
        };
        let config = args.to_config().unwrap();
        assert_eq!(config.base_url, "https://shop.example/api");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.timeout.as_secs(), 5);

        let missing = StoreArgs {
            base_url: None,
            token: None,
            timeout: None,
        };
        assert!(missing.to_config().is_err());
    }

    #[test]
    fn test_media_urls_resolve_stored_images() {
        use catalog_reconcile::{ColorImage, ColorVariant, Entry, ProductFields};

        let config = StoreConfig::new("https://shop.example");
        let mut product = ProductFields::new("Tote", "10.00", Some(RemoteId(1)));
        product.image_url = Some("/media/products/tote.png".to_string());
        let mut working = WorkingCopy::new(product);
        let mut red = ColorVariant::new("Red", "#FF0000", 1);
        red.images.push(Entry::persisted(RemoteId(5), ColorImage::stored("colors/red.png")));
        working.colors.push(Entry::persisted(RemoteId(2), red));

        assert_eq!(
            media_urls(&config, &working),
            vec![
                "https://shop.example/media/products/tote.png".to_string(),
                "https://shop.example/media/colors/red.png".to_string(),
            ]
        );
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let options = SaveArgs {
            image_baseline: BaselineArg::Remote,
            max_concurrent: 0,
        };
        assert!(options.to_config().is_err());
    }

    #[test]
    fn test_store_args_require_http_url() {
        let args = StoreArgs {
            base_url: Some("localhost:8000".to_string()),
            token: None,
            timeout: None,
        };
        assert!(args.to_config().is_err());
    }
}
