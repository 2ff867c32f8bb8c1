use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curatr::catalog::{ProductPage, ProductPatch};
use curatr::config::Config;
use curatr::forms::{self, Field, ProductForm};
use curatr::App;

#[derive(Parser, Debug)]
#[command(name = "curatr")]
#[command(author, version, about = "A fast, lightweight product catalog admin client", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "curatr.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,

    /// API URL to connect to (overrides the config file)
    #[arg(long, env = "CURATR_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authenticate by email and persist the session
    Login {
        /// Email to authenticate with
        email: String,
    },

    /// Clear the persisted session
    Logout,

    /// Show the current session
    Whoami,

    /// List all categories
    Categories,

    /// Product commands
    #[command(subcommand)]
    Products(ProductsCommands),
}

#[derive(Subcommand, Debug)]
enum ProductsCommands {
    /// List products, one page at a time
    List {
        /// Page number, starting at 1
        #[arg(short, long, default_value = "1")]
        page: u32,
        /// Filter by category id
        #[arg(long)]
        category: Option<String>,
    },

    /// Search products by free text
    Search {
        /// Text to search for
        text: String,
    },

    /// Show a single product by slug
    Show {
        /// Product slug
        slug: String,
    },

    /// Create a product
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        price: String,
        /// Image URL
        #[arg(long)]
        image: String,
        /// Category id
        #[arg(long)]
        category: String,
    },

    /// Update a product
    Update {
        /// Product id
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        price: Option<String>,
        /// Image URL
        #[arg(long)]
        image: Option<String>,
        /// Category id
        #[arg(long)]
        category: Option<String>,
    },

    /// Delete a product
    Delete {
        /// Product id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(api_url) = cli.api_url {
        config.api.base_url = api_url;
    }

    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app = App::new(config)?;

    match cli.command {
        Commands::Login { email } => {
            if app.catalog.login(&email).await.is_err() {
                let snapshot = app.session.snapshot();
                let message = snapshot
                    .last_error
                    .as_deref()
                    .unwrap_or("Failed to authenticate. Please try again.");
                bail!("{}", message);
            }
            println!("Logged in as {}", email);
        }

        Commands::Logout => {
            app.session.logout();
            println!("Logged out");
        }

        Commands::Whoami => {
            let snapshot = app.session.snapshot();
            if snapshot.is_authenticated() {
                println!("{}", snapshot.email.as_deref().unwrap_or("<unknown>"));
            } else {
                println!("Not logged in");
            }
        }

        Commands::Categories => {
            let categories = app.catalog.categories().await?;
            for category in &categories {
                println!("{}  {}", category.id, category.name);
            }
            println!("{} categories", categories.len());
        }

        Commands::Products(command) => run_products(&app, command).await?,
    }

    Ok(())
}

async fn run_products(app: &App, command: ProductsCommands) -> Result<()> {
    match command {
        ProductsCommands::List { page, category } => {
            let limit = app.config.listing.page_limit;
            let offset = page.saturating_sub(1) * limit;
            let view = app
                .catalog
                .products_page(offset, limit, category.as_deref())
                .await?;
            print_page(&view, page);
        }

        ProductsCommands::Search { text } => {
            // The CLI has no keystrokes to debounce; search directly.
            let items = app.catalog.search(&text).await?;
            for product in &items {
                println!("{}  {}  {:.2}", product.slug, product.name, product.price);
            }
            println!("{} results for \"{}\"", items.len(), text);
        }

        ProductsCommands::Show { slug } => {
            let product = app.catalog.product_by_slug(&slug).await?;
            println!("{}", serde_json::to_string_pretty(&product)?);
        }

        ProductsCommands::Create {
            name,
            description,
            price,
            image,
            category,
        } => {
            let categories = app.catalog.categories().await?;
            let mut form = ProductForm::new(name, description, price, image, category);

            let draft = match form.submit(&categories) {
                Ok(draft) => draft,
                Err(errors) => {
                    for field in Field::ALL {
                        if let Some(message) = errors.get(&field) {
                            eprintln!("{:?}: {}", field, message);
                        }
                    }
                    bail!("Validation failed");
                }
            };

            let product = app.catalog.create_product(&draft).await?;
            println!("Created {} ({})", product.name, product.slug);
        }

        ProductsCommands::Update {
            id,
            name,
            description,
            price,
            image,
            category,
        } => {
            if let Some(name) = &name {
                forms::validate_name(name).map_err(anyhow::Error::msg)?;
            }
            if let Some(description) = &description {
                forms::validate_description(description).map_err(anyhow::Error::msg)?;
            }
            if let Some(price) = &price {
                forms::validate_price(price).map_err(anyhow::Error::msg)?;
            }
            if let Some(image) = &image {
                forms::validate_image_url(image).map_err(anyhow::Error::msg)?;
            }

            let patch = ProductPatch {
                name,
                description,
                images: image.map(|url| vec![url]),
                price: price.and_then(|p| p.parse().ok()),
                category_id: category,
            };

            let product = app.catalog.update_product(&id, &patch).await?;
            println!("Updated {} ({})", product.name, product.slug);
        }

        ProductsCommands::Delete { id } => match app.catalog.delete_product(&id).await {
            Ok(deleted) => println!("Deleted {}", deleted),
            Err(e) if e.is_auth() => bail!("Session expired, run `curatr login` and retry"),
            Err(e) => return Err(e.into()),
        },
    }

    Ok(())
}

fn print_page(page_data: &ProductPage, page: u32) {
    for product in &page_data.data {
        println!("{}  {}  {:.2}", product.slug, product.name, product.price);
    }
    let shown = page_data.offset + page_data.data.len() as u32;
    println!(
        "Page {} ({}-{} of {})",
        page,
        page_data.offset + 1,
        shown,
        page_data.total
    );
}
