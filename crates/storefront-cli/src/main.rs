// ============================================================================
// storefront - command-line shop front for the product catalog
// ============================================================================
// Usage:
//   storefront products [--search TEXT] [--category ID] [--pages N]
//   storefront categories
//   storefront cart show|add <id>|remove <id>|set <id> <qty>|clear|checkout
//   storefront shop                          Interactive browsing session
// ============================================================================

use anyhow::{anyhow, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use storefront_core::{
    format_price, BrowseSnapshot, BrowseView, CartSnapshot, CatalogClient, CategoryId,
    CheckoutReceipt, Intent, IntentOutcome, MemoryKv, PageOutcome, Storefront, StorefrontConfig,
};

/// Storefront catalog and cart client
#[derive(Parser)]
#[command(name = "storefront", version, about = "Browse the product catalog and manage your cart")]
struct Cli {
    /// Path to the database file (default: ~/.storefront/storefront.redb)
    #[arg(long, global = true)]
    db_path: Option<String>,

    /// Catalog API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Keep the cart in memory only
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List products
    Products {
        /// Title search
        #[arg(long)]
        search: Option<String>,

        /// Category id, or "all"
        #[arg(long, default_value = "all")]
        category: CategoryId,

        /// Number of pages to fetch
        #[arg(long, default_value = "1")]
        pages: usize,
    },

    /// List product categories
    Categories,

    /// Inspect or change the cart
    Cart {
        #[command(subcommand)]
        action: CartCommand,
    },

    /// Interactive session: search, filter, scroll and shop
    Shop,
}

#[derive(Subcommand)]
enum CartCommand {
    Show,
    /// Add one unit of a product
    Add { id: u64 },
    Remove { id: u64 },
    /// Set a line's quantity (0 or less removes it)
    Set {
        id: u64,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    Clear,
    Checkout,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal; real env vars still apply
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,storefront_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = open_session(&cli)?;

    match cli.command {
        Commands::Products {
            search,
            category,
            pages,
        } => cmd_products(&store, search.as_deref().unwrap_or(""), category, pages).await,
        Commands::Categories => cmd_categories(&store).await,
        Commands::Cart { action } => cmd_cart(&store, action).await,
        Commands::Shop => cmd_shop(&store).await,
    }
}

fn open_session(cli: &Cli) -> Result<Storefront> {
    let mut config = StorefrontConfig::from_env()?;
    if let Some(url) = &cli.api_url {
        config.api_url = url.trim_end_matches('/').to_string();
    }
    if let Some(path) = &cli.db_path {
        config.db_path = Some(path.clone());
    }

    if cli.ephemeral {
        config.validate()?;
        info!("Ephemeral session, cart will not be saved");
        let catalog = CatalogClient::from_config(&config);
        return Ok(Storefront::new(
            config,
            Arc::new(catalog),
            Arc::new(MemoryKv::new()),
        ));
    }

    Storefront::open(config)
}

// ============================================================================
// One-shot commands
// ============================================================================

async fn cmd_products(
    store: &Storefront,
    search: &str,
    category: CategoryId,
    pages: usize,
) -> Result<()> {
    let mut outcome = store.apply_filters(search, category).await;
    for _ in 1..pages {
        if !matches!(outcome, PageOutcome::Applied { has_more: true, .. }) {
            break;
        }
        outcome = match store.dispatch(Intent::LoadMore).await {
            IntentOutcome::Page(outcome) => outcome,
            _ => break,
        };
    }

    let snapshot = store.browse_snapshot().await;
    print_products(&snapshot);
    if let Some(error) = &snapshot.error {
        return Err(anyhow!("Failed to load products: {}", error));
    }
    Ok(())
}

async fn cmd_categories(store: &Storefront) -> Result<()> {
    store.load_categories().await;
    let snapshot = store.browse_snapshot().await;

    if let Some(error) = &snapshot.category_error {
        return Err(anyhow!("Failed to load categories: {}", error));
    }
    println!("{:<8}  {}", "ID", "NAME");
    println!("{}", "-".repeat(40));
    for category in &snapshot.categories {
        println!("{:<8}  {}", category.id.to_string(), category.name);
    }
    Ok(())
}

async fn cmd_cart(store: &Storefront, action: CartCommand) -> Result<()> {
    match action {
        CartCommand::Show => {}
        CartCommand::Add { id } => {
            add_by_id(store, id).await?;
        }
        CartCommand::Remove { id } => {
            store.dispatch(Intent::RemoveFromCart(id)).await;
        }
        CartCommand::Set { id, quantity } => {
            store.dispatch(Intent::SetQuantity { id, quantity }).await;
        }
        CartCommand::Clear => {
            store.dispatch(Intent::ClearCart).await;
        }
        CartCommand::Checkout => {
            checkout(store).await;
            return Ok(());
        }
    }

    print_cart(&store.cart_snapshot());
    Ok(())
}

async fn add_by_id(store: &Storefront, id: u64) -> Result<()> {
    let listed = store
        .browse_snapshot()
        .await
        .items
        .into_iter()
        .find(|p| p.id == id);
    let product = match listed {
        Some(product) => product,
        None => store
            .product(id)
            .await
            .map_err(|e| anyhow!("Failed to fetch product {}: {}", id, e))?,
    };

    println!("Added {} to cart", product.title);
    store.dispatch(Intent::AddToCart(product)).await;
    Ok(())
}

async fn checkout(store: &Storefront) {
    match store.dispatch(Intent::Checkout).await {
        IntentOutcome::CheckedOut(receipt) => print_receipt(&receipt),
        _ => println!("Cart is empty, nothing to check out."),
    }
}

// ============================================================================
// Interactive session
// ============================================================================

const SHOP_HELP: &str = "\
Commands:
  search <text>     filter by title (empty clears)
  category <id|all> filter by category
  more              load the next page
  add <id>          add a product to the cart
  remove <id>       remove a cart line
  qty <id> <n>      set a line's quantity
  cart              show the cart
  clear             empty the cart
  checkout          check out
  retry             retry a failed load
  quit";

async fn cmd_shop(store: &Storefront) -> Result<()> {
    store.start().await;
    let snapshot = store.browse_snapshot().await;
    print_categories_line(&snapshot);
    print_products(&snapshot);
    println!("\n{}", SHOP_HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt(&store.cart_snapshot());
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let rest: Vec<&str> = words.collect();

        match (command, rest.as_slice()) {
            ("quit" | "exit" | "q", _) => break,
            ("help" | "?", _) => println!("{}", SHOP_HELP),
            ("search", text) => {
                store.dispatch(Intent::SearchChanged(text.join(" "))).await;
                store.settle_search().await;
                print_products(&store.browse_snapshot().await);
            }
            ("category", [id]) => match id.parse::<CategoryId>() {
                Ok(category) => {
                    store.dispatch(Intent::CategorySelected(category)).await;
                    print_products(&store.browse_snapshot().await);
                }
                Err(e) => println!("{}", e),
            },
            ("more", _) => match store.dispatch(Intent::LoadMore).await {
                IntentOutcome::Page(_) => print_products(&store.browse_snapshot().await),
                _ => println!("No more products."),
            },
            ("retry", _) => {
                store.dispatch(Intent::Retry).await;
                print_products(&store.browse_snapshot().await);
            }
            ("add", [id]) => match id.parse::<u64>() {
                Ok(id) => {
                    if let Err(e) = add_by_id(store, id).await {
                        println!("{}", e);
                    }
                }
                Err(_) => println!("Invalid product id: {}", id),
            },
            ("remove", [id]) => match id.parse::<u64>() {
                Ok(id) => {
                    store.dispatch(Intent::RemoveFromCart(id)).await;
                    print_cart(&store.cart_snapshot());
                }
                Err(_) => println!("Invalid product id: {}", id),
            },
            ("qty", [id, quantity]) => match (id.parse::<u64>(), quantity.parse::<i64>()) {
                (Ok(id), Ok(quantity)) => {
                    store.dispatch(Intent::SetQuantity { id, quantity }).await;
                    print_cart(&store.cart_snapshot());
                }
                _ => println!("Usage: qty <id> <n>"),
            },
            ("cart", _) => print_cart(&store.cart_snapshot()),
            ("clear", _) => {
                store.dispatch(Intent::ClearCart).await;
                print_cart(&store.cart_snapshot());
            }
            ("checkout", _) => checkout(store).await,
            _ => println!("Unknown command '{}'. Type 'help' for commands.", line.trim()),
        }
    }

    Ok(())
}

// ============================================================================
// Output
// ============================================================================

fn print_prompt(cart: &CartSnapshot) {
    use std::io::Write;

    print!("[cart: {} | {}] > ", cart.item_count, format_price(cart.total));
    let _ = std::io::stdout().flush();
}

fn print_categories_line(snapshot: &BrowseSnapshot) {
    let names: Vec<String> = snapshot
        .categories
        .iter()
        .map(|c| format!("{} ({})", c.name, c.id))
        .collect();
    if !names.is_empty() {
        println!("Categories: {}", names.join(", "));
    }
}

fn print_products(snapshot: &BrowseSnapshot) {
    match &snapshot.view {
        BrowseView::Loading => {
            println!("Loading...");
            return;
        }
        BrowseView::Failed(message) => {
            println!("Could not load products: {} (type 'retry')", message);
            return;
        }
        BrowseView::Empty => {
            println!("No products found.");
            return;
        }
        BrowseView::Results => {}
    }

    println!("{:<6}  {:<40}  {:>10}  {}", "ID", "TITLE", "PRICE", "CATEGORY");
    println!("{}", "-".repeat(76));
    for product in &snapshot.items {
        let title = product.title.chars().take(40).collect::<String>();
        println!(
            "{:<6}  {:<40}  {:>10}  {}",
            product.id,
            title,
            format_price(product.price),
            product.category.name
        );
    }

    let more = if snapshot.has_more { ", more available" } else { "" };
    println!("\nShowing {} products{}", snapshot.items.len(), more);
    if let Some(error) = &snapshot.error {
        println!("Last page failed: {} (type 'retry')", error);
    }
}

fn print_cart(cart: &CartSnapshot) {
    if cart.items.is_empty() {
        println!("Your cart is empty.");
        return;
    }

    println!("{:<6}  {:<32}  {:>4}  {:>10}", "ID", "ITEM", "QTY", "SUBTOTAL");
    println!("{}", "-".repeat(60));
    for item in &cart.items {
        let title = item.title.chars().take(32).collect::<String>();
        println!(
            "{:<6}  {:<32}  {:>4}  {:>10}",
            item.id,
            title,
            item.quantity,
            format_price(item.line_total())
        );
    }
    println!("{}", "-".repeat(60));
    println!("{} items, total {}", cart.item_count, format_price(cart.total));
}

fn print_receipt(receipt: &CheckoutReceipt) {
    let when = Utc
        .timestamp_opt(receipt.completed_at, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("(invalid: {})", receipt.completed_at));

    println!("=== Order placed {} ===", when);
    println!(
        "{} items across {} products, total {}",
        receipt.item_count,
        receipt.lines,
        format_price(receipt.total)
    );
    println!("Thank you for your purchase!");
}
