//! # Seed Data Generator
//!
//! Populates a store database with sample customers, products and sales
//! for development.
//!
//! ## Usage
//! ```bash
//! # Default amounts into ./store.db (or $MERCADO_DB_PATH)
//! cargo run -p mercado-db --bin seed
//!
//! # Custom amounts and path
//! cargo run -p mercado-db --bin seed -- --db ./data/store.db --customers 50 --products 200
//! ```
//!
//! ## Generated Data
//! - Customers: unique phone `555-NNNN` and email `customerN@example.com`
//! - Products: catalog names, prices $1.50 - $98.50, scattered around a
//!   market square, stock 0 - 40
//! - Transactions: seller and buyer always differ; `total_price` is
//!   `quantity * price`

use std::env;
use std::time::Instant;

use mercado_core::{NewCustomer, NewProduct, NewTransaction};
use mercado_db::{Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const FIRST_NAMES: &[&str] = &[
    "Ana", "Bruno", "Carla", "Diego", "Elena", "Fabio", "Gloria", "Hugo", "Ines", "Jorge",
    "Karen", "Luis", "Marta", "Nico", "Olga", "Pablo",
];

const PRODUCTS: &[&str] = &[
    "Brass Lamp",
    "Oak Chair",
    "Wool Blanket",
    "Clay Pot",
    "Bicycle Bell",
    "Leather Wallet",
    "Cotton Tote",
    "Vinyl Record",
    "Desk Fan",
    "Glass Vase",
    "Tin Lunchbox",
    "Road Map",
];

/// Market square the sample listings are scattered around.
const CENTER: (f64, f64) = (41.3851, 2.1734);

struct Options {
    db_path: Option<String>,
    customers: usize,
    products: usize,
    transactions: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let Some(options) = parse_args(env::args().skip(1).collect()) else {
        return Ok(());
    };

    let mut config = DbConfig::from_env()?;
    if let Some(path) = options.db_path {
        config.database_path = path.into();
    }

    println!("🌱 Mercado Seed Data Generator");
    println!("==============================");
    println!("Database:     {}", config.database_path.display());
    println!("Customers:    {}", options.customers);
    println!("Products:     {}", options.products);
    println!("Transactions: {}", options.transactions);
    println!();

    let db = Database::new(config).await?;
    println!("✓ Connected to database");
    println!("✓ Schema ready");

    let existing = db.customers().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} customers", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = Instant::now();

    let customers: Vec<NewCustomer> = (0..options.customers).map(generate_customer).collect();
    let customer_ids = db.customers().insert_many(&customers).await?;
    info!(count = customer_ids.len(), "Customers inserted");

    let products: Vec<NewProduct> = (0..options.products).map(generate_product).collect();
    let product_ids = db.products().insert_many(&products).await?;
    info!(count = product_ids.len(), "Products inserted");

    let transactions = if customer_ids.len() < 2 || product_ids.is_empty() {
        warn!("Need at least two customers and one product to record sales");
        Vec::new()
    } else {
        (0..options.transactions)
            .map(|i| generate_transaction(i, &customer_ids, &product_ids, &products))
            .collect()
    };
    let transaction_ids = db.transactions().insert_many(&transactions).await?;
    info!(count = transaction_ids.len(), "Transactions inserted");

    println!();
    println!(
        "✓ Inserted {} customers, {} products, {} transactions in {:?}",
        customer_ids.len(),
        product_ids.len(),
        transaction_ids.len(),
        start.elapsed()
    );

    db.close().await;
    println!("✓ Seed complete!");

    Ok(())
}

/// Returns `None` when only help was requested.
fn parse_args(args: Vec<String>) -> Option<Options> {
    let mut options = Options {
        db_path: None,
        customers: 20,
        products: 60,
        transactions: 100,
    };

    let mut i = 0;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--db" | "-d", Some(v)) => {
                options.db_path = Some(v.clone());
                i += 1;
            }
            ("--customers", Some(v)) => {
                options.customers = v.parse().unwrap_or(options.customers);
                i += 1;
            }
            ("--products", Some(v)) => {
                options.products = v.parse().unwrap_or(options.products);
                i += 1;
            }
            ("--transactions", Some(v)) => {
                options.transactions = v.parse().unwrap_or(options.transactions);
                i += 1;
            }
            ("--help" | "-h", _) => {
                println!("Mercado Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>          Database file (default: $MERCADO_DB_PATH or ./store.db)");
                println!("      --customers <N>      Customers to create (default: 20)");
                println!("      --products <N>       Products to create (default: 60)");
                println!("      --transactions <N>   Sales to record (default: 100)");
                println!("  -h, --help               Show this help message");
                return None;
            }
            (other, _) => eprintln!("Ignoring unknown argument: {}", other),
        }
        i += 1;
    }

    Some(options)
}

/// `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mercado=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn generate_customer(seed: usize) -> NewCustomer {
    let first = FIRST_NAMES[seed % FIRST_NAMES.len()];
    NewCustomer::new(format!("{} {}", first, seed + 1), format!("555-{:04}", seed))
        .email(format!("customer{}@example.com", seed + 1))
}

fn generate_product(seed: usize) -> NewProduct {
    let name = PRODUCTS[seed % PRODUCTS.len()];
    let price = 1.5 + ((seed * 37) % 98) as f64;

    // Up to ~0.02 degrees either way
    let lat = CENTER.0 + (((seed * 13) % 41) as f64 - 20.0) / 1000.0;
    let lon = CENTER.1 + (((seed * 29) % 41) as f64 - 20.0) / 1000.0;

    let product = NewProduct::new(format!("{} #{}", name, seed + 1), price, lat, lon)
        .stock_quantity((seed % 41) as i64);

    if seed % 3 == 0 {
        product.description(format!("Hand-picked {}", name.to_lowercase()))
    } else {
        product
    }
}

fn generate_transaction(
    seed: usize,
    customer_ids: &[i64],
    product_ids: &[i64],
    products: &[NewProduct],
) -> NewTransaction {
    let seller = seed % customer_ids.len();
    let buyer = (seller + 1 + seed % (customer_ids.len() - 1)) % customer_ids.len();
    let product = (seed * 7) % product_ids.len();
    let quantity = (seed % 4 + 1) as i64;
    let price = products[product].price.unwrap_or_default();

    NewTransaction::new(
        customer_ids[seller],
        customer_ids[buyer],
        product_ids[product],
        quantity,
        price * quantity as f64,
    )
}
