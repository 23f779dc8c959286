use std::io::{self, BufRead, Write};
use std::net::SocketAddr;

use anyhow::Context as _;
use clap::Parser;
use inventory::menu::{render_listing, render_product, render_status, MenuChoice, Prompter};
use inventory::*;
use tarpc::client::RpcError;
use tarpc::tokio_serde::formats::Json;
use tarpc::{client, context};

#[derive(Parser)]
#[command(name = "inventory-client", about = "Menu-driven client for the inventory server")]
struct Cli {
    /// Inventory server to connect to.
    #[arg(long, default_value = "[::1]:50051", env = "INVENTORY_SERVER")]
    server: SocketAddr,

    /// Log level for client diagnostics.
    #[arg(long, default_value = "warn", env = "INVENTORY_LOG_LEVEL")]
    log_level: String,
}

/// Runs one menu action. `Ok(None)` means the user wants to quit.
async fn run<R: BufRead, W: Write>(
    client: &InventoryServiceClient,
    prompter: &mut Prompter<R, W>,
    choice: MenuChoice,
) -> anyhow::Result<Option<String>> {
    let title = match choice {
        MenuChoice::AddProduct => {
            let Some(id) = prompter.read::<i64>("Product ID")? else {
                return Ok(None);
            };
            let Some(name) = prompter.read::<String>("Product Name")? else {
                return Ok(None);
            };
            let Some(quantity) = prompter.read::<i64>("Product Quantity")? else {
                return Ok(None);
            };
            let Some(price) = prompter.read::<f64>("Product Price")? else {
                return Ok(None);
            };
            writeln!(prompter.output(), "Processing...")?;
            let product = Product::new(id, name, quantity, price);
            render_status(&client.add_product(context::current(), product).await?)
        }
        MenuChoice::FindById => {
            let Some(id) = prompter.read::<i64>("Product ID")? else {
                return Ok(None);
            };
            writeln!(prompter.output(), "Processing...")?;
            let request = ProductIdentifier {
                product_identifier: id,
            };
            let product = client.get_product_by_id(context::current(), request).await?;
            render_product(id, &product, false)
        }
        MenuChoice::UpdateQuantity => {
            let Some(id) = prompter.read::<i64>("Product ID")? else {
                return Ok(None);
            };
            let Some(quantity) = prompter.read::<i64>("Product Quantity")? else {
                return Ok(None);
            };
            writeln!(prompter.output(), "Processing...")?;
            let request = Quantity {
                product_identifier: id,
                product_quantity: quantity,
            };
            let product = client
                .update_product_quantity(context::current(), request)
                .await?;
            render_product(id, &product, true)
        }
        MenuChoice::DeleteProduct => {
            let Some(id) = prompter.read::<i64>("Product ID")? else {
                return Ok(None);
            };
            writeln!(prompter.output(), "Processing...")?;
            let request = ProductIdentifier {
                product_identifier: id,
            };
            render_status(&client.delete_product(context::current(), request).await?)
        }
        MenuChoice::FindAll => {
            writeln!(prompter.output(), "Processing get all...")?;
            let products = client.get_all_products(context::current()).await?;
            writeln!(prompter.output(), "{}", render_listing(&products))?;
            match prompter.confirm("Make another request? [Y/n]")? {
                Some(true) => String::new(),
                _ => return Ok(None),
            }
        }
        MenuChoice::Quit => return Ok(None),
    };
    Ok(Some(title))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(&cli.log_level);

    // Ctrl+C anywhere in the menu is a normal exit.
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(0);
        }
    });

    let transport = tarpc::serde_transport::tcp::connect(cli.server, Json::default)
        .await
        .with_context(|| format!("failed to connect to {}", cli.server))?;
    let client = InventoryServiceClient::new(client::Config::default(), transport).spawn();

    // Terminal reads block, so the menu runs off the async workers and
    // re-enters the runtime for each call.
    let runtime = tokio::runtime::Handle::current();
    tokio::task::spawn_blocking(move || {
        let mut prompter = Prompter::new(io::stdin().lock(), io::stdout());
        menu_loop(&runtime, &client, &mut prompter)
    })
    .await
    .context("menu task panicked")?
}

/// Blocking menu loop; must not run on an async worker thread.
fn menu_loop<R: BufRead, W: Write>(
    runtime: &tokio::runtime::Handle,
    client: &InventoryServiceClient,
    prompter: &mut Prompter<R, W>,
) -> anyhow::Result<()> {
    let mut title = String::new();

    while let Some(choice) = prompter.choose(&title)? {
        title = match runtime.block_on(run(client, prompter, choice)) {
            Ok(Some(title)) => title,
            Ok(None) => break,
            Err(e) if e.downcast_ref::<RpcError>().is_some() => {
                tracing::warn!(error = %e, "request did not reach the server");
                format!("Received: Server failure. ({e})")
            }
            Err(e) => return Err(e),
        };
    }

    Ok(())
}
