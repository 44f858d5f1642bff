use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Restaurant menu server")]
struct Args {
    /// Overrides RUST_PORT
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    server::start_server(args.port).await?;

    Ok(())
}
