use tippinserver::{config::TippinConfig, init_tracing, run_server, Tippin};

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let tippin = Tippin::builder()
        .with_config(TippinConfig::read_config_with_defaults())
        .build()
        .await?;

    run_server(tippin).await
}
