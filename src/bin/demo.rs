use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, ValueEnum};
use tracing::info;

use modbus_client::{ClientConfig, ModbusClient, ModbusMessage};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct CommonArgs {
    /// Path to the config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dump default config and exit
    #[arg(long = "dump-default-config")]
    dump_default: bool,

    /// Which transport to exercise
    #[arg(long, value_enum, default_value_t = Transport::Tcp)]
    transport: Transport,

    /// Unit/server id to address
    #[arg(long, default_value_t = 1)]
    server_id: u8,

    /// Starting register address
    #[arg(long, default_value_t = 0)]
    address: u16,

    /// Number of holding registers to read
    #[arg(long, default_value_t = 4)]
    quantity: u16,
}

#[derive(Clone, Copy, ValueEnum)]
enum Transport {
    Tcp,
    Rtu,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.common.dump_default {
        let config = ClientConfig::default();
        println!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    let config = match &cli.common.config {
        Some(path) => ClientConfig::from_file(path.to_str().expect("config path must be valid UTF-8"))?,
        None => ClientConfig::new()?,
    };

    modbus_client::setup_logging(&config.logging)?;

    let client = match cli.common.transport {
        Transport::Tcp => {
            info!(target = %config.tcp.target_description(), "connecting over Modbus TCP");
            ModbusClient::connect_tcp(&config)
        }
        Transport::Rtu => {
            info!(device = %config.rtu.device, "opening Modbus RTU link");
            ModbusClient::connect_rtu(&config)?
        }
    };

    let mut request = ModbusMessage::empty();
    request.push_u8(cli.common.server_id);
    request.push_u8(0x03); // read holding registers
    request.push_u16(cli.common.address);
    request.push_u16(cli.common.quantity);

    match client.sync_request(0x01, request, Some(Duration::from_secs(10))).await {
        Ok(response) if response.get_error().is_success() => {
            let registers: Vec<u16> = response.data()[3..]
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            info!(?registers, "read holding registers succeeded");
        }
        Ok(response) => eprintln!("request failed: {}", response.get_error()),
        Err(err) => eprintln!("request failed: {err}"),
    }

    info!(
        messages = client.get_message_count(),
        errors = client.get_error_count(),
        "demo run complete"
    );

    client.stop().await;
    Ok(())
}
