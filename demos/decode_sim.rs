//! Example: decode a simulated I2C capture
//!
//! Generates an address + data transaction, streams it through wire
//! channels the way a live capture source would, and prints the decoded
//! frames.
//!
//! Usage:
//!   cargo run --example decode_sim -- --address 0x50 --data 0x12,0x34
//!
//! With an enrichment process:
//!   cargo run --example decode_sim -- --address 0x50 --data 0x12 \
//!       --enrich "python3 my_enricher.py"

use clap::Parser;
use i2c_enrich::decode::{DecodeSession, I2cDecoder, MemorySink};
use i2c_enrich::enrich::EnrichmentBridge;
use i2c_enrich::signal::{wire_channel, Level};
use i2c_enrich::sim::{AckReply, WaveformBuilder};
use i2c_enrich::{AnalyzerConfig, FrameKind};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 7-bit target address
    #[arg(long, value_parser = parse_byte, default_value = "0x50")]
    address: u8,

    /// Comma-separated data bytes to write
    #[arg(long, value_delimiter = ',', value_parser = parse_byte, default_value = "0x12,0x34")]
    data: Vec<u8>,

    /// NAK the last data byte
    #[arg(long)]
    nak_last: bool,

    /// Clock period in samples
    #[arg(long, default_value = "40")]
    bit_period: u64,

    /// Enrichment command, e.g. "python3 enricher.py"
    #[arg(long)]
    enrich: Option<String>,
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("bad byte value '{s}': {e}"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = AnalyzerConfig::new(0, 1);
    if let Some(command) = &args.enrich {
        config = config.with_enrichment_command(command.clone());
    }
    config.validate()?;

    // Build the transaction: start, address (write), data bytes, stop
    let mut wave = WaveformBuilder::new(args.bit_period);
    wave.start();
    wave.byte(args.address << 1, AckReply::Ack);
    let last = args.data.len().saturating_sub(1);
    for (i, byte) in args.data.iter().enumerate() {
        let ack = if args.nak_last && i == last {
            AckReply::Nak
        } else {
            AckReply::Ack
        };
        wave.byte(*byte, ack);
    }
    wave.stop();

    let (sda_tx, sda_rx) = wire_channel(64, Level::High);
    let (scl_tx, scl_rx) = wire_channel(64, Level::High);

    let mut decoder = I2cDecoder::new(sda_rx, scl_rx, MemorySink::new());
    if let Some(command) = &config.enrichment_command {
        decoder = decoder.with_enrichment(EnrichmentBridge::start(command)?);
    }

    let session = DecodeSession::spawn(decoder);

    // stream the capture to the worker from this thread, both wires in
    // global sample order
    wave.feed_interleaved(&sda_tx, &scl_tx);

    let summary = session.join()?;

    info!("decoded {} frames in {} packet(s)", summary.frames.len(), summary.packets);
    for (i, frame) in summary.frames.iter().enumerate() {
        let rendered = match frame.kind {
            FrameKind::Address => format!(
                "address {} ({})",
                config.address_display.format_address(frame.value),
                if frame.value & 1 == 1 { "read" } else { "write" }
            ),
            FrameKind::Data => format!("data 0x{:02x}", frame.value),
        };
        info!(
            "frame {i}: {rendered} [{}..{}] ack={:?}",
            frame.start_sample, frame.end_sample, frame.ack
        );
    }
    info!("{} markers", summary.markers.len());

    Ok(())
}
