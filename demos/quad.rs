use std::path::PathBuf;

use kiln::{
    app::{App, AppConfig},
    kiln_vulkan::constants::ENABLE_VALIDATION_LAYERS,
};
use log::LevelFilter;

/// Usage: `cargo run --example quad [VERTEX_SPV] [FRAGMENT_SPV]`
fn main() -> anyhow::Result<()> {
    let level = if ENABLE_VALIDATION_LAYERS {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    };
    simple_logger::SimpleLogger::new()
        .with_level(level)
        .env()
        .init()?;

    let mut args = std::env::args_os().skip(1);
    let mut config = AppConfig::default();
    if let Some(vertex_shader) = args.next() {
        config.vertex_shader = PathBuf::from(vertex_shader);
    }
    if let Some(fragment_shader) = args.next() {
        config.fragment_shader = PathBuf::from(fragment_shader);
    }

    if let Err(err) = App::new(config).and_then(|mut app| app.run()) {
        let err = anyhow::Error::from(err);
        log::error!("{:#}", err);
        return Err(err);
    }

    Ok(())
}
