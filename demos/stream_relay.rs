use std::env;
use std::process;

use camrelay::camera::Camera;
use camrelay::config::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use camrelay::tty::Tty;
use camrelay::{negotiate, supervisor, StreamConfig, StreamPipeline};
use tracing::info;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("camrelay=info".parse().unwrap()),
        )
        .init();

    let mut args = env::args().skip(1);
    let video = args.next().unwrap_or_else(|| "/dev/video0".to_string());
    let serial = args.next().unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    info!("Using device {} and serial link {}", video, serial);

    let mut cam = Camera::with_path(&video).expect("Failed to open video device");
    let tty = Tty::open(&serial, 115200).expect("Failed to open serial link");

    let fmt = match negotiate(&mut cam, Some((DEFAULT_WIDTH, DEFAULT_HEIGHT))) {
        Ok(fmt) => fmt,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let mut pipeline = match StreamPipeline::with_format(cam, tty, &fmt, StreamConfig::default()) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    // only returns once the stream broke down
    let e = supervisor::run(&mut pipeline);
    eprintln!("{} ({:?})", e, e.class());
    process::exit(2);
}
