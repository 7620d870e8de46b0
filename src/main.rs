//! v4l2-grab binary: inspect a device and grab a few frames.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use log::{info, warn};
use v4l2_grab::{list_devices, Camera, FourCC, SessionConfig};

/// Inspect a V4L2 device and grab frames from it.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Device node to open.
    #[arg(short, long, default_value = "/dev/video0")]
    device: PathBuf,

    /// Pixel format as a four-character code.
    #[arg(short, long, default_value = "JPEG", value_parser = parse_fourcc)]
    format: FourCC,

    /// Requested frame width.
    #[arg(long, default_value_t = 1024)]
    width: u32,

    /// Requested frame height.
    #[arg(long, default_value_t = 768)]
    height: u32,

    /// Number of driver buffers.
    #[arg(short, long, default_value_t = 4)]
    buffers: u32,

    /// Number of frames to grab.
    #[arg(short = 'n', long, default_value_t = 10)]
    frames: u32,

    /// List video devices and exit.
    #[arg(short, long)]
    list: bool,
}

fn parse_fourcc(s: &str) -> Result<FourCC, String> {
    if s.is_empty() || s.len() > 4 || !s.is_ascii() {
        return Err(format!("'{s}' is not a four-character code"));
    }
    let mut code = [b' '; 4];
    for (dst, src) in code.iter_mut().zip(s.bytes()) {
        *dst = src;
    }
    Ok(FourCC::new(&code))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run(&Args::parse()) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> v4l2_grab::Result<()> {
    if args.list {
        for node in list_devices() {
            println!(
                "{}: {}",
                node.path.display(),
                node.name.as_deref().unwrap_or("<unknown>")
            );
        }
        return Ok(());
    }

    let config = SessionConfig::new(&args.device)
        .with_pixel_format(args.format)
        .with_size(args.width, args.height)
        .with_buffer_count(args.buffers);
    let mut camera = Camera::open(&config)?;

    println!("Device: {}", camera.card());
    println!("Driver: {}", camera.driver());
    println!("Bus:    {}", camera.bus_info());

    println!("Formats:");
    let formats: Vec<_> = camera.enumerate_formats()?.collect::<Result<_, _>>()?;
    for desc in &formats {
        println!("  {} {}", desc.pixel_format, desc.description);
        for size in camera.enumerate_frame_sizes(desc.pixel_format)? {
            match size {
                Ok(size) => println!("    {size:?}"),
                Err(err) => warn!("frame sizes for {}: {err}", desc.pixel_format),
            }
        }
    }

    let geometry = camera.geometry();
    println!(
        "Format: {}x{} {} ({} bytes/line, {} bytes/frame)",
        geometry.width,
        geometry.height,
        geometry.pixel_format,
        geometry.bytes_per_line,
        geometry.size_image
    );

    camera.stream_on()?;
    let started = Instant::now();
    for _ in 0..args.frames {
        let frame = camera.grab_frame()?;
        println!(
            "Frame {}: {} bytes, slot {}, timestamp: {:?}",
            frame.metadata.sequence,
            frame.len(),
            frame.metadata.index,
            frame.metadata.timestamp
        );
    }
    info!("grabbed {} frames in {:?}", args.frames, started.elapsed());

    camera.close()
}
