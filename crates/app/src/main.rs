use clap::Parser;
use num_complex::Complex32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sw_client::{MessageLevel, RtlTcpClient, SessionEvent};

#[derive(Parser, Debug)]
#[command(name = "skywave")]
#[command(about = "Stream IQ samples from a remote rtl_tcp server")]
struct Cli {
    /// rtl_tcp server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// rtl_tcp server port
    #[arg(short, long, default_value = "1234")]
    port: u16,

    /// Center frequency in MHz
    #[arg(short = 'c', long, default_value = "222.064")]
    frequency: f64,

    /// Initial tuner gain index
    #[arg(short, long, default_value = "6")]
    gain: u16,

    /// Enable software AGC
    #[arg(short, long)]
    agc: bool,

    /// Capture duration in seconds (0 = run until interrupted)
    #[arg(short, long, default_value = "0")]
    duration: u64,

    /// Print once-per-second stream statistics
    #[arg(long)]
    stats: bool,
}

fn report(event: &SessionEvent) {
    match event.level {
        MessageLevel::Error => log::error!("{}", event.text),
        MessageLevel::Information => log::info!("{}", event.text),
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let client = RtlTcpClient::new();
    client.set_server_address(&cli.host);
    client.set_port(cli.port);
    client.set_frequency((cli.frequency * 1e6) as i32);
    client.set_gain(cli.gain);
    client.set_agc(cli.agc);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        eprintln!("\ninterrupted, stopping...");
        r.store(false, Ordering::SeqCst);
    })
    .expect("failed to set Ctrl-C handler");

    let events = client.events();
    if !client.restart() {
        for event in events.try_iter() {
            report(&event);
        }
        eprintln!("error: no connection to {}:{}", cli.host, cli.port);
        std::process::exit(1);
    }
    log::info!("{}", client.description());

    let start = Instant::now();
    let mut buf = vec![Complex32::default(); 16384];
    let mut total: u64 = 0;
    let mut window: u64 = 0;
    let mut power_acc: f64 = 0.0;
    let mut last_stats = Instant::now();

    while running.load(Ordering::SeqCst) && client.is_running() {
        if cli.duration > 0 && start.elapsed().as_secs() >= cli.duration {
            break;
        }

        for event in events.try_iter() {
            report(&event);
        }

        let n = client.read_samples(&mut buf);
        if n == 0 {
            std::thread::sleep(Duration::from_millis(10));
            continue;
        }
        total += n as u64;
        window += n as u64;
        for s in &buf[..n] {
            power_acc += s.norm_sqr() as f64;
        }

        if cli.stats && last_stats.elapsed().as_secs() >= 1 {
            let mean = power_acc / window.max(1) as f64;
            let power_db = 10.0 * (mean + 1e-12).log10();
            eprintln!(
                "[{:7.1}s] {:>8} samp/s  power {:6.1} dB  gain {:4.1} dB  tuner {}  pending {}",
                start.elapsed().as_secs_f64(),
                window,
                power_db,
                client.gain(),
                client.tuner_type(),
                client.samples_to_read(),
            );
            window = 0;
            power_acc = 0.0;
            last_stats = Instant::now();
        }
    }

    client.stop();
    for event in events.try_iter() {
        report(&event);
    }
    log::info!("stopped after {} samples", total);
}
