use anyhow::{anyhow, Context};
use bookoo_link::brew::{format_ratio, BrewTarget, TimerCycle};
use bookoo_link::sim::{SimulatedScale, SimulatedTransport};
use bookoo_link::system::drain;
use bookoo_link::{Command, Reading, ScaleConfig, ScaleSession, SessionEvent, SessionEventChannel};
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use log::{error, info, warn};
use std::sync::Arc;

const CONFIG_ENV: &str = "BOOKOO_CONFIG";
const DEMO_DOSE_G: f32 = 18.0;
const DEMO_TARGET_G: f32 = 36.0;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting Bookoo scale demo against a simulated scale");

    let code = match run(spawner).await {
        Ok(()) => 0,
        Err(e) => {
            error!("Demo failed: {:#}", e);
            1
        }
    };

    // The std executor never returns from its run loop
    std::process::exit(code);
}

fn load_config() -> anyhow::Result<ScaleConfig> {
    let Ok(path) = std::env::var(CONFIG_ENV) else {
        return Ok(ScaleConfig::default());
    };
    let json = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
    let config = ScaleConfig::from_json(&json).with_context(|| format!("parsing {}", path))?;
    info!("Loaded scale config from {}", path);
    Ok(config)
}

async fn run(spawner: Spawner) -> anyhow::Result<()> {
    let config = load_config()?;
    let events = Arc::new(SessionEventChannel::new());
    let (transport, scale) = SimulatedTransport::with_bookoo();
    let mut session = ScaleSession::with_profile(transport, config.gatt_profile(), Arc::clone(&events));

    session
        .connect(&config.device_filter())
        .await
        .context("connecting to scale")?;

    for command in &config.startup_commands {
        session.send(*command).await.context("sending startup command")?;
    }

    let target = BrewTarget {
        dose_g: Some(DEMO_DOSE_G),
        target_g: Some(DEMO_TARGET_G),
    };
    let mut timer = TimerCycle::default();

    session.tare_and_start().await?;
    timer = timer.after(Command::TareAndStart);

    spawner
        .spawn(simulate_brew(scale))
        .map_err(|e| anyhow!("failed to spawn brew simulation: {:?}", e))?;

    loop {
        session.next_link_event().await?;

        for event in drain(&events) {
            println!("{}", serde_json::to_string(&event)?);

            if let SessionEvent::Data { reading } = event {
                if timer == TimerCycle::Running && target.reached(&reading) {
                    let (command, next) = timer.press();
                    session.send(command).await?;
                    timer = next;
                    info!("Target of {:.1}g reached at {:.1}s", DEMO_TARGET_G, reading.elapsed_ms as f32 / 1000.0);
                }
            }
        }

        if !session.is_connected() {
            break;
        }
    }

    match session.last_reading() {
        Some(reading) => {
            let progress = target.progress(reading);
            let ratio = progress.ratio.map(format_ratio).unwrap_or_else(|| "-".to_string());
            info!("Final weight {:.1}g, ratio {}", reading.weight_g, ratio);
        }
        None => warn!("No readings received before the scale went away"),
    }

    Ok(())
}

/// Plays a short shot into the simulated scale, then drops the link.
#[embassy_executor::task]
async fn simulate_brew(scale: SimulatedScale) {
    let mut weight_g = 0.0f32;
    let mut tick = 0u32;

    while weight_g < DEMO_TARGET_G + 1.5 {
        // Pre-infusion for the first second, then a steady 2 g/s
        let flow = if tick < 10 { 0.0 } else { 2.0 };
        weight_g += flow / 10.0;

        let reading = Reading {
            elapsed_ms: tick * 100,
            weight_g,
            flow_rate_g_per_s: flow,
            battery_percent: 87,
            standby_minutes: 5,
            buzzer_level: 2,
            flow_smoothing: false,
            weight_unit: 0,
            weight_sign: 0,
            flow_sign: 0,
        };
        if !scale.push_reading(&reading) {
            warn!("Link queue full - dropping reading at tick {}", tick);
        }

        tick += 1;
        Timer::after(Duration::from_millis(20)).await;
    }

    scale.drop_link();
}
