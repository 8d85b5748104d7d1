//! Headless reading driver.
//!
//! Plays one reading the way a pointer-driven host would: frames on a fixed
//! interval, a swipe across the fan per pick, the card nearest the top of the
//! arc sent to its slot, then the reveal and the streamed interpretation.

use std::{
    io::Write,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use tokio::time::{Interval, MissedTickBehavior};

use arcana_config::ArcanaConfig;
use arcana_engine::{
    EffectTimer, Engine, EngineConfig, FanLayout, Phase, ReadingClient, ReadingStatus, Rect,
    SlotLabel,
};

const FRAME: Duration = Duration::from_millis(16);
const REVEAL_DURATION: Duration = Duration::from_millis(600);
const SWIPE_FRAMES: u32 = 6;
/// Pointer travel per pick, in pixels.
const SWIPE_OFFSETS: [f64; 3] = [-240.0, 380.0, -150.0];
const SLOT_GAP: f32 = 40.0;

const DESKTOP_VIEWPORT: (f32, f32) = (1280.0, 800.0);
const COMPACT_VIEWPORT: (f32, f32) = (400.0, 700.0);

pub struct ReadOptions {
    pub question: String,
    pub endpoint: String,
    pub seed: Option<u64>,
    pub compact: bool,
}

pub async fn run(config: &ArcanaConfig, options: ReadOptions) -> Result<()> {
    let (width, height) = if options.compact {
        COMPACT_VIEWPORT
    } else {
        DESKTOP_VIEWPORT
    };
    let engine_config = EngineConfig::from_section(config.engine.as_ref());
    if engine_config.require_question && options.question.trim().is_empty() {
        bail!("a question is required");
    }

    tracing::info!(endpoint = %options.endpoint, "Starting reading");
    let mut engine = Engine::new(
        engine_config,
        FanLayout::for_viewport(width, height),
        ReadingClient::new(options.endpoint),
    );
    if let Some(seed) = options.seed {
        engine = engine.with_seed(seed);
    }
    engine.set_question(options.question);
    if !engine.start() {
        bail!("reading could not start from {}", engine.phase());
    }

    let outcome = tokio::select! {
        result = play(&mut engine) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match outcome {
        Some(result) => result,
        None => {
            let received = engine
                .reset()
                .map_or(0, |stream| stream.text().len());
            eprintln!();
            bail!("reading cancelled after {received} bytes");
        }
    }
}

async fn play(engine: &mut Engine) -> Result<()> {
    let mut clock = FrameClock::new();

    clock
        .run_until(engine, |e| e.phase().is_selecting() && !e.is_shuffling())
        .await;

    for (slot, offset) in SlotLabel::ALL.into_iter().zip(SWIPE_OFFSETS) {
        swipe(engine, &mut clock, offset).await?;
        clock.run_until(engine, |e| !e.fan().is_flinging()).await;

        let id = engine.card_at_top().context("no card left to pick")?.id();
        let origin = engine
            .fan_card_geometry(id)
            .context("picked card is not on the fan")?;
        let destination = slot_geometry(engine.layout(), slot);
        engine.activate_card(id, origin, destination)?;
        clock.run_until(engine, |e| e.transfer().is_none()).await;

        let entry = engine
            .selection()
            .get(slot)
            .with_context(|| format!("{slot} slot was not filled"))?;
        println!(
            "{}: {} ({})",
            slot.title(),
            entry.card.display_name(),
            entry.orientation()
        );
    }
    println!();

    let mut reveal = EffectTimer::new(REVEAL_DURATION);
    while !reveal.is_finished() {
        let (_, delta) = clock.frame(engine).await;
        reveal.advance(delta);
    }
    for slot in SlotLabel::ALL {
        engine.slot_revealed(slot);
    }

    stream_reading(engine, &mut clock).await
}

async fn swipe(engine: &mut Engine, clock: &mut FrameClock, offset: f64) -> Result<()> {
    if !engine.begin_drag(0.0, Instant::now()) {
        bail!("fan is not accepting input in {}", engine.phase());
    }
    for step in 1..=SWIPE_FRAMES {
        let (now, _) = clock.frame(engine).await;
        engine.continue_drag(offset * f64::from(step) / f64::from(SWIPE_FRAMES), now);
    }
    let flinging = engine.end_drag();
    tracing::debug!(offset, flinging, angle = engine.fan().angle(), "Swipe released");
    Ok(())
}

async fn stream_reading(engine: &mut Engine, clock: &mut FrameClock) -> Result<()> {
    let mut printed = 0;
    loop {
        clock.frame(engine).await;
        let stream = engine.reading().context("reading did not start")?;

        let text = stream.text();
        if text.len() > printed {
            let mut stdout = std::io::stdout();
            stdout.write_all(&text.as_bytes()[printed..])?;
            stdout.flush()?;
            printed = text.len();
        }

        match stream.status() {
            ReadingStatus::Done => break,
            ReadingStatus::Error { message } => bail!("reading failed: {message}"),
            ReadingStatus::Cancelled => bail!("reading cancelled"),
            ReadingStatus::Pending | ReadingStatus::Streaming => {}
        }
    }
    println!();

    if engine.phase() != Phase::Revealed {
        tracing::warn!(phase = %engine.phase(), "Reading finished outside Revealed");
    }
    Ok(())
}

/// Slots sit in a row above the fan, centered on its pivot.
fn slot_geometry(layout: &FanLayout, slot: SlotLabel) -> Rect {
    let column = slot.index() as f32 - 1.0;
    Rect::new(
        column * (layout.card_width + SLOT_GAP),
        -2.0 * layout.card_height,
        layout.card_width,
        layout.card_height,
    )
}

struct FrameClock {
    interval: Interval,
    last: Instant,
}

impl FrameClock {
    fn new() -> Self {
        let mut interval = tokio::time::interval(FRAME);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            interval,
            last: Instant::now(),
        }
    }

    /// Wait for the next frame and tick the engine by the real elapsed time.
    async fn frame(&mut self, engine: &mut Engine) -> (Instant, Duration) {
        self.interval.tick().await;
        let now = Instant::now();
        let delta = now.saturating_duration_since(self.last);
        self.last = now;
        engine.tick(delta);
        (now, delta)
    }

    async fn run_until(&mut self, engine: &mut Engine, done: impl Fn(&Engine) -> bool) {
        while !done(engine) {
            self.frame(engine).await;
        }
    }
}
