//! # Guitar Tuner GUI
//!
//! Desktop front end for the guitar tuner. It shows the detected string, its
//! frequency, a cent meter and tuning guidance, and lets the player lock the
//! comparison onto one string.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application with dark theme
//! - **Processing Thread**: owned by `tuner_core::Tuner` (capture + analysis)
//! - **Communication**: readings arrive over a crossbeam channel; the tuning
//!   mode is pushed through the tuner's control surface
//! - **Updates**: 60 FPS polling via the subscription system

mod ui;

use anyhow::anyhow;
use clap::Parser;
use crossbeam_channel::Receiver;
use iced::{Element, Size, Subscription, Task, Theme, window};
use log::{error, info};
use std::path::PathBuf;
use std::time::Duration;
use tuner_core::audio::CpalCapture;
use tuner_core::{Tuner, TunerConfig, TuningMode, TuningReading};
use ui::main_display::create_main_view;

/// Command line options.
#[derive(Debug, Parser)]
#[command(name = "guitar-tuner", version, about = "Real-time guitar tuner")]
struct Args {
    /// JSON configuration file; missing fields use their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Initial target: Auto, E2, A2, D3, G3, B3 or E4
    #[arg(long, default_value = tuner_core::tuning::AUTO)]
    target: String,

    /// Print the default configuration as JSON and exit
    #[arg(long)]
    print_default_config: bool,
}

/// Main entry point for the guitar tuner.
pub fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.print_default_config {
        println!("{}", serde_json::to_string_pretty(&TunerConfig::default())?);
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => TunerConfig::load(path)?,
        None => TunerConfig::default(),
    };
    let initial_mode = TuningMode::from_selection(&args.target).ok_or_else(|| {
        anyhow!(
            "unknown target {:?}; expected Auto, E2, A2, D3, G3, B3 or E4",
            args.target
        )
    })?;

    info!("Starting guitar tuner...");
    iced::application("Guitar Tuner", TunerApp::update, TunerApp::view)
        .subscription(TunerApp::subscription)
        .theme(TunerApp::theme)
        .window(window::Settings {
            size: Size::new(400.0, 600.0),
            exit_on_close_request: false,
            ..window::Settings::default()
        })
        .run_with(move || TunerApp::new(config, initial_mode))
        .map_err(|e| anyhow!("GUI error: {e}"))?;
    info!("Application finished");
    Ok(())
}

/// Application message types.
#[derive(Debug, Clone)]
pub enum Message {
    /// User picked Auto or a string in the mode selector
    TargetSelected(TuningMode),
    /// Timer tick for polling readings
    Tick,
    /// The window's close button was pressed
    CloseRequested(window::Id),
}

/// Data the UI needs for rendering.
#[derive(Debug, Clone)]
pub struct AppDisplayData {
    pub last_reading: Option<TuningReading>,
    pub tuning_mode: TuningMode,
    pub audio_error: Option<String>,
    pub shutting_down: bool,
}

/// Main application state.
struct TunerApp {
    tuner: Option<Tuner>,
    readings: Receiver<TuningReading>,
    display_data: AppDisplayData,
}

impl TunerApp {
    /// Starts the processing thread and builds the initial state.
    ///
    /// A capture that fails to open is shown in the window; the tuner stays
    /// idle.
    fn new(config: TunerConfig, initial_mode: TuningMode) -> (Self, Task<Message>) {
        // At most one reading in flight; a full channel drops the new one.
        let (reading_tx, reading_rx) = crossbeam_channel::bounded(1);
        let mut display_data = AppDisplayData {
            last_reading: None,
            tuning_mode: initial_mode,
            audio_error: None,
            shutting_down: false,
        };

        let tuner = match Tuner::start(&config, CpalCapture::open, reading_tx) {
            Ok(tuner) => {
                info!("Audio capture running at {} Hz", tuner.sample_rate());
                tuner.target_selector().set(initial_mode);
                Some(tuner)
            }
            Err(e) => {
                error!("Fatal error starting audio: {:#}", e);
                display_data.audio_error = Some(format!("{e:#}"));
                None
            }
        };

        let app = Self {
            tuner,
            readings: reading_rx,
            display_data,
        };
        (app, Task::none())
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::TargetSelected(mode) => {
                self.display_data.tuning_mode = mode;
                if let Some(tuner) = &self.tuner {
                    if let Err(e) = tuner.set_manual_target(mode.label()) {
                        error!("{}", e);
                    }
                }
                Task::none()
            }
            Message::Tick => {
                // Each reading supersedes the previous one.
                if let Some(latest) = self.readings.try_iter().last() {
                    self.display_data.last_reading = Some(latest);
                }
                Task::none()
            }
            Message::CloseRequested(id) => {
                info!("Window close requested - stopping audio...");
                self.display_data.shutting_down = true;
                if let Some(tuner) = self.tuner.take() {
                    tuner.stop();
                }
                window::close(id)
            }
        }
    }

    fn view(&self) -> Element<'_, Message> {
        create_main_view(&self.display_data)
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            iced::time::every(Duration::from_millis(16)).map(|_| Message::Tick),
            window::close_requests().map(Message::CloseRequested),
        ])
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}
