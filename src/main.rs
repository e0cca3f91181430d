mod cli;
mod error;
mod files;
mod pages;
mod settings;
mod ui;

use clap::Parser;
use winit::event_loop::EventLoop;

use crate::cli::{default_memory_budget, parse_memory_budget, Cli};
use crate::pages::PageBuffer;
use crate::settings::Settings;
use crate::ui::state::ViewerState;
use crate::ui::App;

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let budget = match &cli.memory {
        Some(s) => parse_memory_budget(s),
        None => default_memory_budget(),
    };

    let mut viewer_settings = Settings::load();
    let mut buffer = PageBuffer::new(budget);

    // A folder on the command line wins; otherwise reopen the last one.
    let start_folder = cli.folder.clone().or_else(|| viewer_settings.last_folder.clone());
    if let Some(folder) = start_folder {
        match buffer.load_folder(&folder) {
            Ok(0) => log::warn!("no images found in {}", folder.display()),
            Ok(_) => {
                viewer_settings.remember_folder(&folder);
                if let Err(e) = viewer_settings.save() {
                    log::warn!("could not save settings: {}", e);
                }
            }
            Err(e) => log::error!("could not open {}: {}", folder.display(), e),
        }
    }

    let initial_delay = cli.initial_delay as f64 / 1000.0;
    let repeat_delay = cli.repeat_delay as f64 / 1000.0;

    let event_loop = EventLoop::new().expect("create event loop");
    let state = ViewerState::new(buffer, viewer_settings, initial_delay, repeat_delay);
    let mut app = App::new(state);

    event_loop.run_app(&mut app).expect("run event loop");
}
