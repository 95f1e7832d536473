//! The Ona host: loads configuration and game modules, brings up the
//! graphics server and drives the frame loop.

#[macro_use]
extern crate log;

use config::{Config, File, FileFormat};
use ona_core::bitmap;
use ona_core::image::register_image_loader;
use ona_core::text::Text;
use ona_graphics::Events;
use ona_module::SystemRuntime;
use ona_tasks::TaskScheduler;
use std::path::Path;
use std::process;

const DISPLAY_TITLE_DEFAULT: &str = "Ona";
const DISPLAY_SIZE_DEFAULT: (i32, i32) = (640, 480);
const SERVER_DEFAULT: &str = "opengl";
const HARDWARE_PRIORITY: f32 = 0.25;

/// Reads `config.ona` from the working directory. A missing or malformed
/// file just leaves every setting at its default.
fn load_settings() -> Config {
    let mut settings = Config::new();

    if let Err(error) = settings.merge(File::new("config.ona", FileFormat::Toml)) {
        debug!("config.ona not loaded: {}", error);
    }

    settings
}

fn display_size(settings: &Config) -> (i32, i32) {
    match settings.get::<Vec<i64>>("Graphics.displaySize") {
        Ok(ref size) if size.len() == 2 => (size[0] as i32, size[1] as i32),
        Ok(_) => {
            warn!("Graphics.displaySize must hold two values, using default");

            DISPLAY_SIZE_DEFAULT
        }
        Err(_) => DISPLAY_SIZE_DEFAULT,
    }
}

fn main() {
    pretty_env_logger::init();

    let settings = load_settings();

    register_image_loader(Text::new("bmp"), bitmap::decode_bitmap);

    let display_title = settings
        .get::<String>("Graphics.displayTitle")
        .unwrap_or_else(|_| DISPLAY_TITLE_DEFAULT.to_owned());

    let (display_width, display_height) = display_size(&settings);

    let server_name = settings
        .get::<String>("Graphics.server")
        .unwrap_or_else(|_| SERVER_DEFAULT.to_owned());

    if server_name != SERVER_DEFAULT {
        error!("unknown graphics server {:?}", server_name);
        process::exit(1);
    }

    let mut graphics_server = match ona_graphics::load_opengl(
        &Text::new(&display_title),
        display_width,
        display_height,
    ) {
        Ok(server) => server,
        Err(error) => {
            error!("graphics server failed to load: {}", error);
            process::exit(1);
        }
    };

    ona_module::publish_graphics_server(&mut graphics_server);

    let mut runtime = SystemRuntime::load(Path::new("modules"));
    info!("{} systems spawned", runtime.system_count());

    let scheduler = TaskScheduler::new(HARDWARE_PRIORITY);
    let mut events = Events::default();

    runtime.initialize();

    while graphics_server.read_events(&mut events) {
        graphics_server.clear();
        runtime.process_frame(&scheduler, &events);
        scheduler.wait();
        graphics_server.update();
    }

    runtime.finalize();
    ona_module::retract_graphics_server();
}
