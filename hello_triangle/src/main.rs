//! Hello triangle
//!
//! Opens a window, brings up a Vulkan context with a presentable swapchain,
//! reads the configured shader binaries and keeps the window alive until it
//! is closed.
//!
//! Usage: `hello_triangle [config.toml|config.ron]`

use std::time::Duration;

use vulkanwin::config::Config;
use vulkanwin::core::ApplicationConfig;
use vulkanwin::foundation::logging;
use vulkanwin::render::vulkan::core::load_shaders;
use vulkanwin::render::vulkan::{VulkanContext, VulkanError, VulkanResult, Window};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

fn load_config(path: Option<&str>) -> VulkanResult<ApplicationConfig> {
    let config = match path {
        Some(path) => ApplicationConfig::load_from_file(path)
            .map_err(|e| VulkanError::ConfigurationInvalid(format!("{path}: {e}")))?,
        None => ApplicationConfig::default(),
    };
    config.validate().map_err(VulkanError::ConfigurationInvalid)?;
    Ok(config)
}

fn run(config: &ApplicationConfig) -> VulkanResult<()> {
    let window = Window::new(&config.window)?;
    let mut context = VulkanContext::new(window, &config.renderer)?;

    let extent = context.extent();
    log::info!(
        "Swapchain ready: {}x{} {:?}, {} images",
        extent.width,
        extent.height,
        context.surface_format().format,
        context.image_views().len()
    );

    let shaders = load_shaders(&config.renderer.shaders)?;
    for shader in &shaders {
        log::info!("Loaded shader {} ({} bytes)", shader.path.display(), shader.bytes.len());
    }

    while !context.window().should_close() {
        if context.poll_events() {
            let window_extent = context.window().framebuffer_size();
            context.recreate_swapchain(window_extent)?;
        }
        std::thread::sleep(FRAME_INTERVAL);
    }

    log::info!("Window closed, shutting down");
    drop(context);
    Ok(())
}

fn main() {
    let path = std::env::args().nth(1);

    let config = match load_config(path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            log::error!("{e}");
            std::process::exit(1);
        }
    };

    logging::init(&config.log_level);
    log::info!("Starting {}", config.renderer.application_name);

    if let Err(e) = run(&config) {
        log::error!("Fatal ({:?}): {e}", e.kind());
        std::process::exit(1);
    }
}
