// src/main.rs

pub mod app;
pub mod ui;
pub mod demo_scene;

use std::path::Path;

use log::error;
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoopWindowTarget, EventLoop},
    window::WindowBuilder,
};
use app::PortalApp;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;
use magic_portal::engine_lib::config::{PortalConfig, DEFAULT_CONFIG_PATH};

#[cfg_attr(target_arch = "wasm32", wasm_bindgen(start))]
pub async fn run() {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            std::panic::set_hook(Box::new(console_error_panic_hook::hook));
            if console_log::init_with_level(log::Level::Warn).is_err() {
                web_sys::console::warn_1(&"Couldn't initialize logger".into());
            }
        } else {
            env_logger::init();
        }
    }

    let portal_config = PortalConfig::load_or_default(Path::new(DEFAULT_CONFIG_PATH));

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            error!("failed to create event loop: {e}");
            return;
        }
    };
    let window = match WindowBuilder::new()
        .with_title("Magic Portal")
        .with_inner_size(winit::dpi::LogicalSize::new(1024, 768))
        .build(&event_loop)
    {
        Ok(window) => std::sync::Arc::new(window),
        Err(e) => {
            error!("failed to create window: {e}");
            return;
        }
    };

    #[cfg(target_arch = "wasm32")]
    {
        use winit::platform::web::WindowExtWebSys;
        let attached = web_sys::window()
            .and_then(|win| win.document())
            .and_then(|doc| {
                let dst = doc.get_element_by_id("wasm-viewport")?;
                let canvas = web_sys::Element::from(window.canvas()?);
                dst.append_child(&canvas).ok()?;
                Some(())
            });
        if attached.is_none() {
            error!("couldn't append canvas to document body");
        }
    }

    let mut app_state = match PortalApp::new(window.clone(), portal_config).await {
        Ok(app_state) => app_state,
        Err(e) => {
            error!("{e}");
            return;
        }
    };
    let mut last_time = std::time::Instant::now();

    let result = event_loop.run(move |event, target: &EventLoopWindowTarget<()>| {
        target.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent {
                ref event,
                window_id,
            } if window_id == window.id() => {
                if !app_state.handle_window_event(event, &window) {
                    match event {
                        WindowEvent::CloseRequested => {
                            target.exit();
                        }
                        WindowEvent::Resized(physical_size) => {
                            app_state.resize(*physical_size);
                        }
                        WindowEvent::RedrawRequested => { /* In AboutToWait */ }
                        WindowEvent::Focused(is_focused) => {
                            app_state.set_focused(*is_focused);
                        }
                        _ => {}
                    }
                }
            }
            Event::DeviceEvent { event: device_event, .. } => {
                app_state.handle_device_event(&device_event, &window);
            }
            Event::AboutToWait => {
                // one measured delta per frame drives growth and movement
                let now = std::time::Instant::now();
                let dt = (now - last_time).as_secs_f32();
                last_time = now;

                app_state.update(dt);
                match app_state.render(&window) {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        app_state.resize(app_state.get_size());
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        error!("WGPU Out Of Memory! Exiting.");
                        target.exit();
                    }
                    Err(e) => log::warn!("Surface error: {:?}", e),
                }

                if !target.exiting() {
                    window.request_redraw();
                }
            }
            Event::LoopExiting => {}
            _ => {}
        }
    });
    if let Err(e) = result {
        error!("event loop terminated: {e}");
    }
}

#[tokio::main]
async fn main() {
    run().await;
}
