use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::{error, info};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

use globe_landmarks::{
    load_file, spawn_file_loads, AssetLibrary, Command, GlobeApp, HeadlessOverlay, MainRenderer,
    NullRenderer, PointerTracker, PopupLoop, PopupView, Renderer, ViewerScene,
};

const HEADLESS_SIZE: (u32, u32) = (1280, 720);

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let xml = std::fs::read_to_string(&options.path)
        .with_context(|| format!("failed to read scene {}", options.path.display()))?;
    let scene = ViewerScene::from_xml(&xml)
        .with_context(|| format!("failed to parse scene {}", options.path.display()))?;
    let base_dir = options
        .path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    if options.summary_only {
        return run_headless(scene, &base_dir, options.frames);
    }
    match run_interactive(scene.clone(), base_dir.clone()) {
        Ok(()) => Ok(()),
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
            eprintln!(
                "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
            );
            run_headless(scene, &base_dir, options.frames)
        }
        Err(err) => Err(err),
    }
}

fn run_headless(scene: ViewerScene, base_dir: &Path, frames: u32) -> Result<()> {
    let (width, height) = HEADLESS_SIZE;
    let buttons = scene.buttons.clone();
    let mut app = GlobeApp::new(scene, HeadlessOverlay::new(), NullRenderer::new(width, height));
    app.init_buttons(buttons);

    let queue = app.asset_queue();
    for request in app.asset_requests() {
        queue.push(load_file(request, base_dir));
    }
    for _ in 0..frames.max(1) {
        app.tick()?;
    }

    print_summary(&app);
    Ok(())
}

fn print_summary<R: MainRenderer>(app: &GlobeApp<HeadlessOverlay, R>) {
    println!("Loaded scene with {} landmark(s)", app.registry().len());
    for status in app.landmark_status() {
        println!(
            " - {}: {} at ({:.0}, {:.0}), distance {:.2}",
            status.caption,
            if status.visible { "visible" } else { "hidden" },
            status.screen.x,
            status.screen.y,
            status.distance
        );
    }
    if let Some(text) = app.overlay().info_text() {
        println!("Info: {text}");
    }
}

fn run_interactive(scene: ViewerScene, base_dir: PathBuf) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;

    let mut viewer = Viewer {
        scene: Some(scene),
        base_dir,
        main: None,
        popup: None,
        pointer: PointerTracker::new(),
        last_error: None,
    };
    event_loop
        .run_app(&mut viewer)
        .map_err(|err| anyhow!("event loop failed: {err}"))?;

    match viewer.last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct MainWindow {
    window: Arc<Window>,
    app: GlobeApp<HeadlessOverlay, Renderer>,
    title: String,
    alerts_seen: usize,
    labels_seen: Vec<bool>,
}

struct PopupWindow {
    window: Arc<Window>,
    frames: PopupLoop<(Renderer, AssetLibrary)>,
}

struct Viewer {
    scene: Option<ViewerScene>,
    base_dir: PathBuf,
    main: Option<MainWindow>,
    popup: Option<PopupWindow>,
    pointer: PointerTracker,
    last_error: Option<anyhow::Error>,
}

impl Viewer {
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.last_error = Some(err);
        event_loop.exit();
    }

    fn create_main(&mut self, event_loop: &ActiveEventLoop, scene: ViewerScene) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title("Globe landmarks")
            .with_inner_size(LogicalSize::new(1280.0, 720.0));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );
        let size = window.inner_size();
        let renderer = block_on(Renderer::new(
            Arc::clone(&window),
            size.width.max(1),
            size.height.max(1),
        ))?;

        let buttons = scene.buttons.clone();
        let mut app = GlobeApp::new(scene, HeadlessOverlay::new(), renderer);
        app.init_buttons(buttons);
        spawn_file_loads(app.asset_requests(), &self.base_dir, &app.asset_queue());

        self.main = Some(MainWindow {
            window,
            app,
            title: String::new(),
            alerts_seen: 0,
            labels_seen: Vec::new(),
        });
        Ok(())
    }

    fn open_popup(&mut self, event_loop: &ActiveEventLoop, view: PopupView) -> Result<()> {
        let Some(main) = self.main.as_ref() else {
            return Ok(());
        };
        self.popup = None;
        let (width, height) = view.surface_size();
        let attributes = Window::default_attributes()
            .with_title(view.caption.clone())
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(false);
        let window = Arc::new(event_loop.create_window(attributes)?);
        let renderer = block_on(Renderer::new(Arc::clone(&window), width, height))?;
        let library = match main.app.library().model(&view.model_path) {
            Some(model) => AssetLibrary::for_model(&view.model_path, Arc::clone(model)),
            None => AssetLibrary::default(),
        };
        if let Some(info) = main.app.popups().current().map(|popup| popup.info.clone()) {
            println!("{}: {info}", view.caption);
        }
        self.popup = Some(PopupWindow {
            window,
            frames: PopupLoop::new(view, (renderer, library)),
        });
        Ok(())
    }

    fn close_popup(&mut self) {
        if let Some(main) = self.main.as_mut() {
            main.app.close_popup();
        }
        self.popup = None;
    }

    fn run_command(&mut self, command: Command) {
        match command {
            Command::ClosePopup => self.close_popup(),
            Command::PressButton(id) => {
                if let Some(main) = self.main.as_mut() {
                    main.app.press_button(&id);
                }
            }
        }
    }

    fn redraw_main(&mut self, event_loop: &ActiveEventLoop) {
        let Some(main) = self.main.as_mut() else {
            return;
        };
        if let Err(err) = main.app.tick() {
            self.fail(event_loop, err);
            return;
        }
        let overlay = main.app.overlay();
        for alert in &overlay.alerts()[main.alerts_seen..] {
            println!("{alert}");
        }
        main.alerts_seen = overlay.alerts().len();
        for label in overlay.visibility_changes(&mut main.labels_seen) {
            let state = if label.visible { "visible" } else { "hidden" };
            println!("{} is now {state}", label.caption);
        }
        let title = match overlay.info_text() {
            Some(text) => format!("Globe landmarks - {text}"),
            None => "Globe landmarks".to_string(),
        };
        if title != main.title {
            main.window.set_title(&title);
            main.title = title;
        }
    }

    fn redraw_popup(&mut self) {
        let Some(popup) = self.popup.as_mut() else {
            return;
        };
        let running = popup.frames.step(|view, (renderer, library)| {
            let model = library.model(&view.model_path).cloned();
            if let Err(err) = renderer.draw(&view.frame_scene(model.as_deref()), library) {
                error!("popup render failed: {err}");
            }
        });
        if !running {
            self.popup = None;
        }
    }

    fn main_window_event(&mut self, event_loop: &ActiveEventLoop, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(main) = self.main.as_mut() {
                    main.app.resize(size.width, size.height);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let position = Vec2::new(position.x as f32, position.y as f32);
                if let (Some(delta), Some(main)) = (self.pointer.move_to(position), self.main.as_mut()) {
                    main.app.pointer_drag(delta);
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                let position = self.pointer.position();
                match state {
                    ElementState::Pressed => self.pointer.press(position),
                    ElementState::Released => {
                        let clicked = self.pointer.release(position);
                        let view = clicked
                            .and_then(|pixels| self.main.as_mut().and_then(|main| main.app.click(pixels)));
                        if let Some(view) = view {
                            let id = view.id;
                            if let Err(err) = self.open_popup(event_loop, view) {
                                error!("failed to open popup window: {err:#}");
                                if let Some(main) = self.main.as_mut() {
                                    main.app.abandon_popup(id);
                                }
                            }
                        }
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta_y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -y,
                    MouseScrollDelta::PixelDelta(position) => -(position.y as f32),
                };
                if let Some(main) = self.main.as_mut() {
                    main.app.wheel(delta_y);
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                let name = match &event.logical_key {
                    Key::Named(NamedKey::Escape) => "Escape",
                    Key::Character(text) => text.as_str(),
                    _ => return,
                };
                if let Some(command) = Command::from_key_name(name) {
                    self.run_command(command);
                }
            }
            WindowEvent::RedrawRequested => self.redraw_main(event_loop),
            _ => {}
        }
    }

    fn popup_window_event(&mut self, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.close_popup(),
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.logical_key == Key::Named(NamedKey::Escape) =>
            {
                self.close_popup()
            }
            WindowEvent::RedrawRequested => self.redraw_popup(),
            _ => {}
        }
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(scene) = self.scene.take() else {
            return;
        };
        if let Err(err) = self.create_main(event_loop, scene) {
            self.fail(event_loop, err);
        } else {
            info!("main window created");
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let is_main = self.main.as_ref().is_some_and(|main| main.window.id() == window_id);
        let is_popup = self.popup.as_ref().is_some_and(|popup| popup.window.id() == window_id);
        if is_main {
            self.main_window_event(event_loop, event);
        } else if is_popup {
            self.popup_window_event(event);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(main) = self.main.as_ref() {
            main.window.request_redraw();
        }
        if let Some(popup) = self.popup.as_ref() {
            popup.window.request_redraw();
        }
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

struct CliOptions {
    path: PathBuf,
    summary_only: bool,
    frames: u32,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let usage = "Usage: globe-landmarks <scene.xml> [--summary-only] [--frames N]";
        let mut args = env::args().skip(1);
        let Some(path) = args.next() else {
            return Err(anyhow!(usage));
        };
        let mut summary_only = false;
        let mut frames = 1;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--summary-only" => summary_only = true,
                "--frames" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--frames needs a value. {usage}"))?;
                    frames = value
                        .parse()
                        .with_context(|| format!("invalid frame count {value:?}"))?;
                }
                other => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Expected --summary-only or --frames N"
                    ));
                }
            }
        }
        Ok(Self {
            path: PathBuf::from(path),
            summary_only,
            frames,
        })
    }
}
