mod overlay;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use gloo_events::{EventListener, EventListenerOptions};
use gloo_net::http::Request;
use log::{error, info, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, Element, HtmlCanvasElement, PointerEvent, WheelEvent, Window};

use crate::assets::{decode_asset, AssetEvent, AssetLibrary, AssetRequest};
use crate::error::AssetError;
use crate::input::PointerTracker;
use crate::layout::ControlButton;
use crate::popup::{PopupLoop, PopupView};
use crate::render::{MainRenderer, Renderer};
use crate::scene::ViewerScene;
use crate::GlobeApp;

pub use overlay::DomOverlay;

const BUTTON_IDS: [&str; 4] = ["button1", "button2", "button3", "button4"];

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

#[wasm_bindgen(start)]
pub fn bootstrap() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

/// Loads the scene document at `scene_url` and starts the viewer.
#[wasm_bindgen]
pub async fn start(scene_url: String) -> Result<(), JsValue> {
    run(&scene_url)
        .await
        .map_err(|err| JsValue::from_str(&format!("{err:#}")))
}

struct Session {
    app: GlobeApp<DomOverlay, Renderer>,
    pointer: PointerTracker,
    canvas: HtmlCanvasElement,
    window: Window,
    listeners: Vec<EventListener>,
}

async fn run(scene_url: &str) -> Result<()> {
    let xml = fetch_text(scene_url).await?;
    let scene = ViewerScene::from_xml(&xml).context("failed to parse scene document")?;
    let base_url = scene_url
        .rfind('/')
        .map(|index| scene_url[..=index].to_string())
        .unwrap_or_default();

    let window = web_sys::window().ok_or_else(|| anyhow!("window not available"))?;
    let document = window
        .document()
        .ok_or_else(|| anyhow!("document not available"))?;
    let canvas = create_canvas(&document)?;
    let (width, height) = window_size(&window);
    canvas.set_width(width);
    canvas.set_height(height);

    let renderer = Renderer::new(wgpu::SurfaceTarget::Canvas(canvas.clone()), width, height).await?;
    let overlay = DomOverlay::new(window.clone(), document.clone());
    let mut app = GlobeApp::new(scene, overlay, renderer);
    app.init_buttons(read_buttons(&document)?);

    for request in app.asset_requests() {
        let queue = app.asset_queue();
        let url = format!("{base_url}{}", request.path());
        spawn_local(async move {
            queue.push(fetch_asset(request, &url).await);
        });
    }

    let session = Rc::new(RefCell::new(Session {
        app,
        pointer: PointerTracker::new(),
        canvas: canvas.clone(),
        window: window.clone(),
        listeners: Vec::new(),
    }));
    let listeners = attach_listeners(&window, &document, &canvas, &session);
    session.borrow_mut().listeners = listeners;

    start_frame_loop(session);
    info!("viewer started from {scene_url}");
    Ok(())
}

fn create_canvas(document: &Document) -> Result<HtmlCanvasElement> {
    let canvas: HtmlCanvasElement = document
        .create_element("canvas")
        .map_err(|err| anyhow!("failed to create canvas: {err:?}"))?
        .dyn_into()
        .map_err(|_| anyhow!("created element is not a canvas"))?;
    let body = document
        .body()
        .ok_or_else(|| anyhow!("document has no body element"))?;
    body.append_child(&canvas)
        .map_err(|err| anyhow!("failed to append canvas: {err:?}"))?;
    Ok(canvas)
}

fn window_size(window: &Window) -> (u32, u32) {
    let read = |value: Result<JsValue, JsValue>| {
        value
            .ok()
            .and_then(|value| value.as_f64())
            .map_or(1, |value| value.max(1.0) as u32)
    };
    (read(window.inner_width()), read(window.inner_height()))
}

/// Reads every `.control-button` with its `data-offset-x` / `data-offset-y` attributes.
fn read_buttons(document: &Document) -> Result<Vec<ControlButton>> {
    let nodes = document
        .query_selector_all(".control-button")
        .map_err(|err| anyhow!("failed to query control buttons: {err:?}"))?;
    let mut buttons = Vec::with_capacity(nodes.length() as usize);
    for index in 0..nodes.length() {
        let Some(element) = nodes.get(index).and_then(|node| node.dyn_into::<Element>().ok()) else {
            continue;
        };
        let button = ControlButton::from_attributes(
            &element.id(),
            element.get_attribute("data-offset-x").as_deref(),
            element.get_attribute("data-offset-y").as_deref(),
        )?;
        buttons.push(button);
    }
    Ok(buttons)
}

fn attach_listeners(
    window: &Window,
    document: &Document,
    canvas: &HtmlCanvasElement,
    session: &Rc<RefCell<Session>>,
) -> Vec<EventListener> {
    let mut listeners = Vec::new();

    {
        let session = Rc::clone(session);
        listeners.push(EventListener::new(window, "resize", move |_| {
            let mut session = session.borrow_mut();
            let (width, height) = window_size(&session.window);
            session.canvas.set_width(width);
            session.canvas.set_height(height);
            session.app.resize(width, height);
        }));
    }

    {
        let session = Rc::clone(session);
        listeners.push(EventListener::new(canvas, "pointerdown", move |event| {
            if let Some(position) = pointer_position(event) {
                session.borrow_mut().pointer.press(position);
            }
        }));
    }

    {
        let session = Rc::clone(session);
        listeners.push(EventListener::new(canvas, "pointermove", move |event| {
            let Some(position) = pointer_position(event) else {
                return;
            };
            let mut session = session.borrow_mut();
            if let Some(delta) = session.pointer.move_to(position) {
                session.app.pointer_drag(delta);
            }
        }));
    }

    {
        let session = Rc::clone(session);
        listeners.push(EventListener::new(canvas, "pointerup", move |event| {
            let Some(position) = pointer_position(event) else {
                return;
            };
            let opened = {
                let mut session = session.borrow_mut();
                match session.pointer.release(position) {
                    Some(pixels) => session.app.click(pixels).map(|view| {
                        let library = popup_library(session.app.library(), &view);
                        let canvas = session
                            .app
                            .overlay()
                            .popup_canvas(view.surface_size().0, view.surface_size().1);
                        (view, library, canvas)
                    }),
                    None => None,
                }
            };
            match opened {
                Some((view, library, Ok(canvas))) => {
                    spawn_popup(Rc::clone(&session), view, library, canvas)
                }
                Some((view, _, Err(err))) => {
                    error!("failed to open popup: {err:#}");
                    session.borrow_mut().app.abandon_popup(view.id);
                }
                None => {}
            }
        }));
    }

    {
        let session = Rc::clone(session);
        let options = EventListenerOptions::enable_prevent_default();
        listeners.push(EventListener::new_with_options(canvas, "wheel", options, move |event| {
            let Some(wheel) = event.dyn_ref::<WheelEvent>() else {
                return;
            };
            wheel.prevent_default();
            session.borrow_mut().app.wheel(wheel.delta_y() as f32);
        }));
    }

    match document.get_element_by_id("close-popup") {
        Some(close) => {
            let session = Rc::clone(session);
            listeners.push(EventListener::new(&close, "click", move |_| {
                session.borrow_mut().app.close_popup();
            }));
        }
        None => warn!("no #close-popup element; popups cannot be closed"),
    }

    for id in BUTTON_IDS {
        let Some(button) = document.get_element_by_id(id) else {
            continue;
        };
        let session = Rc::clone(session);
        listeners.push(EventListener::new(&button, "click", move |_| {
            session.borrow_mut().app.press_button(id);
        }));
    }

    listeners
}

fn pointer_position(event: &web_sys::Event) -> Option<Vec2> {
    let event = event.dyn_ref::<PointerEvent>()?;
    Some(Vec2::new(event.offset_x() as f32, event.offset_y() as f32))
}

fn popup_library(library: &AssetLibrary, view: &PopupView) -> AssetLibrary {
    match library.model(&view.model_path) {
        Some(model) => AssetLibrary::for_model(&view.model_path, Arc::clone(model)),
        None => AssetLibrary::default(),
    }
}

fn request_animation_frame(callback: &Closure<dyn FnMut()>) {
    let Some(window) = web_sys::window() else {
        return;
    };
    if let Err(err) = window.request_animation_frame(callback.as_ref().unchecked_ref()) {
        error!("requestAnimationFrame failed: {err:?}");
    }
}

fn start_frame_loop(session: Rc<RefCell<Session>>) {
    let callback: FrameCallback = Rc::new(RefCell::new(None));
    let rearm = Rc::clone(&callback);
    *callback.borrow_mut() = Some(Closure::new(move || {
        if let Err(err) = session.borrow_mut().app.tick() {
            error!("frame loop stopped: {err:#}");
            return;
        }
        if let Some(callback) = rearm.borrow().as_ref() {
            request_animation_frame(callback);
        }
    }));
    if let Some(callback) = callback.borrow().as_ref() {
        request_animation_frame(callback);
    }
}

/// Runs a popup's own render loop until its session is cancelled.
///
/// On cancellation the renderer and model are released right away. The frame
/// closure keeps a handle to its own slot for re-arming; that cycle is broken
/// by moving the closure out and dropping it from a later task, never from
/// inside its own call.
fn spawn_popup(
    session: Rc<RefCell<Session>>,
    view: PopupView,
    library: AssetLibrary,
    canvas: HtmlCanvasElement,
) {
    spawn_local(async move {
        let (width, height) = view.surface_size();
        let renderer = match Renderer::new(wgpu::SurfaceTarget::Canvas(canvas), width, height).await {
            Ok(renderer) => renderer,
            Err(err) => {
                error!("popup renderer failed: {err:#}");
                session.borrow_mut().app.abandon_popup(view.id);
                return;
            }
        };
        let mut popup = PopupLoop::new(view, (renderer, library));
        let callback: FrameCallback = Rc::new(RefCell::new(None));
        let rearm = Rc::clone(&callback);
        *callback.borrow_mut() = Some(Closure::new(move || {
            let running = popup.step(|view, (renderer, library)| {
                let model = library.model(&view.model_path).cloned();
                if let Err(err) = renderer.draw(&view.frame_scene(model.as_deref()), library) {
                    error!("popup render failed: {err}");
                }
            });
            if !running {
                let finished = rearm.borrow_mut().take();
                spawn_local(async move { drop(finished) });
                return;
            }
            if let Some(callback) = rearm.borrow().as_ref() {
                request_animation_frame(callback);
            }
        }));
        if let Some(callback) = callback.borrow().as_ref() {
            request_animation_frame(callback);
        }
    });
}

async fn fetch_text(url: &str) -> Result<String> {
    let response = Request::get(url)
        .send()
        .await
        .map_err(|err| anyhow!("failed to fetch {url}: {err}"))?;
    if !response.ok() {
        return Err(anyhow!("failed to fetch {url}: HTTP {}", response.status()));
    }
    response
        .text()
        .await
        .map_err(|err| anyhow!("failed to read {url}: {err}"))
}

async fn fetch_asset(request: AssetRequest, url: &str) -> AssetEvent {
    match fetch_bytes(url).await {
        Ok(bytes) => decode_asset(request, &bytes),
        Err(message) => {
            let path = request.path().to_string();
            AssetEvent::Failed {
                request,
                error: AssetError::Fetch { path, message },
            }
        }
    }
}

async fn fetch_bytes(url: &str) -> Result<Vec<u8>, String> {
    let response = Request::get(url)
        .send()
        .await
        .map_err(|err| err.to_string())?;
    if !response.ok() {
        return Err(format!("HTTP {}", response.status()));
    }
    response.binary().await.map_err(|err| err.to_string())
}
