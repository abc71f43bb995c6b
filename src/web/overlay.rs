use anyhow::{anyhow, Result};
use glam::Vec2;
use log::{debug, error};
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlCanvasElement, HtmlElement, Window};

use crate::layout::button_transform;
use crate::overlay::{LabelId, Overlay, PanelPlacement};

/// [`Overlay`] backed by the page DOM.
///
/// Labels are `div.label` elements appended to the body; the info panel,
/// popup and control buttons are looked up by their element ids.
pub struct DomOverlay {
    window: Window,
    document: Document,
    labels: Vec<Option<HtmlElement>>,
    info: Option<HtmlElement>,
    info_shown: Option<(String, Option<PanelPlacement>)>,
    popup: Option<HtmlElement>,
    popup_content: Option<HtmlElement>,
}

impl DomOverlay {
    pub fn new(window: Window, document: Document) -> Self {
        let info = html_by_id(&document, "landmark-info-container")
            .or_else(|| html_by_id(&document, "info"));
        let popup = html_by_id(&document, "popup");
        let popup_content = html_by_id(&document, "popup-content");
        Self {
            window,
            document,
            labels: Vec::new(),
            info,
            info_shown: None,
            popup,
            popup_content,
        }
    }

    /// Adds a canvas for the popup's model render inside `#popup-content`.
    pub fn popup_canvas(&self, width: u32, height: u32) -> Result<HtmlCanvasElement> {
        let content = self
            .popup_content
            .as_ref()
            .ok_or_else(|| anyhow!("#popup-content is missing"))?;
        let canvas: HtmlCanvasElement = self
            .document
            .create_element("canvas")
            .map_err(|err| anyhow!("failed to create popup canvas: {err:?}"))?
            .dyn_into()
            .map_err(|_| anyhow!("created element is not a canvas"))?;
        canvas.set_width(width);
        canvas.set_height(height);
        content
            .append_child(&canvas)
            .map_err(|err| anyhow!("failed to attach popup canvas: {err:?}"))?;
        Ok(canvas)
    }

    fn create_label_element(&self, caption: &str) -> Result<HtmlElement> {
        let element: HtmlElement = self
            .document
            .create_element("div")
            .map_err(|err| anyhow!("{err:?}"))?
            .dyn_into()
            .map_err(|_| anyhow!("div is not an HtmlElement"))?;
        element.set_class_name("label");
        element.set_text_content(Some(caption));
        set_style(&element, "position", "absolute");
        set_style(&element, "display", "none");
        let body = self
            .document
            .body()
            .ok_or_else(|| anyhow!("document has no body"))?;
        body.append_child(&element)
            .map_err(|err| anyhow!("{err:?}"))?;
        Ok(element)
    }

    fn label(&self, label: LabelId) -> Option<&HtmlElement> {
        self.labels.get(label.0).and_then(Option::as_ref)
    }
}

impl Overlay for DomOverlay {
    fn create_label(&mut self, caption: &str) -> LabelId {
        let element = match self.create_label_element(caption) {
            Ok(element) => Some(element),
            Err(err) => {
                error!("failed to create label for {caption:?}: {err}");
                None
            }
        };
        self.labels.push(element);
        LabelId(self.labels.len() - 1)
    }

    fn place_label(&mut self, label: LabelId, position: Vec2) {
        if let Some(element) = self.label(label) {
            set_style(element, "left", &format!("{}px", position.x));
            set_style(element, "top", &format!("{}px", position.y));
        }
    }

    fn set_label_visible(&mut self, label: LabelId, visible: bool) {
        if let Some(element) = self.label(label) {
            set_style(element, "display", if visible { "block" } else { "none" });
        }
    }

    fn show_info(&mut self, text: &str, placement: Option<&PanelPlacement>) {
        let Some(container) = self.info.as_ref() else {
            return;
        };
        let unchanged = self
            .info_shown
            .as_ref()
            .is_some_and(|(shown, placed)| shown == text && placed.as_ref() == placement);
        if unchanged {
            return;
        }
        self.info_shown = Some((text.to_string(), placement.cloned()));

        container.set_inner_html("");
        let panel = match self.document.create_element("div") {
            Ok(panel) => panel,
            Err(err) => {
                error!("failed to create info panel: {err:?}");
                return;
            }
        };
        panel.set_class_name("landmark-info");
        panel.set_text_content(Some(text));
        if let Some(panel) = panel.dyn_ref::<HtmlElement>() {
            for (property, value) in PanelPlacement::css(placement) {
                set_style(panel, property, value);
            }
        }
        if let Err(err) = container.append_child(&panel) {
            error!("failed to show info panel: {err:?}");
        }
    }

    fn place_button(&mut self, id: &str, offset: Vec2) {
        match html_by_id(&self.document, id) {
            Some(button) => set_style(&button, "transform", &button_transform(offset)),
            None => debug!("no element #{id} to place"),
        }
    }

    fn open_popup(&mut self, info: &str) {
        if let Some(content) = self.popup_content.as_ref() {
            content.set_inner_html("");
            match self.document.create_element("p") {
                Ok(paragraph) => {
                    paragraph.set_text_content(Some(info));
                    if let Err(err) = content.append_child(&paragraph) {
                        error!("failed to show popup text: {err:?}");
                    }
                }
                Err(err) => error!("failed to create popup text: {err:?}"),
            }
        }
        if let Some(popup) = self.popup.as_ref() {
            set_style(popup, "display", "block");
        }
    }

    fn clear_popup(&mut self) {
        if let Some(content) = self.popup_content.as_ref() {
            content.set_inner_html("");
        }
        if let Some(popup) = self.popup.as_ref() {
            set_style(popup, "display", "none");
        }
    }

    fn alert(&mut self, message: &str) {
        if let Err(err) = self.window.alert_with_message(message) {
            error!("alert failed: {err:?}");
        }
    }
}

pub(crate) fn html_by_id(document: &Document, id: &str) -> Option<HtmlElement> {
    document
        .get_element_by_id(id)
        .and_then(|element| element.dyn_into::<HtmlElement>().ok())
}

fn set_style(element: &HtmlElement, property: &str, value: &str) {
    if let Err(err) = element.style().set_property(property, value) {
        error!("failed to set {property}: {err:?}");
    }
}
