use std::f32::consts::PI;

use anyhow::{anyhow, bail, Context, Result};
use glam::{Vec2, Vec3};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::camera::PerspectiveCamera;
use crate::landmark::{LandmarkLabel, ModelPlacement, Registration};
use crate::layout::ControlButton;
use crate::orbit::OrbitSettings;
use crate::overlay::PanelPlacement;
use crate::popup::PopupSettings;
use crate::proximity::DEFAULT_PROXIMITY;
use crate::visibility::VisibilityTest;

const DEFAULT_WELCOME: &str = "Welcome! Zoom in on the globe to discover its landmarks.";
const DEFAULT_ALERT: &str = "Coming soon";
/// Upper bound for the globe tessellation in either direction.
const MAX_SEGMENTS: u32 = 512;

/// What the per-frame landmark pass drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfoMode {
    /// Frustum-culled labels next to each marker.
    Labels,
    /// One fixed panel describing the nearest landmark in range.
    Proximity,
}

/// Bundled defaults of the three viewer revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Proximity,
    Panels,
    Labels,
}

impl Preset {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "proximity" => Ok(Self::Proximity),
            "panels" => Ok(Self::Panels),
            "labels" => Ok(Self::Labels),
            other => bail!("unknown preset {other:?}; expected proximity, panels or labels"),
        }
    }

    fn zoom_range(self) -> (f32, f32) {
        match self {
            Self::Proximity => (7.0, 12.0),
            Self::Panels => (7.0, 35.0),
            Self::Labels => (9.0, 15.0),
        }
    }

    fn info_mode(self) -> InfoMode {
        match self {
            Self::Proximity | Self::Panels => InfoMode::Proximity,
            Self::Labels => InfoMode::Labels,
        }
    }

    fn button_push(self) -> Option<f32> {
        match self {
            Self::Proximity => Some(1.5),
            Self::Panels | Self::Labels => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobeSettings {
    pub texture: String,
    pub radius: f32,
    pub segments: u32,
}

impl Default for GlobeSettings {
    fn default() -> Self {
        Self {
            texture: "images/earth.jpg".to_string(),
            radius: 5.0,
            segments: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySettings {
    pub mode: InfoMode,
    pub visibility: VisibilityTest,
    pub proximity: f32,
    pub welcome: String,
    pub visible_color: Vec3,
    pub hidden_color: Vec3,
    pub marker_radius: f32,
    /// Offset scale at the minimum zoom distance; `None` keeps buttons fixed.
    pub button_push: Option<f32>,
    pub alert: String,
    pub models_on_globe: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            mode: InfoMode::Labels,
            visibility: VisibilityTest::default(),
            proximity: DEFAULT_PROXIMITY,
            welcome: DEFAULT_WELCOME.to_string(),
            visible_color: Vec3::new(0.0, 1.0, 0.0),
            hidden_color: Vec3::new(1.0, 0.0, 0.0),
            marker_radius: 0.1,
            button_push: None,
            alert: DEFAULT_ALERT.to_string(),
            models_on_globe: false,
        }
    }
}

/// Parsed viewer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerScene {
    pub globe: GlobeSettings,
    pub camera: PerspectiveCamera,
    pub orbit: OrbitSettings,
    pub display: DisplaySettings,
    pub popup: PopupSettings,
    pub buttons: Vec<ControlButton>,
    pub landmarks: Vec<Registration>,
}

impl Default for ViewerScene {
    fn default() -> Self {
        Self {
            globe: GlobeSettings::default(),
            camera: PerspectiveCamera::default(),
            orbit: OrbitSettings {
                min_distance: 9.0,
                max_distance: 15.0,
                ..OrbitSettings::default()
            },
            display: DisplaySettings::default(),
            popup: PopupSettings::default(),
            buttons: Vec::new(),
            landmarks: Vec::new(),
        }
    }
}

impl ViewerScene {
    /// Parses the viewer XML document.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let root = document.root_element();
        let mut scene = Self::default();

        let preset = optional_text(&root, "preset")
            .map(|value| Preset::parse(&value))
            .transpose()?
            .unwrap_or(Preset::Labels);
        let (min_distance, max_distance) = preset.zoom_range();
        scene.orbit.min_distance = min_distance;
        scene.orbit.max_distance = max_distance;
        scene.display.mode = preset.info_mode();
        scene.display.button_push = preset.button_push();

        if let Some(node) = child(&root, "globe") {
            scene.globe.texture = optional_text(&node, "texture").unwrap_or(scene.globe.texture);
            scene.globe.radius = parse_f32(optional_text(&node, "radius"), scene.globe.radius)?;
            scene.globe.segments = parse_segments(optional_text(&node, "segments"), scene.globe.segments)?;
        }

        if let Some(node) = child(&root, "camera") {
            let camera = &mut scene.camera;
            camera.fov_y_degrees = parse_f32(optional_text(&node, "fov"), camera.fov_y_degrees)?;
            camera.near = parse_f32(optional_text(&node, "near"), camera.near)?;
            camera.far = parse_f32(optional_text(&node, "far"), camera.far)?;
            camera.position = parse_vec3(optional_text(&node, "position"), camera.position)?;
        }

        if let Some(node) = child(&root, "controls") {
            let orbit = &mut scene.orbit;
            orbit.min_distance = parse_f32(optional_text(&node, "min-distance"), orbit.min_distance)?;
            orbit.max_distance = parse_f32(optional_text(&node, "max-distance"), orbit.max_distance)?;
            orbit.damping_factor = parse_f32(optional_text(&node, "damping"), orbit.damping_factor)?;
            orbit.enable_damping = orbit.damping_factor > 0.0;
            orbit.enable_zoom = parse_bool(optional_text(&node, "enable-zoom"), orbit.enable_zoom)?;
            orbit.min_polar = parse_f32(
                optional_text(&node, "min-polar"),
                orbit.min_polar.to_degrees(),
            )?
            .to_radians();
            orbit.max_polar = parse_f32(
                optional_text(&node, "max-polar"),
                orbit.max_polar.to_degrees(),
            )?
            .to_radians()
            .min(PI);
        }
        if scene.orbit.min_distance > scene.orbit.max_distance {
            bail!(
                "min-distance {} exceeds max-distance {}",
                scene.orbit.min_distance,
                scene.orbit.max_distance
            );
        }

        if let Some(node) = child(&root, "display") {
            let display = &mut scene.display;
            if let Some(mode) = optional_text(&node, "mode") {
                display.mode = match mode.as_str() {
                    "labels" => InfoMode::Labels,
                    "proximity" => InfoMode::Proximity,
                    other => bail!("unknown display mode {other:?}"),
                };
            }
            display.visibility.ndc_threshold = parse_vec2(
                optional_text(&node, "threshold"),
                display.visibility.ndc_threshold,
            )?;
            display.proximity = parse_f32(optional_text(&node, "proximity"), display.proximity)?;
            display.welcome = optional_text(&node, "welcome").unwrap_or(display.welcome.clone());
            display.visible_color =
                parse_color(optional_text(&node, "visible-color"), display.visible_color)?;
            display.hidden_color =
                parse_color(optional_text(&node, "hidden-color"), display.hidden_color)?;
            display.marker_radius =
                parse_f32(optional_text(&node, "marker-radius"), display.marker_radius)?;
            if let Some(push) = optional_text(&node, "button-push") {
                display.button_push = Some(parse_f32(Some(push), 1.0)?);
            }
            display.alert = optional_text(&node, "alert").unwrap_or(display.alert.clone());
            display.models_on_globe =
                parse_bool(optional_text(&node, "models-on-globe"), display.models_on_globe)?;
        }

        if let Some(node) = child(&root, "popup") {
            let popup = &mut scene.popup;
            let size = parse_vec2(
                optional_text(&node, "size"),
                Vec2::new(popup.width as f32, popup.height as f32),
            )?;
            popup.width = size.x.max(1.0) as u32;
            popup.height = size.y.max(1.0) as u32;
            popup.spin = parse_f32(optional_text(&node, "spin"), popup.spin)?;
            popup.camera_distance =
                parse_f32(optional_text(&node, "camera-distance"), popup.camera_distance)?;
        }

        if let Some(node) = child(&root, "buttons") {
            for button in node.children().filter(|n| n.has_tag_name("button")) {
                let id = required_text(&button, "id")?;
                let offset = parse_vec2(optional_text(&button, "offset"), Vec2::ZERO)
                    .with_context(|| format!("button {id}"))?;
                scene.buttons.push(ControlButton { id, offset });
            }
        }

        for node in root.children().filter(|n| n.has_tag_name("landmark")) {
            let landmark = parse_landmark(&node)
                .with_context(|| format!("landmark #{}", scene.landmarks.len() + 1))?;
            scene.landmarks.push(landmark);
        }

        Ok(scene)
    }
}

fn parse_landmark(node: &Node<'_, '_>) -> Result<Registration> {
    let caption = required_text(node, "name")?;
    let info = required_text(node, "info")?;
    let model_path = required_text(node, "model")?;
    let position = parse_vec3(Some(required_text(node, "position")?), Vec3::ZERO)?;
    if !position.is_finite() {
        bail!("position must be finite");
    }
    let offset = parse_vec2(optional_text(node, "label-offset"), Vec2::ZERO)?;
    let placement = ModelPlacement {
        scale: parse_vec3(optional_text(node, "model-scale"), Vec3::ONE)?,
        rotation: parse_vec3(optional_text(node, "model-rotation"), Vec3::ZERO)?,
    };
    let panel = optional_text(node, "panel")
        .map(|value| parse_panel(&value))
        .transpose()?;
    Ok(Registration {
        position,
        info,
        model_path,
        label: LandmarkLabel { caption, offset },
        placement,
        panel,
    })
}

fn parse_panel(value: &str) -> Result<PanelPlacement> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    let [top, left, width, height] = parts.as_slice() else {
        bail!("panel needs four lengths (top left width height), got {value:?}");
    };
    Ok(PanelPlacement {
        top: top.to_string(),
        left: left.to_string(),
        width: width.to_string(),
        height: height.to_string(),
    })
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name(tag))
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_numbers<const N: usize>(value: &str, what: &str) -> Result<[f32; N]> {
    let numbers = value
        .split_whitespace()
        .map(|component| {
            component
                .parse::<f32>()
                .map_err(|err| anyhow!("{what} component {component:?}: {err}"))
        })
        .collect::<Result<Vec<f32>>>()?;
    numbers
        .try_into()
        .map_err(|numbers: Vec<f32>| anyhow!("{what} needs {N} components, got {}", numbers.len()))
}

fn parse_vec2(value: Option<String>, default: Vec2) -> Result<Vec2> {
    match value {
        Some(value) => Ok(Vec2::from_array(parse_numbers(&value, "vector")?)),
        None => Ok(default),
    }
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => Ok(Vec3::from_array(parse_numbers(&value, "vector")?)),
        None => Ok(default),
    }
}

/// Reads an `r g b` triple in the 0..255 range.
fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => Ok(Vec3::from_array(parse_numbers(&value, "color")?) / 255.0),
        None => Ok(default),
    }
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float {value:?}: {err}")),
        None => Ok(default),
    }
}

fn parse_segments(value: Option<String>, default: u32) -> Result<u32> {
    let Some(value) = value else {
        return Ok(default);
    };
    let segments = value
        .parse::<u32>()
        .map_err(|err| anyhow!("failed to parse segment count {value:?}: {err}"))?;
    if segments > MAX_SEGMENTS {
        bail!("segment count {segments} exceeds {MAX_SEGMENTS}");
    }
    Ok(segments)
}

fn parse_bool(value: Option<String>, default: bool) -> Result<bool> {
    match value.as_deref() {
        Some("true") | Some("yes") | Some("1") => Ok(true),
        Some("false") | Some("no") | Some("0") => Ok(false),
        Some(other) => Err(anyhow!("expected a boolean, got {other:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;

    static SAMPLE: Lazy<String> = Lazy::new(|| {
        r#"
    <viewer>
        <preset>proximity</preset>
        <globe>
            <texture>images/earth.jpg</texture>
        </globe>
        <display>
            <threshold>0.6 0.4</threshold>
            <hidden-color>255 128 0</hidden-color>
        </display>
        <buttons>
            <button><id>button1</id><offset>-300 -200</offset></button>
        </buttons>
        <landmark>
            <name>Forest House</name>
            <model>model/forest_house.glb</model>
            <position>5 1 0</position>
            <info>A small house where elves live.</info>
            <label-offset>10 -20</label-offset>
            <model-scale>8 8 8</model-scale>
            <panel>40% 20% 250px 50px</panel>
        </landmark>
    </viewer>
    "#
        .to_string()
    });

    #[test]
    fn parse_scene_applies_preset_and_overrides() {
        let scene = ViewerScene::from_xml(&SAMPLE).unwrap();
        assert_eq!(scene.orbit.min_distance, 7.0);
        assert_eq!(scene.orbit.max_distance, 12.0);
        assert_eq!(scene.display.mode, InfoMode::Proximity);
        assert_eq!(scene.display.button_push, Some(1.5));
        assert_eq!(scene.display.visibility.ndc_threshold, Vec2::new(0.6, 0.4));
        assert_eq!(scene.display.hidden_color, Vec3::new(1.0, 128.0 / 255.0, 0.0));
        assert_eq!(scene.buttons[0].offset, Vec2::new(-300.0, -200.0));
        assert_eq!(scene.camera.position, Vec3::new(0.0, 0.0, 12.0));

        let landmark = &scene.landmarks[0];
        assert_eq!(landmark.label.caption, "Forest House");
        assert_eq!(landmark.label.offset, Vec2::new(10.0, -20.0));
        assert_eq!(landmark.placement.scale, Vec3::splat(8.0));
        assert_eq!(landmark.panel.as_ref().unwrap().width, "250px");
    }

    #[test]
    fn defaults_to_labels_preset() {
        let scene = ViewerScene::from_xml("<viewer/>").unwrap();
        assert_eq!(scene.display.mode, InfoMode::Labels);
        assert_eq!((scene.orbit.min_distance, scene.orbit.max_distance), (9.0, 15.0));
        assert!(scene.landmarks.is_empty());
    }

    #[test]
    fn missing_info_is_an_error() {
        let bad = "<viewer><landmark><name>X</name><model>x.glb</model><position>0 0 5</position></landmark></viewer>";
        let err = ViewerScene::from_xml(bad).unwrap_err();
        assert!(format!("{err:#}").contains("<info> tag is missing"));
    }

    #[test]
    fn globe_segments_are_bounded_integers() {
        let globe = |segments: &str| {
            ViewerScene::from_xml(&format!(
                "<viewer><globe><segments>{segments}</segments></globe></viewer>"
            ))
        };
        assert_eq!(globe("64").unwrap().globe.segments, 64);
        assert_eq!(globe("512").unwrap().globe.segments, 512);
        for bad in ["1e10", "100000", "-4", "12.5"] {
            assert!(globe(bad).is_err(), "{bad} was accepted");
        }
        let err = globe("100000").unwrap_err();
        assert!(format!("{err:#}").contains("exceeds 512"));
    }

    #[test]
    fn short_vectors_are_rejected() {
        let bad = "<viewer><camera><position>0 12</position></camera></viewer>";
        assert!(ViewerScene::from_xml(bad).is_err());
        let bad = "<viewer><controls><min-distance>20</min-distance></controls></viewer>";
        assert!(ViewerScene::from_xml(bad).is_err());
    }
}
