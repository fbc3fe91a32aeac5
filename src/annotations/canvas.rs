//! Annotation canvas: the overlay that owns the shapes, the tools and the
//! undo history
//!
//! Every input handler runs to completion against the in-memory collection
//! and re-renders synchronously when something visible changed.

use ab_glyph::FontArc;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::history::AnnotationHistory;
use super::hit_test::{hit_test_topmost, translate};
use super::host::{ListenerId, ListenerKind, PageHost, ScrollOverflow};
use super::popup::{Popup, PopupAction, PopupKey};
use super::tools::{ToolOutput, ToolSet, ToolStyle, render_annotation, select};
use crate::config::ShapeColor;
use crate::domain::{Annotation, CommentPin, Point, Shape, ToolKind};
use crate::error::CanvasError;
use crate::render::Surface;
use crate::render::geometry::HIT_THRESHOLD;

pub const CURSOR_GRAB: &str = "grab";
pub const CURSOR_GRABBING: &str = "grabbing";

/// How pointer-down on an existing shape is handled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanvasOptions {
    /// Drag any shape from any tool. When off, only comment pins are
    /// special-cased (click to reopen) and moving shapes is left to the
    /// select tool.
    pub universal_drag: bool,
}

impl Default for CanvasOptions {
    fn default() -> Self {
        Self {
            universal_drag: true,
        }
    }
}

/// Everything needed to resume editing a screenshot later
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasState {
    pub annotations: Vec<Annotation>,
    pub pins: Vec<CommentPin>,
}

/// A key press delivered to the canvas
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

/// One draw call of the last render pass, in order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameItem {
    /// Committed shape at this index
    Shape(usize),
    /// The in-progress shape
    Preview,
    /// Selection box around the shape at this index
    Selection(usize),
}

#[derive(Clone, Copy, Debug)]
struct Drag {
    index: usize,
    anchor: Point,
    moved: bool,
}

pub struct AnnotationCanvas {
    host: Box<dyn PageHost>,
    options: CanvasOptions,
    surface: Surface,
    font: Option<FontArc>,

    tool: ToolKind,
    tools: ToolSet,
    annotations: Vec<Annotation>,
    preview: Option<Annotation>,
    history: AnnotationHistory,
    drag: Option<Drag>,
    popup: Option<Popup>,
    on_escape: Option<Box<dyn FnMut()>>,

    active: bool,
    listeners: Vec<ListenerId>,
    saved_overflow: Option<ScrollOverflow>,
    cursor: &'static str,
    frame: Vec<FrameItem>,
}

impl std::fmt::Debug for AnnotationCanvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationCanvas")
            .field("tool", &self.tool)
            .field("annotations", &self.annotations.len())
            .field("active", &self.active)
            .field("popup", &self.popup)
            .finish_non_exhaustive()
    }
}

impl AnnotationCanvas {
    /// Create an inactive canvas sized to the host viewport
    ///
    /// Fails only when no drawing surface can be allocated.
    pub fn new(host: Box<dyn PageHost>) -> Result<Self, CanvasError> {
        Self::with_options(host, CanvasOptions::default())
    }

    pub fn with_options(
        host: Box<dyn PageHost>,
        options: CanvasOptions,
    ) -> Result<Self, CanvasError> {
        let surface = Self::allocate_surface(host.as_ref(), None)?;
        Ok(Self {
            host,
            options,
            surface,
            font: None,
            tool: ToolKind::default(),
            tools: ToolSet::new(ToolStyle::default()),
            annotations: Vec::new(),
            preview: None,
            history: AnnotationHistory::new(),
            drag: None,
            popup: None,
            on_escape: None,
            active: false,
            listeners: Vec::new(),
            saved_overflow: None,
            cursor: ToolSet::cursor(ToolKind::default()),
            frame: Vec::new(),
        })
    }

    fn allocate_surface(
        host: &dyn PageHost,
        font: Option<FontArc>,
    ) -> Result<Surface, CanvasError> {
        let viewport = host.viewport();
        let (width, height) = viewport.physical_size();
        let mut surface = Surface::new(width, height)?;
        surface.set_scale(
            width as f32 / viewport.width.max(1.0),
            height as f32 / viewport.height.max(1.0),
        );
        surface.set_font(font);
        Ok(surface)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Cover the viewport, lock page scroll and start listening for input
    ///
    /// Does nothing when already active.
    pub fn activate(&mut self) -> Result<(), CanvasError> {
        if self.active {
            return Ok(());
        }
        self.resize()?;

        self.saved_overflow = Some(self.host.scroll_overflow());
        self.host.set_scroll_overflow(ScrollOverflow::locked());
        for kind in ListenerKind::ALL {
            let id = self.host.subscribe(kind);
            self.listeners.push(id);
        }
        self.active = true;
        self.set_cursor(ToolSet::cursor(self.tool));
        self.render();
        log::debug!("Annotation canvas activated with {:?}", self.tool);
        Ok(())
    }

    /// Undo everything `activate` did. Does nothing when inactive.
    pub fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        for id in self.listeners.drain(..) {
            if !self.host.unsubscribe(id) {
                log::warn!("Listener {:?} was already removed", id);
            }
        }
        if let Some(overflow) = self.saved_overflow.take() {
            self.host.set_scroll_overflow(overflow);
        }
        self.close_pin_popup();
        self.popup = None;
        self.drag = None;
        self.preview = None;
        self.tools.cancel();
        self.active = false;
        log::debug!("Annotation canvas deactivated");
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Reallocate the surface for the host's current viewport and redraw
    pub fn resize(&mut self) -> Result<(), CanvasError> {
        self.surface = Self::allocate_surface(self.host.as_ref(), self.font.clone())?;
        self.render();
        Ok(())
    }

    /// Deactivate and drop the escape callback
    pub fn destroy(&mut self) {
        self.deactivate();
        self.on_escape = None;
        self.popup = None;
    }

    /// Font for text callouts and pin numbers
    pub fn set_font(&mut self, font: Option<FontArc>) {
        self.font = font.clone();
        self.surface.set_font(font);
        self.render();
    }

    // ========================================================================
    // Pointer input
    // ========================================================================

    pub fn pointer_down(&mut self, p: Point) {
        if !self.active {
            return;
        }

        // Abandoning an unsaved pin shifts indices, so hit-test afterwards
        self.close_pin_popup();

        if self.options.universal_drag {
            if let Some(index) = hit_test_topmost(p, &self.annotations, HIT_THRESHOLD) {
                self.drag = Some(Drag {
                    index,
                    anchor: p,
                    moved: false,
                });
                if self.tool == ToolKind::Select {
                    self.tools.select.set_selected(Some(index));
                }
                self.render();
                return;
            }
        } else if self.tool != ToolKind::Select
            && let Some(index) = self.tools.comment_pin.hit_test(p, &self.annotations)
        {
            self.reopen_pin(index);
            return;
        }

        if self.tool == ToolKind::Select {
            // With universal drag on, a hit never reaches here
            self.tools.select.pointer_down(p, &self.annotations);
            self.render();
            return;
        }

        let output = self.tools.pointer_down(self.tool, p);
        self.apply(output);
    }

    pub fn pointer_move(&mut self, p: Point) {
        if !self.active {
            return;
        }

        if let Some(drag) = self.drag.as_mut() {
            let (dx, dy) = (p.x - drag.anchor.x, p.y - drag.anchor.y);
            if dx == 0.0 && dy == 0.0 {
                return;
            }
            let Some(ann) = self.annotations.get_mut(drag.index) else {
                return;
            };
            *ann = translate(ann, dx, dy);
            drag.anchor = p;
            drag.moved = true;
            self.set_cursor(CURSOR_GRABBING);
            self.render();
            return;
        }

        if self.tools.select.is_dragging() {
            if self
                .tools
                .select
                .pointer_move(p, &mut self.annotations)
                .is_some()
            {
                self.set_cursor(CURSOR_GRABBING);
                self.render();
            }
            return;
        }

        if self.preview.is_none() && !self.tools.is_drawing() {
            let over_shape = hit_test_topmost(p, &self.annotations, HIT_THRESHOLD).is_some();
            let cursor = if over_shape && self.options.universal_drag {
                CURSOR_GRAB
            } else {
                ToolSet::cursor(self.tool)
            };
            self.set_cursor(cursor);
        }

        if let output @ ToolOutput::Preview(_) = self.tools.pointer_move(self.tool, p) {
            self.apply(output);
        }
    }

    pub fn pointer_up(&mut self, p: Point) {
        if !self.active {
            return;
        }

        if let Some(drag) = self.drag.take() {
            self.set_cursor(ToolSet::cursor(self.tool));
            self.finish_move(drag.index, drag.moved);
            self.render();
            return;
        }

        if self.tools.select.is_dragging() {
            let moved = self.tools.select.pointer_up();
            self.set_cursor(ToolSet::cursor(self.tool));
            if let Some(index) = self.tools.select.selected() {
                self.finish_move(index, moved);
            }
            self.render();
            return;
        }

        let had_preview = self.preview.take().is_some();
        let output = self.tools.pointer_up(self.tool, p);
        if output == ToolOutput::None {
            if had_preview {
                self.render();
            }
            return;
        }
        self.apply(output);
    }

    /// Record a finished drag, or treat a click on a pin as "edit"
    fn finish_move(&mut self, index: usize, moved: bool) {
        if moved {
            if let Some(ann) = self.annotations.get(index)
                && let (Some(number), Some(anchor)) = (ann.pin_number(), ann.anchor())
            {
                self.tools.comment_pin.update_position(number, anchor);
            }
            self.history.commit(&self.annotations);
        } else if self
            .annotations
            .get(index)
            .is_some_and(|ann| ann.pin_number().is_some())
        {
            self.reopen_pin(index);
        }
    }

    fn apply(&mut self, output: ToolOutput) {
        match output {
            ToolOutput::None => {}
            ToolOutput::Preview(ann) => {
                self.preview = Some(ann);
                self.render();
            }
            ToolOutput::Commit(ann) => {
                self.preview = None;
                self.commit_shape(ann);
                self.render();
            }
            ToolOutput::OpenPopup(popup) => {
                self.close_pin_popup();
                self.popup = Some(popup);
            }
            ToolOutput::CommitWithPopup(ann, popup) => {
                // The marker enters history at its first save
                self.close_pin_popup();
                self.annotations.push(ann);
                self.popup = Some(popup);
                self.render();
            }
        }
    }

    fn commit_shape(&mut self, ann: Annotation) {
        if !ann.is_complete() {
            log::debug!("Dropping incomplete {:?}", ann.kind());
            return;
        }
        self.annotations.push(ann);
        self.history.commit(&self.annotations);
    }

    // ========================================================================
    // Keyboard and popups
    // ========================================================================

    /// Escape runs the escape callback, Ctrl/Cmd+Z undoes and
    /// Ctrl/Cmd+Shift+Z redoes. While a popup is open it takes Enter and
    /// Escape instead.
    pub fn key_down(&mut self, event: &KeyEvent) {
        if !self.active {
            return;
        }

        if self.popup.is_some() {
            let key = match event.key.as_str() {
                "Enter" if event.shift => Some(PopupKey::ShiftEnter),
                "Enter" => Some(PopupKey::Enter),
                "Escape" => Some(PopupKey::Escape),
                _ => None,
            };
            if let Some(key) = key {
                self.popup_key(key);
                return;
            }
        }

        if event.key == "Escape" {
            if let Some(callback) = self.on_escape.as_mut() {
                callback();
            }
            return;
        }
        if (event.ctrl || event.meta) && event.key.eq_ignore_ascii_case("z") {
            if event.shift {
                self.redo();
            } else {
                self.undo();
            }
        }
    }

    /// Register the Escape handler, replacing any earlier one
    pub fn set_on_escape(&mut self, callback: impl FnMut() + 'static) {
        self.on_escape = Some(Box::new(callback));
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.popup.as_ref()
    }

    /// Replace the open popup's text field contents
    pub fn popup_input(&mut self, text: &str) {
        if let Some(popup) = self.popup.as_mut() {
            *popup.draft_mut() = text.to_string();
        }
    }

    pub fn popup_key(&mut self, key: PopupKey) {
        let Some(popup) = self.popup.as_mut() else {
            return;
        };
        match key.action(popup) {
            Some(action) => self.popup_action(action),
            None => popup.draft_mut().push('\n'),
        }
    }

    /// Press one of the open popup's buttons
    pub fn popup_action(&mut self, action: PopupAction) {
        let Some(popup) = self.popup.take() else {
            return;
        };
        match popup {
            Popup::Text(text_popup) => {
                if action != PopupAction::Save {
                    return;
                }
                if let Some(ann) = self.tools.text.callout(text_popup.anchor, &text_popup.draft) {
                    self.commit_shape(ann);
                    self.render();
                }
            }
            Popup::Pin(pin_popup) => {
                let number = pin_popup.pin_number;
                match action {
                    PopupAction::Save => {
                        let text = pin_popup.draft.trim();
                        if !text.is_empty() {
                            self.save_pin(number, text);
                        } else if !pin_popup.is_edit {
                            self.discard_pin(number);
                        }
                    }
                    PopupAction::Delete if self.tools.comment_pin.pin(number).is_none() => {
                        self.discard_pin(number);
                    }
                    PopupAction::Delete => self.remove_pin(number),
                    PopupAction::Close => {
                        // A new pin closed before its first save leaves nothing behind
                        if !pin_popup.is_edit && self.tools.comment_pin.pin(number).is_none() {
                            self.discard_pin(number);
                        }
                    }
                }
            }
        }
    }

    fn reopen_pin(&mut self, index: usize) {
        let Some(ann) = self.annotations.get(index) else {
            return;
        };
        if let Some(popup) = self.tools.comment_pin.edit_popup(ann) {
            self.popup = Some(popup);
        }
    }

    fn close_pin_popup(&mut self) {
        if matches!(self.popup, Some(Popup::Pin(_))) {
            self.popup_action(PopupAction::Close);
        }
    }

    fn save_pin(&mut self, number: u32, text: &str) {
        let Some(ann) = self
            .annotations
            .iter_mut()
            .find(|ann| ann.pin_number() == Some(number))
        else {
            log::warn!("Comment pin #{} has no marker", number);
            return;
        };
        if let Shape::CommentPin { text: label, .. } = &mut ann.shape {
            *label = text.to_string();
        }
        let anchor = ann.anchor().unwrap_or_default();
        self.tools.comment_pin.upsert(number, text, anchor);
        self.history.commit(&self.annotations);
        self.render();
    }

    fn remove_pin(&mut self, number: u32) {
        self.drop_pin(number);
        self.history.commit(&self.annotations);
        self.render();
    }

    /// Drop a pin that was never saved; it never reached history
    fn discard_pin(&mut self, number: u32) {
        self.drop_pin(number);
        self.render();
    }

    fn drop_pin(&mut self, number: u32) {
        self.tools.comment_pin.remove(number);
        self.annotations
            .retain(|ann| ann.pin_number() != Some(number));
        self.tools.select.clear();
    }

    // ========================================================================
    // Toolbar commands
    // ========================================================================

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn set_tool(&mut self, kind: ToolKind) {
        self.close_pin_popup();
        self.drag = None;
        self.preview = None;
        self.tools.cancel();
        self.tool = kind;
        if self.active {
            self.set_cursor(ToolSet::cursor(kind));
            self.render();
        }
    }

    /// Apply a `#rrggbb` color to every tool; unparsable input draws black
    pub fn set_color(&mut self, hex: &str) {
        self.tools.set_color(ShapeColor::from_hex_or_black(hex));
    }

    pub fn set_stroke_width(&mut self, width: f32) {
        self.tools.set_stroke_width(width);
    }

    pub fn style(&self) -> ToolStyle {
        self.tools.style()
    }

    pub fn undo(&mut self) {
        self.close_pin_popup();
        if let Some(state) = self.history.undo() {
            self.replace_annotations(state);
        }
    }

    pub fn redo(&mut self) {
        self.close_pin_popup();
        if let Some(state) = self.history.redo() {
            self.replace_annotations(state);
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &AnnotationHistory {
        &self.history
    }

    fn replace_annotations(&mut self, state: Vec<Annotation>) {
        self.annotations = state;
        self.drag = None;
        self.preview = None;
        self.tools.select.clear();
        self.render();
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn annotations(&self) -> Vec<Annotation> {
        self.annotations.clone()
    }

    pub fn comment_pins(&self) -> Vec<CommentPin> {
        self.tools.comment_pin.pins().to_vec()
    }

    pub fn save_state(&self) -> CanvasState {
        CanvasState {
            annotations: self.annotations.clone(),
            pins: self.comment_pins(),
        }
    }

    /// Load a saved session; its state becomes the new undo baseline
    pub fn restore_state(&mut self, state: &CanvasState) {
        self.annotations = state.annotations.clone();
        self.tools.comment_pin.restore(&state.pins, &state.annotations);
        self.tools.cancel();
        self.preview = None;
        self.drag = None;
        self.popup = None;
        self.history.reset(&self.annotations);
        self.render();
    }

    /// Forget every shape, pin and undo state, for a brand-new screenshot
    pub fn clear(&mut self) {
        self.annotations.clear();
        self.preview = None;
        self.drag = None;
        self.popup = None;
        self.tools.cancel();
        self.tools.comment_pin.reset();
        self.history.clear();
        self.surface.clear();
        self.frame.clear();
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    pub fn cursor(&self) -> &'static str {
        self.cursor
    }

    fn set_cursor(&mut self, cursor: &'static str) {
        self.cursor = cursor;
        self.host.set_cursor(cursor);
    }

    pub fn host(&self) -> &dyn PageHost {
        self.host.as_ref()
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Draw calls made by the last render pass
    pub fn frame(&self) -> &[FrameItem] {
        &self.frame
    }

    /// Redraw committed shapes in order, then the preview, then the
    /// selection box
    pub fn render(&mut self) {
        self.surface.clear();
        self.frame.clear();

        for (i, ann) in self.annotations.iter().enumerate() {
            render_annotation(ann, &mut self.surface);
            self.frame.push(FrameItem::Shape(i));
        }

        if let Some(preview) = &self.preview {
            render_annotation(preview, &mut self.surface);
            self.frame.push(FrameItem::Preview);
        }

        let selected = match self.drag {
            Some(drag) => Some(drag.index),
            None if self.tool == ToolKind::Select => self.tools.select.selected(),
            None => None,
        };
        if let Some(index) = selected
            && let Some(ann) = self.annotations.get(index)
        {
            select::draw_selection_box(ann, &mut self.surface);
            self.frame.push(FrameItem::Selection(index));
        }
    }

    /// Composite the committed shapes onto `screenshot` at its native
    /// resolution and encode the result as PNG
    ///
    /// Shapes are scaled from viewport to screenshot pixels per axis.
    /// Returns `None` if no composite surface can be created.
    pub fn flatten(&self, screenshot: &RgbaImage) -> Option<Vec<u8>> {
        let viewport = self.host.viewport();
        if viewport.width <= 0.0 || viewport.height <= 0.0 {
            log::warn!("Cannot flatten onto an empty viewport: {:?}", viewport);
            return None;
        }
        let mut composite = match Surface::from_image(screenshot) {
            Ok(surface) => surface,
            Err(err) => {
                log::warn!("Failed to create composite surface: {}", err);
                return None;
            }
        };
        let sx = screenshot.width() as f32 / viewport.width;
        let sy = screenshot.height() as f32 / viewport.height;
        composite.set_scale(sx, sy);
        composite.set_font(self.font.clone());

        for ann in &self.annotations {
            render_annotation(ann, &mut composite);
        }

        match composite.encode_png() {
            Ok(png) => Some(png),
            Err(err) => {
                log::warn!("Failed to encode flattened screenshot: {}", err);
                None
            }
        }
    }
}

impl Drop for AnnotationCanvas {
    fn drop(&mut self) {
        self.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::annotations::host::HeadlessPage;
    use crate::domain::Viewport;

    fn canvas() -> AnnotationCanvas {
        canvas_with(CanvasOptions::default())
    }

    fn canvas_with(options: CanvasOptions) -> AnnotationCanvas {
        let page = HeadlessPage::new(Viewport::new(400.0, 300.0, 1.0));
        let mut canvas = AnnotationCanvas::with_options(Box::new(page), options).unwrap();
        canvas.activate().unwrap();
        canvas
    }

    fn drag(canvas: &mut AnnotationCanvas, from: (f32, f32), to: (f32, f32)) {
        canvas.pointer_down(from.into());
        canvas.pointer_move(to.into());
        canvas.pointer_up(to.into());
    }

    fn click(canvas: &mut AnnotationCanvas, at: (f32, f32)) {
        canvas.pointer_down(at.into());
        canvas.pointer_up(at.into());
    }

    #[test]
    fn test_listeners_return_to_baseline() {
        let page = HeadlessPage::default().with_overflow(ScrollOverflow {
            document: Some("auto".to_string()),
            body: None,
        });
        let mut canvas = AnnotationCanvas::new(Box::new(page)).unwrap();
        let baseline = canvas.host().listener_count();
        let overflow = canvas.host().scroll_overflow();

        for _ in 0..5 {
            canvas.activate().unwrap();
            canvas.activate().unwrap();
            assert_eq!(canvas.host().listener_count(), baseline + ListenerKind::ALL.len());
            assert_eq!(canvas.host().scroll_overflow(), ScrollOverflow::locked());
            canvas.deactivate();
            canvas.deactivate();
            assert_eq!(canvas.host().listener_count(), baseline);
            assert_eq!(canvas.host().scroll_overflow(), overflow);
        }
    }

    #[test]
    fn test_surface_covers_viewport_at_dpr() {
        let page = HeadlessPage::new(Viewport::new(200.0, 100.0, 2.0));
        let mut canvas = AnnotationCanvas::new(Box::new(page)).unwrap();
        canvas.activate().unwrap();
        assert_eq!((canvas.surface().width(), canvas.surface().height()), (400, 200));
    }

    #[test]
    fn test_inactive_canvas_ignores_input() {
        let mut canvas = canvas();
        canvas.deactivate();
        canvas.set_tool(ToolKind::Rectangle);
        drag(&mut canvas, (10.0, 10.0), (50.0, 50.0));
        assert!(canvas.annotations().is_empty());
    }

    #[test]
    fn test_draw_commits_once() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::Rectangle);
        drag(&mut canvas, (10.0, 10.0), (110.0, 60.0));
        let anns = canvas.annotations();
        assert_eq!(anns.len(), 1);
        assert_eq!(anns[0].points, vec![Point::new(10.0, 10.0), Point::new(110.0, 60.0)]);
        assert_eq!(canvas.history().depth(), 1);
    }

    #[test]
    fn test_single_point_pen_stroke_is_dropped() {
        let mut canvas = canvas();
        click(&mut canvas, (20.0, 20.0));
        assert!(canvas.annotations().is_empty());
        assert!(!canvas.can_undo());
    }

    #[test]
    fn test_undo_n_then_redo_n() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::Arrow);
        for i in 0..4 {
            let y = 20.0 + i as f32 * 40.0;
            drag(&mut canvas, (10.0, y), (100.0, y));
        }
        let final_state = canvas.annotations();
        for _ in 0..4 {
            canvas.undo();
        }
        assert!(canvas.annotations().is_empty());
        for _ in 0..4 {
            canvas.redo();
        }
        assert_eq!(canvas.annotations(), final_state);
    }

    #[test]
    fn test_keyboard_undo_redo() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::Rectangle);
        drag(&mut canvas, (10.0, 10.0), (60.0, 60.0));
        canvas.key_down(&KeyEvent::new("z").with_ctrl());
        assert!(canvas.annotations().is_empty());
        canvas.key_down(&KeyEvent::new("Z").with_meta().with_shift());
        assert_eq!(canvas.annotations().len(), 1);
    }

    #[test]
    fn test_escape_callback_last_registration_wins() {
        let mut canvas = canvas();
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));
        let f = first.clone();
        canvas.set_on_escape(move || f.set(f.get() + 1));
        let s = second.clone();
        canvas.set_on_escape(move || s.set(s.get() + 1));
        canvas.key_down(&KeyEvent::new("Escape"));
        assert_eq!((first.get(), second.get()), (0, 1));
    }

    #[test]
    fn test_universal_drag_from_drawing_tool() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::Rectangle);
        drag(&mut canvas, (10.0, 10.0), (60.0, 60.0));

        // Pressing on the left edge moves the shape instead of drawing
        canvas.pointer_down(Point::new(10.0, 30.0));
        canvas.pointer_move(Point::new(20.0, 30.0));
        assert_eq!(canvas.cursor(), CURSOR_GRABBING);
        canvas.pointer_move(Point::new(30.0, 40.0));
        canvas.pointer_up(Point::new(30.0, 40.0));

        let anns = canvas.annotations();
        assert_eq!(anns.len(), 1);
        assert_eq!(anns[0].points[0], Point::new(30.0, 20.0));
        assert_eq!(canvas.history().depth(), 2);
        assert_eq!(canvas.cursor(), "crosshair");
    }

    #[test]
    fn test_zero_move_drag_adds_no_history() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::Rectangle);
        drag(&mut canvas, (10.0, 10.0), (60.0, 60.0));
        click(&mut canvas, (10.0, 30.0));
        assert_eq!(canvas.history().depth(), 1);
        assert!(canvas.popup().is_none());
    }

    #[test]
    fn test_hover_cursor() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::Rectangle);
        drag(&mut canvas, (10.0, 10.0), (60.0, 60.0));
        canvas.pointer_move(Point::new(10.0, 30.0));
        assert_eq!(canvas.cursor(), CURSOR_GRAB);
        canvas.pointer_move(Point::new(200.0, 200.0));
        assert_eq!(canvas.cursor(), "crosshair");
    }

    #[test]
    fn test_comment_pin_flow() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::CommentPin);

        click(&mut canvas, (100.0, 100.0));
        assert!(matches!(canvas.popup(), Some(Popup::Pin(p)) if p.pin_number == 1 && !p.is_edit));
        canvas.popup_input("looks broken");
        canvas.key_down(&KeyEvent::new("Enter"));
        assert!(canvas.popup().is_none());

        let anns = canvas.annotations();
        assert_eq!(anns.len(), 1);
        assert_eq!(anns[0].pin_number(), Some(1));
        assert_eq!(anns[0].text(), Some("looks broken"));
        assert_eq!(
            canvas.comment_pins(),
            vec![CommentPin {
                number: 1,
                text: "looks broken".to_string(),
                x: 100.0,
                y: 100.0,
            }]
        );

        // A second pin abandoned with Escape leaves nothing behind
        let escaped = Rc::new(Cell::new(false));
        let flag = escaped.clone();
        canvas.set_on_escape(move || flag.set(true));
        click(&mut canvas, (300.0, 200.0));
        assert_eq!(canvas.annotations().len(), 2);
        canvas.key_down(&KeyEvent::new("Escape"));
        assert_eq!(canvas.annotations().len(), 1);
        assert_eq!(canvas.comment_pins().len(), 1);
        assert!(!escaped.get());

        // Dragging pin #1 moves the marker and the record together
        drag(&mut canvas, (100.0, 100.0), (120.0, 95.0));
        assert_eq!(canvas.annotations()[0].points, vec![Point::new(120.0, 95.0)]);
        let pin = &canvas.comment_pins()[0];
        assert_eq!((pin.x, pin.y), (120.0, 95.0));
    }

    #[test]
    fn test_click_on_pin_reopens_for_edit() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::CommentPin);
        click(&mut canvas, (50.0, 50.0));
        canvas.popup_input("first");
        canvas.popup_action(PopupAction::Save);

        canvas.set_tool(ToolKind::Pen);
        click(&mut canvas, (52.0, 48.0));
        let Some(Popup::Pin(popup)) = canvas.popup() else {
            panic!("expected pin popup");
        };
        assert!(popup.is_edit);
        assert_eq!(popup.draft, "first");

        // Closing an edit without changes keeps the pin
        canvas.popup_action(PopupAction::Close);
        assert_eq!(canvas.annotations().len(), 1);
        assert_eq!(canvas.comment_pins().len(), 1);
    }

    #[test]
    fn test_pin_delete_removes_marker_and_record() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::CommentPin);
        click(&mut canvas, (50.0, 50.0));
        canvas.popup_input("gone soon");
        canvas.popup_action(PopupAction::Save);
        click(&mut canvas, (50.0, 50.0));
        canvas.popup_action(PopupAction::Delete);
        assert!(canvas.annotations().is_empty());
        assert!(canvas.comment_pins().is_empty());

        // Numbers are not reused after a delete
        click(&mut canvas, (150.0, 150.0));
        assert_eq!(canvas.annotations()[0].pin_number(), Some(2));
    }

    #[test]
    fn test_new_pin_enters_history_on_first_save() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::CommentPin);
        click(&mut canvas, (50.0, 50.0));
        assert_eq!(canvas.annotations().len(), 1);
        assert!(!canvas.can_undo());

        // Escape then undo leaves nothing to bring back
        canvas.key_down(&KeyEvent::new("Escape"));
        canvas.key_down(&KeyEvent::new("z").with_ctrl());
        assert!(canvas.annotations().is_empty());
        assert_eq!(canvas.history().depth(), 0);

        click(&mut canvas, (80.0, 80.0));
        canvas.popup_input("kept");
        canvas.popup_action(PopupAction::Save);
        assert_eq!(canvas.history().depth(), 1);
        canvas.undo();
        assert!(canvas.annotations().is_empty());
        canvas.redo();
        assert_eq!(canvas.annotations()[0].text(), Some("kept"));
    }

    #[test]
    fn test_second_pin_abandons_unsaved_first() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::CommentPin);
        click(&mut canvas, (50.0, 50.0));
        click(&mut canvas, (150.0, 150.0));

        let anns = canvas.annotations();
        assert_eq!(anns.len(), 1);
        assert_eq!(anns[0].points, vec![Point::new(150.0, 150.0)]);
        assert!(matches!(canvas.popup(), Some(Popup::Pin(p)) if p.pin_number == 2));
        canvas.popup_input("second");
        canvas.popup_action(PopupAction::Save);
        assert_eq!(canvas.comment_pins().len(), 1);
        assert!(canvas.annotations().iter().all(|ann| ann.text() != Some("")));
    }

    #[test]
    fn test_switching_to_text_abandons_unsaved_pin() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::CommentPin);
        click(&mut canvas, (50.0, 50.0));
        canvas.set_tool(ToolKind::Text);
        assert!(canvas.popup().is_none());
        assert!(canvas.annotations().is_empty());

        click(&mut canvas, (100.0, 100.0));
        assert!(matches!(canvas.popup(), Some(Popup::Text(_))));
        canvas.popup_input("callout");
        canvas.popup_action(PopupAction::Save);
        let anns = canvas.annotations();
        assert_eq!(anns.len(), 1);
        assert_eq!(anns[0].pin_number(), None);
        assert!(canvas.comment_pins().is_empty());
    }

    #[test]
    fn test_deactivate_abandons_unsaved_pin() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::CommentPin);
        click(&mut canvas, (50.0, 50.0));
        canvas.popup_input("never saved");
        canvas.deactivate();
        assert!(canvas.popup().is_none());
        assert!(canvas.annotations().is_empty());
        assert!(canvas.comment_pins().is_empty());
        assert!(!canvas.can_undo());
    }

    #[test]
    fn test_pointer_down_closes_pin_popup_before_hit_test() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::CommentPin);
        click(&mut canvas, (200.0, 150.0));

        // Shapes stacked above the unsaved marker
        let black = ShapeColor::rgb(0, 0, 0);
        let rect = |a: (f32, f32), b: (f32, f32)| {
            Annotation::new(Shape::Rectangle, vec![a.into(), b.into()], black, 3.0)
        };
        canvas.annotations.push(rect((10.0, 10.0), (60.0, 60.0)));
        canvas.annotations.push(rect((100.0, 100.0), (150.0, 150.0)));

        drag(&mut canvas, (10.0, 30.0), (30.0, 30.0));
        let anns = canvas.annotations();
        assert_eq!(anns.len(), 2);
        assert_eq!(anns[0].points, vec![Point::new(30.0, 10.0), Point::new(80.0, 60.0)]);
        assert_eq!(anns[1].points, vec![Point::new(100.0, 100.0), Point::new(150.0, 150.0)]);
        assert!(canvas.popup().is_none());
        assert!(canvas.comment_pins().is_empty());
    }

    #[test]
    fn test_pointer_down_on_empty_space_closes_pin_popup() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::CommentPin);
        click(&mut canvas, (50.0, 50.0));
        canvas.popup_input("saved");
        canvas.popup_action(PopupAction::Save);

        // Reopened for edit from the select tool, then a click away
        canvas.set_tool(ToolKind::Select);
        click(&mut canvas, (50.0, 50.0));
        assert!(matches!(canvas.popup(), Some(Popup::Pin(p)) if p.is_edit));
        click(&mut canvas, (300.0, 250.0));
        assert!(canvas.popup().is_none());
        assert_eq!(canvas.annotations().len(), 1);
        assert_eq!(canvas.comment_pins().len(), 1);
    }

    #[test]
    fn test_shift_enter_adds_newline_to_pin_comment() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::CommentPin);
        click(&mut canvas, (50.0, 50.0));
        canvas.popup_input("line one");
        canvas.key_down(&KeyEvent::new("Enter").with_shift());
        assert_eq!(canvas.popup().map(Popup::draft), Some("line one\n"));
    }

    #[test]
    fn test_text_tool_popup_commit() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::Text);
        click(&mut canvas, (40.0, 120.0));
        assert!(canvas.annotations().is_empty());
        assert!(matches!(canvas.popup(), Some(Popup::Text(_))));

        canvas.popup_input("  misaligned  ");
        canvas.key_down(&KeyEvent::new("Enter"));
        let anns = canvas.annotations();
        assert_eq!(anns.len(), 1);
        assert_eq!(anns[0].text(), Some("misaligned"));
        assert_eq!(anns[0].points, vec![Point::new(40.0, 120.0)]);
        assert!(canvas.can_undo());
    }

    #[test]
    fn test_blank_text_popup_adds_nothing() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::Text);
        click(&mut canvas, (40.0, 120.0));
        canvas.popup_input("   ");
        canvas.popup_action(PopupAction::Save);
        assert!(canvas.annotations().is_empty());
        assert!(!canvas.can_undo());
    }

    #[test]
    fn test_render_order() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::Rectangle);
        drag(&mut canvas, (10.0, 10.0), (60.0, 60.0));
        canvas.set_tool(ToolKind::Arrow);
        drag(&mut canvas, (100.0, 100.0), (200.0, 100.0));

        canvas.set_tool(ToolKind::Select);
        canvas.pointer_down(Point::new(10.0, 30.0));
        canvas.pointer_up(Point::new(10.0, 30.0));
        assert_eq!(
            canvas.frame(),
            &[FrameItem::Shape(0), FrameItem::Shape(1), FrameItem::Selection(0)]
        );

        canvas.set_tool(ToolKind::Pen);
        canvas.pointer_down(Point::new(300.0, 250.0));
        canvas.pointer_move(Point::new(310.0, 260.0));
        assert_eq!(
            canvas.frame(),
            &[FrameItem::Shape(0), FrameItem::Shape(1), FrameItem::Preview]
        );
    }

    #[test]
    fn test_select_click_on_empty_space_clears_selection() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::Rectangle);
        drag(&mut canvas, (10.0, 10.0), (60.0, 60.0));
        canvas.set_tool(ToolKind::Select);
        click(&mut canvas, (10.0, 30.0));
        click(&mut canvas, (300.0, 250.0));
        assert_eq!(canvas.frame(), &[FrameItem::Shape(0)]);
    }

    #[test]
    fn test_without_universal_drag_tools_draw_over_shapes() {
        let mut canvas = canvas_with(CanvasOptions {
            universal_drag: false,
        });
        canvas.set_tool(ToolKind::Rectangle);
        drag(&mut canvas, (10.0, 10.0), (60.0, 60.0));
        drag(&mut canvas, (10.0, 30.0), (80.0, 80.0));
        assert_eq!(canvas.annotations().len(), 2);

        // The select tool does its own dragging
        canvas.set_tool(ToolKind::Select);
        drag(&mut canvas, (80.0, 50.0), (90.0, 50.0));
        assert_eq!(canvas.annotations()[1].points[1], Point::new(90.0, 80.0));
        assert_eq!(canvas.history().depth(), 3);
    }

    #[test]
    fn test_without_universal_drag_pins_still_reopen() {
        let mut canvas = canvas_with(CanvasOptions {
            universal_drag: false,
        });
        canvas.set_tool(ToolKind::CommentPin);
        click(&mut canvas, (50.0, 50.0));
        canvas.popup_input("note");
        canvas.popup_action(PopupAction::Save);
        click(&mut canvas, (50.0, 50.0));
        assert!(matches!(canvas.popup(), Some(Popup::Pin(p)) if p.is_edit));
        assert_eq!(canvas.annotations().len(), 1);
    }

    #[test]
    fn test_style_survives_tool_switch() {
        let mut canvas = canvas();
        canvas.set_color("#22c55e");
        canvas.set_stroke_width(6.0);
        canvas.set_tool(ToolKind::Arrow);
        drag(&mut canvas, (10.0, 10.0), (90.0, 10.0));
        let ann = &canvas.annotations()[0];
        assert_eq!(ann.color, ShapeColor::rgb(0x22, 0xc5, 0x5e));
        assert_eq!(ann.stroke_width, 6.0);
    }

    #[test]
    fn test_save_and_restore_state() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::CommentPin);
        click(&mut canvas, (50.0, 50.0));
        canvas.popup_input("one");
        canvas.popup_action(PopupAction::Save);
        let saved = canvas.save_state();

        canvas.clear();
        assert!(canvas.annotations().is_empty());
        assert!(canvas.comment_pins().is_empty());
        assert!(!canvas.can_undo());

        canvas.restore_state(&saved);
        assert_eq!(canvas.save_state(), saved);
        assert!(!canvas.can_undo());

        // Numbering continues after the restored pins
        click(&mut canvas, (150.0, 150.0));
        assert_eq!(canvas.annotations()[1].pin_number(), Some(2));
    }

    #[test]
    fn test_returned_state_is_a_copy() {
        let mut canvas = canvas();
        canvas.set_tool(ToolKind::Rectangle);
        drag(&mut canvas, (10.0, 10.0), (60.0, 60.0));
        let mut copy = canvas.annotations();
        copy[0].points[0] = Point::new(0.0, 0.0);
        assert_eq!(canvas.annotations()[0].points[0], Point::new(10.0, 10.0));
    }

    #[test]
    fn test_flatten_scales_to_screenshot() {
        let page = HeadlessPage::new(Viewport::new(1280.0, 800.0, 1.0));
        let mut canvas = AnnotationCanvas::new(Box::new(page)).unwrap();
        canvas.activate().unwrap();
        canvas.set_tool(ToolKind::Rectangle);
        drag(&mut canvas, (10.0, 10.0), (110.0, 60.0));

        let screenshot = RgbaImage::from_pixel(1920, 1080, image::Rgba([255, 255, 255, 255]));
        let png = canvas.flatten(&screenshot).unwrap();
        let out = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(out.dimensions(), (1920, 1080));

        let is_red = |x: u32, y: u32| {
            let px = out.get_pixel(x, y);
            px[0] > 200 && px[1] < 120 && px[2] < 120
        };
        // Edges at x = 15, 165 and y = 13.5, 81
        assert!(is_red(15, 40));
        assert!(is_red(165, 40));
        assert!(is_red(90, 13));
        assert!(is_red(90, 81));
        assert!(!is_red(90, 40));
        assert!(!is_red(90, 5));
        assert!(!is_red(175, 40));
    }
}
