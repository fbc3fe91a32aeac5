//! Feedback widget controller
//!
//! Owns the annotation canvas and the attachment lists, drives the
//! `idle → panel-open → annotating → submitting → success | error` state
//! machine and performs the submission against the tracker. All collaborator
//! calls are awaited one at a time, in attachment order.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use image::RgbaImage;

use super::state::{
    AttachmentKind, FileAttachment, ScreenshotSession, SelectedFile, WidgetEvent, WidgetState,
    sanitize_filename,
};
use crate::annotations::{AnnotationCanvas, KeyEvent, PageHost};
use crate::api::{ApiClient, AttachmentConfirmation, CardPosition, CommentAuthor, NewCard};
use crate::capture::optimize::{
    MIME_JPEG, MIME_PNG, generate_thumbnail, optimize_blob_to_jpeg, optimize_file,
    optimize_screenshot, thumbnail_from_image,
};
use crate::capture::{Blob, Recording, ScreenshotCapture};
use crate::config::{MAX_ATTACHMENTS, WidgetConfig};
use crate::domain::CommentPin;
use crate::error::{ApiError, AttachmentError, CaptureError, WidgetError};
use crate::session::metadata::{build_description, capture_metadata};
use crate::session::{CONSOLE, ConsoleCapture, PageInfo};

/// Characters of the description used as the card title
const TITLE_MAX_CHARS: usize = 100;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

type Listener = Box<dyn FnMut() -> anyhow::Result<()>>;

/// Everything the widget talks to outside this crate
pub struct Collaborators<A, S> {
    pub api: A,
    pub screenshot: S,
    /// Page the annotation overlay attaches to
    pub host: Box<dyn PageHost>,
    pub page: PageInfo,
}

pub struct FeedbackWidget<A, S> {
    config: WidgetConfig,
    api: A,
    screenshot: S,
    page: PageInfo,
    console: &'static ConsoleCapture,

    canvas: AnnotationCanvas,
    escape_requested: Rc<Cell<bool>>,

    state: WidgetState,
    error_message: Option<String>,
    screenshots: Vec<ScreenshotSession>,
    files: Vec<FileAttachment>,
    /// Session being re-edited; `None` while annotating a fresh capture
    editing: Option<usize>,
    current_screenshot: Option<RgbaImage>,
    feedback_list_id: Option<String>,
    listeners: HashMap<WidgetEvent, Vec<Listener>>,
}

impl<A, S> std::fmt::Debug for FeedbackWidget<A, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackWidget")
            .field("state", &self.state)
            .field("screenshots", &self.screenshots.len())
            .field("files", &self.files.len())
            .field("editing", &self.editing)
            .finish_non_exhaustive()
    }
}

impl<A: ApiClient, S: ScreenshotCapture> FeedbackWidget<A, S> {
    pub fn new(
        config: WidgetConfig,
        collaborators: Collaborators<A, S>,
    ) -> Result<Self, WidgetError> {
        config.validate()?;
        let Collaborators {
            api,
            screenshot,
            host,
            page,
        } = collaborators;

        let mut canvas = AnnotationCanvas::new(host)?;
        let escape_requested = Rc::new(Cell::new(false));
        let flag = Rc::clone(&escape_requested);
        canvas.set_on_escape(move || flag.set(true));

        Ok(Self {
            config,
            api,
            screenshot,
            page,
            console: &CONSOLE,
            canvas,
            escape_requested,
            state: WidgetState::Idle,
            error_message: None,
            screenshots: Vec::new(),
            files: Vec::new(),
            editing: None,
            current_screenshot: None,
            feedback_list_id: None,
            listeners: HashMap::new(),
        })
    }

    /// Read console lines from `console` instead of the process-wide sink
    pub fn with_console(mut self, console: &'static ConsoleCapture) -> Self {
        self.console = console;
        self
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn state(&self) -> WidgetState {
        self.state
    }

    /// Message the panel should show, if any
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn console(&self) -> &'static ConsoleCapture {
        self.console
    }

    pub fn canvas(&self) -> &AnnotationCanvas {
        &self.canvas
    }

    /// Canvas access for pointer input and toolbar commands
    pub fn canvas_mut(&mut self) -> &mut AnnotationCanvas {
        &mut self.canvas
    }

    pub fn set_page_info(&mut self, page: PageInfo) {
        self.page = page;
    }

    pub fn screenshots(&self) -> &[ScreenshotSession] {
        &self.screenshots
    }

    pub fn files(&self) -> &[FileAttachment] {
        &self.files
    }

    pub fn attachment_count(&self) -> usize {
        self.screenshots.len() + self.files.len()
    }

    /// Combined size of every upload payload, in bytes
    pub fn total_size(&self) -> usize {
        self.screenshots.iter().map(|s| s.blob.len()).sum::<usize>()
            + self.files.iter().map(|f| f.blob.len()).sum::<usize>()
    }

    /// Subscribe to a widget event
    ///
    /// A failing callback is logged and does not stop the others.
    pub fn on(
        &mut self,
        event: WidgetEvent,
        callback: impl FnMut() -> anyhow::Result<()> + 'static,
    ) {
        self.listeners
            .entry(event)
            .or_default()
            .push(Box::new(callback));
    }

    // ========================================================================
    // Panel
    // ========================================================================

    /// Show the panel; only from `idle`
    pub fn open(&mut self) {
        if self.state != WidgetState::Idle {
            return;
        }
        self.state = WidgetState::PanelOpen;
        self.error_message = None;
        self.emit(WidgetEvent::Open);
    }

    /// Hide everything and drop all attachments
    ///
    /// An in-progress annotation session is saved first, then discarded with
    /// the rest.
    pub fn close(&mut self) {
        if self.state == WidgetState::Idle {
            return;
        }
        self.exit_annotation_mode();
        self.canvas.clear();
        self.release_attachments();
        self.error_message = None;
        self.state = WidgetState::Idle;
        self.emit(WidgetEvent::Close);
    }

    /// Tear down for good: the canvas stops listening and every listener is
    /// dropped
    pub fn destroy(&mut self) {
        self.canvas.destroy();
        self.canvas.clear();
        self.release_attachments();
        self.listeners.clear();
        self.state = WidgetState::Idle;
    }

    // ========================================================================
    // Annotation sessions
    // ========================================================================

    /// Capture the viewport and start annotating it
    pub async fn start_annotation(&mut self) -> Result<(), WidgetError> {
        if self.state != WidgetState::PanelOpen {
            return Err(self.invalid("annotate"));
        }
        self.editing = None;
        self.enter_annotation_mode().await
    }

    /// Reopen a saved screenshot session; the current one is saved first
    /// when annotating
    pub async fn edit_screenshot(&mut self, index: usize) -> Result<(), WidgetError> {
        if !matches!(
            self.state,
            WidgetState::PanelOpen | WidgetState::Annotating
        ) {
            return Err(self.invalid("edit a screenshot"));
        }
        if index >= self.screenshots.len() {
            return Err(AttachmentError::NoSuchAttachment(index).into());
        }

        if self.state == WidgetState::Annotating {
            self.save_current_session();
            self.canvas.clear();
        }
        self.editing = Some(index);
        self.enter_annotation_mode().await
    }

    /// Save the session and return to the panel
    ///
    /// Bound to Escape and the toolbar's Done button. Returns whether a
    /// session was saved; does nothing outside `annotating`.
    pub fn exit_annotation_mode(&mut self) -> bool {
        if self.state != WidgetState::Annotating {
            return false;
        }
        // Deactivating first drops a pin that was never saved
        self.canvas.deactivate();
        let saved = self.save_current_session();

        self.state = WidgetState::PanelOpen;
        self.canvas.clear();
        self.editing = None;
        self.current_screenshot = None;
        self.escape_requested.set(false);
        saved
    }

    /// Forward a key press to the canvas; Escape leaves annotation mode
    pub fn key_down(&mut self, event: &KeyEvent) {
        self.canvas.key_down(event);
        if self.escape_requested.replace(false) {
            self.exit_annotation_mode();
        }
    }

    async fn enter_annotation_mode(&mut self) -> Result<(), WidgetError> {
        match self.editing.and_then(|i| self.screenshots.get(i)) {
            Some(session) => {
                self.current_screenshot = Some(session.screenshot.clone());
                let state = session.state.clone();
                self.canvas.restore_state(&state);
            }
            None => match self.screenshot.capture().await {
                Ok(image) => {
                    self.current_screenshot = Some(image);
                    self.canvas.clear();
                }
                Err(err) => {
                    log::warn!("Screenshot capture failed: {}", err);
                    self.abort_annotation();
                    let err = WidgetError::Capture(err);
                    self.error_message = Some(err.to_string());
                    return Err(err);
                }
            },
        }

        if let Err(err) = self.canvas.activate() {
            log::warn!("Failed to activate annotation canvas: {}", err);
            self.abort_annotation();
            return Err(err.into());
        }
        self.state = WidgetState::Annotating;
        self.error_message = None;
        Ok(())
    }

    fn abort_annotation(&mut self) {
        self.editing = None;
        self.current_screenshot = None;
        if self.state == WidgetState::Annotating {
            self.canvas.deactivate();
            self.state = WidgetState::PanelOpen;
        }
    }

    /// Flatten the canvas onto the current capture and store it as a
    /// session, replacing the one being edited
    ///
    /// A fresh capture with nothing drawn is not saved. Limit violations
    /// are reported through `error_message`.
    fn save_current_session(&mut self) -> bool {
        let Some(screenshot) = self.current_screenshot.clone() else {
            return false;
        };
        let state = self.canvas.save_state();
        let has_content = !state.annotations.is_empty() || !state.pins.is_empty();
        if !has_content && self.editing.is_none() {
            return false;
        }

        let blob = match self.optimized_screenshot(&screenshot) {
            Ok(blob) => blob,
            Err(err) => {
                log::warn!("Failed to optimize screenshot: {}", err);
                self.error_message = Some(err.to_string());
                return false;
            }
        };

        let replaced = self
            .editing
            .and_then(|i| self.screenshots.get(i))
            .map_or(0, |session| session.blob.len());
        if let Err(err) = self.check_size(self.total_size() - replaced + blob.len()) {
            self.report(err);
            return false;
        }
        if self.editing.is_none()
            && let Err(err) = self.check_count()
        {
            self.report(err);
            return false;
        }

        let session = ScreenshotSession {
            thumbnail: thumbnail_from_image(&screenshot),
            screenshot,
            state,
            blob,
        };
        match self.editing.filter(|i| *i < self.screenshots.len()) {
            Some(i) => self.screenshots[i] = session,
            None => self.screenshots.push(session),
        }
        true
    }

    fn optimized_screenshot(&self, screenshot: &RgbaImage) -> Result<Blob, CaptureError> {
        if !self.canvas.annotations().is_empty()
            && let Some(png) = self.canvas.flatten(screenshot)
        {
            return Ok(optimize_blob_to_jpeg(&Blob::new(png, MIME_PNG)));
        }
        optimize_screenshot(screenshot)
    }

    // ========================================================================
    // Files and recordings
    // ========================================================================

    /// Optimize and add user-picked files in order
    ///
    /// Stops at the first file that would break the count or size limit.
    /// Files that cannot be processed are skipped. Returns how many were
    /// added.
    pub fn attach_files(&mut self, files: impl IntoIterator<Item = SelectedFile>) -> usize {
        let mut added = 0;
        for file in files {
            if let Err(err) = self.check_count() {
                self.report(err);
                break;
            }
            if file.blob.is_empty() {
                log::warn!("Skipping empty file {}", file.name);
                continue;
            }

            let blob = optimize_file(&file.blob);
            if let Err(err) = self.check_size(self.total_size() + blob.len()) {
                self.report(err);
                break;
            }
            let thumbnail = generate_thumbnail(&blob);
            log::debug!(
                "Attached {} ({} -> {} bytes)",
                file.name,
                file.blob.len(),
                blob.len()
            );
            self.files.push(FileAttachment {
                name: file.name,
                blob,
                thumbnail,
            });
            added += 1;
        }
        added
    }

    /// Add a finished screen recording as a file attachment
    pub fn attach_recording(&mut self, recording: Recording) -> Result<(), AttachmentError> {
        let checked = self
            .check_count()
            .and_then(|()| self.check_size(self.total_size() + recording.blob.len()));
        if let Err(err) = checked {
            self.report(err.clone());
            return Err(err);
        }
        let name = recording.filename(chrono::Utc::now().timestamp_millis());
        let thumbnail = generate_thumbnail(&recording.blob);
        self.files.push(FileAttachment {
            name,
            blob: recording.blob,
            thumbnail,
        });
        Ok(())
    }

    pub fn remove_attachment(
        &mut self,
        index: usize,
        kind: AttachmentKind,
    ) -> Result<(), AttachmentError> {
        match kind {
            AttachmentKind::Screenshot => {
                if index >= self.screenshots.len() {
                    return Err(AttachmentError::NoSuchAttachment(index));
                }
                self.screenshots.remove(index);
                self.editing = match self.editing {
                    Some(i) if i == index => None,
                    Some(i) if i > index => Some(i - 1),
                    other => other,
                };
            }
            AttachmentKind::File => {
                if index >= self.files.len() {
                    return Err(AttachmentError::NoSuchAttachment(index));
                }
                self.files.remove(index);
            }
        }
        Ok(())
    }

    fn check_count(&self) -> Result<(), AttachmentError> {
        if self.attachment_count() >= MAX_ATTACHMENTS {
            return Err(AttachmentError::TooManyAttachments {
                max: MAX_ATTACHMENTS,
            });
        }
        Ok(())
    }

    fn check_size(&self, new_total: usize) -> Result<(), AttachmentError> {
        if new_total as u64 > self.config.max_attachment_bytes {
            return Err(AttachmentError::SizeLimitExceeded {
                limit_mb: self.config.max_attachment_megabytes(),
            });
        }
        Ok(())
    }

    fn report(&mut self, err: AttachmentError) {
        log::warn!("Attachment rejected: {}", err);
        self.error_message = Some(err.to_string());
    }

    fn release_attachments(&mut self) {
        self.screenshots.clear();
        self.files.clear();
        self.editing = None;
        self.current_screenshot = None;
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// File the feedback as a card with every attachment and pin comment
    ///
    /// An open annotation session is saved first. On failure the widget
    /// moves to `error` with the server's message and can be submitted
    /// again; anything already uploaded stays on the server.
    pub async fn submit(&mut self, description: &str) -> Result<(), WidgetError> {
        match self.state {
            WidgetState::PanelOpen | WidgetState::Error => {}
            WidgetState::Annotating => {
                self.exit_annotation_mode();
            }
            _ => return Err(self.invalid("submit")),
        }

        self.state = WidgetState::Submitting;
        self.error_message = None;

        match self.deliver(description).await {
            Ok(card_id) => {
                log::debug!("Feedback filed as card {}", card_id);
                self.canvas.deactivate();
                self.canvas.clear();
                self.release_attachments();
                self.state = WidgetState::Success;
                self.emit(WidgetEvent::Submit);
                Ok(())
            }
            Err(err) => {
                log::warn!("Feedback submission failed: {}", err);
                self.state = WidgetState::Error;
                self.error_message = Some(err.to_string());
                self.emit(WidgetEvent::Error);
                Err(err.into())
            }
        }
    }

    async fn deliver(&mut self, description: &str) -> Result<String, ApiError> {
        let list_id = self.ensure_feedback_list().await?;

        let metadata = capture_metadata(&self.page, &self.config.metadata, self.console);
        let title: String = description.chars().take(TITLE_MAX_CHARS).collect();
        let title = if title.is_empty() {
            format!("Feedback from {}", metadata.url)
        } else {
            title
        };
        let author = CommentAuthor::new(&self.config.user_name, &self.config.user_email);

        let card = self
            .api
            .create_card(&NewCard {
                title,
                description: build_description(description, &metadata),
                list_public_id: list_id,
                label_public_ids: Vec::new(),
                member_public_ids: Vec::new(),
                position: CardPosition::End,
                external_created_by_name: author.name.clone(),
                external_created_by_email: author.email.clone(),
            })
            .await?;
        let card_id = card.public_id;

        let multiple = self.screenshots.len() > 1;
        for (i, session) in self.screenshots.iter().enumerate() {
            let millis = chrono::Utc::now().timestamp_millis();
            let filename = format!("feedback-screenshot-{}-{millis}.jpg", i + 1);
            self.upload(&card_id, &filename, MIME_JPEG, &session.blob.data)
                .await?;

            for pin in session.pins() {
                let comment = pin_comment(i, pin, multiple);
                self.api.add_comment(&card_id, &comment, &author).await?;
            }
        }

        for file in &self.files {
            let filename = if file.name.is_empty() {
                format!("attachment-{}", chrono::Utc::now().timestamp_millis())
            } else {
                sanitize_filename(&file.name)
            };
            let content_type = if file.blob.content_type.is_empty() {
                FALLBACK_CONTENT_TYPE
            } else {
                file.blob.content_type.as_str()
            };
            self.upload(&card_id, &filename, content_type, &file.blob.data)
                .await?;
        }

        Ok(card_id)
    }

    /// Presigned upload: request a URL, PUT the bytes, then confirm
    async fn upload(
        &self,
        card_id: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<(), ApiError> {
        let target = self
            .api
            .generate_upload_url(card_id, filename, content_type, data.len())
            .await?;
        self.api
            .upload_blob(&target.url, filename, content_type, data)
            .await?;
        self.api
            .confirm_attachment(
                card_id,
                &AttachmentConfirmation {
                    s3_key: target.key,
                    filename: filename.to_string(),
                    original_filename: filename.to_string(),
                    content_type: content_type.to_string(),
                    size: data.len(),
                },
            )
            .await
    }

    /// Id of the configured feedback list, creating it on first use
    async fn ensure_feedback_list(&mut self) -> Result<String, ApiError> {
        if let Some(id) = &self.feedback_list_id {
            return Ok(id.clone());
        }

        let board = self.api.get_board(&self.config.board_id).await?;
        let id = match board.find_list(&self.config.feedback_list_name) {
            Some(list) => list.public_id.clone(),
            None => {
                log::debug!(
                    "Creating list {:?} on board {}",
                    self.config.feedback_list_name,
                    self.config.board_id
                );
                self.api
                    .create_list(&self.config.board_id, &self.config.feedback_list_name)
                    .await?
                    .public_id
            }
        };
        self.feedback_list_id = Some(id.clone());
        Ok(id)
    }

    // ---- private helpers ----

    fn invalid(&self, action: &'static str) -> WidgetError {
        WidgetError::InvalidState {
            action,
            state: self.state.name(),
        }
    }

    fn emit(&mut self, event: WidgetEvent) {
        let Some(listeners) = self.listeners.get_mut(&event) else {
            return;
        };
        for callback in listeners.iter_mut() {
            if let Err(err) = callback() {
                log::warn!("{:?} listener failed: {:#}", event, err);
            }
        }
    }
}

/// Card comment for a pin; prefixed with the screenshot number when the
/// card has more than one
pub fn pin_comment(screenshot_index: usize, pin: &CommentPin, multiple: bool) -> String {
    let prefix = if multiple {
        format!("📌 Screenshot {}, #{}", screenshot_index + 1, pin.number)
    } else {
        format!("📌 #{}", pin.number)
    };
    format!("{prefix}: {}", pin.text)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use image::Rgba;

    use super::*;
    use crate::annotations::{CanvasState, HeadlessPage, PopupKey};
    use crate::api::{Board, BoardList, Card, UploadUrl};
    use crate::capture::FixedScreenshot;
    use crate::capture::optimize::Thumbnail;
    use crate::domain::{Point, ToolKind, Viewport};

    #[derive(Default)]
    struct FakeApi {
        calls: RefCell<Vec<String>>,
        lists: Vec<BoardList>,
        fail_uploads: bool,
    }

    impl FakeApi {
        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn record(&self, call: String) {
            self.calls.borrow_mut().push(call);
        }
    }

    impl ApiClient for FakeApi {
        async fn get_board(&self, board_id: &str) -> Result<Board, ApiError> {
            self.record(format!("get_board {board_id}"));
            Ok(Board {
                public_id: board_id.to_string(),
                name: "Product".to_string(),
                lists: self.lists.clone(),
            })
        }

        async fn create_list(&self, _board_id: &str, name: &str) -> Result<BoardList, ApiError> {
            self.record(format!("create_list {name}"));
            Ok(BoardList {
                public_id: "list-new".to_string(),
                name: name.to_string(),
            })
        }

        async fn create_card(&self, card: &NewCard) -> Result<Card, ApiError> {
            self.record(format!("create_card {} in {}", card.title, card.list_public_id));
            Ok(Card {
                public_id: "card-1".to_string(),
            })
        }

        async fn generate_upload_url(
            &self,
            _card_id: &str,
            filename: &str,
            content_type: &str,
            _size: usize,
        ) -> Result<UploadUrl, ApiError> {
            self.record(format!("upload_url {content_type}"));
            Ok(UploadUrl {
                url: format!("https://s3.test/{filename}"),
                key: format!("cards/card-1/{filename}"),
            })
        }

        async fn upload_blob(
            &self,
            _url: &str,
            filename: &str,
            _content_type: &str,
            _data: &[u8],
        ) -> Result<(), ApiError> {
            if self.fail_uploads {
                return Err(ApiError::Upload {
                    filename: filename.to_string(),
                    status: 403,
                });
            }
            self.record("put".to_string());
            Ok(())
        }

        async fn confirm_attachment(
            &self,
            _card_id: &str,
            attachment: &AttachmentConfirmation,
        ) -> Result<(), ApiError> {
            self.record(format!("confirm {}", attachment.content_type));
            Ok(())
        }

        async fn add_comment(
            &self,
            _card_id: &str,
            comment: &str,
            _author: &CommentAuthor,
        ) -> Result<(), ApiError> {
            self.record(format!("comment {comment}"));
            Ok(())
        }
    }

    struct DeniedScreenshot;

    impl ScreenshotCapture for DeniedScreenshot {
        async fn capture(&mut self) -> Result<RgbaImage, CaptureError> {
            Err(CaptureError::PermissionDenied)
        }
    }

    static TEST_CONSOLE: ConsoleCapture = ConsoleCapture::new();

    fn page() -> PageInfo {
        PageInfo {
            url: "https://app.example.com/settings".to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0"
                .to_string(),
            viewport_width: 320,
            viewport_height: 200,
            screen_width: 1920,
            screen_height: 1080,
        }
    }

    fn widget_with<S: ScreenshotCapture>(
        config: WidgetConfig,
        api: FakeApi,
        screenshot: S,
    ) -> FeedbackWidget<FakeApi, S> {
        let host = HeadlessPage::new(Viewport::new(320.0, 200.0, 1.0));
        FeedbackWidget::new(
            config,
            Collaborators {
                api,
                screenshot,
                host: Box::new(host),
                page: page(),
            },
        )
        .unwrap()
        .with_console(&TEST_CONSOLE)
    }

    fn widget() -> FeedbackWidget<FakeApi, FixedScreenshot> {
        let capture = RgbaImage::from_pixel(320, 200, Rgba([240, 240, 240, 255]));
        widget_with(
            WidgetConfig::new("kan_key", "board-1", "http://localhost:4310"),
            FakeApi::default(),
            FixedScreenshot::new(capture),
        )
    }

    fn noise(width: u32, height: u32) -> RgbaImage {
        let mut seed: u32 = 0x9e37_79b9;
        RgbaImage::from_fn(width, height, |_, _| {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let [r, g, b, _] = seed.to_le_bytes();
            Rgba([r, g, b, 255])
        })
    }

    fn session_of_size(bytes: usize) -> ScreenshotSession {
        ScreenshotSession {
            screenshot: RgbaImage::new(4, 4),
            state: CanvasState::default(),
            blob: Blob::new(vec![0; bytes], MIME_JPEG),
            thumbnail: Thumbnail {
                image: Blob::default(),
                label: None,
            },
        }
    }

    fn drop_pin(widget: &mut FeedbackWidget<FakeApi, FixedScreenshot>, p: Point, text: &str) {
        let canvas = widget.canvas_mut();
        canvas.set_tool(ToolKind::CommentPin);
        canvas.pointer_down(p);
        canvas.pointer_up(p);
        canvas.popup_input(text);
        canvas.popup_key(PopupKey::Enter);
    }

    #[test]
    fn test_open_close_events() {
        let mut widget = widget();
        let log = Rc::new(RefCell::new(Vec::new()));
        for event in [WidgetEvent::Open, WidgetEvent::Close] {
            let log = Rc::clone(&log);
            widget.on(event, move || {
                log.borrow_mut().push(event);
                Ok(())
            });
        }

        widget.open();
        widget.open();
        assert_eq!(widget.state(), WidgetState::PanelOpen);
        widget.close();
        widget.close();
        assert_eq!(widget.state(), WidgetState::Idle);
        assert_eq!(*log.borrow(), vec![WidgetEvent::Open, WidgetEvent::Close]);
    }

    #[test]
    fn test_failing_listener_is_isolated() {
        let mut widget = widget();
        let reached = Rc::new(Cell::new(false));
        widget.on(WidgetEvent::Open, || Err(anyhow::anyhow!("listener bug")));
        let flag = Rc::clone(&reached);
        widget.on(WidgetEvent::Open, move || {
            flag.set(true);
            Ok(())
        });

        widget.open();
        assert!(reached.get());
        assert_eq!(widget.state(), WidgetState::PanelOpen);
    }

    #[tokio::test]
    async fn test_annotation_requires_open_panel() {
        let mut widget = widget();
        let err = widget.start_annotation().await.unwrap_err();
        assert!(matches!(
            err,
            WidgetError::InvalidState {
                state: "idle",
                ..
            }
        ));
        assert!(!widget.canvas().is_active());
    }

    #[tokio::test]
    async fn test_capture_failure_returns_to_panel() {
        let mut widget = widget_with(
            WidgetConfig::new("k", "b", "s"),
            FakeApi::default(),
            DeniedScreenshot,
        );
        widget.open();
        let err = widget.start_annotation().await.unwrap_err();
        assert!(matches!(err, WidgetError::Capture(CaptureError::PermissionDenied)));
        assert_eq!(widget.state(), WidgetState::PanelOpen);
        assert_eq!(widget.error_message(), Some("Failed to capture screenshot"));
        assert!(!widget.canvas().is_active());
        assert!(widget.screenshots().is_empty());
    }

    #[tokio::test]
    async fn test_exit_without_drawing_saves_nothing() {
        let mut widget = widget();
        widget.open();
        widget.start_annotation().await.unwrap();
        assert_eq!(widget.state(), WidgetState::Annotating);
        assert!(widget.canvas().is_active());

        assert!(!widget.exit_annotation_mode());
        assert_eq!(widget.state(), WidgetState::PanelOpen);
        assert!(widget.screenshots().is_empty());
        assert!(!widget.canvas().is_active());
    }

    #[tokio::test]
    async fn test_escape_and_done_save_once() {
        let mut widget = widget();
        widget.open();
        widget.start_annotation().await.unwrap();
        drop_pin(&mut widget, Point::new(50.0, 50.0), "typo here");

        widget.key_down(&KeyEvent::new("Escape"));
        assert!(!widget.exit_annotation_mode());

        assert_eq!(widget.state(), WidgetState::PanelOpen);
        assert_eq!(widget.screenshots().len(), 1);
        assert_eq!(widget.screenshots()[0].pins()[0].text, "typo here");
        assert!(widget.canvas().annotations().is_empty());
    }

    #[tokio::test]
    async fn test_edit_screenshot_replaces_session() {
        let mut widget = widget();
        widget.open();
        widget.start_annotation().await.unwrap();
        drop_pin(&mut widget, Point::new(50.0, 50.0), "first");
        widget.exit_annotation_mode();

        widget.edit_screenshot(0).await.unwrap();
        assert_eq!(widget.canvas().comment_pins().len(), 1);
        drop_pin(&mut widget, Point::new(200.0, 120.0), "second");
        assert!(widget.exit_annotation_mode());

        assert_eq!(widget.screenshots().len(), 1);
        assert_eq!(widget.screenshots()[0].pins().len(), 2);
        assert!(matches!(
            widget.edit_screenshot(3).await,
            Err(WidgetError::Attachment(AttachmentError::NoSuchAttachment(3)))
        ));
    }

    #[tokio::test]
    async fn test_size_limit_rejects_third_session() {
        let mut config = WidgetConfig::new("k", "b", "s");
        config.max_attachment_bytes = 1_000_000;
        let mut widget = widget_with(
            config,
            FakeApi::default(),
            FixedScreenshot::new(noise(1280, 800)),
        );
        widget.screenshots.push(session_of_size(450_000));
        widget.screenshots.push(session_of_size(450_000));

        widget.open();
        widget.start_annotation().await.unwrap();
        let canvas = widget.canvas_mut();
        canvas.set_tool(ToolKind::Rectangle);
        canvas.pointer_down(Point::new(10.0, 10.0));
        canvas.pointer_up(Point::new(110.0, 60.0));

        assert!(!widget.exit_annotation_mode());
        assert_eq!(widget.screenshots().len(), 2);
        assert_eq!(widget.error_message(), Some("Size limit exceeded (1MB max)"));
    }

    #[test]
    fn test_size_limit_counts_existing_attachments() {
        let mut config = WidgetConfig::new("k", "b", "s");
        config.max_attachment_bytes = 1_000_000;
        let mut widget = widget_with(config, FakeApi::default(), FixedScreenshot::new(noise(4, 4)));
        widget.screenshots.push(session_of_size(450_000));
        widget.screenshots.push(session_of_size(450_000));

        assert_eq!(
            widget.check_size(widget.total_size() + 200_000),
            Err(AttachmentError::SizeLimitExceeded { limit_mb: 1 })
        );
        let big = SelectedFile::new("big.pdf", Blob::new(vec![7; 200_000], "application/pdf"));
        assert_eq!(widget.attach_files([big]), 0);
        assert_eq!(widget.screenshots().len(), 2);
        assert!(widget.files().is_empty());
        assert_eq!(widget.error_message(), Some("Size limit exceeded (1MB max)"));

        // Landing exactly on the limit is allowed
        let fits = SelectedFile::new("fits.pdf", Blob::new(vec![7; 100_000], "application/pdf"));
        assert_eq!(widget.attach_files([fits]), 1);
        assert_eq!(widget.total_size(), 1_000_000);
    }

    #[tokio::test]
    async fn test_exit_with_unsaved_pin_saves_nothing() {
        let mut widget = widget();
        widget.open();
        widget.start_annotation().await.unwrap();
        let canvas = widget.canvas_mut();
        canvas.set_tool(ToolKind::CommentPin);
        canvas.pointer_down(Point::new(50.0, 50.0));
        canvas.pointer_up(Point::new(50.0, 50.0));
        canvas.popup_input("not saved");

        assert!(!widget.exit_annotation_mode());
        assert!(widget.screenshots().is_empty());
        assert_eq!(widget.state(), WidgetState::PanelOpen);
    }

    #[test]
    fn test_file_limits() {
        let mut widget = widget();
        for _ in 0..5 {
            widget.screenshots.push(session_of_size(10));
        }
        let files = vec![
            SelectedFile::new("empty.txt", Blob::new(Vec::new(), "text/plain")),
            SelectedFile::new("notes.txt", Blob::new(b"hello".to_vec(), "text/plain")),
            SelectedFile::new("extra.pdf", Blob::new(b"%PDF".to_vec(), "application/pdf")),
        ];

        assert_eq!(widget.attach_files(files), 1);
        assert_eq!(widget.attachment_count(), MAX_ATTACHMENTS);
        assert_eq!(widget.files()[0].thumbnail.label.as_deref(), Some("TXT"));
        assert_eq!(widget.error_message(), Some("Maximum 6 attachments allowed"));

        let recording = Recording::new(Blob::new(vec![1; 64], "video/webm"), 30);
        assert_eq!(
            widget.attach_recording(recording),
            Err(AttachmentError::TooManyAttachments { max: 6 })
        );

        widget.remove_attachment(0, AttachmentKind::File).unwrap();
        assert_eq!(
            widget.remove_attachment(0, AttachmentKind::File),
            Err(AttachmentError::NoSuchAttachment(0))
        );
        let recording = Recording::new(Blob::new(vec![1; 64], "video/webm"), 30);
        widget.attach_recording(recording).unwrap();
        assert!(widget.files()[0].name.starts_with("screen-recording-"));
        assert_eq!(widget.total_size(), 5 * 10 + 64);
    }

    #[tokio::test]
    async fn test_submission_order() {
        let mut widget = widget();
        let submitted = Rc::new(Cell::new(false));
        let flag = Rc::clone(&submitted);
        widget.on(WidgetEvent::Submit, move || {
            flag.set(true);
            Ok(())
        });

        widget.open();
        widget.start_annotation().await.unwrap();
        drop_pin(&mut widget, Point::new(50.0, 50.0), "looks broken");
        drop_pin(&mut widget, Point::new(250.0, 150.0), "wrong color");

        widget.submit("button is broken").await.unwrap();

        assert_eq!(
            widget.api.calls(),
            vec![
                "get_board board-1",
                "create_list Feedback",
                "create_card button is broken in list-new",
                "upload_url image/jpeg",
                "put",
                "confirm image/jpeg",
                "comment 📌 #1: looks broken",
                "comment 📌 #2: wrong color",
            ]
        );
        assert_eq!(widget.state(), WidgetState::Success);
        assert!(submitted.get());
        assert_eq!(widget.attachment_count(), 0);
        assert!(!widget.canvas().is_active());

        widget.close();
        assert_eq!(widget.state(), WidgetState::Idle);
    }

    #[tokio::test]
    async fn test_upload_failure_allows_retry() {
        let api = FakeApi {
            lists: vec![BoardList {
                public_id: "list-7".to_string(),
                name: "feedback".to_string(),
            }],
            fail_uploads: true,
            ..FakeApi::default()
        };
        let mut widget = widget_with(
            WidgetConfig::new("k", "board-1", "s"),
            api,
            FixedScreenshot::new(RgbaImage::new(320, 200)),
        );
        widget.attach_files([SelectedFile::new(
            "log file.txt",
            Blob::new(b"trace".to_vec(), ""),
        )]);

        widget.open();
        let err = widget.submit("").await.unwrap_err();
        assert_eq!(err.to_string(), "Upload failed for log_file.txt: 403");
        assert_eq!(widget.state(), WidgetState::Error);
        assert_eq!(widget.error_message(), Some("Upload failed for log_file.txt: 403"));
        assert_eq!(widget.attachment_count(), 1);

        let calls = widget.api.calls();
        assert_eq!(
            calls[..3],
            [
                "get_board board-1",
                "create_card Feedback from https://app.example.com/settings in list-7",
                "upload_url application/octet-stream",
            ]
        );

        // The cached list id skips the board lookup on retry
        assert!(widget.submit("").await.is_err());
        let calls = widget.api.calls();
        assert_eq!(calls.iter().filter(|c| c.starts_with("get_board")).count(), 1);
    }

    #[test]
    fn test_pin_comment_prefix() {
        let pin = CommentPin {
            number: 3,
            text: "misaligned".to_string(),
            x: 0.0,
            y: 0.0,
        };
        assert_eq!(pin_comment(0, &pin, false), "📌 #3: misaligned");
        assert_eq!(pin_comment(1, &pin, true), "📌 Screenshot 2, #3: misaligned");
    }
}
