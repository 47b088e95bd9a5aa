//! Annotation session state machine
//!
//! One value per open document view. Every transition consumes the
//! session and returns the next one, so a pending save has to resolve
//! before anything else (page navigation included) can look at the list.
//!
//! ```text
//! Loading ──geometry + highlights──▶ Ready ◀──clear / save──▶ SelectionActive
//!    │                                 │
//!    └──────── fetch failure ──────────┴──▶ Error
//! ```

use crate::db::{CreateHighlight, Highlight, HighlightPatch, DEFAULT_HIGHLIGHT_COLOR};
use crate::geometry::{normalize, project, FractionalBox, PageSize, PixelRect, Point};

use super::api::HighlightApi;

/// Smallest zoom factor the viewer offers
pub const MIN_SCALE: f64 = 0.5;
/// Largest zoom factor the viewer offers
pub const MAX_SCALE: f64 = 2.0;
/// Zoom in/out increment
pub const SCALE_STEP: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Loading,
    Ready,
    SelectionActive(PendingSelection),
    Error(String),
}

/// A text selection waiting to be saved
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSelection {
    pub page_number: i64,
    pub text: String,
    pub bounding_box: FractionalBox,
}

/// Message for the user about the outcome of the last action
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Info(String),
    Error(String),
}

/// A stored highlight placed on the page as currently rendered
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedHighlight {
    pub id: String,
    pub text: String,
    pub color: String,
    pub rect: PixelRect,
}

#[derive(Debug, Clone)]
pub struct AnnotationSession {
    document_id: String,
    page_count: Option<u32>,
    page_number: i64,
    scale: f64,
    /// Unscaled size of the current page; cleared on navigation until the
    /// new page reports its own size
    page_size: Option<PageSize>,
    highlights: Vec<Highlight>,
    highlights_loaded: bool,
    state: SessionState,
    notice: Option<Notice>,
}

impl AnnotationSession {
    /// Start viewing a document
    pub fn open(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            page_count: None,
            page_number: 1,
            scale: 1.0,
            page_size: None,
            highlights: Vec::new(),
            highlights_loaded: false,
            state: SessionState::Loading,
            notice: None,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn page_number(&self) -> i64 {
        self.page_number
    }

    pub fn page_count(&self) -> Option<u32> {
        self.page_count
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Every loaded highlight of the document, all pages
    pub fn highlights(&self) -> &[Highlight] {
        &self.highlights
    }

    pub fn pending(&self) -> Option<&PendingSelection> {
        match &self.state {
            SessionState::SelectionActive(pending) => Some(pending),
            _ => None,
        }
    }

    fn is_interactive(&self) -> bool {
        matches!(self.state, SessionState::Ready | SessionState::SelectionActive(_))
    }

    /// Move out of `Loading` once everything the view needs is present
    fn settle(mut self) -> Self {
        if self.state == SessionState::Loading
            && self.page_count.is_some()
            && self.page_size.is_some()
            && self.highlights_loaded
        {
            self.state = SessionState::Ready;
        }
        self
    }

    /// The renderer parsed the document
    pub fn document_loaded(mut self, page_count: u32) -> Self {
        if page_count == 0 {
            return self.load_failed("Document has no pages");
        }
        self.page_count = Some(page_count);
        self.page_number = self.page_number.clamp(1, i64::from(page_count));
        self.settle()
    }

    /// The current page finished rendering at its natural (scale 1) size
    pub fn page_rendered(mut self, size: PageSize) -> Self {
        if !size.is_known() {
            tracing::warn!(
                document_id = %self.document_id,
                "Ignoring render report without page size"
            );
            return self;
        }
        self.page_size = Some(size);
        self.settle()
    }

    /// Fetching or rendering the document failed
    pub fn load_failed(mut self, message: impl Into<String>) -> Self {
        if !matches!(self.state, SessionState::Error(_)) {
            let message = message.into();
            self.notice = Some(Notice::Error(message.clone()));
            self.state = SessionState::Error(message);
        }
        self
    }

    /// Fetch the highlight list.
    ///
    /// During loading a failure is fatal for the view; afterwards the
    /// refresh is best effort and keeps the list it already has.
    pub async fn refresh(mut self, api: &dyn HighlightApi) -> Self {
        if matches!(self.state, SessionState::Error(_)) {
            return self;
        }

        match api.list(&self.document_id).await {
            Ok(highlights) => {
                self.highlights = highlights;
                self.highlights_loaded = true;
                self.settle()
            }
            Err(e) if self.state == SessionState::Loading => {
                self.load_failed(format!("Failed to load highlights: {}", e.user_message()))
            }
            Err(e) => {
                tracing::warn!(
                    document_id = %self.document_id,
                    "Highlight refresh failed, keeping current list: {}",
                    e
                );
                self
            }
        }
    }

    /// Record the user's text selection.
    ///
    /// `rects` are the selection's client rectangles and `page_origin` the
    /// rendered page's top-left corner, both in viewport pixels. Empty
    /// selections are ignored.
    pub fn select(mut self, text: &str, rects: &[PixelRect], page_origin: Point) -> Self {
        if !self.is_interactive() {
            return self;
        }

        let text = text.trim();
        let (Some(first), Some(page_size)) = (rects.first(), self.page_size) else {
            return self;
        };
        if text.is_empty() || first.is_empty() {
            return self;
        }

        let bounding_box = match normalize(*first, page_origin, page_size, self.scale) {
            Ok(fraction) => fraction.clamped(),
            Err(e) => {
                tracing::warn!(document_id = %self.document_id, "Cannot normalize selection: {}", e);
                return self;
            }
        };
        if bounding_box.width <= 0.0 || bounding_box.height <= 0.0 {
            return self;
        }

        self.state = SessionState::SelectionActive(PendingSelection {
            page_number: self.page_number,
            text: text.to_string(),
            bounding_box,
        });
        self
    }

    /// Drop the pending selection
    pub fn clear_selection(mut self) -> Self {
        if let SessionState::SelectionActive(_) = self.state {
            self.state = SessionState::Ready;
        }
        self
    }

    /// Persist the pending selection as a highlight
    pub async fn save(mut self, api: &dyn HighlightApi, color: Option<&str>) -> Self {
        let pending = match &self.state {
            SessionState::SelectionActive(pending) => pending.clone(),
            _ => {
                self.notice = Some(Notice::Error("Please select some text first".to_string()));
                return self;
            }
        };

        let request = CreateHighlight {
            document_id: self.document_id.clone(),
            page_number: pending.page_number,
            highlighted_text: pending.text,
            bounding_box: pending.bounding_box,
            color: Some(color.unwrap_or(DEFAULT_HIGHLIGHT_COLOR).to_string()),
        };

        self.state = SessionState::Ready;
        match api.create(&request).await {
            Ok(highlight) => {
                self.highlights.push(highlight);
                self.notice = Some(Notice::Info("Highlight saved".to_string()));
            }
            Err(e) => {
                tracing::warn!(document_id = %self.document_id, "Saving highlight failed: {}", e);
                self.notice = Some(Notice::Error(format!(
                    "Failed to save highlight: {}",
                    e.user_message()
                )));
            }
        }
        self
    }

    /// Delete a highlight; the local list changes only once the store confirms
    pub async fn remove(mut self, api: &dyn HighlightApi, highlight_id: &str) -> Self {
        if !self.is_interactive() {
            return self;
        }

        match api.delete(highlight_id).await {
            Ok(()) => {
                self.highlights.retain(|h| h.id != highlight_id);
                self.notice = Some(Notice::Info("Highlight deleted".to_string()));
            }
            Err(e) => {
                self.notice = Some(Notice::Error(format!(
                    "Failed to delete highlight: {}",
                    e.user_message()
                )));
            }
        }
        self
    }

    /// Change a highlight's color
    pub async fn recolor(mut self, api: &dyn HighlightApi, highlight_id: &str, color: &str) -> Self {
        if !self.is_interactive() {
            return self;
        }

        let patch = HighlightPatch {
            color: Some(color.to_string()),
            ..Default::default()
        };
        match api.update(highlight_id, &patch).await {
            Ok(updated) => {
                if let Some(existing) = self.highlights.iter_mut().find(|h| h.id == updated.id) {
                    *existing = updated;
                }
                self.notice = Some(Notice::Info("Highlight updated".to_string()));
            }
            Err(e) => {
                self.notice = Some(Notice::Error(format!(
                    "Failed to update highlight: {}",
                    e.user_message()
                )));
            }
        }
        self
    }

    /// Navigate to another page; an active selection does not survive it.
    ///
    /// Pages can differ in size, so selection and projection stay off until
    /// the new page reports `page_rendered`.
    pub fn go_to_page(mut self, page_number: i64) -> Self {
        let Some(page_count) = self.page_count else {
            return self;
        };
        let page_number = page_number.clamp(1, i64::from(page_count));
        if page_number != self.page_number {
            self.page_number = page_number;
            self.page_size = None;
        }
        if let SessionState::SelectionActive(_) = self.state {
            self.state = SessionState::Ready;
        }
        self
    }

    pub fn next_page(self) -> Self {
        let page = self.page_number + 1;
        self.go_to_page(page)
    }

    pub fn previous_page(self) -> Self {
        let page = self.page_number - 1;
        self.go_to_page(page)
    }

    /// Change the zoom factor, kept within the viewer's range
    pub fn set_scale(mut self, scale: f64) -> Self {
        if scale.is_finite() {
            self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
        }
        self
    }

    pub fn zoom_in(self) -> Self {
        let scale = self.scale + SCALE_STEP;
        self.set_scale(scale)
    }

    pub fn zoom_out(self) -> Self {
        let scale = self.scale - SCALE_STEP;
        self.set_scale(scale)
    }

    pub fn dismiss_notice(mut self) -> Self {
        self.notice = None;
        self
    }

    /// Highlights of the current page in the pixel space of the current zoom
    pub fn visible_highlights(&self) -> Vec<ProjectedHighlight> {
        let Some(page_size) = self.page_size else {
            return Vec::new();
        };
        let rendered = page_size.scaled(self.scale);

        self.highlights
            .iter()
            .filter(|h| h.page_number == self.page_number)
            .map(|h| ProjectedHighlight {
                id: h.id.clone(),
                text: h.highlighted_text.clone(),
                color: h.color.clone(),
                rect: project(h.bounding_box, rendered),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// In-memory API with switchable failure
    #[derive(Default)]
    struct FakeApi {
        stored: Mutex<Vec<Highlight>>,
        fail: Mutex<bool>,
        list_calls: Mutex<usize>,
    }

    impl FakeApi {
        fn failing(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }

        fn check(&self) -> Result<()> {
            if *self.fail.lock().unwrap() {
                Err(AppError::Internal("store unavailable".to_string()))
            } else {
                Ok(())
            }
        }

        fn seed(&self, page_number: i64, id: &str) {
            self.stored.lock().unwrap().push(Highlight {
                id: id.to_string(),
                document_id: "doc".to_string(),
                user_id: "alice".to_string(),
                page_number,
                highlighted_text: format!("seeded {}", id),
                bounding_box: FractionalBox::new(0.1, 0.2, 0.3, 0.05),
                color: DEFAULT_HIGHLIGHT_COLOR.to_string(),
                created_at: String::new(),
                updated_at: String::new(),
            });
        }
    }

    #[async_trait]
    impl HighlightApi for FakeApi {
        async fn list(&self, _document_id: &str) -> Result<Vec<Highlight>> {
            *self.list_calls.lock().unwrap() += 1;
            self.check()?;
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn create(&self, data: &CreateHighlight) -> Result<Highlight> {
            self.check()?;
            let mut stored = self.stored.lock().unwrap();
            let highlight = Highlight {
                id: format!("h{}", stored.len() + 1),
                document_id: data.document_id.clone(),
                user_id: "alice".to_string(),
                page_number: data.page_number,
                highlighted_text: data.highlighted_text.clone(),
                bounding_box: data.bounding_box,
                color: data.color.clone().unwrap_or_default(),
                created_at: String::new(),
                updated_at: String::new(),
            };
            stored.push(highlight.clone());
            Ok(highlight)
        }

        async fn update(&self, highlight_id: &str, patch: &HighlightPatch) -> Result<Highlight> {
            self.check()?;
            let mut stored = self.stored.lock().unwrap();
            let highlight = stored
                .iter_mut()
                .find(|h| h.id == highlight_id)
                .ok_or_else(AppError::highlight_not_found)?;
            highlight.apply(patch);
            Ok(highlight.clone())
        }

        async fn delete(&self, highlight_id: &str) -> Result<()> {
            self.check()?;
            let mut stored = self.stored.lock().unwrap();
            let before = stored.len();
            stored.retain(|h| h.id != highlight_id);
            if stored.len() == before {
                return Err(AppError::highlight_not_found());
            }
            Ok(())
        }
    }

    const PAGE: PageSize = PageSize {
        width: 600.0,
        height: 800.0,
    };

    async fn ready_session(api: &FakeApi) -> AnnotationSession {
        let session = AnnotationSession::open("doc")
            .document_loaded(5)
            .page_rendered(PAGE)
            .refresh(api)
            .await;
        assert_eq!(session.state(), &SessionState::Ready);
        session
    }

    #[tokio::test]
    async fn test_loading_waits_for_geometry_and_highlights() {
        let api = FakeApi::default();

        let session = AnnotationSession::open("doc").document_loaded(3);
        assert_eq!(session.state(), &SessionState::Loading);

        let session = session.refresh(&api).await;
        assert_eq!(session.state(), &SessionState::Loading);

        let session = session.page_rendered(PageSize::new(0.0, 0.0));
        assert_eq!(session.state(), &SessionState::Loading);

        let session = session.page_rendered(PAGE);
        assert_eq!(session.state(), &SessionState::Ready);
    }

    #[tokio::test]
    async fn test_failed_initial_fetch_is_error() {
        let api = FakeApi::default();
        api.failing(true);

        let session = AnnotationSession::open("doc")
            .document_loaded(3)
            .page_rendered(PAGE)
            .refresh(&api)
            .await;
        assert!(matches!(session.state(), SessionState::Error(_)));
        assert!(matches!(session.notice(), Some(Notice::Error(_))));

        let session = AnnotationSession::open("doc").load_failed("Failed to load PDF");
        assert_eq!(session.state(), &SessionState::Error("Failed to load PDF".to_string()));
    }

    #[tokio::test]
    async fn test_later_refresh_failure_keeps_list() {
        let api = FakeApi::default();
        api.seed(1, "a");
        let session = ready_session(&api).await;
        assert_eq!(session.highlights().len(), 1);

        api.failing(true);
        let session = session.refresh(&api).await;
        assert_eq!(session.state(), &SessionState::Ready);
        assert_eq!(session.highlights().len(), 1);
    }

    #[tokio::test]
    async fn test_select_and_save() {
        let api = FakeApi::default();
        let session = ready_session(&api)
            .await
            .set_scale(2.0)
            .go_to_page(2)
            .page_rendered(PAGE);

        let origin = Point::new(40.0, 20.0);
        let rects = [PixelRect::new(160.0, 340.0, 240.0, 32.0)];
        let session = session.select("  selected words ", &rects, origin);

        let pending = session.pending().unwrap().clone();
        assert_eq!(pending.text, "selected words");
        assert_eq!(pending.page_number, 2);
        assert!((pending.bounding_box.x - 0.1).abs() < 1e-9);
        assert!((pending.bounding_box.y - 0.2).abs() < 1e-9);

        let session = session.save(&api, None).await;
        assert_eq!(session.state(), &SessionState::Ready);
        assert_eq!(session.notice(), Some(&Notice::Info("Highlight saved".to_string())));
        assert_eq!(session.highlights().len(), 1);
        assert_eq!(session.highlights()[0].color, DEFAULT_HIGHLIGHT_COLOR);
        assert_eq!(session.highlights()[0].page_number, 2);

        let visible = session.visible_highlights();
        assert_eq!(visible.len(), 1);
        assert!((visible[0].rect.x - 120.0).abs() < 1e-6);
        assert!((visible[0].rect.width - 240.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_selection_is_ignored() {
        let api = FakeApi::default();
        let session = ready_session(&api).await;

        let session = session.select("   ", &[PixelRect::new(0.0, 0.0, 10.0, 10.0)], Point::default());
        assert_eq!(session.state(), &SessionState::Ready);

        let session = session.select("text", &[], Point::default());
        assert_eq!(session.state(), &SessionState::Ready);

        let session = session.select("text", &[PixelRect::new(5.0, 5.0, 0.0, 10.0)], Point::default());
        assert_eq!(session.state(), &SessionState::Ready);

        let session = session.save(&api, None).await;
        assert!(matches!(session.notice(), Some(Notice::Error(_))));
        assert!(api.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_save_reverts_without_mutation() {
        let api = FakeApi::default();
        let session = ready_session(&api)
            .await
            .select("words", &[PixelRect::new(60.0, 80.0, 120.0, 16.0)], Point::default());
        assert!(session.pending().is_some());

        api.failing(true);
        let session = session.save(&api, Some("#00ff00")).await;
        assert_eq!(session.state(), &SessionState::Ready);
        assert!(session.highlights().is_empty());
        assert!(matches!(session.notice(), Some(Notice::Error(_))));
    }

    #[tokio::test]
    async fn test_clear_selection_discards_pending() {
        let api = FakeApi::default();
        let session = ready_session(&api)
            .await
            .select("words", &[PixelRect::new(60.0, 80.0, 120.0, 16.0)], Point::default())
            .clear_selection();
        assert_eq!(session.state(), &SessionState::Ready);
        assert!(session.pending().is_none());
    }

    #[tokio::test]
    async fn test_navigation_reprojects_without_refetch() {
        let api = FakeApi::default();
        api.seed(1, "a");
        api.seed(2, "b");
        api.seed(2, "c");
        let session = ready_session(&api).await;
        assert_eq!(*api.list_calls.lock().unwrap(), 1);

        assert_eq!(session.visible_highlights().len(), 1);

        let session = session.next_page();
        assert_eq!(session.page_number(), 2);
        assert!(session.visible_highlights().is_empty());

        let session = session.page_rendered(PAGE);
        let at_one = session.visible_highlights();
        assert_eq!(at_one.len(), 2);

        let session = session.set_scale(1.5);
        let zoomed = session.visible_highlights();
        assert!((zoomed[0].rect.x - at_one[0].rect.x * 1.5).abs() < 1e-6);
        assert!((zoomed[0].rect.height - at_one[0].rect.height * 1.5).abs() < 1e-6);

        let session = session.go_to_page(99);
        assert_eq!(session.page_number(), 5);
        let session = session.go_to_page(-4).previous_page();
        assert_eq!(session.page_number(), 1);

        assert_eq!(*api.list_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_select_waits_for_new_page_geometry() {
        let api = FakeApi::default();
        let session = AnnotationSession::open("doc")
            .document_loaded(2)
            .page_rendered(PageSize::new(600.0, 800.0))
            .refresh(&api)
            .await
            .go_to_page(2);

        // Page 2 has not rendered yet, so its size is unknown
        let rects = [PixelRect::new(400.0, 300.0, 400.0, 60.0)];
        let session = session.select("words", &rects, Point::default());
        assert_eq!(session.state(), &SessionState::Ready);

        // Landscape page 2 reports its own size
        let session = session
            .page_rendered(PageSize::new(800.0, 600.0))
            .select("words", &rects, Point::default());
        let pending = session.pending().unwrap().bounding_box;
        assert!((pending.x - 0.5).abs() < 1e-9);
        assert!((pending.y - 0.5).abs() < 1e-9);
        assert!((pending.width - 0.5).abs() < 1e-9);
        assert!((pending.height - 0.1).abs() < 1e-9);

        // Staying on the same page keeps the geometry
        let session = session.clear_selection().go_to_page(2);
        assert!(session
            .select("words", &rects, Point::default())
            .pending()
            .is_some());
    }

    #[tokio::test]
    async fn test_page_change_drops_selection() {
        let api = FakeApi::default();
        let session = ready_session(&api)
            .await
            .select("words", &[PixelRect::new(60.0, 80.0, 120.0, 16.0)], Point::default())
            .next_page();
        assert_eq!(session.state(), &SessionState::Ready);
    }

    #[tokio::test]
    async fn test_zoom_is_clamped() {
        let api = FakeApi::default();
        let mut session = ready_session(&api).await;
        for _ in 0..30 {
            session = session.zoom_in();
        }
        assert_eq!(session.scale(), MAX_SCALE);
        for _ in 0..30 {
            session = session.zoom_out();
        }
        assert_eq!(session.scale(), MIN_SCALE);
        assert_eq!(session.set_scale(f64::NAN).scale(), MIN_SCALE);
    }

    #[tokio::test]
    async fn test_remove_and_recolor() {
        let api = FakeApi::default();
        api.seed(1, "a");
        api.seed(1, "b");
        let session = ready_session(&api).await;

        let session = session.recolor(&api, "a", "#123456").await;
        assert_eq!(session.highlights()[0].color, "#123456");

        let session = session.remove(&api, "b").await;
        assert_eq!(session.highlights().len(), 1);

        api.failing(true);
        let session = session.remove(&api, "a").await;
        assert_eq!(session.highlights().len(), 1);
        assert!(matches!(session.notice(), Some(Notice::Error(_))));

        api.failing(false);
        let session = session.dismiss_notice().remove(&api, "missing").await;
        assert_eq!(session.highlights().len(), 1);
        assert!(matches!(session.notice(), Some(Notice::Error(_))));
    }

    #[tokio::test]
    async fn test_selection_matches_stored_box_across_zoom() {
        let api = FakeApi::default();
        api.seed(1, "a");
        let session = ready_session(&api).await.set_scale(1.3);

        // Re-select exactly where the stored highlight is drawn
        let origin = Point::new(12.0, 34.0);
        let drawn = session.visible_highlights()[0].rect;
        let selection = PixelRect::new(drawn.x + origin.x, drawn.y + origin.y, drawn.width, drawn.height);
        let session = session.select("again", &[selection], origin);

        let stored = api.stored.lock().unwrap()[0].bounding_box;
        let pending = session.pending().unwrap().bounding_box;
        assert!((pending.x - stored.x).abs() < 1e-9);
        assert!((pending.y - stored.y).abs() < 1e-9);
        assert!((pending.width - stored.width).abs() < 1e-9);
        assert!((pending.height - stored.height).abs() < 1e-9);
    }
}
