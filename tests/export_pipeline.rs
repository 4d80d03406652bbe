//! Integration tests for the export pipeline.
//!
//! These tests validate:
//! - Snapshot size and pixels do not depend on the host viewport
//! - Page height always follows the snapshot's aspect ratio
//! - The controller ignores re-entrant triggers and always returns to idle
//! - Failures alert and log exactly once and deliver nothing
//! - A full export lands on disk under the fixed file name

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use resume_export::assets::LocalAssets;
use resume_export::capture::{capture, CaptureOptions, RasterSnapshot, Viewport};
use resume_export::controller::{
    ExportController, ExportState, Notifier, TriggerControl, TriggerOutcome, BUSY_LABEL,
    FAILURE_ALERT, IDLE_LABEL,
};
use resume_export::delivery::{DeliveryReceipt, DeliverySink, DirectorySink};
use resume_export::display_list::DisplayList;
use resume_export::error::{CaptureError, DeliveryError, ExportError, PackagingError};
use resume_export::fonts::FontManager;
use resume_export::packaging::{
    ExportDocument, ImageEncoder, PackagingOptions, Packager, PageGeometry, PAGE_WIDTH_MM,
};
use resume_export::region::{MarkupRegion, SourceRegion};

// =====================================================================
// Helpers
// =====================================================================

const RESUME_HTML: &str = r#"
<html><body>
  <nav id="menu">Home</nav>
  <div id="resume" class="container mx-auto p-8 bg-white">
    <header class="bg-gradient-to-r from-blue-600 to-indigo-600 text-white p-6 rounded-lg">
      <h1 class="text-3xl font-bold">Linson Thomas</h1>
      <p class="text-lg">Software Engineer</p>
    </header>
    <section class="grid grid-cols-1 md:grid-cols-2 gap-6 mt-6">
      <div class="border border-gray-200 rounded-lg p-4">
        <h2 class="text-xl font-semibold">Experience</h2>
        <ul class="list-disc pl-5 space-y-1">
          <li>Built data pipelines &amp; services</li>
          <li>Led a team of four engineers</li>
        </ul>
      </div>
      <div class="border border-gray-200 rounded-lg p-4">
        <h2 class="text-xl font-semibold">Skills</h2>
        <p class="text-gray-700">Rust, TypeScript, PostgreSQL</p>
      </div>
    </section>
  </div>
</body></html>
"#;

fn markup_region(html: &str) -> MarkupRegion {
    MarkupRegion::from_html(html, "resume", Arc::new(LocalAssets::new("."))).expect("region")
}

fn digest(snapshot: &RasterSnapshot) -> String {
    hex::encode(Sha256::digest(snapshot.pixels().as_raw()))
}

thread_local! {
    static RECORDS: RefCell<Vec<(log::Level, String)>> = const { RefCell::new(Vec::new()) };
}

/// Records log calls per thread; `#[tokio::test]` runs each test on its own
/// thread, so counts never leak between tests.
struct ThreadLogger;

impl log::Log for ThreadLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        RECORDS.with(|r| r.borrow_mut().push((record.level(), record.args().to_string())));
    }

    fn flush(&self) {}
}

static LOGGER: ThreadLogger = ThreadLogger;

fn install_logger() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        log::set_logger(&LOGGER).expect("logger");
        log::set_max_level(log::LevelFilter::Trace);
    });
    RECORDS.with(|r| r.borrow_mut().clear());
}

fn errors_logged() -> usize {
    RECORDS.with(|r| {
        r.borrow()
            .iter()
            .filter(|(level, _)| *level == log::Level::Error)
            .count()
    })
}

#[derive(Default)]
struct RecordingNotifier {
    alerts: RefCell<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn alert(&self, message: &str) {
        self.alerts.borrow_mut().push(message.to_string());
    }
}

/// Keeps every delivered document in memory.
#[derive(Clone, Default)]
struct MemorySink {
    delivered: Arc<Mutex<Vec<ExportDocument>>>,
}

#[async_trait]
impl DeliverySink for MemorySink {
    async fn deliver(&self, document: &ExportDocument) -> Result<DeliveryReceipt, DeliveryError> {
        self.delivered.lock().unwrap().push(document.clone());
        Ok(DeliveryReceipt {
            location: format!("memory://{}", document.file_name),
            bytes: document.bytes.len(),
        })
    }
}

/// A fixed-size region whose layout takes a while, counting renders.
struct SlowRegion {
    height: f32,
    delay: Duration,
    renders: AtomicUsize,
    fonts: FontManager,
}

impl SlowRegion {
    fn new(height: f32, delay: Duration) -> Self {
        Self {
            height,
            delay,
            renders: AtomicUsize::new(0),
            fonts: FontManager::new(),
        }
    }
}

#[async_trait]
impl SourceRegion for SlowRegion {
    fn name(&self) -> &str {
        "slow"
    }

    fn is_attached(&self) -> bool {
        true
    }

    fn fonts(&self) -> &FontManager {
        &self.fonts
    }

    async fn render(
        &self,
        logical_width: f32,
        _options: &CaptureOptions,
    ) -> Result<DisplayList, CaptureError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(DisplayList {
            width: logical_width,
            height: self.height,
            items: Vec::new(),
        })
    }
}

/// Behaves as if its handle were cleared between lookup and capture.
struct VanishingRegion {
    fonts: FontManager,
}

#[async_trait]
impl SourceRegion for VanishingRegion {
    fn name(&self) -> &str {
        "vanishing"
    }

    fn is_attached(&self) -> bool {
        true
    }

    fn fonts(&self) -> &FontManager {
        &self.fonts
    }

    async fn render(&self, _: f32, _: &CaptureOptions) -> Result<DisplayList, CaptureError> {
        Err(CaptureError::RegionMissing)
    }
}

struct BrokenEncoder;

impl ImageEncoder for BrokenEncoder {
    fn encode(&self, _: &RasterSnapshot) -> Result<Vec<u8>, PackagingError> {
        Err(PackagingError::Encode("encoder unavailable".to_string()))
    }
}

fn controller(
    region: Option<Arc<dyn SourceRegion>>,
    packager: Packager,
    sink: MemorySink,
) -> (ExportController, Rc<TriggerControl>, Rc<RecordingNotifier>) {
    let trigger = Rc::new(TriggerControl::new());
    let notifier = Rc::new(RecordingNotifier::default());
    let controller = ExportController::new(
        Rc::clone(&trigger),
        region,
        packager,
        Box::new(sink),
        Rc::clone(&notifier) as Rc<dyn Notifier>,
    );
    (controller, trigger, notifier)
}

/// The single page of a saved PDF as a reader sees it.
struct SavedPage {
    /// `(width, height, filters)` per image on the page.
    images: Vec<(i64, i64, Vec<String>)>,
    /// Operands of every `cm` operator in the page content.
    transforms: Vec<Vec<f32>>,
}

fn read_single_page(bytes: &[u8]) -> SavedPage {
    let pdf = lopdf::Document::load_mem(bytes).expect("parse pdf");
    let pages = pdf.get_pages();
    assert_eq!(pages.len(), 1, "expected exactly one page");
    let page_id = *pages.values().next().unwrap();
    let images = pdf
        .get_page_images(page_id)
        .unwrap()
        .into_iter()
        .map(|i| (i.width, i.height, i.filters.unwrap_or_default()))
        .collect();
    let content = lopdf::content::Content::decode(&pdf.get_page_content(page_id).unwrap()).unwrap();
    let transforms = content
        .operations
        .iter()
        .filter(|op| op.operator == "cm")
        .map(|op| op.operands.iter().map(|o| o.as_float().unwrap()).collect())
        .collect();
    SavedPage { images, transforms }
}

// =====================================================================
// Capture
// =====================================================================

#[tokio::test]
async fn snapshot_ignores_host_viewport() {
    let region = markup_region(RESUME_HTML);
    let options = CaptureOptions::default();

    let phone = capture(Some(&region), Viewport::new(375.0, 3.0), &options)
        .await
        .unwrap();
    let desktop = capture(Some(&region), Viewport::new(1920.0, 1.0), &options)
        .await
        .unwrap();

    assert_eq!(phone.width(), 1800);
    assert_eq!(desktop.width(), 1800);
    assert_eq!(phone.height(), desktop.height());
    assert_eq!(digest(&phone), digest(&desktop));
}

#[tokio::test]
async fn capture_paints_region_content() {
    let region = markup_region(RESUME_HTML);
    let snap = capture(Some(&region), Viewport::default(), &CaptureOptions::default())
        .await
        .unwrap();
    let white = [255u8, 255, 255, 255];
    let painted = snap.pixels().pixels().filter(|p| p.0 != white).count();
    assert!(painted > 1000, "only {painted} painted pixels");
}

#[tokio::test]
async fn responsive_columns_follow_capture_width() {
    // md:grid-cols-2 is resolved against the 1200px capture width, so both
    // cards share one row and the region is shorter than at 500px.
    let region = markup_region(RESUME_HTML);
    let wide = region.render(1200.0, &CaptureOptions::default()).await.unwrap();
    let narrow = region.render(500.0, &CaptureOptions::default()).await.unwrap();
    assert!(wide.height < narrow.height);
}

#[tokio::test]
async fn region_outside_document_is_not_found() {
    assert!(MarkupRegion::from_html(RESUME_HTML, "portfolio", Arc::new(LocalAssets::new("."))).is_none());
}

// =====================================================================
// Packaging
// =====================================================================

#[test]
fn page_height_follows_aspect_for_extreme_sizes() {
    let packager = Packager::new(PackagingOptions::default());
    for (w, h) in [(1u32, 1u32), (1800, 4500), (300, 12000), (2400, 600)] {
        let snap = RasterSnapshot::new(image::RgbaImage::from_pixel(
            w,
            h,
            image::Rgba([200, 200, 200, 255]),
        ));
        let doc = packager.package(snap).unwrap();
        assert_eq!(doc.geometry.width_mm, PAGE_WIDTH_MM);
        let expected = PAGE_WIDTH_MM * f64::from(h) / f64::from(w);
        assert!(
            (doc.geometry.height_mm - expected).abs() < 1e-9,
            "{w}x{h}: {} != {expected}",
            doc.geometry.height_mm
        );
        assert!((doc.geometry.aspect() - f64::from(h) / f64::from(w)).abs() < 1e-12);
        assert_eq!(&doc.bytes[0..5], b"%PDF-");

        let page = read_single_page(&doc.bytes);
        assert_eq!(page.images.len(), 1);
        assert_eq!((page.images[0].0, page.images[0].1), (i64::from(w), i64::from(h)));
    }
}

#[test]
fn geometry_matches_reference_export() {
    let g = PageGeometry::for_snapshot(PAGE_WIDTH_MM, 1800, 4500);
    assert_eq!((g.width_mm, g.height_mm), (210.0, 525.0));
}

// =====================================================================
// Controller
// =====================================================================

#[tokio::test]
async fn unset_region_is_a_silent_no_op() {
    install_logger();
    let sink = MemorySink::default();
    let (controller, trigger, notifier) =
        controller(None, Packager::new(PackagingOptions::default()), sink.clone());

    assert!(matches!(controller.trigger().await, TriggerOutcome::NoRegion));
    assert!(notifier.alerts.borrow().is_empty());
    assert_eq!(errors_logged(), 0);
    assert!(sink.delivered.lock().unwrap().is_empty());
    assert_eq!(trigger.state(), ExportState::Idle);
}

#[tokio::test(start_paused = true)]
async fn racing_triggers_start_one_capture() {
    let region = Arc::new(SlowRegion::new(20.0, Duration::from_millis(20)));
    let sink = MemorySink::default();
    let (controller, trigger, _) = controller(
        Some(region.clone() as Arc<dyn SourceRegion>),
        Packager::new(PackagingOptions::default()),
        sink.clone(),
    );

    let probe = async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        (trigger.state(), trigger.label(), trigger.is_enabled())
    };
    let (a, b, during) = tokio::join!(controller.trigger(), controller.trigger(), probe);

    let outcomes = [a, b];
    let delivered = outcomes
        .iter()
        .filter(|o| matches!(o, TriggerOutcome::Delivered(_)))
        .count();
    let ignored = outcomes
        .iter()
        .filter(|o| matches!(o, TriggerOutcome::AlreadyRunning))
        .count();
    assert_eq!((delivered, ignored), (1, 1));
    assert_eq!(region.renders.load(Ordering::SeqCst), 1);
    assert_eq!(sink.delivered.lock().unwrap().len(), 1);

    assert_eq!(during, (ExportState::InProgress, BUSY_LABEL.to_string(), false));
    assert_eq!(trigger.state(), ExportState::Idle);
    assert_eq!(trigger.label(), IDLE_LABEL);
    assert!(trigger.is_enabled());
}

#[tokio::test]
async fn failed_capture_alerts_and_logs_once() {
    install_logger();
    let sink = MemorySink::default();
    let region: Arc<dyn SourceRegion> = Arc::new(VanishingRegion {
        fonts: FontManager::new(),
    });
    let (controller, trigger, notifier) = controller(
        Some(region),
        Packager::new(PackagingOptions::default()),
        sink.clone(),
    );

    let outcome = controller.trigger().await;
    assert!(matches!(
        outcome,
        TriggerOutcome::Failed(ExportError::Capture(CaptureError::RegionMissing))
    ));
    assert_eq!(*notifier.alerts.borrow(), vec![FAILURE_ALERT.to_string()]);
    assert_eq!(errors_logged(), 1);
    assert!(sink.delivered.lock().unwrap().is_empty());
    assert_eq!(trigger.state(), ExportState::Idle);
    assert_eq!(trigger.label(), IDLE_LABEL);

    // The trigger is usable again afterwards.
    assert!(matches!(controller.trigger().await, TriggerOutcome::Failed(_)));
    assert_eq!(notifier.alerts.borrow().len(), 2);
}

#[tokio::test]
async fn detached_region_fails_and_resets() {
    let region = Arc::new(markup_region(RESUME_HTML));
    region.detach();
    let (controller, trigger, notifier) = controller(
        Some(region as Arc<dyn SourceRegion>),
        Packager::new(PackagingOptions::default()),
        MemorySink::default(),
    );
    assert!(matches!(
        controller.trigger().await,
        TriggerOutcome::Failed(ExportError::Capture(CaptureError::Detached(_)))
    ));
    assert_eq!(notifier.alerts.borrow().len(), 1);
    assert!(trigger.is_enabled());
}

#[tokio::test]
async fn failed_encoding_delivers_nothing() {
    install_logger();
    let sink = MemorySink::default();
    let region: Arc<dyn SourceRegion> = Arc::new(SlowRegion::new(10.0, Duration::ZERO));
    let (controller, trigger, notifier) = controller(
        Some(region),
        Packager::with_encoder(Box::new(BrokenEncoder), PackagingOptions::default()),
        sink.clone(),
    );

    assert!(matches!(
        controller.trigger().await,
        TriggerOutcome::Failed(ExportError::Packaging(PackagingError::Encode(_)))
    ));
    assert!(sink.delivered.lock().unwrap().is_empty());
    assert_eq!(notifier.alerts.borrow().len(), 1);
    assert_eq!(errors_logged(), 1);
    assert_eq!(trigger.state(), ExportState::Idle);
}

// =====================================================================
// End to end
// =====================================================================

#[tokio::test]
async fn tall_resume_exports_to_a_525mm_page() {
    let tmp = tempfile::tempdir().unwrap();
    let html = r#"<div id="resume" style="height: 3000px" class="p-8">
        <h1 class="text-3xl font-bold">Linson Thomas</h1>
    </div>"#;

    let region = markup_region(html);
    let snap = capture(Some(&region), Viewport::new(800.0, 2.0), &CaptureOptions::default())
        .await
        .unwrap();
    assert_eq!((snap.width(), snap.height()), (1800, 4500));

    let memory = MemorySink::default();
    let (controller, _, notifier) = controller(
        Some(Arc::new(region) as Arc<dyn SourceRegion>),
        Packager::new(PackagingOptions::default()),
        memory.clone(),
    );
    let TriggerOutcome::Delivered(receipt) = controller.trigger().await else {
        panic!("export did not deliver");
    };
    assert!(notifier.alerts.borrow().is_empty());
    assert_eq!(receipt.location, "memory://Linson_Thomas_Resume.pdf");

    let doc = memory.delivered.lock().unwrap()[0].clone();
    assert_eq!(doc.file_name, "Linson_Thomas_Resume.pdf");
    assert_eq!(doc.geometry.width_mm, 210.0);
    assert_eq!(doc.geometry.height_mm, 525.0);
    assert_eq!(&doc.bytes[0..5], b"%PDF-");

    // One full-resolution JPEG drawn from the origin across the whole page.
    let page = read_single_page(&doc.bytes);
    assert_eq!(page.images.len(), 1);
    let (width, height, filters) = &page.images[0];
    assert_eq!((*width, *height), (1800, 4500));
    assert_eq!(filters, &vec!["DCTDecode".to_string()]);
    assert_eq!(page.transforms.len(), 1);
    let expected = [595.2756_f32, 0.0, 0.0, 1488.189, 0.0, 0.0];
    for (got, want) in page.transforms[0].iter().zip(expected) {
        assert!((got - want).abs() < 0.05, "cm {:?}", page.transforms[0]);
    }

    let saved = DirectorySink::new(tmp.path()).deliver(&doc).await.unwrap();
    let on_disk = std::fs::read(tmp.path().join("Linson_Thomas_Resume.pdf")).unwrap();
    assert_eq!(on_disk.len(), saved.bytes);
    assert_eq!(on_disk, doc.bytes);
}
